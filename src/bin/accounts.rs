use anyhow::Context;
use spam_farmer::config::mnemonic_from_env;
use spam_farmer::types::FUNDING_ACCOUNT;
use spam_farmer::wallet::Keystore;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mnemonic = mnemonic_from_env()?;
    let fleet_size: u32 = match std::env::var("ACCOUNT_AMOUNT") {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().context("ACCOUNT_AMOUNT must be a number")?,
        _ => 0,
    };
    let keystore = Keystore::from_mnemonic(&mnemonic, fleet_size).context("failed to derive keys")?;

    println!("\nDerived {} account(s) from MNEMONICS\n", keystore.len());
    for index in 0..=fleet_size {
        let address = keystore.address(index)?;
        if index == FUNDING_ACCOUNT {
            println!("--- Funding account #{index} ---");
        } else {
            println!("--- Fleet account #{index} ---");
        }
        println!("Address:     {address}");
        println!("Path:        m/44'/784'/{index}'/0'/0'");
        println!();
    }

    println!("INSTRUCTIONS:");
    println!("1. Send SUI to the funding account; it tops up the fleet automatically.");
    println!("2. Run: cargo run --bin farmer");
    Ok(())
}
