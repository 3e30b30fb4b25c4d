//! Tops up low-balance fleet accounts from the funding account.

use futures::future::join_all;
use tracing::{info, warn};

use crate::config::FarmConfig;
use crate::errors::Error;
use crate::gateway::ChainGateway;
use crate::transaction::TransactionBuilder;
use crate::types::{AccountIndex, SuiAddress, TransactionDigest, FUNDING_ACCOUNT, SUI_COIN_TYPE};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FundingOutcome {
    /// Every readable account is at or above the threshold; nothing was submitted.
    NotNeeded { skipped: Vec<AccountIndex> },
    Funded {
        recipients: Vec<AccountIndex>,
        digest: TransactionDigest,
        /// Accounts whose balance could not be read this pass.
        skipped: Vec<AccountIndex>,
    },
}

impl FundingOutcome {
    #[must_use]
    pub fn skipped(&self) -> &[AccountIndex] {
        match self {
            Self::NotNeeded { skipped } | Self::Funded { skipped, .. } => skipped,
        }
    }
}

/// One transaction splitting the gas coin into `amount` pieces, one per recipient.
pub fn build_top_up(
    sender: SuiAddress,
    recipients: &[SuiAddress],
    amount: u64,
) -> Result<TransactionBuilder> {
    if recipients.is_empty() {
        return Err(Error::Validation("top-up needs at least one recipient".to_owned()));
    }

    let mut tx = TransactionBuilder::new();
    tx.set_sender(sender);
    let amounts = recipients
        .iter()
        .map(|_| tx.pure(&amount))
        .collect::<Result<Vec<_>>>()?;
    let gas = tx.gas();
    let pieces = tx.split_coins(gas, amounts)?;

    for (i, recipient) in recipients.iter().enumerate() {
        let index = u16::try_from(i)
            .map_err(|_| Error::Validation(format!("too many recipients: {}", recipients.len())))?;
        let piece = pieces.nested(index)?;
        let to = tx.pure(recipient)?;
        tx.transfer_objects(vec![piece], to)?;
    }
    Ok(tx)
}

/// Reads every account's balance and funds those below the threshold in a
/// single batched transaction from account 0.
///
/// An account whose balance cannot be read is skipped for this pass and the
/// rest are still funded. Only when no balance at all could be read does the
/// pass fail.
pub async fn fund<G: ChainGateway>(
    gateway: &G,
    config: &FarmConfig,
    accounts: &[AccountIndex],
) -> Result<FundingOutcome> {
    let candidates: Vec<AccountIndex> = accounts
        .iter()
        .copied()
        .filter(|&index| index != FUNDING_ACCOUNT)
        .collect();

    let reads = join_all(candidates.iter().map(|&index| async move {
        let read = async {
            let address = gateway.address(index)?;
            let balance = config
                .retry
                .run("balance", || gateway.get_balance(address, SUI_COIN_TYPE))
                .await?;
            Ok::<_, Error>((address, balance))
        };
        (index, read.await)
    }))
    .await;

    let mut needy: Vec<(AccountIndex, SuiAddress)> = Vec::new();
    let mut skipped = Vec::new();
    let mut first_error = None;
    for (index, read) in reads {
        match read {
            Ok((address, balance)) if balance < config.funding_threshold => {
                needy.push((index, address));
            }
            Ok(_) => {}
            Err(e) => {
                warn!(account = index, error = %e, "balance unavailable, skipping top-up check");
                skipped.push(index);
                first_error.get_or_insert(e);
            }
        }
    }

    if skipped.len() == candidates.len() {
        if let Some(e) = first_error {
            return Err(e);
        }
    }
    if needy.is_empty() {
        return Ok(FundingOutcome::NotNeeded { skipped });
    }

    let funder = gateway.address(FUNDING_ACCOUNT)?;
    let addresses: Vec<SuiAddress> = needy.iter().map(|(_, address)| *address).collect();
    let tx = build_top_up(funder, &addresses, config.top_up_amount)?;

    let recipients: Vec<AccountIndex> = needy.into_iter().map(|(index, _)| index).collect();
    match gateway.submit_transaction(tx, FUNDING_ACCOUNT).await {
        Ok(digest) => {
            info!(?recipients, ?skipped, amount = config.top_up_amount, %digest, "fleet topped up");
            Ok(FundingOutcome::Funded {
                recipients,
                digest,
                skipped,
            })
        }
        Err(e) => {
            warn!(?recipients, error = %e, "top-up transaction failed");
            Err(e)
        }
    }
}
