use std::env;
use std::str::FromStr;
use std::time::Duration;

use derive_builder::Builder;
use url::Url;

use crate::errors::Error;
use crate::retry::RetryPolicy;
use crate::types::{AccountIndex, ObjectId};
use crate::Result;

pub const MAINNET_RPC_URL: &str = "https://fullnode.mainnet.sui.io:443";

pub const SPAM_PACKAGE_ID: &str =
    "0x30a644c3485ee9b604f52165668895092191fcaf5489a846afa7fc11cdb9b24a";
pub const SPAM_DIRECTOR_ID: &str =
    "0x71d2211afbb63a83efc9050ded5c5bb7e58882b17d872e32e632a978ab7b5700";
pub const SPAM_MODULE: &str = "spam";

/// Balance below which a fleet account gets topped up: 0.01 SUI.
pub const DEFAULT_FUNDING_THRESHOLD: u64 = 10_000_000;
/// Amount sent to each low-balance account: 1 SUI.
pub const DEFAULT_TOP_UP_AMOUNT: u64 = 1_000_000_000;
/// Counters become claimable this many epochs after they were opened.
pub const DEFAULT_CLAIM_DELAY_EPOCHS: u64 = 2;
pub const DEFAULT_MAX_PAGES: usize = 50;

/// Farming policy shared by the coordinators and the loop.
#[derive(Debug, Clone, Builder)]
#[builder(build_fn(error = "Error"))]
pub struct FarmConfig {
    #[builder(default = "SPAM_PACKAGE_ID.parse()?")]
    pub package_id: ObjectId,
    /// Shared `Director` object every `spam` entry point takes.
    #[builder(default = "SPAM_DIRECTOR_ID.parse()?")]
    pub director_id: ObjectId,
    /// Fleet accounts are `1..=account_count`; account 0 only funds.
    #[builder(default)]
    pub account_count: u32,
    #[builder(default = "DEFAULT_FUNDING_THRESHOLD")]
    pub funding_threshold: u64,
    #[builder(default = "DEFAULT_TOP_UP_AMOUNT")]
    pub top_up_amount: u64,
    #[builder(default = "DEFAULT_CLAIM_DELAY_EPOCHS")]
    pub claim_delay_epochs: u64,
    /// Upper bound on pages read by one paginated query.
    #[builder(default = "DEFAULT_MAX_PAGES")]
    pub max_pages: usize,
    #[builder(default)]
    pub retry: RetryPolicy,
    /// Pause between ticks. Zero cycles as fast as the chain answers.
    #[builder(default)]
    pub tick_interval: Duration,
    /// Merge each claimed reward into a reward coin the account already holds.
    #[builder(default)]
    pub merge_rewards: bool,
}

impl FarmConfig {
    pub fn fleet(&self) -> impl Iterator<Item = AccountIndex> {
        1..=self.account_count
    }

    #[must_use]
    pub fn counter_type(&self) -> String {
        format!("{}::{SPAM_MODULE}::UserCounter", self.package_id)
    }

    /// Inner type of the reward coin, as coin queries expect it.
    #[must_use]
    pub fn reward_type(&self) -> String {
        format!("{}::{SPAM_MODULE}::SPAM", self.package_id)
    }
}

/// Node connection and gas settings for the JSON-RPC gateway.
#[derive(Debug, Clone, Builder)]
#[builder(build_fn(error = "Error"))]
pub struct RpcConfig {
    #[builder(default = "Url::parse(MAINNET_RPC_URL)?")]
    pub url: Url,
    /// Bound on every individual RPC call.
    #[builder(default = "Duration::from_secs(30)")]
    pub request_timeout: Duration,
    #[builder(default = "10_000_000")]
    pub gas_budget: u64,
    #[builder(default = "50")]
    pub page_limit: usize,
    #[builder(default = "DEFAULT_MAX_PAGES")]
    pub max_pages: usize,
}

/// Everything the binary reads from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub farm: FarmConfig,
    pub rpc: RpcConfig,
    pub discord_webhook: Option<String>,
}

impl Settings {
    /// Reads `RPC_URL`, `ACCOUNT_AMOUNT` and the optional tuning variables.
    /// The mnemonic is read separately so it never lands in a `Debug` dump.
    pub fn from_env() -> Result<Self> {
        let mut farm = FarmConfigBuilder::default();
        farm.account_count(parse_var("ACCOUNT_AMOUNT")?.unwrap_or(0));
        if let Some(id) = parse_var("SPAM_PACKAGE_ID")? {
            farm.package_id(id);
        }
        if let Some(id) = parse_var("SPAM_DIRECTOR_ID")? {
            farm.director_id(id);
        }
        if let Some(threshold) = parse_var("FUNDING_THRESHOLD")? {
            farm.funding_threshold(threshold);
        }
        if let Some(amount) = parse_var("TOP_UP_AMOUNT")? {
            farm.top_up_amount(amount);
        }
        if let Some(pages) = parse_var("MAX_PAGES")? {
            farm.max_pages(pages);
        }
        if let Some(ms) = parse_var::<u64>("TICK_INTERVAL_MS")? {
            farm.tick_interval(Duration::from_millis(ms));
        }
        if let Some(merge) = parse_var("MERGE_REWARDS")? {
            farm.merge_rewards(merge);
        }

        let mut rpc = RpcConfigBuilder::default();
        if let Some(url) = non_empty_var("RPC_URL") {
            rpc.url(Url::parse(&url)?);
        }
        if let Some(secs) = parse_var::<u64>("REQUEST_TIMEOUT_SECS")? {
            rpc.request_timeout(Duration::from_secs(secs));
        }
        if let Some(budget) = parse_var("GAS_BUDGET")? {
            rpc.gas_budget(budget);
        }
        if let Some(pages) = parse_var("MAX_PAGES")? {
            rpc.max_pages(pages);
        }

        Ok(Self {
            farm: farm.build()?,
            rpc: rpc.build()?,
            discord_webhook: non_empty_var("DISCORD_WEBHOOK_URL"),
        })
    }
}

/// Reads the seed phrase, tolerating the quoting `.env` files often carry.
pub fn mnemonic_from_env() -> Result<String> {
    non_empty_var("MNEMONICS")
        .map(|m| m.trim().trim_matches('"').trim_matches('\'').to_owned())
        .ok_or_else(|| Error::Validation("MNEMONICS not set".to_owned()))
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    non_empty_var(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Validation(format!("{name}={raw:?}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_the_mainnet_spam_package() {
        let config = FarmConfigBuilder::default().build().unwrap();
        assert_eq!(config.package_id.to_string(), SPAM_PACKAGE_ID);
        assert_eq!(config.director_id.to_string(), SPAM_DIRECTOR_ID);
        assert_eq!(config.funding_threshold, 10_000_000);
        assert_eq!(config.top_up_amount, 1_000_000_000);
        assert_eq!(config.claim_delay_epochs, 2);
        assert_eq!(config.fleet().count(), 0);
    }

    #[test]
    fn fleet_skips_the_funding_account() {
        let config = FarmConfigBuilder::default().account_count(3).build().unwrap();
        assert_eq!(config.fleet().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn type_strings_use_the_configured_package() {
        let config = FarmConfigBuilder::default().build().unwrap();
        assert_eq!(
            config.counter_type(),
            format!("{SPAM_PACKAGE_ID}::spam::UserCounter")
        );
        assert_eq!(config.reward_type(), format!("{SPAM_PACKAGE_ID}::spam::SPAM"));
    }

    #[test]
    fn rpc_defaults_bound_each_call() {
        let rpc = RpcConfigBuilder::default().build().unwrap();
        assert_eq!(rpc.url.as_str(), "https://fullnode.mainnet.sui.io/");
        assert_eq!(rpc.request_timeout, Duration::from_secs(30));
    }
}
