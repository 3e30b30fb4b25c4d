//! The farming loop: funding, per-account actions and claims, tick by tick.

use futures::future::join_all;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::action::{self, ActionKind};
use crate::claim::{self, ClaimOutcome};
use crate::config::FarmConfig;
use crate::errors::Error;
use crate::funding::{self, FundingOutcome};
use crate::gateway::ChainGateway;
use crate::notify::{self, Notifier};
use crate::types::{AccountIndex, TransactionDigest};
use crate::Result;

/// What happened to one account during a tick.
#[derive(Debug)]
pub struct AccountReport {
    pub account: AccountIndex,
    pub action: Result<(ActionKind, TransactionDigest)>,
    pub claim: Result<ClaimOutcome>,
}

impl AccountReport {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.action.is_ok() && self.claim.is_ok()
    }
}

#[derive(Debug)]
pub struct TickReport {
    /// The epoch the tick ran against; `Err` when it could not be read and
    /// nothing else was attempted.
    pub epoch: Result<u64>,
    pub funding: Option<Result<FundingOutcome>>,
    pub accounts: Vec<AccountReport>,
}

impl TickReport {
    fn skipped(error: Error) -> Self {
        Self {
            epoch: Err(error),
            funding: None,
            accounts: Vec::new(),
        }
    }

    #[must_use]
    pub fn actions_submitted(&self) -> usize {
        self.accounts.iter().filter(|a| a.action.is_ok()).count()
    }

    #[must_use]
    pub fn claims(&self) -> usize {
        self.accounts
            .iter()
            .filter(|a| matches!(a.claim, Ok(ClaimOutcome::Claimed { .. })))
            .count()
    }

    #[must_use]
    pub fn failures(&self) -> usize {
        let accounts = self
            .accounts
            .iter()
            .map(|a| usize::from(a.action.is_err()) + usize::from(a.claim.is_err()))
            .sum::<usize>();
        let funding = usize::from(matches!(self.funding, Some(Err(_))));
        let epoch = usize::from(self.epoch.is_err());
        accounts + funding + epoch
    }

    fn log(&self, tick: u64) {
        let (funded, unread_balances) = match &self.funding {
            Some(Ok(outcome @ FundingOutcome::Funded { recipients, .. })) => {
                (recipients.len(), outcome.skipped().len())
            }
            Some(Ok(outcome)) => (0, outcome.skipped().len()),
            _ => (0, 0),
        };
        match &self.epoch {
            Ok(epoch) => info!(
                tick,
                epoch,
                accounts = self.accounts.len(),
                actions = self.actions_submitted(),
                claims = self.claims(),
                funded,
                unread_balances,
                failures = self.failures(),
                "tick complete"
            ),
            Err(e) => error!(tick, error = %e, "tick skipped: epoch unavailable"),
        }
    }
}

/// Owns the fleet, the gateway and the policy, and drives the loop.
pub struct Farmer<G> {
    gateway: G,
    config: FarmConfig,
    fleet: Vec<AccountIndex>,
    notifier: Option<Notifier>,
}

impl<G: ChainGateway> Farmer<G> {
    pub fn new(gateway: G, config: FarmConfig) -> Self {
        let fleet = config.fleet().collect();
        Self {
            gateway,
            config,
            fleet,
            notifier: None,
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Option<Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn fleet(&self) -> &[AccountIndex] {
        &self.fleet
    }

    /// One full pass over the fleet.
    ///
    /// Funding and every account run concurrently and the tick returns only
    /// once all of them have finished. A failing account is recorded in the
    /// report and never cancels the others.
    pub async fn tick(&self) -> TickReport {
        let retry = &self.config.retry;
        let epoch = match retry.run("epoch", || self.gateway.latest_epoch()).await {
            Ok(epoch) => epoch,
            Err(e) => return TickReport::skipped(e),
        };

        let funding = funding::fund(&self.gateway, &self.config, &self.fleet);
        let accounts = join_all(
            self.fleet
                .iter()
                .map(|&account| self.work_account(account, epoch)),
        );
        let (funding, accounts) = tokio::join!(funding, accounts);

        if let (Err(e), Some(notifier)) = (&funding, &self.notifier) {
            notifier.send_alert(notify::format_funding_failure(&e.to_string()));
        }

        TickReport {
            epoch: Ok(epoch),
            funding: Some(funding),
            accounts,
        }
    }

    /// The account's action, then its claim. Both pay gas from the same
    /// coins, so they must not be in flight together.
    async fn work_account(&self, account: AccountIndex, epoch: u64) -> AccountReport {
        let retry = &self.config.retry;

        let action = retry
            .run("action", || {
                action::advance(&self.gateway, &self.config, account, epoch)
            })
            .await;
        if let Err(e) = &action {
            warn!(account, error = %e, "counter action failed");
        }

        let claim = retry
            .run("claim", || claim::claim(&self.gateway, &self.config, account, epoch))
            .await;
        match &claim {
            Ok(ClaimOutcome::Claimed { counter, digest }) => {
                if let Some(notifier) = &self.notifier {
                    notifier.send_alert(notify::format_claim_alert(
                        account,
                        counter.epoch,
                        counter.tx_count,
                        digest,
                    ));
                }
            }
            Ok(ClaimOutcome::NothingToClaim) => {}
            Err(e) => warn!(account, error = %e, "claim failed"),
        }

        AccountReport {
            account,
            action,
            claim,
        }
    }

    /// Ticks until `shutdown` becomes `true` or its sender goes away.
    ///
    /// The signal is only observed between ticks; submitted work always
    /// runs to completion.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        if self.fleet.is_empty() {
            warn!("no fleet accounts configured, nothing to farm");
            return;
        }
        info!(accounts = self.fleet.len(), "farming started");

        let mut tick = 0_u64;
        while !*shutdown.borrow() {
            tick += 1;
            self.tick().await.log(tick);

            if self.config.tick_interval.is_zero() {
                continue;
            }
            tokio::select! {
                () = tokio::time::sleep(self.config.tick_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!(ticks = tick, "farming stopped");
    }
}
