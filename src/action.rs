//! Per-account state machine: what to submit next for an account's counter.

use std::fmt;

use tracing::{info, warn};

use crate::config::{FarmConfig, SPAM_MODULE};
use crate::counter::Counter;
use crate::gateway::ChainGateway;
use crate::resolver;
use crate::transaction::{MoveTarget, TransactionBuilder};
use crate::types::{AccountIndex, SuiAddress, TransactionDigest};
use crate::Result;

pub const NEW_COUNTER_FN: &str = "new_user_counter";
pub const REGISTER_COUNTER_FN: &str = "register_user_counter";
pub const INCREMENT_COUNTER_FN: &str = "increment_user_counter";

/// Where an account's most recent counter stands relative to the current epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterState {
    NoCounter,
    CurrentEpoch(Counter),
    StaleUnregistered(Counter),
    /// Opened in an earlier epoch and already registered. Whether this should
    /// increment, wait, or claim first is unsettled; today it increments.
    StaleRegistered(Counter),
}

impl CounterState {
    #[must_use]
    pub fn classify(counter: Option<Counter>, current_epoch: u64) -> Self {
        match counter {
            None => Self::NoCounter,
            Some(c) if c.epoch == current_epoch => Self::CurrentEpoch(c),
            Some(c) if !c.registered => Self::StaleUnregistered(c),
            Some(c) => Self::StaleRegistered(c),
        }
    }
}

/// The single transaction an account submits this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    CreateCounter,
    /// Register the stale counter and open a fresh one, atomically.
    RegisterThenCreate(Counter),
    IncrementCounter(Counter),
}

impl Action {
    #[must_use]
    pub fn select(state: CounterState) -> Self {
        match state {
            CounterState::NoCounter => Self::CreateCounter,
            CounterState::StaleUnregistered(counter) => Self::RegisterThenCreate(counter),
            CounterState::CurrentEpoch(counter) | CounterState::StaleRegistered(counter) => {
                Self::IncrementCounter(counter)
            }
        }
    }

    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::CreateCounter => ActionKind::CreateCounter,
            Self::RegisterThenCreate(_) => ActionKind::RegisterThenCreate,
            Self::IncrementCounter(_) => ActionKind::IncrementCounter,
        }
    }

    /// Builds the transaction for this action, sent by `sender`.
    pub fn build(&self, config: &FarmConfig, sender: SuiAddress) -> Result<TransactionBuilder> {
        let target = |function: &str| MoveTarget::new(config.package_id, SPAM_MODULE, function);

        let mut tx = TransactionBuilder::new();
        tx.set_sender(sender);
        match self {
            Self::CreateCounter => {
                let director = tx.object(config.director_id)?;
                tx.move_call(target(NEW_COUNTER_FN), vec![director])?;
            }
            Self::RegisterThenCreate(counter) => {
                let director = tx.object(config.director_id)?;
                let stale = tx.object(counter.id)?;
                tx.move_call(target(REGISTER_COUNTER_FN), vec![director, stale])?;
                tx.move_call(target(NEW_COUNTER_FN), vec![director])?;
            }
            Self::IncrementCounter(counter) => {
                let counter = tx.object(counter.id)?;
                tx.move_call(target(INCREMENT_COUNTER_FN), vec![counter])?;
            }
        }
        Ok(tx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    CreateCounter,
    RegisterThenCreate,
    IncrementCounter,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CreateCounter => "create",
            Self::RegisterThenCreate => "register+create",
            Self::IncrementCounter => "increment",
        })
    }
}

/// Resolves the account's counter, picks the action and submits it.
pub async fn advance<G: ChainGateway>(
    gateway: &G,
    config: &FarmConfig,
    account: AccountIndex,
    current_epoch: u64,
) -> Result<(ActionKind, TransactionDigest)> {
    let owner = gateway.address(account)?;
    let counter =
        resolver::resolve(gateway, owner, &config.counter_type(), None, config.max_pages).await?;

    let state = CounterState::classify(counter, current_epoch);
    if let CounterState::StaleRegistered(counter) = &state {
        warn!(
            account,
            counter = %counter.id,
            counter_epoch = counter.epoch,
            current_epoch,
            "newest counter is stale but registered; incrementing it anyway"
        );
    }

    let action = Action::select(state);
    let tx = action.build(config, owner)?;
    let digest = gateway.submit_transaction(tx, account).await?;
    info!(account, action = %action.kind(), %digest, "counter action submitted");
    Ok((action.kind(), digest))
}
