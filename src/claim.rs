//! Claims rewards for counters whose epoch has settled.

use tracing::info;

use crate::config::{FarmConfig, SPAM_MODULE};
use crate::counter::Counter;
use crate::gateway::ChainGateway;
use crate::resolver;
use crate::transaction::{MoveTarget, TransactionBuilder};
use crate::types::{AccountIndex, ObjectId, SuiAddress, TransactionDigest};
use crate::Result;

pub const CLAIM_COUNTER_FN: &str = "claim_user_counter";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// No registered counter from the claimable epoch.
    NothingToClaim,
    Claimed {
        counter: Counter,
        digest: TransactionDigest,
    },
}

/// The epoch whose counters can be claimed now, if any.
#[must_use]
pub fn claimable_epoch(current_epoch: u64, delay: u64) -> Option<u64> {
    current_epoch.checked_sub(delay)
}

/// The registered counter of `epoch` to claim. Unregistered counters are
/// rejected on chain, so they are never candidates.
#[must_use]
pub fn claimable_counter(counters: Vec<Counter>, epoch: u64) -> Option<Counter> {
    let registered = counters.into_iter().filter(|c| c.registered).collect();
    resolver::select_counter(registered, Some(epoch))
}

/// Claims `counter` and keeps the reward: merged into `merge_into` when
/// given, otherwise transferred to `owner`.
pub fn build_claim(
    config: &FarmConfig,
    owner: SuiAddress,
    counter: &Counter,
    merge_into: Option<ObjectId>,
) -> Result<TransactionBuilder> {
    let mut tx = TransactionBuilder::new();
    tx.set_sender(owner);
    let director = tx.object(config.director_id)?;
    let counter = tx.object(counter.id)?;
    let reward = tx.move_call(
        MoveTarget::new(config.package_id, SPAM_MODULE, CLAIM_COUNTER_FN),
        vec![director, counter],
    )?;

    match merge_into {
        Some(existing) => {
            let existing = tx.object(existing)?;
            tx.merge_coins(existing, vec![reward])?;
        }
        None => {
            let to = tx.pure(&owner)?;
            tx.transfer_objects(vec![reward], to)?;
        }
    }
    Ok(tx)
}

/// Claims the account's registered counter from
/// `current_epoch - claim_delay_epochs`.
pub async fn claim<G: ChainGateway>(
    gateway: &G,
    config: &FarmConfig,
    account: AccountIndex,
    current_epoch: u64,
) -> Result<ClaimOutcome> {
    let Some(target_epoch) = claimable_epoch(current_epoch, config.claim_delay_epochs) else {
        return Ok(ClaimOutcome::NothingToClaim);
    };

    let owner = gateway.address(account)?;
    let counters =
        resolver::fetch_counters(gateway, owner, &config.counter_type(), config.max_pages).await?;
    let Some(counter) = claimable_counter(counters, target_epoch) else {
        return Ok(ClaimOutcome::NothingToClaim);
    };

    let merge_into = if config.merge_rewards {
        gateway
            .get_coins(owner, &config.reward_type(), None)
            .await?
            .data
            .first()
            .map(|coin| coin.coin_object_id)
    } else {
        None
    };

    let tx = build_claim(config, owner, &counter, merge_into)?;
    let digest = gateway.submit_transaction(tx, account).await?;
    info!(
        account,
        counter = %counter.id,
        epoch = counter.epoch,
        tx_count = counter.tx_count,
        merged = merge_into.is_some(),
        %digest,
        "reward claimed"
    );
    Ok(ClaimOutcome::Claimed { counter, digest })
}
