//! Reduces every counter an account owns to the one that matters.

use tracing::warn;

use crate::counter::Counter;
use crate::errors::Error;
use crate::gateway::ChainGateway;
use crate::types::SuiAddress;
use crate::Result;

/// Reads all counters owned by `owner`, following cursors for at most
/// `max_pages` pages.
pub async fn fetch_counters<G: ChainGateway>(
    gateway: &G,
    owner: SuiAddress,
    counter_type: &str,
    max_pages: usize,
) -> Result<Vec<Counter>> {
    let mut counters = Vec::new();
    let mut cursor: Option<String> = None;

    for _ in 0..max_pages {
        let page = gateway
            .get_owned_objects(owner, counter_type, cursor.clone())
            .await?;

        for object in &page.data {
            match Counter::try_from(object) {
                Ok(counter) => counters.push(counter),
                Err(e) => warn!(%owner, object = %object.object_ref.object_id, error = %e, "ignoring malformed counter"),
            }
        }

        match page.continuation() {
            None => return Ok(counters),
            Some(next) if cursor.as_ref() == Some(next) => {
                return Err(Error::Pagination(format!(
                    "owned objects of {owner} repeated cursor {next}"
                )));
            }
            Some(next) => cursor = Some(next.clone()),
        }
    }

    Err(Error::Pagination(format!(
        "owned objects of {owner} exceeded {max_pages} pages"
    )))
}

/// Picks the relevant counter.
///
/// With `epoch_filter`, the counter of that epoch with the highest `tx_count`.
/// Without, the counter of the most recent epoch. Ties go to the last counter.
#[must_use]
pub fn select_counter(counters: Vec<Counter>, epoch_filter: Option<u64>) -> Option<Counter> {
    match epoch_filter {
        Some(epoch) => counters
            .into_iter()
            .filter(|c| c.epoch == epoch)
            .max_by_key(|c| c.tx_count),
        None => counters.into_iter().max_by_key(|c| (c.epoch, c.tx_count)),
    }
}

/// Fetches and selects in one step. Gateway errors propagate untouched.
pub async fn resolve<G: ChainGateway>(
    gateway: &G,
    owner: SuiAddress,
    counter_type: &str,
    epoch_filter: Option<u64>,
    max_pages: usize,
) -> Result<Option<Counter>> {
    let counters = fetch_counters(gateway, owner, counter_type, max_pages).await?;
    Ok(select_counter(counters, epoch_filter))
}
