#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::json;
use spam_farmer::config::{FarmConfig, FarmConfigBuilder};
use spam_farmer::counter::Counter;
use spam_farmer::errors::Error;
use spam_farmer::gateway::ChainGateway;
use spam_farmer::retry::RetryPolicy;
use spam_farmer::transaction::TransactionBuilder;
use spam_farmer::types::{
    AccountIndex, Coin, ObjectDigest, ObjectId, ObjectRef, OwnedObject, Page, SuiAddress,
    TransactionDigest, SUI_COIN_TYPE,
};
use spam_farmer::Result;

pub const MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

pub fn address_of(index: AccountIndex) -> SuiAddress {
    let mut bytes = [0xAA; 32];
    bytes[28..].copy_from_slice(&index.to_be_bytes());
    SuiAddress::new(bytes)
}

fn index_of(address: SuiAddress) -> Option<AccountIndex> {
    let bytes = address.as_bytes();
    if bytes[..28].iter().all(|b| *b == 0xAA) {
        let mut index = [0; 4];
        index.copy_from_slice(&bytes[28..]);
        Some(AccountIndex::from_be_bytes(index))
    } else {
        None
    }
}

pub fn object_id(tag: u32) -> ObjectId {
    let mut bytes = [0x0C; 32];
    bytes[28..].copy_from_slice(&tag.to_be_bytes());
    ObjectId::new(bytes)
}

pub fn counter(tag: u32, epoch: u64, tx_count: u64, registered: bool) -> Counter {
    Counter {
        id: object_id(tag),
        tx_count,
        epoch,
        registered,
    }
}

/// Fast retries and the default spam package, for `count` fleet accounts.
pub fn farm_config(count: u32) -> Result<FarmConfig> {
    FarmConfigBuilder::default()
        .account_count(count)
        .retry(RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        })
        .max_pages(10)
        .build()
}

#[derive(Debug, Clone)]
pub struct Submitted {
    pub signer: AccountIndex,
    pub tx: TransactionBuilder,
}

#[derive(Default)]
struct State {
    epoch: Option<u64>,
    counters: HashMap<AccountIndex, Vec<Counter>>,
    balances: HashMap<AccountIndex, u64>,
    reward_coins: HashMap<AccountIndex, Vec<ObjectId>>,
    submitted: Vec<Submitted>,
    rejected: HashSet<AccountIndex>,
    unreadable_balances: HashSet<AccountIndex>,
    transient_failures: HashMap<AccountIndex, u32>,
    page_size: usize,
    endless_pages: bool,
}

/// In-memory chain. Submissions are recorded, not applied.
pub struct MockChain {
    state: Mutex<State>,
}

impl MockChain {
    pub fn new(epoch: u64) -> Self {
        Self {
            state: Mutex::new(State {
                epoch: Some(epoch),
                page_size: 50,
                ..State::default()
            }),
        }
    }

    /// Every account holds `balance` MIST.
    pub fn with_balance_everywhere(self, count: u32, balance: u64) -> Self {
        for index in 0..=count {
            self.set_balance(index, balance);
        }
        self
    }

    pub fn set_balance(&self, account: AccountIndex, balance: u64) {
        self.state.lock().unwrap().balances.insert(account, balance);
    }

    pub fn add_counter(&self, account: AccountIndex, counter: Counter) {
        self.state
            .lock()
            .unwrap()
            .counters
            .entry(account)
            .or_default()
            .push(counter);
    }

    pub fn add_reward_coin(&self, account: AccountIndex, coin: ObjectId) {
        self.state
            .lock()
            .unwrap()
            .reward_coins
            .entry(account)
            .or_default()
            .push(coin);
    }

    pub fn set_page_size(&self, page_size: usize) {
        self.state.lock().unwrap().page_size = page_size;
    }

    /// Owned-object queries always claim another page behind the same cursor.
    pub fn break_pagination(&self) {
        self.state.lock().unwrap().endless_pages = true;
    }

    pub fn make_epoch_unavailable(&self) {
        self.state.lock().unwrap().epoch = None;
    }

    /// Balance queries for `account` fail with a non-retryable RPC error.
    pub fn fail_balance_reads_from(&self, account: AccountIndex) {
        self.state.lock().unwrap().unreadable_balances.insert(account);
    }

    /// Submissions signed by `account` fail on chain.
    pub fn reject_submissions_from(&self, account: AccountIndex) {
        self.state.lock().unwrap().rejected.insert(account);
    }

    /// The next `times` submissions signed by `account` time out.
    pub fn time_out_submissions_from(&self, account: AccountIndex, times: u32) {
        self.state
            .lock()
            .unwrap()
            .transient_failures
            .insert(account, times);
    }

    pub fn submitted(&self) -> Vec<Submitted> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn submitted_by(&self, signer: AccountIndex) -> Vec<TransactionBuilder> {
        self.submitted()
            .into_iter()
            .filter(|s| s.signer == signer)
            .map(|s| s.tx)
            .collect()
    }

    fn owner_index(address: SuiAddress) -> Result<AccountIndex> {
        index_of(address).ok_or_else(|| Error::Validation(format!("unknown owner {address}")))
    }
}

fn owned_counter(counter: &Counter) -> OwnedObject {
    OwnedObject {
        object_ref: ObjectRef {
            object_id: counter.id,
            version: 1,
            digest: ObjectDigest::new([1; 32]),
        },
        type_: "UserCounter".to_owned(),
        fields: json!({
            "id": { "id": counter.id.to_string() },
            "tx_count": counter.tx_count.to_string(),
            "epoch": counter.epoch.to_string(),
            "registered": counter.registered,
        }),
    }
}

impl ChainGateway for MockChain {
    fn address(&self, index: AccountIndex) -> Result<SuiAddress> {
        Ok(address_of(index))
    }

    async fn get_owned_objects(
        &self,
        owner: SuiAddress,
        _struct_type: &str,
        cursor: Option<String>,
    ) -> Result<Page<OwnedObject>> {
        let index = Self::owner_index(owner)?;
        let state = self.state.lock().unwrap();

        if state.endless_pages {
            return Ok(Page {
                data: Vec::new(),
                next_cursor: Some("stuck".to_owned()),
                has_next_page: true,
            });
        }

        let all = state.counters.get(&index).cloned().unwrap_or_default();
        let start: usize = cursor.map_or(0, |c| c.parse().unwrap());
        let end = (start + state.page_size).min(all.len());
        let has_next_page = end < all.len();
        Ok(Page {
            data: all[start..end].iter().map(owned_counter).collect(),
            next_cursor: has_next_page.then(|| end.to_string()),
            has_next_page,
        })
    }

    async fn get_balance(&self, owner: SuiAddress, coin_type: &str) -> Result<u64> {
        assert_eq!(coin_type, SUI_COIN_TYPE);
        let index = Self::owner_index(owner)?;
        let state = self.state.lock().unwrap();
        if state.unreadable_balances.contains(&index) {
            return Err(Error::Rpc {
                code: -32602,
                message: format!("balance of account {index} unavailable"),
            });
        }
        Ok(state.balances.get(&index).copied().unwrap_or(0))
    }

    async fn latest_epoch(&self) -> Result<u64> {
        self.state.lock().unwrap().epoch.ok_or(Error::Rpc {
            code: -32602,
            message: "epoch unavailable".to_owned(),
        })
    }

    async fn get_coins(
        &self,
        owner: SuiAddress,
        _coin_type: &str,
        _cursor: Option<String>,
    ) -> Result<Page<Coin>> {
        let index = Self::owner_index(owner)?;
        let coins = self
            .state
            .lock()
            .unwrap()
            .reward_coins
            .get(&index)
            .cloned()
            .unwrap_or_default();
        Ok(Page {
            data: coins
                .into_iter()
                .map(|id| Coin {
                    coin_object_id: id,
                    version: 1,
                    digest: ObjectDigest::new([2; 32]),
                    balance: 100,
                })
                .collect(),
            next_cursor: None,
            has_next_page: false,
        })
    }

    async fn submit_transaction(
        &self,
        tx: TransactionBuilder,
        signer: AccountIndex,
    ) -> Result<TransactionDigest> {
        assert_eq!(tx.sender(), Some(address_of(signer)), "sender must match signer");
        let mut state = self.state.lock().unwrap();

        if let Some(remaining) = state.transient_failures.get_mut(&signer) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::Timeout {
                    method: "sui_executeTransactionBlock".to_owned(),
                    elapsed_ms: 1,
                });
            }
        }
        if state.rejected.contains(&signer) {
            return Err(Error::TransactionFailed {
                digest: format!("rejected-{signer}"),
                reason: "MoveAbort".to_owned(),
            });
        }

        state.submitted.push(Submitted { signer, tx });
        Ok(format!("digest-{}", state.submitted.len()))
    }
}
