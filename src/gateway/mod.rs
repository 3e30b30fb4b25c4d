//! The seam between the farming logic and the chain.
//!
//! Everything above this module talks to the chain only through
//! [`ChainGateway`]; [`rpc::RpcGateway`] is the JSON-RPC implementation used
//! by the binary.

use std::future::Future;

use crate::transaction::TransactionBuilder;
use crate::types::{AccountIndex, Coin, OwnedObject, Page, SuiAddress, TransactionDigest};
use crate::Result;

pub mod rpc;

pub use rpc::RpcGateway;

/// Chain reads plus signed submission, with accounts named by derivation index.
pub trait ChainGateway {
    /// Address of the account at `index`.
    fn address(&self, index: AccountIndex) -> Result<SuiAddress>;

    /// One page of objects owned by `owner` whose struct type is `struct_type`.
    fn get_owned_objects(
        &self,
        owner: SuiAddress,
        struct_type: &str,
        cursor: Option<String>,
    ) -> impl Future<Output = Result<Page<OwnedObject>>> + Send;

    /// Total balance of `coin_type` held by `owner`, in the coin's base unit.
    fn get_balance(
        &self,
        owner: SuiAddress,
        coin_type: &str,
    ) -> impl Future<Output = Result<u64>> + Send;

    fn latest_epoch(&self) -> impl Future<Output = Result<u64>> + Send;

    fn get_coins(
        &self,
        owner: SuiAddress,
        coin_type: &str,
        cursor: Option<String>,
    ) -> impl Future<Output = Result<Page<Coin>>> + Send;

    /// Signs `tx` with the key of account `signer` and executes it.
    fn submit_transaction(
        &self,
        tx: TransactionBuilder,
        signer: AccountIndex,
    ) -> impl Future<Output = Result<TransactionDigest>> + Send;
}
