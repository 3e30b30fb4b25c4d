use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};
use url::Url;

use super::ChainGateway;
use crate::config::RpcConfig;
use crate::errors::Error;
use crate::transaction::{GasData, ObjectArg, TransactionBuilder};
use crate::types::{
    u64_from_str_or_num, AccountIndex, Coin, ObjectDigest, ObjectId, ObjectRef, OwnedObject, Page,
    SuiAddress, TransactionDigest, SUI_COIN_TYPE,
};
use crate::wallet::Keystore;
use crate::Result;

/// The protocol caps gas payment at 256 coins.
const MAX_GAS_COINS: usize = 255;

#[derive(Debug, Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct SuiObjectResponse {
    data: Option<SuiObjectData>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuiObjectData {
    object_id: ObjectId,
    #[serde(deserialize_with = "u64_from_str_or_num")]
    version: u64,
    digest: ObjectDigest,
    #[serde(rename = "type")]
    type_: Option<String>,
    owner: Option<Owner>,
    content: Option<MoveContent>,
}

impl SuiObjectData {
    fn object_ref(&self) -> ObjectRef {
        ObjectRef {
            object_id: self.object_id,
            version: self.version,
            digest: self.digest,
        }
    }
}

#[derive(Debug, Deserialize)]
enum Owner {
    AddressOwner(SuiAddress),
    ObjectOwner(SuiAddress),
    Shared {
        #[serde(deserialize_with = "u64_from_str_or_num")]
        initial_shared_version: u64,
    },
    Immutable,
}

#[derive(Debug, Deserialize)]
struct MoveContent {
    #[serde(default)]
    fields: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceResponse {
    #[serde(deserialize_with = "u64_from_str_or_num")]
    total_balance: u64,
}

#[derive(Debug, Deserialize)]
struct SystemState {
    #[serde(deserialize_with = "u64_from_str_or_num")]
    epoch: u64,
}

#[derive(Debug, Deserialize)]
struct GasPrice(#[serde(deserialize_with = "u64_from_str_or_num")] u64);

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    digest: String,
    effects: Option<Effects>,
}

#[derive(Debug, Deserialize)]
struct Effects {
    status: ExecutionStatus,
}

#[derive(Debug, Deserialize)]
struct ExecutionStatus {
    status: String,
    error: Option<String>,
}

/// [`ChainGateway`] over a fullnode's JSON-RPC endpoint, signing locally.
#[derive(Debug)]
pub struct RpcGateway {
    http: Client,
    config: RpcConfig,
    keystore: Keystore,
    next_id: AtomicU64,
}

impl RpcGateway {
    pub fn new(config: RpcConfig, keystore: Keystore) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            config,
            keystore,
            next_id: AtomicU64::new(1),
        })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.config.url
    }

    /// One JSON-RPC round trip, bounded by the configured request timeout.
    async fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!(method, id, "rpc request");

        let started = Instant::now();
        match tokio::time::timeout(self.config.request_timeout, self.send(method, &body)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                method: method.to_owned(),
                elapsed_ms: started.elapsed().as_millis(),
            }),
        }
    }

    async fn send<R: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<R> {
        let response = self
            .http
            .post(self.config.url.clone())
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status_code: status,
                method: Method::POST,
                path: format!("{} ({method})", self.config.url.path()),
                message,
            });
        }

        let envelope: RpcResponse<R> = response.json().await?;
        match (envelope.result, envelope.error) {
            (_, Some(error)) => Err(Error::Rpc {
                code: error.code,
                message: error.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(Error::Validation(format!(
                "{method} returned neither result nor error"
            ))),
        }
    }

    async fn reference_gas_price(&self) -> Result<u64> {
        let GasPrice(price) = self.call("suix_getReferenceGasPrice", json!([])).await?;
        Ok(price)
    }

    /// Looks up ownership of every object input so it can be passed as an
    /// owned reference or a shared object.
    async fn resolve_objects(&self, ids: Vec<ObjectId>) -> Result<HashMap<ObjectId, ObjectArg>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let responses: Vec<SuiObjectResponse> = self
            .call("sui_multiGetObjects", json!([ids, { "showOwner": true }]))
            .await?;
        if responses.len() != ids.len() {
            return Err(Error::Validation(format!(
                "asked for {} objects, node returned {}",
                ids.len(),
                responses.len()
            )));
        }

        ids.into_iter()
            .zip(responses)
            .map(|(id, response)| {
                let data = response.data.ok_or_else(|| {
                    let reason = response
                        .error
                        .map_or_else(|| "no data".to_owned(), |e| e.to_string());
                    Error::ObjectUnavailable(id, reason)
                })?;
                let arg = match data.owner {
                    Some(Owner::Shared {
                        initial_shared_version,
                    }) => ObjectArg::SharedObject {
                        id,
                        initial_shared_version,
                        mutable: true,
                    },
                    Some(Owner::AddressOwner(_) | Owner::ObjectOwner(_) | Owner::Immutable) => {
                        ObjectArg::ImmOrOwnedObject(data.object_ref())
                    }
                    None => return Err(Error::ObjectUnavailable(id, "owner not reported".to_owned())),
                };
                Ok((id, arg))
            })
            .collect()
    }

    /// Every SUI coin of `owner` not already used as an input, capped at the
    /// protocol limit. The node merges them into the gas coin.
    async fn gas_payment(
        &self,
        owner: SuiAddress,
        inputs: &HashMap<ObjectId, ObjectArg>,
    ) -> Result<Vec<ObjectRef>> {
        let mut payment = Vec::new();
        let mut cursor = None;
        for _ in 0..self.config.max_pages {
            let page = self.get_coins(owner, SUI_COIN_TYPE, cursor.take()).await?;
            payment.extend(
                page.data
                    .iter()
                    .filter(|coin| !inputs.contains_key(&coin.coin_object_id))
                    .map(Coin::object_ref),
            );
            if payment.len() >= MAX_GAS_COINS {
                payment.truncate(MAX_GAS_COINS);
                break;
            }
            match page.continuation() {
                Some(next) => cursor = Some(next.clone()),
                None => break,
            }
        }

        if payment.is_empty() {
            return Err(Error::Validation(format!("{owner} has no SUI to pay gas")));
        }
        Ok(payment)
    }
}

impl ChainGateway for RpcGateway {
    fn address(&self, index: AccountIndex) -> Result<SuiAddress> {
        self.keystore.address(index)
    }

    async fn get_owned_objects(
        &self,
        owner: SuiAddress,
        struct_type: &str,
        cursor: Option<String>,
    ) -> Result<Page<OwnedObject>> {
        let query = json!({
            "filter": { "StructType": struct_type },
            "options": { "showType": true, "showContent": true },
        });
        let page: Page<SuiObjectResponse> = self
            .call(
                "suix_getOwnedObjects",
                json!([owner, query, cursor, self.config.page_limit]),
            )
            .await?;

        let data = page
            .data
            .into_iter()
            .filter_map(|response| match response.data {
                Some(data) => Some(OwnedObject {
                    object_ref: data.object_ref(),
                    type_: data.type_.unwrap_or_default(),
                    fields: data.content.map(|c| c.fields).unwrap_or_default(),
                }),
                None => {
                    debug!(error = ?response.error, "skipping unreadable owned object");
                    None
                }
            })
            .collect();

        Ok(Page {
            data,
            next_cursor: page.next_cursor,
            has_next_page: page.has_next_page,
        })
    }

    async fn get_balance(&self, owner: SuiAddress, coin_type: &str) -> Result<u64> {
        let balance: BalanceResponse = self
            .call("suix_getBalance", json!([owner, coin_type]))
            .await?;
        Ok(balance.total_balance)
    }

    async fn latest_epoch(&self) -> Result<u64> {
        let state: SystemState = self.call("suix_getLatestSuiSystemState", json!([])).await?;
        Ok(state.epoch)
    }

    async fn get_coins(
        &self,
        owner: SuiAddress,
        coin_type: &str,
        cursor: Option<String>,
    ) -> Result<Page<Coin>> {
        self.call(
            "suix_getCoins",
            json!([owner, coin_type, cursor, self.config.page_limit]),
        )
        .await
    }

    async fn submit_transaction(
        &self,
        tx: TransactionBuilder,
        signer: AccountIndex,
    ) -> Result<TransactionDigest> {
        let account = self.keystore.account(signer)?;
        let sender = account.address();
        if tx.sender() != Some(sender) {
            return Err(Error::Validation(format!(
                "transaction sender {:?} is not account {signer} ({sender})",
                tx.sender()
            )));
        }

        let objects = self.resolve_objects(tx.object_ids().collect()).await?;
        let price = self.reference_gas_price().await?;
        let payment = self.gas_payment(sender, &objects).await?;

        let data = tx.finish(
            GasData {
                payment,
                owner: sender,
                price,
                budget: self.config.gas_budget,
            },
            |id| {
                objects
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| Error::ObjectUnavailable(id, "not resolved".to_owned()))
            },
        )?;
        let tx_bytes = data.to_bytes()?;
        let signature = account.sign_transaction(&tx_bytes);

        let response: ExecuteResponse = self
            .call(
                "sui_executeTransactionBlock",
                json!([
                    B64.encode(&tx_bytes),
                    [signature],
                    { "showEffects": true },
                    "WaitForLocalExecution",
                ]),
            )
            .await?;

        match response.effects {
            Some(effects) if effects.status.status != "success" => Err(Error::TransactionFailed {
                digest: response.digest,
                reason: effects
                    .status
                    .error
                    .unwrap_or_else(|| effects.status.status.clone()),
            }),
            _ => {
                debug!(signer, digest = %response.digest, "transaction executed");
                Ok(response.digest)
            }
        }
    }
}
