//! Ledger transport over JSON-RPC, with submissions going through a relayer.
//!
//! Reads (`getAccountInfo`, `getMinimumBalanceForRentExemption`,
//! `getProgramAccounts`) hit the RPC node directly. Transactions are posted
//! unsigned to the relayer, which signs as fee payer, forwards them, and
//! answers once the requested commitment level is reached.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use light_pool_lib::ledger::LedgerInstruction;
use light_pool_lib::{CommitmentLevel, Ledger, PoolError, Pubkey, Result, Signature};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

pub struct RpcLedger {
    client: reqwest::Client,
    rpc_url: String,
    relayer_url: String,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
struct AccountInfo {
    /// `[payload, "base64"]`
    data: (String, String),
}

#[derive(Deserialize)]
struct KeyedAccount {
    pubkey: String,
    account: AccountInfo,
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    instructions: &'a [LedgerInstruction],
    signers: &'a [Pubkey],
    commitment: CommitmentLevel,
}

#[derive(Deserialize)]
struct RelayResponse {
    signature: Option<String>,
    error: Option<String>,
}

impl RpcLedger {
    pub fn new(rpc_url: impl Into<String>, relayer_url: impl Into<String>) -> Self {
        RpcLedger {
            client: reqwest::Client::new(),
            rpc_url: rpc_url.into(),
            relayer_url: relayer_url.into(),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        let response: RpcResponse<T> = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;
        if let Some(err) = response.error {
            return Err(PoolError::Submission(format!(
                "{method} failed ({}): {}",
                err.code, err.message
            )));
        }
        response
            .result
            .ok_or_else(|| PoolError::Submission(format!("{method} returned no result")))
    }
}

fn transport(err: reqwest::Error) -> PoolError {
    PoolError::Submission(err.to_string())
}

fn decode(info: &AccountInfo) -> Result<Vec<u8>> {
    BASE64
        .decode(&info.data.0)
        .map_err(|e| PoolError::Submission(format!("account data is not base64: {e}")))
}

fn commitment_name(level: CommitmentLevel) -> &'static str {
    match level {
        CommitmentLevel::Processed => "processed",
        CommitmentLevel::Confirmed => "confirmed",
        CommitmentLevel::Finalized => "finalized",
    }
}

impl Ledger for RpcLedger {
    async fn submit(
        &self,
        instructions: &[LedgerInstruction],
        signers: &[Pubkey],
        commitment: CommitmentLevel,
    ) -> Result<Signature> {
        let url = format!("{}/relayTransaction", self.relayer_url.trim_end_matches('/'));
        let request = RelayRequest {
            instructions,
            signers,
            commitment,
        };
        let response: RelayResponse = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;
        match (response.signature, response.error) {
            (Some(signature), None) => {
                debug!(%signature, instructions = instructions.len(), "relayed");
                Ok(Signature(signature))
            }
            (_, Some(err)) => Err(PoolError::Submission(err)),
            (None, None) => Err(PoolError::Submission("relayer returned no signature".into())),
        }
    }

    async fn get_account(&self, pubkey: &Pubkey) -> Result<Option<Vec<u8>>> {
        let info: WithContext<Option<AccountInfo>> = self
            .call(
                "getAccountInfo",
                json!([pubkey.to_string(), { "encoding": "base64" }]),
            )
            .await?;
        info.value.as_ref().map(decode).transpose()
    }

    async fn minimum_rent(&self, size: usize) -> Result<u64> {
        self.call("getMinimumBalanceForRentExemption", json!([size]))
            .await
    }

    async fn accounts_by_size(&self, program: &Pubkey, size: usize) -> Result<Vec<(Pubkey, Vec<u8>)>> {
        let accounts: Vec<KeyedAccount> = self
            .call(
                "getProgramAccounts",
                json!([
                    program.to_string(),
                    {
                        "encoding": "base64",
                        "commitment": commitment_name(CommitmentLevel::Confirmed),
                        "filters": [{ "dataSize": size }]
                    }
                ]),
            )
            .await?;
        accounts
            .iter()
            .map(|a| Ok((a.pubkey.parse::<Pubkey>()?, decode(&a.account)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_response_shapes() {
        let ok: RpcResponse<WithContext<Option<AccountInfo>>> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"result":{"context":{"slot":5},"value":{"data":["AQID","base64"],"owner":"11111111111111111111111111111111","lamports":1}}}"#,
        )
        .unwrap();
        let value = ok.result.unwrap().value.unwrap();
        assert_eq!(decode(&value).unwrap(), vec![1, 2, 3]);

        let missing: RpcResponse<WithContext<Option<AccountInfo>>> =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":{"context":{"slot":5},"value":null}}"#)
                .unwrap();
        assert!(missing.result.unwrap().value.is_none());

        let err: RpcResponse<u64> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"invalid params"}}"#,
        )
        .unwrap();
        assert_eq!(err.error.unwrap().code, -32602);
    }

    #[test]
    fn test_relay_request_serializes_instructions() {
        let ix = LedgerInstruction {
            program_id: Pubkey::SYSTEM,
            accounts: vec![],
            data: vec![240, 0, 1],
        };
        let payer = Pubkey([1; 32]);
        let body = serde_json::to_value(RelayRequest {
            instructions: std::slice::from_ref(&ix),
            signers: std::slice::from_ref(&payer),
            commitment: CommitmentLevel::Finalized,
        })
        .unwrap();
        assert_eq!(body["commitment"], "finalized");
        assert_eq!(body["instructions"][0]["data"], json!([240, 0, 1]));
        assert_eq!(body["signers"][0], payer.to_string());
    }
}
