use anyhow::{Context, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::OdooConfig;

/// Generic access to the helpdesk's object API.
#[async_trait]
pub trait HelpdeskRpc: Send + Sync {
    /// Call `method` on `model` with positional `args`. The shape of the
    /// result depends on the method: an id for `create`, a bool for
    /// `write`, a list of records for `read`.
    async fn execute_kw(&self, model: &str, method: &str, args: Vec<Value>)
    -> anyhow::Result<Value>;
}

/// Odoo external API client, speaking JSON-RPC to `{url}/jsonrpc`.
pub struct OdooClient {
    client: Client,
    endpoint: String,
    db: String,
    uid: i64,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: ExecuteKwParams<'a>,
    id: String,
}

#[derive(Debug, Serialize)]
struct ExecuteKwParams<'a> {
    service: &'static str,
    method: &'static str,
    /// (db, uid, api key, model, method, positional args)
    args: (&'a str, i64, &'a str, &'a str, &'a str, Vec<Value>),
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<JsonRpcErrorData>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorData {
    #[serde(default)]
    name: String,
    #[serde(default)]
    message: String,
}

impl OdooClient {
    pub fn new(config: &OdooConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/jsonrpc", config.url.trim_end_matches('/')),
            db: config.db.clone(),
            uid: config.uid,
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl HelpdeskRpc for OdooClient {
    #[tracing::instrument(skip(self, args))]
    async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
    ) -> anyhow::Result<Value> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: "call",
            params: ExecuteKwParams {
                service: "object",
                method: "execute_kw",
                args: (self.db.as_str(), self.uid, self.api_key.as_str(), model, method, args),
            },
            id: Uuid::new_v4().to_string(),
        };

        debug!("Odoo Request URL: {}", self.endpoint);
        debug!("Odoo Request args: {:?}", request.params.args.5);

        let body = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .context("failed to send request to Odoo")?
            .error_for_status()
            .context("error status from Odoo")?
            .text()
            .await
            .context("failed to get response body")?;

        let response: JsonRpcResponse = {
            let mut deserializer = serde_json::Deserializer::from_str(&body);
            serde_path_to_error::deserialize(&mut deserializer)
                .map_err(|e| anyhow!("failed to parse Odoo response: {}", e))?
        };

        if let Some(error) = response.error {
            let detail = error
                .data
                .map(|d| format!("{}: {}", d.name, d.message))
                .unwrap_or_default();
            return Err(anyhow!(
                "Odoo {}.{} failed ({} {}) {}",
                model,
                method,
                error.code,
                error.message,
                detail
            ));
        }

        info!("Odoo Response: {}", response.result);
        Ok(response.result)
    }
}
