//! External tool boundary
//!
//! The engine drives one shared, stateful drawing document through a single
//! call surface: `invoke(tool, args) -> result`. Nothing here assumes
//! anything about the tool's internals beyond that contract. Callers must
//! not run two execution passes concurrently against the same document; the
//! engine issues calls strictly one at a time but cannot see other
//! processes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::types::JsonMap;

/// Failure reported by a boundary implementation
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BoundaryError(pub String);

/// Minimal result contract for one tool call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    /// Success/failure indicator
    pub ok: bool,
    /// Identifiers of entities created by this call, if any
    #[serde(default)]
    pub entity_ids: Vec<String>,
    /// Full response payload as returned by the tool
    #[serde(default)]
    pub payload: Value,
}

impl ToolResult {
    /// Empty successful result (used for dry-run alias updates)
    pub fn empty() -> Self {
        Self {
            ok: true,
            entity_ids: Vec::new(),
            payload: Value::Null,
        }
    }

    /// Interpret a raw tool response.
    ///
    /// Accepts the shapes the drawing tool actually produces: an `ok`
    /// flag (absent means success), `entity_ids` as a string list, or a
    /// single `entity_id`.
    pub fn from_response(payload: Value) -> Self {
        let obj = payload.as_object();
        let ok = obj
            .and_then(|o| o.get("ok"))
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let mut entity_ids: Vec<String> = obj
            .and_then(|o| o.get("entity_ids"))
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if entity_ids.is_empty() {
            if let Some(id) = obj.and_then(|o| o.get("entity_id")).and_then(Value::as_str) {
                entity_ids.push(id.to_string());
            }
        }
        Self {
            ok,
            entity_ids,
            payload,
        }
    }
}

/// One synchronous-in-effect call against the external drawing tool
#[async_trait]
pub trait ToolBoundary: Send + Sync {
    async fn invoke(
        &self,
        tool: &str,
        args: &JsonMap,
    ) -> std::result::Result<ToolResult, BoundaryError>;
}

/// HTTP boundary for an MCP-style drawing-tool server
pub struct McpHttpBoundary {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl McpHttpBoundary {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Build a boundary from environment variables
    ///
    /// Required: DRAFTPLAN_MCP_URL
    /// Optional: DRAFTPLAN_MCP_TOKEN (sent as a bearer token)
    pub fn from_env() -> std::result::Result<Self, BoundaryError> {
        let endpoint = std::env::var("DRAFTPLAN_MCP_URL")
            .map_err(|_| BoundaryError("DRAFTPLAN_MCP_URL not set".into()))?;
        let mut boundary = Self::new(endpoint);
        if let Ok(token) = std::env::var("DRAFTPLAN_MCP_TOKEN") {
            boundary.token = Some(token);
        }
        Ok(boundary)
    }
}

#[derive(Serialize)]
struct InvokeRequest<'a> {
    tool: &'a str,
    args: &'a JsonMap,
}

#[async_trait]
impl ToolBoundary for McpHttpBoundary {
    async fn invoke(
        &self,
        tool: &str,
        args: &JsonMap,
    ) -> std::result::Result<ToolResult, BoundaryError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&InvokeRequest { tool, args });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BoundaryError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BoundaryError(format!("HTTP {status}: {body}")));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| BoundaryError(e.to_string()))?;
        Ok(ToolResult::from_response(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_response_entity_ids() {
        let result = ToolResult::from_response(json!({"entity_ids": ["E1", "E2"]}));
        assert!(result.ok);
        assert_eq!(result.entity_ids, vec!["E1", "E2"]);
    }

    #[test]
    fn test_from_response_single_entity_id() {
        let result = ToolResult::from_response(json!({"entity_id": "E9"}));
        assert_eq!(result.entity_ids, vec!["E9"]);
    }

    #[test]
    fn test_from_response_failure_flag() {
        let result = ToolResult::from_response(json!({"ok": false, "error": "bad layer"}));
        assert!(!result.ok);
        assert!(result.entity_ids.is_empty());
    }

    #[test]
    fn test_from_response_bare_ack() {
        let result = ToolResult::from_response(json!({"ok": true}));
        assert!(result.ok);
        assert!(result.entity_ids.is_empty());
    }

    #[test]
    fn test_from_env_missing_url() {
        if std::env::var("DRAFTPLAN_MCP_URL").is_err() {
            assert!(McpHttpBoundary::from_env().is_err());
        }
    }
}
