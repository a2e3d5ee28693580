mod stdio;
mod tools;

use crate::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ad::DirectoryClient;
use crate::mlb::{MlbClient, MlbConfig};
use crate::pcut::PaperCutClient;
use crate::wsus::{UpdateClient, WsusConfig};

// JSON-RPC 2.0 types
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<serde_json::Value>,
    method: String,
    params: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    jsonrpc: String,
    id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// Everything the tool server keeps between requests: one client, and so one
/// session slot, per family.
pub struct ServerState {
    pub pcut: PaperCutClient,
    pub ad: DirectoryClient,
    pub wsus: UpdateClient,
    pub wsus_config: WsusConfig,
    pub mlb: MlbClient,
}

impl ServerState {
    pub fn from_env(global: &crate::Global) -> Result<Self> {
        let timeout = global.call_timeout();
        let wsus_config = WsusConfig::from_env()?;

        Ok(Self {
            pcut: PaperCutClient::http(timeout),
            ad: DirectoryClient::ldap(timeout),
            wsus: UpdateClient::powershell(
                &wsus_config.powershell,
                timeout,
                crate::wsus::local_host_name(),
            ),
            wsus_config,
            mlb: MlbClient::http(MlbConfig::from_env().endpoints, timeout),
        })
    }
}

pub async fn run(global: crate::Global) -> Result<()> {
    let mut state = ServerState::from_env(&global)?;
    stdio::run_stdio(&mut state, global).await
}

/// Handles one request line; notifications get no response.
pub async fn handle_request(
    state: &mut ServerState,
    request_str: &str,
    global: &crate::Global,
) -> Option<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_str(request_str) {
        Ok(req) => req,
        Err(e) => {
            return Some(JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                id: None,
                result: None,
                error: Some(JsonRpcError::new(PARSE_ERROR, format!("Parse error: {e}"))),
            });
        }
    };

    if request.id.is_none() && request.method.starts_with("notifications/") {
        log::debug!("notification {}", request.method);
        return None;
    }

    let result = match request.method.as_str() {
        "initialize" => tools::handle_initialize(),
        "tools/list" => tools::handle_tools_list(),
        "tools/call" => tools::handle_tools_call(state, request.params, global).await,
        method => Err(JsonRpcError::new(
            METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        )),
    };

    Some(match result {
        Ok(value) => JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id: request.id,
            result: Some(value),
            error: None,
        },
        Err(error) => JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id: request.id,
            result: None,
            error: Some(error),
        },
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::ad::transport::mock::MockDirectory;
    use crate::pcut::transport::mock::MockTransport;
    use admintools_core::rpc::Value;
    use serde_json::json;

    fn global() -> crate::Global {
        crate::Global {
            verbose: false,
            timeout: 5,
        }
    }

    fn state(pcut: &MockTransport) -> ServerState {
        testing::state(pcut, &MockDirectory::new(|_| Ok(vec![])))
    }

    fn pcut_server() -> MockTransport {
        MockTransport::new(|call| match call.method.as_str() {
            "api.getTotalUsers" => Ok(Value::Int(42)),
            other => Err(CallError::RemoteFault {
                operation: "xmlrpc".to_string(),
                code: 1,
                message: format!("{other} not supported"),
            }),
        })
    }

    async fn call(state: &mut ServerState, request: serde_json::Value) -> serde_json::Value {
        let response = handle_request(state, &request.to_string(), &global())
            .await
            .expect("a response");
        serde_json::to_value(response).unwrap()
    }

    fn tool_call(id: i64, name: &str, arguments: serde_json::Value) -> serde_json::Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        })
    }

    #[tokio::test]
    async fn test_parse_error() {
        let mut state = state(&pcut_server());
        let response = handle_request(&mut state, "{not json", &global()).await.unwrap();
        assert_eq!(response.error.unwrap().code, PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let mut state = state(&pcut_server());
        let response = call(
            &mut state,
            json!({ "jsonrpc": "2.0", "id": 1, "method": "resources/list" }),
        )
        .await;
        assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let mut state = state(&pcut_server());
        let response = handle_request(
            &mut state,
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            &global(),
        )
        .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_initialize_and_list() {
        let mut state = state(&pcut_server());
        let response = call(
            &mut state,
            json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize" }),
        )
        .await;
        assert_eq!(response["result"]["serverInfo"]["name"], "admintools");

        let response = call(
            &mut state,
            json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }),
        )
        .await;
        let names: Vec<&str> = response["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t["name"].as_str())
            .collect();
        for expected in ["pcut_connect", "ad_group_members", "wsus_install", "mlb_pitcher"] {
            assert!(names.contains(&expected), "{expected}");
        }
    }

    #[tokio::test]
    async fn test_session_persists_between_calls() {
        let pcut = pcut_server();
        let mut state = state(&pcut);

        let response = call(&mut state, tool_call(1, "pcut_total_users", json!({}))).await;
        assert_eq!(response["error"]["code"], INTERNAL_ERROR);
        assert!(response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("not connected"));
        assert!(pcut.methods().is_empty());

        let response = call(
            &mut state,
            tool_call(2, "pcut_connect", json!({ "server": "pcut1", "auth_token": "secret" })),
        )
        .await;
        assert!(response["error"].is_null(), "{response}");

        let response = call(&mut state, tool_call(3, "pcut_total_users", json!({}))).await;
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        let record: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(record["TotalUsers"], 42);

        call(&mut state, tool_call(4, "pcut_disconnect", json!({}))).await;
        let response = call(&mut state, tool_call(5, "pcut_total_users", json!({}))).await;
        assert_eq!(response["error"]["code"], INTERNAL_ERROR);
        assert_eq!(pcut.methods(), vec!["api.getTotalUsers", "api.getTotalUsers"]);
    }

    #[tokio::test]
    async fn test_invalid_arguments_and_unknown_tool() {
        let mut state = state(&pcut_server());

        let response = call(&mut state, tool_call(1, "pcut_user_exists", json!({ "user": 1 }))).await;
        assert_eq!(response["error"]["code"], INVALID_PARAMS);

        let response = call(&mut state, tool_call(2, "pcut_print_money", json!({}))).await;
        assert_eq!(response["error"]["code"], INVALID_PARAMS);
    }
}
