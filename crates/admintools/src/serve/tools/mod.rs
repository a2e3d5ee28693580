mod ad;
mod mlb;
mod pcut;
mod wsus;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use admintools_core::error::CallError;
use admintools_core::record::CallResult;

pub use super::{JsonRpcError, ServerState, Tool, INTERNAL_ERROR, INVALID_PARAMS};

#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ServerCapabilities {
    pub tools: Option<ToolsCapability>,
}

#[derive(Debug, Serialize)]
pub struct ToolsCapability {}

#[derive(Debug, Serialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

#[derive(Debug, Serialize)]
pub struct ToolsList {
    pub tools: Vec<Tool>,
}

#[derive(Debug, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    pub arguments: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct CallToolResult {
    pub content: Vec<Content>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum Content {
    #[serde(rename = "text")]
    Text { text: String },
}

fn internal(e: impl std::fmt::Display) -> JsonRpcError {
    JsonRpcError::new(INTERNAL_ERROR, format!("Internal error: {e}"))
}

pub fn handle_initialize() -> Result<serde_json::Value, JsonRpcError> {
    let result = InitializeResult {
        protocol_version: "2024-11-05".to_string(),
        capabilities: ServerCapabilities {
            tools: Some(ToolsCapability {}),
        },
        server_info: ServerInfo {
            name: "admintools".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    };

    serde_json::to_value(result).map_err(internal)
}

pub fn handle_tools_list() -> Result<serde_json::Value, JsonRpcError> {
    let mut tools = Vec::new();
    tools.extend(ad::tools());
    tools.extend(pcut::tools());
    tools.extend(wsus::tools());
    tools.extend(mlb::tools());

    serde_json::to_value(ToolsList { tools }).map_err(internal)
}

pub async fn handle_tools_call(
    state: &mut ServerState,
    params: Option<serde_json::Value>,
    global: &crate::Global,
) -> Result<serde_json::Value, JsonRpcError> {
    let params: CallToolParams = params
        .ok_or_else(|| JsonRpcError::new(INVALID_PARAMS, "Missing params"))
        .and_then(|p| {
            serde_json::from_value(p)
                .map_err(|e| JsonRpcError::new(INVALID_PARAMS, format!("Invalid params: {e}")))
        })?;

    if global.verbose {
        anstream::eprintln!("Calling tool {}", params.name);
    }

    let name = params.name.as_str();
    let arguments = params.arguments;

    let result = match name.split_once('_').map(|(family, _)| family) {
        Some("ad") => ad::call(state, name, arguments).await,
        Some("pcut") => pcut::call(state, name, arguments).await,
        Some("wsus") => wsus::call(state, name, arguments).await,
        Some("mlb") => mlb::call(state, name, arguments).await,
        _ => Err(unknown_tool(name)),
    }?;

    text_result(&result)
}

/// Deserializes tool arguments; absent arguments read as `{}` so defaults apply.
pub fn parse_args<T: DeserializeOwned>(
    arguments: Option<serde_json::Value>,
) -> Result<T, JsonRpcError> {
    let arguments = match arguments {
        None | Some(serde_json::Value::Null) => serde_json::json!({}),
        Some(value) => value,
    };
    serde_json::from_value(arguments)
        .map_err(|e| JsonRpcError::new(INVALID_PARAMS, format!("Invalid arguments: {e}")))
}

pub fn unknown_tool(name: &str) -> JsonRpcError {
    JsonRpcError::new(INVALID_PARAMS, format!("Unknown tool: {name}"))
}

pub fn tool_error(e: CallError) -> JsonRpcError {
    JsonRpcError::new(INTERNAL_ERROR, e.to_string())
}

/// Errors from configuration, such as a connect tool with no server configured.
pub fn setup_error(e: color_eyre::eyre::Report) -> JsonRpcError {
    JsonRpcError::new(INTERNAL_ERROR, e.to_string())
}

fn text_result(result: &CallResult) -> Result<serde_json::Value, JsonRpcError> {
    let text = serde_json::to_string_pretty(result).map_err(internal)?;

    serde_json::to_value(CallToolResult {
        content: vec![Content::Text { text }],
        is_error: None,
    })
    .map_err(internal)
}

/// One input property of a tool.
pub struct Param {
    name: &'static str,
    kind: &'static str,
    description: &'static str,
    required: bool,
}

pub const fn required(name: &'static str, kind: &'static str, description: &'static str) -> Param {
    Param {
        name,
        kind,
        description,
        required: true,
    }
}

pub const fn optional(name: &'static str, kind: &'static str, description: &'static str) -> Param {
    Param {
        name,
        kind,
        description,
        required: false,
    }
}

pub fn tool(name: &str, description: &str, params: &[Param]) -> Tool {
    let mut properties = serde_json::Map::new();
    for p in params {
        let schema = match p.kind {
            "array" => serde_json::json!({
                "type": "array",
                "items": { "type": "string" },
                "description": p.description,
            }),
            kind => serde_json::json!({ "type": kind, "description": p.description }),
        };
        properties.insert(p.name.to_string(), schema);
    }

    let required: Vec<&str> = params.iter().filter(|p| p.required).map(|p| p.name).collect();

    Tool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        }),
    }
}
