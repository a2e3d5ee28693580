use admintools_core::record::CallResult;

use super::{optional, parse_args, required, tool, tool_error, unknown_tool};
use super::{JsonRpcError, Param, ServerState, Tool};
use crate::wsus::{execute, Commands};

const UPDATE_IDS: Param = required("update_ids", "array", "Update identifiers as returned by search");
const CRITERIA: Param = optional(
    "criteria",
    "string",
    "Search criteria (default IsInstalled=0 and Type='Software')",
);
const FROM_MICROSOFT: Param = optional(
    "from_microsoft",
    "boolean",
    "Search Microsoft Update instead of the configured server",
);

pub fn tools() -> Vec<Tool> {
    vec![
        tool(
            "wsus_connect",
            "Connect to a WSUS administration server; defaults to WSUS_SERVER or this machine",
            &[
                optional("server", "string", "Server as name[:port]"),
                optional("secure", "boolean", "Use a secure connection"),
            ],
        ),
        tool("wsus_search", "Search for updates", &[CRITERIA, FROM_MICROSOFT]),
        tool(
            "wsus_download",
            "Download updates that need no user interaction",
            &[UPDATE_IDS, CRITERIA, FROM_MICROSOFT],
        ),
        tool(
            "wsus_install",
            "Install downloaded updates",
            &[UPDATE_IDS, CRITERIA, FROM_MICROSOFT],
        ),
        tool(
            "wsus_history",
            "Read the update history",
            &[
                optional("start", "integer", "Index of the first entry (default 0)"),
                optional("count", "integer", "Number of entries (default 10)"),
            ],
        ),
        tool(
            "wsus_accept_eula",
            "Accept the license terms of updates",
            &[
                UPDATE_IDS,
                optional("accept", "boolean", "Accept (default true)"),
                CRITERIA,
                FROM_MICROSOFT,
            ],
        ),
    ]
}

pub async fn call(
    state: &mut ServerState,
    name: &str,
    arguments: Option<serde_json::Value>,
) -> Result<CallResult, JsonRpcError> {
    let command = match name {
        "wsus_connect" => Commands::Connect(parse_args(arguments)?),
        "wsus_search" => Commands::Search(parse_args(arguments)?),
        "wsus_download" => Commands::Download(parse_args(arguments)?),
        "wsus_install" => Commands::Install(parse_args(arguments)?),
        "wsus_history" => Commands::History(parse_args(arguments)?),
        "wsus_accept_eula" => Commands::AcceptEula(parse_args(arguments)?),
        other => return Err(unknown_tool(other)),
    };

    execute(&mut state.wsus, &state.wsus_config, command)
        .await
        .map_err(tool_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serve::INVALID_PARAMS;

    #[test]
    fn test_download_requires_update_ids() {
        let err = parse_args::<crate::wsus::UpdateIdsArgs>(Some(serde_json::json!({
            "criteria": "IsInstalled=0"
        })))
        .unwrap_err();
        assert_eq!(err.code, INVALID_PARAMS);
    }
}
