use serde::Deserialize;

use admintools_core::record::CallResult;

use super::{optional, parse_args, required, setup_error, tool, tool_error, unknown_tool};
use super::{JsonRpcError, Param, ServerState, Tool};
use crate::pcut::{execute, Commands, PcutConfig};

#[derive(Debug, Default, Deserialize)]
struct ConnectArgs {
    server: Option<String>,
    port: Option<u16>,
    auth_token: Option<String>,
}

const USERNAME: Param = required("username", "string", "User account name");
const ACCOUNT: Param = required("account", "string", "Shared account name");
const COMMENT: Param = optional("comment", "string", "Comment recorded with the transaction");
const ADJUSTMENT: Param = required("adjustment", "number", "Amount to add; negative to deduct");

fn paged(name: &str, description: &str) -> Tool {
    tool(
        name,
        description,
        &[
            optional("offset", "integer", "Index of the first entry (default 0)"),
            optional("limit", "integer", "Maximum number of entries (default 1000)"),
        ],
    )
}

pub fn tools() -> Vec<Tool> {
    vec![
        tool(
            "pcut_connect",
            "Connect to a PaperCut server; arguments override PCUT_SERVER, PCUT_PORT and PCUT_AUTH_TOKEN",
            &[
                optional("server", "string", "Application server host"),
                optional("port", "integer", "XML-RPC port (default 9191)"),
                optional("auth_token", "string", "Web services auth token"),
            ],
        ),
        tool("pcut_disconnect", "Forget the PaperCut session", &[]),
        tool("pcut_total_users", "Number of user accounts", &[]),
        paged("pcut_list_users", "List user account names"),
        paged("pcut_list_groups", "List user group names"),
        paged("pcut_list_printers", "List printers as server and printer name"),
        paged("pcut_list_shared_accounts", "List shared account names"),
        tool("pcut_user_exists", "Check whether a user account exists", &[USERNAME]),
        tool("pcut_user_groups", "Groups a user belongs to", &[USERNAME]),
        tool(
            "pcut_get_user_property",
            "Read one user property",
            &[
                USERNAME,
                required("property", "string", "Property name, e.g. email or full-name"),
            ],
        ),
        tool(
            "pcut_get_user_properties",
            "Read several user properties at once",
            &[
                USERNAME,
                optional("properties", "array", "Property names; all readable ones when omitted"),
            ],
        ),
        tool(
            "pcut_set_user_property",
            "Change one user property",
            &[
                USERNAME,
                required(
                    "property",
                    "string",
                    "card-number, card-pin, department, email, full-name, notes or office",
                ),
                required("value", "string", "New value"),
            ],
        ),
        tool("pcut_get_user_balance", "Read a user's balance", &[USERNAME]),
        tool(
            "pcut_set_user_balance",
            "Overwrite a user's balance",
            &[
                USERNAME,
                required("balance", "number", "New balance"),
                COMMENT,
            ],
        ),
        tool(
            "pcut_adjust_user_balance",
            "Add to or subtract from a user's balance",
            &[USERNAME, ADJUSTMENT, COMMENT],
        ),
        tool(
            "pcut_adjust_group_balance",
            "Adjust the balance of every member of a group",
            &[
                required("group", "string", "Group name"),
                ADJUSTMENT,
                COMMENT,
            ],
        ),
        tool(
            "pcut_rename_user",
            "Rename a user account",
            &[
                required("current", "string", "Current account name"),
                required("new", "string", "New account name"),
            ],
        ),
        tool(
            "pcut_get_shared_account_property",
            "Read one shared account property",
            &[
                ACCOUNT,
                required("property", "string", "Property name, e.g. balance or pin"),
            ],
        ),
        tool(
            "pcut_set_shared_account_property",
            "Change one shared account property",
            &[
                ACCOUNT,
                required("property", "string", "Property name"),
                required("value", "string", "New value"),
            ],
        ),
        tool(
            "pcut_get_shared_account_balance",
            "Read a shared account's balance",
            &[ACCOUNT],
        ),
        tool(
            "pcut_adjust_shared_account_balance",
            "Adjust a shared account's balance",
            &[ACCOUNT, ADJUSTMENT, COMMENT],
        ),
        tool(
            "pcut_get_printer_property",
            "Read one printer property",
            &[
                required("server", "string", "Print server name"),
                required("printer", "string", "Printer name"),
                required(
                    "property",
                    "string",
                    "cost-model, disabled, print-stats.job-count or print-stats.page-count",
                ),
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
        "pcut_connect" => {
            let args: ConnectArgs = parse_args(arguments)?;
            let config = PcutConfig::from_env()
                .map(|c| c.with_overrides(args.server, args.port, args.auth_token))
                .map_err(setup_error)?;
            let record = config.connect(&mut state.pcut).await.map_err(setup_error)?;
            return Ok(CallResult::Record(record));
        }
        "pcut_disconnect" => return Ok(CallResult::Record(state.pcut.disconnect())),
        "pcut_total_users" => Commands::TotalUsers,
        "pcut_list_users" => Commands::ListUsers(parse_args(arguments)?),
        "pcut_list_groups" => Commands::ListGroups(parse_args(arguments)?),
        "pcut_list_printers" => Commands::ListPrinters(parse_args(arguments)?),
        "pcut_list_shared_accounts" => Commands::ListSharedAccounts(parse_args(arguments)?),
        "pcut_user_exists" => Commands::UserExists(parse_args(arguments)?),
        "pcut_user_groups" => Commands::UserGroups(parse_args(arguments)?),
        "pcut_get_user_property" => Commands::GetUserProperty(parse_args(arguments)?),
        "pcut_get_user_properties" => Commands::GetUserProperties(parse_args(arguments)?),
        "pcut_set_user_property" => Commands::SetUserProperty(parse_args(arguments)?),
        "pcut_get_user_balance" => Commands::GetUserBalance(parse_args(arguments)?),
        "pcut_set_user_balance" => Commands::SetUserBalance(parse_args(arguments)?),
        "pcut_adjust_user_balance" => Commands::AdjustUserBalance(parse_args(arguments)?),
        "pcut_adjust_group_balance" => Commands::AdjustGroupBalance(parse_args(arguments)?),
        "pcut_rename_user" => Commands::RenameUser(parse_args(arguments)?),
        "pcut_get_shared_account_property" => {
            Commands::GetSharedAccountProperty(parse_args(arguments)?)
        }
        "pcut_set_shared_account_property" => {
            Commands::SetSharedAccountProperty(parse_args(arguments)?)
        }
        "pcut_get_shared_account_balance" => {
            Commands::GetSharedAccountBalance(parse_args(arguments)?)
        }
        "pcut_adjust_shared_account_balance" => {
            Commands::AdjustSharedAccountBalance(parse_args(arguments)?)
        }
        "pcut_get_printer_property" => Commands::GetPrinterProperty(parse_args(arguments)?),
        other => return Err(unknown_tool(other)),
    };

    execute(&state.pcut, command).await.map_err(tool_error)
}
