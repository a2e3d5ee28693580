use serde::Deserialize;

use admintools_core::record::CallResult;

use super::{optional, parse_args, required, setup_error, tool, tool_error, unknown_tool};
use super::{JsonRpcError, ServerState, Tool};
use crate::ad::{execute, AdConfig, Commands};

#[derive(Debug, Default, Deserialize)]
struct ConnectArgs {
    server: Option<String>,
    bind_dn: Option<String>,
    bind_password: Option<String>,
}

pub fn tools() -> Vec<Tool> {
    vec![
        tool(
            "ad_connect",
            "Bind to a directory server; arguments override AD_SERVER, AD_BIND_DN and AD_BIND_PASSWORD",
            &[
                optional("server", "string", "ldap://host[:port], ldaps://host[:port] or host"),
                optional("bind_dn", "string", "DN to bind as; anonymous when unset"),
                optional("bind_password", "string", "Password for bind_dn"),
            ],
        ),
        tool("ad_disconnect", "Unbind from the directory", &[]),
        tool(
            "ad_search",
            "Search for directory objects",
            &[
                optional(
                    "path",
                    "string",
                    "Search base: LDAP://host/DN, LDAP://DN or a DN; the naming context when omitted",
                ),
                optional("type", "string", "computer, user, group or organizationalunit"),
                optional("filter", "string", "LDAP filter; defaults to the type's filter"),
                optional("scope", "string", "Base, OneLevel or Subtree"),
                optional("properties", "array", "Attributes to return; all when omitted"),
            ],
        ),
        tool(
            "ad_group_members",
            "List the members of a group; `*` wildcards expand every matching group",
            &[
                required("name", "string", "Group name"),
                optional(
                    "path",
                    "string",
                    "Where to look for the group: LDAP://host/DN, LDAP://DN or a DN; the naming context when omitted",
                ),
                optional("properties", "array", "Member attributes to return"),
                optional("concurrency", "integer", "Member lookups in flight at once (default 1)"),
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
        "ad_connect" => {
            let args: ConnectArgs = parse_args(arguments)?;
            let record = AdConfig::from_env()
                .with_overrides(args.server, args.bind_dn, args.bind_password)
                .connect(&mut state.ad)
                .await
                .map_err(setup_error)?;
            return Ok(CallResult::Record(record));
        }
        "ad_disconnect" => return Ok(CallResult::Record(state.ad.disconnect().await)),
        "ad_search" => Commands::Search(parse_args(arguments)?),
        "ad_group_members" => Commands::GroupMembers(parse_args(arguments)?),
        other => return Err(unknown_tool(other)),
    };

    execute(&state.ad, command).await.map_err(tool_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ad::transport::mock::MockDirectory;
    use crate::pcut::transport::mock::MockTransport;
    use crate::serve::testing;
    use crate::serve::{INTERNAL_ERROR, INVALID_PARAMS};
    use admintools_core::directory::DirectoryEntry;
    use admintools_core::error::CallError;

    fn state(directory: &MockDirectory) -> ServerState {
        let pcut = MockTransport::new(|_| Err(CallError::transport("mock", "offline")));
        testing::state(&pcut, directory)
    }

    #[tokio::test]
    async fn test_search_after_connect() {
        let directory = MockDirectory::new(|_| {
            Ok(vec![DirectoryEntry {
                dn: "CN=WS01,OU=Computers,DC=example,DC=com".to_string(),
                attributes: vec![("name".to_string(), vec!["WS01".to_string()])],
            }])
        });
        let mut state = state(&directory);

        let err = call(&mut state, "ad_search", None).await.unwrap_err();
        assert_eq!(err.code, INTERNAL_ERROR);
        assert_eq!(directory.search_count(), 0);

        call(
            &mut state,
            "ad_connect",
            Some(serde_json::json!({ "server": "dc01.example.com" })),
        )
        .await
        .unwrap();

        let result = call(
            &mut state,
            "ad_search",
            Some(serde_json::json!({ "type": "computer", "properties": ["name"] })),
        )
        .await
        .unwrap();
        match result {
            CallResult::Records(rows) => assert_eq!(rows.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_group_members_path_sets_group_search_base() {
        let directory = MockDirectory::new(|request| {
            if request.filter.contains("objectCategory=group") {
                Ok(vec![DirectoryEntry {
                    dn: "CN=Admins,OU=Groups,DC=example,DC=com".to_string(),
                    attributes: vec![(
                        "member".to_string(),
                        vec!["CN=alice,DC=example,DC=com".to_string()],
                    )],
                }])
            } else {
                Ok(vec![DirectoryEntry {
                    dn: request.base.clone(),
                    attributes: vec![("name".to_string(), vec!["alice".to_string()])],
                }])
            }
        });
        let mut state = state(&directory);
        call(
            &mut state,
            "ad_connect",
            Some(serde_json::json!({ "server": "dc01.example.com" })),
        )
        .await
        .unwrap();

        let result = call(
            &mut state,
            "ad_group_members",
            Some(serde_json::json!({
                "name": "Admins",
                "path": "LDAP://dc01.example.com/OU=Groups,DC=example,DC=com"
            })),
        )
        .await
        .unwrap();
        match result {
            CallResult::Records(rows) => assert_eq!(rows.len(), 1),
            other => panic!("unexpected {other:?}"),
        }

        let searches = directory.searches.lock().unwrap().clone();
        assert_eq!(searches[0].base, "OU=Groups,DC=example,DC=com");
    }

    #[tokio::test]
    async fn test_unknown_ad_tool() {
        let mut state = state(&MockDirectory::new(|_| Ok(vec![])));
        let err = call(&mut state, "ad_delete", None).await.unwrap_err();
        assert_eq!(err.code, INVALID_PARAMS);
    }
}
