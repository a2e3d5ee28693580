use std::time::Duration;

use admintools_core::error::CallError;
use admintools_core::session::SessionSlot;
use admintools_core::updates::{
    records_for_ids, resolve_criteria, select_downloadable, select_eula_pending,
    select_installable, validate_update_ids, HistoryEntry, HistoryWindow, InstallOutcome,
    ServerAddress, ServerInfo, ServerSelection, UpdateRecord,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::agent::{AgentRequest, PowerShellAgent, UpdateAgent};
use crate::call::bounded;

/// Where update searches run; shared by every agent operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSource {
    pub criteria: String,
    pub selection: ServerSelection,
}

impl UpdateSource {
    pub fn new(criteria: Option<&str>, from_microsoft: bool) -> Self {
        Self {
            criteria: resolve_criteria(criteria),
            selection: ServerSelection::from_microsoft(from_microsoft),
        }
    }
}

/// Update operations through an agent.
///
/// Agent operations act on the local machine and need no session; `connect` only
/// verifies and remembers the WSUS administration server.
pub struct UpdateClient {
    agent: Box<dyn UpdateAgent>,
    slot: SessionSlot<ServerInfo>,
    timeout: Duration,
    local_host: String,
}

fn parse<T: DeserializeOwned>(operation: &str, expected: &str, value: Value) -> Result<T, CallError> {
    serde_json::from_value(value.clone())
        .map_err(|e| CallError::shape(operation, expected, format!("{value} ({e})")))
}

/// PowerShell collapses one-element arrays to the element and empty ones to null.
fn list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

impl UpdateClient {
    pub fn new(agent: Box<dyn UpdateAgent>, timeout: Duration, local_host: impl Into<String>) -> Self {
        Self {
            agent,
            slot: SessionSlot::new(),
            timeout,
            local_host: local_host.into(),
        }
    }

    pub fn powershell(program: &str, timeout: Duration, local_host: impl Into<String>) -> Self {
        Self::new(Box::new(PowerShellAgent::new(program)), timeout, local_host)
    }

    pub fn server(&self) -> Option<&ServerInfo> {
        self.slot.current("server").ok()
    }

    async fn send(&self, request: AgentRequest) -> Result<(Value, String), CallError> {
        let label = request.label();
        let value = bounded(self.timeout, &label, self.agent.invoke(&request))
            .await
            .map_err(|e| e.in_operation(&label))?;
        Ok((value, label))
    }

    /// Looks up the WSUS administration server; names containing this machine's
    /// host name use the local instance.
    pub async fn connect(&mut self, server: &str, secure: bool) -> Result<ServerInfo, CallError> {
        let address = ServerAddress::parse(server)?;
        let local = address.is_local(&self.local_host);

        let info = self
            .send(AgentRequest::ConnectServer {
                name: address.name.clone(),
                port: address.port,
                secure,
                local,
            })
            .await
            .and_then(|(value, label)| parse::<ServerInfo>(&label, "server details", value))
            .map_err(|e| CallError::Authentication {
                target: format!("{}:{}", address.name, address.port),
                message: e.to_string(),
            })?;

        log::info!("connected to update server {}:{}", info.name, info.port);
        self.slot.store(info.clone());
        Ok(info)
    }

    pub async fn search(&self, source: &UpdateSource) -> Result<Vec<UpdateRecord>, CallError> {
        let (value, label) = self
            .send(AgentRequest::Search {
                criteria: source.criteria.clone(),
                server_selection: source.selection.code(),
            })
            .await?;

        list(value)
            .into_iter()
            .map(|v| parse(&label, "an update", v))
            .collect()
    }

    /// Downloads the listed updates that can be fetched without interaction.
    ///
    /// Returns the updates actually selected; the agent is not called when none are.
    pub async fn download(
        &self,
        ids: &[String],
        source: &UpdateSource,
    ) -> Result<Vec<UpdateRecord>, CallError> {
        validate_update_ids(ids)?;
        let updates = self.search(source).await?;
        let selected = select_downloadable(&records_for_ids(&updates, ids)?);

        if selected.is_empty() {
            log::info!("nothing to download");
            return Ok(selected);
        }

        self.send(AgentRequest::Download {
            criteria: source.criteria.clone(),
            server_selection: source.selection.code(),
            update_ids: selected.iter().map(|u| u.update_id.clone()).collect(),
        })
        .await?;
        Ok(selected)
    }

    /// Installs the listed updates that are already downloaded.
    pub async fn install(
        &self,
        ids: &[String],
        source: &UpdateSource,
    ) -> Result<InstallOutcome, CallError> {
        validate_update_ids(ids)?;
        let updates = self.search(source).await?;
        let selected = select_installable(&records_for_ids(&updates, ids)?);
        let mut outcome = InstallOutcome::for_updates(&selected);

        if selected.is_empty() {
            log::info!("nothing to install");
            return Ok(outcome);
        }

        let (value, _) = self
            .send(AgentRequest::Install {
                criteria: source.criteria.clone(),
                server_selection: source.selection.code(),
                update_ids: outcome.installed.clone(),
            })
            .await?;
        if value.get("RebootRequired").and_then(Value::as_bool) == Some(true) {
            outcome.reboot_required = true;
        }
        Ok(outcome)
    }

    pub async fn history(&self, start: i64, count: i64) -> Result<Vec<HistoryEntry>, CallError> {
        let (value, label) = self.send(AgentRequest::HistoryCount).await?;
        let total = value
            .as_i64()
            .ok_or_else(|| CallError::shape(&label, "an integer", value.to_string()))?;

        let window = HistoryWindow::clamp(start, count, total);
        if window.count == 0 {
            return Ok(Vec::new());
        }

        let (value, label) = self
            .send(AgentRequest::History {
                start: window.start,
                count: window.count,
            })
            .await?;
        list(value)
            .into_iter()
            .map(|v| parse(&label, "a history entry", v))
            .collect()
    }

    /// Accepts the EULA of the listed updates that still need it; returns their ids.
    pub async fn accept_eula(
        &self,
        ids: &[String],
        accept: bool,
        source: &UpdateSource,
    ) -> Result<Vec<String>, CallError> {
        validate_update_ids(ids)?;
        if !accept {
            return Ok(Vec::new());
        }

        let updates = self.search(source).await?;
        let pending = select_eula_pending(&records_for_ids(&updates, ids)?, accept);
        let pending_ids: Vec<String> = pending.into_iter().map(|u| u.update_id).collect();

        if !pending_ids.is_empty() {
            self.send(AgentRequest::AcceptEula {
                criteria: source.criteria.clone(),
                server_selection: source.selection.code(),
                update_ids: pending_ids.clone(),
            })
            .await?;
        }
        Ok(pending_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wsus::agent::mock::MockAgent;
    use admintools_core::updates::DEFAULT_CRITERIA;
    use serde_json::json;

    fn update(id: &str, downloaded: bool, eula: bool, input: bool, reboot: i32) -> Value {
        json!({
            "UpdateId": id,
            "Title": format!("Update {id}"),
            "KbArticleIds": ["5034441"],
            "IsDownloaded": downloaded,
            "IsInstalled": false,
            "EulaAccepted": eula,
            "CanRequestUserInput": input,
            "RebootBehavior": reboot,
            "MaxDownloadSize": 1024
        })
    }

    /// Agent with four updates:
    /// aa downloadable, bb needs a EULA, cc downloaded and rebooting, dd interactive.
    fn fake_agent() -> MockAgent {
        MockAgent::new(|request| match request {
            AgentRequest::ConnectServer { name, port, secure, local } => Ok(json!({
                "Name": name, "Port": port, "Secure": secure, "Local": local, "Version": "10.0.17763"
            })),
            AgentRequest::Search { .. } => Ok(json!([
                update("aa", false, true, false, 0),
                update("bb", false, false, false, 0),
                update("cc", true, true, false, 1),
                update("dd", false, true, true, 0),
            ])),
            AgentRequest::Download { .. } => Ok(json!({ "ResultCode": 2 })),
            AgentRequest::Install { .. } => Ok(json!({ "ResultCode": 2, "RebootRequired": false })),
            AgentRequest::AcceptEula { update_ids, .. } => Ok(json!(update_ids)),
            AgentRequest::HistoryCount => Ok(json!(3)),
            AgentRequest::History { .. } => Ok(json!({
                "Date": "2024-03-12T10:00:00Z",
                "Title": "Update cc",
                "Operation": 1,
                "ResultCode": 2,
                "UpdateId": "cc"
            })),
        })
    }

    fn client(agent: &MockAgent) -> UpdateClient {
        UpdateClient::new(Box::new(agent.clone()), Duration::from_secs(5), "ws01")
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_connect_detects_local_server() {
        let agent = fake_agent();
        let mut client = client(&agent);

        let info = client.connect("WS01.corp.example.com", false).await.unwrap();
        assert!(info.local);
        assert_eq!(info.port, 8530);

        let info = client.connect("wsus02:8531", true).await.unwrap();
        assert!(!info.local);
        assert_eq!(client.server().map(|s| s.port), Some(8531));
    }

    #[tokio::test]
    async fn test_connect_bad_port_never_reaches_agent() {
        let agent = fake_agent();
        let mut client = client(&agent);

        let err = client.connect("wsus02:70000", false).await.unwrap_err();
        assert!(matches!(err, CallError::Validation { .. }));
        assert!(agent.actions().is_empty());
    }

    #[tokio::test]
    async fn test_search_defaults_criteria() {
        let agent = fake_agent();
        let updates = client(&agent)
            .search(&UpdateSource::new(None, true))
            .await
            .unwrap();

        assert_eq!(updates.len(), 4);
        assert_eq!(
            agent.actions(),
            vec![AgentRequest::Search {
                criteria: DEFAULT_CRITERIA.to_string(),
                server_selection: 2,
            }]
        );
    }

    #[tokio::test]
    async fn test_download_selects_only_non_interactive_accepted_updates() {
        let agent = fake_agent();
        let downloaded = client(&agent)
            .download(&ids(&["aa", "bb", "cc", "dd"]), &UpdateSource::new(None, false))
            .await
            .unwrap();

        assert_eq!(
            downloaded.iter().map(|u| u.update_id.as_str()).collect::<Vec<_>>(),
            vec!["aa"]
        );
        match &agent.actions()[1] {
            AgentRequest::Download { update_ids, .. } => assert_eq!(update_ids, &ids(&["aa"])),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_download_with_nothing_selected_skips_agent() {
        let agent = fake_agent();
        let downloaded = client(&agent)
            .download(&ids(&["bb"]), &UpdateSource::new(None, false))
            .await
            .unwrap();
        assert!(downloaded.is_empty());
        assert_eq!(agent.actions().len(), 1);
    }

    #[tokio::test]
    async fn test_install_reports_reboot() {
        let agent = fake_agent();
        let outcome = client(&agent)
            .install(&ids(&["aa", "cc"]), &UpdateSource::new(None, false))
            .await
            .unwrap();

        assert_eq!(outcome.installed, ids(&["cc"]));
        assert!(outcome.reboot_required);
    }

    #[tokio::test]
    async fn test_unknown_or_malformed_ids_are_rejected() {
        let agent = fake_agent();
        let client = client(&agent);

        let err = client
            .install(&ids(&["zz; Remove-Item"]), &UpdateSource::new(None, false))
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Validation { .. }));
        assert!(agent.actions().is_empty());

        let err = client
            .install(&ids(&["ff"]), &UpdateSource::new(None, false))
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_history_clamps_window() {
        let agent = fake_agent();
        let history = client(&agent).history(-5, 50).await.unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].update_id, "cc");
        assert_eq!(
            agent.actions()[1],
            AgentRequest::History { start: 0, count: 3 }
        );
    }

    #[tokio::test]
    async fn test_accept_eula_only_pending() {
        let agent = fake_agent();
        let client = client(&agent);

        let accepted = client
            .accept_eula(&ids(&["aa", "bb"]), true, &UpdateSource::new(None, false))
            .await
            .unwrap();
        assert_eq!(accepted, ids(&["bb"]));

        let agent = fake_agent();
        let declined = UpdateClient::new(Box::new(agent.clone()), Duration::from_secs(5), "ws01")
            .accept_eula(&ids(&["bb"]), false, &UpdateSource::new(None, false))
            .await
            .unwrap();
        assert!(declined.is_empty());
        assert!(agent.actions().is_empty());
    }

    #[tokio::test]
    async fn test_agent_fault_names_operation() {
        let agent = MockAgent::new(|_| {
            Err(CallError::RemoteFault {
                operation: "agent".to_string(),
                code: -2145124329,
                message: "WU_E_NOT_APPLICABLE".to_string(),
            })
        });
        let err = client(&agent).history(0, 10).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "getTotalHistoryCount: remote fault [-2145124329]: WU_E_NOT_APPLICABLE"
        );
    }
}
