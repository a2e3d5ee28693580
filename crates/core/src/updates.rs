//! Windows Update Agent / WSUS: server addressing, update selection rules and the
//! history window.
//!
//! The agent itself is driven by the shell; these functions decide what to ask it.

use serde::{Deserialize, Serialize};

use crate::error::{require_non_empty, CallError};
use crate::record::Record;

pub const DEFAULT_PORT: u16 = 8530;
pub const DEFAULT_CRITERIA: &str = "IsInstalled=0 and Type='Software'";
pub const DEFAULT_HISTORY_COUNT: i64 = 10;

/// `name[:port]` of an update server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerAddress {
    pub name: String,
    pub port: u16,
}

impl ServerAddress {
    pub fn parse(input: &str) -> Result<Self, CallError> {
        let input = input.trim();
        require_non_empty("server", input)?;

        let (name, port) = match input.split_once(':') {
            Some((name, port)) => {
                let port = port.trim().parse::<u16>().ok().filter(|p| *p != 0).ok_or_else(|| {
                    CallError::validation("port", format!("'{port}' is not a valid port number"))
                })?;
                (name.trim(), port)
            }
            None => (input, DEFAULT_PORT),
        };

        require_non_empty("server", name)?;
        Ok(Self {
            name: name.to_string(),
            port,
        })
    }

    /// True when the name refers to this machine, in which case the local server
    /// instance is used instead of a remote connection.
    pub fn is_local(&self, local_host: &str) -> bool {
        !local_host.is_empty()
            && self
                .name
                .to_ascii_lowercase()
                .contains(&local_host.to_ascii_lowercase())
    }
}

/// Where the agent searches for updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ServerSelection {
    /// Whatever the machine is configured for (usually the managed WSUS server).
    #[default]
    Default,
    ManagedServer,
    WindowsUpdate,
}

impl ServerSelection {
    pub fn from_microsoft(from_microsoft: bool) -> Self {
        if from_microsoft {
            ServerSelection::WindowsUpdate
        } else {
            ServerSelection::Default
        }
    }

    /// The agent's numeric `ServerSelection` value.
    pub fn code(&self) -> u8 {
        match self {
            ServerSelection::Default => 0,
            ServerSelection::ManagedServer => 1,
            ServerSelection::WindowsUpdate => 2,
        }
    }
}

/// Resolved search criteria; blank input falls back to the default.
pub fn resolve_criteria(criteria: Option<&str>) -> String {
    match criteria.map(str::trim) {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => DEFAULT_CRITERIA.to_string(),
    }
}

/// Details of a connected update server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerInfo {
    pub name: String,
    pub port: u16,
    pub secure: bool,
    pub local: bool,
    #[serde(default)]
    pub version: String,
}

/// One update as reported by the agent's search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateRecord {
    pub update_id: String,
    pub title: String,
    #[serde(default)]
    pub kb_article_ids: Vec<String>,
    pub is_downloaded: bool,
    pub is_installed: bool,
    pub eula_accepted: bool,
    pub can_request_user_input: bool,
    pub reboot_behavior: i32,
    #[serde(default)]
    pub max_download_size: u64,
}

impl UpdateRecord {
    pub fn is_downloadable(&self) -> bool {
        self.eula_accepted && !self.can_request_user_input && !self.is_downloaded
    }

    pub fn is_installable(&self) -> bool {
        self.is_downloaded
    }

    pub fn requires_reboot(&self) -> bool {
        self.reboot_behavior > 0
    }
}

/// Rejects anything but non-empty GUID-like tokens.
pub fn validate_update_id(id: &str) -> Result<(), CallError> {
    require_non_empty("update id", id)?;
    if !id.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
        return Err(CallError::validation(
            "update id",
            format!("'{id}' is not a valid update identifier"),
        ));
    }
    Ok(())
}

pub fn validate_update_ids(ids: &[String]) -> Result<(), CallError> {
    if ids.is_empty() {
        return Err(CallError::validation("update ids", "at least one is required"));
    }
    ids.iter().try_for_each(|id| validate_update_id(id))
}

/// Picks the search results matching `ids`, in the order of `ids`.
///
/// An id the search did not return is a validation error: there is nothing to act on.
pub fn records_for_ids(
    updates: &[UpdateRecord],
    ids: &[String],
) -> Result<Vec<UpdateRecord>, CallError> {
    validate_update_ids(ids)?;
    ids.iter()
        .map(|id| {
            updates
                .iter()
                .find(|u| u.update_id.eq_ignore_ascii_case(id))
                .cloned()
                .ok_or_else(|| {
                    CallError::validation(
                        "update id",
                        format!("'{id}' was not returned by the update search"),
                    )
                })
        })
        .collect()
}

/// Updates that may be downloaded without interaction: EULA accepted, no user
/// input and not yet downloaded.
pub fn select_downloadable(updates: &[UpdateRecord]) -> Vec<UpdateRecord> {
    updates.iter().filter(|u| u.is_downloadable()).cloned().collect()
}

pub fn select_installable(updates: &[UpdateRecord]) -> Vec<UpdateRecord> {
    updates.iter().filter(|u| u.is_installable()).cloned().collect()
}

/// Updates whose EULA still needs accepting; empty when `accept` is false.
pub fn select_eula_pending(updates: &[UpdateRecord], accept: bool) -> Vec<UpdateRecord> {
    if !accept {
        return Vec::new();
    }
    updates.iter().filter(|u| !u.eula_accepted).cloned().collect()
}

pub fn reboot_required(updates: &[UpdateRecord]) -> bool {
    updates.iter().any(UpdateRecord::requires_reboot)
}

/// Outcome of an install request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstallOutcome {
    pub installed: Vec<String>,
    pub reboot_required: bool,
}

impl InstallOutcome {
    pub fn for_updates(updates: &[UpdateRecord]) -> Self {
        Self {
            installed: updates.iter().map(|u| u.update_id.clone()).collect(),
            reboot_required: reboot_required(updates),
        }
    }
}

/// A `[start, start + count)` slice of the update history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryWindow {
    pub start: i64,
    pub count: i64,
}

impl HistoryWindow {
    /// Negative starts clamp to 0; counts beyond the total history clamp to the
    /// total; negative counts clamp to 0.
    pub fn clamp(start: i64, count: i64, total: i64) -> Self {
        let total = total.max(0);
        Self {
            start: start.max(0),
            count: count.clamp(0, total),
        }
    }
}

/// One row of the update history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HistoryEntry {
    pub date: String,
    pub title: String,
    pub operation: i32,
    pub result_code: i32,
    #[serde(default)]
    pub update_id: String,
}

/// Agent `UpdateOperation` names.
pub fn operation_name(code: i32) -> &'static str {
    match code {
        1 => "Installation",
        2 => "Uninstallation",
        _ => "Unknown",
    }
}

/// Agent `OperationResultCode` names.
pub fn result_code_name(code: i32) -> &'static str {
    match code {
        0 => "NotStarted",
        1 => "InProgress",
        2 => "Succeeded",
        3 => "SucceededWithErrors",
        4 => "Failed",
        5 => "Aborted",
        _ => "Unknown",
    }
}

impl ServerInfo {
    pub fn to_record(&self) -> Record {
        Record::new()
            .with("Name", self.name.clone())
            .with("Port", self.port)
            .with("Secure", self.secure)
            .with("Local", self.local)
            .with("Version", self.version.clone())
    }
}

impl UpdateRecord {
    pub fn to_record(&self) -> Record {
        Record::new()
            .with("UpdateId", self.update_id.clone())
            .with("Title", self.title.clone())
            .with("KbArticleIds", self.kb_article_ids.clone())
            .with("IsDownloaded", self.is_downloaded)
            .with("IsInstalled", self.is_installed)
            .with("EulaAccepted", self.eula_accepted)
            .with("CanRequestUserInput", self.can_request_user_input)
            .with("RebootBehavior", self.reboot_behavior)
            .with("MaxDownloadSize", self.max_download_size)
    }
}

impl InstallOutcome {
    pub fn to_record(&self) -> Record {
        Record::new()
            .with("Installed", self.installed.clone())
            .with("RebootRequired", self.reboot_required)
    }
}

impl HistoryEntry {
    /// History row with the operation and result code spelled out.
    pub fn to_record(&self) -> Record {
        Record::new()
            .with("Date", self.date.clone())
            .with("Title", self.title.clone())
            .with("Operation", operation_name(self.operation))
            .with("ResultCode", result_code_name(self.result_code))
            .with("UpdateId", self.update_id.clone())
    }
}
