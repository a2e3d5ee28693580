//! The update agent runs out of process: a PowerShell host drives the Windows
//! Update Agent COM API and the WSUS administration assembly, and answers with
//! one JSON document per request.

use admintools_core::error::CallError;
use serde::Serialize;
use serde_json::Value;

/// Environment variable carrying the JSON request to the agent script.
pub const REQUEST_ENV: &str = "ADMINTOOLS_AGENT_REQUEST";

/// One request to the agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "Action", rename_all_fields = "PascalCase")]
pub enum AgentRequest {
    ConnectServer {
        name: String,
        port: u16,
        secure: bool,
        local: bool,
    },
    Search {
        criteria: String,
        server_selection: u8,
    },
    Download {
        criteria: String,
        server_selection: u8,
        update_ids: Vec<String>,
    },
    Install {
        criteria: String,
        server_selection: u8,
        update_ids: Vec<String>,
    },
    AcceptEula {
        criteria: String,
        server_selection: u8,
        update_ids: Vec<String>,
    },
    HistoryCount,
    History {
        start: i64,
        count: i64,
    },
}

impl AgentRequest {
    pub fn label(&self) -> String {
        match self {
            AgentRequest::ConnectServer { name, port, .. } => format!("connectServer({name}:{port})"),
            AgentRequest::Search { criteria, .. } => format!("search({criteria})"),
            AgentRequest::Download { update_ids, .. } => format!("download({})", update_ids.join(", ")),
            AgentRequest::Install { update_ids, .. } => format!("install({})", update_ids.join(", ")),
            AgentRequest::AcceptEula { update_ids, .. } => {
                format!("acceptEula({})", update_ids.join(", "))
            }
            AgentRequest::HistoryCount => "getTotalHistoryCount".to_string(),
            AgentRequest::History { start, count } => format!("queryHistory({start}, {count})"),
        }
    }
}

#[async_trait::async_trait]
pub trait UpdateAgent: Send + Sync {
    /// Runs one request and returns the `result` member of the agent's answer.
    async fn invoke(&self, request: &AgentRequest) -> Result<Value, CallError>;
}

/// Maps the agent's `{result}` / `{error: {code, message}}` envelope.
pub fn decode_answer(operation: &str, answer: &str) -> Result<Value, CallError> {
    let answer: Value = serde_json::from_str(answer.trim()).map_err(|e| {
        CallError::transport(operation, format!("agent answered with invalid JSON: {e}"))
    })?;

    if let Some(error) = answer.get("error") {
        return Err(CallError::RemoteFault {
            operation: operation.to_string(),
            code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("agent failed")
                .to_string(),
        });
    }

    answer
        .get("result")
        .cloned()
        .ok_or_else(|| CallError::shape(operation, "an object with `result`", answer.to_string()))
}

/// Agent script. Reads the request from `ADMINTOOLS_AGENT_REQUEST`.
const AGENT_SCRIPT: &str = r#"
$ErrorActionPreference = 'Stop'

function Out-Answer($value) { ConvertTo-Json -InputObject $value -Depth 6 -Compress }

function Convert-Update($u) {
    [pscustomobject]@{
        UpdateId            = $u.Identity.UpdateID
        Title               = $u.Title
        KbArticleIds        = @($u.KBArticleIDs)
        IsDownloaded        = [bool]$u.IsDownloaded
        IsInstalled         = [bool]$u.IsInstalled
        EulaAccepted        = [bool]$u.EulaAccepted
        CanRequestUserInput = [bool]$u.InstallationBehavior.CanRequestUserInput
        RebootBehavior      = [int]$u.InstallationBehavior.RebootBehavior
        MaxDownloadSize     = [uint64]$u.MaxDownloadSize
    }
}

function Find-Updates($session, $request) {
    $searcher = $session.CreateUpdateSearcher()
    $searcher.ServerSelection = [int]$request.ServerSelection
    $searcher.Search($request.Criteria).Updates
}

function Select-Updates($session, $request) {
    $wanted = @($request.UpdateIds | ForEach-Object { $_.ToLowerInvariant() })
    $selected = New-Object -ComObject Microsoft.Update.UpdateColl
    foreach ($u in (Find-Updates $session $request)) {
        if ($wanted -contains $u.Identity.UpdateID.ToLowerInvariant()) { [void]$selected.Add($u) }
    }
    $selected
}

try {
    $request = $env:ADMINTOOLS_AGENT_REQUEST | ConvertFrom-Json
    $session = New-Object -ComObject Microsoft.Update.Session
    $result = $null

    switch ($request.Action) {
        'ConnectServer' {
            [void][Reflection.Assembly]::LoadWithPartialName('Microsoft.UpdateServices.Administration')
            if ($request.Local) {
                $server = [Microsoft.UpdateServices.Administration.AdminProxy]::GetUpdateServer()
            } else {
                $server = [Microsoft.UpdateServices.Administration.AdminProxy]::GetUpdateServer(
                    $request.Name, [bool]$request.Secure, [int]$request.Port)
            }
            $result = [pscustomobject]@{
                Name    = $server.Name
                Port    = [int]$server.PortNumber
                Secure  = [bool]$server.IsConnectionSecureForApiRemoting
                Local   = [bool]$request.Local
                Version = "$($server.Version)"
            }
        }
        'Search' {
            $result = @(Find-Updates $session $request | ForEach-Object { Convert-Update $_ })
        }
        'Download' {
            $downloader = $session.CreateUpdateDownloader()
            $downloader.Updates = Select-Updates $session $request
            $result = [pscustomobject]@{ ResultCode = [int]$downloader.Download().ResultCode }
        }
        'Install' {
            $installer = $session.CreateUpdateInstaller()
            $installer.Updates = Select-Updates $session $request
            $outcome = $installer.Install()
            $result = [pscustomobject]@{
                ResultCode     = [int]$outcome.ResultCode
                RebootRequired = [bool]$outcome.RebootRequired
            }
        }
        'AcceptEula' {
            $accepted = @()
            foreach ($u in (Select-Updates $session $request)) {
                $u.AcceptEula()
                $accepted += $u.Identity.UpdateID
            }
            $result = $accepted
        }
        'HistoryCount' {
            $result = [int]$session.CreateUpdateSearcher().GetTotalHistoryCount()
        }
        'History' {
            $result = @($session.CreateUpdateSearcher().QueryHistory([int]$request.Start, [int]$request.Count) |
                ForEach-Object {
                    [pscustomobject]@{
                        Date       = $_.Date.ToUniversalTime().ToString('o')
                        Title      = $_.Title
                        Operation  = [int]$_.Operation
                        ResultCode = [int]$_.ResultCode
                        UpdateId   = $_.UpdateIdentity.UpdateID
                    }
                })
        }
        default { throw "unknown action '$($request.Action)'" }
    }

    Out-Answer @{ result = $result }
} catch {
    Out-Answer @{ error = @{ code = $_.Exception.HResult; message = $_.Exception.Message } }
}
"#;

/// Runs the agent script in a fresh Windows PowerShell process per request.
pub struct PowerShellAgent {
    program: String,
}

impl PowerShellAgent {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait::async_trait]
impl UpdateAgent for PowerShellAgent {
    async fn invoke(&self, request: &AgentRequest) -> Result<Value, CallError> {
        let label = request.label();
        let payload = serde_json::to_string(request).map_err(|e| CallError::transport(&label, e))?;

        let output = tokio::process::Command::new(&self.program)
            .args(["-NoLogo", "-NoProfile", "-NonInteractive", "-Command", AGENT_SCRIPT])
            .env(REQUEST_ENV, payload)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CallError::transport(&label, format!("cannot start {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CallError::transport(
                &label,
                format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            ));
        }

        decode_answer(&label, &String::from_utf8_lossy(&output.stdout))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = AgentRequest::Download {
            criteria: "IsInstalled=0".to_string(),
            server_selection: 2,
            update_ids: vec!["a1-b2".to_string()],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "Action": "Download",
                "Criteria": "IsInstalled=0",
                "ServerSelection": 2,
                "UpdateIds": ["a1-b2"]
            })
        );
        assert_eq!(
            serde_json::to_value(AgentRequest::HistoryCount).unwrap(),
            json!({ "Action": "HistoryCount" })
        );
    }

    #[test]
    fn test_decode_answer_result() {
        assert_eq!(
            decode_answer("getTotalHistoryCount", r#"{"result":12}"#).unwrap(),
            json!(12)
        );
    }

    #[test]
    fn test_decode_answer_error_is_remote_fault() {
        let err = decode_answer(
            "install(a1)",
            r#"{"error":{"code":-2145124329,"message":"WU_E_NOT_APPLICABLE"}}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            CallError::RemoteFault {
                operation: "install(a1)".to_string(),
                code: -2145124329,
                message: "WU_E_NOT_APPLICABLE".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_answer_garbage_is_transport() {
        let err = decode_answer("search(x)", "WARNING: something\n").unwrap_err();
        assert!(matches!(err, CallError::Transport { .. }));
        let err = decode_answer("search(x)", r#"{"other":1}"#).unwrap_err();
        assert!(matches!(err, CallError::ShapeMismatch { .. }));
    }
}
