use crate::prelude::{eprintln, *};
use admintools_core::updates::DEFAULT_HISTORY_COUNT;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

pub mod agent;
pub mod client;

pub use client::{UpdateClient, UpdateSource};

#[derive(Debug, clap::Parser)]
#[command(name = "wsus")]
#[command(about = "Windows Update Agent and WSUS operations")]
pub struct App {
    #[command(subcommand)]
    pub command: Commands,

    /// PowerShell executable hosting the update agent
    #[arg(long, global = true)]
    pub powershell: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Debug, Clone, clap::Subcommand, Serialize, Deserialize)]
pub enum Commands {
    /// Connect to a WSUS administration server
    #[clap(name = "connect")]
    Connect(ConnectArgs),

    /// Search for updates
    #[clap(name = "search")]
    Search(SourceArgs),

    /// Download updates that need no interaction
    #[clap(name = "download")]
    Download(UpdateIdsArgs),

    /// Install downloaded updates
    #[clap(name = "install")]
    Install(UpdateIdsArgs),

    /// Show the update history
    #[clap(name = "history")]
    History(HistoryArgs),

    /// Accept the license terms of updates
    #[clap(name = "accept-eula")]
    AcceptEula(AcceptEulaArgs),
}

#[derive(Debug, Clone, Default, clap::Args, Serialize, Deserialize)]
pub struct ConnectArgs {
    /// Server as name[:port]; defaults to WSUS_SERVER or this machine
    #[serde(default)]
    pub server: Option<String>,

    /// Use a secure connection
    #[arg(long)]
    #[serde(default)]
    pub secure: bool,
}

#[derive(Debug, Clone, Default, clap::Args, Serialize, Deserialize)]
pub struct SourceArgs {
    /// Update search criteria
    #[arg(long)]
    #[serde(default)]
    pub criteria: Option<String>,

    /// Search Microsoft Update instead of the configured server
    #[arg(long)]
    #[serde(default)]
    pub from_microsoft: bool,
}

impl SourceArgs {
    pub fn source(&self) -> UpdateSource {
        UpdateSource::new(self.criteria.as_deref(), self.from_microsoft)
    }
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct UpdateIdsArgs {
    /// Update identifiers as returned by search
    #[arg(required = true)]
    pub update_ids: Vec<String>,

    #[command(flatten)]
    #[serde(flatten)]
    pub source: SourceArgs,
}

fn default_history_count() -> i64 {
    DEFAULT_HISTORY_COUNT
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct HistoryArgs {
    /// Index of the first history entry
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    #[serde(default)]
    pub start: i64,

    /// Number of entries
    #[arg(long, default_value_t = DEFAULT_HISTORY_COUNT, allow_negative_numbers = true)]
    #[serde(default = "default_history_count")]
    pub count: i64,
}

fn default_accept() -> bool {
    true
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct AcceptEulaArgs {
    /// Update identifiers as returned by search
    #[arg(required = true)]
    pub update_ids: Vec<String>,

    /// Accept (true) or leave untouched (false)
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    #[serde(default = "default_accept")]
    pub accept: bool,

    #[command(flatten)]
    #[serde(flatten)]
    pub source: SourceArgs,
}

/// Name of this machine, used to recognise the local update server.
pub fn local_host_name() -> String {
    crate::call::env_var("COMPUTERNAME")
        .or_else(|| crate::call::env_var("HOSTNAME"))
        .unwrap_or_else(|| "localhost".to_string())
}

/// Update agent configuration from environment variables
#[derive(Debug, Clone)]
pub struct WsusConfig {
    pub server: String,
    pub secure: bool,
    pub powershell: String,
}

impl WsusConfig {
    /// Load configuration from `WSUS_SERVER`, `WSUS_SECURE` and `WSUS_POWERSHELL`
    pub fn from_env() -> Result<Self> {
        let secure = match crate::call::env_var("WSUS_SECURE") {
            Some(value) => parse_flag(&value).ok_or(Error::InvalidSetting {
                name: "WSUS_SECURE",
                value,
            })?,
            None => false,
        };

        Ok(Self {
            server: crate::call::env_var("WSUS_SERVER").unwrap_or_else(local_host_name),
            secure,
            powershell: crate::call::env_var("WSUS_POWERSHELL")
                .unwrap_or_else(|| "powershell.exe".to_string()),
        })
    }

    /// Apply CLI overrides to the configuration
    pub fn with_overrides(mut self, powershell: Option<String>) -> Self {
        if let Some(program) = powershell {
            self.powershell = program;
        }
        self
    }

    /// Server for `connect`, preferring the command's own arguments.
    pub fn server_for(&self, args: &ConnectArgs) -> (String, bool) {
        (
            args.server.clone().unwrap_or_else(|| self.server.clone()),
            args.secure || self.secure,
        )
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Runs one update command; `connect` falls back to the configured server.
pub async fn execute(
    client: &mut UpdateClient,
    config: &WsusConfig,
    command: Commands,
) -> Result<CallResult, CallError> {
    Ok(match command {
        Commands::Connect(args) => {
            let (server, secure) = config.server_for(&args);
            CallResult::Record(client.connect(&server, secure).await?.to_record())
        }
        Commands::Search(args) => CallResult::Records(
            client
                .search(&args.source())
                .await?
                .iter()
                .map(|u| u.to_record())
                .collect(),
        ),
        Commands::Download(args) => CallResult::Records(
            client
                .download(&args.update_ids, &args.source.source())
                .await?
                .iter()
                .map(|u| u.to_record())
                .collect(),
        ),
        Commands::Install(args) => CallResult::Record(
            client
                .install(&args.update_ids, &args.source.source())
                .await?
                .to_record(),
        ),
        Commands::History(args) => CallResult::Records(
            client
                .history(args.start, args.count)
                .await?
                .iter()
                .map(|h| h.to_record())
                .collect(),
        ),
        Commands::AcceptEula(args) => CallResult::Scalars(
            client
                .accept_eula(&args.update_ids, args.accept, &args.source.source())
                .await?
                .into_iter()
                .map(serde_json::Value::from)
                .collect(),
        ),
    })
}

fn spinner_message(command: &Commands) -> &'static str {
    match command {
        Commands::Connect(_) => "Connecting to the update server...",
        Commands::Search(_) => "Searching for updates...",
        Commands::Download(_) => "Downloading updates...",
        Commands::Install(_) => "Installing updates...",
        Commands::History(_) => "Reading update history...",
        Commands::AcceptEula(_) => "Accepting license terms...",
    }
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let config = WsusConfig::from_env()?.with_overrides(app.powershell);

    if global.verbose {
        eprintln!("Update agent host: {}", config.powershell);
    }

    let mut client = UpdateClient::powershell(
        &config.powershell,
        global.call_timeout(),
        local_host_name(),
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner.set_message(spinner_message(&app.command));

    let outcome = execute(&mut client, &config, app.command).await;

    spinner.finish_and_clear();

    print_result(outcome?, "UpdateId", app.json)
}
