use crate::prelude::*;
use clap::Parser;

mod ad;
mod call;
mod error;
mod mlb;
mod pcut;
mod prelude;
mod serve;
mod wsus;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Typed command-line access to Active Directory, PaperCut, Windows Update and MLB statistics"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Whether to display additional information.
    #[clap(long, env = "ADMINTOOLS_VERBOSE", global = true, default_value = "false")]
    verbose: bool,

    /// Per-call timeout in seconds.
    #[clap(long, env = "ADMINTOOLS_TIMEOUT", global = true, default_value = "30")]
    timeout: u64,
}

impl Global {
    pub fn call_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout.max(1))
    }
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Active Directory (LDAP) searches
    AD(crate::ad::App),

    /// PaperCut print-management accounts, balances and properties
    Pcut(crate::pcut::App),

    /// Windows Update Agent and WSUS operations
    Wsus(crate::wsus::App),

    /// MLB Gameday files and statistics lookups
    Mlb(crate::mlb::App),

    /// Serve every operation as a tool over JSON-RPC on stdio
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();

    match app.command {
        SubCommands::AD(sub_app) => crate::ad::run(sub_app, app.global).await,
        SubCommands::Pcut(sub_app) => crate::pcut::run(sub_app, app.global).await,
        SubCommands::Wsus(sub_app) => crate::wsus::run(sub_app, app.global).await,
        SubCommands::Mlb(sub_app) => crate::mlb::run(sub_app, app.global).await,
        SubCommands::Serve => crate::serve::run(app.global).await,
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}
