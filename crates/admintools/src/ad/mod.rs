use crate::prelude::{eprintln, *};
use admintools_core::directory::{ObjectType, SearchOptions, SearchScope};
use admintools_core::session::Secret;
use serde::{Deserialize, Serialize};

pub mod client;
pub mod transport;

pub use client::DirectoryClient;
use transport::BindCredentials;

#[derive(Debug, clap::Parser)]
#[command(name = "ad")]
#[command(about = "Active Directory (LDAP) searches")]
pub struct App {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory server (ldap://host[:port], ldaps://host[:port] or host)
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// DN to bind as; anonymous when unset
    #[arg(long, global = true)]
    pub bind_dn: Option<String>,

    /// Password for --bind-dn
    #[arg(long, global = true)]
    pub bind_password: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Debug, Clone, clap::Subcommand, Serialize, Deserialize)]
pub enum Commands {
    /// Bind to the directory and show its naming context
    #[clap(name = "connect")]
    Connect,

    /// Search for directory objects
    #[clap(name = "search")]
    Search(SearchArgs),

    /// List the members of a group
    #[clap(name = "group-members")]
    GroupMembers(GroupMembersArgs),
}

#[derive(Debug, Clone, Default, clap::Args, Serialize, Deserialize)]
pub struct SearchArgs {
    /// Search base: LDAP://host/DN, LDAP://DN or a DN. Defaults to the naming context
    #[arg(long)]
    #[serde(default)]
    pub path: Option<String>,

    /// Object type: computer, user, group or organizationalunit
    #[arg(long = "type")]
    #[serde(default, rename = "type")]
    pub object_type: Option<String>,

    /// LDAP filter; defaults to the type's objectCategory filter
    #[arg(long)]
    #[serde(default)]
    pub filter: Option<String>,

    /// Base, OneLevel or Subtree
    #[arg(long)]
    #[serde(default)]
    pub scope: Option<String>,

    /// Attributes to return (comma separated); all when omitted
    #[arg(long, value_delimiter = ',')]
    #[serde(default)]
    pub properties: Vec<String>,
}

impl SearchArgs {
    pub fn options(self) -> Result<SearchOptions, CallError> {
        Ok(SearchOptions {
            path: self.path,
            object_type: self
                .object_type
                .map(|t| t.parse::<ObjectType>())
                .transpose()?,
            filter: self.filter,
            scope: self.scope.map(|s| s.parse::<SearchScope>()).transpose()?,
            properties: self.properties,
        })
    }
}

fn default_concurrency() -> usize {
    1
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct GroupMembersArgs {
    /// Group name; `*` wildcards expand every matching group
    pub name: String,

    /// Where to look for the group: LDAP://host/DN, LDAP://DN or a DN. Defaults to the naming context
    #[arg(long)]
    #[serde(default)]
    pub path: Option<String>,

    /// Member attributes to return (comma separated); all when omitted
    #[arg(long, value_delimiter = ',')]
    #[serde(default)]
    pub properties: Vec<String>,

    /// Member lookups in flight at once
    #[arg(long, default_value_t = 1)]
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

/// Directory configuration from environment variables
#[derive(Debug, Clone, Default)]
pub struct AdConfig {
    pub server: Option<String>,
    pub bind_dn: Option<String>,
    pub bind_password: Option<Secret>,
}

impl AdConfig {
    /// Load configuration from `AD_SERVER`, `AD_BIND_DN` and `AD_BIND_PASSWORD`
    pub fn from_env() -> Self {
        Self {
            server: crate::call::env_var("AD_SERVER"),
            bind_dn: crate::call::env_var("AD_BIND_DN"),
            bind_password: crate::call::env_var("AD_BIND_PASSWORD").map(Secret::new),
        }
    }

    /// Apply CLI overrides to the configuration
    pub fn with_overrides(
        mut self,
        server: Option<String>,
        bind_dn: Option<String>,
        bind_password: Option<String>,
    ) -> Self {
        if let Some(server) = server {
            self.server = Some(server);
        }
        if let Some(dn) = bind_dn {
            self.bind_dn = Some(dn);
        }
        if let Some(password) = bind_password {
            self.bind_password = Some(Secret::new(password));
        }
        self
    }

    fn credentials(&self) -> Result<Option<BindCredentials>> {
        let Some(dn) = self.bind_dn.clone() else {
            return Ok(None);
        };
        let password = self
            .bind_password
            .clone()
            .ok_or(Error::MissingSetting("AD_BIND_PASSWORD"))?;
        Ok(Some(BindCredentials { dn, password }))
    }

    /// Binds `client` with this configuration.
    pub async fn connect(self, client: &mut DirectoryClient) -> Result<Record> {
        let bind = self.credentials()?;
        let server = self.server.ok_or(Error::MissingSetting("AD_SERVER"))?;
        Ok(client.connect(&server, bind).await?)
    }
}

/// Runs one session-bound command against a connected client.
pub async fn execute(client: &DirectoryClient, command: Commands) -> Result<CallResult, CallError> {
    Ok(match command {
        Commands::Connect => CallResult::Record(client.status()),
        Commands::Search(args) => CallResult::Records(client.search(args.options()?).await?),
        Commands::GroupMembers(args) => CallResult::Records(
            client
                .group_members(
                    &args.name,
                    args.path.as_deref(),
                    &args.properties,
                    args.concurrency,
                )
                .await?,
        ),
    })
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let config = AdConfig::from_env().with_overrides(app.server, app.bind_dn, app.bind_password);

    if global.verbose {
        eprintln!(
            "Directory server: {} (bind: {})",
            config.server.as_deref().unwrap_or("(unset)"),
            config.bind_dn.as_deref().unwrap_or("anonymous")
        );
    }

    let mut client = DirectoryClient::ldap(global.call_timeout());
    let connected = config.connect(&mut client).await?;

    let result = match app.command {
        Commands::Connect => CallResult::Record(connected),
        command => execute(&client, command).await?,
    };

    client.disconnect().await;
    print_result(result, "Value", app.json)
}
