use crate::prelude::{eprintln, *};
use admintools_core::papercut::{
    ListPage, PrinterProperty, SharedAccountProperty, UserProperty, DEFAULT_LIMIT, DEFAULT_OFFSET,
    DEFAULT_PORT,
};
use admintools_core::session::Secret;
use serde::{Deserialize, Serialize};

pub mod client;
pub mod transport;

pub use client::PaperCutClient;

#[derive(Debug, clap::Parser)]
#[command(name = "pcut")]
#[command(about = "PaperCut print-management operations")]
pub struct App {
    #[command(subcommand)]
    pub command: Commands,

    /// PaperCut application server host
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// XML-RPC port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Web services auth token
    #[arg(long, global = true)]
    pub auth_token: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Debug, Clone, clap::Subcommand, Serialize, Deserialize)]
pub enum Commands {
    /// Verify the server address and auth token
    #[clap(name = "connect")]
    Connect,

    /// Number of user accounts on the server
    #[clap(name = "total-users")]
    TotalUsers,

    /// List user account names
    #[clap(name = "list-users")]
    ListUsers(PageOptions),

    /// List user group names
    #[clap(name = "list-groups")]
    ListGroups(PageOptions),

    /// List printers as server and printer name
    #[clap(name = "list-printers")]
    ListPrinters(PageOptions),

    /// List shared account names
    #[clap(name = "list-shared-accounts")]
    ListSharedAccounts(PageOptions),

    /// Check whether a user account exists
    #[clap(name = "user-exists")]
    UserExists(UserOptions),

    /// Groups a user belongs to
    #[clap(name = "user-groups")]
    UserGroups(UserOptions),

    /// Read one user property
    #[clap(name = "get-user-property")]
    GetUserProperty(UserPropertyOptions),

    /// Read several user properties at once (all readable ones by default)
    #[clap(name = "get-user-properties")]
    GetUserProperties(UserPropertiesOptions),

    /// Change one user property
    #[clap(name = "set-user-property")]
    SetUserProperty(SetUserPropertyOptions),

    /// Read a user's balance
    #[clap(name = "get-user-balance")]
    GetUserBalance(UserOptions),

    /// Overwrite a user's balance
    #[clap(name = "set-user-balance")]
    SetUserBalance(SetUserBalanceOptions),

    /// Add to (or subtract from) a user's balance
    #[clap(name = "adjust-user-balance")]
    AdjustUserBalance(AdjustUserBalanceOptions),

    /// Adjust the balance of every member of a group
    #[clap(name = "adjust-group-balance")]
    AdjustGroupBalance(AdjustGroupBalanceOptions),

    /// Rename a user account
    #[clap(name = "rename-user")]
    RenameUser(RenameUserOptions),

    /// Read one shared account property
    #[clap(name = "get-shared-account-property")]
    GetSharedAccountProperty(AccountPropertyOptions),

    /// Change one shared account property
    #[clap(name = "set-shared-account-property")]
    SetSharedAccountProperty(SetAccountPropertyOptions),

    /// Read a shared account's balance
    #[clap(name = "get-shared-account-balance")]
    GetSharedAccountBalance(AccountOptions),

    /// Adjust a shared account's balance
    #[clap(name = "adjust-shared-account-balance")]
    AdjustSharedAccountBalance(AdjustAccountBalanceOptions),

    /// Read one printer property
    #[clap(name = "get-printer-property")]
    GetPrinterProperty(PrinterPropertyOptions),
}

fn default_offset() -> u32 {
    DEFAULT_OFFSET
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct PageOptions {
    /// Index of the first entry
    #[arg(long, default_value_t = DEFAULT_OFFSET)]
    #[serde(default = "default_offset")]
    pub offset: u32,

    /// Maximum number of entries
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct UserOptions {
    /// User account name
    pub username: String,
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct UserPropertyOptions {
    /// User account name
    pub username: String,

    /// Property name (e.g. email, full-name, card-number)
    pub property: String,
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct UserPropertiesOptions {
    /// User account name
    pub username: String,

    /// Property names; all readable properties when omitted
    #[serde(default)]
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct SetUserPropertyOptions {
    /// User account name
    pub username: String,

    /// Property name (card-number, card-pin, department, email, full-name, notes, office)
    pub property: String,

    /// New value
    pub value: String,
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct SetUserBalanceOptions {
    /// User account name
    pub username: String,

    /// New balance
    #[arg(allow_negative_numbers = true)]
    pub balance: f64,

    /// Comment recorded with the transaction
    #[arg(long, default_value = "")]
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct AdjustUserBalanceOptions {
    /// User account name
    pub username: String,

    /// Amount to add; negative to deduct
    #[arg(allow_negative_numbers = true)]
    pub adjustment: f64,

    /// Comment recorded with the transaction
    #[arg(long, default_value = "")]
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct AdjustGroupBalanceOptions {
    /// Group name
    pub group: String,

    /// Amount to add to every member; negative to deduct
    #[arg(allow_negative_numbers = true)]
    pub adjustment: f64,

    /// Comment recorded with each transaction
    #[arg(long, default_value = "")]
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct RenameUserOptions {
    /// Current account name
    pub current: String,

    /// New account name
    pub new: String,
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct AccountOptions {
    /// Shared account name
    pub account: String,
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct AccountPropertyOptions {
    /// Shared account name
    pub account: String,

    /// Property name (e.g. balance, notes, pin, restricted)
    pub property: String,
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct SetAccountPropertyOptions {
    /// Shared account name
    pub account: String,

    /// Property name
    pub property: String,

    /// New value
    pub value: String,
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct AdjustAccountBalanceOptions {
    /// Shared account name
    pub account: String,

    /// Amount to add; negative to deduct
    #[arg(allow_negative_numbers = true)]
    pub adjustment: f64,

    /// Comment recorded with the transaction
    #[arg(long, default_value = "")]
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct PrinterPropertyOptions {
    /// Print server name
    pub server: String,

    /// Printer name
    pub printer: String,

    /// Property name (cost-model, disabled, print-stats.job-count, print-stats.page-count)
    pub property: String,
}

/// PaperCut configuration from environment variables
#[derive(Debug, Clone)]
pub struct PcutConfig {
    pub server: Option<String>,
    pub port: u16,
    pub auth_token: Option<Secret>,
}

impl PcutConfig {
    /// Load configuration from `PCUT_SERVER`, `PCUT_PORT` and `PCUT_AUTH_TOKEN`
    pub fn from_env() -> Result<Self> {
        let port = match crate::call::env_var("PCUT_PORT") {
            Some(value) => value.trim().parse::<u16>().map_err(|_| Error::InvalidSetting {
                name: "PCUT_PORT",
                value,
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            server: crate::call::env_var("PCUT_SERVER"),
            port,
            auth_token: crate::call::env_var("PCUT_AUTH_TOKEN").map(Secret::new),
        })
    }

    /// Apply CLI overrides to the configuration
    pub fn with_overrides(
        mut self,
        server: Option<String>,
        port: Option<u16>,
        auth_token: Option<String>,
    ) -> Self {
        if let Some(server) = server {
            self.server = Some(server);
        }
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(token) = auth_token {
            self.auth_token = Some(Secret::new(token));
        }
        self
    }

    /// Connects `client` with this configuration.
    pub async fn connect(self, client: &mut PaperCutClient) -> Result<Record> {
        let server = self.server.ok_or(Error::MissingSetting("PCUT_SERVER"))?;
        let token = self.auth_token.ok_or(Error::MissingSetting("PCUT_AUTH_TOKEN"))?;
        Ok(client.connect(&server, self.port, token).await?)
    }
}

/// Runs one session-bound command against a connected client.
pub async fn execute(client: &PaperCutClient, command: Commands) -> Result<CallResult, CallError> {
    use admintools_core::record::CallResult::Record as One;

    let page = |o: &PageOptions| ListPage::new(o.offset, o.limit);

    Ok(match command {
        Commands::Connect => One(client.status()),
        Commands::TotalUsers => One(client.total_users().await?),
        Commands::ListUsers(o) => client.list_users(page(&o)?).await?,
        Commands::ListGroups(o) => client.list_groups(page(&o)?).await?,
        Commands::ListPrinters(o) => client.list_printers(page(&o)?).await?,
        Commands::ListSharedAccounts(o) => client.list_shared_accounts(page(&o)?).await?,
        Commands::UserExists(o) => One(client.user_exists(&o.username).await?),
        Commands::UserGroups(o) => client.user_groups(&o.username).await?,
        Commands::GetUserProperty(o) => {
            let property = o.property.parse::<UserProperty>()?;
            One(client.get_user_property(&o.username, property).await?)
        }
        Commands::GetUserProperties(o) => {
            let properties = o
                .properties
                .iter()
                .map(|p| p.parse::<UserProperty>())
                .collect::<Result<Vec<_>, _>>()?;
            One(client.get_user_properties(&o.username, &properties).await?)
        }
        Commands::SetUserProperty(o) => {
            let property = UserProperty::settable(&o.property)?;
            One(client
                .set_user_property(&o.username, property, &o.value)
                .await?)
        }
        Commands::GetUserBalance(o) => One(client.get_user_balance(&o.username).await?),
        Commands::SetUserBalance(o) => One(client
            .set_user_balance(&o.username, o.balance, &o.comment)
            .await?),
        Commands::AdjustUserBalance(o) => One(client
            .adjust_user_balance(&o.username, o.adjustment, &o.comment)
            .await?),
        Commands::AdjustGroupBalance(o) => One(client
            .adjust_group_balance(&o.group, o.adjustment, &o.comment)
            .await?),
        Commands::RenameUser(o) => One(client.rename_user(&o.current, &o.new).await?),
        Commands::GetSharedAccountProperty(o) => {
            let property = o.property.parse::<SharedAccountProperty>()?;
            One(client
                .get_shared_account_property(&o.account, property)
                .await?)
        }
        Commands::SetSharedAccountProperty(o) => {
            let property = o.property.parse::<SharedAccountProperty>()?;
            One(client
                .set_shared_account_property(&o.account, property, &o.value)
                .await?)
        }
        Commands::GetSharedAccountBalance(o) => {
            One(client.get_shared_account_balance(&o.account).await?)
        }
        Commands::AdjustSharedAccountBalance(o) => One(client
            .adjust_shared_account_balance(&o.account, o.adjustment, &o.comment)
            .await?),
        Commands::GetPrinterProperty(o) => {
            let property = o.property.parse::<PrinterProperty>()?;
            One(client
                .get_printer_property(&o.server, &o.printer, property)
                .await?)
        }
    })
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let config = PcutConfig::from_env()?.with_overrides(app.server, app.port, app.auth_token);

    if global.verbose {
        eprintln!(
            "PaperCut server: {}:{}",
            config.server.as_deref().unwrap_or("(unset)"),
            config.port
        );
    }

    let mut client = PaperCutClient::http(global.call_timeout());
    let connected = config.connect(&mut client).await?;

    let result = match app.command {
        Commands::Connect => CallResult::Record(connected),
        command => execute(&client, command).await?,
    };

    print_result(result, "Value", app.json)
}
