use crate::prelude::{eprintln, println, *};
use admintools_core::mlb::{
    Endpoints, ItemKind, DEFAULT_GAMEDAY_BASE, DEFAULT_SITE_BASE, DEFAULT_SPORT_CODE,
};
use admintools_core::record::json_records;
use serde::{Deserialize, Serialize};

pub mod client;
pub mod fetch;

pub use client::MlbClient;

#[derive(Debug, clap::Parser)]
#[command(name = "mlb")]
#[command(about = "MLB Gameday files and statistics lookups")]
pub struct App {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Debug, Clone, clap::Subcommand, Serialize, Deserialize)]
pub enum Commands {
    /// Game directory URLs for a day
    #[clap(name = "games")]
    Games(DateArgs),

    /// One per-game document (events, boxscore, roster, umpires, bench, game, innings, plays)
    #[clap(name = "item")]
    Item(ItemArgs),

    /// Player files of a game's batters or pitchers
    #[clap(name = "players")]
    Players(PlayersArgs),

    /// The day's schedule as JSON
    #[clap(name = "schedule")]
    Schedule(DateArgs),

    /// Teams, optionally of one sport code
    #[clap(name = "teams")]
    Teams(TeamsArgs),

    /// Search players by name prefix
    #[clap(name = "find-player")]
    FindPlayer(FindPlayerArgs),

    /// Season pitching summary of a player
    #[clap(name = "pitcher")]
    Pitcher(PitcherArgs),
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct DateArgs {
    /// YYYY-MM-DD, MM/DD/YYYY or YYYYMMDD
    pub date: String,
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct ItemArgs {
    /// Game directory URL as listed by `games`
    pub url: String,

    /// Document kind
    pub kind: String,
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct PlayersArgs {
    /// Game directory URL as listed by `games`
    pub url: String,

    /// Only this player
    #[arg(long)]
    #[serde(default)]
    pub player_id: Option<String>,

    /// Pitchers instead of batters
    #[arg(long)]
    #[serde(default)]
    pub pitchers: bool,
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct TeamsArgs {
    /// Sport code (mlb, aaa, ...)
    #[arg(long)]
    #[serde(default)]
    pub sport_code: Option<String>,
}

fn default_active() -> bool {
    true
}

fn default_sport_code() -> String {
    DEFAULT_SPORT_CODE.to_string()
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct FindPlayerArgs {
    /// Start of the player's name
    pub name: String,

    /// Active players only
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    #[serde(default = "default_active")]
    pub active: bool,

    /// Sport code
    #[arg(long, default_value = DEFAULT_SPORT_CODE)]
    #[serde(default = "default_sport_code")]
    pub sport_code: String,
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct PitcherArgs {
    /// Season year
    pub season: String,

    /// MLB player id; every pitcher of the season when omitted
    #[serde(default)]
    pub player_id: Option<String>,

    /// Game type: a, d, l, r, s or w
    #[arg(long, default_value = "r")]
    #[serde(default = "default_game_type")]
    pub game_type: String,
}

fn default_game_type() -> String {
    "r".to_string()
}

/// Endpoint configuration from environment variables
#[derive(Debug, Clone)]
pub struct MlbConfig {
    pub endpoints: Endpoints,
}

impl MlbConfig {
    /// Load configuration from `MLB_GAMEDAY_BASE` and `MLB_LOOKUP_BASE`
    pub fn from_env() -> Self {
        let gameday = crate::call::env_var("MLB_GAMEDAY_BASE")
            .unwrap_or_else(|| DEFAULT_GAMEDAY_BASE.to_string());
        let lookup =
            crate::call::env_var("MLB_LOOKUP_BASE").unwrap_or_else(|| DEFAULT_SITE_BASE.to_string());
        Self {
            endpoints: Endpoints::new(&gameday, &lookup),
        }
    }
}

pub async fn execute(client: &MlbClient, command: Commands) -> Result<CallResult, CallError> {
    use serde_json::Value;

    Ok(match command {
        Commands::Games(args) => CallResult::Scalars(
            client
                .games(&args.date)
                .await?
                .into_iter()
                .map(Value::from)
                .collect(),
        ),
        Commands::Item(args) => {
            let kind = args.kind.parse::<ItemKind>()?;
            CallResult::Scalar(Value::from(client.item(&args.url, kind).await?))
        }
        Commands::Players(args) => CallResult::Scalars(
            client
                .players(&args.url, args.player_id.as_deref(), args.pitchers)
                .await?
                .into_iter()
                .map(Value::from)
                .collect(),
        ),
        Commands::Schedule(args) => CallResult::Scalar(client.schedule(&args.date).await?),
        Commands::Teams(args) => CallResult::Records(json_records(
            "Value",
            client.teams(args.sport_code.as_deref()).await?,
        )),
        Commands::FindPlayer(args) => CallResult::Records(json_records(
            "Value",
            client
                .find_player(&args.name, args.active, &args.sport_code)
                .await?,
        )),
        Commands::Pitcher(args) => CallResult::Records(json_records(
            "Value",
            client
                .pitcher(&args.season, args.player_id.as_deref(), &args.game_type)
                .await?,
        )),
    })
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let config = MlbConfig::from_env();

    if global.verbose {
        eprintln!(
            "MLB endpoints: {} and {}",
            config.endpoints.gameday_base, config.endpoints.site_base
        );
    }

    // Documents read better as text than in a table.
    let as_text = !app.json
        && matches!(
            app.command,
            Commands::Item(_) | Commands::Players(_) | Commands::Schedule(_)
        );

    let client = MlbClient::http(config.endpoints, global.call_timeout());
    let result = execute(&client, app.command).await?;

    if !as_text {
        return print_result(result, "Value", app.json);
    }

    for value in result.into_records("Value") {
        match value.get("Value") {
            Some(serde_json::Value::String(text)) => println!("{text}"),
            Some(other) => println!("{}", serde_json::to_string_pretty(other)?),
            None => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_player_defaults_for_tool_calls() {
        let args: FindPlayerArgs =
            serde_json::from_value(serde_json::json!({ "name": "trout" })).unwrap();
        assert!(args.active);
        assert_eq!(args.sport_code, "mlb");

        let args: PitcherArgs =
            serde_json::from_value(serde_json::json!({ "season": "2014", "player_id": "1" }))
                .unwrap();
        assert_eq!(args.game_type, "r");
        assert_eq!(args.player_id.as_deref(), Some("1"));

        let args: PitcherArgs =
            serde_json::from_value(serde_json::json!({ "season": "2014" })).unwrap();
        assert_eq!(args.player_id, None);
    }

    #[test]
    fn test_command_round_trips_through_tool_json() {
        let command: Commands =
            serde_json::from_value(serde_json::json!({ "Games": { "date": "2014-04-01" } }))
                .unwrap();
        assert!(matches!(command, Commands::Games(DateArgs { date }) if date == "2014-04-01"));
    }
}
