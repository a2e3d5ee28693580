use admintools_core::record::CallResult;

use super::{optional, parse_args, required, tool, tool_error, unknown_tool};
use super::{JsonRpcError, Param, ServerState, Tool};
use crate::mlb::{execute, Commands};

const DATE: Param = required("date", "string", "YYYY-MM-DD, MM/DD/YYYY or YYYYMMDD");
const GAME_URL: Param = required("url", "string", "Game directory URL as listed by mlb_games");

pub fn tools() -> Vec<Tool> {
    vec![
        tool("mlb_games", "Game directory URLs for a day", &[DATE]),
        tool(
            "mlb_item",
            "One per-game Gameday document",
            &[
                GAME_URL,
                required(
                    "kind",
                    "string",
                    "events, boxscore, roster, umpires, bench, game, innings or plays",
                ),
            ],
        ),
        tool(
            "mlb_players",
            "Player files of a game's batters or pitchers",
            &[
                GAME_URL,
                optional("player_id", "string", "Only this player"),
                optional("pitchers", "boolean", "Pitchers instead of batters"),
            ],
        ),
        tool("mlb_schedule", "The day's schedule", &[DATE]),
        tool(
            "mlb_teams",
            "Teams, optionally of one sport code",
            &[optional("sport_code", "string", "Sport code, e.g. mlb or aaa")],
        ),
        tool(
            "mlb_find_player",
            "Search players by the start of their name",
            &[
                required("name", "string", "Start of the player's name"),
                optional("active", "boolean", "Active players only (default true)"),
                optional("sport_code", "string", "Sport code (default mlb)"),
            ],
        ),
        tool(
            "mlb_pitcher",
            "Season pitching summary of a player",
            &[
                required("season", "string", "Season year"),
                optional(
                    "player_id",
                    "string",
                    "MLB player id; every pitcher of the season when omitted",
                ),
                optional("game_type", "string", "a, d, l, r, s or w (default r)"),
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
        "mlb_games" => Commands::Games(parse_args(arguments)?),
        "mlb_item" => Commands::Item(parse_args(arguments)?),
        "mlb_players" => Commands::Players(parse_args(arguments)?),
        "mlb_schedule" => Commands::Schedule(parse_args(arguments)?),
        "mlb_teams" => Commands::Teams(parse_args(arguments)?),
        "mlb_find_player" => Commands::FindPlayer(parse_args(arguments)?),
        "mlb_pitcher" => Commands::Pitcher(parse_args(arguments)?),
        other => return Err(unknown_tool(other)),
    };

    execute(&state.mlb, command).await.map_err(tool_error)
}
