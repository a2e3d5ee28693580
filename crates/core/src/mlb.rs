//! MLB statistics endpoints: URL building, Gameday index scraping and the subtree
//! selection used to shape XML and JSON answers.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde_json::Value;

use crate::error::{require_non_empty, CallError};

pub const DEFAULT_GAMEDAY_BASE: &str = "http://gd2.mlb.com/components/game/mlb";
pub const DEFAULT_SITE_BASE: &str = "http://mlb.mlb.com";
pub const DEFAULT_SPORT_CODE: &str = "mlb";

pub const SPORT_CODES: [&str; 27] = [
    "mlb", "aaa", "aax", "afa", "afx", "asx", "rok", "win", "min", "ind", "nlb", "kor", "jml",
    "hpl", "int", "nat", "nae", "nav", "nas", "nan", "naf", "nal", "naw", "oly", "bbc", "fps",
    "hsb",
];

pub const GAME_TYPES: [&str; 6] = ["a", "d", "l", "r", "s", "w"];

pub const TEAMS_ROW_PATH: &[&str] = &["search_autocomp", "team_all", "queryResults", "row"];
pub const PLAYERS_ROW_PATH: &[&str] = &["search_player_all", "queryResults", "row"];
pub const PITCHING_ROW_PATH: &[&str] = &[
    "mlb_bio_pitching_summary",
    "mlb_individual_pitching_season",
    "queryResults",
    "row",
];

/// Accepts `YYYY-MM-DD`, `MM/DD/YYYY` and `YYYYMMDD`.
pub fn parse_date(input: &str) -> Result<NaiveDate, CallError> {
    let input = input.trim();
    let invalid = || {
        CallError::validation(
            "date",
            format!("'{input}' is not a date (use YYYY-MM-DD, MM/DD/YYYY or YYYYMMDD)"),
        )
    };

    if input.len() == 8 && input.bytes().all(|b| b.is_ascii_digit()) {
        let year = input[0..4].parse::<i32>().map_err(|_| invalid())?;
        let month = input[4..6].parse::<u32>().map_err(|_| invalid())?;
        let day = input[6..8].parse::<u32>().map_err(|_| invalid())?;
        return NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid);
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(input, "%m/%d/%Y"))
        .map_err(|_| invalid())
}

pub fn validate_sport_code(code: &str) -> Result<String, CallError> {
    let code = code.trim().to_ascii_lowercase();
    if SPORT_CODES.contains(&code.as_str()) {
        Ok(code)
    } else {
        Err(CallError::validation(
            "sport code",
            format!("'{code}' is not one of: {}", SPORT_CODES.join(", ")),
        ))
    }
}

pub fn validate_game_type(game_type: &str) -> Result<String, CallError> {
    let game_type = game_type.trim().to_ascii_lowercase();
    if GAME_TYPES.contains(&game_type.as_str()) {
        Ok(game_type)
    } else {
        Err(CallError::validation(
            "game type",
            format!("'{game_type}' is not one of: {}", GAME_TYPES.join(", ")),
        ))
    }
}

/// Base URLs of the two MLB hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub gameday_base: String,
    pub site_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_GAMEDAY_BASE, DEFAULT_SITE_BASE)
    }
}

impl Endpoints {
    pub fn new(gameday_base: &str, site_base: &str) -> Self {
        Self {
            gameday_base: gameday_base.trim_end_matches('/').to_string(),
            site_base: site_base.trim_end_matches('/').to_string(),
        }
    }

    /// Gameday directory of one day, with a trailing slash.
    pub fn day_url(&self, date: NaiveDate) -> String {
        format!(
            "{}/year_{:04}/month_{:02}/day_{:02}/",
            self.gameday_base,
            date.year(),
            date.month(),
            date.day()
        )
    }

    pub fn schedule_url(&self, date: NaiveDate) -> String {
        format!(
            "{}/components/schedule/schedule_{}.json",
            self.site_base,
            date.format("%Y%m%d")
        )
    }

    pub fn teams_url(&self) -> String {
        format!("{}/lookup/json/named.search_autocomp.bam", self.site_base)
    }

    /// Player search by name prefix; the name is upper-cased and followed by the
    /// service's `%%` wildcard.
    pub fn find_player_url(&self, name: &str, active: bool, sport_code: &str) -> Result<String, CallError> {
        require_non_empty("name", name)?;
        let code = validate_sport_code(sport_code)?;
        Ok(format!(
            "{}/lookup/json/named.search_player_all.bam?sport_code='{}'&name_part='{}%25%25'&active_sw='{}'",
            self.site_base,
            code,
            urlencoding::encode(&name.trim().to_uppercase()),
            if active { "Y" } else { "N" }
        ))
    }

    /// Season pitching summary; without a player id the service answers for every
    /// pitcher of the season.
    pub fn pitcher_url(
        &self,
        season: &str,
        player_id: Option<&str>,
        game_type: &str,
    ) -> Result<String, CallError> {
        require_non_empty("season", season)?;
        let player_id = player_id.map(str::trim).unwrap_or_default();
        let game_type = validate_game_type(game_type)?;
        Ok(format!(
            "{}/lookup/json/named.mlb_bio_pitching_summary.bam?mlb_individual_pitching_season_sportcode.season={}&player_id={}&game_type=%27{}%27&sort_by=%27season_asc%27",
            self.site_base,
            urlencoding::encode(season.trim()),
            urlencoding::encode(player_id),
            game_type.to_uppercase()
        ))
    }
}

/// Appends `file` to a game directory URL, adding the separating slash if needed.
pub fn game_file_url(game_url: &str, file: &str) -> Result<String, CallError> {
    let game_url = game_url.trim();
    require_non_empty("url", game_url)?;
    if game_url.ends_with('/') {
        Ok(format!("{game_url}{file}"))
    } else {
        Ok(format!("{game_url}/{file}"))
    }
}

fn is_list_item(line: &str) -> bool {
    line.trim_start()
        .get(..4)
        .is_some_and(|head| head.eq_ignore_ascii_case("<li>"))
}

/// Game directory URLs listed in a Gameday day index.
///
/// Every `<li>` line mentioning `gid` contributes `day_url + "gid_.../"`.
pub fn extract_game_links(day_url: &str, index_html: &str) -> Vec<String> {
    index_html
        .lines()
        .filter(|line| is_list_item(line))
        .filter_map(|line| {
            let start = line.find("gid")?;
            let rest = &line[start..];
            let end = rest.find('/')?;
            Some(format!("{day_url}{}", &rest[..=end]))
        })
        .collect()
}

/// `.xml` hrefs listed in a `batters/` or `pitchers/` index.
pub fn extract_xml_hrefs(index_html: &str) -> Vec<String> {
    index_html
        .lines()
        .filter(|line| is_list_item(line))
        .filter_map(|line| {
            let start = line.find("href=\"")? + "href=\"".len();
            let rest = &line[start..];
            let href = &rest[..rest.find('"')?];
            href.to_ascii_lowercase().ends_with(".xml").then(|| href.to_string())
        })
        .collect()
}

/// Player file URLs under `dir_url`, keeping only those containing `player_id`
/// when one is given.
pub fn player_file_urls(dir_url: &str, index_html: &str, player_id: Option<&str>) -> Vec<String> {
    extract_xml_hrefs(index_html)
        .into_iter()
        .map(|href| format!("{dir_url}{href}"))
        .filter(|url| player_id.map_or(true, |id| url.contains(id)))
        .collect()
}

/// Per-game XML documents and the subtree each one is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Events,
    Boxscore,
    Roster,
    Umpires,
    Bench,
    Game,
    Innings,
    Plays,
}

impl ItemKind {
    pub const ALL: [ItemKind; 8] = [
        ItemKind::Events,
        ItemKind::Boxscore,
        ItemKind::Roster,
        ItemKind::Umpires,
        ItemKind::Bench,
        ItemKind::Game,
        ItemKind::Innings,
        ItemKind::Plays,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Events => "events",
            ItemKind::Boxscore => "boxscore",
            ItemKind::Roster => "roster",
            ItemKind::Umpires => "umpires",
            ItemKind::Bench => "bench",
            ItemKind::Game => "game",
            ItemKind::Innings => "innings",
            ItemKind::Plays => "plays",
        }
    }

    pub fn file(&self) -> &'static str {
        match self {
            ItemKind::Events => "game_events.xml",
            ItemKind::Boxscore => "rawboxscore.xml",
            ItemKind::Roster | ItemKind::Umpires => "players.xml",
            ItemKind::Bench => "bench.xml",
            ItemKind::Game => "game.xml",
            ItemKind::Innings => "inning/inning_all.xml",
            ItemKind::Plays => "plays.xml",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            ItemKind::Boxscore => "boxscore",
            ItemKind::Roster => "game/team",
            ItemKind::Umpires => "game/umpires",
            ItemKind::Bench => "bench",
            ItemKind::Events | ItemKind::Game | ItemKind::Innings | ItemKind::Plays => "game",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = CallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let known = ItemKind::ALL.map(|k| k.as_str());
                CallError::validation("item", format!("'{s}' is not one of: {}", known.join(", ")))
            })
    }
}

/// Returns the raw XML text of the first element matching `path`.
///
/// `path` is `/`-separated element names; the first segment names the document
/// root, the rest walk down through children.
pub fn select_subtree<'a>(operation: &str, xml: &'a str, path: &str) -> Result<&'a str, CallError> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| CallError::transport(operation, format!("malformed XML: {e}")))?;

    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let missing = || CallError::shape(operation, format!("element '{path}'"), "none");

    let root = doc.root_element();
    if segments.next() != Some(root.tag_name().name()) {
        return Err(missing());
    }

    let mut current = vec![root];
    for segment in segments {
        current = current
            .iter()
            .flat_map(|node| node.children())
            .filter(|n| n.is_element() && n.tag_name().name() == segment)
            .collect();
    }

    current
        .first()
        .map(|node| &xml[node.range()])
        .ok_or_else(missing)
}

/// Walks `path` through nested JSON objects.
pub fn select_json_path<'a>(operation: &str, value: &'a Value, path: &[&str]) -> Result<&'a Value, CallError> {
    let mut current = value;
    for (i, segment) in path.iter().enumerate() {
        current = current.get(*segment).ok_or_else(|| {
            CallError::shape(operation, format!("member '{}'", path[..=i].join(".")), "none")
        })?;
    }
    Ok(current)
}

/// Reads the `row` member at the end of `path` as a list.
///
/// The lookup service sends a bare object when there is one row and omits `row`
/// entirely when there are none.
pub fn select_rows(operation: &str, value: &Value, path: &[&str]) -> Result<Vec<Value>, CallError> {
    let Some((last, parent_path)) = path.split_last() else {
        return Ok(normalise_rows(value.clone()));
    };
    let parent = select_json_path(operation, value, parent_path)?;
    match parent.get(*last) {
        Some(rows) => Ok(normalise_rows(rows.clone())),
        None if parent.is_object() => Ok(Vec::new()),
        None => Err(CallError::shape(operation, "object", parent.to_string())),
    }
}

pub fn normalise_rows(rows: Value) -> Vec<Value> {
    match rows {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        single => vec![single],
    }
}

/// Keeps teams whose `sport_code` equals `code`, ignoring case.
pub fn filter_teams(rows: Vec<Value>, code: Option<&str>) -> Vec<Value> {
    match code {
        None => rows,
        Some(code) => rows
            .into_iter()
            .filter(|row| {
                row.get("sport_code")
                    .and_then(Value::as_str)
                    .is_some_and(|c| c.eq_ignore_ascii_case(code))
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DAY_INDEX: &str = r#"<html><head><title>Index of day_01</title></head><body>
<ul><li><a href="/components/game/mlb/year_2014/month_04/"> Parent Directory</a></li>
<li><a href="batters/"> batters/</a></li>
<li><a href="gid_2014_04_01_atlmlb_milmlb_1/"> gid_2014_04_01_atlmlb_milmlb_1/</a></li>
<li><a href="gid_2014_04_01_bosmlb_balmlb_1/"> gid_2014_04_01_bosmlb_balmlb_1/</a></li>
<li><a href="miniscoreboard.xml"> miniscoreboard.xml</a></li>
</ul></body></html>"#;

    const PLAYER_INDEX: &str = r#"<ul><li><a href="/components/"> Parent Directory</a></li>
<li><a href="112526.xml"> 112526.xml</a></li>
<li><a href="425844.xml"> 425844.xml</a></li>
<li><a href="notes.txt"> notes.txt</a></li>
</ul>"#;

    const PLAYERS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<game venue="Miller Park" date="April 1, 2014">
  <team type="away" id="ATL" name="Atlanta"><player id="1" first="A"/></team>
  <team type="home" id="MIL" name="Milwaukee"><player id="2" first="B"/></team>
  <umpires><umpire position="home" name="X"/></umpires>
</game>"#;

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2014, 4, 1).unwrap();
        assert_eq!(parse_date("2014-04-01").unwrap(), expected);
        assert_eq!(parse_date("04/01/2014").unwrap(), expected);
        assert_eq!(parse_date("20140401").unwrap(), expected);
        assert_eq!(parse_date(" 2014-04-01 ").unwrap(), expected);
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        for input in ["", "yesterday", "2014-13-01", "20141301", "2014/04/01"] {
            assert!(
                matches!(parse_date(input), Err(CallError::Validation { .. })),
                "{input}"
            );
        }
    }

    #[test]
    fn test_day_and_schedule_urls() {
        let endpoints = Endpoints::default();
        let date = NaiveDate::from_ymd_opt(2014, 4, 1).unwrap();
        assert_eq!(
            endpoints.day_url(date),
            "http://gd2.mlb.com/components/game/mlb/year_2014/month_04/day_01/"
        );
        assert_eq!(
            endpoints.schedule_url(date),
            "http://mlb.mlb.com/components/schedule/schedule_20140401.json"
        );
    }

    #[test]
    fn test_endpoints_trim_trailing_slash() {
        let endpoints = Endpoints::new("http://mirror/gd/", "http://mirror/site/");
        assert_eq!(endpoints.teams_url(), "http://mirror/site/lookup/json/named.search_autocomp.bam");
    }

    #[test]
    fn test_find_player_url() {
        let url = Endpoints::default().find_player_url("ortiz", true, "MLB").unwrap();
        assert_eq!(
            url,
            "http://mlb.mlb.com/lookup/json/named.search_player_all.bam?sport_code='mlb'&name_part='ORTIZ%25%25'&active_sw='Y'"
        );

        let url = Endpoints::default().find_player_url("de la rosa", false, "aaa").unwrap();
        assert!(url.contains("name_part='DE%20LA%20ROSA%25%25'"));
        assert!(url.ends_with("active_sw='N'"));
    }

    #[test]
    fn test_find_player_url_validation() {
        assert!(Endpoints::default().find_player_url("", true, "mlb").is_err());
        assert!(Endpoints::default().find_player_url("ortiz", true, "xyz").is_err());
    }

    #[test]
    fn test_pitcher_url() {
        let url = Endpoints::default().pitcher_url("2013", Some("425844"), "r").unwrap();
        assert_eq!(
            url,
            "http://mlb.mlb.com/lookup/json/named.mlb_bio_pitching_summary.bam?mlb_individual_pitching_season_sportcode.season=2013&player_id=425844&game_type=%27R%27&sort_by=%27season_asc%27"
        );
        assert!(Endpoints::default().pitcher_url("2013", Some("425844"), "q").is_err());
    }

    #[test]
    fn test_pitcher_url_without_player_covers_every_pitcher() {
        let url = Endpoints::default().pitcher_url("2013", None, "r").unwrap();
        assert!(url.contains("season=2013&player_id=&game_type=%27R%27"), "{url}");
        assert!(Endpoints::default().pitcher_url(" ", None, "r").is_err());
    }

    #[test]
    fn test_sport_code_whitelist() {
        assert_eq!(SPORT_CODES.len(), 27);
        assert_eq!(validate_sport_code("HSB").unwrap(), "hsb");
        assert!(validate_sport_code("nfl").is_err());
    }

    #[test]
    fn test_extract_game_links() {
        let day = "http://gd2.mlb.com/components/game/mlb/year_2014/month_04/day_01/";
        let links = extract_game_links(day, DAY_INDEX);
        assert_eq!(
            links,
            vec![
                format!("{day}gid_2014_04_01_atlmlb_milmlb_1/"),
                format!("{day}gid_2014_04_01_bosmlb_balmlb_1/"),
            ]
        );
    }

    #[test]
    fn test_extract_game_links_empty_day() {
        assert!(extract_game_links("http://x/", "<html><body>No games</body></html>").is_empty());
    }

    #[test]
    fn test_player_file_urls() {
        let dir = "http://x/gid_1/batters/";
        assert_eq!(
            player_file_urls(dir, PLAYER_INDEX, None),
            vec![format!("{dir}112526.xml"), format!("{dir}425844.xml")]
        );
        assert_eq!(
            player_file_urls(dir, PLAYER_INDEX, Some("425844")),
            vec![format!("{dir}425844.xml")]
        );
        assert!(player_file_urls(dir, PLAYER_INDEX, Some("999")).is_empty());
    }

    #[test]
    fn test_item_kind_table() {
        assert_eq!("Roster".parse::<ItemKind>().unwrap(), ItemKind::Roster);
        assert_eq!(ItemKind::Roster.file(), "players.xml");
        assert_eq!(ItemKind::Roster.path(), "game/team");
        assert_eq!(ItemKind::Umpires.path(), "game/umpires");
        assert_eq!(ItemKind::Innings.file(), "inning/inning_all.xml");
        assert_eq!(ItemKind::Boxscore.file(), "rawboxscore.xml");
        assert!("scores".parse::<ItemKind>().is_err());
    }

    #[test]
    fn test_game_file_url() {
        assert_eq!(game_file_url("http://x/gid_1/", "game.xml").unwrap(), "http://x/gid_1/game.xml");
        assert_eq!(game_file_url("http://x/gid_1", "game.xml").unwrap(), "http://x/gid_1/game.xml");
        assert!(game_file_url(" ", "game.xml").is_err());
    }

    #[test]
    fn test_select_subtree_returns_first_match_verbatim() {
        let team = select_subtree("item", PLAYERS_XML, "game/team").unwrap();
        assert_eq!(
            team,
            r#"<team type="away" id="ATL" name="Atlanta"><player id="1" first="A"/></team>"#
        );

        let umpires = select_subtree("item", PLAYERS_XML, "game/umpires").unwrap();
        assert!(umpires.starts_with("<umpires>"));
    }

    #[test]
    fn test_select_subtree_root() {
        let game = select_subtree("item", PLAYERS_XML, "game").unwrap();
        assert!(game.starts_with("<game venue="));
        assert!(game.ends_with("</game>"));
    }

    #[test]
    fn test_select_subtree_missing_path() {
        let err = select_subtree("item", PLAYERS_XML, "boxscore").unwrap_err();
        assert!(matches!(err, CallError::ShapeMismatch { .. }));
        let err = select_subtree("item", PLAYERS_XML, "game/bench").unwrap_err();
        assert!(matches!(err, CallError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_select_subtree_malformed() {
        let err = select_subtree("item", "<html><p>404", "game").unwrap_err();
        assert!(matches!(err, CallError::Transport { .. }));
    }

    #[test]
    fn test_select_rows_normalises_single_row() {
        let single = json!({"search_player_all": {"queryResults": {"totalSize": "1", "row": {"name_display_first_last": "David Ortiz"}}}});
        let rows = select_rows("find-player", &single, PLAYERS_ROW_PATH).unwrap();
        assert_eq!(rows, vec![json!({"name_display_first_last": "David Ortiz"})]);

        let many = json!({"search_player_all": {"queryResults": {"totalSize": "2", "row": [{"a": 1}, {"a": 2}]}}});
        assert_eq!(select_rows("find-player", &many, PLAYERS_ROW_PATH).unwrap().len(), 2);
    }

    #[test]
    fn test_select_rows_without_row_is_empty() {
        let none = json!({"search_player_all": {"queryResults": {"totalSize": "0"}}});
        assert!(select_rows("find-player", &none, PLAYERS_ROW_PATH).unwrap().is_empty());
    }

    #[test]
    fn test_select_rows_missing_path() {
        let err = select_rows("teams", &json!({"other": {}}), TEAMS_ROW_PATH).unwrap_err();
        assert_eq!(
            err,
            CallError::shape("teams", "member 'search_autocomp'", "none")
        );
    }

    #[test]
    fn test_filter_teams() {
        let rows = vec![
            json!({"name_display_full": "Boston Red Sox", "sport_code": "mlb"}),
            json!({"name_display_full": "Pawtucket Red Sox", "sport_code": "aaa"}),
        ];
        let filtered = filter_teams(rows.clone(), Some("AAA"));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0]["name_display_full"], "Pawtucket Red Sox");
        assert_eq!(filter_teams(rows, None).len(), 2);
    }
}
