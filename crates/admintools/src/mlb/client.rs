use std::time::Duration;

use admintools_core::error::CallError;
use admintools_core::mlb::{
    extract_game_links, filter_teams, game_file_url, parse_date, player_file_urls, select_rows,
    select_subtree, validate_sport_code, Endpoints, ItemKind, PITCHING_ROW_PATH, PLAYERS_ROW_PATH,
    TEAMS_ROW_PATH,
};
use futures::{StreamExt, TryStreamExt};
use serde_json::Value;

use super::fetch::{Fetcher, HttpFetcher};
use crate::call::bounded;

/// Player files fetched at once.
const PLAYER_FETCHES: usize = 4;

/// Root element of a Gameday player file.
const PLAYER_ROOT: &str = "Player";

/// MLB statistics lookups. Stateless: every call is a plain GET.
pub struct MlbClient {
    fetcher: Box<dyn Fetcher>,
    endpoints: Endpoints,
    timeout: Duration,
}

impl MlbClient {
    pub fn new(fetcher: Box<dyn Fetcher>, endpoints: Endpoints, timeout: Duration) -> Self {
        Self {
            fetcher,
            endpoints,
            timeout,
        }
    }

    pub fn http(endpoints: Endpoints, timeout: Duration) -> Self {
        Self::new(Box::new(HttpFetcher::new()), endpoints, timeout)
    }

    async fn fetch(&self, operation: &str, url: &str) -> Result<String, CallError> {
        log::debug!("{operation}: GET {url}");
        bounded(self.timeout, operation, self.fetcher.get_text(url))
            .await
            .map_err(|e| e.in_operation(operation))
    }

    async fn fetch_json(&self, operation: &str, url: &str) -> Result<Value, CallError> {
        let body = self.fetch(operation, url).await?;
        serde_json::from_str(&body)
            .map_err(|e| CallError::transport(operation, format!("malformed JSON: {e}")))
    }

    /// Game directory URLs for one day.
    pub async fn games(&self, date: &str) -> Result<Vec<String>, CallError> {
        let date = parse_date(date)?;
        let label = format!("games({date})");
        let day_url = self.endpoints.day_url(date);

        let index = self.fetch(&label, &day_url).await?;
        Ok(extract_game_links(&day_url, &index))
    }

    /// Raw XML of one per-game document, narrowed to the kind's subtree.
    pub async fn item(&self, game_url: &str, kind: ItemKind) -> Result<String, CallError> {
        let url = game_file_url(game_url, kind.file())?;
        let label = format!("item({kind})");

        let xml = self.fetch(&label, &url).await?;
        Ok(select_subtree(&label, &xml, kind.path())?.to_string())
    }

    /// `Player` documents of a game's batters (or pitchers), optionally just one player.
    pub async fn players(
        &self,
        game_url: &str,
        player_id: Option<&str>,
        pitchers: bool,
    ) -> Result<Vec<String>, CallError> {
        let dir = game_file_url(game_url, if pitchers { "pitchers/" } else { "batters/" })?;
        let label = format!("players({dir})");
        let player_id = player_id.map(str::trim).filter(|id| !id.is_empty());

        let index = self.fetch(&label, &dir).await?;
        let urls = player_file_urls(&dir, &index, player_id);
        log::debug!("{label}: {} player file(s)", urls.len());

        let label = label.as_str();

        futures::stream::iter(urls)
            .map(|url| async move {
                let xml = self.fetch(label, &url).await?;
                select_subtree(label, &xml, PLAYER_ROOT).map(str::to_string)
            })
            .buffered(PLAYER_FETCHES)
            .try_collect()
            .await
    }

    pub async fn schedule(&self, date: &str) -> Result<Value, CallError> {
        let date = parse_date(date)?;
        let label = format!("schedule({date})");
        self.fetch_json(&label, &self.endpoints.schedule_url(date))
            .await
    }

    /// Every team, or those of one sport code.
    pub async fn teams(&self, sport_code: Option<&str>) -> Result<Vec<Value>, CallError> {
        let sport_code = sport_code.map(validate_sport_code).transpose()?;
        let label = "teams";

        let answer = self.fetch_json(label, &self.endpoints.teams_url()).await?;
        let rows = select_rows(label, &answer, TEAMS_ROW_PATH)?;
        Ok(filter_teams(rows, sport_code.as_deref()))
    }

    pub async fn find_player(
        &self,
        name: &str,
        active: bool,
        sport_code: &str,
    ) -> Result<Vec<Value>, CallError> {
        let url = self.endpoints.find_player_url(name, active, sport_code)?;
        let label = format!("findPlayer({})", name.trim());

        let answer = self.fetch_json(&label, &url).await?;
        select_rows(&label, &answer, PLAYERS_ROW_PATH)
    }

    /// Season pitching summary rows of one player, or of every pitcher when
    /// `player_id` is unset.
    pub async fn pitcher(
        &self,
        season: &str,
        player_id: Option<&str>,
        game_type: &str,
    ) -> Result<Vec<Value>, CallError> {
        let url = self.endpoints.pitcher_url(season, player_id, game_type)?;
        let label = match player_id {
            Some(id) => format!("pitcher({}, {})", id.trim(), season.trim()),
            None => format!("pitcher({})", season.trim()),
        };

        let answer = self.fetch_json(&label, &url).await?;
        select_rows(&label, &answer, PITCHING_ROW_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mlb::fetch::mock::MockFetcher;
    use serde_json::json;

    const DAY: &str = "http://gd2.mlb.com/components/game/mlb/year_2014/month_04/day_01/";
    const GAME: &str =
        "http://gd2.mlb.com/components/game/mlb/year_2014/month_04/day_01/gid_2014_04_01_atlmlb_milmlb_1/";

    const DAY_INDEX: &str = r#"<ul><li><a href="batters/"> batters/</a></li>
<li><a href="gid_2014_04_01_atlmlb_milmlb_1/"> gid_2014_04_01_atlmlb_milmlb_1/</a></li>
<li><a href="gid_2014_04_01_bosmlb_balmlb_1/"> gid_2014_04_01_bosmlb_balmlb_1/</a></li>
</ul>"#;

    const BATTERS_INDEX: &str = r#"<ul><li><a href="/components/"> Parent Directory</a></li>
<li><a href="435522.xml"> 435522.xml</a></li>
<li><a href="518692.xml"> 518692.xml</a></li>
</ul>"#;

    const PLAYERS_XML: &str = r#"<?xml version="1.0"?><game venue="Miller Park"><team type="away" id="ATL"><player id="435522"/></team><umpires><umpire name="Joe West"/></umpires></game>"#;

    fn client(fetcher: &MockFetcher) -> MlbClient {
        MlbClient::new(
            Box::new(fetcher.clone()),
            Endpoints::default(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_games_lists_game_directories() {
        let fetcher = MockFetcher::new(&[(DAY, DAY_INDEX)]);

        let games = client(&fetcher).games("04/01/2014").await.unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0], GAME);
        assert_eq!(fetcher.urls(), vec![DAY.to_string()]);
    }

    #[tokio::test]
    async fn test_bad_date_is_validation_without_fetch() {
        let fetcher = MockFetcher::default();
        let err = client(&fetcher).games("yesterday").await.unwrap_err();
        assert!(matches!(err, CallError::Validation { .. }));
        assert!(fetcher.urls().is_empty());
    }

    #[tokio::test]
    async fn test_item_selects_subtree() {
        let url = format!("{GAME}players.xml");
        let fetcher = MockFetcher::new(&[(url.as_str(), PLAYERS_XML)]);
        let client = client(&fetcher);

        let umpires = client.item(GAME, ItemKind::Umpires).await.unwrap();
        assert_eq!(umpires, r#"<umpires><umpire name="Joe West"/></umpires>"#);

        let roster = client
            .item(GAME.trim_end_matches('/'), ItemKind::Roster)
            .await
            .unwrap();
        assert!(roster.starts_with(r#"<team type="away""#));
    }

    #[tokio::test]
    async fn test_missing_item_file_is_remote_fault() {
        let fetcher = MockFetcher::default();
        let err = client(&fetcher).item(GAME, ItemKind::Bench).await.unwrap_err();
        match err {
            CallError::RemoteFault {
                operation, code, ..
            } => {
                assert_eq!(operation, "item(bench)");
                assert_eq!(code, 404);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_players_filters_by_id() {
        let batters = format!("{GAME}batters/");
        let one = format!("{batters}435522.xml");
        let two = format!("{batters}518692.xml");
        let fetcher = MockFetcher::new(&[
            (batters.as_str(), BATTERS_INDEX),
            (one.as_str(), r#"<Player id="435522" pos="C"/>"#),
            (two.as_str(), r#"<Player id="518692" pos="3B"/>"#),
        ]);
        let client = client(&fetcher);

        let all = client.players(GAME, None, false).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[1].contains("518692"));

        let one_player = client.players(GAME, Some("435522"), false).await.unwrap();
        assert_eq!(one_player, vec![r#"<Player id="435522" pos="C"/>"#.to_string()]);
    }

    #[tokio::test]
    async fn test_teams_filters_by_sport_code() {
        let answer = json!({
            "search_autocomp": {
                "team_all": {
                    "queryResults": {
                        "totalSize": "2",
                        "row": [
                            { "name_display_full": "Atlanta Braves", "sport_code": "mlb" },
                            { "name_display_full": "Gwinnett Braves", "sport_code": "AAA" }
                        ]
                    }
                }
            }
        })
        .to_string();
        let fetcher = MockFetcher::new(&[(
            "http://mlb.mlb.com/lookup/json/named.search_autocomp.bam",
            answer.as_str(),
        )]);
        let client = client(&fetcher);

        assert_eq!(client.teams(None).await.unwrap().len(), 2);
        let aaa = client.teams(Some("aaa")).await.unwrap();
        assert_eq!(aaa.len(), 1);
        assert_eq!(aaa[0]["name_display_full"], "Gwinnett Braves");

        let err = client.teams(Some("xyz")).await.unwrap_err();
        assert!(matches!(err, CallError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_find_player_single_row_is_a_list() {
        let url = "http://mlb.mlb.com/lookup/json/named.search_player_all.bam?sport_code='mlb'&name_part='TROUT%25%25'&active_sw='Y'";
        let answer = json!({
            "search_player_all": {
                "queryResults": {
                    "totalSize": "1",
                    "row": { "name_display_first_last": "Mike Trout", "player_id": "545361" }
                }
            }
        })
        .to_string();
        let fetcher = MockFetcher::new(&[(url, answer.as_str())]);

        let rows = client(&fetcher).find_player("trout", true, "mlb").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["player_id"], "545361");
    }

    #[tokio::test]
    async fn test_pitcher_without_player_returns_every_row() {
        let url = "http://mlb.mlb.com/lookup/json/named.mlb_bio_pitching_summary.bam?mlb_individual_pitching_season_sportcode.season=2013&player_id=&game_type=%27R%27&sort_by=%27season_asc%27";
        let answer = json!({
            "mlb_bio_pitching_summary": {
                "mlb_individual_pitching_season": {
                    "queryResults": {
                        "totalSize": "2",
                        "row": [
                            { "player_id": "425844", "era": "2.63" },
                            { "player_id": "453286", "era": "3.15" }
                        ]
                    }
                }
            }
        })
        .to_string();
        let fetcher = MockFetcher::new(&[(url, answer.as_str())]);

        let rows = client(&fetcher).pitcher("2013", None, "r").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["player_id"], "453286");
        assert_eq!(fetcher.urls(), vec![url.to_string()]);
    }

    #[tokio::test]
    async fn test_schedule_malformed_json_is_transport() {
        let fetcher = MockFetcher::new(&[(
            "http://mlb.mlb.com/components/schedule/schedule_20140401.json",
            "<html>moved</html>",
        )]);
        let err = client(&fetcher).schedule("2014-04-01").await.unwrap_err();
        assert!(matches!(err, CallError::Transport { .. }));
    }
}
