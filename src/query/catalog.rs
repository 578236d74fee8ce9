use once_cell::sync::Lazy;

use crate::error::QueryError;
use crate::types::ColumnType;

static STANDARD_CATALOG: Lazy<QueryCatalog> = Lazy::new(QueryCatalog::standard);

/// A value the caller must supply before a query can run.
/// The SQL template refers to it as `:name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: String,
    pub param_type: ColumnType,
    pub prompt: String,
}

impl ParameterSpec {
    pub fn new(name: &str, param_type: ColumnType, prompt: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            prompt: prompt.to_string(),
        }
    }

    pub fn placeholder(&self) -> String {
        format!(":{}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDefinition {
    pub id: String,
    pub display_name: String,
    pub sql_template: String,
    pub parameters: Vec<ParameterSpec>,
}

impl QueryDefinition {
    pub fn new(id: &str, display_name: &str, sql_template: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            sql_template: sql_template.trim().to_string(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }
}

/// Fixed, ordered registry of the queries offered to the CLI and dashboard.
pub struct QueryCatalog {
    queries: Vec<QueryDefinition>,
}

impl QueryCatalog {
    pub fn new(queries: Vec<QueryDefinition>) -> Self {
        Self { queries }
    }

    pub fn global() -> &'static QueryCatalog {
        &STANDARD_CATALOG
    }

    pub fn list_queries(&self) -> &[QueryDefinition] {
        &self.queries
    }

    pub fn get(&self, id: &str) -> Result<&QueryDefinition, QueryError> {
        self.queries
            .iter()
            .find(|q| q.id == id)
            .ok_or_else(|| QueryError::UnknownQuery(id.to_string()))
    }

    /// Resolve either a query id or its 1-based position in the listing.
    pub fn resolve(&self, id_or_position: &str) -> Result<&QueryDefinition, QueryError> {
        match id_or_position.trim().parse::<usize>() {
            Ok(n) if n >= 1 => self
                .queries
                .get(n - 1)
                .ok_or_else(|| QueryError::UnknownQuery(id_or_position.to_string())),
            _ => self.get(id_or_position.trim()),
        }
    }

    pub fn standard() -> Self {
        let player = || ParameterSpec::new("player", ColumnType::Text, "Enter Player Name (e.g., 'Babe Ruth'): ");
        let year = || ParameterSpec::new("year", ColumnType::Integer, "Enter Year (e.g., 1927): ");

        Self::new(vec![
            QueryDefinition::new(
                "top_home_run_hitters",
                "Top 10 Players by Home Runs (All Time)",
                "SELECT player, SUM(home_runs) AS total_home_runs FROM home_runs_stats
                 GROUP BY player ORDER BY total_home_runs DESC LIMIT 10",
            ),
            QueryDefinition::new(
                "top_batting_averages",
                "Top 10 Players by Batting Average (Min 100 AB, All Time)",
                "SELECT player, AVG(batting_average) AS avg_batting_average FROM batting_average_stats
                 WHERE year IN (SELECT year FROM batting_average_stats GROUP BY year HAVING COUNT(player) >= 100)
                 GROUP BY player ORDER BY avg_batting_average DESC LIMIT 10",
            ),
            QueryDefinition::new(
                "player_home_runs_by_year",
                "Player's Home Runs Over Years",
                "SELECT year, home_runs FROM home_runs_stats WHERE player = :player ORDER BY year",
            )
            .with_parameter(player()),
            QueryDefinition::new(
                "player_strikeouts_by_year",
                "Player's Strikeouts Over Years",
                "SELECT year, strikeouts FROM strikeouts_stats WHERE player = :player ORDER BY year",
            )
            .with_parameter(ParameterSpec::new(
                "player",
                ColumnType::Text,
                "Enter Player Name (e.g., 'Jim Devlin'): ",
            )),
            QueryDefinition::new(
                "top_teams_by_wins_in_year",
                "Teams with Most Wins in a Specific Year",
                "SELECT team, wins FROM wins_stats WHERE year = :year ORDER BY wins DESC LIMIT 5",
            )
            .with_parameter(year()),
            QueryDefinition::new(
                "home_runs_per_year",
                "Total Home Runs per Year (All Leagues)",
                "SELECT year, SUM(home_runs) AS total_home_runs FROM home_runs_stats GROUP BY year ORDER BY year",
            ),
            QueryDefinition::new(
                "average_batting_average_per_year",
                "Average Batting Average per Year (All Leagues)",
                "SELECT year, AVG(batting_average) AS avg_batting_average FROM batting_average_stats
                 GROUP BY year ORDER BY year",
            ),
            QueryDefinition::new(
                "home_runs_and_strikeouts_in_year",
                "Players with Home Runs and Strikeouts in the Same Year",
                "SELECT H.year, H.player, H.home_runs, S.strikeouts
                 FROM home_runs_stats AS H JOIN strikeouts_stats AS S ON H.player = S.player AND H.year = S.year
                 WHERE H.year = :year ORDER BY H.player",
            )
            .with_parameter(ParameterSpec::new("year", ColumnType::Integer, "Enter Year (e.g., 1920): ")),
            QueryDefinition::new(
                "top_teams_by_stolen_bases",
                "Top 5 Teams by Stolen Bases (All Time)",
                "SELECT team, SUM(stolen_bases) AS total_stolen_bases FROM stolen_bases_stats
                 GROUP BY team ORDER BY total_stolen_bases DESC LIMIT 5",
            ),
            QueryDefinition::new(
                "players_per_year",
                "Total Number of Players Each Year (Across All Tables)",
                "SELECT year, COUNT(DISTINCT player) AS num_players FROM (
                     SELECT year, player FROM home_runs_stats
                     UNION ALL SELECT year, player FROM batting_average_stats
                     UNION ALL SELECT year, player FROM strikeouts_stats
                     UNION ALL SELECT year, player FROM wins_stats
                     UNION ALL SELECT year, player FROM stolen_bases_stats
                 ) AS combined_stats GROUP BY year ORDER BY year",
            ),
            QueryDefinition::new(
                "home_runs_vs_rbi_in_year",
                "Compare Home Runs and RBIs for Players in a Specific Year",
                "SELECT HR.year, HR.player, HR.home_runs, RBI.rbi
                 FROM home_runs_stats AS HR JOIN rbi_stats AS RBI ON HR.player = RBI.player AND HR.year = RBI.year
                 WHERE HR.year = :year ORDER BY HR.home_runs DESC",
            )
            .with_parameter(ParameterSpec::new("year", ColumnType::Integer, "Enter Year (e.g., 1920): ")),
            // Dashboard lookups
            QueryDefinition::new(
                "distinct_years",
                "All Years with Recorded Statistics",
                "SELECT DISTINCT year FROM home_runs_stats
                 UNION SELECT DISTINCT year FROM batting_average_stats
                 UNION SELECT DISTINCT year FROM strikeouts_stats
                 UNION SELECT DISTINCT year FROM rbi_stats
                 UNION SELECT DISTINCT year FROM wins_stats
                 ORDER BY year",
            ),
            QueryDefinition::new(
                "distinct_leagues",
                "All Leagues with Recorded Statistics",
                "SELECT DISTINCT league FROM home_runs_stats
                 UNION SELECT DISTINCT league FROM batting_average_stats
                 UNION SELECT DISTINCT league FROM strikeouts_stats
                 UNION SELECT DISTINCT league FROM rbi_stats
                 ORDER BY league",
            ),
            QueryDefinition::new(
                "team_wins_over_years",
                "Team Wins Over Years",
                "SELECT year, team, wins FROM wins_stats WHERE team = :team ORDER BY year",
            )
            .with_parameter(ParameterSpec::new("team", ColumnType::Text, "Enter Team Name (e.g., 'New York'): ")),
            QueryDefinition::new(
                "batting_average_by_league",
                "Batting Averages for One League",
                "SELECT year, league, player, team, batting_average FROM batting_average_stats
                 WHERE league = :league ORDER BY year",
            )
            .with_parameter(ParameterSpec::new("league", ColumnType::Text, "Enter League (AL or NL): ")),
        ])
    }
}
