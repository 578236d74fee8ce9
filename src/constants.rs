/// Dataset identifiers and the metric header each leader-board file carries.
/// The identifier doubles as the input file stem and the store table name.
pub const DATASETS: &[(&str, &str)] = &[
    ("base_on_balls_stats", "Base on Balls"),
    ("batting_average_stats", "Batting Average"),
    ("complete_games_stats", "Complete Games"),
    ("doubles_stats", "Doubles"),
    ("era_stats", "ERA"),
    ("games_stats", "Games"),
    ("hits_stats", "Hits"),
    ("home_runs_stats", "Home Runs"),
    ("on_base_percentage_stats", "On Base Percentage"),
    ("rbi_stats", "RBI"),
    ("runs_stats", "Runs"),
    ("saves_stats", "Saves"),
    ("shutouts_stats", "Shutouts"),
    ("slugging_average_stats", "Slugging Average"),
    ("stolen_bases_stats", "Stolen Bases"),
    ("strikeouts_stats", "Strikeouts"),
    ("total_bases_stats", "Total Bases"),
    ("triples_stats", "Triples"),
    ("winning_percentage_stats", "Winning Percentage"),
    ("wins_stats", "Wins"),
];

// Column headers shared by every leader-board file
pub const YEAR_COLUMN: &str = "Year";
pub const LEAGUE_COLUMN: &str = "League";
pub const PLAYER_COLUMN: &str = "Player";
pub const TEAM_COLUMN: &str = "Team";

/// Characters stripped from player and team names after trimming.
pub const NAME_STRIP_CHARS: &[char] = &['-'];

// File naming
pub const CSV_EXTENSION: &str = "csv";
pub const CLEANED_SUFFIX: &str = "_cleaned";
pub const REMOVED_ROWS_LOG: &str = "all_removed_rows_log.txt";
pub const SOURCE_FILE_COLUMN: &str = "source_file";
pub const REASON_COLUMN: &str = "reason";
pub const CLEANING_SUMMARY_FILE: &str = "cleaning_summary.json";

// Defaults used when no configuration is supplied
pub const DEFAULT_INPUT_DIR: &str = "baseball_stats_csvs";
pub const DEFAULT_DATABASE: &str = "database/baseball_stats.db";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Input file name for a dataset (`home_runs_stats` -> `home_runs_stats.csv`).
pub fn raw_file_name(dataset_id: &str) -> String {
    format!("{}.{}", dataset_id, CSV_EXTENSION)
}

/// Cleaned output file name for a dataset (`home_runs_stats` -> `home_runs_stats_cleaned.csv`).
pub fn cleaned_file_name(dataset_id: &str) -> String {
    format!("{}{}.{}", dataset_id, CLEANED_SUFFIX, CSV_EXTENSION)
}
