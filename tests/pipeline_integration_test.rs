use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use baseball_stats::app::clean_use_case::CleanUseCase;
use baseball_stats::app::import_use_case::ImportUseCase;
use baseball_stats::error::QueryError;
use baseball_stats::infra::csv_source_adapter::parse_raw_csv;
use baseball_stats::infra::table_printer::render_result;
use baseball_stats::infra::{CleanedCsvSourceAdapter, CsvCleaningOutputAdapter, CsvRecordSourceAdapter};
use baseball_stats::pipeline::processing::schema::SchemaCatalog;
use baseball_stats::pipeline::processing::validate::ReasonCode;
use baseball_stats::pipeline::storage::{describe_tables, ImportMode, Store};
use baseball_stats::pipeline::CleaningPipeline;
use baseball_stats::query::{QueryCatalog, QueryExecutor};
use baseball_stats::types::CellValue;

const HOME_RUNS: &str = "\
Year,League,Player,Team,Home Runs
1927,AL,Babe Ruth,New York,60
1927,NL,Hack Wilson,Chicago,30
Year,League,Player,Team,Home Runs
1928,AL,Babe Ruth,New York,54
1929,AL,,New York,0
1930,XL,Nobody,Nowhere,12
1961,al , Roger Maris- ,New York,61
";

const STRIKEOUTS: &str = "\
Year,League,Player,Team,Strikeouts
1927,AL,Babe Ruth,New York,89
1961,AL,Roger Maris,New York,67
1962,NL,,-Mets-,abc
";

const BATTING_AVERAGE: &str = "\
Year,League,Player,Team,Batting Average
1901,AL,Nap Lajoie,Philadelphia,.426
1927,AL,Babe Ruth,New York,0.350xyz
";

fn write_inputs(dir: &Path) {
    fs::write(dir.join("home_runs_stats.csv"), HOME_RUNS).unwrap();
    fs::write(dir.join("strikeouts_stats.csv"), STRIKEOUTS).unwrap();
    fs::write(dir.join("batting_average_stats.csv"), BATTING_AVERAGE).unwrap();
}

fn clean_use_case(input: &Path, output: &Path, workers: usize) -> CleanUseCase {
    CleanUseCase::new(
        Arc::new(SchemaCatalog::standard()),
        Box::new(CsvRecordSourceAdapter::new(input)),
        Box::new(CsvCleaningOutputAdapter::new(output).unwrap()),
        workers,
    )
}

fn import_use_case(dir: &Path, store: &Store, mode: ImportMode) -> ImportUseCase {
    ImportUseCase::new(
        Arc::new(SchemaCatalog::standard()),
        Box::new(CleanedCsvSourceAdapter::new(dir)),
        store.clone(),
        mode,
    )
}

fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[tokio::test]
async fn test_clean_import_query_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    let stats = clean_use_case(dir.path(), dir.path(), 1)
        .clean_all(&["batting_average_stats", "home_runs_stats", "strikeouts_stats", "wins_stats"])
        .await
        .unwrap();
    assert_eq!(stats.missing, vec!["wins_stats".to_string()]);
    assert!(stats.failed.is_empty());

    let home_runs = stats.summaries.iter().find(|s| s.dataset == "home_runs_stats").unwrap();
    assert_eq!(home_runs.total, 7);
    assert_eq!(home_runs.accepted, 4);
    assert_eq!(home_runs.rejected_by_reason.get(&ReasonCode::OutOfDomain), Some(&2));
    assert_eq!(home_runs.rejected_by_reason.get(&ReasonCode::ZeroOrNullMetric), Some(&1));
    assert_eq!(home_runs.source_sha256.len(), 64);

    let cleaned = fs::read_to_string(dir.path().join("home_runs_stats_cleaned.csv")).unwrap();
    assert!(cleaned.starts_with("year,league,player,team,home_runs\n"));
    assert!(cleaned.contains("1961,AL,Roger Maris,New York,61\n"));

    let batting = fs::read_to_string(dir.path().join("batting_average_stats_cleaned.csv")).unwrap();
    assert!(batting.contains("1927,AL,Babe Ruth,New York,0.350\n"));

    let log = fs::read_to_string(dir.path().join("all_removed_rows_log.txt")).unwrap();
    assert_eq!(log.lines().count(), 1 + 4);
    assert!(log.lines().next().unwrap().ends_with("source_file\treason"));
    assert!(log.contains("strikeouts_stats.csv\tTypeCoercionFailure"));

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("cleaning_summary.json")).unwrap()).unwrap();
    assert_eq!(summary.as_array().unwrap().len(), 3);

    let store = Store::new(dir.path().join("db/stats.db"), Duration::from_secs(1));
    let imported = import_use_case(dir.path(), &store, ImportMode::CreateOrReplace)
        .import_all()
        .await
        .unwrap();
    assert_eq!(imported.results.len(), 3);
    assert_eq!(imported.rows_failed(), 0);
    assert_eq!(imported.rows_imported(), 4 + 2 + 2);

    let conn = store.connect().unwrap();
    let tables = describe_tables(&conn).unwrap();
    let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["batting_average_stats", "home_runs_stats", "strikeouts_stats"]);
    assert!(tables.iter().all(|t| t.primary_key == vec!["player", "year"]));

    let catalog = QueryCatalog::standard();
    let executor = QueryExecutor::new(&catalog);
    let ruth = executor
        .execute_by_id(&conn, "player_home_runs_by_year", &params(&[("player", "Babe Ruth")]))
        .unwrap();
    assert_eq!(ruth.row_count(), 2);
    assert_eq!(ruth.rows[0][0], CellValue::Integer(1927));

    let joined = executor
        .execute_by_id(&conn, "home_runs_and_strikeouts_in_year", &params(&[("year", "1961")]))
        .unwrap();
    assert_eq!(joined.row_count(), 1);
    assert!(render_result(&joined).contains("Roger Maris"));

    let err = executor
        .execute_by_id(&conn, "top_teams_by_wins_in_year", &params(&[("year", "1927; DROP TABLE x")]))
        .unwrap_err();
    assert!(matches!(err, QueryError::ParameterError { .. }));

    let all = executor.select_all(&conn, "home_runs_stats").unwrap();
    assert_eq!(all.columns, vec!["year", "league", "player", "team", "home_runs"]);

    // Stored cells match the accepted records, whatever order the store returns them in
    let accepted = CleaningPipeline::new(&SchemaCatalog::standard())
        .run(parse_raw_csv(HOME_RUNS.as_bytes()).unwrap(), "home_runs_stats")
        .unwrap()
        .accepted;
    let mut expected: Vec<HomeRunRow> = accepted
        .iter()
        .map(|record| home_run_row(&record.values().cloned().collect::<Vec<_>>()))
        .collect();
    let mut stored: Vec<HomeRunRow> = all.rows.iter().map(|row| home_run_row(row)).collect();
    expected.sort();
    stored.sort();
    assert_eq!(stored, expected);
    assert_eq!(
        stored,
        vec![
            (1927, "AL".to_string(), "Babe Ruth".to_string(), "New York".to_string(), "60".to_string()),
            (1927, "NL".to_string(), "Hack Wilson".to_string(), "Chicago".to_string(), "30".to_string()),
            (1928, "AL".to_string(), "Babe Ruth".to_string(), "New York".to_string(), "54".to_string()),
            (1961, "AL".to_string(), "Roger Maris".to_string(), "New York".to_string(), "61".to_string()),
        ]
    );
}

type HomeRunRow = (i64, String, String, String, String);

/// Comparable form of a `(year, league, player, team, home_runs)` row.
fn home_run_row(cells: &[CellValue]) -> HomeRunRow {
    let text = |i: usize| cells[i].as_str().unwrap().to_string();
    (
        cells[0].as_i64().unwrap(),
        text(1),
        text(2),
        text(3),
        cells[4].as_f64().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_append_rejects_duplicates_and_mismatched_tables() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    clean_use_case(dir.path(), dir.path(), 1)
        .clean_all(&["home_runs_stats"])
        .await
        .unwrap();

    let store = Store::new(dir.path().join("stats.db"), Duration::from_secs(1));
    import_use_case(dir.path(), &store, ImportMode::CreateOrReplace)
        .import_all()
        .await
        .unwrap();

    // Appending the same rows again collides on (player, year)
    let appended = import_use_case(dir.path(), &store, ImportMode::AppendExisting)
        .import_all()
        .await
        .unwrap();
    assert_eq!(appended.rows_imported(), 0);
    assert_eq!(appended.rows_failed(), 4);

    {
        let conn = store.connect().unwrap();
        conn.execute_batch("DROP TABLE home_runs_stats; CREATE TABLE home_runs_stats (year INTEGER, player TEXT);")
            .unwrap();
    }
    let mismatched = import_use_case(dir.path(), &store, ImportMode::AppendExisting)
        .import_all()
        .await
        .unwrap();
    assert!(mismatched.results.is_empty());
    assert_eq!(mismatched.skipped.len(), 1);
    assert!(mismatched.skipped[0].1.contains("Schema mismatch"));
}

#[tokio::test]
async fn test_concurrent_cleaning_writes_identical_files() {
    let sequential = tempfile::tempdir().unwrap();
    let concurrent = tempfile::tempdir().unwrap();
    write_inputs(sequential.path());
    write_inputs(concurrent.path());

    clean_use_case(sequential.path(), sequential.path(), 1)
        .clean_all(&["home_runs_stats"])
        .await
        .unwrap();
    clean_use_case(concurrent.path(), concurrent.path(), 3)
        .clean_all(&["home_runs_stats"])
        .await
        .unwrap();

    let read = |dir: &Path| fs::read_to_string(dir.join("home_runs_stats_cleaned.csv")).unwrap();
    assert_eq!(read(sequential.path()), read(concurrent.path()));
}

#[test]
fn test_cleaning_cleaned_output_changes_nothing() {
    let catalog = SchemaCatalog::standard();
    let pipeline = CleaningPipeline::new(&catalog);

    let first = pipeline
        .run(parse_raw_csv(HOME_RUNS.as_bytes()).unwrap(), "home_runs_stats")
        .unwrap();

    // Feed the accepted rows back through, using the cleaned column names as headers
    let mut rewritten = String::from("year,league,player,team,home_runs\n");
    for record in &first.accepted {
        let line: Vec<String> = record.values().map(|v| v.to_string()).collect();
        rewritten.push_str(&line.join(","));
        rewritten.push('\n');
    }
    let second = pipeline
        .run(parse_raw_csv(rewritten.as_bytes()).unwrap(), "home_runs_stats")
        .unwrap();

    assert!(second.rejected.is_empty());
    assert_eq!(second.accepted, first.accepted);
}
