use anyhow::Context;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use baseball_stats::app::clean_use_case::CleanUseCase;
use baseball_stats::app::import_use_case::ImportUseCase;
use baseball_stats::config::{Config, DEFAULT_CONFIG_PATH};
use baseball_stats::infra::table_printer::{render_result, render_tables};
use baseball_stats::infra::{CleanedCsvSourceAdapter, CsvCleaningOutputAdapter, CsvRecordSourceAdapter};
use baseball_stats::logging;
use baseball_stats::observability::metrics;
use baseball_stats::pipeline::processing::schema::SchemaCatalog;
use baseball_stats::pipeline::storage::{describe_tables, ImportMode};
use baseball_stats::query::{QueryCatalog, QueryDefinition, QueryExecutor};

#[derive(Parser)]
#[command(name = "baseball_stats")]
#[command(about = "Clean, load and query baseball leader-board statistics")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Write Prometheus metrics text here on exit
    #[arg(long, global = true)]
    metrics_out: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean raw dataset files into `<dataset>_cleaned.csv`
    Clean {
        /// Clean only this dataset (e.g. home_runs_stats)
        #[arg(long)]
        dataset: Option<String>,
    },
    /// Load every cleaned file into the database
    Import {
        /// create_or_replace or append_existing; defaults to the configured mode
        #[arg(long)]
        mode: Option<ImportMode>,
    },
    /// Show the tables in the database
    Tables,
    /// List the available queries
    Queries,
    /// Run a query by id or list position
    Query {
        id: String,
        /// Query parameter as name=value; may be repeated
        #[arg(short = 'p', long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Clean, then import
    Run {
        #[arg(long)]
        mode: Option<ImportMode>,
    },
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected name=value, got '{}'", s))
}

async fn run_clean(config: &Config, catalog: Arc<SchemaCatalog>, dataset: Option<String>) -> anyhow::Result<()> {
    let dataset_ids: Vec<String> = match dataset {
        Some(id) => {
            catalog.get_schema(&id)?;
            vec![id]
        }
        None => catalog.dataset_ids().into_iter().map(String::from).collect(),
    };

    let use_case = CleanUseCase::new(
        catalog,
        Box::new(CsvRecordSourceAdapter::new(&config.paths.input_dir)),
        Box::new(CsvCleaningOutputAdapter::new(config.output_dir())?),
        config.cleaning.workers,
    );
    let ids: Vec<&str> = dataset_ids.iter().map(String::as_str).collect();
    let stats = use_case.clean_all(&ids).await?;

    println!("\nCleaning Results:");
    for summary in &stats.summaries {
        println!(
            "   {}: {} rows, {} kept, {} removed",
            summary.source_file, summary.total, summary.accepted, summary.rejected
        );
    }
    if !stats.missing.is_empty() {
        println!("   Missing input files: {}", stats.missing.join(", "));
    }
    for (dataset, error) in &stats.failed {
        println!("   Failed {}: {}", dataset, error);
    }
    if let Some(path) = &stats.removed_rows_log {
        println!("   Removed rows log: {}", path.display());
    }
    Ok(())
}

async fn run_import(config: &Config, catalog: Arc<SchemaCatalog>, mode: Option<ImportMode>) -> anyhow::Result<()> {
    let mode = mode.unwrap_or(config.import.mode);
    let use_case = ImportUseCase::new(
        catalog,
        Box::new(CleanedCsvSourceAdapter::new(config.output_dir())),
        config.store(),
        mode,
    );
    let stats = use_case.import_all().await?;

    println!("\nImport Results ({}):", mode);
    for result in &stats.results {
        println!(
            "   {}: {} imported, {} failed",
            result.table, result.rows_imported, result.rows_failed
        );
    }
    for (table, error) in &stats.skipped {
        println!("   Skipped {}: {}", table, error);
    }
    Ok(())
}

/// Fill in missing parameters from the terminal when one is attached.
fn prompt_missing(definition: &QueryDefinition, supplied: &mut HashMap<String, String>) -> anyhow::Result<()> {
    if !io::stdin().is_terminal() {
        return Ok(());
    }
    let stdin = io::stdin();
    for parameter in &definition.parameters {
        if supplied.contains_key(&parameter.name) {
            continue;
        }
        print!("{}", parameter.prompt);
        io::stdout().flush()?;
        let mut line = String::new();
        stdin.lock().read_line(&mut line)?;
        supplied.insert(parameter.name.clone(), line.trim().to_string());
    }
    Ok(())
}

fn run_query(config: &Config, id: &str, params: Vec<(String, String)>) -> anyhow::Result<()> {
    let catalog = QueryCatalog::global();
    let definition = catalog.resolve(id)?;
    let mut supplied: HashMap<String, String> = params.into_iter().collect();
    prompt_missing(definition, &mut supplied)?;

    let conn = config.store().connect()?;
    let result = QueryExecutor::new(catalog).execute(&conn, definition, &supplied)?;
    println!("\n{}\n", definition.display_name);
    println!("{}", render_result(&result));
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load_from(&cli.config)?;
    let _log_guard = logging::init_logging(&config.paths.log_dir);
    if let Err(e) = metrics::init() {
        warn!("Failed to install metrics recorder: {}", e);
    }
    info!(config = %cli.config.display(), "configuration loaded");

    let catalog = Arc::new(SchemaCatalog::standard());

    match cli.command {
        Commands::Clean { dataset } => run_clean(&config, catalog, dataset).await?,
        Commands::Import { mode } => run_import(&config, catalog, mode).await?,
        Commands::Tables => {
            let conn = config.store().connect()?;
            println!("{}", render_tables(&describe_tables(&conn)?));
        }
        Commands::Queries => {
            for (i, query) in QueryCatalog::global().list_queries().iter().enumerate() {
                println!("{:>3}. {:<36} {}", i + 1, query.id, query.display_name);
            }
        }
        Commands::Query { id, params } => run_query(&config, &id, params)?,
        Commands::Run { mode } => {
            run_clean(&config, Arc::clone(&catalog), None).await?;
            run_import(&config, catalog, mode).await?;
        }
    }

    if let Some(path) = cli.metrics_out {
        if let Some(text) = metrics::render() {
            std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
        }
    }
    Ok(())
}
