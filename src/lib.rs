pub mod config;
pub mod model;
pub mod orchestrator;
pub mod panes;
pub mod query;
pub mod session;
pub mod transport;

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;

use config::ConsoleConfig;
use model::types::{Database, FilterClause, IndexDefinition, LogLibrary, Page, PaneId, TimeRange};
use orchestrator::{FetchOptions, FetchOutcome, QueryOrchestrator};
use panes::{PanePatch, PaneRegistry};
use session::SessionState;
use transport::{ApiResult, HttpLogService};

/// Upper bound for `--since`: ten years of minutes.
const MAX_SINCE_MINUTES: i64 = 60 * 24 * 366 * 10;

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "logq",
    version,
    about = "Query a log library from the terminal and rewrite log filters"
)]
pub struct Cli {
    /// Log query service URL (overrides LOGQ_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Session file remembering the last opened library
    #[arg(long, global = true)]
    pub session_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the clauses a filter would highlight
    Parse {
        filter: String,

        /// Emit JSON instead of tab-separated lines
        #[arg(long)]
        json: bool,
    },
    /// Add a clause to a filter, replacing any clause on the same key
    Upsert { filter: String, clause: String },
    /// Search a log library
    Search {
        /// Log library id (defaults to the last one searched)
        #[arg(long, short)]
        library: Option<i64>,

        /// Raw filter expression
        #[arg(long, short, default_value = "")]
        query: String,

        /// Extra clauses merged into the filter, one clause per key
        #[arg(long = "clause")]
        clauses: Vec<String>,

        /// Relative window in minutes, ending now
        #[arg(
            long,
            default_value_t = model::types::DEFAULT_RELATIVE_MINUTES,
            value_parser = clap::value_parser!(i64).range(1..=MAX_SINCE_MINUTES)
        )]
        since: i64,

        /// Absolute window start (unix seconds); requires --end
        #[arg(long, requires = "end")]
        start: Option<i64>,

        /// Absolute window end (unix seconds)
        #[arg(long, requires = "start")]
        end: Option<i64>,

        #[arg(long, default_value_t = model::types::FIRST_PAGE)]
        page: u32,

        #[arg(long)]
        page_size: Option<u32>,

        /// Skip the histogram request
        #[arg(long)]
        no_histogram: bool,

        /// Emit JSON
        #[arg(long)]
        json: bool,
    },
    /// List databases known to the service
    Databases {
        /// Only databases on this instance
        #[arg(long)]
        instance: Option<i64>,

        #[arg(long)]
        json: bool,
    },
    /// List the log libraries stored in a database
    Tables {
        #[arg(long, short)]
        database: i64,

        #[arg(long)]
        json: bool,
    },
    /// Show a log library's indexes, or replace them from a JSON file
    Indexes {
        #[arg(long, short)]
        table: i64,

        /// JSON array of index definitions to store instead of listing
        #[arg(long, value_name = "FILE")]
        set: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = ConsoleConfig::from_env();
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }
    if let Some(path) = cli.session_file {
        config.session_file = path;
    }

    match cli.command {
        Commands::Parse { filter, json } => {
            print!("{}", render_clauses(&query::filter::parse(&filter), json)?);
            Ok(())
        }
        Commands::Upsert { filter, clause } => {
            println!("{}", query::filter::upsert_clause(&filter, &clause));
            Ok(())
        }
        Commands::Search {
            library,
            query,
            clauses,
            since,
            start,
            end,
            page,
            page_size,
            no_histogram,
            json,
        } => {
            let window = match (start, end) {
                (Some(st), Some(et)) => TimeRange::new(st, et),
                _ => TimeRange::last_minutes(since, chrono::Utc::now().timestamp()),
            };
            let request = SearchRequest {
                library,
                query,
                clauses,
                window,
                page,
                page_size,
                histogram: !no_histogram,
            };
            run_search(&config, request, json).await
        }
        Commands::Databases { instance, json } => {
            let service = HttpLogService::new(&config).context("building log service client")?;
            let databases = service_reply(service.get_database_list(instance).await?, "database list")?;
            print!("{}", render_databases(&databases, json)?);
            Ok(())
        }
        Commands::Tables { database, json } => {
            let service = HttpLogService::new(&config).context("building log service client")?;
            let tables = service_reply(service.get_table_list(database).await?, "table list")?;
            print!("{}", render_tables(&tables, json)?);
            Ok(())
        }
        Commands::Indexes { table, set, json } => {
            let service = HttpLogService::new(&config).context("building log service client")?;
            if let Some(path) = set {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let indexes: Vec<IndexDefinition> = serde_json::from_str(&raw)
                    .with_context(|| format!("parsing index definitions in {}", path.display()))?;
                service_reply(service.set_indexes(table, &indexes).await?, "index update")?;
                eprintln!("stored {} indexes on log library {table}", indexes.len());
                return Ok(());
            }
            let indexes = service_reply(service.get_indexes(table).await?, "index list")?;
            print!("{}", render_indexes(&indexes, json)?);
            Ok(())
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "logq", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Tab-separated `key\tOPERATOR\tvalue` lines, or a JSON array.
pub fn render_clauses(clauses: &[FilterClause], json: bool) -> Result<String> {
    if json {
        return Ok(format!("{}\n", serde_json::to_string_pretty(clauses)?));
    }
    let mut out = String::new();
    for clause in clauses {
        let op = serde_json::to_value(clause.operator)?;
        out.push_str(&format!(
            "{}\t{}\t{}\n",
            clause.key,
            op.as_str().unwrap_or_default(),
            clause.value
        ));
    }
    Ok(out)
}

/// Unwrap a service reply, turning a reported failure into an error.
fn service_reply<T>(result: ApiResult<T>, what: &str) -> Result<T> {
    match result {
        ApiResult::Success(value) => Ok(value),
        ApiResult::Failure { code, message } => bail!("{what} failed (code {code}): {message}"),
    }
}

fn render_rows<T: serde::Serialize>(
    rows: &[T],
    json: bool,
    line: impl Fn(&T) -> String,
) -> Result<String> {
    if json {
        return Ok(format!("{}\n", serde_json::to_string_pretty(rows)?));
    }
    Ok(rows.iter().map(|row| format!("{}\n", line(row))).collect())
}

/// `id\tname\tinstance` lines, or a JSON array.
pub fn render_databases(databases: &[Database], json: bool) -> Result<String> {
    render_rows(databases, json, |db| {
        format!("{}\t{}\t{}", db.id, db.name, db.instance_name)
    })
}

/// `id\ttable\tdescription` lines, or a JSON array.
pub fn render_tables(tables: &[LogLibrary], json: bool) -> Result<String> {
    render_rows(tables, json, |table| {
        format!("{}\t{}\t{}", table.id, table.table_name, table.desc)
    })
}

pub fn render_indexes(indexes: &[IndexDefinition], json: bool) -> Result<String> {
    render_rows(indexes, json, |index| {
        format!("{}\t{}\t{}", index.field, index.typ, index.alias)
    })
}

#[derive(Debug, Clone)]
struct SearchRequest {
    library: Option<i64>,
    query: String,
    clauses: Vec<String>,
    window: TimeRange,
    page: u32,
    page_size: Option<u32>,
    histogram: bool,
}

async fn run_search(config: &ConsoleConfig, request: SearchRequest, json: bool) -> Result<()> {
    let mut session = SessionState::load(&config.session_file);
    let pane_id = match (request.library, session.last_pane.clone()) {
        (Some(id), _) => PaneId::from(id),
        (None, Some(last)) => last,
        (None, None) => bail!("no log library given and none remembered; pass --library"),
    };

    let keyword = request
        .clauses
        .iter()
        .fold(request.query.clone(), |kw, clause| {
            query::filter::upsert_clause(&kw, clause)
        });

    let service = HttpLogService::new(config).context("building log service client")?;
    let orchestrator = QueryOrchestrator::new(service, PaneRegistry::with_page_size(config.page_size));
    orchestrator.open_pane(pane_id.clone());
    let pane = orchestrator.update_pane(
        &pane_id,
        PanePatch::keyword(keyword)
            .with_time_range(request.window)
            .with_page(Page {
                number: request.page.max(1),
                size: request.page_size.unwrap_or(config.page_size),
            })
            .with_histogram_checked(request.histogram),
    );

    if let Err(e) = session.navigate(pane_id.clone(), &config.session_file) {
        tracing::warn!("failed to persist session: {e:#}");
    }

    let result = match orchestrator.refresh(&pane_id, FetchOptions::default()).await {
        FetchOutcome::Ready(result) => result,
        FetchOutcome::Failed => bail!("query failed for log library {pane_id}"),
        FetchOutcome::Superseded | FetchOutcome::UnknownPane => {
            bail!("query for log library {pane_id} did not complete")
        }
    };

    let total = result.high_charts.as_ref().map(|hc| hc.count);
    if json {
        let out = json!({
            "library": pane_id,
            "keyword": pane.keyword,
            "page": result.params.page,
            "page_size": result.params.page_size,
            "total": total,
            "histograms": result.high_charts.map(|hc| hc.histograms).unwrap_or_default(),
            "logs": result.logs.logs,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for row in &result.logs.logs {
        println!("{row}");
    }
    match total {
        Some(total) => eprintln!(
            "page {} ({} rows) of {total} matching",
            result.params.page,
            result.logs.logs.len()
        ),
        None => eprintln!("page {} ({} rows)", result.params.page, result.logs.logs.len()),
    }
    Ok(())
}

pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "log-query-console", "logq")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".logq"))
}
