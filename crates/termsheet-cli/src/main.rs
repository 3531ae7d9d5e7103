mod display;
mod export;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use termsheet_core::highlight;
use termsheet_core::validation::{self, TermsheetPair};
use termsheet_core::{
    DocumentQuery, DocumentStatus, FieldRecord, IntakeDocument, PortfolioSummary, StatusFilter,
    SwapKind, ValidationPolicy, document, rules, summary,
};
use termsheet_sync::{IntakeClient, SnapshotOrigin, TraderFeed, spawn_poller};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "termsheet", version, about = "Term sheet validation and highlighting")]
struct Cli {
    /// Validation policy TOML file.
    #[arg(long, global = true, env = "TERMSHEET_CONFIG")]
    config: Option<PathBuf>,

    /// Override the minimum confidence for `warning`.
    #[arg(long, global = true)]
    warning_threshold: Option<u8>,

    /// Print JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate one extracted record against its reference.
    Validate {
        extracted: PathBuf,
        expected: PathBuf,
        /// all, validated, warning or error.
        #[arg(long, default_value = "all")]
        status: StatusFilter,
        /// Case-insensitive filter on the term name.
        #[arg(long)]
        search: Option<String>,
    },
    /// Validate a list of {tradeId, termsheet, reference_swap} pairs.
    Batch { input: PathBuf },
    /// Segment extracted text by highlight spans.
    Highlight { text: PathBuf, spans: PathBuf },
    /// Check one extracted record against the swap consistency rules.
    Rules {
        record: PathBuf,
        /// cross-currency or amortising. Guessed from the fields when omitted.
        #[arg(long)]
        kind: Option<SwapKind>,
    },
    /// Present one document, or a filtered list when the file holds an array.
    Document {
        input: PathBuf,
        #[arg(long)]
        status: Option<DocumentStatus>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Validate a pair list and write the results to Parquet.
    Export {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Also print the batch as a table.
        #[arg(long)]
        preview: bool,
    },
    /// Fetch a trader's statistics from the intake API.
    Stats {
        #[arg(long, env = "TERMSHEET_API_URL", default_value = "http://localhost:5000")]
        base_url: String,
        #[arg(long)]
        email: String,
    },
    /// List every term sheet stored by the intake API.
    Termsheets {
        #[arg(long, env = "TERMSHEET_API_URL", default_value = "http://localhost:5000")]
        base_url: String,
    },
    /// Poll the intake API and re-validate on every refresh until interrupted.
    Watch {
        #[arg(long, env = "TERMSHEET_API_URL", default_value = "http://localhost:5000")]
        base_url: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value_t = 30)]
        interval_secs: u64,
        /// Pair list served until the first successful fetch.
        #[arg(long)]
        fallback: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let policy = load_policy(&cli)?;

    match cli.command {
        Command::Validate {
            extracted,
            expected,
            status,
            search,
        } => cmd_validate(&extracted, &expected, status, search, &policy, cli.json),
        Command::Batch { input } => cmd_batch(&input, &policy, cli.json),
        Command::Highlight { text, spans } => cmd_highlight(&text, &spans, cli.json),
        Command::Rules { record, kind } => cmd_rules(&record, kind, &policy, cli.json),
        Command::Document {
            input,
            status,
            name,
        } => cmd_document(&input, DocumentQuery { status, name }, &policy, cli.json),
        Command::Export {
            input,
            output,
            preview,
        } => cmd_export(&input, &output, preview, &policy),
        Command::Stats { base_url, email } => cmd_stats(&base_url, &email, cli.json).await,
        Command::Termsheets { base_url } => cmd_termsheets(&base_url, cli.json).await,
        Command::Watch {
            base_url,
            email,
            interval_secs,
            fallback,
        } => cmd_watch(&base_url, &email, interval_secs, fallback.as_deref(), &policy).await,
    }
}

fn load_policy(cli: &Cli) -> Result<ValidationPolicy> {
    let mut policy = match &cli.config {
        Some(path) => ValidationPolicy::load(path)
            .with_context(|| format!("loading policy from {}", path.display()))?,
        None => ValidationPolicy::default(),
    };
    if let Some(t) = cli.warning_threshold {
        policy.warning_threshold = t;
        policy.check().context("--warning-threshold")?;
    }
    Ok(policy)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ── Commands ──

fn cmd_validate(
    extracted: &Path,
    expected: &Path,
    status: StatusFilter,
    search: Option<String>,
    policy: &ValidationPolicy,
    json: bool,
) -> Result<()> {
    let extracted: FieldRecord = read_json(extracted)?;
    let expected: FieldRecord = read_json(expected)?;
    let results = validation::validate(&extracted, &expected, policy);

    let query = summary::ResultQuery { status, search };
    let shown = query.apply(&results);
    if json {
        return print_json(&shown);
    }

    display::print_results_table(&shown);
    println!();
    // The summary always covers every field, not just the filtered rows.
    display::print_summary(&summary::summarize(&results));
    Ok(())
}

fn cmd_batch(input: &Path, policy: &ValidationPolicy, json: bool) -> Result<()> {
    let pairs: Vec<TermsheetPair> = read_json(input)?;
    let trades = validation::validate_batch(&pairs, policy);
    info!(pairs = pairs.len(), validated = trades.len(), "batch validated");

    let portfolio = PortfolioSummary::from_documents(trades.iter().map(|t| t.results.as_slice()));
    if json {
        return print_json(&serde_json::json!({ "trades": trades, "portfolio": portfolio }));
    }

    for trade in &trades {
        display::print_trade_card(trade);
    }
    display::print_portfolio(&portfolio);
    Ok(())
}

fn cmd_highlight(text: &Path, spans: &Path, json: bool) -> Result<()> {
    let text = std::fs::read_to_string(text).with_context(|| format!("reading {}", text.display()))?;
    let spans = highlight::decode_spans(read_json(spans)?);
    let segments = highlight::segment(&text, &spans);
    if json {
        return print_json(&segments);
    }

    println!("{}", display::render_inline(&segments));
    println!();
    display::print_highlights(&segments);
    Ok(())
}

fn cmd_rules(
    path: &Path,
    kind: Option<SwapKind>,
    policy: &ValidationPolicy,
    json: bool,
) -> Result<()> {
    let record: FieldRecord = read_json(path)?;
    let kind = match kind.or_else(|| SwapKind::detect(&record)) {
        Some(kind) => kind,
        None => anyhow::bail!(
            "cannot tell the swap kind of {}; pass --kind cross-currency or --kind amortising",
            path.display()
        ),
    };
    let anomalies = rules::check(&record, kind, policy);
    info!(kind = kind.as_str(), anomalies = anomalies.len(), "rules checked");
    if json {
        return print_json(&anomalies);
    }

    println!("=== {} ({kind}) ===", path.display());
    display::print_anomalies(&anomalies);
    Ok(())
}

fn cmd_document(
    input: &Path,
    query: DocumentQuery,
    policy: &ValidationPolicy,
    json: bool,
) -> Result<()> {
    let value: serde_json::Value = read_json(input)?;
    if value.is_array() {
        let docs: Vec<IntakeDocument> =
            serde_json::from_value(value).with_context(|| format!("parsing {}", input.display()))?;
        let views: Vec<_> = docs.iter().map(|d| document::present(d, policy)).collect();
        let shown = document::filter_documents(&views, &query);
        if json {
            return print_json(&shown);
        }
        println!("{} of {} documents", shown.len(), views.len());
        for view in shown {
            display::print_document_row(view);
        }
        return Ok(());
    }

    let doc: IntakeDocument =
        serde_json::from_value(value).with_context(|| format!("parsing {}", input.display()))?;
    let view = document::present(&doc, policy);
    if json {
        return print_json(&view);
    }
    display::print_document_card(&view);
    Ok(())
}

fn cmd_export(input: &Path, output: &Path, preview: bool, policy: &ValidationPolicy) -> Result<()> {
    let pairs: Vec<TermsheetPair> = read_json(input)?;
    let trades = validation::validate_batch(&pairs, policy);
    let batch = termsheet_core::export::trades_to_batch(&trades).context("building record batch")?;
    if preview {
        let table = arrow::util::pretty::pretty_format_batches(std::slice::from_ref(&batch))
            .context("formatting preview")?;
        println!("{table}");
    }
    export::write_parquet(&batch, output)?;
    println!("{} rows -> {}", batch.num_rows(), output.display());
    Ok(())
}

async fn cmd_stats(base_url: &str, email: &str, json: bool) -> Result<()> {
    let client = IntakeClient::new(base_url);
    let stats = client
        .trader_stats(email)
        .await
        .with_context(|| format!("fetching stats for {email}"))?;
    if json {
        return print_json(&stats);
    }
    display::print_trader_stats(email, &stats);
    Ok(())
}

async fn cmd_termsheets(base_url: &str, json: bool) -> Result<()> {
    let client = IntakeClient::new(base_url);
    let sheets = client.fetch_termsheets().await.context("fetching term sheets")?;
    if json {
        return print_json(&sheets);
    }
    println!("{} term sheets", sheets.len());
    for sheet in &sheets {
        let id = sheet
            .get("tradeId")
            .or_else(|| sheet.get("_id"))
            .map(|v| v.display_text())
            .unwrap_or_else(|| "-".to_string());
        println!("  {:<24} {} fields", id, sheet.len());
    }
    Ok(())
}

async fn cmd_watch(
    base_url: &str,
    email: &str,
    interval_secs: u64,
    fallback: Option<&Path>,
    policy: &ValidationPolicy,
) -> Result<()> {
    let fallback: Vec<TermsheetPair> = match fallback {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };
    let feed = TraderFeed::new(IntakeClient::new(base_url), email);
    let handle = spawn_poller(Arc::new(feed), Duration::from_secs(interval_secs.max(1)), fallback);
    let mut rx = handle.subscribe();

    loop {
        tokio::select! {
            changed = rx.changed() => {
                changed.context("poller stopped")?;
                let snapshot = rx.borrow_and_update().clone();
                let trades = validation::validate_batch(&snapshot.pairs, policy);
                let portfolio =
                    PortfolioSummary::from_documents(trades.iter().map(|t| t.results.as_slice()));

                let source = match snapshot.origin {
                    SnapshotOrigin::Live => "live".to_string(),
                    SnapshotOrigin::Fallback => "fallback data".to_string(),
                    SnapshotOrigin::Stale => match snapshot.fetched_at {
                        Some(at) => format!("stale since {}", at.with_timezone(&chrono::Local).format("%H:%M:%S")),
                        None => "stale".to_string(),
                    },
                };
                println!("--- {} ({source}) ---", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
                if let Some(err) = &snapshot.last_error {
                    println!("  last error: {err}");
                }
                for trade in &trades {
                    display::print_trade_card(trade);
                }
                display::print_portfolio(&portfolio);
                println!();
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping poller");
                break;
            }
        }
    }

    handle.stop();
    Ok(())
}
