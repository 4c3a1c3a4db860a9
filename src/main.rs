mod client;
mod config;
mod differ;
mod dispatcher;
mod editor;
mod error;
mod fuzzy_matcher;
mod i18n;
mod ledger;
mod router;
mod scroll_sync;
mod session;
mod storage;
mod store_manager;
mod tui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::fs::OpenOptions;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use client::HttpBackend;
use config::Config;
use differ::Differ;
use dispatcher::{Outcome, MAX_RETRIES};
use editor::{ActiveError, EditorState};
use i18n::I18n;
use ledger::{HistoryFilter, Ledger};
use router::route_for;
use session::Session;
use storage::CommandRecord;
use store_manager::HistoryStore;

#[derive(Parser)]
#[command(name = "quill", version)]
#[command(about = "Transform notes through an AI backend, keep a command history, and diff results")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform text with a natural-language command
    Run {
        /// Command, e.g. "summarize this" or "make it more formal"
        #[arg(required = true)]
        command: String,
        /// Read the source text from a file
        #[arg(long, short = 'f', conflicts_with = "text")]
        file: Option<PathBuf>,
        /// Source text given inline (stdin is used when neither is set)
        #[arg(long, short = 't')]
        text: Option<String>,
        /// Show a diff of the source and the result
        #[arg(long, short = 'd')]
        diff: bool,
        /// Write the result back to --file
        #[arg(long, short = 'w', requires = "file")]
        write: bool,
    },
    /// Open the two-pane editor
    Edit {
        /// Note to edit; Ctrl-S writes the result back to it
        file: Option<PathBuf>,
    },
    /// List recent commands
    History {
        /// Which outcomes to show
        #[arg(long, value_enum, default_value_t = HistoryFilter::All)]
        status: HistoryFilter,
        /// Fuzzy search over command and result
        #[arg(long, short = 's')]
        search: Option<String>,
        /// Maximum number of records to display
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one record in full
    Show {
        /// Record id or unique id prefix
        id: String,
    },
    /// Run a past command again on its original text
    Reuse {
        /// Record id or unique id prefix
        id: String,
        /// Also write the result to this file
        #[arg(long, short = 'w')]
        write: Option<PathBuf>,
    },
    /// Show history statistics
    Stats,
    /// Clear the command history
    Clean,
}

fn init_logging() {
    let default_level = "warn";
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let log_path = Config::log_path();
    if let Some(dir) = log_path.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    // The editor owns the screen, so logs go to a file.
    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        Err(_) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .try_init();
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = Config::new()?;
    let i18n = I18n::new(&config.get_effective_language());
    let ledger = Ledger::open(HistoryStore::new(config.history_path()));
    if !ledger.is_persistent() {
        eprintln!("{}", i18n.t("storage_memory_only").yellow());
    }
    let backend = HttpBackend::new(
        &config.api.base_url,
        config.api.token.clone(),
        Duration::from_secs(config.api.timeout_secs),
    );
    tracing::debug!(base_url = backend.base_url(), "backend configured");

    match cli.command {
        Commands::Run { command, file, text, diff, write } => {
            let source = read_source(file.as_deref(), text, &i18n)?;
            let mut session = Session::new(EditorState::new(source), ledger, backend);
            session.editor.command = command;
            let ok = run_and_report(&mut session, &i18n, diff).await;
            if ok && write {
                if let Some(path) = &file {
                    write_result(path, &session.editor.edited_text, &i18n)?;
                }
            }
            if !ok {
                std::process::exit(1);
            }
        }
        Commands::Edit { file } => {
            let source = match &file {
                Some(path) if path.exists() => read_source(Some(path), None, &i18n)?,
                _ => String::new(),
            };
            let session = Session::new(EditorState::new(source), ledger, backend);
            let debounce = Duration::from_millis(config.editor.scroll_debounce_ms);
            let mut app = tui::EditorApp::new(session, &i18n, file, debounce);
            tui::run(&mut app, config.display.alt_screen).await?;
        }
        Commands::History { status, search, limit } => {
            let records = ledger.search(status, search.as_deref());
            if records.is_empty() {
                println!("{}", i18n.t("no_records"));
                return Ok(());
            }
            let limit = limit.unwrap_or(config.display.max_history_shown);
            let shown = records.len().min(limit);
            println!(
                "{}",
                i18n.t_format("history_title", &[&shown.to_string(), &records.len().to_string()]).bold()
            );
            for record in records.into_iter().take(limit) {
                print_history_line(record, &i18n);
            }
        }
        Commands::Show { id } => {
            let Some(record) = ledger.get(&id) else {
                println!("{}", i18n.t_format("record_not_found", &[&id]).red());
                return Ok(());
            };
            print_record(record, &i18n);
        }
        Commands::Reuse { id, write } => {
            let mut session = Session::new(EditorState::default(), ledger, backend);
            if !session.reuse(&id) {
                println!("{}", i18n.t_format("record_not_found", &[&id]).red());
                return Ok(());
            }
            println!("{}", i18n.t_format("reuse_running", &[&session.editor.command]).dimmed());
            let ok = run_and_report(&mut session, &i18n, true).await;
            if ok {
                if let Some(path) = &write {
                    write_result(path, &session.editor.edited_text, &i18n)?;
                }
            } else {
                std::process::exit(1);
            }
        }
        Commands::Stats => print_stats(&ledger, &i18n),
        Commands::Clean => {
            let mut ledger = ledger;
            if ledger.is_empty() {
                println!("{}", i18n.t("no_records"));
                return Ok(());
            }
            println!(
                "{}",
                i18n.t_format("confirm_clean_title", &[&ledger.len().to_string()]).red().bold()
            );
            if !confirm(&i18n.t("confirm_delete_prompt"))? {
                println!("{}", i18n.t("confirm_aborted").yellow());
                return Ok(());
            }
            ledger.clear();
            println!("{}", i18n.t("cleaned_all").green());
        }
    }

    Ok(())
}

/// Submit the session's command, offering retries on a terminal. Returns
/// whether a result was produced.
async fn run_and_report<B: client::TransformBackend>(
    session: &mut Session<B>,
    i18n: &I18n,
    show_diff: bool,
) -> bool {
    let route = route_for(&session.editor.command);
    println!(
        "{}",
        i18n.t_format("processing", &[session.editor.command.trim(), &route.to_string()]).dimmed()
    );

    let mut result = session.submit().await;
    loop {
        if let Ok(Outcome::Transformed { .. }) = result {
            if show_diff {
                if let Some(diff) = session.ledger.latest().and_then(|r| Differ::diff_record(r, i18n)) {
                    print!("{}", diff);
                }
            } else {
                println!("{}", i18n.t("result_header").cyan().bold());
                println!("{}", session.editor.edited_text);
            }
            return true;
        }

        if let Some(err) = session.editor.error() {
            print_error(err, i18n);
        }
        if !session.can_retry() || !io::stdin().is_terminal() {
            return false;
        }
        if !confirm(&i18n.t("retry_prompt")).unwrap_or(false) {
            return false;
        }
        let attempt = session.retry_count() + 1;
        println!(
            "{}",
            i18n.t_format("retry_attempt", &[&attempt.to_string(), &MAX_RETRIES.to_string()]).dimmed()
        );
        result = session.retry().await;
    }
}

fn print_error(err: &ActiveError, i18n: &I18n) {
    eprintln!("{}", i18n.t(err.key).red().bold());
    if let Some(detail) = &err.detail {
        eprintln!("  {}", detail.dimmed());
    }
}

fn read_source(file: Option<&Path>, text: Option<String>, i18n: &I18n) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("{}: {}", i18n.t("error_read_input"), path.display()));
    }
    let mut buffer = String::new();
    if !io::stdin().is_terminal() {
        io::stdin()
            .read_to_string(&mut buffer)
            .context(i18n.t("error_read_input"))?;
    }
    Ok(buffer)
}

fn write_result(path: &Path, text: &str, i18n: &I18n) -> Result<()> {
    std::fs::write(path, text)
        .with_context(|| format!("{}: {}", i18n.t("error_write_result"), path.display()))?;
    println!("{}", i18n.t_format("result_written", &[&path.display().to_string()]).green());
    Ok(())
}

fn status_label(record: &CommandRecord, i18n: &I18n) -> ColoredString {
    if record.success {
        i18n.t("status_ok").green()
    } else {
        i18n.t("status_failed").red()
    }
}

fn print_history_line(record: &CommandRecord, i18n: &I18n) {
    let short_id: String = record.id.chars().take(18).collect();
    println!(
        "{}  {}  [{}]  {}",
        short_id.dimmed(),
        record.local_time().yellow(),
        status_label(record, i18n),
        record.command
    );
}

fn print_record(record: &CommandRecord, i18n: &I18n) {
    println!("{}: {}", i18n.t("show_id").bold(), record.id);
    println!("{}: {}", i18n.t("show_command").bold(), record.command);
    println!("{}: {}", i18n.t("show_time").bold(), record.local_time());
    println!("{}: {}", i18n.t("show_status").bold(), status_label(record, i18n));
    if let Some(info) = &record.agent_info {
        println!(
            "{}: {} ({}ms)",
            i18n.t("show_engine").bold(),
            info.model,
            info.processing_time_ms
        );
        if let Some(tokens) = info.tokens_used {
            println!("{}: {}", i18n.t("show_tokens").bold(), tokens);
        }
        if let Some(confidence) = info.confidence_score {
            println!("{}: {:.2}", i18n.t("show_confidence").bold(), confidence);
        }
    }
    if let Some(error) = &record.error {
        println!("{}: {}", i18n.t("show_error").bold(), error.red());
    }
    println!();
    match Differ::diff_record(record, i18n) {
        Some(diff) => print!("{}", diff),
        None => {
            println!("{}", i18n.t("show_original").cyan().bold());
            println!("{}", record.original_text);
        }
    }
}

fn print_stats(ledger: &Ledger, i18n: &I18n) {
    let stats = ledger.stats();
    if stats.total == 0 {
        println!("{}", i18n.t("no_records"));
        return;
    }
    println!("{}", i18n.t("stats_title").bold().cyan());
    println!("{}", i18n.t_format("stats_total", &[&stats.total.to_string()]));
    println!("{}", i18n.t_format("stats_success", &[&stats.succeeded.to_string()]).green());
    println!("{}", i18n.t_format("stats_failed", &[&stats.failed.to_string()]).red());
    println!("{}", i18n.t_format("stats_rate", &[&format!("{:.1}", stats.success_rate())]));
    if let Some(avg) = stats.avg_processing_ms {
        println!("{}", i18n.t_format("stats_avg_time", &[&avg.to_string()]));
    }
    if !stats.by_model.is_empty() {
        println!("{}", i18n.t("stats_models").yellow());
        for (model, count) in &stats.by_model {
            println!("  {:<24} {}", model, count);
        }
    }
    println!("{}", i18n.t("stats_routes").yellow());
    for (route, count) in &stats.by_route {
        println!("  {:<24} {}", route, count);
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt.yellow());
    io::stdout().flush().ok();
    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return Ok(false);
    }
    Ok(input.trim().eq_ignore_ascii_case("yes"))
}
