//! Command-line interface and run reporting

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::auth;
use crate::client::ProductionGmailClient;
use crate::config::{Config, RunConfig};
use crate::engine::{run_filterfox, ProgressCallback};
use crate::error::{FilterFoxError, Result};
use crate::history::{HistoryEntry, RunHistory};
use crate::models::{RunMode, RunResult};

#[derive(Parser, Debug)]
#[command(name = "filterfox")]
#[command(version)]
#[command(about = "Label and archive Gmail messages using header rules", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "filterfox.toml")]
    pub config: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Per-run overrides of the `[run]` config section
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Gmail search query selecting candidate messages
    #[arg(long)]
    pub query: Option<String>,

    /// Maximum number of messages to inspect
    #[arg(long)]
    pub max_results: Option<usize>,

    /// Namespace prepended to every generated label
    #[arg(long)]
    pub label_prefix: Option<String>,

    /// Also write a Markdown report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with Gmail API
    Auth {
        /// Force re-authentication even if a token is cached
        #[arg(long)]
        force: bool,
    },

    /// Classify messages and show the planned actions without changing anything
    Preview {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Classify messages and apply labels (and archiving) in Gmail
    Apply {
        #[command(flatten)]
        args: RunArgs,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show recent runs
    History {
        /// Number of runs to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "filterfox.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

/// Truncate a string to max_len characters, adding "..." if truncated
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        format!(
            "{}...",
            s.chars().take(max_len.saturating_sub(3)).collect::<String>()
        )
    }
}

/// Progress reporter using indicatif
pub struct ProgressReporter {
    multi: MultiProgress,
    spinner_style: ProgressStyle,
    counter_style: ProgressStyle,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::with_multi(MultiProgress::new())
    }

    /// Share a MultiProgress with the log writer so log lines print above the bars
    pub fn with_multi(multi: MultiProgress) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        let counter_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {pos} messages processed {msg}")
            .unwrap()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        Self {
            multi,
            spinner_style,
            counter_style,
        }
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Spinner that counts processed messages; the total is unknown until listing finishes
    pub fn add_counter(&self) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.counter_style.clone());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Finish a spinner and clear it from the multi-progress display
    pub fn finish_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        println!("  ✓ {}", msg);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// A finished (or partially finished) run, ready for display
pub struct Report {
    pub mode: RunMode,
    pub run: RunConfig,
    pub result: RunResult,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl Report {
    pub fn title(&self) -> &'static str {
        match self.mode {
            RunMode::Preview => "Preview",
            RunMode::Apply => "Applied",
        }
    }

    /// Generate Markdown report
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!("# FilterFox Run ({})\n\n", self.title()));
        if self.mode == RunMode::Preview {
            md.push_str("> **Preview mode** - no messages were modified.\n\n");
        }
        md.push_str(&format!(
            "Generated: {}\n\n",
            self.completed_at.format("%Y-%m-%d %H:%M:%S")
        ));

        md.push_str("## Summary\n\n");
        md.push_str(&format!("- **Query:** `{}`\n", self.run.query));
        md.push_str(&format!("- **Max results:** {}\n", self.run.max_results));
        md.push_str(&format!("- **Label prefix:** {}\n", self.run.label_prefix));
        md.push_str(&format!("- **Found:** {}\n", self.result.found));
        md.push_str(&format!("- **Classified:** {}\n", self.result.classified));
        md.push_str(&format!("- **Skipped:** {}\n", self.result.skipped));
        md.push_str(&format!("- **Applied:** {}\n", self.result.applied));
        md.push_str(&format!(
            "- **Duration:** {} seconds\n\n",
            (self.completed_at - self.started_at).num_seconds()
        ));

        md.push_str("## Messages\n\n");
        if self.result.results.is_empty() {
            md.push_str("_No messages matched a rule._\n");
            return md;
        }

        md.push_str("| Message | Category | Reason | Label | Archive | Summary |\n");
        md.push_str("|---------|----------|--------|-------|---------|---------|\n");
        for r in &self.result.results {
            md.push_str(&format!(
                "| {} | {} | {} | `{}` | {} | {} |\n",
                r.message_id,
                r.category,
                r.reason,
                r.action.label,
                if r.action.archive { "Yes" } else { "No" },
                r.summary.replace('|', "\\|")
            ));
        }

        md
    }

    /// Print summary and per-message table to stdout
    pub fn print(&self) {
        println!("\n========================================");
        println!("FilterFox {}", self.title());
        println!("========================================");
        println!("Query: {}", self.run.query);
        println!(
            "Found: {}  Classified: {}  Skipped: {}  Applied: {}",
            self.result.found, self.result.classified, self.result.skipped, self.result.applied
        );
        println!("========================================");

        for r in &self.result.results {
            println!(
                "{:<18} {:<12} {:<28} {:<7} {}",
                truncate_string(&r.message_id, 18),
                r.category.as_str(),
                truncate_string(&r.action.label, 28),
                if r.action.archive { "archive" } else { "keep" },
                truncate_string(&r.summary, 70)
            );
        }
    }

    /// Save report to file
    pub async fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, self.to_markdown()).await
    }
}

/// Ask a yes/no question on stdin; anything but "y"/"yes" is a no
fn confirm_action(prompt: &str) -> Result<bool> {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let answer = input.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Build the run settings for one subcommand invocation.
///
/// The subcommand decides the mode; `run.dry_run` from the file is ignored.
pub fn resolve_run_config(config: &Config, mode: RunMode, args: &RunArgs) -> Result<RunConfig> {
    let mut run = config.run.clone().with_overrides(
        args.query.as_deref(),
        args.max_results,
        args.label_prefix.as_deref(),
    );
    run.dry_run = mode == RunMode::Preview;
    run.validate()?;
    Ok(run)
}

/// Load config, authenticate, run the pipeline once, and record the outcome.
///
/// Returns `Ok(None)` if the operator declined the apply confirmation.
pub async fn run_pipeline(
    cli: &Cli,
    mode: RunMode,
    args: &RunArgs,
    skip_confirm: bool,
    multi: MultiProgress,
) -> Result<Option<Report>> {
    let reporter = ProgressReporter::with_multi(multi);

    let config_spinner = reporter.add_spinner("Loading configuration...");
    let config = Config::load(&cli.config).await?;
    let run = resolve_run_config(&config, mode, args)?;
    reporter.finish_spinner(
        &config_spinner,
        &format!("Configuration loaded (prefix: {})", run.label_prefix),
    );

    if mode == RunMode::Apply && !skip_confirm {
        let prompt = format!(
            "Apply labels to up to {} messages matching '{}'?",
            run.max_results, run.query
        );
        if !confirm_action(&prompt)? {
            println!("Aborted.");
            return Ok(None);
        }
    }

    let auth_spinner = reporter.add_spinner("Authenticating with Gmail API...");
    let hub =
        auth::initialize_gmail_hub(&config.gmail.credentials_path, &config.gmail.token_path)
            .await?;
    reporter.finish_spinner(&auth_spinner, "Gmail API authenticated");

    let client = ProductionGmailClient::new(hub);

    let counter = reporter.add_counter();
    let tick = counter.clone();
    let on_progress: ProgressCallback = Arc::new(move || tick.inc(1));

    let started_at = Utc::now();
    let outcome = run_filterfox(&client, &run, Some(on_progress)).await;
    counter.finish_and_clear();

    let result = match outcome {
        Ok(result) => result,
        Err(FilterFoxError::RunAborted {
            message_id,
            partial,
            source,
        }) => {
            let report = Report {
                mode,
                run: run.clone(),
                result: (*partial).clone(),
                started_at,
                completed_at: Utc::now(),
            };
            report.print();
            return Err(FilterFoxError::RunAborted {
                message_id,
                partial,
                source,
            });
        }
        Err(e) => return Err(e),
    };

    let report = Report {
        mode,
        run: run.clone(),
        result,
        started_at,
        completed_at: Utc::now(),
    };

    RunHistory::append(
        &config.history.path,
        HistoryEntry::new(&run, &report.result),
        config.history.max_entries,
    )
    .await?;

    if let Some(path) = &args.report {
        report.save(path).await?;
        tracing::info!("Report written to {:?}", path);
    }

    Ok(Some(report))
}

/// Print the most recent runs from the history file
pub async fn show_history(cli: &Cli, limit: usize) -> Result<()> {
    let config = Config::load(&cli.config).await?;
    let history = RunHistory::load(&config.history.path).await?;

    if history.is_empty() {
        println!("No runs recorded yet.");
        println!("History file: {:?}", config.history.path);
        return Ok(());
    }

    println!(
        "{:<20} {:<8} {:>6} {:>10} {:>8} {:>8}  {}",
        "When", "Mode", "Found", "Classified", "Skipped", "Applied", "Query"
    );
    for entry in history.entries().iter().take(limit) {
        println!(
            "{:<20} {:<8} {:>6} {:>10} {:>8} {:>8}  {}",
            entry.ts.format("%Y-%m-%d %H:%M:%S"),
            entry.mode,
            entry.stats.found,
            entry.stats.classified,
            entry.stats.skipped,
            entry.stats.applied,
            entry.query
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, MessageResult, PlannedAction};

    fn sample_report(mode: RunMode) -> Report {
        let now = Utc::now();
        Report {
            mode,
            run: RunConfig::default(),
            result: RunResult {
                found: 3,
                classified: 1,
                skipped: 2,
                applied: if mode == RunMode::Apply { 1 } else { 0 },
                results: vec![MessageResult {
                    message_id: "18c2f".to_string(),
                    category: Category::Promotions,
                    reason: "Promo keywords in subject".to_string(),
                    summary: "From=\"a|b@shop.example\" Subject=\"Sale\"".to_string(),
                    action: PlannedAction {
                        label: "FilterFox/Promotions".to_string(),
                        archive: true,
                    },
                }],
            },
            started_at: now,
            completed_at: now,
        }
    }

    #[test]
    fn test_cli_parses_preview_overrides() {
        let cli = Cli::try_parse_from([
            "filterfox",
            "preview",
            "--query",
            "in:inbox",
            "--max-results",
            "25",
            "--label-prefix",
            "Sorted",
        ])
        .unwrap();

        match cli.command {
            Commands::Preview { args } => {
                assert_eq!(args.query.as_deref(), Some("in:inbox"));
                assert_eq!(args.max_results, Some(25));
                assert_eq!(args.label_prefix.as_deref(), Some("Sorted"));
                assert!(args.report.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(cli.config, PathBuf::from("filterfox.toml"));
    }

    #[test]
    fn test_cli_parses_apply_with_yes() {
        let cli = Cli::try_parse_from(["filterfox", "-v", "apply", "--yes"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Apply { yes: true, .. }));
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("a much longer string", 10), "a much ...");
    }

    #[test]
    fn test_markdown_report_preview() {
        let md = sample_report(RunMode::Preview).to_markdown();
        assert!(md.contains("# FilterFox Run (Preview)"));
        assert!(md.contains("no messages were modified"));
        assert!(md.contains("- **Skipped:** 2"));
        assert!(md.contains("| 18c2f | Promotions |"));
        assert!(md.contains("a\\|b@shop.example"));
    }

    #[test]
    fn test_markdown_report_apply_without_results() {
        let mut report = sample_report(RunMode::Apply);
        report.result.results.clear();
        let md = report.to_markdown();
        assert!(md.contains("# FilterFox Run (Applied)"));
        assert!(!md.contains("no messages were modified"));
        assert!(md.contains("_No messages matched a rule._"));
    }

    #[test]
    fn test_resolve_run_config_mode_comes_from_subcommand() {
        let mut config = Config::default();
        config.run.dry_run = true;
        let run = resolve_run_config(&config, RunMode::Apply, &RunArgs::default()).unwrap();
        assert_eq!(run.mode(), RunMode::Apply);

        config.run.dry_run = false;
        let run = resolve_run_config(&config, RunMode::Preview, &RunArgs::default()).unwrap();
        assert_eq!(run.mode(), RunMode::Preview);
    }

    #[test]
    fn test_resolve_run_config_applies_and_validates_overrides() {
        let args = RunArgs {
            query: Some(" label:news ".to_string()),
            max_results: Some(0),
            ..RunArgs::default()
        };
        let result = resolve_run_config(&Config::default(), RunMode::Preview, &args);
        assert!(matches!(result, Err(FilterFoxError::ConfigError(_))));

        let args = RunArgs {
            max_results: Some(10),
            ..args
        };
        let run = resolve_run_config(&Config::default(), RunMode::Preview, &args).unwrap();
        assert_eq!(run.query, "label:news");
        assert_eq!(run.max_results, 10);
    }

    #[tokio::test]
    async fn test_report_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("run.md");
        sample_report(RunMode::Preview).save(&path).await.unwrap();

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(written.starts_with("# FilterFox Run"));
    }
}
