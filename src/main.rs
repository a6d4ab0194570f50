use anyhow::Result;
use clap::Parser;
use filterfox::auth::{self, GMAIL_MODIFY_SCOPE};
use filterfox::cli::{self, Cli, Commands};
use filterfox::config::Config;
use filterfox::error::FilterFoxError;
use filterfox::models::RunMode;
use indicatif::MultiProgress;
use std::io::Write;
use std::process;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// A writer that prints through MultiProgress to avoid progress bar conflicts
#[derive(Clone)]
struct MultiProgressWriter {
    multi: Arc<MultiProgress>,
    buffer: Arc<std::sync::Mutex<Vec<u8>>>,
}

impl MultiProgressWriter {
    fn new(multi: Arc<MultiProgress>) -> Self {
        Self {
            multi,
            buffer: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }
}

impl Write for MultiProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let Ok(mut buffer) = self.buffer.lock() else {
            return Ok(());
        };
        if !buffer.is_empty() {
            let msg = String::from_utf8_lossy(&buffer);
            let msg = msg.trim_end_matches('\n');
            if !msg.is_empty() {
                let _ = self.multi.println(msg);
            }
            buffer.clear();
        }
        Ok(())
    }
}

impl Drop for MultiProgressWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// MakeWriter implementation for tracing
#[derive(Clone)]
struct MultiProgressMakeWriter {
    multi: Arc<MultiProgress>,
}

impl MultiProgressMakeWriter {
    fn new(multi: Arc<MultiProgress>) -> Self {
        Self { multi }
    }
}

impl<'a> MakeWriter<'a> for MultiProgressMakeWriter {
    type Writer = MultiProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MultiProgressWriter::new(Arc::clone(&self.multi))
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        if let Some(FilterFoxError::RunAborted { .. }) = e.downcast_ref::<FilterFoxError>() {
            eprintln!("Labels applied before the failure were kept.");
        }
        eprintln!("\nFor help, run: filterfox --help");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // On Windows, ring avoids the NASM/CMake build requirement of aws-lc-rs
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("filterfox=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("filterfox=info,warn"))
    };

    // Logs print above progress bars
    let multi_progress = Arc::new(MultiProgress::new());
    let make_writer = MultiProgressMakeWriter::new(Arc::clone(&multi_progress));

    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(make_writer)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(make_writer)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }

    tracing::debug!("filterfox {} starting", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Auth { force } => {
            let config = Config::load(&cli.config).await?;
            let token_path = &config.gmail.token_path;

            if *force && token_path.exists() {
                tokio::fs::remove_file(token_path).await?;
                tracing::info!("Removed existing token cache");
            }

            // Triggers the browser consent flow when no valid token is cached
            let hub = auth::initialize_gmail_hub(&config.gmail.credentials_path, token_path).await?;

            println!("Successfully authenticated with Gmail API");
            println!("Token cached at: {:?}", token_path);

            let (_, profile) = hub
                .users()
                .get_profile("me")
                .add_scope(GMAIL_MODIFY_SCOPE)
                .doit()
                .await?;
            println!(
                "Connected to account: {}",
                profile.email_address.unwrap_or_default()
            );

            Ok(())
        }

        Commands::Preview { args } => {
            println!("Preview mode - no messages will be modified");

            if let Some(report) = cli::run_pipeline(
                &cli,
                RunMode::Preview,
                args,
                true,
                (*multi_progress).clone(),
            )
            .await?
            {
                report.print();
            }
            Ok(())
        }

        Commands::Apply { args, yes } => {
            if let Some(report) = cli::run_pipeline(
                &cli,
                RunMode::Apply,
                args,
                *yes,
                (*multi_progress).clone(),
            )
            .await?
            {
                report.print();
                println!(
                    "Archived {} of {} labelled messages",
                    report.result.archived_count(),
                    report.result.applied
                );
            }
            Ok(())
        }

        Commands::History { limit } => {
            cli::show_history(&cli, *limit).await?;
            Ok(())
        }

        Commands::InitConfig { output, force } => {
            tracing::info!("Generating example configuration file");

            if output.exists() && !force {
                return Err(FilterFoxError::ConfigError(format!(
                    "Configuration file already exists at {:?}. Use --force to overwrite.",
                    output
                ))
                .into());
            }

            Config::create_example(output).await?;

            println!("Created example configuration file at: {:?}", output);
            println!("\nKey settings to review:");
            println!("  - gmail.credentials_path: OAuth client secret downloaded from Google Cloud");
            println!("  - run.query: Gmail search selecting candidate messages");
            println!("  - run.label_prefix: Namespace for all created labels");
            println!("  - run.dry_run: Used by library callers only; the CLI mode comes from `preview` or `apply`");

            Ok(())
        }
    }
}
