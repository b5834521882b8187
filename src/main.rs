use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use fastupload::config::default_config_path;
use fastupload::{start_upload, ChannelNotifier, ConnectionConfig, ProgressUpdate, UploadEvent};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Configuration file looked up in the working directory first.
const LOCAL_CONFIG: &str = "fastupload.toml";

#[derive(Parser)]
#[command(name = "fastupload")]
#[command(version, about = "Upload a file to an SFTP server with progress reporting")]
#[command(after_help = "EXAMPLES:
    # Upload using ./fastupload.toml
    fastupload world.zip

    # Use another configuration file
    fastupload -c ~/backups.toml world.zip

    # Override the target directory and report every 25%
    fastupload -d /srv/backups --interval 25 world.zip

    # Verify the server key against ~/.ssh/known_hosts
    fastupload --verify-host-key world.zip
")]
struct Cli {
    /// Local file to upload
    file: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SFTP server host name or address
    #[arg(long)]
    host: Option<String>,

    /// SFTP server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Login user
    #[arg(short, long)]
    user: Option<String>,

    /// Login password
    #[arg(long)]
    password: Option<String>,

    /// Remote target directory
    #[arg(short = 'd', long)]
    remote_dir: Option<String>,

    /// Check the server key against known_hosts instead of accepting any key
    #[arg(long)]
    verify_host_key: bool,

    /// Report progress every N percent
    #[arg(long, value_name = "PERCENT")]
    interval: Option<u32>,

    /// Print progress as text lines instead of a progress bar
    #[arg(long)]
    plain: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let upload = start_upload(cli.file.clone(), config, ChannelNotifier::new(tx));

    // Events are rendered here, on the caller's task, never on the upload task.
    let mut console = Console::new(cli.plain);
    let mut succeeded = false;
    while let Some(event) = rx.recv().await {
        succeeded |= matches!(event, UploadEvent::Completed);
        console.show(event);
    }

    match upload.await.context("upload task panicked")? {
        Ok(summary) => {
            tracing::debug!(remote = %summary.remote_path, "Upload task finished");
            println!(
                "Uploaded to {} in {:.1?} ({})",
                summary.remote_path,
                summary.duration,
                summary.throughput_human()
            );
        }
        Err(e) => tracing::debug!(error = %e, "Upload task finished with error"),
    }

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fastupload={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Pick the configuration file and apply command-line overrides.
fn load_config(cli: &Cli) -> Result<ConnectionConfig> {
    let path = cli.config.clone().or_else(|| {
        let local = PathBuf::from(LOCAL_CONFIG);
        if local.exists() {
            Some(local)
        } else {
            default_config_path().filter(|p| p.exists())
        }
    });

    let mut config = match &path {
        Some(path) => read_config(path)?,
        None => {
            tracing::warn!("No configuration file found, using command-line settings only");
            ConnectionConfig::new("", "", "")
        }
    };

    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(user) = &cli.user {
        config.username = user.clone();
    }
    if let Some(password) = &cli.password {
        config.password = password.clone();
    }
    if let Some(remote_dir) = &cli.remote_dir {
        config.remote_dir = remote_dir.clone();
    }
    if cli.verify_host_key {
        let known_hosts = config.known_hosts.clone();
        config = config.with_host_verification(known_hosts);
    }
    if let Some(interval) = cli.interval {
        config = config.with_progress_interval(interval);
    }

    if config.is_incomplete() {
        tracing::warn!("Please configure SFTP settings before uploading");
    }
    Ok(config)
}

fn read_config(path: &Path) -> Result<ConnectionConfig> {
    tracing::debug!(path = %path.display(), "Loading configuration");
    ConnectionConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

/// Terminal rendering of upload events.
struct Console {
    plain: bool,
    bar: Option<ProgressBar>,
}

impl Console {
    fn new(plain: bool) -> Self {
        Self { plain, bar: None }
    }

    fn show(&mut self, event: UploadEvent) {
        match event {
            UploadEvent::Status(text) => self.line(text.yellow().to_string()),
            UploadEvent::Warning(text) => self.line(text.yellow().bold().to_string()),
            UploadEvent::Progress(update) if self.plain => self.line(progress_line(&update)),
            UploadEvent::Progress(update) => self.progress(&update),
            UploadEvent::Completed => {
                self.finish();
                println!("{}", "Upload completed successfully!".green());
            }
            UploadEvent::Failed(message) => {
                self.finish();
                println!("{}", format!("Upload failed: {}", message).red());
            }
        }
    }

    fn line(&self, text: String) {
        match &self.bar {
            Some(bar) => bar.println(text),
            None => println!("{}", text),
        }
    }

    fn progress(&mut self, update: &ProgressUpdate) {
        let bar = self.bar.get_or_insert_with(|| {
            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("[{bar:40.cyan/blue}] {pos:>3}% {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            bar
        });
        bar.set_position(u64::from(update.percent));
        bar.set_message(format!(
            "{}/{} ({})",
            fastupload::format_size(update.transferred),
            fastupload::format_size(update.total),
            update.speed
        ));
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
    }
}

fn progress_line(update: &ProgressUpdate) -> String {
    update.to_string().yellow().to_string()
}
