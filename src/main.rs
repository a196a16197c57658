use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{cursor::MoveToColumn, execute, terminal::Clear, terminal::ClearType};
use skyfeed::config::{Config, Overrides};
use skyfeed::feeds::bluesky::BskySession;
use skyfeed::notify::Notifier;
use skyfeed::poller::Poller;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const LOGO: &str = "🦋";

#[derive(Parser, Debug)]
#[command(name = "skyfeed")]
#[command(about = "Bluesky timeline, live in your terminal", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.config/skyfeed/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Account handle
    #[arg(long, env = "BSKY_HANDLE")]
    handle: Option<String>,

    /// App password for the account
    #[arg(long, env = "BSKY_APP_PASSWORD", hide_env_values = true)]
    app_password: Option<String>,

    /// Print critical posts only
    #[arg(long)]
    critical: bool,

    /// Never play the alert sound
    #[arg(long)]
    silent: bool,

    /// Disable the alert sound (same as sound.enabled = false)
    #[arg(long)]
    no_sound: bool,

    /// Seconds between polls
    #[arg(short, long)]
    interval: Option<u64>,

    /// Timeline items requested per poll
    #[arg(short, long)]
    limit: Option<u32>,

    /// Directory for daily post logs (must exist)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Typewriter effect for post bodies
    #[arg(long)]
    typing: bool,

    /// Remove emoji from post bodies
    #[arg(long)]
    strip_emoji: bool,

    /// Verbose diagnostics on stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            handle: self.handle.clone(),
            app_password: self.app_password.clone(),
            interval: self.interval,
            limit: self.limit,
            log_dir: self.log_dir.clone(),
            critical_only: self.critical,
            silent: self.silent,
            no_sound: self.no_sound,
            typing: self.typing,
            strip_emoji: self.strip_emoji,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "skyfeed=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        let mut stdout = std::io::stdout();
        let _ = execute!(stdout, MoveToColumn(0), Clear(ClearType::UntilNewLine));
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply(cli.overrides());
    config.validate()?;

    let mut stdout = std::io::stdout();
    print!("\n{} creating client...", LOGO);
    stdout.flush()?;

    let session = BskySession::login(
        &config.service,
        &config.credentials.handle,
        &config.credentials.app_password,
        config.timeout(),
    )
    .await
    .with_context(|| format!("cannot log in as {}", config.credentials.handle))?;

    execute!(stdout, MoveToColumn(0), Clear(ClearType::UntilNewLine))?;
    println!("{} @{}\n", LOGO, session.handle());
    tracing::info!(did = %session.did(), "logged in");

    let notifier = Notifier::from_config(&config, Box::new(std::io::stdout()))?;
    let mut poller = Poller::new(Box::new(session), notifier, &config);

    poller.run(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}
