/*
[INPUT]:  CLI arguments, YAML configuration file, environment, OS shutdown signals
[OUTPUT]: SageSpace command results on stdout
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, subcommands, or shutdown handling
*/

mod cli;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use sagespace_cli::{App, AppConfig};

#[derive(Parser, Debug)]
#[command(name = "sagespace", version, about = "SageSpace command-line client")]
struct Cli {
    #[arg(long = "config", value_name = "PATH", global = true)]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info", global = true)]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the home feed
    Feed {
        #[arg(long, default_value_t = 1)]
        pages: usize,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// List sages
    Sages {
        #[arg(long)]
        recommended: bool,
    },
    /// List notifications
    Notifications {
        #[arg(long)]
        unread: bool,
        #[arg(long = "mark-all-read")]
        mark_all_read: bool,
    },
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account
    Signup {
        email: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Start Google sign-in and print the authorization URL
    Google,
    /// Finish OAuth sign-in from the redirected callback URL
    OauthCallback { url: String },
    /// Send a password reset email
    ResetPassword { email: String },
    /// Sign out and forget the stored token
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Follow auth state changes until interrupted
    Watch,
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a YAML configuration template
    Init {
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Write defaults without prompting
        #[arg(long)]
        defaults: bool,
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    let command = match args.command {
        Command::Config {
            command: ConfigCommand::Init { output, defaults, force },
        } => {
            cli::init::run_init(output, defaults, force).context("config init")?;
            return Ok(());
        }
        command => command,
    };

    let config = AppConfig::load(args.config_path.as_deref()).context("load config")?;
    debug!(
        demo_mode = config.api_url.is_none(),
        guest_mode = config.gotrue_config().is_none(),
        "configuration loaded"
    );

    if matches!(command, Command::Config { command: ConfigCommand::Show }) {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    let app = App::build(config).context("build client")?;
    let shutdown = app.shutdown_token();
    setup_signal_handlers(shutdown.clone());

    app.start().await;

    let result = tokio::select! {
        _ = shutdown.cancelled() => {
            info!("interrupted");
            Ok(())
        }
        result = run_command(&app, command, shutdown.clone()) => result,
    };

    app.stop();
    result
}

async fn run_command(app: &App, command: Command, shutdown: CancellationToken) -> Result<()> {
    let session = app.session.as_ref();
    match command {
        Command::Feed { pages, limit } => cli::read::run_feed(&app.queries, pages, limit).await,
        Command::Sages { recommended } => cli::read::run_sages(&app.queries, recommended).await,
        Command::Notifications { unread, mark_all_read } => {
            cli::read::run_notifications(&app.queries, unread, mark_all_read).await
        }
        Command::Login { email } => cli::auth::run_login(session, email).await,
        Command::Signup { email, name } => cli::auth::run_signup(session, email, name).await,
        Command::Google => cli::auth::run_google(session).await,
        Command::OauthCallback { url } => cli::auth::run_oauth_callback(session, &url).await,
        Command::ResetPassword { email } => cli::auth::run_reset_password(session, &email).await,
        Command::Logout => cli::auth::run_logout(session).await,
        Command::Whoami => {
            cli::auth::run_whoami(session);
            Ok(())
        }
        Command::Watch => cli::auth::run_watch(session, shutdown).await,
        Command::Config { .. } => Ok(()),
    }
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
