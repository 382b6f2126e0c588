/*
[INPUT]:  CLI arguments, YAML configuration file, MMR_* environment
[OUTPUT]: Operator commands against the backend and the stage timer
[POS]:    Binary entry point
[UPDATE]: When changing CLI commands, startup flow, or logging setup
*/

mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use mmr_tracker::TrackerConfig;

use crate::cli::AppContext;

#[derive(Parser, Debug)]
#[command(name = "mmr-tracker", version, about = "Production stage timer for manufacturing orders")]
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
    /// Write a configuration file
    Init {
        #[arg(long, value_name = "PATH", default_value = "mmr-tracker.yaml")]
        output: PathBuf,
    },
    /// Create an account
    Signup {
        #[arg(long)]
        email: Option<String>,
    },
    /// Sign in and remember the session
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Sign out and discard local timers
    Logout,
    /// List orders with their recorded times
    Orders,
    /// Change the manufacturing number of an order
    Rename { order_id: String, number: String },
    /// Delete one order and its stage times
    Delete {
        order_id: String,
        #[arg(long)]
        yes: bool,
    },
    /// Delete every order and discard local timers
    DeleteAll {
        #[arg(long)]
        yes: bool,
    },
    /// Interactive timer session
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    if let Command::Init { output } = &args.command {
        init_tracing(&args.log_level, None)?;
        return cli::init::run_init(output);
    }

    let config = load_config(args.config_path.as_deref())?;
    let log_dir = matches!(args.command, Command::Run).then(|| config.log_dir());
    let _guard = init_tracing(&args.log_level, log_dir.as_deref())?;

    info!(
        config_path = ?args.config_path,
        data_dir = %config.data_dir().display(),
        "starting mmr-tracker"
    );

    let ctx = AppContext::new(config)?;
    match args.command {
        Command::Init { .. } => Ok(()),
        Command::Signup { email } => cli::commands::signup(&ctx, email).await,
        Command::Login { email } => cli::commands::login(&ctx, email).await,
        Command::Logout => {
            let mut coordinator = ctx.coordinator();
            cli::commands::logout(&ctx, &mut coordinator).await
        }
        Command::Orders => cli::commands::list_orders(&ctx).await,
        Command::Rename { order_id, number } => {
            cli::commands::rename(&ctx, &order_id, &number).await
        }
        Command::Delete { order_id, yes } => cli::commands::delete(&ctx, &order_id, yes).await,
        Command::DeleteAll { yes } => cli::commands::delete_all(&ctx, yes).await,
        Command::Run => cli::interactive::run_interactive(&ctx).await,
    }
}

/// Log to stderr, or to a daily file under `log_dir` so prompts stay clean.
fn init_tracing(log_level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;

    let Some(log_dir) = log_dir else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|err| anyhow!(err))
            .context("initialize tracing subscriber")?;
        return Ok(None);
    };

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("create log directory {}", log_dir.display()))?;
    let appender = tracing_appender::rolling::daily(log_dir, "mmr-tracker.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(Some(guard))
}

fn load_config(path: Option<&Path>) -> Result<TrackerConfig> {
    let config = TrackerConfig::load(path).context("load config")?;
    config.validate().context("invalid config")?;
    Ok(config)
}
