use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use scorecard_core::{AppConfig, QueueConfig, RateLimitedQueue};
use scorecard_server::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn cli() -> Command {
    Command::new("scorecard")
        .version(scorecard_server::VERSION)
        .about("Proficiency report service with a rate-limited generation queue")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("serve")
                .about("Run the HTTP API (default)")
                .arg(
                    Arg::new("bind")
                        .long("bind")
                        .value_parser(value_parser!(SocketAddr))
                        .help("Listen address, overrides config and SCORECARD_BIND"),
                )
                .arg(
                    Arg::new("rpm")
                        .long("rpm")
                        .value_parser(value_parser!(u32))
                        .help("Generation requests per minute"),
                )
                .arg(
                    Arg::new("max-pending")
                        .long("max-pending")
                        .value_parser(value_parser!(usize))
                        .help("Queued generation requests before rejecting"),
                ),
        )
        .subcommand(Command::new("check-config").about("Load and validate configuration"))
        .subcommand(
            Command::new("estimate")
                .about("Estimate queue wait for a number of generation requests")
                .arg(
                    Arg::new("items")
                        .long("items")
                        .required(true)
                        .value_parser(value_parser!(usize))
                        .help("Number of queued requests"),
                ),
        )
}

fn init_logging(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json()).try_init()?;
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()?;
    }
    Ok(())
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<AppConfig> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AppConfig::new(),
    };
    Ok(config.apply_env()?)
}

fn apply_serve_flags(mut config: AppConfig, args: &ArgMatches) -> AppConfig {
    if let Some(bind) = args.get_one::<SocketAddr>("bind") {
        config = config.with_bind(*bind);
    }
    let mut queue: QueueConfig = config.queue.clone();
    if let Some(rpm) = args.get_one::<u32>("rpm") {
        queue = queue.with_requests_per_minute(*rpm);
    }
    if let Some(max) = args.get_one::<usize>("max-pending") {
        queue = queue.with_max_pending(*max);
    }
    config.with_queue(queue)
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    info!(
        version = scorecard_server::VERSION,
        model = %config.gemini.model,
        "starting scorecard"
    );
    if config.auth.delete_key.is_none() {
        warn!("no delete key configured; report deletion is disabled");
    }

    let addr = config.server.bind;
    let state = Arc::new(AppState::from_config(config)?);

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("shutdown requested");
    };

    let (_, server) = scorecard_server::bind(state, addr, shutdown)?;
    server.await;
    info!("scorecard stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("log-json"))?;

    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("check-config", _)) => {
            config.validate()?;
            println!("{config:#?}");
            println!("configuration ok");
        }
        Some(("estimate", args)) => {
            config.validate()?;
            let items = args.get_one::<usize>("items").copied().unwrap_or_default();
            let queue = RateLimitedQueue::new(config.queue.clone())?;
            let wait = queue.estimated_wait(Some(items));
            println!(
                "{items} requests at {} per minute: ~{:.1}s",
                config.queue.requests_per_minute,
                wait.as_secs_f64()
            );
        }
        Some(("serve", args)) => serve(apply_serve_flags(config, args)).await?,
        _ => serve(config).await?,
    }

    Ok(())
}
