use anyhow::{anyhow, Result};
use clap::{Arg, Command};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use yt_sentiment::pipeline::UiState;
use yt_sentiment::render::{render_indicator, render_state};
use yt_sentiment::router::PageContext;
use yt_sentiment::{Config, PopupSession};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("YouTube Comment Sentiment Analyzer")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TigreRoll")
        .about("Detects the video on a page and shows how viewers feel about it")
        .arg(
            Arg::new("url")
                .short('u')
                .long("url")
                .value_name("ADDRESS")
                .help("Address of the page being viewed")
                .required(true)
        )
        .arg(
            Arg::new("backend")
                .short('b')
                .long("backend")
                .value_name("URL")
                .help("Base address of the analysis backend")
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (TOML)")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
        )
        .get_matches();

    let address = matches
        .get_one::<String>("url")
        .cloned()
        .ok_or_else(|| anyhow!("--url is required"))?;
    let verbose = matches.get_flag("verbose");

    // Load configuration
    let config_result = match matches.get_one::<String>("config") {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    };
    let (mut config, config_error) = match config_result {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    if let Some(backend) = matches.get_one::<String>("backend") {
        config.backend.base_url = backend.clone();
    }

    // Initialize logging
    let level = if verbose { "debug" } else { config.output.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("yt_sentiment={},warn", level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(e) = config_error {
        warn!("Failed to load config, using defaults: {}", e);
    }
    debug!("{}", config.summary());

    info!("🚀 Sentiment analyzer starting...");
    info!("🌐 Page: {}", address);

    let session = PopupSession::open(&config, PageContext::new(address)).await?;
    let controller = session.controller();

    if controller.ping_background().await {
        debug!("Background relay answered PING");
    } else {
        warn!("Background relay did not answer PING");
    }

    // The status dot is refreshed on every activation, video page or not
    let (indicator, run) = tokio::join!(controller.check_backend(), controller.start());
    debug!("Starting {} (backend: {:?})", run?, indicator?);

    let mut states = controller.subscribe();
    let final_state = loop {
        let state = states.borrow_and_update().clone();
        if state.is_terminal() {
            break state;
        }
        if state.is_loading() {
            println!("{}", render_state(&state, None, config.output.max_comment_chars));
        }
        states.changed().await?;
    };

    let video = controller.active_run().and_then(|run| run.video);
    println!("{}", render_indicator(controller.indicator()));
    println!(
        "{}",
        render_state(&final_state, video.as_ref(), config.output.max_comment_chars)
    );

    session.close().await;

    match final_state {
        UiState::Error { message } => Err(anyhow!(message)),
        _ => Ok(()),
    }
}
