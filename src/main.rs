use anyhow::Result;
use clap::Parser;
use gemini_image_relay::models::Config;
use gemini_image_relay::server::{self, AppState};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "gemini-image-relay")]
#[command(about = "Relay image edit requests to the Gemini API")]
struct CliArgs {
    /// Address to listen on (overrides RELAY_BIND_ADDRESS).
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Upstream attempts per request (overrides RELAY_MAX_ATTEMPTS).
    #[arg(long, value_name = "N", value_parser = parse_max_attempts)]
    max_attempts: Option<u32>,
}

fn parse_max_attempts(input: &str) -> std::result::Result<u32, String> {
    match input.parse::<u32>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(format!(
            "Invalid attempt count '{}'. Expected a positive integer",
            input
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gemini_image_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting gemini-image-relay");

    let args = CliArgs::parse();

    let mut config = Config::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(max_attempts) = args.max_attempts {
        config.max_attempts = max_attempts;
    }
    info!(?config, "Configuration loaded");

    let state = AppState::from_config(&config)?;
    let router = server::build_router(state, config.max_body_bytes);

    let listener = TcpListener::bind(&config.bind_address).await?;
    server::serve(listener, router).await?;

    info!("Server stopped");
    Ok(())
}
