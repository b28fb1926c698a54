use anyhow::Result;
use clap::Parser;
use deep_research::cli::Args;
use deep_research::workflow::{OutputFormat, launch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // .env 需要在构建默认配置之前加载
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let query = args.query.clone();
    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    let config = args.into_config()?;

    let log_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("deep_research={},warn", log_level).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    launch(&config, &query, format).await
}
