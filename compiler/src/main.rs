use clap::Parser;
use alla_lang::cli::{Cli, CliHandler};
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.trace_requested() {
        "alla=trace,alla_lang=debug"
    } else {
        "alla=info,alla_lang=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let handler = CliHandler::new();

    if let Err(e) = handler.handle(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
