use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "imgconv",
    about = "Local web service for converting and resizing images",
    version
)]
struct Cli {
    /// address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// port to listen on
    #[arg(long, short, default_value_t = 8000)]
    port: u16,

    /// maximum request body size in megabytes
    #[arg(long, default_value_t = 512)]
    max_upload_mb: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("imgconv=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();

    let app = imgconv::server::router()
        .layer(DefaultBodyLimit::max(cli.max_upload_mb * 1024 * 1024))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind((cli.host.as_str(), cli.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", cli.host, cli.port))?;

    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
