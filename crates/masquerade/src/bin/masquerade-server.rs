use clap::Parser;
use masquerade::prelude::*;
use tracing_subscriber::EnvFilter;

/// Room server for imposter-style party games.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3001)]
    port: u16,

    /// Browser origin allowed to open a WebSocket
    #[arg(long, env = "CORS_ORIGIN", default_value = "http://localhost:3000")]
    allowed_origin: String,

    /// Deployment label, only used in logs
    #[arg(long, env = "APP_ENV", default_value = "development")]
    environment: String,
}

#[tokio::main]
async fn main() -> Result<(), MasqueradeError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let addr = format!("0.0.0.0:{}", args.port);

    tracing::info!(
        %addr,
        allowed_origin = %args.allowed_origin,
        environment = %args.environment,
        "starting masquerade-server"
    );

    let server = MasqueradeServer::builder()
        .bind(&addr)
        .allowed_origin(args.allowed_origin)
        .build()
        .await?;
    server.run().await
}
