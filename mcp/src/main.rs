use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use postforce_mcp_runtime::{
    CredentialStore, DEFAULT_POSTMAN_API_URL, DEFAULT_SALESFORCE_API_VERSION,
    DEFAULT_SALESFORCE_LOGIN_URL, DEFAULT_REQUEST_TIMEOUT_SECS, McpServer, RuntimeConfig,
};

#[derive(Parser)]
#[command(
    name = "postforce-mcp",
    version,
    about = "MCP server exposing Postman collections and Salesforce REST over stdio"
)]
struct Cli {
    /// Default Salesforce login host for authenticate_salesforce
    #[arg(long, env = "SALESFORCE_LOGIN_URL", default_value = DEFAULT_SALESFORCE_LOGIN_URL)]
    salesforce_login_url: String,

    /// Salesforce REST API version segment
    #[arg(long, env = "SALESFORCE_API_VERSION", default_value = DEFAULT_SALESFORCE_API_VERSION)]
    salesforce_api_version: String,

    /// Postman API base URL
    #[arg(long, env = "POSTMAN_API_URL", default_value = DEFAULT_POSTMAN_API_URL)]
    postman_api_url: String,

    /// Seed the Postman API key instead of calling set_postman_api_key
    #[arg(long, env = "POSTMAN_API_KEY", hide_env_values = true)]
    postman_api_key: Option<String>,

    /// Timeout for every outbound HTTP call, in seconds
    #[arg(long, env = "POSTFORCE_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    request_timeout_secs: u64,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postforce_mcp=info,postforce_mcp_runtime=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let code = run(cli).await;
    std::process::exit(code);
}

async fn run(cli: Cli) -> i32 {
    let config = RuntimeConfig {
        salesforce_login_url: cli.salesforce_login_url,
        salesforce_api_version: cli.salesforce_api_version,
        postman_api_url: cli.postman_api_url,
        request_timeout: Duration::from_secs(cli.request_timeout_secs),
    };

    let mut credentials = CredentialStore::new();
    if let Some(api_key) = cli.postman_api_key.filter(|key| !key.is_empty()) {
        credentials.set_api_key(api_key);
        info!("postman api key loaded from environment");
    }

    let mut server = match McpServer::with_credentials(config, credentials) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "failed to start MCP server");
            return 1;
        }
    };

    info!("Postman Salesforce MCP server running on stdio");
    tokio::select! {
        result = server.serve_stdio() => match result {
            Ok(()) => 0,
            Err(e) => {
                error!(error = %e, "MCP server stopped");
                1
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
            0
        }
    }
}
