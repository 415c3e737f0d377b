//! httpclient-config
//!
//! Inspect proxy routing decisions and issue decorated requests from the
//! command line.

use std::path::PathBuf;

use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use http_body_util::Empty;
use hyper::{Request, Uri};
use serde_json::{json, Value};

use httpclient_config::config::{load_config, HttpClientConfig};
use httpclient_config::http::{HttpClientDecorator, HyperClientBuilder, ReqwestClientBuilder};
use httpclient_config::routing::Route;

#[derive(Parser)]
#[command(name = "httpclient-config")]
#[command(about = "Proxy routing, proxy authentication and TLS for HTTP clients", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level for this crate; RUST_LOG takes precedence.
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the routes a request to URL would try, in order
    Route {
        url: url::Url,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// GET a URL through a decorated client and print the status
    Fetch {
        url: url::Url,
        #[arg(long, value_enum, default_value_t = ClientKind::Hyper)]
        client: ClientKind,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ClientKind {
    Reqwest,
    Hyper,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    httpclient_config::observability::logging::init(&httpclient_config::observability::logging::default_filter(
        &cli.log_level,
    ))?;

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => HttpClientConfig::default(),
    };
    tracing::debug!(
        proxies = config.proxies.len(),
        protocol = %config.tls.protocol_name,
        "Configuration loaded"
    );

    let decorator = HttpClientDecorator::new(&config)?;

    match cli.command {
        Commands::Route { url, json } => {
            let routes = match decorator.selector() {
                Some(selector) => selector.select_url(&url),
                None => vec![Route::NO_PROXY],
            };

            if json {
                let routes: Vec<Value> = routes
                    .iter()
                    .map(|route| match route.endpoint() {
                        Some(endpoint) => json!({ "type": "proxy", "host": endpoint.host(), "port": endpoint.port() }),
                        None => json!({ "type": "direct" }),
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&json!({ "url": url.as_str(), "routes": routes }))?);
            } else {
                for (i, route) in routes.iter().enumerate() {
                    println!("{}. {}", i + 1, route);
                }
            }
        }
        Commands::Fetch { url, client } => {
            let status = match client {
                ClientKind::Reqwest => {
                    let client = decorator.decorate(ReqwestClientBuilder::new()).build()?;
                    client.get(url.as_str()).send().await?.status().as_u16()
                }
                ClientKind::Hyper => {
                    let client = decorator.decorate(HyperClientBuilder::new()).build::<Empty<Bytes>>();
                    let uri: Uri = url.as_str().parse()?;
                    let request = Request::get(uri).body(Empty::new())?;
                    client.request(request).await?.status().as_u16()
                }
            };
            println!("{} {}", status, url);
        }
    }

    Ok(())
}
