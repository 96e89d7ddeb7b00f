//! Assistant Gateway Binary
//!
//! Serves the corporate assistant over HTTP.
//!
//! # Usage
//! ```bash
//! assist-gateway [--port 5000] [--host 0.0.0.0] [--verbose]
//! ```
//!
//! Everything else comes from the environment (or a `.env` file): see
//! `AssistConfig::from_env`.

use anyhow::Context;
use clap::Parser;
use assist_core::AssistConfig;
use assist_gateway::{init_tracing, Gateway};

/// Assistant Gateway - corporate LLM assistant web front end
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let mut config = AssistConfig::from_env().context("reading configuration")?;
    if let Some(host) = args.host {
        config = config.with_host(host);
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
    }

    init_tracing(&config.logging, args.verbose)?;

    if config.secret_key_generated {
        tracing::warn!("SECRET_KEY not set; sessions will not survive a restart");
    }
    if let Err(e) = config.model.validate() {
        tracing::warn!("Model not ready: {}; questions will be answered with an error", e);
    }

    print_banner(&config.host, config.port);

    let gateway = Gateway::from_config(config).context("starting gateway")?;
    gateway.start().await?;

    Ok(())
}

fn print_banner(host: &str, port: u16) {
    println!();
    println!("╔═══════════════════════════════════════════════════════════════╗");
    println!("║                                                               ║");
    println!("║                 ASSISTENTE IA CORPORATIVO                     ║");
    println!("║                                                               ║");
    println!("╚═══════════════════════════════════════════════════════════════╝");
    println!();
    println!("HTTP Server");
    println!("   └─ http://{}:{}", host, port);
    println!();
    println!("Endpoints");
    println!("   ├─ GET  /                 Login / chat");
    println!("   ├─ POST /ask              Ask a question");
    println!("   ├─ GET  /admin            Administration");
    println!("   ├─ GET  /history          Query history");
    println!("   ├─ GET  /documents/search Document search");
    println!("   └─ GET  /health           Health check");
    println!();
    println!("─────────────────────────────────────────────────────────────────");
    println!("Press Ctrl+C to stop the gateway");
    println!();
}
