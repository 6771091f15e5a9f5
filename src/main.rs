//! webapp-init demo server.
//!
//! Loads an optional TOML config, initializes an application with the
//! extension and serves it until Ctrl+C or SIGTERM.
//!
//! ```text
//! webapp-init [--config app.toml] [--bind 127.0.0.1:5000] [--templates ./templates]
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    response::{Html, IntoResponse, Response},
    routing::get,
    Extension,
};
use clap::Parser;
use tokio::net::TcpListener;

use webapp_init::config::{load_config, Config};
use webapp_init::observability::logging::{init_logging, DEFAULT_FILTER};
use webapp_init::theme::FileSystemLoader;
use webapp_init::{init_app, lifecycle, App, HttpServer, InitOptions, Shutdown};

const INDEX_TEMPLATE: &str = "index.html";

#[derive(Debug, Parser)]
#[command(name = "webapp-init", version, about = "Serve an application wired by webapp-init")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    bind: String,

    /// Template directory
    #[arg(short, long)]
    templates: Option<PathBuf>,
}

async fn index(Extension(tera): Extension<Arc<tera::Tera>>) -> Response {
    if tera.get_template_names().any(|name| name == INDEX_TEMPLATE) {
        match tera.render(INDEX_TEMPLATE, &tera::Context::new()) {
            Ok(page) => return Html(page).into_response(),
            Err(e) => tracing::error!(error = %e, "Failed to render index"),
        }
    }
    Html("<!doctype html><html><body><h1>It works</h1></body></html>").into_response()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(DEFAULT_FILTER);

    let cli = Cli::parse();
    tracing::info!("webapp-init v{} starting", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::new(),
    };

    let mut app = App::with_config("webapp-init", config);
    if let Some(dir) = &cli.templates {
        app.templates_mut().set_loader(FileSystemLoader::new(dir));
    }
    app.route("/", get(index));

    init_app(&mut app, InitOptions::default())?;

    let listener = TcpListener::bind(&cli.bind).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(app)?;
    let serving = tokio::spawn(server.run(listener, shutdown.subscribe()));

    lifecycle::wait_for_signal().await;
    shutdown.trigger();
    serving.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
