//! HTTP server setup.
//!
//! # Responsibilities
//! - Turn an initialized [`App`] into a router
//! - Serve it with peer addresses available to key functions
//! - Stop accepting on shutdown and drain in-flight requests

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::error::TemplateError;
use crate::http::App;

/// HTTP server for an application.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Build the server, compiling the app's templates.
    pub fn new(app: App) -> Result<Self, TemplateError> {
        Ok(Self::from_router(app.into_router()?))
    }

    pub fn from_router(router: Router) -> Self {
        Self { router }
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
