use crate::config::Settings;
use crate::proxy::ProxyService;
use crate::Result;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, instrument};

/// Main application struct that owns the listener and the proxy router
pub struct Application {
    settings: Settings,
    listener: TcpListener,
}

impl Application {
    /// Validate settings and bind the inbound listener
    #[instrument(skip(settings))]
    pub async fn new(settings: Settings) -> Result<Self> {
        // Fail on bad proxy settings before binding anything
        settings.proxy_config()?;

        let listener = TcpListener::bind(settings.bind_address()).await?;
        Ok(Self { settings, listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until Ctrl-C or SIGTERM
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves
    #[instrument(skip(self, shutdown))]
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let config = self.settings.proxy_config()?;
        info!(
            address = %self.listener.local_addr()?,
            timeout_ms = config.request_timeout.as_millis() as u64,
            max_body_size = *config.max_request_size.as_ref(),
            fixed_target = ?config.target_host.as_ref().map(|t| t.to_string()),
            "Starting egress proxy"
        );

        let router = ProxyService::new(config).into_router();
        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Egress proxy stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
