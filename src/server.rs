//! Accept loop
//!
//! Accepts TCP connections and runs one handler task per connection until
//! the shutdown token is cancelled. On shutdown the listener is dropped,
//! every connection observes a child of the shutdown token, and `run`
//! returns once all connection tasks have finished.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, info_span, Instrument};

use crate::config::ConnectionSettings;
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::hub::Hub;

/// Listening server
pub struct Server {
    listener: TcpListener,
    hub: Arc<Hub>,
    settings: Arc<ConnectionSettings>,
}

impl Server {
    /// Bind the listening socket
    ///
    /// Failing to bind is the only process-fatal error.
    pub async fn bind(
        addr: &str,
        hub: Arc<Hub>,
        settings: ConnectionSettings,
    ) -> Result<Self, AppError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            hub,
            settings: Arc::new(settings),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the accept loop until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        let tracker = TaskTracker::new();
        info!("Server accepting connections");

        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let hub = Arc::clone(&self.hub);
                    let settings = Arc::clone(&self.settings);
                    let shutdown = shutdown.clone();

                    // Spawn handler task for each connection
                    tracker.spawn(
                        async move {
                            if let Err(e) =
                                handle_connection(stream, addr, hub, settings, shutdown).await
                            {
                                error!("Connection handler error: {}", e);
                            }
                        }
                        .instrument(info_span!("conn", peer = %addr)),
                    );
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }

        drop(self.listener);
        tracker.close();
        info!(
            "Shutting down, waiting for {} connection(s)",
            tracker.len()
        );
        tracker.wait().await;
        info!("Server stopped");
    }
}
