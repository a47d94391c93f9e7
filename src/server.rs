//! PolyVault TCP Server
//!
//! Line-oriented server over the typed key store. Each client connection gets
//! its own task; requests on one connection are handled strictly in order.

use crate::{
    dispatcher::Dispatcher,
    error::{PolyVaultError, Result},
    protocol::Response,
    router::Router,
    store::KeyStore,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::{broadcast, Semaphore},
};
use tracing::{debug, error, info, warn};

/// PolyVault server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:6369".to_string(),
            max_connections: 1000,
        }
    }
}

/// PolyVault TCP server
pub struct PolyVaultServer {
    config: ServerConfig,
    dispatcher: Dispatcher,
    connection_limit: Arc<Semaphore>,
    shutdown_tx: broadcast::Sender<()>,
}

impl PolyVaultServer {
    /// Create a new server instance with an empty store.
    pub fn new(config: ServerConfig) -> Self {
        let router = Router::new();
        info!(operations = router.len(), "command router built");

        let dispatcher = Dispatcher::new(Arc::new(KeyStore::new()), Arc::new(router));
        let connection_limit = Arc::new(Semaphore::new(config.max_connections));
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            dispatcher,
            connection_limit,
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!(addr = %listener.local_addr()?, "PolyVault server listening");

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            debug!(%addr, "client connected");
                            let dispatcher = self.dispatcher.clone();
                            let limit = Arc::clone(&self.connection_limit);
                            let shutdown_rx = self.shutdown_tx.subscribe();

                            tokio::spawn(async move {
                                let _permit = match limit.acquire_owned().await {
                                    Ok(permit) => permit,
                                    Err(_) => return,
                                };
                                if let Err(e) = Self::handle_client(stream, addr, dispatcher, shutdown_rx).await {
                                    warn!(%addr, error = %e, "error handling client");
                                }
                                debug!(%addr, "client disconnected");
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received, stopping server");
                    break;
                }
            }
        }

        info!("server stopped");
        Ok(())
    }

    /// Handle a single client connection
    async fn handle_client(
        mut stream: TcpStream,
        addr: SocketAddr,
        dispatcher: Dispatcher,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        let (reader, mut writer) = stream.split();
        let mut buf_reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();

            tokio::select! {
                result = buf_reader.read_line(&mut line) => {
                    match result {
                        Ok(0) => break,
                        Ok(_) => {}
                        Err(e) => {
                            // Includes request lines that are not valid UTF-8.
                            warn!(%addr, error = %e, "failed to read request, dropping connection");
                            break;
                        }
                    }

                    let response = Self::process_line(&line, &dispatcher).await;
                    writer.write_all(&response.to_bytes()).await?;
                    writer.flush().await?;
                }

                _ = shutdown_rx.recv() => {
                    debug!("shutdown signal received, closing client connection");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Process one raw request line from a client
    async fn process_line(line: &str, dispatcher: &Dispatcher) -> Response {
        let request = line.trim_end_matches(['\r', '\n']);
        dispatcher.dispatch_line(request).await
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) -> Result<()> {
        self.shutdown_tx.send(()).map_err(|_| {
            PolyVaultError::Server("Failed to send shutdown signal".to_string())
        })?;
        Ok(())
    }
}
