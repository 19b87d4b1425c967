//! TCP server for the line protocol

use super::connection::ConnectionHandler;
use crate::command::CommandProcessor;
use crate::config::ServerConfig;
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

/// Line protocol server
pub struct LineServer {
    config: ServerConfig,
    handler: Arc<ConnectionHandler>,
    connection_semaphore: Arc<Semaphore>,
}

impl LineServer {
    /// Create a new server in front of `processor`
    pub fn new(config: ServerConfig, processor: CommandProcessor) -> Self {
        let handler = Arc::new(ConnectionHandler::new(processor));
        let connection_semaphore = Arc::new(Semaphore::new(config.max_connections));

        Self {
            config,
            handler,
            connection_semaphore,
        }
    }

    /// Bind the configured address and serve forever
    pub async fn serve(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_on(listener).await
    }

    /// Serve on an already-bound listener
    pub async fn serve_on(&self, listener: TcpListener) -> Result<()> {
        tracing::info!(
            "Slab cache line server listening on {}",
            listener.local_addr()?
        );

        loop {
            // Acquire connection permit
            let permit = self.connection_semaphore.clone().acquire_owned().await?;

            match listener.accept().await {
                Ok((stream, addr)) => {
                    let handler = self.handler.clone();

                    tokio::spawn(async move {
                        tracing::debug!("Accepted connection from {}", addr);

                        if let Err(e) = handler.handle(stream).await {
                            tracing::error!("Connection error from {}: {}", addr, e);
                        }

                        tracing::debug!("Connection closed from {}", addr);
                        drop(permit);
                    });
                }
                Err(e) => {
                    // Keep accepting; one failed accept is not fatal
                    tracing::error!("Failed to accept connection: {}", e);
                }
            }
        }
    }

    /// Get configured address
    pub fn addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Get max connections
    pub fn max_connections(&self) -> usize {
        self.config.max_connections
    }

    /// Get available connection slots
    pub fn available_connections(&self) -> usize {
        self.connection_semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::slab::SlabCache;

    fn processor() -> CommandProcessor {
        let cache = SlabCache::from_config(CacheConfig::new("server_test", 64)).unwrap();
        CommandProcessor::new(cache)
    }

    #[tokio::test]
    async fn test_server_creation() {
        let config = ServerConfig::default();
        let server = LineServer::new(config.clone(), processor());

        assert_eq!(server.addr(), config.bind_addr);
        assert_eq!(server.max_connections(), config.max_connections);
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let config = ServerConfig {
            max_connections: 5,
            ..Default::default()
        };

        let server = LineServer::new(config, processor());
        assert_eq!(server.available_connections(), 5);
    }
}
