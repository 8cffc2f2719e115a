/*!
 * TCP listener: accepts connections and dispatches each to its own thread,
 * per §5 (thread-per-connection, no shared mutable state between handlers).
 */

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use crate::config::SyncConfig;
use crate::error::{BlockSyncError, Result};
use crate::protocol::session::handle_connection;

/// Bind to `config.bind_addr` and serve PUSH/PULL transactions until the
/// process is killed. Each accepted connection runs on its own thread; a
/// connection that errors out is logged and does not affect the listener
/// or any other connection.
pub fn serve(config: SyncConfig) -> Result<()> {
    let listener = TcpListener::bind(&config.bind_addr)
        .map_err(|e| BlockSyncError::io(config.bind_addr.clone(), e))?;

    tracing::info!(addr = %config.bind_addr, "listening");

    let config = Arc::new(config);

    for incoming in listener.incoming() {
        let stream = match incoming {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "failed to accept connection");
                continue;
            }
        };
        let config = Arc::clone(&config);
        thread::spawn(move || serve_connection(stream, &config));
    }

    Ok(())
}

fn serve_connection(mut stream: TcpStream, config: &SyncConfig) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    if let Some(timeout) = config.read_timeout {
        if let Err(e) = stream.set_read_timeout(Some(timeout)) {
            tracing::warn!(peer = %peer, error = %e, "failed to set read timeout");
        }
    }

    tracing::info!(peer = %peer, "connection accepted");

    match handle_connection(&mut stream, config) {
        Ok(()) => tracing::info!(peer = %peer, "transaction completed"),
        Err(e) => tracing::error!(peer = %peer, error = %e, "transaction failed"),
    }
}
