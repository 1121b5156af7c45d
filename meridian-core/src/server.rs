//! TCP server shell
//!
//! One task per accepted connection, alive for the connection's
//! lifetime. The protocol is request/response: each client read is one
//! whitespace-tokenized command, each reply is the result line followed
//! by the prompt. Disconnecting releases the connection's session; it
//! never rolls back a committed mutation.

use crate::{
    config::Config,
    dispatcher::Dispatcher,
    engine::{bootstrap_admin, spawn_engine},
    session::{ConnId, SessionRegistry},
    store::Store,
    Result,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Ledger server: engine plus accept loop
pub struct Server {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    sessions: Arc<SessionRegistry>,
}

impl Server {
    /// Open the store, start the engine, and bind the listener
    pub async fn bind(config: &Config) -> Result<Self> {
        let mut store = Store::open(&config.data_file)?;
        bootstrap_admin(&mut store, &config.bootstrap)?;

        let sessions = Arc::new(SessionRegistry::new());
        let engine = spawn_engine(store, sessions.clone());
        let dispatcher = Arc::new(Dispatcher::new(engine, sessions.clone()));

        let listener = TcpListener::bind(&config.listen_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "Server listening");

        Ok(Self {
            listener,
            dispatcher,
            sessions,
        })
    }

    /// Bound address (useful when the config asked for port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the future is dropped
    pub async fn run(self) -> Result<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            tracing::info!(%peer, "Connection accepted");

            let dispatcher = self.dispatcher.clone();
            let sessions = self.sessions.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer, dispatcher).await {
                    tracing::debug!(%peer, error = %e, "Connection error");
                }

                // Disconnect frees the identity like an explicit logout
                sessions.release(peer);
                tracing::info!(%peer, "Connection closed");
            });
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: ConnId,
    dispatcher: Arc<Dispatcher>,
) -> Result<()> {
    stream
        .write_all(dispatcher.prompt(peer).as_bytes())
        .await?;

    let mut buf = vec![0u8; 1024];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }

        let line = String::from_utf8_lossy(&buf[..n]);
        let line = line.trim();
        if line.is_empty() {
            stream
                .write_all(dispatcher.prompt(peer).as_bytes())
                .await?;
            continue;
        }

        let response = dispatcher.dispatch(peer, line).await;
        let reply = format!("{}\n{}", response, dispatcher.prompt(peer));
        stream.write_all(reply.as_bytes()).await?;
    }
}
