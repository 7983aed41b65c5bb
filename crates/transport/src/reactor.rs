//! Ties the token bucket, the accept loop, and the connection pool's
//! drain step together (spec.md §5). The original reactor is a single
//! OS thread cooperatively multiplexing every socket; tokio gives each
//! connection its own task instead, so here the "reactor" is the
//! once-a-second tick that refills the bucket and drains the pool's
//! message queue, plus the accept loop that spawns new inbound tasks.
//! Nothing here blocks: every suspension point is an `.await`.

use std::net::SocketAddrV4;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use duskrelay_core::collaborators::{EventLog, PacketConsumer};

use crate::bucket::TokenBucket;
use crate::pool::ConnectionPool;
use crate::server::{self, RejectMode};
use crate::tls::ServerContext;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Owns the pieces spec.md §5 assigns to the reactor: the shared token
/// bucket, the outbound connection pool, and the node-wide reject flag.
/// `Reactor` itself is cheap to clone-by-`Arc`; every connection task
/// holds a reference to it only to read `reject` and report through
/// `event_log`.
pub struct Reactor {
    pub pool: Arc<ConnectionPool>,
    pub bucket: tokio::sync::Mutex<TokenBucket>,
    pub reject: Arc<RejectMode>,
    pub idle_timeout: Duration,
}

impl Reactor {
    pub fn new(pool: Arc<ConnectionPool>, bucket: TokenBucket, idle_timeout: Duration) -> Arc<Self> {
        Arc::new(Reactor { pool, bucket: tokio::sync::Mutex::new(bucket), reject: Arc::new(RejectMode::new(false)), idle_timeout })
    }

    /// Spend one reactor tick: refill the bucket, then drain the pool's
    /// message queue (spec.md §4.5.3 step 2). Runs once a second for the
    /// lifetime of the returned task.
    pub fn spawn_tick_loop(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let reactor = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            loop {
                interval.tick().await;
                reactor.bucket.lock().await.tick();
                reactor.pool.drain();
            }
        })
    }

    /// Accept inbound MMTP connections on `listener` until it errors.
    /// Each accepted socket gets its own TLS handshake and protocol
    /// state machine on its own task; a bandwidth-exhausted bucket is
    /// advisory only here (see `DESIGN.md`) — connections are still
    /// accepted, just not prioritized.
    pub async fn accept_loop(
        self: &Arc<Self>,
        listener: TcpListener,
        tls_ctx: Arc<ServerContext>,
        consumer: Arc<dyn PacketConsumer>,
        event_log: Arc<dyn EventLog>,
    ) -> std::io::Result<()> {
        loop {
            let (socket, peer) = listener.accept().await?;
            // Built fresh from `tls_ctx` on every accept so a rotated
            // context only ever affects newly accepted connections, per
            // `ServerContext`'s contract.
            let acceptor = TlsAcceptor::from(tls_ctx.current());
            let consumer = Arc::clone(&consumer);
            let event_log = Arc::clone(&event_log);
            let reject = Arc::clone(&self.reject);
            let idle_timeout = self.idle_timeout;
            tracing::debug!(%peer, "accepted mmtp connection");
            tokio::spawn(async move {
                let stream = match acceptor.accept(socket).await {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::warn!(%peer, error = %e, "tls handshake failed");
                        return;
                    }
                };
                if let Err(e) = server::serve_connection(stream, consumer, event_log, reject, idle_timeout).await {
                    tracing::debug!(%peer, error = %e, "mmtp connection closed");
                }
            });
        }
    }
}

/// Convenience constructor for dialing out: binds a client-side TLS
/// config to a concrete address, used by the `ConnectFn` a binary wires
/// into [`ConnectionPool::new`].
pub async fn dial_tls(addr: SocketAddrV4, connector: &tokio_rustls::TlsConnector, server_name: &str) -> std::io::Result<tokio_rustls::client::TlsStream<tokio::net::TcpStream>> {
    let tcp = tokio::net::TcpStream::connect(addr).await?;
    let name = rustls::ServerName::try_from(server_name)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    connector.connect(name, tcp).await
}
