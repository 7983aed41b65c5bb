//! Wires `duskrelay-settings` configuration into a running
//! `duskrelay-transport` node: generates a TLS identity, builds the
//! connection pool's dialer, and runs the accept loop until shut down.
//! This module owns no protocol logic of its own — decoding, routing,
//! and mixing decisions belong to whatever consumes this crate as a
//! library; here every delivered packet just gets logged.

use std::net::SocketAddrV4;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_rustls::TlsConnector;

use duskrelay_core::collaborators::{EventLog, PacketConsumer, PingLog};
use duskrelay_core::constants::PACKET_LEN;
use duskrelay_settings::Settings;
use duskrelay_transport::{bucket::TokenBucket, pool::ConnectFn, ConnectionPool, NodeIdentity, Reactor, ServerContext};

use crate::{DaemonError, Result};

struct TracingPacketConsumer;

impl PacketConsumer for TracingPacketConsumer {
    fn on_packet(&self, packet: [u8; PACKET_LEN]) {
        tracing::info!(bytes = packet.len(), "packet reached end of path");
    }
}

struct TracingEventLog;

impl EventLog for TracingEventLog {
    fn count(&self, event: &str) {
        tracing::debug!(event, "event");
    }

    fn count_tagged(&self, event: &str, tag: &str) {
        tracing::debug!(event, tag, "event");
    }
}

struct TracingPingLog;

impl PingLog for TracingPingLog {
    fn connected(&self, keyid: [u8; duskrelay_core::constants::DIGEST_LEN]) {
        tracing::debug!(keyid = %hex::encode(keyid), "peer connected");
    }

    fn connect_failed(&self, keyid: [u8; duskrelay_core::constants::DIGEST_LEN]) {
        tracing::debug!(keyid = %hex::encode(keyid), "peer connect failed");
    }
}

/// Run the MMTP node described by `settings` until `shutdown` resolves.
pub async fn run(settings: Settings, shutdown: impl std::future::Future<Output = ()>) -> Result<()> {
    let identity = Arc::new(NodeIdentity::generate("duskrelay-node").map_err(DaemonError::Transport)?);
    tracing::info!(fingerprint = %hex::encode(identity.fingerprint()), "generated node identity");

    let server_ctx = Arc::new(ServerContext::new(
        duskrelay_transport::tls::server_config(&identity).map_err(DaemonError::Transport)?,
    ));
    let client_cfg = Arc::new(duskrelay_transport::tls::client_config(&identity).map_err(DaemonError::Transport)?);
    let connector = TlsConnector::from(client_cfg);

    let ping_log: Arc<dyn PingLog> = Arc::new(TracingPingLog);
    let event_log: Arc<dyn EventLog> = Arc::new(TracingEventLog);

    let connect: ConnectFn = {
        let connector = connector.clone();
        let ping_log = Arc::clone(&ping_log);
        let event_log = Arc::clone(&event_log);
        Arc::new(move |key, rx| {
            let connector = connector.clone();
            let ping_log = Arc::clone(&ping_log);
            let event_log = Arc::clone(&event_log);
            Box::pin(async move {
                let (ip, port, keyid) = key;
                let addr = SocketAddrV4::new(ip, port);
                match duskrelay_transport::reactor::dial_tls(addr, &connector, "duskrelay-node").await {
                    Ok(stream) => {
                        if let Err(e) = duskrelay_transport::client::dial_and_serve(stream, keyid, rx, ping_log, event_log).await
                        {
                            tracing::debug!(%addr, error = %e, "outbound mmtp connection ended");
                        }
                    }
                    Err(e) => {
                        tracing::debug!(%addr, error = %e, "failed to dial mmtp peer");
                        ping_log.connect_failed(keyid);
                        let mut rx = rx;
                        while let Ok(d) = rx.try_recv() {
                            d.failed(true);
                        }
                    }
                }
            })
        })
    };

    let pool = ConnectionPool::new(settings.outgoing.mmtp.max_connections, connect);
    let bucket = match settings.server.max_bandwidth {
        Some(avg) => TokenBucket::new(avg, settings.server.effective_max_bucket()),
        None => TokenBucket::unlimited(),
    };
    let reactor = Reactor::new(pool, bucket, std::time::Duration::from_secs(settings.server.timeout));
    reactor.spawn_tick_loop();

    let listen_addr = SocketAddrV4::new(settings.incoming.mmtp.listen_ip, settings.incoming.mmtp.listen_port);
    let listener = TcpListener::bind(listen_addr).await.map_err(DaemonError::Io)?;
    tracing::info!(%listen_addr, "mmtp listener bound");

    let consumer: Arc<dyn PacketConsumer> = Arc::new(TracingPacketConsumer);
    tokio::select! {
        result = reactor.accept_loop(listener, server_ctx, consumer, event_log) => {
            result.map_err(DaemonError::Io)?;
        }
        _ = shutdown => {
            tracing::info!("shutdown signal received");
        }
    }
    Ok(())
}
