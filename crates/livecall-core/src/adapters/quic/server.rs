//! Quinn-based QUIC market server.
//!
//! Hosts one shared [`MarketService`] for every client process. Each
//! connection opens a single bidirectional control stream and sends
//! length-prefixed CBOR requests; the server answers each one in order.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use quinn::{Connection, Endpoint, RecvStream, SendStream, ServerConfig};
use tracing::{debug, info, warn};

use crate::adapters::snapshot::StatePersister;
use crate::application::handle_request::HandleRequestUseCase;
use crate::application::market::MarketService;
use crate::application::ports::ControlCodec;
use crate::domain::account::AccountId;
use crate::domain::control::{MarketRequest, MarketResponse};
use crate::domain::error::MarketError;

use super::codec::{read_frame, write_frame, CborControlCodec};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct MarketServer {
    endpoint: Endpoint,
    service: Arc<MarketService>,
    handler: HandleRequestUseCase,
    persister: Option<Arc<StatePersister>>,
    codec: CborControlCodec,
    next_conn_id: AtomicU64,
}

impl MarketServer {
    /// Create and bind the server.
    pub fn new(
        bind_addr: SocketAddr,
        service: Arc<MarketService>,
        persister: Option<StatePersister>,
    ) -> anyhow::Result<Self> {
        let (server_config, _cert_der) = Self::generate_self_signed_config()?;
        let endpoint = Endpoint::server(server_config, bind_addr)?;
        info!(addr = %endpoint.local_addr()?, "Market server listening");

        Ok(Self {
            endpoint,
            handler: HandleRequestUseCase::new(service.clone()),
            service,
            persister: persister.map(Arc::new),
            codec: CborControlCodec,
            next_conn_id: AtomicU64::new(1),
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.endpoint.local_addr()?)
    }

    /// Run the accept loop, plus a background sweep of idle session tokens.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        let service = Arc::clone(&self.service);
        let sweeper = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                if let Err(e) = service.sweep_expired_sessions() {
                    warn!("Session sweep failed: {e}");
                }
            }
        });

        while let Some(incoming) = self.endpoint.accept().await {
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                match incoming.await {
                    Ok(conn) => {
                        if let Err(e) = server.handle_connection(conn).await {
                            warn!("Connection handler error: {e:#}");
                        }
                    }
                    Err(e) => warn!("Failed to accept connection: {e}"),
                }
            });
        }
        sweeper.abort();
        Ok(())
    }

    async fn handle_connection(&self, connection: Connection) -> anyhow::Result<()> {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        info!(conn_id, remote = %connection.remote_address(), "New connection");

        let (send, recv) = connection.accept_bi().await?;
        let mut leases = HashSet::new();
        let served = self.serve_stream(conn_id, send, recv, &mut leases).await;

        // Calls still leased by this connection can never be ended by it.
        for payer in leases {
            if self.service.release_call(payer) {
                warn!(conn_id, %payer, "Released call lease of a dropped connection");
            }
        }
        info!(conn_id, "Connection finished");
        served
    }

    async fn serve_stream(
        &self,
        conn_id: u64,
        mut send: SendStream,
        mut recv: RecvStream,
        leases: &mut HashSet<AccountId>,
    ) -> anyhow::Result<()> {
        loop {
            let payload = match read_frame(&mut recv).await {
                Ok(p) => p,
                Err(e) => {
                    debug!(conn_id, "Control stream closed: {e}");
                    break;
                }
            };

            let response = match self.codec.decode_request(&payload) {
                Ok(request) => {
                    let lease = request.call_lease();
                    let response = self.handle_request(request).await;
                    match lease {
                        Some((payer, true)) if !matches!(response, MarketResponse::Error(_)) => {
                            leases.insert(payer);
                        }
                        Some((payer, false)) => {
                            leases.remove(&payer);
                        }
                        _ => {}
                    }
                    response
                }
                Err(e) => {
                    warn!(conn_id, "Undecodable request: {e}");
                    MarketResponse::Error(MarketError::transport(format!(
                        "undecodable request: {e}"
                    )))
                }
            };

            let bytes = self.codec.encode_response(&response)?;
            write_frame(&mut send, &bytes).await?;
        }
        Ok(())
    }

    async fn handle_request(&self, request: MarketRequest) -> MarketResponse {
        let mutates = request.mutates_state();
        let response = self.handler.execute(request).await;
        if mutates && !matches!(response, MarketResponse::Error(_)) {
            if let Some(persister) = &self.persister {
                let persister = Arc::clone(persister);
                match tokio::task::spawn_blocking(move || persister.save()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("Failed to persist market state: {e:#}"),
                    Err(e) => warn!("Persist task failed: {e}"),
                }
            }
        }
        response
    }

    // -----------------------------------------------------------------------
    // Self-signed TLS config (dev only)
    // -----------------------------------------------------------------------

    fn generate_self_signed_config() -> anyhow::Result<(ServerConfig, Vec<u8>)> {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".into()])?;
        let cert_der = cert.cert.der().to_vec();
        let key_der =
            rustls::pki_types::PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

        let server_crypto = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(
                vec![rustls::pki_types::CertificateDer::from(cert_der.clone())],
                rustls::pki_types::PrivateKeyDer::Pkcs8(key_der),
            )?;

        let mut transport_config = quinn::TransportConfig::default();
        transport_config.max_idle_timeout(Some(quinn::IdleTimeout::try_from(
            std::time::Duration::from_secs(60),
        )?));
        // Clients keep one stream open for the whole session.
        transport_config.keep_alive_interval(Some(std::time::Duration::from_secs(15)));

        let mut server_config = ServerConfig::with_crypto(Arc::new(
            quinn::crypto::rustls::QuicServerConfig::try_from(server_crypto)?,
        ));
        server_config.transport_config(Arc::new(transport_config));

        Ok((server_config, cert_der))
    }
}
