//! Quinn-based QUIC client implementing [`MarketApi`].
//!
//! Wraps a single QUIC connection with one bidirectional control stream.
//! Each call writes one request frame and reads exactly one response frame
//! while holding the stream lock, so calls from concurrent tasks never
//! interleave.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use quinn::{ClientConfig, Connection, Endpoint, RecvStream, SendStream};
use tokio::sync::Mutex;
use tracing::info;

use crate::application::ports::{ControlCodec, MarketApi};
use crate::domain::account::{
    Account, AccountId, ApprovalState, MarketStats, MediaId, MediaItem, MediaKind, Registration,
};
use crate::domain::billing::{Credits, Receipt};
use crate::domain::control::{MarketRequest, MarketResponse};
use crate::domain::error::{MarketError, MarketResult};
use crate::domain::session::Session;

use super::codec::{read_frame, write_frame, CborControlCodec};

// ---------------------------------------------------------------------------
// QuicMarketClient
// ---------------------------------------------------------------------------

struct ControlStream {
    send: SendStream,
    recv: RecvStream,
}

/// Client-side [`MarketApi`] backed by Quinn.
pub struct QuicMarketClient {
    // Kept so the connection outlives every stream handle.
    _connection: Connection,
    stream: Mutex<ControlStream>,
    codec: CborControlCodec,
}

fn unexpected(response: MarketResponse) -> MarketError {
    match response {
        MarketResponse::Error(e) => e,
        other => MarketError::transport(format!("unexpected {} response", other.kind())),
    }
}

impl QuicMarketClient {
    /// Connect to a server and open the control stream.
    pub async fn connect(server_addr: SocketAddr, server_name: &str) -> anyhow::Result<Self> {
        let mut endpoint = Endpoint::client("0.0.0.0:0".parse()?)?;

        // Development deployments use a self-signed certificate.
        let crypto = rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipServerVerification))
            .with_no_client_auth();

        let client_config = ClientConfig::new(Arc::new(
            quinn::crypto::rustls::QuicClientConfig::try_from(crypto)?,
        ));
        endpoint.set_default_client_config(client_config);

        info!(%server_addr, "Connecting to market server");
        let connection = endpoint.connect(server_addr, server_name)?.await?;
        let (send, recv) = connection.open_bi().await?;
        info!("Control stream opened");

        Ok(Self {
            _connection: connection,
            stream: Mutex::new(ControlStream { send, recv }),
            codec: CborControlCodec,
        })
    }

    async fn round_trip(&self, request: &MarketRequest) -> anyhow::Result<MarketResponse> {
        let payload = self.codec.encode_request(request)?;
        let mut stream = self.stream.lock().await;
        write_frame(&mut stream.send, &payload).await?;
        let reply = read_frame(&mut stream.recv).await?;
        self.codec.decode_response(&reply)
    }

    /// Send one request; transport failures become `MarketError::Transport`
    /// and a remote `Error` response is returned as-is.
    async fn call(&self, request: MarketRequest) -> MarketResult<MarketResponse> {
        let op = request.op_name();
        match self.round_trip(&request).await {
            Ok(MarketResponse::Error(e)) => Err(e),
            Ok(response) => Ok(response),
            Err(e) => Err(MarketError::transport(format!("{op}: {e:#}"))),
        }
    }

    async fn account(&self, request: MarketRequest) -> MarketResult<Account> {
        match self.call(request).await? {
            MarketResponse::Account(account) => Ok(account),
            other => Err(unexpected(other)),
        }
    }

    async fn accounts(&self, request: MarketRequest) -> MarketResult<Vec<Account>> {
        match self.call(request).await? {
            MarketResponse::Accounts(accounts) => Ok(accounts),
            other => Err(unexpected(other)),
        }
    }

    async fn approval(&self, request: MarketRequest) -> MarketResult<ApprovalState> {
        match self.call(request).await? {
            MarketResponse::Approval(state) => Ok(state),
            other => Err(unexpected(other)),
        }
    }

    async fn credits(&self, request: MarketRequest) -> MarketResult<Credits> {
        match self.call(request).await? {
            MarketResponse::Credits(amount) => Ok(amount),
            other => Err(unexpected(other)),
        }
    }

    async fn done(&self, request: MarketRequest) -> MarketResult<()> {
        match self.call(request).await? {
            MarketResponse::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

#[async_trait]
impl MarketApi for QuicMarketClient {
    async fn register(&self, registration: Registration) -> MarketResult<Account> {
        self.account(MarketRequest::Register { registration }).await
    }

    async fn authenticate(&self, handle: &str, secret: &str) -> MarketResult<Session> {
        let request = MarketRequest::Authenticate {
            handle: handle.to_string(),
            secret: secret.to_string(),
        };
        match self.call(request).await? {
            MarketResponse::Session(session) => Ok(session),
            other => Err(unexpected(other)),
        }
    }

    async fn logout(&self, session: &Session) -> MarketResult<()> {
        self.done(MarketRequest::Logout {
            session: session.clone(),
        })
        .await
    }

    async fn me(&self, session: &Session) -> MarketResult<Account> {
        self.account(MarketRequest::Me {
            session: session.clone(),
        })
        .await
    }

    async fn list_discoverable(&self, filter: Option<String>) -> MarketResult<Vec<Account>> {
        self.accounts(MarketRequest::ListDiscoverable { filter }).await
    }

    async fn showcase(&self, filter: Option<String>) -> MarketResult<Vec<Account>> {
        self.accounts(MarketRequest::Showcase { filter }).await
    }

    async fn callable_provider(&self, provider: AccountId) -> MarketResult<Account> {
        self.account(MarketRequest::CallableProvider { provider })
            .await
    }

    async fn pending_providers(&self, session: &Session) -> MarketResult<Vec<Account>> {
        self.accounts(MarketRequest::PendingProviders {
            session: session.clone(),
        })
        .await
    }

    async fn approved_providers(&self, session: &Session) -> MarketResult<Vec<Account>> {
        self.accounts(MarketRequest::ApprovedProviders {
            session: session.clone(),
        })
        .await
    }

    async fn payers(&self, session: &Session) -> MarketResult<Vec<Account>> {
        self.accounts(MarketRequest::Payers {
            session: session.clone(),
        })
        .await
    }

    async fn stats(&self, session: &Session) -> MarketResult<MarketStats> {
        let request = MarketRequest::Stats {
            session: session.clone(),
        };
        match self.call(request).await? {
            MarketResponse::Stats(stats) => Ok(stats),
            other => Err(unexpected(other)),
        }
    }

    async fn approve(&self, session: &Session, provider: AccountId) -> MarketResult<ApprovalState> {
        self.approval(MarketRequest::Approve {
            session: session.clone(),
            provider,
        })
        .await
    }

    async fn reject(&self, session: &Session, provider: AccountId) -> MarketResult<ApprovalState> {
        self.approval(MarketRequest::Reject {
            session: session.clone(),
            provider,
        })
        .await
    }

    async fn set_online(
        &self,
        session: &Session,
        provider: AccountId,
        online: bool,
    ) -> MarketResult<Account> {
        self.account(MarketRequest::SetOnline {
            session: session.clone(),
            provider,
            online,
        })
        .await
    }

    async fn set_rate(
        &self,
        session: &Session,
        provider: AccountId,
        rate: Credits,
    ) -> MarketResult<Account> {
        self.account(MarketRequest::SetRate {
            session: session.clone(),
            provider,
            rate,
        })
        .await
    }

    async fn add_media(
        &self,
        session: &Session,
        provider: AccountId,
        locator: String,
        kind: MediaKind,
    ) -> MarketResult<MediaItem> {
        let request = MarketRequest::AddMedia {
            session: session.clone(),
            provider,
            locator,
            kind,
        };
        match self.call(request).await? {
            MarketResponse::Media(item) => Ok(item),
            other => Err(unexpected(other)),
        }
    }

    async fn remove_media(
        &self,
        session: &Session,
        provider: AccountId,
        media: MediaId,
    ) -> MarketResult<()> {
        self.done(MarketRequest::RemoveMedia {
            session: session.clone(),
            provider,
            media,
        })
        .await
    }

    async fn balance(&self, session: &Session) -> MarketResult<Credits> {
        self.credits(MarketRequest::Balance {
            session: session.clone(),
        })
        .await
    }

    async fn confirm_funds(&self, session: &Session, amount: Credits) -> MarketResult<Credits> {
        self.credits(MarketRequest::ConfirmFunds {
            session: session.clone(),
            amount,
        })
        .await
    }

    async fn reserve_and_debit(
        &self,
        session: &Session,
        payer: AccountId,
        amount: Credits,
    ) -> MarketResult<Receipt> {
        let request = MarketRequest::ReserveAndDebit {
            session: session.clone(),
            payer,
            amount,
        };
        match self.call(request).await? {
            MarketResponse::Receipt(receipt) => Ok(receipt),
            other => Err(unexpected(other)),
        }
    }

    async fn begin_call(
        &self,
        session: &Session,
        payer: AccountId,
        amount: Credits,
    ) -> MarketResult<Receipt> {
        let request = MarketRequest::BeginCall {
            session: session.clone(),
            payer,
            amount,
        };
        match self.call(request).await? {
            MarketResponse::Receipt(receipt) => Ok(receipt),
            other => Err(unexpected(other)),
        }
    }

    async fn end_call(&self, session: &Session, payer: AccountId) -> MarketResult<()> {
        self.done(MarketRequest::EndCall {
            session: session.clone(),
            payer,
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Dev-only certificate verifier (skip verification)
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct SkipServerVerification;

impl rustls::client::danger::ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ED25519,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
        ]
    }
}
