//! Certificate expiry probe: connects to a TLS endpoint and reads the leaf
//! certificate's `notAfter` without validating the chain, so expired and
//! self-signed certificates are still measured.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use healthwatch_domain::model::CertificateInfo;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::probe::ProbeError;

pub const DEFAULT_TLS_PORT: u16 = 443;

#[async_trait]
pub trait CertificateProbe: Send + Sync {
    /// Expiry of the certificate served for `target`, which may be a bare
    /// host, `host:port` or a URL.
    async fn check_expiry(&self, target: &str) -> Result<CertificateInfo, ProbeError>;
}

pub struct TlsCertificateProbe {
    connector: TlsConnector,
    timeout: Duration,
}

impl TlsCertificateProbe {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|err| ProbeError::Handshake(err.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate { provider }))
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            timeout,
        })
    }

    async fn within<T, F>(&self, step: F) -> Result<T, ProbeError>
    where
        F: std::future::Future<Output = Result<T, ProbeError>>,
    {
        timeout(self.timeout, step)
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl CertificateProbe for TlsCertificateProbe {
    async fn check_expiry(&self, target: &str) -> Result<CertificateInfo, ProbeError> {
        let (host, port) = parse_target(target)?;
        let server_name = ServerName::try_from(host.clone())
            .map_err(|_| ProbeError::InvalidTarget(target.to_string()))?;

        let addrs: Vec<SocketAddr> = self
            .within(async {
                lookup_host((host.as_str(), port))
                    .await
                    .map(|found| found.collect())
                    .map_err(|err| ProbeError::Dns(format!("{host}: {err}")))
            })
            .await?;
        if addrs.is_empty() {
            return Err(ProbeError::Dns(format!("{host}: no addresses")));
        }

        let stream = self
            .within(async {
                TcpStream::connect(addrs.as_slice())
                    .await
                    .map_err(|err| ProbeError::Connect(format!("{host}:{port}: {err}")))
            })
            .await?;

        let tls = self
            .within(async {
                self.connector
                    .connect(server_name, stream)
                    .await
                    .map_err(|err| ProbeError::Handshake(err.to_string()))
            })
            .await?;

        let (_, session) = tls.get_ref();
        let leaf = session
            .peer_certificates()
            .and_then(|chain| chain.first())
            .ok_or(ProbeError::NoCertificate)?;
        let not_after = leaf_not_after(leaf.as_ref())?;
        debug!(target, %not_after, "certificate read");

        Ok(CertificateInfo {
            domain: target.to_string(),
            not_after,
        })
    }
}

/// Splits a configured target into host and port.
pub fn parse_target(raw: &str) -> Result<(String, u16), ProbeError> {
    let trimmed = raw.trim();
    let invalid = || ProbeError::InvalidTarget(raw.to_string());
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let url = if trimmed.contains("://") {
        reqwest::Url::parse(trimmed)
    } else {
        reqwest::Url::parse(&format!("https://{trimmed}"))
    }
    .map_err(|_| invalid())?;
    // IPv6 hosts come back bracketed.
    let host = url
        .host_str()
        .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
        .filter(|host| !host.is_empty())
        .ok_or_else(invalid)?;
    Ok((host.to_string(), url.port().unwrap_or(DEFAULT_TLS_PORT)))
}

fn leaf_not_after(der: &[u8]) -> Result<DateTime<Utc>, ProbeError> {
    let (_, certificate) = x509_parser::parse_x509_certificate(der)
        .map_err(|err| ProbeError::InvalidCertificate(err.to_string()))?;
    let timestamp = certificate.validity().not_after.timestamp();
    DateTime::from_timestamp(timestamp, 0).ok_or_else(|| {
        ProbeError::InvalidCertificate(format!("notAfter {timestamp} out of range"))
    })
}

/// Accepts any chain; only the expiry date is of interest.
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
