use std::time::Duration;

use thiserror::Error;

/// Per-item probe failure. The pipeline logs it and moves to the next item.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("invalid target `{0}`")]
    InvalidTarget(String),
    #[error("dns lookup failed: {0}")]
    Dns(String),
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("tls handshake failed: {0}")]
    Handshake(String),
    #[error("peer presented no certificate")]
    NoCertificate,
    #[error("unparseable certificate: {0}")]
    InvalidCertificate(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("malformed rpc response: {0}")]
    MalformedResponse(String),
}

impl ProbeError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::InvalidTarget(_) => "invalid_target",
            ProbeError::Dns(_) => "dns",
            ProbeError::Connect(_) => "connect",
            ProbeError::Handshake(_) => "handshake",
            ProbeError::NoCertificate => "no_certificate",
            ProbeError::InvalidCertificate(_) => "invalid_certificate",
            ProbeError::Timeout(_) => "timeout",
            ProbeError::Rpc(_) => "rpc",
            ProbeError::MalformedResponse(_) => "malformed",
        }
    }
}
