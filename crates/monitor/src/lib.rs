//! Certificate, wallet-balance and chain-health monitoring on independent
//! schedules, with digests delivered by email and webhook.

pub mod credentials;
pub mod notify;
pub mod pipeline;
pub mod probe;
pub mod rpc;
pub mod tls;
pub mod worker;

#[cfg(test)]
mod testing;

pub use credentials::CredentialSource;
pub use notify::{DeliveryError, HttpWebhook, Mailer, MessageCard, Notifier, SmtpMailer, WebhookSender};
pub use pipeline::{Family, Pipeline, PipelineSettings, Probes, TickReport};
pub use probe::ProbeError;
pub use rpc::{BalanceSource, ChainSource, JsonRpcClient};
pub use tls::{CertificateProbe, TlsCertificateProbe};
pub use worker::{build_pipeline, run_monitor, MonitorError};
