//! # emailverify_core
//!
//! Email verification engine built around the SMTP `RCPT TO` probe: it
//! decides whether an address is likely deliverable without ever sending a
//! message.
//!
//! ## Layers
//!
//! - **Syntax validation** with local/domain split and typo suggestions
//! - **Directory resolution** (MX with A-record fallback) via hickory-resolver
//! - **Classification** against disposable / role / free-provider vocabularies
//! - **SMTP probing** with STARTTLS support and catch-all detection
//! - **Bulk orchestration** with rate limiting, health gating and cancellation
//!
//! ## Example
//!
//! ```rust,no_run
//! use emailverify_core::{Verifier, VerifierConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let verifier = Verifier::new(VerifierConfig::default())?;
//!
//!     let result = verifier.verify("user@example.com").await;
//!     println!("{}: {}", result.email, result.status);
//!
//!     Ok(())
//! }
//! ```

pub mod classifier;
pub mod dns;
pub mod pipeline;
pub mod pool;
pub mod result;
pub mod smtp;
pub mod syntax;

use std::time::Duration;

use thiserror::Error;

/// Configuration for the verification pipeline.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Forces the SMTP host instead of the MX lookup result.
    pub custom_host: Option<String>,
    /// TCP port for the SMTP session.
    pub port: u16,
    /// Deadline per I/O operation and overall DNS query budget.
    pub timeout: Duration,
    /// Envelope sender used in `MAIL FROM`.
    pub from_address: String,
    /// Argument to `EHLO`/`HELO`.
    pub helo_domain: String,
    /// Stop after classification; verdict becomes `unknown`.
    pub skip_smtp: bool,
    /// Probe a random local part on the same session to detect catch-all.
    pub check_catch_all: bool,
    /// Skip certificate validation on STARTTLS upgrade.
    pub skip_tls_verify: bool,
    /// Enable the disposable-domain classifier.
    pub check_disposable: bool,
    /// Enable the role-account classifier.
    pub check_role: bool,
    /// Enable the free-provider classifier.
    pub check_free_provider: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            custom_host: None,
            port: 25,
            timeout: Duration::from_secs(15),
            from_address: "test@gmail.com".to_string(),
            helo_domain: "mail.verification-check.com".to_string(),
            skip_smtp: false,
            check_catch_all: false,
            skip_tls_verify: true,
            check_disposable: true,
            check_role: true,
            check_free_provider: true,
        }
    }
}

/// Errors that can abort a verification stage.
///
/// Directory failures (`Dns`, `NoMailServers`) downgrade the verdict to
/// `invalid`; everything else surfaces as verdict `error` with the message
/// recorded on the result.
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("DNS lookup failed: {0}")]
    Dns(#[from] hickory_resolver::error::ResolveError),
    #[error("no MX records found for {0}")]
    NoMailServers(String),
    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("TLS handshake failed: {0}")]
    Tls(#[from] native_tls::Error),
    #[error("malformed server reply: {0:?}")]
    MalformedReply(String),
    #[error("{command} failed with code {code}: {response}")]
    UnexpectedReply {
        command: &'static str,
        code: u16,
        response: String,
    },
    #[error("{command} issued in {state:?} state")]
    OutOfOrder {
        command: &'static str,
        state: smtp::SessionState,
    },
    #[error("configuration error: {0}")]
    Config(String),
}

impl VerifyError {
    /// True for failures of the directory stage, which map to an `invalid`
    /// verdict rather than an `error` one.
    pub fn is_directory_error(&self) -> bool {
        matches!(self, VerifyError::Dns(_) | VerifyError::NoMailServers(_))
    }
}

pub type Result<T> = std::result::Result<T, VerifyError>;

// Re-export main types
pub use classifier::Classifier;
pub use dns::{DirectoryRecord, DnsResolver, MailDirectory, MxRecord};
pub use pipeline::{DomainReport, Verifier};
pub use pool::{PoolConfig, PoolStats, WorkerPool};
pub use result::{Status, VerificationResult};
