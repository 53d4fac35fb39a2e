//! The layered verification pipeline.
//!
//! Stages run in a fixed order with short-circuit semantics: syntax,
//! directory, classification, SMTP probe. Each stage either advances the
//! result or finalizes it and stops the pipeline.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::classifier::Classifier;
use crate::dns::{DnsResolver, MailDirectory};
use crate::result::{Status, VerificationResult};
use crate::smtp::{self, SmtpConfig};
use crate::syntax::{suggest_typo_fix, validate_syntax};
use crate::{Result, VerifierConfig};

/// Orchestrates a full verification for one address at a time.
pub struct Verifier {
    config: VerifierConfig,
    directory: Arc<dyn MailDirectory>,
    classifier: Classifier,
}

impl Verifier {
    /// Creates a verifier backed by the DNS directory resolver.
    pub fn new(config: VerifierConfig) -> Result<Self> {
        let directory = Arc::new(DnsResolver::new(config.timeout)?);
        Ok(Self::with_directory(config, directory))
    }

    /// Creates a verifier over a custom directory implementation.
    pub fn with_directory(config: VerifierConfig, directory: Arc<dyn MailDirectory>) -> Self {
        Self {
            config,
            directory,
            classifier: Classifier::default(),
        }
    }

    /// Replaces the built-in classification vocabularies.
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Runs the complete pipeline for one address.
    ///
    /// Never fails: every outcome, including transport failures, is encoded
    /// in the returned result.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn verify(&self, email: &str) -> VerificationResult {
        let start = Instant::now();
        let mut result = VerificationResult::new(email);

        self.run_stages(&mut result).await;

        result.latency_ms = start.elapsed().as_millis() as u64;
        result
    }

    /// Verifies multiple addresses sequentially. Bulk runs use
    /// [`crate::pool::WorkerPool`] instead.
    pub async fn verify_batch(&self, emails: &[String]) -> Vec<VerificationResult> {
        let mut results = Vec::with_capacity(emails.len());
        for email in emails {
            results.push(self.verify(email).await);
        }
        results
    }

    async fn run_stages(&self, result: &mut VerificationResult) {
        // Layer 1: syntax
        debug!("layer 1: syntax validation");
        match validate_syntax(&result.email) {
            Some((local, domain)) => {
                result.syntax_valid = true;
                result.local_part = local;
                result.domain = domain;
            }
            None => {
                result.set_invalid(0, "", "Invalid email syntax");
                return;
            }
        }

        if let Some(suggestion) = suggest_typo_fix(&result.domain) {
            info!(domain = %result.domain, suggestion, "possible domain typo");
        }

        // Layer 2: directory
        debug!("layer 2: domain/MX validation");
        match self.directory.lookup_mx(&result.domain).await {
            Ok(record) => {
                result.has_mx = !record.mx_records.is_empty();
                result.mx_records = record.hosts();
                if let Some(primary) = record.primary() {
                    result.mx_host = primary.to_string();
                }
            }
            Err(e) => {
                result.set_invalid(0, "", format!("Domain error: {e}"));
                return;
            }
        }

        // Layer 3: classification (never gates)
        debug!("layer 3: classification");
        if self.config.check_disposable {
            result.disposable = self.classifier.is_disposable(&result.domain);
            if result.disposable {
                info!(domain = %result.domain, "disposable email detected");
            }
        }
        if self.config.check_role {
            result.role_account = self.classifier.is_role_account(&result.local_part);
            if result.role_account {
                info!(local = %result.local_part, "role account detected");
            }
        }
        if self.config.check_free_provider {
            result.free_provider = self.classifier.is_free_provider(&result.domain);
        }

        if self.config.skip_smtp {
            debug!("SMTP verification skipped by configuration");
            result.set_unknown("SMTP verification skipped");
            return;
        }

        // Layer 4: SMTP probe
        debug!("layer 4: SMTP verification");
        let host = match &self.config.custom_host {
            Some(host) => host.clone(),
            None => match result.mx_records.first() {
                Some(host) => host.clone(),
                None => {
                    result.set_invalid(0, "", "No mail server found");
                    return;
                }
            },
        };

        let candidate = format!("{}@{}", result.local_part, result.domain);
        let probe = smtp::probe_address(
            self.smtp_config(host),
            &candidate,
            &result.domain,
            self.config.check_catch_all,
        )
        .await;

        match probe {
            Ok(report) => {
                result.valid = report.status == Status::Valid;
                result.status = report.status;
                result.status_code = report.code;
                result.smtp_response = report.response;
                result.reason = report.reason;
                result.catch_all = report.catch_all;
                result.catch_all_checked = report.catch_all_checked;
                result.tls_used = report.tls_used;
                result.smtp_success = report.smtp_success;
                result.recalculate_confidence();
            }
            Err(e) => {
                warn!(error = %e, "SMTP verification error");
                result.set_error(&e);
            }
        }
    }

    /// Checks domain-level posture without probing a specific mailbox.
    pub async fn check_domain(&self, domain: &str, check_catch_all: bool) -> Result<DomainReport> {
        let domain = domain.trim().to_lowercase();
        info!(domain = %domain, "checking domain");

        let record = self.directory.lookup_mx(&domain).await?;

        let mut report = DomainReport {
            domain: domain.clone(),
            has_mx: !record.mx_records.is_empty(),
            mx_records: record.hosts(),
            has_spf: false,
            spf_record: None,
            has_dmarc: false,
            dmarc_record: None,
            is_catch_all: false,
            catch_all_checked: false,
            is_disposable: self.classifier.is_disposable(&domain),
            is_free_provider: self.classifier.is_free_provider(&domain),
        };

        report.spf_record = self.directory.lookup_spf(&domain).await?;
        report.has_spf = report.spf_record.is_some();

        report.dmarc_record = self.directory.lookup_dmarc(&domain).await?;
        report.has_dmarc = report.dmarc_record.is_some();

        if check_catch_all {
            if let Some(host) = record.primary() {
                let random_email = smtp::random_probe_address(&domain);
                debug!(probe = %random_email, "testing domain for catch-all");
                match smtp::probe_address(self.smtp_config(host.to_string()), &random_email, &domain, false)
                    .await
                {
                    Ok(probe) => {
                        report.catch_all_checked = true;
                        report.is_catch_all = probe.status == Status::Valid;
                    }
                    Err(e) => {
                        warn!(error = %e, "catch-all test failed");
                    }
                }
            }
        }

        Ok(report)
    }

    fn smtp_config(&self, host: String) -> SmtpConfig {
        SmtpConfig {
            host,
            port: self.config.port,
            timeout: self.config.timeout,
            from_address: self.config.from_address.clone(),
            helo_domain: self.config.helo_domain.clone(),
            skip_tls_verify: self.config.skip_tls_verify,
        }
    }
}

/// Domain-level check results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainReport {
    pub domain: String,
    pub has_mx: bool,
    pub mx_records: Vec<String>,
    pub has_spf: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spf_record: Option<String>,
    pub has_dmarc: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dmarc_record: Option<String>,
    pub is_catch_all: bool,
    pub catch_all_checked: bool,
    pub is_disposable: bool,
    pub is_free_provider: bool,
}
