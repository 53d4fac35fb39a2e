//! Verification result model and the confidence score.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Categorical verdict of a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The server accepted the recipient (code 250/251).
    Valid,
    /// Syntax, directory or the server itself rejected the address.
    Invalid,
    /// The probe was inconclusive (252, temporary failure, skipped, ...).
    Unknown,
    /// The domain accepts any local part, so acceptance proves nothing.
    Risky,
    /// A transport or protocol failure aborted the pipeline.
    Error,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Valid => "valid",
            Status::Invalid => "invalid",
            Status::Unknown => "unknown",
            Status::Risky => "risky",
            Status::Error => "error",
        };
        f.write_str(s)
    }
}

/// Complete result of a single address verification.
///
/// Field names mirror the JSON contract consumed by the output writers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub email: String,
    pub valid: bool,
    pub status: Status,
    pub status_code: u16,
    pub reason: String,
    pub disposable: bool,
    pub role_account: bool,
    pub free_provider: bool,
    pub catch_all: bool,
    pub catch_all_checked: bool,
    pub mx_records: Vec<String>,
    pub mx_host: String,
    pub smtp_response: String,
    pub confidence_score: u8,
    pub verified_at: DateTime<Utc>,
    pub latency_ms: u64,

    // Syntax check results
    pub syntax_valid: bool,
    pub local_part: String,
    pub domain: String,

    // Additional info
    pub has_mx: bool,
    pub smtp_success: bool,
    pub tls_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerificationResult {
    /// Creates a result in its initial state: status `unknown`, fresh
    /// timestamp, everything else empty.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            valid: false,
            status: Status::Unknown,
            status_code: 0,
            reason: String::new(),
            disposable: false,
            role_account: false,
            free_provider: false,
            catch_all: false,
            catch_all_checked: false,
            mx_records: Vec::new(),
            mx_host: String::new(),
            smtp_response: String::new(),
            confidence_score: 0,
            verified_at: Utc::now(),
            latency_ms: 0,
            syntax_valid: false,
            local_part: String::new(),
            domain: String::new(),
            has_mx: false,
            smtp_success: false,
            tls_used: false,
            error: None,
        }
    }

    /// Marks the result as valid: the server accepted the recipient.
    pub fn set_valid(&mut self, code: u16, response: impl Into<String>) {
        self.valid = true;
        self.status = Status::Valid;
        self.status_code = code;
        self.smtp_response = response.into();
        self.smtp_success = true;
        self.recalculate_confidence();
    }

    /// Marks the result as invalid with a human-readable reason.
    pub fn set_invalid(
        &mut self,
        code: u16,
        response: impl Into<String>,
        reason: impl Into<String>,
    ) {
        self.valid = false;
        self.status = Status::Invalid;
        self.status_code = code;
        self.smtp_response = response.into();
        self.smtp_success = false;
        self.reason = reason.into();
        self.recalculate_confidence();
    }

    /// Marks the result as unknown (inconclusive probe).
    pub fn set_unknown(&mut self, reason: impl Into<String>) {
        self.valid = false;
        self.status = Status::Unknown;
        self.reason = reason.into();
        self.recalculate_confidence();
    }

    /// Marks the result as risky (catch-all domain).
    pub fn set_risky(&mut self, reason: impl Into<String>) {
        self.valid = false;
        self.status = Status::Risky;
        self.reason = reason.into();
        self.recalculate_confidence();
    }

    /// Marks the result as errored out before a verdict could be formed.
    pub fn set_error(&mut self, err: &crate::VerifyError) {
        self.valid = false;
        self.status = Status::Error;
        self.error = Some(err.to_string());
        self.reason = err.to_string();
        self.confidence_score = 0;
    }

    /// Recomputes the confidence score from the populated fields.
    pub fn recalculate_confidence(&mut self) {
        self.confidence_score = confidence_score(self);
    }

    /// True when delivery to the address is likely to succeed.
    pub fn is_deliverable(&self) -> bool {
        self.status == Status::Valid || (self.status == Status::Risky && self.catch_all)
    }

    /// One-line human-readable summary of the verdict.
    pub fn summary(&self) -> String {
        match self.status {
            Status::Valid => "Email is valid and deliverable".to_string(),
            Status::Invalid => format!("Email does not exist: {}", self.reason),
            Status::Risky => {
                if self.catch_all {
                    "Domain accepts all emails (catch-all) - delivery uncertain".to_string()
                } else {
                    format!("Risky: {}", self.reason)
                }
            }
            Status::Unknown => format!("Could not verify: {}", self.reason),
            Status::Error => format!(
                "Error during verification: {}",
                self.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

/// Computes the confidence score, clamped to `[0, 100]`.
///
/// A pure function of the result's populated fields: syntax +10, MX +15,
/// status valid +60 (+15 when the code is exactly 250) / risky +30 /
/// unknown +20 / invalid resets to 0, then deductions for disposable (-20),
/// catch-all (-25) and role accounts (-5).
pub fn confidence_score(r: &VerificationResult) -> u8 {
    let mut score: i32 = 0;

    if r.syntax_valid {
        score += 10;
    }

    if r.has_mx {
        score += 15;
    }

    match r.status {
        Status::Valid => {
            score += 60;
            if r.status_code == 250 {
                score += 15;
            }
        }
        Status::Invalid => score = 0,
        Status::Risky => score += 30,
        Status::Unknown => score += 20,
        Status::Error => {}
    }

    if r.disposable {
        score -= 20;
    }
    if r.catch_all {
        score -= 25;
    }
    if r.role_account {
        score -= 5;
    }

    score.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base(email: &str) -> VerificationResult {
        let mut r = VerificationResult::new(email);
        r.syntax_valid = true;
        r.has_mx = true;
        r
    }

    #[test]
    fn new_result_starts_unknown() {
        let r = VerificationResult::new("user@example.com");
        assert_eq!(r.status, Status::Unknown);
        assert_eq!(r.confidence_score, 0);
        assert!(!r.valid);
        assert!(r.mx_records.is_empty());
    }

    #[test]
    fn confidence_skip_smtp_unknown() {
        // syntax 10 + mx 15 + unknown 20 = 45
        let mut r = base("user@example.com");
        r.set_unknown("SMTP verification skipped");
        assert_eq!(r.confidence_score, 45);
    }

    #[test]
    fn confidence_invalid_resets_to_zero() {
        let mut r = base("user@example.com");
        r.set_invalid(550, "550 User unknown", "User does not exist");
        assert_eq!(r.confidence_score, 0);
        assert!(!r.smtp_success);
    }

    #[test]
    fn confidence_valid_250_clamps_at_100() {
        // 10 + 15 + 60 + 15 = 100
        let mut r = base("info@garantbank.uz");
        r.set_valid(250, "250 OK");
        assert_eq!(r.confidence_score, 100);
        assert!(r.smtp_success);
        assert!(r.valid);
    }

    #[test]
    fn confidence_valid_251_misses_the_bonus() {
        let mut r = base("user@example.com");
        r.set_valid(251, "251 User not local");
        assert_eq!(r.confidence_score, 85);
    }

    #[test]
    fn confidence_disposable_deduction() {
        // 10 + 15 + 20 - 20 = 25
        let mut r = base("test@tempmail.com");
        r.disposable = true;
        r.set_unknown("SMTP verification skipped");
        assert_eq!(r.confidence_score, 25);
    }

    #[test]
    fn confidence_risky_catch_all_role() {
        // 10 + 15 + 30 - 25 - 5 = 25
        let mut r = base("admin@example.com");
        r.role_account = true;
        r.catch_all = true;
        r.catch_all_checked = true;
        r.set_risky("Domain accepts all emails (catch-all)");
        assert_eq!(r.confidence_score, 25);
    }

    #[test]
    fn confidence_never_negative() {
        let mut r = VerificationResult::new("x@y.zz");
        r.disposable = true;
        r.catch_all = true;
        r.role_account = true;
        r.recalculate_confidence();
        assert_eq!(r.confidence_score, 0);
    }

    #[test]
    fn confidence_is_pure() {
        let mut r = base("user@example.com");
        r.set_valid(250, "250 OK");
        let first = confidence_score(&r);
        let second = confidence_score(&r);
        assert_eq!(first, second);
    }

    #[test]
    fn error_zeroes_confidence() {
        let mut r = base("user@example.com");
        r.set_error(&crate::VerifyError::Config("boom".into()));
        assert_eq!(r.status, Status::Error);
        assert_eq!(r.confidence_score, 0);
        assert!(r.error.is_some());
    }

    #[test]
    fn status_serializes_lowercase() {
        let r = VerificationResult::new("user@example.com");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["status"], "unknown");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn deliverable_statuses() {
        let mut r = base("user@example.com");
        r.set_valid(250, "250 OK");
        assert!(r.is_deliverable());

        let mut r = base("user@example.com");
        r.catch_all = true;
        r.set_risky("catch-all");
        assert!(r.is_deliverable());

        let mut r = base("user@example.com");
        r.set_unknown("temporary failure");
        assert!(!r.is_deliverable());
    }
}
