//! Directory resolution over hickory-resolver.
//!
//! The resolver is in-process rather than a system helper so that query
//! timeouts are honored deterministically. Mail-exchanger lookups fall back
//! to the address record when the MX query comes back specifically as
//! "no such record".

use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::{
    config::{ResolverConfig, ResolverOpts},
    error::ResolveErrorKind,
    AsyncResolver, TokioAsyncResolver,
};
use tracing::{debug, warn};

use crate::{Result, VerifyError};

/// Priority used for the synthetic record produced by the A-record fallback.
const FALLBACK_MX_PRIORITY: u16 = 10;

/// A single mail exchanger advertised by the domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxRecord {
    /// Exchanger hostname, trailing dot stripped.
    pub host: String,
    /// Preference value; lower is more preferred.
    pub priority: u16,
}

/// Ordered mail-exchanger set for a domain, sorted ascending by priority.
#[derive(Debug, Clone, Default)]
pub struct DirectoryRecord {
    pub mx_records: Vec<MxRecord>,
}

impl DirectoryRecord {
    /// Exchanger hostnames in preference order.
    pub fn hosts(&self) -> Vec<String> {
        self.mx_records.iter().map(|mx| mx.host.clone()).collect()
    }

    /// The most preferred exchanger, if any.
    pub fn primary(&self) -> Option<&str> {
        self.mx_records.first().map(|mx| mx.host.as_str())
    }
}

/// Directory-service lookups needed by the pipeline.
///
/// Production code uses [`DnsResolver`]; tests substitute a stub so the
/// pipeline can be exercised without the network.
#[async_trait]
pub trait MailDirectory: Send + Sync {
    /// Resolves the mail exchangers for a domain.
    async fn lookup_mx(&self, domain: &str) -> Result<DirectoryRecord>;

    /// Returns the domain's SPF record body, if one is published.
    async fn lookup_spf(&self, domain: &str) -> Result<Option<String>>;

    /// Returns the domain's DMARC record body, if one is published.
    async fn lookup_dmarc(&self, domain: &str) -> Result<Option<String>>;
}

/// DNS-backed [`MailDirectory`] implementation.
pub struct DnsResolver {
    resolver: TokioAsyncResolver,
}

impl DnsResolver {
    /// Creates a resolver whose per-query deadline is `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let config = ResolverConfig::cloudflare();

        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 2;

        let resolver = AsyncResolver::tokio(config, opts);

        debug!(?timeout, "DNS resolver initialized");

        Ok(Self { resolver })
    }

    /// All TXT record bodies published on `name`.
    async fn txt_records(&self, name: &str) -> Vec<String> {
        match self.resolver.txt_lookup(name).await {
            Ok(response) => response
                .iter()
                .map(|txt| {
                    txt.txt_data()
                        .iter()
                        .map(|chunk| String::from_utf8_lossy(chunk))
                        .collect::<String>()
                })
                .collect(),
            Err(e) => {
                debug!(name, error = %e, "TXT lookup failed");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl MailDirectory for DnsResolver {
    async fn lookup_mx(&self, domain: &str) -> Result<DirectoryRecord> {
        debug!(domain, "querying MX records");

        let lookup = match self.resolver.mx_lookup(domain).await {
            Ok(lookup) => lookup,
            Err(e) => {
                // "No such record" specifically allows the A-record fallback:
                // a host without MX can still receive mail directly.
                if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) {
                    debug!(domain, "no MX records, checking address record");
                    if let Ok(addrs) = self.resolver.lookup_ip(domain).await {
                        if addrs.iter().next().is_some() {
                            debug!(domain, "address record found, using domain as MX");
                            return Ok(DirectoryRecord {
                                mx_records: vec![MxRecord {
                                    host: domain.to_string(),
                                    priority: FALLBACK_MX_PRIORITY,
                                }],
                            });
                        }
                    }
                }
                warn!(domain, error = %e, "MX lookup failed");
                return Err(VerifyError::Dns(e));
            }
        };

        let mut records: Vec<MxRecord> = lookup
            .iter()
            .map(|mx| MxRecord {
                host: strip_trailing_dot(&mx.exchange().to_utf8()),
                priority: mx.preference(),
            })
            .collect();

        if records.is_empty() {
            return Err(VerifyError::NoMailServers(domain.to_string()));
        }

        records.sort_by_key(|mx| mx.priority);

        debug!(
            domain,
            count = records.len(),
            primary = %records[0].host,
            "MX records resolved"
        );

        Ok(DirectoryRecord {
            mx_records: records,
        })
    }

    async fn lookup_spf(&self, domain: &str) -> Result<Option<String>> {
        let records = self.txt_records(domain).await;
        Ok(first_record_with_prefix(&records, "v=spf1"))
    }

    async fn lookup_dmarc(&self, domain: &str) -> Result<Option<String>> {
        let records = self.txt_records(&format!("_dmarc.{domain}")).await;
        Ok(first_record_with_prefix(&records, "v=dmarc1"))
    }
}

fn strip_trailing_dot(host: &str) -> String {
    host.strip_suffix('.').unwrap_or(host).to_string()
}

/// First record whose lower-cased body starts with `prefix`.
fn first_record_with_prefix(records: &[String], prefix: &str) -> Option<String> {
    records
        .iter()
        .find(|r| r.trim().to_lowercase().starts_with(prefix))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn trailing_dot_is_stripped_once() {
        assert_eq!(strip_trailing_dot("mx.example.com."), "mx.example.com");
        assert_eq!(strip_trailing_dot("mx.example.com"), "mx.example.com");
    }

    #[test]
    fn record_prefix_matching_is_case_insensitive() {
        let records = vec![
            "google-site-verification=abc".to_string(),
            "  V=SPF1 include:_spf.example.com ~all".to_string(),
        ];
        assert_eq!(
            first_record_with_prefix(&records, "v=spf1"),
            Some("  V=SPF1 include:_spf.example.com ~all".to_string())
        );
        assert_eq!(first_record_with_prefix(&records, "v=dmarc1"), None);
    }

    #[test]
    fn directory_record_ordering_and_primary() {
        let record = DirectoryRecord {
            mx_records: vec![
                MxRecord {
                    host: "mx1.example.com".into(),
                    priority: 5,
                },
                MxRecord {
                    host: "mx2.example.com".into(),
                    priority: 10,
                },
            ],
        };
        assert_eq!(record.primary(), Some("mx1.example.com"));
        assert_eq!(record.hosts(), vec!["mx1.example.com", "mx2.example.com"]);
        assert!(record
            .mx_records
            .windows(2)
            .all(|w| w[0].priority <= w[1].priority));
    }

    #[test]
    fn empty_record_has_no_primary() {
        let record = DirectoryRecord::default();
        assert_eq!(record.primary(), None);
        assert!(record.hosts().is_empty());
    }
}
