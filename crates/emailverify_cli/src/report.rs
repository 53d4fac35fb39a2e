//! Console rendering for single checks, bulk runs and domain reports.

use std::time::Duration;

use emailverify_core::{DomainReport, PoolStats, Status, VerificationResult};

/// Per-status counters accumulated during a bulk run.
#[derive(Debug, Default, Clone)]
pub struct StatusTally {
    pub valid: usize,
    pub invalid: usize,
    pub unknown: usize,
    pub risky: usize,
    pub errors: usize,
}

impl StatusTally {
    pub fn record(&mut self, status: Status) {
        match status {
            Status::Valid => self.valid += 1,
            Status::Invalid => self.invalid += 1,
            Status::Unknown => self.unknown += 1,
            Status::Risky => self.risky += 1,
            Status::Error => self.errors += 1,
        }
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

/// Prints the detail panel for a single verification.
pub fn print_check_panel(result: &VerificationResult) {
    println!();
    println!("Email: {}", result.email);
    println!();

    println!("Status: {}", result.status.to_string().to_uppercase());
    if !result.reason.is_empty() {
        println!("Reason: {}", result.reason);
    }

    println!();
    println!("Details:");
    println!(
        "  Syntax:        {}",
        if result.syntax_valid { "Valid" } else { "Invalid" }
    );
    println!("  Domain:        {}", result.domain);
    if result.has_mx {
        println!("  MX Records:    Found");
        if !result.mx_host.is_empty() {
            println!("  Primary MX:    {}", result.mx_host);
        }
    } else {
        println!("  MX Records:    Not found");
    }
    if result.smtp_success {
        println!("  SMTP Check:    Success (code: {})", result.status_code);
    } else if result.status_code > 0 {
        println!("  SMTP Check:    Failed (code: {})", result.status_code);
    } else {
        println!("  SMTP Check:    Not performed");
    }
    if result.tls_used {
        println!("  TLS:           Yes");
    }

    println!();
    println!("Classification:");
    println!("  Disposable:    {}", yes_no(result.disposable));
    println!("  Role Account:  {}", yes_no(result.role_account));
    println!("  Free Provider: {}", yes_no(result.free_provider));
    if result.catch_all_checked {
        println!(
            "  Catch-All:     {}",
            if result.catch_all { "Yes (risky)" } else { "No" }
        );
    }

    println!();
    println!("Confidence Score: {}/100", result.confidence_score);
    println!("Latency: {}ms", result.latency_ms);
    println!();
}

/// Prints the settings banner before a bulk run starts.
#[allow(clippy::too_many_arguments)]
pub fn print_bulk_settings(
    count: usize,
    host: Option<&str>,
    port: u16,
    workers: usize,
    delay: Duration,
    jitter: Duration,
    timeout: Duration,
    health_email: Option<&str>,
    health_interval: usize,
    output: &str,
) {
    println!();
    println!("========================================");
    println!("       Email Verification Tool");
    println!("========================================");
    println!();

    println!("Emails to verify:  {count}");
    match host {
        Some(host) => println!("Server:            {host}:{port}"),
        None => println!("Server:            Auto (MX lookup)"),
    }
    println!("Workers:           {workers}");
    println!(
        "Delay:             {:.1}s (+{:.1}s jitter)",
        delay.as_secs_f64(),
        jitter.as_secs_f64()
    );
    println!("Timeout:           {}s", timeout.as_secs());
    if let Some(health) = health_email {
        println!("Health check:      Every {health_interval} emails");
        println!("Health email:      {health}");
    }
    println!("Output:            {output}");
    println!();
}

/// Prints one progress line per finished record.
pub fn print_bulk_record(result: &VerificationResult) {
    println!(
        "{}: {} (code: {}, confidence: {})",
        result.email, result.status, result.status_code, result.confidence_score
    );
}

/// Prints the closing summary after a bulk run.
pub fn print_bulk_summary(tally: &StatusTally, stats: &PoolStats, total: usize) {
    println!();
    println!("========================================");
    println!("              SUMMARY");
    println!("========================================");
    println!();

    println!("Total Verified:    {total}");
    println!("Valid:             {}", tally.valid);
    println!("Invalid:           {}", tally.invalid);
    println!("Unknown:           {}", tally.unknown);
    println!("Risky:             {}", tally.risky);
    println!("Errors:            {}", tally.errors);
    if stats.health_failures > 0 {
        println!("Health failures:   {}", stats.health_failures);
    }
    println!();
    println!("Duration:          {:.0?}", stats.duration);
    println!("Rate:              {:.2} emails/sec", stats.rate);
}

/// Prints the domain-level report.
pub fn print_domain_report(report: &DomainReport, show_spf: bool, show_dmarc: bool) {
    println!();
    println!("Domain: {}", report.domain);
    println!();

    if report.has_mx {
        println!("MX Records:    Found");
        for (i, mx) in report.mx_records.iter().enumerate() {
            println!("  MX[{i}]:       {mx}");
        }
    } else {
        println!("MX Records:    Not found");
    }

    println!("SPF:           {}", yes_no(report.has_spf));
    if show_spf {
        if let Some(spf) = &report.spf_record {
            println!("  Record:      {spf}");
        }
    }

    println!("DMARC:         {}", yes_no(report.has_dmarc));
    if show_dmarc {
        if let Some(dmarc) = &report.dmarc_record {
            println!("  Record:      {dmarc}");
        }
    }

    if report.catch_all_checked {
        println!("Catch-All:     {}", yes_no(report.is_catch_all));
    }
    println!("Disposable:    {}", yes_no(report.is_disposable));
    println!("Free Provider: {}", yes_no(report.is_free_provider));
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_records_every_status() {
        let mut tally = StatusTally::default();
        for status in [
            Status::Valid,
            Status::Valid,
            Status::Invalid,
            Status::Unknown,
            Status::Risky,
            Status::Error,
        ] {
            tally.record(status);
        }
        assert_eq!(tally.valid, 2);
        assert_eq!(tally.invalid, 1);
        assert_eq!(tally.unknown, 1);
        assert_eq!(tally.risky, 1);
        assert_eq!(tally.errors, 1);
    }
}
