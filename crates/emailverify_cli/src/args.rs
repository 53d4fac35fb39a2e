//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "emailverify",
    about = "Email verification tool using the SMTP RCPT TO method",
    version
)]
pub struct Args {
    /// Configuration file (defaults to ./Config.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Verify a single email address
    Check {
        /// Address to verify
        email: String,

        /// Custom SMTP server IP/hostname instead of the MX lookup result
        #[arg(short = 'i', long = "ip")]
        ip: Option<String>,

        /// SMTP port
        #[arg(short, long)]
        port: Option<u16>,

        /// Connection timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// MAIL FROM address
        #[arg(long)]
        from: Option<String>,

        /// EHLO domain
        #[arg(long)]
        helo: Option<String>,

        /// Skip SMTP verification
        #[arg(long)]
        skip_smtp: bool,

        /// Check for a catch-all domain
        #[arg(long = "catch-all")]
        catch_all: bool,

        /// Output file (format detected from the extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Verify multiple emails from a file
    Bulk {
        /// Input file with one email per line
        #[arg(short, long)]
        file: PathBuf,

        /// Custom SMTP server IP/hostname instead of the MX lookup result
        #[arg(short = 'i', long = "ip")]
        ip: Option<String>,

        /// SMTP port
        #[arg(short, long)]
        port: Option<u16>,

        /// Output file (format detected from the extension)
        #[arg(short, long, default_value = "results.csv")]
        output: PathBuf,

        /// Number of concurrent workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Delay between checks in seconds
        #[arg(short, long)]
        delay: Option<f64>,

        /// Random jitter added to the delay in seconds
        #[arg(long)]
        jitter: Option<f64>,

        /// Connection timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// MAIL FROM address
        #[arg(long)]
        from: Option<String>,

        /// EHLO domain
        #[arg(long)]
        helo: Option<String>,

        /// Known-valid email used for periodic health checks
        #[arg(long)]
        health_email: Option<String>,

        /// Run the health check every N emails per worker
        #[arg(long)]
        health_interval: Option<usize>,

        /// Accepted for compatibility; sessions are not reused across probes
        #[arg(long)]
        reconnect: Option<usize>,

        /// Skip SMTP verification
        #[arg(long)]
        skip_smtp: bool,

        /// Check for catch-all domains
        #[arg(long = "catch-all")]
        catch_all: bool,
    },

    /// Check domain-level information
    Domain {
        /// Domain to inspect
        domain: String,

        /// Probe a random recipient to detect catch-all configuration
        #[arg(long = "check-catchall")]
        check_catchall: bool,

        /// Show the SPF record body
        #[arg(long = "check-spf")]
        check_spf: bool,

        /// Show the DMARC record body
        #[arg(long = "check-dmarc")]
        check_dmarc: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Connection timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_parses_address_and_flags() {
        let args = Args::try_parse_from([
            "emailverify",
            "check",
            "user@example.com",
            "--skip-smtp",
            "--json",
            "-p",
            "2525",
        ])
        .unwrap();

        match args.command {
            Command::Check {
                email,
                skip_smtp,
                json,
                port,
                catch_all,
                ..
            } => {
                assert_eq!(email, "user@example.com");
                assert!(skip_smtp);
                assert!(json);
                assert_eq!(port, Some(2525));
                assert!(!catch_all);
            }
            _ => panic!("expected check subcommand"),
        }
    }

    #[test]
    fn bulk_requires_file() {
        assert!(Args::try_parse_from(["emailverify", "bulk"]).is_err());

        let args =
            Args::try_parse_from(["emailverify", "bulk", "-f", "emails.txt", "-w", "5"]).unwrap();
        match args.command {
            Command::Bulk {
                file,
                workers,
                output,
                reconnect,
                ..
            } => {
                assert_eq!(file.to_str(), Some("emails.txt"));
                assert_eq!(workers, Some(5));
                assert_eq!(output.to_str(), Some("results.csv"));
                assert_eq!(reconnect, None);
            }
            _ => panic!("expected bulk subcommand"),
        }
    }

    #[test]
    fn domain_flags() {
        let args = Args::try_parse_from([
            "emailverify",
            "domain",
            "example.com",
            "--check-catchall",
            "--check-spf",
        ])
        .unwrap();

        match args.command {
            Command::Domain {
                domain,
                check_catchall,
                check_spf,
                check_dmarc,
                ..
            } => {
                assert_eq!(domain, "example.com");
                assert!(check_catchall);
                assert!(check_spf);
                assert!(!check_dmarc);
            }
            _ => panic!("expected domain subcommand"),
        }
    }

    #[test]
    fn global_flags_apply_before_subcommand() {
        let args =
            Args::try_parse_from(["emailverify", "-q", "-vv", "check", "user@example.com"])
                .unwrap();
        assert!(args.quiet);
        assert_eq!(args.verbose, 2);
    }
}
