//! Command-line entry point for the email verification tool.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use emailverify_core::{PoolConfig, Status, Verifier, VerifierConfig, WorkerPool};

mod args;
mod config;
mod output;
mod report;

use args::{Args, Command};
use config::AppConfig;
use output::OutputWriter;
use report::StatusTally;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args);

    let app_config = config::load(args.config.as_deref())?;
    debug!(?app_config, "configuration loaded");

    let quiet = args.quiet;
    match args.command {
        Command::Check {
            email,
            ip,
            port,
            timeout,
            from,
            helo,
            skip_smtp,
            catch_all,
            output,
            json,
        } => {
            let config = build_verifier_config(
                &app_config,
                ip,
                port,
                timeout,
                from,
                helo,
                skip_smtp,
                catch_all,
            );
            run_check(config, &email, output, json).await
        }
        Command::Bulk {
            file,
            ip,
            port,
            output,
            workers,
            delay,
            jitter,
            timeout,
            from,
            helo,
            health_email,
            health_interval,
            reconnect,
            skip_smtp,
            catch_all,
        } => {
            if reconnect.is_some() {
                debug!("--reconnect accepted for compatibility; one session per probe");
            }
            let verifier_config = build_verifier_config(
                &app_config,
                ip.clone(),
                port,
                timeout,
                from,
                helo,
                skip_smtp,
                catch_all,
            );
            let pool_config = PoolConfig {
                workers: workers.unwrap_or(app_config.bulk.workers),
                delay: Duration::from_secs_f64(delay.unwrap_or(app_config.bulk.delay_secs)),
                jitter: Duration::from_secs_f64(jitter.unwrap_or(app_config.bulk.jitter_secs)),
                health_address: health_email,
                health_interval: health_interval.unwrap_or(app_config.bulk.health_interval),
                buffer_size: app_config.bulk.buffer_size,
            };
            run_bulk(verifier_config, pool_config, ip, file, output, quiet).await
        }
        Command::Domain {
            domain,
            check_catchall,
            check_spf,
            check_dmarc,
            json,
            timeout,
        } => {
            let config = VerifierConfig {
                timeout: Duration::from_secs(timeout.unwrap_or(app_config.verify.timeout_secs)),
                port: app_config.verify.port,
                from_address: app_config.verify.from_address.clone(),
                helo_domain: app_config.verify.helo_domain.clone(),
                skip_tls_verify: app_config.verify.skip_tls_verify,
                ..VerifierConfig::default()
            };
            run_domain(config, &domain, check_catchall, check_spf, check_dmarc, json).await
        }
    }
}

fn init_tracing(args: &Args) {
    let default_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if args.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[allow(clippy::too_many_arguments)]
fn build_verifier_config(
    app: &AppConfig,
    ip: Option<String>,
    port: Option<u16>,
    timeout: Option<u64>,
    from: Option<String>,
    helo: Option<String>,
    skip_smtp: bool,
    check_catch_all: bool,
) -> VerifierConfig {
    VerifierConfig {
        custom_host: ip,
        port: port.unwrap_or(app.verify.port),
        timeout: Duration::from_secs(timeout.unwrap_or(app.verify.timeout_secs)),
        from_address: from.unwrap_or_else(|| app.verify.from_address.clone()),
        helo_domain: helo.unwrap_or_else(|| app.verify.helo_domain.clone()),
        skip_smtp,
        check_catch_all,
        skip_tls_verify: app.verify.skip_tls_verify,
        check_disposable: app.verify.check_disposable,
        check_role: app.verify.check_role,
        check_free_provider: app.verify.check_free_provider,
    }
}

async fn run_check(
    config: VerifierConfig,
    email: &str,
    output: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    info!(email, "verifying email");

    let verifier = Verifier::new(config)?;
    let result = verifier.verify(email).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if let Some(path) = output {
        let writer = OutputWriter::create(&path)?;
        writer.write(&result)?;
        writer.finish()?;
        println!("Result saved to: {}", path.display());
    } else {
        report::print_check_panel(&result);
    }

    // Verification verdicts never fail the process.
    Ok(())
}

async fn run_bulk(
    verifier_config: VerifierConfig,
    pool_config: PoolConfig,
    custom_host: Option<String>,
    file: PathBuf,
    output: PathBuf,
    quiet: bool,
) -> Result<()> {
    let emails = load_emails(&file)?;
    if emails.is_empty() {
        bail!("no emails found in {}", file.display());
    }

    if !quiet {
        report::print_bulk_settings(
            emails.len(),
            custom_host.as_deref(),
            verifier_config.port,
            pool_config.workers,
            pool_config.delay,
            pool_config.jitter,
            verifier_config.timeout,
            pool_config.health_address.as_deref(),
            pool_config.health_interval,
            &output.display().to_string(),
        );
    }

    // A failing health address up front means every probe would be wasted.
    if let Some(health) = pool_config.health_address.clone() {
        if !quiet {
            println!("--- Initial Health Check ---");
            println!("Testing: {health}");
        }
        let probe = Verifier::new(verifier_config.clone())?;
        let health_result = probe.verify(&health).await;
        if health_result.status != Status::Valid {
            bail!(
                "initial health check failed: {} returned {}",
                health,
                health_result.status
            );
        }
        if !quiet {
            println!("Health check PASSED: {health} is valid");
            println!();
        }
    }

    let verifier = Arc::new(Verifier::new(verifier_config)?);
    let writer = OutputWriter::create(&output)?;
    let tally = Arc::new(Mutex::new(StatusTally::default()));

    let pool = {
        let tally = Arc::clone(&tally);
        WorkerPool::new(verifier, pool_config).on_result(move |result| {
            tally.lock().expect("tally poisoned").record(result.status);
            if !quiet {
                report::print_bulk_record(result);
            }
        })
    };

    // Translate an interrupt into hard cancellation of the whole run.
    let token = pool.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!();
            eprintln!("Shutting down gracefully...");
            token.cancel();
        }
    });

    let started = Instant::now();
    let total = emails.len();
    let results = pool.run(emails).await;

    // Emit in input order; the collector already restored it.
    for result in &results {
        writer.write(result)?;
    }
    writer.finish()?;

    if !quiet {
        let tally = tally.lock().expect("tally poisoned").clone();
        report::print_bulk_summary(&tally, &pool.stats(started), total);
    }
    println!();
    println!("Results saved to: {}", output.display());

    Ok(())
}

async fn run_domain(
    config: VerifierConfig,
    domain: &str,
    check_catchall: bool,
    check_spf: bool,
    check_dmarc: bool,
    json: bool,
) -> Result<()> {
    info!(domain, "checking domain");

    let verifier = Verifier::new(config)?;
    let domain_report = verifier.check_domain(domain, check_catchall).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&domain_report)?);
    } else {
        report::print_domain_report(&domain_report, check_spf, check_dmarc);
    }

    Ok(())
}

fn load_emails(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn load_emails_skips_blanks_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emails.txt");
        std::fs::write(
            &path,
            "user1@example.com\n\n# a comment\n  user2@example.com  \n",
        )
        .unwrap();

        let emails = load_emails(&path).unwrap();
        assert_eq!(emails, vec!["user1@example.com", "user2@example.com"]);
    }

    #[test]
    fn flags_override_config_defaults() {
        let app = AppConfig::default();
        let config = build_verifier_config(
            &app,
            Some("203.0.113.7".to_string()),
            Some(2525),
            Some(5),
            None,
            None,
            true,
            false,
        );

        assert_eq!(config.custom_host.as_deref(), Some("203.0.113.7"));
        assert_eq!(config.port, 2525);
        assert_eq!(config.timeout, Duration::from_secs(5));
        // Unset flags fall back to the configuration layer.
        assert_eq!(config.from_address, "test@gmail.com");
        assert!(config.skip_smtp);
    }
}
