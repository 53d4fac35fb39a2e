//! SMTP session state machine and the `RCPT TO` probe.
//!
//! The session drives a single TCP connection through greeting, capability
//! discovery, opportunistic STARTTLS upgrade, envelope announcement and the
//! recipient probe. No message is ever transmitted; the dialog stops before
//! the data phase.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::result::Status;
use crate::{Result, VerifyError};

/// Connection settings for one SMTP session.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    pub from_address: String,
    pub helo_domain: String,
    pub skip_tls_verify: bool,
}

/// Where the session currently stands in the command dialog.
///
/// Commands issued outside their permitted state are rejected before
/// anything is written to the wire, so the session can never announce a
/// recipient without a successful `MAIL FROM`, or an envelope without a
/// successful greeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Greeted,
    Envelope,
    Probed,
    Closed,
}

/// One parsed server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Numeric code from the first three bytes; 0 means the head was
    /// malformed, which callers treat as a transport failure.
    pub code: u16,
    /// Concatenated reply text, continuation lines included.
    pub text: String,
    /// True when the reply spanned more than one line.
    pub multiline: bool,
}

enum Transport {
    Plain(BufReader<TcpStream>),
    Tls(BufReader<tokio_native_tls::TlsStream<TcpStream>>),
    Closed,
}

/// Client side of one SMTP conversation.
pub struct SmtpSession {
    transport: Transport,
    config: SmtpConfig,
    features: HashSet<String>,
    tls_used: bool,
    state: SessionState,
}

impl SmtpSession {
    /// Opens the TCP connection and consumes the 220 banner.
    pub async fn connect(config: SmtpConfig) -> Result<Self> {
        debug!(host = %config.host, port = config.port, "connecting");

        let stream = io_deadline(
            config.timeout,
            TcpStream::connect((config.host.as_str(), config.port)),
        )
        .await?;

        let mut session = Self {
            transport: Transport::Plain(BufReader::new(stream)),
            config,
            features: HashSet::new(),
            tls_used: false,
            state: SessionState::Connected,
        };

        let banner = session.read_reply().await?;
        if banner.code != 220 {
            return Err(VerifyError::UnexpectedReply {
                command: "connect",
                code: banner.code,
                response: banner.text,
            });
        }

        debug!(banner = %banner.text.trim(), "connected");
        Ok(session)
    }

    /// Greets the server with `EHLO`, falling back to `HELO` on a non-250
    /// reply. A 250 to `EHLO` rebuilds the advertised feature set.
    pub async fn greet(&mut self) -> Result<()> {
        // Greeted is permitted again for the second EHLO after STARTTLS.
        self.require(&[SessionState::Connected, SessionState::Greeted], "EHLO")?;

        let ehlo = format!("EHLO {}", self.config.helo_domain);
        let reply = self.send_command(&ehlo).await?;
        if reply.code == 250 {
            self.features = parse_features(&reply);
            self.state = SessionState::Greeted;
            return Ok(());
        }

        debug!(code = reply.code, "EHLO rejected, trying HELO");
        let helo = format!("HELO {}", self.config.helo_domain);
        let reply = self.send_command(&helo).await?;
        if reply.code != 250 {
            return Err(VerifyError::UnexpectedReply {
                command: "HELO",
                code: reply.code,
                response: reply.text,
            });
        }

        self.features.clear();
        self.state = SessionState::Greeted;
        Ok(())
    }

    /// Upgrades the transport when the server advertises `STARTTLS`.
    ///
    /// On a 220 reply the socket is wrapped in TLS and capability discovery
    /// repeats on the secured transport, as the protocol mandates. A non-220
    /// reply leaves the session in plaintext and is not an error; a failed
    /// handshake is.
    pub async fn maybe_starttls(&mut self) -> Result<bool> {
        if !self.supports_tls() {
            debug!("STARTTLS not advertised by server");
            return Ok(false);
        }
        self.require(&[SessionState::Greeted], "STARTTLS")?;

        let reply = self.send_command("STARTTLS").await?;
        if reply.code != 220 {
            warn!(code = reply.code, "STARTTLS rejected, continuing without TLS");
            return Ok(false);
        }

        self.upgrade().await?;
        self.features.clear();
        self.greet().await?;
        Ok(true)
    }

    /// Announces the envelope sender.
    ///
    /// A 530 reply whose body mentions STARTTLS upgrades the transport
    /// mid-flow and retries the command once; any other failure propagates.
    pub async fn mail_from(&mut self) -> Result<()> {
        self.require(&[SessionState::Greeted, SessionState::Envelope], "MAIL FROM")?;

        let cmd = format!("MAIL FROM:<{}>", self.config.from_address);
        let mut reply = self.send_command(&cmd).await?;

        if reply.code == 530 && reply.text.to_uppercase().contains("STARTTLS") && !self.tls_used {
            debug!("server requires STARTTLS, upgrading mid-flow");
            let tls_reply = self.send_command("STARTTLS").await?;
            if tls_reply.code == 220 {
                self.upgrade().await?;
                self.features.clear();
                self.greet().await?;
            }
            reply = self.send_command(&cmd).await?;
        }

        if reply.code != 250 {
            return Err(VerifyError::UnexpectedReply {
                command: "MAIL FROM",
                code: reply.code,
                response: reply.text,
            });
        }

        self.state = SessionState::Envelope;
        Ok(())
    }

    /// Announces a candidate recipient and returns the terminal reply.
    pub async fn rcpt_to(&mut self, recipient: &str) -> Result<Reply> {
        self.require(&[SessionState::Envelope], "RCPT TO")?;

        let reply = self
            .send_command(&format!("RCPT TO:<{recipient}>"))
            .await?;
        self.state = SessionState::Probed;
        Ok(reply)
    }

    /// Clears the envelope so a second probe can run on the same session.
    pub async fn reset(&mut self) -> Result<()> {
        self.require(&[SessionState::Probed], "RSET")?;
        self.send_command("RSET").await?;
        self.state = SessionState::Envelope;
        Ok(())
    }

    /// Says goodbye and closes the transport. Best effort: the socket is
    /// closed regardless of whether the server acknowledges.
    pub async fn quit(mut self) {
        if self.state != SessionState::Closed {
            let _ = self.send_command("QUIT").await;
            self.state = SessionState::Closed;
        }
        self.transport = Transport::Closed;
    }

    /// True when the server advertised `STARTTLS`.
    pub fn supports_tls(&self) -> bool {
        self.features.contains("STARTTLS")
    }

    /// True once the transport has been upgraded.
    pub fn tls_used(&self) -> bool {
        self.tls_used
    }

    /// Capability tokens from the last successful `EHLO`.
    pub fn features(&self) -> &HashSet<String> {
        &self.features
    }

    fn require(&self, allowed: &[SessionState], command: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(VerifyError::OutOfOrder {
                command,
                state: self.state,
            })
        }
    }

    async fn upgrade(&mut self) -> Result<()> {
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(self.config.skip_tls_verify)
            .danger_accept_invalid_hostnames(self.config.skip_tls_verify)
            .build()?;
        let connector = tokio_native_tls::TlsConnector::from(connector);

        let Transport::Plain(reader) = std::mem::replace(&mut self.transport, Transport::Closed)
        else {
            return Err(VerifyError::Config(
                "STARTTLS on an already-secured transport".to_string(),
            ));
        };
        let stream = reader.into_inner();

        let tls = match timeout(self.config.timeout, connector.connect(&self.config.host, stream))
            .await
        {
            Ok(Ok(tls)) => tls,
            Ok(Err(e)) => return Err(VerifyError::Tls(e)),
            Err(_) => return Err(VerifyError::Timeout(self.config.timeout)),
        };

        self.transport = Transport::Tls(BufReader::new(tls));
        self.tls_used = true;
        info!(host = %self.config.host, "TLS established");
        Ok(())
    }

    async fn send_command(&mut self, cmd: &str) -> Result<Reply> {
        debug!(">> {cmd}");
        self.write_line(cmd).await?;
        let reply = self.read_reply().await?;
        debug!("<< {}", reply.text.trim());
        Ok(reply)
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        let data = format!("{line}\r\n");
        let limit = self.config.timeout;
        match &mut self.transport {
            Transport::Plain(r) => {
                io_deadline(limit, r.get_mut().write_all(data.as_bytes())).await?;
                io_deadline(limit, r.get_mut().flush()).await
            }
            Transport::Tls(r) => {
                io_deadline(limit, r.get_mut().write_all(data.as_bytes())).await?;
                io_deadline(limit, r.get_mut().flush()).await
            }
            Transport::Closed => Err(VerifyError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "session closed",
            ))),
        }
    }

    /// Reads one complete reply, concatenating continuation lines until a
    /// line whose fourth byte is a space.
    async fn read_reply(&mut self) -> Result<Reply> {
        let mut text = String::new();
        let mut code = 0u16;
        let mut lines = 0usize;

        loop {
            let line = self.read_line().await?;
            lines += 1;
            text.push_str(&line);

            if line.as_bytes().len() < 4 {
                return Err(VerifyError::MalformedReply(text));
            }
            if lines == 1 {
                code = parse_code(&line);
                if code == 0 {
                    return Err(VerifyError::MalformedReply(text));
                }
            }
            if line.as_bytes()[3] == b' ' {
                break;
            }
        }

        Ok(Reply {
            code,
            text,
            multiline: lines > 1,
        })
    }

    async fn read_line(&mut self) -> Result<String> {
        let limit = self.config.timeout;
        let mut line = String::new();
        let n = match &mut self.transport {
            Transport::Plain(r) => io_deadline(limit, r.read_line(&mut line)).await?,
            Transport::Tls(r) => io_deadline(limit, r.read_line(&mut line)).await?,
            Transport::Closed => {
                return Err(VerifyError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "session closed",
                )))
            }
        };
        if n == 0 {
            return Err(VerifyError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            )));
        }
        Ok(line)
    }
}

/// Wraps one I/O operation in the per-operation deadline.
async fn io_deadline<T>(
    limit: Duration,
    fut: impl Future<Output = std::io::Result<T>>,
) -> Result<T> {
    match timeout(limit, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(VerifyError::Io(e)),
        Err(_) => Err(VerifyError::Timeout(limit)),
    }
}

/// Extracts the numeric code from a reply head. Malformed heads yield 0.
pub fn parse_code(line: &str) -> u16 {
    line.get(..3)
        .and_then(|head| head.parse().ok())
        .unwrap_or(0)
}

/// Collects capability tokens from an EHLO reply: for each continuation
/// line, the first whitespace-delimited word after the four-byte prefix,
/// upper-cased.
pub fn parse_features(reply: &Reply) -> HashSet<String> {
    reply
        .text
        .lines()
        .skip(1)
        .filter_map(|line| {
            let rest = line.get(4..)?;
            let token = rest.split_whitespace().next()?;
            Some(token.to_uppercase())
        })
        .collect()
}

/// Maps a 55x rejection body to a human-readable phrase by substring match.
pub fn rejection_reason(response: &str) -> &'static str {
    let response = response.to_lowercase();

    if response.contains("user unknown") || response.contains("does not exist") {
        "User does not exist"
    } else if response.contains("mailbox not found") {
        "Mailbox not found"
    } else if response.contains("recipient rejected") {
        "Recipient rejected"
    } else if response.contains("no such user") {
        "No such user"
    } else if response.contains("invalid recipient") {
        "Invalid recipient"
    } else if response.contains("disabled") {
        "Mailbox disabled"
    } else if response.contains("over quota") {
        "Mailbox over quota"
    } else {
        "Recipient rejected"
    }
}

/// Generates a recipient that should not exist, for catch-all testing.
/// Repeated calls against the same domain produce different probes.
pub fn random_probe_address(domain: &str) -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let local: String = (0..16)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    format!("emailverify_test_{local}@{domain}")
}

/// Outcome of a full probe session for one address.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub status: Status,
    pub code: u16,
    pub response: String,
    pub reason: String,
    pub smtp_success: bool,
    pub tls_used: bool,
    pub catch_all: bool,
    pub catch_all_checked: bool,
}

/// Runs the complete probe dialog against one host: greeting, opportunistic
/// upgrade, envelope, recipient announcement and (when requested and the
/// recipient was accepted) a catch-all probe on the same session.
pub async fn probe_address(
    config: SmtpConfig,
    email: &str,
    domain: &str,
    check_catch_all: bool,
) -> Result<ProbeReport> {
    let mut session = SmtpSession::connect(config).await?;

    match drive_probe(&mut session, email, domain, check_catch_all).await {
        Ok(report) => {
            session.quit().await;
            Ok(report)
        }
        // Transport is closed when the session drops.
        Err(e) => Err(e),
    }
}

async fn drive_probe(
    session: &mut SmtpSession,
    email: &str,
    domain: &str,
    check_catch_all: bool,
) -> Result<ProbeReport> {
    session.greet().await?;
    session.maybe_starttls().await?;
    session.mail_from().await?;

    let reply = session.rcpt_to(email).await?;
    let response = reply.text.trim().to_string();

    let mut report = ProbeReport {
        status: Status::Unknown,
        code: reply.code,
        response: response.clone(),
        reason: String::new(),
        smtp_success: false,
        tls_used: session.tls_used(),
        catch_all: false,
        catch_all_checked: false,
    };

    match reply.code {
        250 | 251 => {
            report.status = Status::Valid;
            report.smtp_success = true;
            info!(email, code = reply.code, "recipient accepted");
        }
        252 => {
            report.reason = "Server cannot verify but will attempt delivery".to_string();
        }
        550..=559 => {
            report.status = Status::Invalid;
            report.reason = rejection_reason(&response).to_string();
            info!(email, code = reply.code, reason = %report.reason, "recipient rejected");
        }
        450..=459 => {
            report.reason = format!("Temporary failure: {response}");
        }
        other => {
            report.reason = format!("Unexpected code {other}: {response}");
        }
    }

    if check_catch_all && report.status == Status::Valid {
        if session.reset().await.is_ok() && session.mail_from().await.is_ok() {
            let random_email = random_probe_address(domain);
            debug!(probe = %random_email, "testing for catch-all");

            if let Ok(catch_reply) = session.rcpt_to(&random_email).await {
                report.catch_all_checked = true;
                if matches!(catch_reply.code, 250 | 251) {
                    report.catch_all = true;
                    report.status = Status::Risky;
                    report.reason = "Domain accepts all emails (catch-all)".to_string();
                    info!(domain, "domain is catch-all");
                } else {
                    debug!(domain, code = catch_reply.code, "domain is not catch-all");
                }
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_code_reads_first_three_bytes() {
        assert_eq!(parse_code("250 OK\r\n"), 250);
        assert_eq!(parse_code("550-No such user\r\n"), 550);
        assert_eq!(parse_code("hi\r\n"), 0);
        assert_eq!(parse_code("xyz mailbox\r\n"), 0);
        assert_eq!(parse_code(""), 0);
    }

    #[test]
    fn features_come_from_continuation_lines() {
        let reply = Reply {
            code: 250,
            text: "250-mail.example.com Hello\r\n250-SIZE 35882577\r\n250-starttls\r\n250 8BITMIME\r\n".to_string(),
            multiline: true,
        };
        let features = parse_features(&reply);
        assert!(features.contains("STARTTLS"));
        assert!(features.contains("SIZE"));
        assert!(features.contains("8BITMIME"));
        // The greeting line itself contributes nothing.
        assert!(!features.contains("MAIL.EXAMPLE.COM"));
    }

    #[test]
    fn single_line_greeting_has_no_features() {
        let reply = Reply {
            code: 250,
            text: "250 mail.example.com\r\n".to_string(),
            multiline: false,
        };
        assert!(parse_features(&reply).is_empty());
    }

    #[test]
    fn rejection_reasons_by_substring() {
        assert_eq!(rejection_reason("550 User unknown"), "User does not exist");
        assert_eq!(
            rejection_reason("550 5.1.1 Address does not exist"),
            "User does not exist"
        );
        assert_eq!(rejection_reason("550 Mailbox not found"), "Mailbox not found");
        assert_eq!(rejection_reason("554 no such user here"), "No such user");
        assert_eq!(
            rejection_reason("553 Invalid recipient address"),
            "Invalid recipient"
        );
        assert_eq!(rejection_reason("550 account disabled"), "Mailbox disabled");
        assert_eq!(
            rejection_reason("552 mailbox over quota"),
            "Mailbox over quota"
        );
        assert_eq!(rejection_reason("550 go away"), "Recipient rejected");
    }

    #[test]
    fn random_probe_address_shape() {
        let addr = random_probe_address("example.com");
        let (local, domain) = addr.split_once('@').unwrap();
        assert_eq!(domain, "example.com");
        let suffix = local.strip_prefix("emailverify_test_").unwrap();
        assert_eq!(suffix.len(), 16);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn random_probe_addresses_differ_across_invocations() {
        let a = random_probe_address("example.com");
        let b = random_probe_address("example.com");
        assert_ne!(a, b);
    }
}
