use crate::email::InboundMessage;
use crate::persistor::SmtpPersistor;
use email_address::EmailAddress;
use kvmail_store::MAX_ATTACHMENT_SIZE;
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

/// Largest message body accepted, counted with line endings.
pub const MAX_MESSAGE_SIZE: u64 = MAX_ATTACHMENT_SIZE;

/// Longest line read in one piece. A longer line in a message body gets the
/// message refused as oversized; a longer command line ends the session.
const MAX_LINE_LENGTH: u64 = 64 * 1024;

enum SmtpState {
    Start,
    MailFrom,
    RcptTo,
    Data,
    Body,
}

/// What the session loop does after a line.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
    Abort,
}

pub struct SmtpHandler<P: SmtpPersistor, W: AsyncWrite + Unpin> {
    persistor: P,
    hostname: String,

    from: EmailAddress,
    to: EmailAddress,
    body: Vec<String>,
    body_size: u64,
    max_message_size: u64,
    write_stream: W,
    state: SmtpState,
}

impl<P: SmtpPersistor, W: AsyncWrite + Unpin> SmtpHandler<P, W> {
    pub fn new(write_stream: W, persistor: P, hostname: impl Into<String>) -> Self {
        Self {
            persistor,
            hostname: hostname.into(),

            from: EmailAddress::new_unchecked(""),
            to: EmailAddress::new_unchecked(""),
            body: Vec::new(),
            body_size: 0,
            max_message_size: MAX_MESSAGE_SIZE,
            write_stream,
            state: SmtpState::Start,
        }
    }

    pub fn with_max_message_size(mut self, limit: u64) -> Self {
        self.max_message_size = limit;
        self
    }

    pub async fn handle(mut self, read_stream: impl AsyncRead + Unpin) {
        let greeting = format!("220 {} ESMTP kvmail\r\n", self.hostname);
        if !self.write(&greeting).await {
            self.shutdown().await;
            return;
        }

        let mut reader = BufReader::new(read_stream);
        let mut buf = Vec::new();
        // set while the rest of an overlong line is being skipped
        let mut skipping = false;

        loop {
            buf.clear();
            let read = (&mut reader)
                .take(MAX_LINE_LENGTH)
                .read_until(b'\n', &mut buf)
                .await;

            match read {
                Ok(0) => break,
                Ok(_) => {
                    let complete = buf.ends_with(b"\n");
                    let overlong = !complete && buf.len() as u64 == MAX_LINE_LENGTH;
                    if skipping || overlong {
                        skipping = !complete;
                        if self.skip_partial_line(buf.len()).await == Flow::Abort {
                            break;
                        }
                        continue;
                    }

                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\r', '\n']);
                    match self.handle_line(line).await {
                        Flow::Continue => {}
                        Flow::Quit => break,
                        Flow::Abort => {
                            debug!(%line, "closing session after error");
                            break;
                        }
                    }
                }
                Err(e) => {
                    warn!("error reading line: {e}");
                    break;
                }
            }
        }

        self.shutdown().await;
    }

    /// A piece of a line longer than [`MAX_LINE_LENGTH`]. Inside a message it
    /// makes the whole message oversized; anywhere else the session ends.
    async fn skip_partial_line(&mut self, len: usize) -> Flow {
        match self.state {
            SmtpState::Body => {
                self.count_body_bytes((len as u64).max(self.max_message_size.saturating_add(1)));
                Flow::Continue
            }
            _ => self.reject("500 Line too long\r\n").await,
        }
    }

    /// Add to the running body size, dropping the buffered body once it is too big.
    fn count_body_bytes(&mut self, len: u64) {
        self.body_size = self.body_size.saturating_add(len);
        if self.body_size > self.max_message_size && !self.body.is_empty() {
            self.body = Vec::new();
        }
    }

    fn oversized(&self) -> bool {
        self.body_size > self.max_message_size
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.write_stream.shutdown().await {
            debug!("error shutting down stream: {e}");
        }
    }

    async fn write(&mut self, response: &str) -> bool {
        match self.write_stream.write_all(response.as_bytes()).await {
            Ok(()) => true,
            Err(e) => {
                warn!("error writing to stream: {e}");
                false
            }
        }
    }

    /// Write a reply, then continue unless the write failed.
    async fn reply(&mut self, response: &str) -> Flow {
        if self.write(response).await {
            Flow::Continue
        } else {
            Flow::Abort
        }
    }

    /// Write a reply and end the session.
    async fn reject(&mut self, response: &str) -> Flow {
        self.write(response).await;
        Flow::Abort
    }

    async fn handle_line(&mut self, raw: &str) -> Flow {
        let line = raw.trim();

        match self.state {
            SmtpState::Body => self.handle_body_line(raw).await,
            _ if line.eq_ignore_ascii_case("QUIT") => {
                self.write("221 Bye\r\n").await;
                Flow::Quit
            }
            SmtpState::Start => {
                let verb = line.get(..4).map(str::to_ascii_uppercase);
                if matches!(verb.as_deref(), Some("HELO" | "EHLO")) {
                    self.state = SmtpState::MailFrom;
                    self.reply("250 Hello\r\n").await
                } else {
                    self.reject("500 Unrecognized command\r\n").await
                }
            }
            SmtpState::MailFrom => match command_argument(line, "MAIL FROM:") {
                Some(argument) => match parse_path(argument) {
                    Some(address) => {
                        self.from = address;
                        self.state = SmtpState::RcptTo;
                        self.reply("250 OK\r\n").await
                    }
                    None => {
                        self.reject("501 Syntax error in parameters or arguments\r\n")
                            .await
                    }
                },
                None => self.reject("503 Bad sequence of commands\r\n").await,
            },
            SmtpState::RcptTo => match command_argument(line, "RCPT TO:") {
                Some(argument) => match parse_path(argument) {
                    Some(address) => {
                        self.to = address;
                        self.state = SmtpState::Data;
                        self.reply("250 OK\r\n").await
                    }
                    None => {
                        self.reject("501 Syntax error in parameters or arguments\r\n")
                            .await
                    }
                },
                None => self.reject("503 Bad sequence of commands\r\n").await,
            },
            SmtpState::Data => {
                if line.eq_ignore_ascii_case("DATA") {
                    self.state = SmtpState::Body;
                    self.reply("354 Start mail input; end with <CRLF>.<CRLF>\r\n")
                        .await
                } else {
                    self.reject("503 Bad sequence of commands\r\n").await
                }
            }
        }
    }

    async fn handle_body_line(&mut self, line: &str) -> Flow {
        if line == "." {
            // ready for another transaction on the same connection
            self.state = SmtpState::MailFrom;

            if self.oversized() {
                warn!(size = self.body_size, "rejecting oversized message");
                self.body = Vec::new();
                self.body_size = 0;
                return self
                    .reply("552 Message size exceeds fixed maximum message size\r\n")
                    .await;
            }

            self.body_size = 0;
            let message = InboundMessage::from_raw_message(
                &self.from,
                &self.to,
                std::mem::take(&mut self.body),
            );

            if let Err(e) = self.persistor.persist_email(&message).await {
                warn!("error saving email: {e}");
                return self
                    .reply("451 Requested action aborted: local error in processing\r\n")
                    .await;
            }

            return self.reply("250 OK: Message accepted for delivery\r\n").await;
        }

        // RFC 5321 4.5.2: a leading dot on a data line is transparency padding.
        let line = line.strip_prefix('.').unwrap_or(line);
        self.count_body_bytes(line.len() as u64 + 2);
        if !self.oversized() {
            self.body.push(line.to_string());
        }
        Flow::Continue
    }
}

/// The text after `command` when `line` starts with it, ignoring case.
fn command_argument<'a>(line: &'a str, command: &str) -> Option<&'a str> {
    let head = line.get(..command.len())?;
    head.eq_ignore_ascii_case(command)
        .then(|| &line[command.len()..])
}

/// Parse `<addr>` (optionally followed by ESMTP parameters) into an address.
fn parse_path(argument: &str) -> Option<EmailAddress> {
    let path = argument
        .split_whitespace()
        .next()?
        .strip_prefix('<')?
        .strip_suffix('>')?;
    EmailAddress::from_str(path).ok()
}
