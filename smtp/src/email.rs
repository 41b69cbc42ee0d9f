use email_address::EmailAddress;
use kvmail_types::{EmailType, NewEmail};

/// A message accepted over SMTP, split into headers and body.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub headers: Vec<(String, String)>,
    pub text: String,
    pub html: Option<String>,
}

impl InboundMessage {
    /// Build a message from the envelope and the raw DATA lines.
    ///
    /// `From`/`To` headers win over the envelope addresses so display names
    /// survive (`"Name <addr>"`).
    pub fn from_raw_message(from: &EmailAddress, to: &EmailAddress, body_lines: Vec<String>) -> Self {
        let mut headers: Vec<(String, String)> = Vec::new();
        let mut body = String::new();
        let mut parsing_headers = true;

        for line in body_lines {
            if parsing_headers {
                if line.is_empty() {
                    parsing_headers = false;
                    continue;
                }

                let folded = line.starts_with([' ', '\t']);
                match line.split_once(':') {
                    Some((key, value)) if !folded => {
                        headers.push((key.trim().to_string(), value.trim().to_string()));
                    }
                    _ => match headers.last_mut() {
                        Some((_, value)) => {
                            value.push(' ');
                            value.push_str(line.trim());
                        }
                        // no header block at all; the message is body only
                        None => {
                            parsing_headers = false;
                            body.push_str(&line);
                            body.push_str("\r\n");
                        }
                    },
                }
            } else {
                body.push_str(&line);
                body.push_str("\r\n");
            }
        }

        let header = |name: &str| {
            headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.clone())
        };

        let is_html = header("Content-Type")
            .is_some_and(|value| value.to_ascii_lowercase().starts_with("text/html"));

        Self {
            from: header("From").unwrap_or_else(|| from.to_string()),
            to: header("To").unwrap_or_else(|| to.to_string()),
            subject: header("Subject").unwrap_or_default(),
            html: is_html.then(|| body.clone()),
            text: body,
            headers,
        }
    }

    pub fn into_new_email(self) -> NewEmail {
        let email = NewEmail::new(EmailType::Received, self.from, self.to, self.subject, self.text);
        match self.html {
            Some(html) => email.with_html(html),
            None => email,
        }
    }
}
