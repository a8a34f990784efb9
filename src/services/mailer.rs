use std::time::Duration;

use askama::Template;
use async_smtp::{
    authentication::{Credentials, Mechanism},
    commands::{AuthCommand, QuitCommand},
    EmailAddress, Envelope, SendableEmail, SmtpClient, SmtpTransport,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite, BufStream},
    net::TcpStream,
};

use crate::{
    configuration::EmailSettings,
    domain::parcel::{FunctionalUnit, ParcelResolution},
};

const BOUNDARY: &str = "=_partidas_alternative";

#[derive(Debug, Error)]
pub enum SendError {
    #[error("nothing to send: the parcel was not resolved")]
    Unresolved,

    #[error("invalid email address {0:?}")]
    Address(String),

    #[error("invalid SMTP envelope: {0}")]
    Envelope(String),

    #[error("failed to render email: {0}")]
    Template(#[from] askama::Error),

    #[error("failed to connect to the SMTP server: {0}")]
    Connect(#[from] std::io::Error),

    #[error("TLS handshake with the SMTP server failed: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] async_smtp::error::Error),

    #[error("SMTP conversation timed out after {0:?}")]
    Timeout(Duration),
}

/// Delivers resolved partidas to whoever asked for them.
#[async_trait]
pub trait PartidaNotifier: Send + Sync {
    async fn notify(&self, email: &str, resolution: &ParcelResolution) -> Result<(), SendError>;
}

#[derive(Template)]
#[template(path = "partida_email.html")]
struct PartidaEmailHtml<'a> {
    logo_url: &'a str,
    lookup_url: &'a str,
    matriz: &'a str,
    units: &'a [FunctionalUnit],
}

#[derive(Template)]
#[template(path = "partida_email.txt")]
struct PartidaEmailText<'a> {
    matriz: &'a str,
    units: &'a [FunctionalUnit],
}

#[derive(Debug)]
pub struct RenderedEmail {
    pub text: String,
    pub html: String,
}

pub fn render_partida_email(
    settings: &EmailSettings,
    resolution: &ParcelResolution,
) -> Result<RenderedEmail, SendError> {
    let (matriz, units): (&str, &[FunctionalUnit]) = match resolution {
        ParcelResolution::Simple { matriz } => (matriz.as_str(), &[][..]),
        ParcelResolution::Horizontal { units } => ("", units.as_slice()),
        ParcelResolution::NotFound(_) => return Err(SendError::Unresolved),
    };

    let text = PartidaEmailText { matriz, units }.render()?;
    let html = PartidaEmailHtml {
        logo_url: &settings.logo_url,
        lookup_url: &settings.lookup_url,
        matriz,
        units,
    }
    .render()?;

    Ok(RenderedEmail { text, html })
}

pub struct SmtpMailer {
    settings: EmailSettings,
}

impl SmtpMailer {
    pub fn new(settings: EmailSettings) -> Self {
        SmtpMailer { settings }
    }

    async fn deliver(&self, envelope: Envelope, message: String) -> Result<(), SendError> {
        let timeout = self.settings.timeout();
        tokio::time::timeout(timeout, self.converse(envelope, message))
            .await
            .map_err(|_| SendError::Timeout(timeout))?
    }

    async fn converse(&self, envelope: Envelope, message: String) -> Result<(), SendError> {
        // Define a new trait that combines AsyncRead, AsyncWrite, and Unpin
        trait AsyncReadWrite: AsyncRead + AsyncWrite + Unpin + Send {}
        impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncReadWrite for T {}

        let host = self.settings.smtp_host.as_str();
        let stream = TcpStream::connect((host, self.settings.smtp_port)).await?;
        let stream: Box<dyn AsyncReadWrite> = match self.settings.implicit_tls {
            true => {
                let connector = native_tls::TlsConnector::builder()
                    .danger_accept_invalid_certs(self.settings.accept_invalid_certs)
                    .build()?;
                let connector = tokio_native_tls::TlsConnector::from(connector);
                Box::new(connector.connect(host, stream).await?)
            }
            false => Box::new(stream),
        };

        let client = SmtpClient::new();
        let mut transport = SmtpTransport::new(client, BufStream::new(stream)).await?;

        if !self.settings.username.is_empty() {
            let credentials =
                Credentials::new(self.settings.username.clone(), self.settings.password.clone());
            transport
                .get_mut()
                .command(AuthCommand::new(Mechanism::Plain, credentials, None)?)
                .await?;
        }

        transport
            .send(SendableEmail::new(envelope, message))
            .await?;
        transport.get_mut().command(QuitCommand).await?;

        Ok(())
    }
}

#[async_trait]
impl PartidaNotifier for SmtpMailer {
    async fn notify(&self, email: &str, resolution: &ParcelResolution) -> Result<(), SendError> {
        let rendered = render_partida_email(&self.settings, resolution)?;

        let recipient = parse_recipient(email)?;
        let to = recipient.to_string();

        let mut recipients = vec![recipient];
        if let Some(bcc) = &self.settings.bcc {
            recipients.push(parse_address(bcc)?);
        }
        let envelope = Envelope::new(Some(parse_address(&self.settings.sender)?), recipients)
            .map_err(|e| SendError::Envelope(e.to_string()))?;
        let message = compose_message(&self.settings.sender, &to, &self.settings.subject, &rendered);

        match self.deliver(envelope, message).await {
            Ok(()) => {
                log::info!("Partida email sent to {}", email);
                Ok(())
            }
            Err(e) => {
                log::error!("Error sending partida email to {}: {}", email, e);
                Err(e)
            }
        }
    }
}

/// The requester's address must be a bare `user@host`. Anything that could
/// end a header line or carry a display name is refused.
fn parse_recipient(email: &str) -> Result<EmailAddress, SendError> {
    let address = email.trim();
    let forbidden = |c: char| {
        c.is_whitespace() || c.is_control() || matches!(c, '<' | '>' | ',' | ';' | '"')
    };
    let bare = !address.chars().any(forbidden)
        && matches!(
            address.split_once('@'),
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        );

    match bare {
        true => address
            .parse::<EmailAddress>()
            .map_err(|_| SendError::Address(email.to_string())),
        false => Err(SendError::Address(email.to_string())),
    }
}

/// Configured mailboxes: both `user@host` and `Display Name <user@host>`.
fn parse_address(mailbox: &str) -> Result<EmailAddress, SendError> {
    let address = match (mailbox.rfind('<'), mailbox.rfind('>')) {
        (Some(start), Some(end)) if start < end => &mailbox[start + 1..end],
        _ => mailbox,
    }
    .trim();

    match address.contains('@') {
        true => address
            .parse::<EmailAddress>()
            .map_err(|_| SendError::Address(mailbox.to_string())),
        false => Err(SendError::Address(mailbox.to_string())),
    }
}

fn compose_message(from: &str, to: &str, subject: &str, rendered: &RenderedEmail) -> String {
    format!(
        "From: {from}\r\n\
         To: {to}\r\n\
         Subject: {subject}\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: multipart/alternative; boundary=\"{boundary}\"\r\n\
         \r\n\
         --{boundary}\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         Content-Transfer-Encoding: base64\r\n\
         \r\n\
         {text}\r\n\
         --{boundary}\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         Content-Transfer-Encoding: base64\r\n\
         \r\n\
         {html}\r\n\
         --{boundary}--\r\n",
        boundary = BOUNDARY,
        subject = encode_header(subject),
        text = encode_body(&rendered.text),
        html = encode_body(&rendered.html),
    )
}

fn encode_header(value: &str) -> String {
    match value.is_ascii() {
        true => value.to_string(),
        false => format!("=?UTF-8?B?{}?=", STANDARD.encode(value)),
    }
}

fn encode_body(body: &str) -> String {
    let encoded = STANDARD.encode(body);
    encoded
        .as_bytes()
        .chunks(76)
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect::<Vec<String>>()
        .join("\r\n")
}
