use lettre::{
    Message, SmtpTransport, Transport,
    message::{Mailbox, SinglePart, header},
    transport::smtp::authentication::Credentials,
};

use crate::config::SmtpSettings;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp transport failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("mail task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Replace every `{{key}}` placeholder in `template`.
pub fn render(template: &str, placeholders: &[(&str, String)]) -> String {
    placeholders
        .iter()
        .fold(template.to_string(), |html, (key, value)| {
            html.replace(&format!("{{{{{}}}}}", key), value)
        })
}

/// Send an HTML email over STARTTLS. The SMTP exchange is blocking, so it
/// runs on the blocking pool.
pub async fn send_email(
    smtp: &SmtpSettings,
    to_email: &str,
    subject: &str,
    html: String,
) -> Result<(), MailError> {
    let from: Mailbox = smtp.username.parse()?;
    let to: Mailbox = to_email.parse()?;

    let email = Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .singlepart(
            SinglePart::builder()
                .header(header::ContentType::TEXT_HTML)
                .body(html),
        )?;

    let creds = Credentials::new(smtp.username.clone(), smtp.password.clone());
    let mailer = SmtpTransport::starttls_relay(&smtp.server)?
        .credentials(creds)
        .port(smtp.port)
        .build();

    tokio::task::spawn_blocking(move || mailer.send(&email)).await??;
    tracing::info!(to = to_email, subject, "Email sent");

    Ok(())
}
