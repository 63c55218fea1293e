use super::sendmail::{MailError, render, send_email};
use crate::config::SmtpSettings;
use crate::utils::reset_token::RESET_TOKEN_TTL_MINUTES;

const RESET_PASSWORD_TEMPLATE: &str = include_str!("templates/reset-password.html");

pub fn reset_link(frontend_url: &str, raw_token: &str) -> String {
    format!(
        "{}/reset-password/{}",
        frontend_url.trim_end_matches('/'),
        raw_token
    )
}

pub async fn send_reset_password_email(
    smtp: &SmtpSettings,
    to_email: &str,
    name: &str,
    reset_link: &str,
) -> Result<(), MailError> {
    let html = render(
        RESET_PASSWORD_TEMPLATE,
        &[
            ("name", name.to_string()),
            ("reset_link", reset_link.to_string()),
            ("ttl_minutes", RESET_TOKEN_TTL_MINUTES.to_string()),
        ],
    );

    send_email(smtp, to_email, "Password reset token", html).await
}
