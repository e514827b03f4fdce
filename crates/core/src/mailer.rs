//! SMTP dispatch for the `email` notification channel. Configuration is a
//! single process-wide `SmtpConfig` (spec §6 has no per-tenant SMTP surface),
//! loaded once at startup by the api crate and handed down by reference.

use lettre::{
    transport::smtp::authentication::Credentials,
    transport::smtp::client::{Tls, TlsParameters},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub use_tls: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("SMTP is not configured")]
    NotConfigured,
    #[error("failed to build email: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("failed to send email: {0}")]
    Send(#[from] lettre::transport::smtp::Error),
    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
}

pub async fn send_email(config: &SmtpConfig, to: &str, subject: &str, body: &str) -> Result<(), MailerError> {
    let email = Message::builder()
        .from(config.from.parse()?)
        .to(to.parse()?)
        .subject(subject)
        .body(body.to_string())?;

    let creds = Credentials::new(config.username.clone(), config.password.clone());
    let tls = if config.use_tls {
        Tls::Wrapper(TlsParameters::new(config.host.clone())?)
    } else {
        Tls::None
    };

    let mailer: AsyncSmtpTransport<Tokio1Executor> = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        .port(config.port)
        .credentials(creds)
        .tls(tls)
        .timeout(Some(Duration::from_secs(10)))
        .build();

    mailer.send(email).await?;
    Ok(())
}

pub async fn test_smtp_connection(config: &SmtpConfig) -> Result<(), MailerError> {
    let creds = Credentials::new(config.username.clone(), config.password.clone());
    let tls = if config.use_tls {
        Tls::Wrapper(TlsParameters::new(config.host.clone())?)
    } else {
        Tls::None
    };

    let mailer: AsyncSmtpTransport<Tokio1Executor> = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        .port(config.port)
        .credentials(creds)
        .tls(tls)
        .timeout(Some(Duration::from_secs(5)))
        .build();

    mailer.test_connection().await?;
    Ok(())
}
