//! Email delivery for finished reports.
//!
//! Uses SMTP via lettre. Each report email is a mixed multipart: a
//! text+HTML body followed by the CSV artifacts as attachments.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::info;

use crate::config::EmailConfig;

use super::csv::CsvArtifact;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Invalid attachment content type.
    #[error("Invalid content type: {0}")]
    ContentType(#[from] lettre::message::header::ContentTypeErr),
}

/// SMTP mailer for report delivery.
#[derive(Clone)]
pub struct ReportMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    recipients: Vec<String>,
}

impl ReportMailer {
    /// Create a mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            recipients: config.recipients.clone(),
        })
    }

    /// Send a report email with CSV attachments to every recipient.
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be built or delivery fails.
    pub async fn send_report(
        &self,
        subject: &str,
        text_body: &str,
        html_body: &str,
        attachments: &[CsvArtifact],
    ) -> Result<(), EmailError> {
        let mut builder = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .subject(subject);
        for recipient in &self.recipients {
            builder = builder.to(recipient
                .parse()
                .map_err(|_| EmailError::InvalidAddress(recipient.clone()))?);
        }

        let mut multipart = MultiPart::mixed().multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(text_body.to_string()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(html_body.to_string()),
                ),
        );
        let csv_type = ContentType::parse("text/csv")?;
        for artifact in attachments {
            multipart = multipart.singlepart(
                Attachment::new(artifact.filename.clone())
                    .body(artifact.content.clone(), csv_type.clone()),
            );
        }

        let email = builder.multipart(multipart)?;
        self.mailer.send(email).await?;

        info!(
            subject = %subject,
            recipients = self.recipients.len(),
            attachments = attachments.len(),
            "report email sent"
        );
        Ok(())
    }
}
