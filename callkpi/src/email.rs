//! Email service for delivering KPI reports.

use lettre::{
    Address, AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment, Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::path::Path;

use crate::{
    config::{Config, EmailTransportConfig},
    errors::Error,
};

/// A rendered report, attached to the email as an HTML file
#[derive(Debug, Clone)]
pub struct ReportAttachment {
    pub filename: String,
    pub content: String,
}

/// One report delivery
#[derive(Debug, Clone)]
pub struct ReportEmail<'a> {
    pub to_email: &'a str,
    pub to_name: Option<&'a str>,
    /// Overrides the configured sender address
    pub from_email: Option<&'a str>,
    pub subject: &'a str,
    pub html_body: &'a str,
    pub attachment: &'a ReportAttachment,
}

pub struct EmailService {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
    reply_to: Option<String>,
    subject_prefix: String,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            EmailTransportConfig::File { path } => {
                // Use file transport for development/testing
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Io {
                        path: path.clone(),
                        source: e,
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        Ok(Self {
            transport,
            from_email: email_config.from_email.clone(),
            from_name: email_config.from_name.clone(),
            reply_to: email_config.reply_to.clone(),
            subject_prefix: email_config.subject_prefix.clone(),
        })
    }

    /// Sender display name, used to sign the cover body
    pub fn from_name(&self) -> &str {
        &self.from_name
    }

    /// `📊 Rapport KPI - {tenant} - {period}`
    pub fn subject(&self, tenant: &str, period: &str) -> String {
        format!("{} - {tenant} - {period}", self.subject_prefix)
    }

    /// Check that the mail transport is reachable. Always true for the file transport.
    pub async fn test_connection(&self) -> Result<bool, Error> {
        match &self.transport {
            EmailTransport::Smtp(smtp) => smtp.test_connection().await.map_err(|e| Error::Delivery {
                recipient: "SMTP server".to_string(),
                message: e.to_string(),
            }),
            EmailTransport::File(_) => Ok(true),
        }
    }

    /// Send a report: the HTML cover body followed by the report as an attachment.
    #[tracing::instrument(skip_all, fields(to = %email.to_email, attachment = %email.attachment.filename), err)]
    pub async fn send_report(&self, email: &ReportEmail<'_>) -> Result<(), Error> {
        let delivery_error = |message: String| Error::Delivery {
            recipient: email.to_email.to_string(),
            message,
        };

        let from_email = email.from_email.unwrap_or(&self.from_email);
        let from = from_email
            .parse::<Address>()
            .map(|address| Mailbox::new(Some(self.from_name.clone()), address))
            .map_err(|e| delivery_error(format!("invalid sender address: {e}")))?;

        let to = email
            .to_email
            .parse::<Address>()
            .map(|address| Mailbox::new(email.to_name.map(str::to_string), address))
            .map_err(|e| delivery_error(format!("invalid recipient address: {e}")))?;

        let mut builder = Message::builder().from(from).to(to).subject(email.subject);
        if let Some(reply_to) = &self.reply_to {
            let reply_to = reply_to
                .parse::<Mailbox>()
                .map_err(|e| delivery_error(format!("invalid reply-to address: {e}")))?;
            builder = builder.reply_to(reply_to);
        }

        let attachment = Attachment::new(email.attachment.filename.clone())
            .body(email.attachment.content.clone(), ContentType::TEXT_HTML);

        let message = builder
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::html(email.html_body.to_string()))
                    .singlepart(attachment),
            )
            .map_err(|e| delivery_error(format!("build email message: {e}")))?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| delivery_error(e.to_string()))?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| delivery_error(e.to_string()))?;
            }
        }

        Ok(())
    }
}
