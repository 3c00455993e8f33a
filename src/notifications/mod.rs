pub mod brevo;
pub mod dispatcher;
pub mod templates;
pub mod transport;

use std::{path::Path, sync::Arc};

use anyhow::Context;

pub use brevo::BrevoTransport;
pub use dispatcher::{BulkFailure, BulkSendReport, MailIdentity, NotificationDispatcher};
pub use transport::{Attachment, DeliveryId, LogTransport, Mailbox, NotificationTransport, OutboundEmail, TransportError};

use crate::config::{MailConfig, MailTransportKind};

/// Builds the transport named in the configuration.
pub fn build_transport(config: &MailConfig) -> anyhow::Result<Arc<dyn NotificationTransport>> {
    let transport: Arc<dyn NotificationTransport> = match config.transport {
        MailTransportKind::Brevo => {
            let key = config
                .brevo_api_key
                .as_deref()
                .context("BREVO_API_KEY is not set")?;
            Arc::new(BrevoTransport::new(key, config.timeout)?)
        }
        MailTransportKind::Log => Arc::new(LogTransport),
    };
    tracing::info!(transport = ?config.transport, "mail transport ready");
    Ok(transport)
}

/// Builds the dispatcher, attaching the welcome banner when the file exists.
pub async fn build_dispatcher(config: &MailConfig) -> anyhow::Result<NotificationDispatcher> {
    let transport = build_transport(config)?;
    let dispatcher = NotificationDispatcher::new(transport, MailIdentity::from(config));
    match load_welcome_image(&config.welcome_image_path).await {
        Some(image) => Ok(dispatcher.with_welcome_image(image)),
        None => Ok(dispatcher),
    }
}

async fn load_welcome_image(path: &Path) -> Option<Attachment> {
    match tokio::fs::read(path).await {
        Ok(content) => Some(Attachment {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "welcome.jpeg".to_string()),
            content_type: "image/jpeg".to_string(),
            content,
        }),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "welcome image not loaded");
            None
        }
    }
}
