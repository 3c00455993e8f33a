use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub email: String,
    pub name: Option<String>,
}

impl Mailbox {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    pub fn named(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub sender: Mailbox,
    pub to: Vec<Mailbox>,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<Attachment>,
}

impl OutboundEmail {
    pub fn first_recipient(&self) -> &str {
        self.to.first().map(|m| m.email.as_str()).unwrap_or("-")
    }
}

/// Provider-assigned message id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{provider} delivery failed{}: {message}", code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
pub struct TransportError {
    pub provider: &'static str,
    pub code: Option<String>,
    pub message: String,
}

impl TransportError {
    pub fn new(provider: &'static str, message: impl Into<String>) -> Self {
        Self {
            provider,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Outbound mail channel selected at startup.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> Result<DeliveryId, TransportError>;
}

/// Dry-run transport that only records sends in the log.
#[derive(Debug, Default, Clone)]
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn send(&self, email: OutboundEmail) -> Result<DeliveryId, TransportError> {
        let id = Uuid::new_v4().to_string();
        tracing::info!(
            message_id = %id,
            to = %email.first_recipient(),
            subject = %email.subject,
            attachments = email.attachments.len(),
            "email not sent (log transport)"
        );
        Ok(DeliveryId(id))
    }
}
