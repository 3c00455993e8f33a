use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use utoipa::ToSchema;

use super::{
    templates::{self, Rendered, VerificationNotice},
    transport::{Attachment, DeliveryId, Mailbox, NotificationTransport, OutboundEmail, TransportError},
};
use crate::{config::MailConfig, domain::{Order, otp::OtpKind}};

/// Sender and recipient addresses used by the dispatcher.
#[derive(Debug, Clone)]
pub struct MailIdentity {
    pub sender: Mailbox,
    pub orders_sender: Mailbox,
    pub admin: Mailbox,
}

impl From<&MailConfig> for MailIdentity {
    fn from(config: &MailConfig) -> Self {
        Self {
            sender: Mailbox::named(&config.sender_email, &config.sender_name),
            orders_sender: Mailbox::named(&config.sender_email, &config.orders_sender_name),
            admin: Mailbox::named(&config.admin_email, "Admin"),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailure {
    pub email: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkSendReport {
    pub success_count: usize,
    pub failures: Vec<BulkFailure>,
}

/// Turns business events into emails.
///
/// Order and verification events are best effort: a failed send is logged
/// and the caller never sees it. OTP, contact, welcome and bulk sends return
/// the transport error so the request can report it.
#[derive(Clone)]
pub struct NotificationDispatcher {
    transport: Arc<dyn NotificationTransport>,
    identity: MailIdentity,
    welcome_image: Option<Arc<Attachment>>,
}

impl NotificationDispatcher {
    pub fn new(transport: Arc<dyn NotificationTransport>, identity: MailIdentity) -> Self {
        Self {
            transport,
            identity,
            welcome_image: None,
        }
    }

    pub fn with_welcome_image(mut self, image: Attachment) -> Self {
        self.welcome_image = Some(Arc::new(image));
        self
    }

    fn compose(&self, sender: &Mailbox, to: Mailbox, rendered: Rendered) -> OutboundEmail {
        OutboundEmail {
            sender: sender.clone(),
            to: vec![to],
            subject: rendered.subject,
            html: rendered.html,
            attachments: Vec::new(),
        }
    }

    async fn deliver(&self, email: OutboundEmail) -> Result<DeliveryId, TransportError> {
        self.transport.send(email).await
    }

    async fn deliver_quietly(&self, event: &'static str, email: OutboundEmail) {
        let to = email.first_recipient().to_string();
        match self.deliver(email).await {
            Ok(id) => tracing::info!(event, to = %to, message_id = %id.0, "notification sent"),
            Err(err) => tracing::error!(event, to = %to, error = %err, "notification failed"),
        }
    }

    /// Admin alert and customer confirmation for a freshly placed order.
    pub async fn order_created(&self, order: &Order) {
        let admin = self.compose(
            &self.identity.orders_sender,
            self.identity.admin.clone(),
            templates::new_order_admin(order),
        );
        self.deliver_quietly("order_created_admin", admin).await;

        let customer = self.compose(
            &self.identity.sender,
            Mailbox::new(&order.customer_email),
            templates::order_confirmation(order),
        );
        self.deliver_quietly("order_created_customer", customer).await;
    }

    pub async fn order_status_changed(&self, order: &Order) {
        let email = self.compose(
            &self.identity.sender,
            Mailbox::new(&order.customer_email),
            templates::status_update(order),
        );
        self.deliver_quietly("order_status_changed", email).await;
    }

    pub async fn verification_submitted(&self, notice: &VerificationNotice<'_>) {
        let email = self.compose(
            &self.identity.sender,
            self.identity.admin.clone(),
            templates::verification_request(notice),
        );
        self.deliver_quietly("verification_submitted", email).await;
    }

    pub async fn verification_resolved(
        &self,
        notice: &VerificationNotice<'_>,
        approved: bool,
        note: Option<&str>,
    ) {
        let email = self.compose(
            &self.identity.sender,
            Mailbox::new(notice.student_email),
            templates::verification_result(notice, approved, note),
        );
        self.deliver_quietly("verification_resolved", email).await;
    }

    pub async fn send_otp(
        &self,
        to: &str,
        code: &str,
        kind: OtpKind,
        ttl_minutes: i64,
    ) -> Result<DeliveryId, TransportError> {
        let email = self.compose(
            &self.identity.sender,
            Mailbox::new(to),
            templates::otp(code, kind, ttl_minutes),
        );
        let id = self.deliver(email).await?;
        tracing::info!(to, ?kind, "otp sent");
        Ok(id)
    }

    /// Forwards the message to the admin, then acknowledges the sender.
    pub async fn contact_form(&self, name: &str, email: &str, message: &str) -> Result<(), TransportError> {
        let admin = self.compose(
            &self.identity.sender,
            self.identity.admin.clone(),
            templates::contact_admin(name, email, message),
        );
        self.deliver(admin).await?;

        let reply = self.compose(
            &self.identity.sender,
            Mailbox::named(email, name),
            templates::contact_reply(name, message),
        );
        self.deliver(reply).await?;
        tracing::info!(from = email, "contact form processed");
        Ok(())
    }

    pub async fn welcome(&self, to: &str) -> Result<DeliveryId, TransportError> {
        let image = self.welcome_image.as_deref();
        let mut email = self.compose(&self.identity.sender, Mailbox::new(to), templates::welcome(image));
        if let Some(image) = image {
            email.attachments.push(image.clone());
        }
        self.deliver(email).await
    }

    /// Sends one message per recipient concurrently. Each failure is
    /// isolated and reported; successful sends are not undone.
    pub async fn bulk(
        &self,
        recipients: &[String],
        subject: &str,
        message: &str,
        images: &[Attachment],
    ) -> BulkSendReport {
        let rendered = templates::bulk(subject, message, images);
        let sends = recipients.iter().map(|to| {
            let mut email = self.compose(&self.identity.sender, Mailbox::new(to), rendered.clone());
            email.attachments = images.to_vec();
            async move { (to, self.deliver(email).await) }
        });

        let mut report = BulkSendReport::default();
        for (to, result) in join_all(sends).await {
            match result {
                Ok(_) => report.success_count += 1,
                Err(err) => {
                    tracing::warn!(to = %to, error = %err, "bulk email failed");
                    report.failures.push(BulkFailure {
                        email: to.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
        tracing::info!(
            recipients = recipients.len(),
            images = images.len(),
            sent = report.success_count,
            failed = report.failures.len(),
            "bulk email finished"
        );
        report
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::{OrderStatus, TransitionMetadata, TransitionPolicy, order::tests::sample_order};

    /// Records every email; fails sends addressed to `fail_for`.
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub sent: Mutex<Vec<OutboundEmail>>,
        pub fail_for: Vec<String>,
    }

    impl RecordingTransport {
        pub fn sent(&self) -> Vec<OutboundEmail> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationTransport for RecordingTransport {
        async fn send(&self, email: OutboundEmail) -> Result<DeliveryId, TransportError> {
            if self.fail_for.iter().any(|f| f == email.first_recipient()) {
                return Err(TransportError::new("test", "mailbox unavailable").with_code("550"));
            }
            let mut sent = self.sent.lock().unwrap();
            sent.push(email);
            Ok(DeliveryId(format!("msg-{}", sent.len())))
        }
    }

    pub(crate) fn identity() -> MailIdentity {
        MailIdentity {
            sender: Mailbox::named("stethhelp@gmail.com", "Steth"),
            orders_sender: Mailbox::named("stethhelp@gmail.com", "Steth Orders"),
            admin: Mailbox::named("admin@steth.test", "Admin"),
        }
    }

    fn dispatcher(transport: Arc<RecordingTransport>) -> NotificationDispatcher {
        NotificationDispatcher::new(transport, identity())
    }

    #[tokio::test]
    async fn order_created_notifies_admin_and_customer() {
        let transport = Arc::new(RecordingTransport::default());
        let order = sample_order();
        dispatcher(transport.clone()).order_created(&order).await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].first_recipient(), "admin@steth.test");
        assert_eq!(sent[0].sender.name.as_deref(), Some("Steth Orders"));
        assert_eq!(sent[1].first_recipient(), "ayesha@example.com");
    }

    #[tokio::test]
    async fn status_notification_failure_is_swallowed() {
        let transport = Arc::new(RecordingTransport {
            fail_for: vec!["ayesha@example.com".into()],
            ..Default::default()
        });
        let order = sample_order();
        // returns unit; nothing to propagate
        dispatcher(transport.clone()).order_status_changed(&order).await;
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn repeating_a_transition_sends_again() {
        let transport = Arc::new(RecordingTransport::default());
        let notifier = dispatcher(transport.clone());
        let mut order = sample_order();

        for _ in 0..2 {
            order
                .transition(
                    OrderStatus::Confirmed,
                    &TransitionMetadata::default(),
                    TransitionPolicy::Strict,
                    chrono::Utc::now(),
                )
                .unwrap();
            notifier.order_status_changed(&order).await;
        }

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].subject, sent[1].subject);
    }

    #[tokio::test]
    async fn otp_failure_propagates() {
        let transport = Arc::new(RecordingTransport {
            fail_for: vec!["new@example.com".into()],
            ..Default::default()
        });
        let err = dispatcher(transport)
            .send_otp("new@example.com", "123456", OtpKind::Initial, 2)
            .await
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("550"));
    }

    #[tokio::test]
    async fn contact_form_stops_after_admin_failure() {
        let transport = Arc::new(RecordingTransport {
            fail_for: vec!["admin@steth.test".into()],
            ..Default::default()
        });
        let result = dispatcher(transport.clone())
            .contact_form("Sara", "sara@example.com", "Do you ship to Karachi?")
            .await;
        assert!(result.is_err());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn contact_form_sends_admin_then_reply() {
        let transport = Arc::new(RecordingTransport::default());
        dispatcher(transport.clone())
            .contact_form("Sara", "sara@example.com", "Hello")
            .await
            .unwrap();
        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].first_recipient(), "admin@steth.test");
        assert_eq!(sent[1].to[0].name.as_deref(), Some("Sara"));
    }

    #[tokio::test]
    async fn welcome_attaches_configured_image() {
        let transport = Arc::new(RecordingTransport::default());
        let image = Attachment {
            name: "welcome.jpeg".into(),
            content_type: "image/jpeg".into(),
            content: vec![0xff, 0xd8],
        };
        dispatcher(transport.clone())
            .with_welcome_image(image.clone())
            .welcome("reader@example.com")
            .await
            .unwrap();
        assert_eq!(transport.sent()[0].attachments, vec![image]);
    }
}
