use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use super::transport::{DeliveryId, Mailbox, NotificationTransport, OutboundEmail, TransportError};

const BREVO_API_URL: &str = "https://api.brevo.com/v3/smtp/email";
const PROVIDER: &str = "brevo";

/// Transactional email over the Brevo HTTP API.
pub struct BrevoTransport {
    client: reqwest::Client,
    api_key: String,
}

#[derive(Serialize)]
struct BrevoContact<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
struct BrevoAttachment<'a> {
    name: &'a str,
    content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoEmail<'a> {
    sender: BrevoContact<'a>,
    to: Vec<BrevoContact<'a>>,
    subject: &'a str,
    html_content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachment: Vec<BrevoAttachment<'a>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrevoAccepted {
    message_id: Option<String>,
}

#[derive(Deserialize)]
struct BrevoFailure {
    code: Option<String>,
    message: Option<String>,
}

fn contact(mailbox: &Mailbox) -> BrevoContact<'_> {
    BrevoContact {
        email: &mailbox.email,
        name: mailbox.name.as_deref(),
    }
}

fn payload(email: &OutboundEmail) -> BrevoEmail<'_> {
    BrevoEmail {
        sender: contact(&email.sender),
        to: email.to.iter().map(contact).collect(),
        subject: &email.subject,
        html_content: &email.html,
        attachment: email
            .attachments
            .iter()
            .map(|a| BrevoAttachment {
                name: &a.name,
                content: STANDARD.encode(&a.content),
            })
            .collect(),
    }
}

impl BrevoTransport {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl NotificationTransport for BrevoTransport {
    async fn send(&self, email: OutboundEmail) -> Result<DeliveryId, TransportError> {
        let body = payload(&email);

        tracing::debug!(to = %email.first_recipient(), subject = %email.subject, "sending email via brevo");

        let response = self
            .client
            .post(BREVO_API_URL)
            .header("api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                let code = if err.is_timeout() { "ETIMEDOUT" } else { "ECONNECTION" };
                TransportError::new(PROVIDER, err.to_string()).with_code(code)
            })?;

        let status = response.status();
        if !status.is_success() {
            let failure = response.json::<BrevoFailure>().await.ok();
            let (code, message) = match failure {
                Some(f) => (f.code, f.message),
                None => (None, None),
            };
            return Err(TransportError {
                provider: PROVIDER,
                code: code.or_else(|| Some(status.as_u16().to_string())),
                message: message.unwrap_or_else(|| status.to_string()),
            });
        }

        let accepted = response
            .json::<BrevoAccepted>()
            .await
            .map_err(|err| TransportError::new(PROVIDER, err.to_string()))?;
        let id = accepted.message_id.unwrap_or_default();
        tracing::info!(message_id = %id, to = %email.first_recipient(), "email sent via brevo");
        Ok(DeliveryId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::transport::Attachment;

    #[test]
    fn payload_matches_brevo_shape() {
        let email = OutboundEmail {
            sender: Mailbox::named("stethhelp@gmail.com", "Steth"),
            to: vec![Mailbox::new("student@example.com")],
            subject: "Your OTP Code".into(),
            html: "<p>123456</p>".into(),
            attachments: vec![Attachment {
                name: "welcome.jpeg".into(),
                content_type: "image/jpeg".into(),
                content: b"abc".to_vec(),
            }],
        };
        let body = payload(&email);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["sender"]["name"], "Steth");
        assert_eq!(json["to"][0]["email"], "student@example.com");
        assert!(json["to"][0].get("name").is_none());
        assert_eq!(json["htmlContent"], "<p>123456</p>");
        assert_eq!(json["attachment"][0]["content"], "YWJj");
    }
}
