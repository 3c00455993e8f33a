#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use steth_store_api::notifications::{
    DeliveryId, Mailbox, MailIdentity, NotificationTransport, OutboundEmail, TransportError,
};

/// Keeps every outgoing email; sends to an address in `fail_for` fail.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<OutboundEmail>>,
    pub fail_for: Vec<String>,
}

impl RecordingTransport {
    pub fn failing_for(addresses: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_for: addresses.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn sent_to(&self, address: &str) -> Vec<OutboundEmail> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.first_recipient() == address)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    async fn send(&self, email: OutboundEmail) -> Result<DeliveryId, TransportError> {
        if self.fail_for.iter().any(|a| a == email.first_recipient()) {
            return Err(TransportError::new("recording", "mailbox unavailable").with_code("550"));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(email);
        Ok(DeliveryId(format!("msg-{}", sent.len())))
    }
}

pub fn identity() -> MailIdentity {
    MailIdentity {
        sender: Mailbox::named("hello@steth.test", "Steth"),
        orders_sender: Mailbox::named("hello@steth.test", "Steth Orders"),
        admin: Mailbox::named("admin@steth.test", "Admin"),
    }
}

/// Image storage that keeps nothing and hands out predictable ids.
#[derive(Default)]
pub struct NullStorage {
    pub deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl steth_store_api::storage::ImageStorage for NullStorage {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        folder: &str,
    ) -> Result<steth_store_api::storage::UploadedImage, steth_store_api::storage::StorageError> {
        Ok(steth_store_api::storage::UploadedImage {
            url: format!("https://cdn.test/{folder}/{file_name}"),
            storage_id: format!("{folder}/{file_name}"),
            width: None,
            height: Some(bytes.len() as u32),
        })
    }

    async fn delete(&self, storage_id: &str) -> Result<(), steth_store_api::storage::StorageError> {
        self.deleted.lock().unwrap().push(storage_id.to_string());
        Ok(())
    }
}
