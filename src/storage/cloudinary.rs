use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{ImageStorage, StorageError, UploadedImage};

const PROVIDER: &str = "cloudinary";

pub struct CloudinaryStorage {
    client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}

/// Signature over alphabetically sorted `key=value` pairs followed by the
/// API secret.
fn sign(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    hex::encode(Sha256::digest(format!("{joined}{secret}").as_bytes()))
}

impl CloudinaryStorage {
    pub fn new(
        cloud_name: String,
        api_key: String,
        api_secret: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            cloud_name,
            api_key,
            api_secret,
        })
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/{action}",
            self.cloud_name
        )
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let detail = body["error"]["message"].as_str().unwrap_or_default();
        Err(StorageError::from_status(PROVIDER, status.as_u16(), detail))
    }
}

#[async_trait]
impl ImageStorage for CloudinaryStorage {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        folder: &str,
    ) -> Result<UploadedImage, StorageError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(&[("folder", folder), ("timestamp", &timestamp)], &self.api_secret);

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name.to_string()))
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.to_string())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|err| StorageError::from_request(PROVIDER, err))?;
        let uploaded: UploadResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|err| StorageError::new(PROVIDER, err.to_string()))?;

        Ok(UploadedImage {
            url: uploaded.secure_url,
            storage_id: uploaded.public_id,
            width: uploaded.width,
            height: uploaded.height,
        })
    }

    async fn delete(&self, storage_id: &str) -> Result<(), StorageError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(
            &[("public_id", storage_id), ("timestamp", &timestamp)],
            &self.api_secret,
        );
        let params = [
            ("public_id", storage_id),
            ("timestamp", timestamp.as_str()),
            ("api_key", self.api_key.as_str()),
            ("signature", signature.as_str()),
            ("signature_algorithm", "sha256"),
        ];
        let response = self
            .client
            .post(self.endpoint("destroy"))
            .form(&params)
            .send()
            .await
            .map_err(|err| StorageError::from_request(PROVIDER, err))?;
        let destroyed: DestroyResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|err| StorageError::new(PROVIDER, err.to_string()))?;
        match destroyed.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(StorageError::new(PROVIDER, format!("destroy returned {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_sorts_parameters() {
        let a = sign(&[("timestamp", "1700000000"), ("folder", "hero")], "secret");
        let b = sign(&[("folder", "hero"), ("timestamp", "1700000000")], "secret");
        assert_eq!(a, b);
        let expected = hex::encode(Sha256::digest(b"folder=hero&timestamp=1700000000secret"));
        assert_eq!(a, expected);
        assert_eq!(a.len(), 64);
    }
}
