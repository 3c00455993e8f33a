use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::{ImageStorage, StorageError, UploadedImage};

const PROVIDER: &str = "imagekit";
const UPLOAD_URL: &str = "https://upload.imagekit.io/api/v1/files/upload";
const FILES_URL: &str = "https://api.imagekit.io/v1/files";

pub struct ImageKitStorage {
    client: reqwest::Client,
    private_key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    file_id: String,
    url: String,
    width: Option<u32>,
    height: Option<u32>,
}

impl ImageKitStorage {
    pub fn new(private_key: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            private_key,
        })
    }

    async fn failure(response: reqwest::Response) -> StorageError {
        let status = response.status().as_u16();
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        StorageError::from_status(PROVIDER, status, body["message"].as_str().unwrap_or_default())
    }
}

#[async_trait]
impl ImageStorage for ImageKitStorage {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        folder: &str,
    ) -> Result<UploadedImage, StorageError> {
        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name.to_string()))
            .text("fileName", file_name.to_string())
            .text("folder", folder.to_string())
            .text("useUniqueFileName", "true");

        let response = self
            .client
            .post(UPLOAD_URL)
            .basic_auth(&self.private_key, Some(""))
            .multipart(form)
            .send()
            .await
            .map_err(|err| StorageError::from_request(PROVIDER, err))?;
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }
        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|err| StorageError::new(PROVIDER, err.to_string()))?;

        Ok(UploadedImage {
            url: uploaded.url,
            storage_id: uploaded.file_id,
            width: uploaded.width,
            height: uploaded.height,
        })
    }

    async fn delete(&self, storage_id: &str) -> Result<(), StorageError> {
        let response = self
            .client
            .delete(format!("{FILES_URL}/{storage_id}"))
            .basic_auth(&self.private_key, Some(""))
            .send()
            .await
            .map_err(|err| StorageError::from_request(PROVIDER, err))?;
        if response.status().is_success() || response.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(Self::failure(response).await)
        }
    }
}
