use std::collections::HashMap;

use axum::extract::Multipart;

use crate::{error::AppError, notifications::Attachment};

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_BULK_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const MAX_BULK_IMAGES: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_file_bytes: usize,
    pub max_files: usize,
}

impl UploadLimits {
    pub const SINGLE: UploadLimits = UploadLimits {
        max_file_bytes: MAX_IMAGE_BYTES,
        max_files: 1,
    };

    pub const BULK: UploadLimits = UploadLimits {
        max_file_bytes: MAX_BULK_IMAGE_BYTES,
        max_files: MAX_BULK_IMAGES,
    };
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn into_attachment(self, index: usize) -> Attachment {
        let name = if self.file_name.is_empty() {
            format!("image_{}.jpg", index + 1)
        } else {
            self.file_name
        };
        Attachment {
            name,
            content_type: self.content_type,
            content: self.bytes,
        }
    }
}

/// Text fields and image parts of a multipart form.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub images: Vec<ImageUpload>,
}

impl UploadForm {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, name: &'static str) -> Result<&str, AppError> {
        self.text(name)
            .ok_or(AppError::Validation(crate::error::ValidationError::MissingField(name)))
    }

    pub fn single_image(mut self) -> Result<(HashMap<String, String>, ImageUpload), AppError> {
        let image = self
            .images
            .pop()
            .ok_or_else(|| AppError::BadRequest("An image file is required".into()))?;
        Ok((self.fields, image))
    }
}

pub fn check_image(content_type: &str, size: usize, count: usize, limits: UploadLimits) -> Result<(), AppError> {
    if !content_type.starts_with("image/") {
        return Err(AppError::BadRequest("Only image files are allowed.".into()));
    }
    if size > limits.max_file_bytes {
        return Err(AppError::BadRequest(format!(
            "File too large. Maximum file size is {}MB.",
            limits.max_file_bytes / (1024 * 1024)
        )));
    }
    if count > limits.max_files {
        return Err(AppError::BadRequest(format!(
            "Too many files. Maximum {} files allowed.",
            limits.max_files
        )));
    }
    Ok(())
}

pub async fn read_form(mut multipart: Multipart, limits: UploadLimits) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(err.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::BadRequest(err.body_text()))?;
                check_image(&content_type, bytes.len(), form.images.len() + 1, limits)?;
                form.images.push(ImageUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| AppError::BadRequest(err.body_text()))?;
                form.fields.insert(name, value);
            }
        }
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_images_pass() {
        assert!(check_image("image/png", 10, 1, UploadLimits::SINGLE).is_ok());
        assert!(check_image("application/pdf", 10, 1, UploadLimits::SINGLE).is_err());
    }

    #[test]
    fn bulk_limits_size_and_count() {
        assert!(check_image("image/jpeg", MAX_BULK_IMAGE_BYTES + 1, 1, UploadLimits::BULK).is_err());
        assert!(check_image("image/jpeg", 1, MAX_BULK_IMAGES, UploadLimits::BULK).is_ok());
        assert!(check_image("image/jpeg", 1, MAX_BULK_IMAGES + 1, UploadLimits::BULK).is_err());
    }

    #[test]
    fn unnamed_images_get_numbered_names() {
        let upload = ImageUpload {
            file_name: String::new(),
            content_type: "image/jpeg".into(),
            bytes: vec![1],
        };
        assert_eq!(upload.into_attachment(1).name, "image_2.jpg");
    }

    #[test]
    fn blank_fields_count_as_missing() {
        let mut form = UploadForm::default();
        form.fields.insert("colorName".into(), "  ".into());
        assert!(form.text("colorName").is_none());
        assert!(form.require("colorName").is_err());
    }
}
