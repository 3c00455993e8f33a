use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::ValidationError;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if self.email.trim().is_empty() {
            return Err(ValidationError::MissingField("email"));
        }
        if !self.email.contains('@') {
            return Err(ValidationError::Invalid("email is not valid".into()));
        }
        if self.message.trim().is_empty() {
            return Err(ValidationError::MissingField("message"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_fields_are_required() {
        let req = ContactRequest {
            name: "Zara".into(),
            email: "zara@example.com".into(),
            message: " ".into(),
        };
        assert_eq!(req.validate(), Err(ValidationError::MissingField("message")));
    }

    #[test]
    fn email_needs_an_at_sign() {
        let req = ContactRequest {
            name: "Zara".into(),
            email: "zara.example.com".into(),
            message: "Hi".into(),
        };
        assert!(matches!(req.validate(), Err(ValidationError::Invalid(_))));
    }
}
