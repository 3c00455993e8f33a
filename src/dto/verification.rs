use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::StudentVerification;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveVerificationRequest {
    pub approved: bool,
    pub note: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerificationList {
    pub items: Vec<StudentVerification>,
}
