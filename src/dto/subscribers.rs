use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Subscriber;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubscribeRequest {
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriberList {
    pub items: Vec<Subscriber>,
}
