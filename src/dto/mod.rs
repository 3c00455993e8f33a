pub mod auth;
pub mod contact;
pub mod dashboard;
pub mod content;
pub mod orders;
pub mod products;
pub mod subscribers;
pub mod verification;
