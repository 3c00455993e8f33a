pub mod auth_service;
pub mod color_tile_service;
pub mod contact_service;
pub mod dashboard_service;
pub mod hero_image_service;
pub mod order_service;
pub mod product_service;
pub mod subscriber_service;
pub mod verification_service;
