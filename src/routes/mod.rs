use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod content;
pub mod dashboard;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;
pub mod subscribers;
pub mod upload;
pub mod verification;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/products", products::router())
        .nest("/users", auth::router())
        .nest("/orders", orders::router())
        .nest("/student-verification", verification::router())
        .nest("/hero-images", content::hero_router())
        .nest("/color-tiles", content::color_tile_router())
        .nest("/subscribers", subscribers::router())
        .nest("/contact", subscribers::contact_router())
        .nest("/dashboard", dashboard::router())
}
