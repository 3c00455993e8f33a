use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{ColorTile, HeroImage};

#[derive(Debug, Serialize, ToSchema)]
pub struct HeroImageList {
    pub items: Vec<HeroImage>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ColorTileList {
    pub items: Vec<ColorTile>,
}
