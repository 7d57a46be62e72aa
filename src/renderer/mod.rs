use anyhow::Result;
use geojson::FeatureCollection;

pub mod static_map;
pub use static_map::StaticMapRenderer;

pub mod tile_fetcher;
pub use tile_fetcher::{HttpTileFetcher, TileFetcher};

pub mod utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub width: u32,
    pub height: u32,
    pub zoom: u8,
    // map center
    pub lat: f64,
    pub lng: f64,
    pub format: ImageFormat,
    /// Drawn on top of the base map.
    pub geojson: &'a FeatureCollection,
}

/// Anything that turns a map view plus a GeoJSON overlay into image bytes.
pub trait MapImageRenderer: Send + Sync {
    fn render(&self, request: &RenderRequest) -> Result<Vec<u8>>;
}
