use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Tile provider for the map image. `MapQuest` is the default but its
/// `otileN.mqcdn.com` servers have been offline since 2016, so an image
/// requested with it ends up as a failed image; pick `Osm` to get one.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MapProvider {
    Osm,
    MapQuest,
}

/// A raster tile source in the spirit of TileJSON: one or more URL templates
/// with `{z}`, `{x}` and `{y}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSource {
    pub name: &'static str,
    pub tiles: &'static [&'static str],
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub attribution: &'static str,
}

impl TileSource {
    /// Spreads requests over the templates (usually subdomains) by tile
    /// position, so neighbouring tiles hit different hosts.
    pub fn tile_url(&self, zoom: u8, x: u32, y: u32) -> String {
        let template = self.tiles[(x as usize + y as usize) % self.tiles.len()];
        template
            .replace("{z}", &zoom.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }
}

lazy_static! {
    static ref TILE_SOURCES: HashMap<MapProvider, TileSource> = {
        let mut sources = HashMap::new();
        sources.insert(
            MapProvider::Osm,
            TileSource {
                name: "OpenStreetMap",
                tiles: &["https://tile.openstreetmap.org/{z}/{x}/{y}.png"],
                min_zoom: 0,
                max_zoom: 19,
                attribution: "© OpenStreetMap contributors",
            },
        );
        sources.insert(
            MapProvider::MapQuest,
            TileSource {
                name: "MapQuest Open",
                tiles: &[
                    "http://otile1.mqcdn.com/tiles/1.0.0/osm/{z}/{x}/{y}.png",
                    "http://otile2.mqcdn.com/tiles/1.0.0/osm/{z}/{x}/{y}.png",
                    "http://otile3.mqcdn.com/tiles/1.0.0/osm/{z}/{x}/{y}.png",
                    "http://otile4.mqcdn.com/tiles/1.0.0/osm/{z}/{x}/{y}.png",
                ],
                min_zoom: 0,
                max_zoom: 18,
                attribution: "Tiles courtesy of MapQuest, © OpenStreetMap contributors",
            },
        );
        sources
    };
}

impl MapProvider {
    pub fn tile_source(&self) -> &'static TileSource {
        // every variant is registered above
        &TILE_SOURCES[self]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn every_provider_has_a_tile_source() {
        for provider in MapProvider::iter() {
            assert!(!provider.tile_source().tiles.is_empty());
        }
    }

    #[test]
    fn provider_names() {
        assert_eq!(MapProvider::from_str("osm").unwrap(), MapProvider::Osm);
        assert_eq!(
            MapProvider::from_str("MapQuest").unwrap(),
            MapProvider::MapQuest
        );
        assert_eq!(MapProvider::MapQuest.to_string(), "mapquest");
        assert!(MapProvider::from_str("google").is_err());
    }

    #[test]
    fn tile_url_rotates_subdomains() {
        let source = MapProvider::MapQuest.tile_source();
        assert_eq!(
            source.tile_url(14, 8414, 5384),
            "http://otile3.mqcdn.com/tiles/1.0.0/osm/14/8414/5384.png"
        );
        assert_eq!(
            MapProvider::Osm.tile_source().tile_url(3, 4, 2),
            "https://tile.openstreetmap.org/3/4/2.png"
        );
    }
}
