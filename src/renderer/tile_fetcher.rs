use std::time::Duration;

use anyhow::{Context, Result};
use ureq::Agent;

use crate::map_provider::TileSource;

const USER_AGENT: &str = concat!("storyline_export/", env!("CARGO_PKG_VERSION"));

pub trait TileFetcher: Send + Sync {
    /// Encoded (PNG/JPEG) bytes of one raster tile.
    fn fetch_tile(&self, zoom: u8, x: u32, y: u32) -> Result<Vec<u8>>;
}

pub struct HttpTileFetcher {
    agent: Agent,
    source: &'static TileSource,
}

impl HttpTileFetcher {
    /// `timeout` bounds each request as a whole, including reading the body.
    pub fn new(source: &'static TileSource, timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .user_agent(USER_AGENT)
            .build();
        HttpTileFetcher {
            agent: Agent::new_with_config(config),
            source,
        }
    }
}

impl TileFetcher for HttpTileFetcher {
    fn fetch_tile(&self, zoom: u8, x: u32, y: u32) -> Result<Vec<u8>> {
        let url = self.source.tile_url(zoom, x, y);
        debug!("fetching tile {url}");
        // non-2xx statuses come back as errors
        let mut response = self
            .agent
            .get(&url)
            .call()
            .with_context(|| format!("requesting {url}"))?;
        let data = response
            .body_mut()
            .read_to_vec()
            .with_context(|| format!("reading {url}"))?;
        Ok(data)
    }
}

impl<T: TileFetcher + ?Sized> TileFetcher for &T {
    fn fetch_tile(&self, zoom: u8, x: u32, y: u32) -> Result<Vec<u8>> {
        (**self).fetch_tile(zoom, x, y)
    }
}
