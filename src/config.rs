use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use crate::bounding_box::{BoundingBox, TileRange};
use crate::error::DomainError;
use crate::source::default_user_agent;
use crate::url::UrlFormat;

/// Which tiles a fill covers.
#[derive(Clone, Debug, PartialEq)]
pub enum Region {
    /// Every tile touching the box, at each of the zoom levels.
    Bounds { bounding_box: BoundingBox, zooms: Vec<u8> },

    /// An explicit rectangle of tile indices.
    Range(TileRange),
}

impl Region {
    pub fn tile_ranges(&self) -> Result<Vec<TileRange>, DomainError> {
        match self {
            Region::Bounds { bounding_box, zooms } => bounding_box.tile_ranges(zooms.iter().copied()),
            Region::Range(range) => Ok(vec![*range]),
        }
    }
}

/// Pause observed after each successful fetch before the next request.
#[derive(Clone, Debug, PartialEq)]
pub struct Pacing {
    pub delay: Duration,

    /// Overrides `delay` for specific zoom levels.
    pub per_zoom: BTreeMap<u8, Duration>,
}

impl Pacing {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            per_zoom: BTreeMap::new(),
        }
    }

    pub fn delay_for(&self, zoom: u8) -> Duration {
        self.per_zoom.get(&zoom).copied().unwrap_or(self.delay)
    }
}

impl Default for Pacing {
    /// 30 ms between requests, doubled from zoom 19 on where grids are densest.
    fn default() -> Self {
        let per_zoom = (19..=crate::tile::MAX_ZOOM)
            .map(|zoom| (zoom, Duration::from_millis(60)))
            .collect();

        Self {
            delay: Duration::from_millis(30),
            per_zoom,
        }
    }
}

/// Cache fill configuration.
#[derive(Debug, PartialEq)]
pub struct Config {
    /// The tiles to make available offline.
    pub region: Region,

    /// The cache root; tiles land in `<output_folder>/<z>/<x>/<y>.png`.
    pub output_folder: PathBuf,

    /// The URL to download individual tiles from.
    pub url: UrlFormat,

    /// Client identifier sent with every request.
    pub user_agent: String,

    /// Timeout for fetching a single tile. Must be non-zero.
    pub timeout: Duration,

    pub pacing: Pacing,

    /// Maximum number of tiles in flight. Request starts stay spaced by the
    /// pacing delay regardless.
    pub concurrency: usize,
}

impl Config {
    /// A sequential fill of `region` from the public OSM tile server.
    pub fn new(region: Region, output_folder: impl Into<PathBuf>) -> Self {
        Self {
            region,
            output_folder: output_folder.into(),
            url: UrlFormat::default(),
            user_agent: default_user_agent(),
            timeout: Duration::from_secs(30),
            pacing: Pacing::default(),
            concurrency: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_zoom_delay_overrides_default() {
        let pacing = Pacing::default();
        assert_eq!(pacing.delay_for(15), Duration::from_millis(30));
        assert_eq!(pacing.delay_for(19), Duration::from_millis(60));

        let mut pacing = Pacing::fixed(Duration::from_millis(40));
        pacing.per_zoom.insert(17, Duration::from_millis(5));
        assert_eq!(pacing.delay_for(17), Duration::from_millis(5));
        assert_eq!(pacing.delay_for(19), Duration::from_millis(40));
    }

    #[test]
    fn region_expands_to_ranges() {
        let range = TileRange::new(19, 306680, 306730, 214970, 215020).unwrap();
        assert_eq!(Region::Range(range).tile_ranges().unwrap(), vec![range]);

        let region = Region::Bounds {
            bounding_box: BoundingBox::new(30.75, 30.85, 30.55, 31.05).unwrap(),
            zooms: vec![15, 16],
        };
        assert_eq!(region.tile_ranges().unwrap().len(), 2);
    }
}
