//! Keep an offline copy of OpenStreetMap tiles for a region.
//!
//! A bounding box and a set of zoom levels are expanded into the covering
//! slippy-map tiles, and every tile not yet in the on-disk cache is fetched
//! from a tile server, one request at a time with a pause in between. The
//! cache is laid out as `<root>/<z>/<x>/<y>.png`, so it can be served as-is
//! or picked up by later runs.
//!
//! Running a fill twice is cheap: cached tiles are never requested again, and
//! tiles that failed in an earlier run are simply attempted once more.
//!
//! **Use with care.** Public tile servers have usage policies; keep the
//! request delay reasonable and identify your client.
//!
//! # CLI Example
//!
//! ```bash
//! osm-tile-cache fill \
//!   --lat-min 30.75 --lat-max 30.85 \
//!   --lng-min 30.55 --lng-max 31.05 \
//!   --min-zoom 15 --max-zoom 19 \
//!   --output map-data/tiles
//! ```
//!
//! # Library Example
//! ```rust
//! use osm_tile_cache::{BoundingBox, CacheFill, TileCache, TileSource, FetchError, Tile, Pacing};
//! use std::time::Duration;
//!
//! struct Blank;
//!
//! #[async_trait::async_trait]
//! impl TileSource for Blank {
//!     async fn fetch(&self, _tile: Tile) -> Result<bytes::Bytes, FetchError> {
//!         Ok(bytes::Bytes::from_static(b"\x89PNG"))
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! # let dir = tempfile::tempdir().unwrap();
//! let bbox = BoundingBox::new(30.75, 30.85, 30.55, 31.05).unwrap();
//! let fill = CacheFill::new(Blank, TileCache::new(dir.path()))
//!     .with_pacing(Pacing::fixed(Duration::ZERO));
//!
//! let summary = fill.fill(&bbox, 10..=12).await.unwrap();
//! assert_eq!(summary.failed(), 0);
//! # }
//! ```

mod bounding_box;
mod cache;
mod config;
mod error;
mod fill;
mod source;
mod tile;
mod url;

pub use bounding_box::{BoundingBox, TileRange};
pub use cache::{TileCache, TileStatus};
pub use config::{Config, Pacing, Region};
pub use error::{DomainError, FetchError, FillError, StorageError};
pub use fill::{fill, CacheFill, FillSummary, TileFailure};
pub use source::{default_user_agent, HttpSource, TileSource};
pub use tile::{grid_size, Tile, MAX_LATITUDE, MAX_ZOOM};
pub use url::{UrlFormat, UrlFormatError, DEFAULT_BASE_URL};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_rejects_unprojectable_latitude() {
        assert!(BoundingBox::new(-89.0, 0.0, 0.0, 1.0).is_err());
    }

    #[test]
    fn bbox_rejects_out_of_range_longitude() {
        assert!(BoundingBox::new(0.0, 1.0, -190.0, 1.0).is_err());
    }

    #[test]
    fn tile_index() {
        let tile = Tile::from_coords_and_zoom(50.7929, 6.0402, 18).unwrap();
        assert_eq!((tile.x, tile.y), (135470, 87999));
    }
}
