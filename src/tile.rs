use std::{f64::consts::PI, fmt};

use crate::error::DomainError;

/// Latitude bound of the Web Mercator projection, exclusive.
pub const MAX_LATITUDE: f64 = 85.0511;

/// Highest zoom level accepted.
pub const MAX_ZOOM: u8 = 22;

/// An OSM slippy-map tile with x, y and z-coordinate.
/// ref: https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames
///
/// This is both the cache key and the remote resource identifier.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Tile {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

/// Number of tiles along one axis of the grid at `zoom`.
pub fn grid_size(zoom: u8) -> u32 {
    1u32 << zoom
}

impl Tile {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { z, x, y }
    }

    /// Projects a coordinate given in degrees onto the tile containing it.
    ///
    /// Indices are truncated, not rounded, so ranges computed from a bounding
    /// box line up with the usual `int()` reference computation.
    ///
    /// # Example
    /// ```rust
    /// # use osm_tile_cache::Tile;
    /// let tile = Tile::from_coords_and_zoom(30.775872, 30.597655, 19).unwrap();
    /// assert_eq!(tile.z, 19);
    /// ```
    pub fn from_coords_and_zoom(lat: f64, lng: f64, zoom: u8) -> Result<Self, DomainError> {
        if !(lat.is_finite() && lat.abs() < MAX_LATITUDE) {
            return Err(DomainError::InvalidLatitude(lat));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(DomainError::InvalidLongitude(lng));
        }
        if zoom > MAX_ZOOM {
            return Err(DomainError::InvalidZoom(zoom));
        }

        // scale factor
        let n = f64::from(grid_size(zoom));
        let lat_rad = lat.to_radians();

        let x = (lng + 180_f64) / 360_f64 * n;
        let y = (1_f64 - (lat_rad.tan() + 1_f64 / lat_rad.cos()).ln() / PI) / 2_f64 * n;

        // lng = 180° lands exactly on the right edge of the grid
        let last = grid_size(zoom) - 1;
        Ok(Self::new((x as u32).min(last), (y as u32).min(last), zoom))
    }

    /// The tiles within `radius` steps of this one on both axes, clipped to the
    /// grid, ordered x outer, y inner.
    pub fn neighbourhood(&self, radius: u32) -> impl Iterator<Item = Tile> {
        let last = grid_size(self.z) - 1;
        let z = self.z;
        let xs = self.x.saturating_sub(radius)..=self.x.saturating_add(radius).min(last);
        let ys = self.y.saturating_sub(radius)..=self.y.saturating_add(radius).min(last);

        xs.flat_map(move |x| ys.clone().map(move |y| Tile::new(x, y, z)))
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}
