use std::{collections::BTreeSet, ops::RangeInclusive};

use crate::error::DomainError;
use crate::tile::{grid_size, Tile, MAX_ZOOM};

/// A geographic bounding box in degrees.
///
/// # Example
/// ```rust
/// # use osm_tile_cache::BoundingBox;
/// let delta_strip = BoundingBox::new(30.75, 30.85, 30.55, 31.05).unwrap();
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
}

impl BoundingBox {
    /// Creates a bounding box, rejecting empty boxes and latitudes the
    /// projection can't handle. Boxes crossing the anti-meridian aren't supported.
    pub fn new(lat_min: f64, lat_max: f64, lng_min: f64, lng_max: f64) -> Result<Self, DomainError> {
        for lat in [lat_min, lat_max] {
            Tile::from_coords_and_zoom(lat, 0.0, 0)?;
        }
        for lng in [lng_min, lng_max] {
            Tile::from_coords_and_zoom(0.0, lng, 0)?;
        }
        if lat_min >= lat_max {
            return Err(DomainError::InvalidBounds {
                axis: "latitude",
                min: lat_min,
                max: lat_max,
            });
        }
        if lng_min >= lng_max {
            return Err(DomainError::InvalidBounds {
                axis: "longitude",
                min: lng_min,
                max: lng_max,
            });
        }

        Ok(BoundingBox {
            lat_min,
            lat_max,
            lng_min,
            lng_max,
        })
    }

    /// The rectangle of tiles covering this box at `zoom`.
    pub fn tile_range(&self, zoom: u8) -> Result<TileRange, DomainError> {
        let north_west = Tile::from_coords_and_zoom(self.lat_max, self.lng_min, zoom)?;
        let south_east = Tile::from_coords_and_zoom(self.lat_min, self.lng_max, zoom)?;

        // y grows southward, so the northern edge gives the smaller index
        Ok(TileRange {
            zoom,
            x_start: north_west.x.min(south_east.x),
            x_end: north_west.x.max(south_east.x),
            y_start: north_west.y.min(south_east.y),
            y_end: north_west.y.max(south_east.y),
        })
    }

    /// One tile range per distinct zoom level, in ascending zoom order.
    pub fn tile_ranges<I>(&self, zooms: I) -> Result<Vec<TileRange>, DomainError>
    where
        I: IntoIterator<Item = u8>,
    {
        zooms
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|zoom| self.tile_range(zoom))
            .collect()
    }

    /// Creates an iterator over all tiles in the bounding box for the given
    /// zoom levels, zoom outer, then x, then y, all ascending.
    pub fn tiles<I>(&self, zooms: I) -> Result<impl Iterator<Item = Tile>, DomainError>
    where
        I: IntoIterator<Item = u8>,
    {
        Ok(self.tile_ranges(zooms)?.into_iter().flat_map(|range| range.iter()))
    }
}

/// A dense, inclusive rectangle of tiles at one zoom level.
///
/// Always non-empty and inside the grid; build one with [`TileRange::new`] or
/// [`BoundingBox::tile_range`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TileRange {
    zoom: u8,
    x_start: u32,
    x_end: u32,
    y_start: u32,
    y_end: u32,
}

impl TileRange {
    /// Creates an explicit range, checking it is non-empty and inside the grid.
    pub fn new(zoom: u8, x_start: u32, x_end: u32, y_start: u32, y_end: u32) -> Result<Self, DomainError> {
        let range = TileRange {
            zoom,
            x_start,
            x_end,
            y_start,
            y_end,
        };
        if zoom > MAX_ZOOM {
            return Err(DomainError::InvalidZoom(zoom));
        }

        let size = grid_size(zoom);
        if x_start > x_end || y_start > y_end || x_end >= size || y_end >= size {
            return Err(DomainError::InvalidRange {
                zoom,
                x_start,
                x_end,
                y_start,
                y_end,
            });
        }

        Ok(range)
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Tile columns covered, inclusive.
    pub fn xs(&self) -> RangeInclusive<u32> {
        self.x_start..=self.x_end
    }

    /// Tile rows covered, inclusive.
    pub fn ys(&self) -> RangeInclusive<u32> {
        self.y_start..=self.y_end
    }

    /// Number of tiles in the range.
    pub fn len(&self) -> u64 {
        u64::from(self.x_end - self.x_start + 1) * u64::from(self.y_end - self.y_start + 1)
    }

    pub fn contains(&self, tile: &Tile) -> bool {
        tile.z == self.zoom
            && (self.x_start..=self.x_end).contains(&tile.x)
            && (self.y_start..=self.y_end).contains(&tile.y)
    }

    /// Iterates the range x outer, y inner, ascending.
    pub fn iter(&self) -> impl Iterator<Item = Tile> {
        let TileRange {
            zoom,
            x_start,
            x_end,
            y_start,
            y_end,
        } = *self;

        (x_start..=x_end).flat_map(move |x| (y_start..=y_end).map(move |y| Tile::new(x, y, zoom)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn delta_strip() -> BoundingBox {
        BoundingBox::new(30.75, 30.85, 30.55, 31.05).unwrap()
    }

    #[test]
    fn north_west_corner_matches_projection() {
        let range = delta_strip().tile_range(15).unwrap();
        let corner = Tile::from_coords_and_zoom(30.85, 30.55, 15).unwrap();

        assert_eq!((range.x_start, range.y_start), (corner.x, corner.y));
        assert_eq!(range.iter().next(), Some(corner));
    }

    #[test]
    fn covers_the_full_rectangle_without_duplicates() {
        let bbox = delta_strip();
        for zoom in 15..=17 {
            let range = bbox.tile_range(zoom).unwrap();
            let tiles: Vec<_> = range.iter().collect();
            let expected = (range.x_end - range.x_start + 1) * (range.y_end - range.y_start + 1);

            assert_eq!(tiles.len() as u64, u64::from(expected));
            assert_eq!(range.len(), u64::from(expected));
            assert_eq!(tiles.iter().collect::<HashSet<_>>().len(), tiles.len());

            for (lat, lng) in [
                (bbox.lat_min, bbox.lng_min),
                (bbox.lat_min, bbox.lng_max),
                (bbox.lat_max, bbox.lng_min),
                (bbox.lat_max, bbox.lng_max),
            ] {
                let corner = Tile::from_coords_and_zoom(lat, lng, zoom).unwrap();
                assert!(range.contains(&corner), "{} missing at zoom {}", corner, zoom);
            }
        }
    }

    #[test]
    fn iterates_x_outer_y_inner() {
        let range = TileRange::new(3, 1, 2, 4, 5).unwrap();
        let tiles: Vec<_> = range.iter().collect();
        assert_eq!(
            tiles,
            vec![
                Tile::new(1, 4, 3),
                Tile::new(1, 5, 3),
                Tile::new(2, 4, 3),
                Tile::new(2, 5, 3),
            ]
        );
    }

    #[test]
    fn zoom_levels_are_deduplicated_and_sorted() {
        let ranges = delta_strip().tile_ranges(vec![16, 15, 16]).unwrap();
        let zooms: Vec<_> = ranges.iter().map(|r| r.zoom).collect();
        assert_eq!(zooms, vec![15, 16]);

        let total: u64 = ranges.iter().map(TileRange::len).sum();
        assert_eq!(delta_strip().tiles(15..=16).unwrap().count() as u64, total);
    }

    #[test]
    fn rejects_empty_boxes() {
        assert!(matches!(
            BoundingBox::new(30.85, 30.75, 30.55, 31.05),
            Err(DomainError::InvalidBounds { axis: "latitude", .. })
        ));
        assert!(matches!(
            BoundingBox::new(30.75, 30.85, 31.05, 31.05),
            Err(DomainError::InvalidBounds { axis: "longitude", .. })
        ));
        assert_eq!(
            BoundingBox::new(10.0, 89.0, 0.0, 1.0),
            Err(DomainError::InvalidLatitude(89.0))
        );
    }

    #[test]
    fn rejects_ranges_outside_the_grid() {
        assert!(TileRange::new(2, 0, 4, 0, 1).is_err());
        assert!(TileRange::new(2, 2, 1, 0, 1).is_err());
        assert!(TileRange::new(23, 0, 0, 0, 0).is_err());
        assert_eq!(TileRange::new(19, 306680, 306730, 214970, 215020).unwrap().len(), 51 * 51);
    }

    #[test]
    fn inverted_ranges_never_exist() {
        assert_eq!(
            TileRange::new(10, 5, 1, 0, 0),
            Err(DomainError::InvalidRange {
                zoom: 10,
                x_start: 5,
                x_end: 1,
                y_start: 0,
                y_end: 0,
            })
        );

        let single = TileRange::new(10, 5, 5, 7, 7).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single.xs(), 5..=5);
        assert_eq!(single.ys(), 7..=7);
        assert_eq!(single.iter().count() as u64, single.len());
    }
}
