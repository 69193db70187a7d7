use osm_tile_cache::BoundingBox;

/// A bounding box fixture containing preset coordinates for a known geographic
/// region, along with the zoom levels it is usually cached at.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Fixture {
    /// The strip connecting the western districts to Tanta.
    DeltaStrip,
    Tanta,
}

impl Fixture {
    pub fn bounding_box(self) -> BoundingBox {
        use Fixture::*;

        let (lat_min, lat_max, lng_min, lng_max) = match self {
            DeltaStrip => (30.75, 30.85, 30.55, 31.05),
            Tanta => (30.75, 30.82, 30.97, 31.03),
        };

        BoundingBox {
            lat_min,
            lat_max,
            lng_min,
            lng_max,
        }
    }

    pub fn zooms(self) -> std::ops::RangeInclusive<u8> {
        use Fixture::*;

        match self {
            DeltaStrip => 15..=19,
            Tanta => 19..=19,
        }
    }
}

impl std::str::FromStr for Fixture {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use Fixture::*;

        let s = s.to_lowercase();
        if s.starts_with("delta") {
            return Ok(DeltaStrip);
        }

        if s.starts_with("tanta") {
            return Ok(Tanta);
        }

        Err("unrecognized fixture (expected `delta-strip` or `tanta`)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_are_valid_regions() {
        for fixture in ["delta-strip", "Tanta"] {
            let fixture: Fixture = fixture.parse().unwrap();
            let bbox = fixture.bounding_box();
            assert_eq!(
                BoundingBox::new(bbox.lat_min, bbox.lat_max, bbox.lng_min, bbox.lng_max),
                Ok(bbox)
            );
            assert!(bbox.tile_ranges(fixture.zooms()).is_ok());
        }
        assert!("usa".parse::<Fixture>().is_err());
    }
}
