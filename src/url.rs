use maplit::hashmap;
use std::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};
use strfmt::strfmt;
use thiserror::Error;

use crate::tile::Tile;

const OSM_SERVERS: &[&str] = &["a", "b", "c"];

/// The public OpenStreetMap tile server.
pub const DEFAULT_BASE_URL: &str = "https://tile.openstreetmap.org";

#[derive(Debug, Error)]
#[error("invalid tile URL template `{template}`: {reason}")]
pub struct UrlFormatError {
    pub template: String,
    pub reason: String,
}

/// A tile URL template with the replacement specifiers `{z}`, `{x}`, `{y}`
/// and, optionally, `{s}` which rotates through the `a`, `b` and `c` mirrors.
pub struct UrlFormat {
    inc: AtomicUsize,
    format_str: String,
}

impl UrlFormat {
    /// Builds `<base>/{z}/{x}/{y}.<extension>`.
    pub fn from_base(base: &str, extension: &str) -> Self {
        Self::with_template(format!(
            "{}/{{z}}/{{x}}/{{y}}.{}",
            base.trim_end_matches('/'),
            extension
        ))
    }

    /// Parses either a full template or a bare base URL, in which case the
    /// slippy-map path convention with `png` tiles is appended.
    pub fn parse(s: &str) -> Result<Self, UrlFormatError> {
        if !s.contains('{') {
            return Ok(Self::from_base(s, "png"));
        }

        for specifier in ["{z}", "{x}", "{y}"] {
            if !s.contains(specifier) {
                return Err(UrlFormatError {
                    template: s.to_owned(),
                    reason: format!("missing `{}`", specifier),
                });
            }
        }

        Self::with_template(s.to_owned())
            .tile_url(&Tile::new(0, 0, 0))
            .map_err(|reason| UrlFormatError {
                template: s.to_owned(),
                reason,
            })?;

        Ok(Self::with_template(s.to_owned()))
    }

    fn with_template(format_str: String) -> Self {
        Self {
            inc: AtomicUsize::new(0),
            format_str,
        }
    }

    pub fn tile_url(&self, tile: &Tile) -> Result<String, String> {
        let inc = self.inc.fetch_add(1, Ordering::Relaxed);
        let vars = hashmap! {
            "s".to_owned() => OSM_SERVERS[inc % OSM_SERVERS.len()].to_owned(),
            "x".to_owned() => tile.x.to_string(),
            "y".to_owned() => tile.y.to_string(),
            "z".to_owned() => tile.z.to_string(),
        };

        strfmt(&self.format_str, &vars).map_err(|e| e.to_string())
    }
}

impl Default for UrlFormat {
    fn default() -> Self {
        Self::from_base(DEFAULT_BASE_URL, "png")
    }
}

impl PartialEq for UrlFormat {
    fn eq(&self, other: &Self) -> bool {
        self.format_str == other.format_str
    }
}

impl fmt::Debug for UrlFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlFormat")
            .field("format_str", &self.format_str)
            .finish()
    }
}

impl fmt::Display for UrlFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_follows_slippy_path() {
        let format = UrlFormat::parse("https://tile.openstreetmap.org/").unwrap();
        assert_eq!(
            format.tile_url(&Tile::new(306705, 214998, 19)).unwrap(),
            "https://tile.openstreetmap.org/19/306705/214998.png"
        );
        assert_eq!(format, UrlFormat::default());
    }

    #[test]
    fn rotates_subdomains() {
        let format = UrlFormat::parse("https://{s}.tile.example.org/{z}/{x}/{y}.png").unwrap();
        let tile = Tile::new(1, 2, 3);
        let urls: Vec<_> = (0..4).map(|_| format.tile_url(&tile).unwrap()).collect();

        assert_eq!(
            urls,
            vec![
                "https://a.tile.example.org/3/1/2.png",
                "https://b.tile.example.org/3/1/2.png",
                "https://c.tile.example.org/3/1/2.png",
                "https://a.tile.example.org/3/1/2.png",
            ]
        );
    }

    #[test]
    fn rejects_incomplete_templates() {
        let err = UrlFormat::parse("https://example.org/{z}/{x}.png").unwrap_err();
        assert_eq!(err.reason, "missing `{y}`");

        assert!(UrlFormat::parse("https://example.org/{z}/{x}/{y}/{q}.png").is_err());
    }
}
