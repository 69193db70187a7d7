use std::{io, path::PathBuf};

use thiserror::Error;

use crate::tile::Tile;

/// Invalid geographic or grid input, rejected before any network activity.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("latitude {0}° is outside the projectable range (±85.0511°)")]
    InvalidLatitude(f64),

    #[error("longitude {0}° is outside [-180, 180]")]
    InvalidLongitude(f64),

    #[error("zoom level {0} is not supported (max {max})", max = crate::tile::MAX_ZOOM)]
    InvalidZoom(u8),

    #[error("bounding box is empty: {axis} min {min} must be below max {max}")]
    InvalidBounds {
        axis: &'static str,
        min: f64,
        max: f64,
    },

    #[error("tile range x {x_start}..={x_end}, y {y_start}..={y_end} is invalid at zoom {zoom}")]
    InvalidRange {
        zoom: u8,
        x_start: u32,
        x_end: u32,
        y_start: u32,
        y_end: u32,
    },
}

/// Failure retrieving a single tile. Recorded per tile, never fatal to a run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport failure fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{url} answered with HTTP {status}")]
    Rejected { url: String, status: u16 },

    #[error("{url} answered with an empty body")]
    EmptyBody { url: String },

    #[error("failed formatting URL for tile {tile}: {reason}")]
    Url { tile: Tile, reason: String },
}

/// Failure persisting to or reading from the tile cache.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed creating directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed writing {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed reading {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed inspecting {path}")]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors that abort a whole fill run.
#[derive(Debug, Error)]
pub enum FillError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("failed creating HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}
