use futures::{future, prelude::*, stream};
use indicatif::{ProgressBar, ProgressStyle};
use std::{fmt, time::Duration};
use tokio::{
    sync::Mutex,
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bounding_box::{BoundingBox, TileRange};
use crate::cache::TileCache;
use crate::config::{Config, Pacing};
use crate::error::{FetchError, FillError, StorageError};
use crate::source::{HttpSource, TileSource};
use crate::tile::Tile;

/// A tile that could not be fetched, and why.
#[derive(Debug)]
pub struct TileFailure {
    pub tile: Tile,
    pub error: FetchError,
}

/// What a fill run did.
#[derive(Debug, Default)]
pub struct FillSummary {
    /// Tiles processed, i.e. `fetched + skipped + failed`.
    pub attempted: u64,
    pub fetched: u64,
    /// Tiles that were already cached.
    pub skipped: u64,
    pub failures: Vec<TileFailure>,
    /// Whether the run stopped early on cancellation.
    pub cancelled: bool,
}

impl FillSummary {
    pub fn failed(&self) -> u64 {
        self.failures.len() as u64
    }
}

impl fmt::Display for FillSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tiles: {} fetched, {} already cached, {} failed",
            self.attempted,
            self.fetched,
            self.skipped,
            self.failed(),
        )?;
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}

enum Outcome {
    Fetched,
    Skipped,
    Failed(TileFailure),
    /// Cancelled while waiting for the pacer; not counted as attempted.
    Cancelled,
}

/// Spaces out requests to the tile server.
///
/// Sequentially, the wait only follows successful fetches. With several tiles
/// in flight every request start takes a slot, keeping the aggregate rate at
/// or below the sequential one.
struct Pacer {
    next: Mutex<Instant>,
    spaced_starts: bool,
}

impl Pacer {
    fn new(spaced_starts: bool) -> Self {
        Self {
            next: Mutex::new(Instant::now()),
            spaced_starts,
        }
    }

    async fn ready(&self, delay: Duration) {
        let mut next = self.next.lock().await;
        time::sleep_until(*next).await;
        if self.spaced_starts {
            *next = Instant::now() + delay;
        }
    }

    async fn succeeded(&self, delay: Duration) {
        if !self.spaced_starts {
            *self.next.lock().await = Instant::now() + delay;
        }
    }
}

/// Makes sure every tile of a region is in the cache, fetching only the
/// missing ones.
///
/// Re-running a fill is the retry mechanism: tiles stored by an earlier run
/// are skipped, tiles that failed are attempted again.
pub struct CacheFill<S> {
    source: S,
    cache: TileCache,
    pacing: Pacing,
    concurrency: usize,
    cancel: CancellationToken,
    progress: Option<ProgressBar>,
}

impl<S: TileSource> CacheFill<S> {
    pub fn new(source: S, cache: TileCache) -> Self {
        Self {
            source,
            cache,
            pacing: Pacing::default(),
            concurrency: 1,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Stops the run between tiles once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    /// Fills every tile covering `bounding_box` at each of `zooms`.
    pub async fn fill<I>(&self, bounding_box: &BoundingBox, zooms: I) -> Result<FillSummary, FillError>
    where
        I: IntoIterator<Item = u8>,
    {
        let ranges = bounding_box.tile_ranges(zooms)?;
        self.fill_ranges(&ranges).await
    }

    /// Fills the given tile ranges in order.
    ///
    /// Per-tile fetch failures are recorded in the summary. Storage failures
    /// abort the run.
    pub async fn fill_ranges(&self, ranges: &[TileRange]) -> Result<FillSummary, FillError> {
        self.cache.create_root().await?;

        let total: u64 = ranges.iter().map(TileRange::len).sum();
        for range in ranges {
            info!(
                zoom = range.zoom(),
                x = ?range.xs(),
                y = ?range.ys(),
                tiles = range.len(),
                "queued zoom level"
            );
        }

        let pacer = Pacer::new(self.concurrency > 1);
        let pacer = &pacer;
        let cancel = &self.cancel;

        let outcomes = stream::iter(ranges.iter().flat_map(TileRange::iter))
            .take_while(move |_| future::ready(!cancel.is_cancelled()))
            .map(move |tile| self.fill_tile(tile, pacer))
            .buffered(self.concurrency);
        futures::pin_mut!(outcomes);

        let mut summary = FillSummary::default();
        while let Some(outcome) = outcomes.next().await {
            match outcome? {
                Outcome::Fetched => summary.fetched += 1,
                Outcome::Skipped => summary.skipped += 1,
                Outcome::Failed(failure) => summary.failures.push(failure),
                Outcome::Cancelled => continue,
            }
            summary.attempted += 1;

            if let Some(pb) = &self.progress {
                pb.inc(1);
            }
        }

        summary.cancelled = summary.attempted < total && cancel.is_cancelled();
        if summary.cancelled {
            info!(remaining = total - summary.attempted, "fill cancelled");
        }
        info!(
            attempted = summary.attempted,
            fetched = summary.fetched,
            skipped = summary.skipped,
            failed = summary.failed(),
            "fill finished"
        );

        Ok(summary)
    }

    async fn fill_tile(&self, tile: Tile, pacer: &Pacer) -> Result<Outcome, StorageError> {
        if self.cache.exists(&tile).await? {
            debug!(%tile, "already cached");
            return Ok(Outcome::Skipped);
        }

        let delay = self.pacing.delay_for(tile.z);
        pacer.ready(delay).await;

        // tiles buffered ahead of the pacer must not start once cancelled
        if self.cancel.is_cancelled() {
            debug!(%tile, "cancelled before fetching");
            return Ok(Outcome::Cancelled);
        }

        match self.source.fetch(tile).await {
            Ok(blob) => {
                self.cache.write(&tile, &blob).await?;
                pacer.succeeded(delay).await;
                debug!(%tile, bytes = blob.len(), "fetched");
                Ok(Outcome::Fetched)
            }
            Err(error) => {
                warn!(%tile, %error, "failed fetching tile");
                Ok(Outcome::Failed(TileFailure { tile, error }))
            }
        }
    }
}

/// Fills the on-disk cache described by `cfg` from its HTTP tile server,
/// showing a progress bar on the terminal.
///
/// # Example
/// ```no_run
/// use osm_tile_cache::{fill, BoundingBox, Config, Region};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() {
/// let region = Region::Bounds {
///     bounding_box: BoundingBox::new(30.75, 30.85, 30.55, 31.05).unwrap(),
///     zooms: vec![15, 16],
/// };
/// let summary = fill(Config::new(region, "map-data/tiles"), CancellationToken::new())
///     .await
///     .expect("cache directory not writable");
/// println!("{}", summary);
/// # }
/// ```
pub async fn fill(cfg: Config, cancel: CancellationToken) -> Result<FillSummary, FillError> {
    let ranges = cfg.region.tile_ranges()?;
    let source = HttpSource::new(cfg.url, &cfg.user_agent, cfg.timeout)?;

    let pb = ProgressBar::new(ranges.iter().map(TileRange::len).sum());
    pb.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:60.cyan/blue} {pos:>7}/{len:7} ETA: {eta} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-"),
    );

    let summary = CacheFill::new(source, TileCache::new(cfg.output_folder))
        .with_pacing(cfg.pacing)
        .with_concurrency(cfg.concurrency)
        .with_cancellation(cancel)
        .with_progress(pb.clone())
        .fill_ranges(&ranges)
        .await;

    pb.finish_and_clear();
    summary
}
