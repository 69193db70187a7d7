mod args;
mod fixture;
mod validators;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use args::{Action, Args, CheckArgs};
use osm_tile_cache::{fill, Config, Tile, TileCache, TileRange};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse()?;
    init_logging(args.verbose);

    match args.action {
        Action::Fill { config, dry_run } if dry_run => dry_run_fill(&config),
        Action::Fill { config, .. } => run_fill(config).await,
        Action::Check(check) => run_check(check).await,
    }
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose {
        "osm_tile_cache=debug"
    } else {
        "osm_tile_cache=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn dry_run_fill(config: &Config) -> Result<()> {
    let ranges = config.region.tile_ranges()?;
    for range in &ranges {
        eprintln!(
            "zoom {}: x {:?}, y {:?} ({} tiles)",
            range.zoom(),
            range.xs(),
            range.ys(),
            range.len()
        );
    }

    let tile_count: u64 = ranges.iter().map(TileRange::len).sum();
    eprintln!(
        "would download at most {} tiles (approx {}, assuming 10 kb per tile)",
        tile_count,
        pretty_bytes::converter::convert((tile_count as f64) * 10_000f64)
    );

    Ok(())
}

async fn run_fill(config: Config) -> Result<()> {
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, stopping after the current tile");
                cancel.cancel();
            }
        }
    });

    let output = config.output_folder.clone();
    let summary = fill(config, cancel)
        .await
        .with_context(|| format!("failed filling tile cache at {}", output.display()))?;

    eprintln!("{}", summary);
    for failure in &summary.failures {
        eprintln!("Failed fetching tile {}: {}", failure.tile, failure.error);
    }

    Ok(())
}

async fn run_check(args: CheckArgs) -> Result<()> {
    let target = Tile::from_coords_and_zoom(args.lat, args.lng, args.zoom)?;
    let cache = TileCache::new(&args.output_dir);

    println!("Target tile: {}", target);
    for status in cache.neighbourhood(&target, args.radius).await? {
        println!(
            "Tile {}: {} ({})",
            status.tile,
            if status.cached { "EXISTS" } else { "MISSING" },
            cache.path(&status.tile).display()
        );
    }

    Ok(())
}
