use anyhow::{bail, Context, Result};
use clap::{command, Arg, ArgAction, ArgMatches, Command};
use std::{path::PathBuf, time::Duration};

use crate::fixture::Fixture;
use crate::validators::*;
use osm_tile_cache::{
    default_user_agent, BoundingBox, Config, Pacing, Region, TileRange, UrlFormat, DEFAULT_BASE_URL,
};

const FILL_CMD: &str = "fill";
const CHECK_CMD: &str = "check";

const VERBOSE_ARG: &str = "verbose";
const URL_ARG: &str = "url";
const USER_AGENT_ARG: &str = "user_agent";
const OUTPUT_DIR_ARG: &str = "output_dir";
const BBOX_FIXTURE_ARG: &str = "fixture";
const LAT_MIN_ARG: &str = "lat_min";
const LAT_MAX_ARG: &str = "lat_max";
const LNG_MIN_ARG: &str = "lng_min";
const LNG_MAX_ARG: &str = "lng_max";
const X_START_ARG: &str = "x_start";
const X_END_ARG: &str = "x_end";
const Y_START_ARG: &str = "y_start";
const Y_END_ARG: &str = "y_end";
const ZOOM_ARG: &str = "zoom";
const MIN_ZOOM_ARG: &str = "min_zoom";
const MAX_ZOOM_ARG: &str = "max_zoom";
const TIMEOUT_ARG: &str = "timeout";
const DELAY_ARG: &str = "delay";
const ZOOM_DELAY_ARG: &str = "zoom_delay";
const CONCURRENCY_ARG: &str = "concurrency";
const DRY_RUN_ARG: &str = "dry_run";
const LAT_ARG: &str = "lat";
const LNG_ARG: &str = "lng";
const RADIUS_ARG: &str = "radius";

const RANGE_ARGS: [&str; 4] = [X_START_ARG, X_END_ARG, Y_START_ARG, Y_END_ARG];

const DEFAULT_OUTPUT_DIR: &str = "map-data/tiles";

pub struct Args {
    pub verbose: bool,
    pub action: Action,
}

pub enum Action {
    Fill { config: Config, dry_run: bool },
    Check(CheckArgs),
}

pub struct CheckArgs {
    pub lat: f64,
    pub lng: f64,
    pub zoom: u8,
    pub radius: u32,
    pub output_dir: PathBuf,
}

impl Args {
    pub fn parse() -> Result<Self> {
        let matches = command().get_matches();
        let verbose = matches.get_flag(VERBOSE_ARG);

        let action = match matches.subcommand() {
            Some((FILL_CMD, sub)) => Action::Fill {
                config: fill_config(sub)?,
                dry_run: sub.get_flag(DRY_RUN_ARG),
            },
            Some((CHECK_CMD, sub)) => Action::Check(CheckArgs {
                lat: required(sub, LAT_ARG)?,
                lng: required(sub, LNG_ARG)?,
                zoom: required(sub, ZOOM_ARG)?,
                radius: required(sub, RADIUS_ARG)?,
                output_dir: required(sub, OUTPUT_DIR_ARG)?,
            }),
            _ => bail!("no subcommand given"),
        };

        Ok(Self { verbose, action })
    }
}

fn required<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> Result<T> {
    matches
        .get_one::<T>(id)
        .cloned()
        .with_context(|| format!("missing argument `{}`", id))
}

fn zoom_levels(matches: &ArgMatches) -> Result<Option<Vec<u8>>> {
    if let Some(zooms) = matches.get_many::<u8>(ZOOM_ARG) {
        return Ok(Some(zooms.copied().collect()));
    }

    let zooms = match (
        matches.get_one::<u8>(MIN_ZOOM_ARG),
        matches.get_one::<u8>(MAX_ZOOM_ARG),
    ) {
        (Some(&min), Some(&max)) if min > max => {
            bail!("--min-zoom {} is above --max-zoom {}", min, max)
        }
        (Some(&min), Some(&max)) => Some((min..=max).collect()),
        (Some(&zoom), None) | (None, Some(&zoom)) => Some(vec![zoom]),
        (None, None) => None,
    };

    Ok(zooms)
}

fn region(matches: &ArgMatches) -> Result<Region> {
    let zooms = zoom_levels(matches)?;

    // a fixture brings its own zoom levels unless overridden
    if let Some(fixture) = matches.get_one::<String>(BBOX_FIXTURE_ARG) {
        let fixture = fixture
            .parse::<Fixture>()
            .map_err(anyhow::Error::msg)?;

        return Ok(Region::Bounds {
            bounding_box: fixture.bounding_box(),
            zooms: zooms.unwrap_or_else(|| fixture.zooms().collect()),
        });
    }

    if matches.contains_id(X_START_ARG) {
        let zoom = match zooms.as_deref() {
            Some([zoom]) => *zoom,
            _ => bail!("an explicit tile range needs exactly one zoom level"),
        };
        let range = TileRange::new(
            zoom,
            required(matches, X_START_ARG)?,
            required(matches, X_END_ARG)?,
            required(matches, Y_START_ARG)?,
            required(matches, Y_END_ARG)?,
        )?;

        return Ok(Region::Range(range));
    }

    let zooms = match zooms {
        Some(zooms) if !zooms.is_empty() => zooms,
        _ => bail!("no zoom levels given (use --zoom or --min-zoom/--max-zoom)"),
    };
    let bounding_box = BoundingBox::new(
        required(matches, LAT_MIN_ARG)?,
        required(matches, LAT_MAX_ARG)?,
        required(matches, LNG_MIN_ARG)?,
        required(matches, LNG_MAX_ARG)?,
    )?;

    Ok(Region::Bounds {
        bounding_box,
        zooms,
    })
}

fn fill_config(matches: &ArgMatches) -> Result<Config> {
    let url = UrlFormat::parse(&required::<String>(matches, URL_ARG)?)?;

    // an explicit delay replaces the built-in per-zoom defaults too
    let mut pacing = match matches.get_one::<Duration>(DELAY_ARG) {
        Some(&delay) => Pacing::fixed(delay),
        None => Pacing::default(),
    };
    if let Some(overrides) = matches.get_many::<(u8, Duration)>(ZOOM_DELAY_ARG) {
        pacing.per_zoom.extend(overrides.copied());
    }

    Ok(Config {
        region: region(matches)?,
        output_folder: required(matches, OUTPUT_DIR_ARG)?,
        url,
        user_agent: matches
            .get_one::<String>(USER_AGENT_ARG)
            .cloned()
            .unwrap_or_else(default_user_agent),
        timeout: Duration::from_secs(required(matches, TIMEOUT_ARG)?),
        pacing,
        concurrency: required(matches, CONCURRENCY_ARG)?,
    })
}

fn output_arg() -> Arg {
    Arg::new(OUTPUT_DIR_ARG)
        .help("The cache root. Tiles are stored as <output>/<z>/<x>/<y>.png.")
        .value_parser(clap::value_parser!(PathBuf))
        .default_value(DEFAULT_OUTPUT_DIR)
        .short('o')
        .long("output")
}

fn coord_arg(id: &'static str, long: &'static str, help: &'static str, latitude_like: bool) -> Arg {
    let arg = Arg::new(id)
        .help(help)
        .allow_hyphen_values(true)
        .long(long);

    if latitude_like {
        arg.value_parser(latitude)
    } else {
        arg.value_parser(longitude)
    }
}

fn tile_index_arg(id: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .help(help)
        .value_parser(clap::value_parser!(u32))
        .requires_all(RANGE_ARGS.iter().filter(|other| **other != id).copied())
        .conflicts_with_all([BBOX_FIXTURE_ARG, LAT_MIN_ARG, LAT_MAX_ARG, LNG_MIN_ARG, LNG_MAX_ARG])
        .long(long)
}

fn fill_command() -> Command {
    Command::new(FILL_CMD)
        .about("Fetch every missing tile of a region into the cache")
        .arg(coord_arg(LAT_MIN_ARG, "lat-min", "Southern boundary of the bounding box (in degrees)", true))
        .arg(coord_arg(LAT_MAX_ARG, "lat-max", "Northern boundary of the bounding box (in degrees)", true))
        .arg(coord_arg(LNG_MIN_ARG, "lng-min", "Western boundary of the bounding box (in degrees)", false))
        .arg(coord_arg(LNG_MAX_ARG, "lng-max", "Eastern boundary of the bounding box (in degrees)", false))
        .arg(
            Arg::new(BBOX_FIXTURE_ARG)
                .help("Use a named region (`delta-strip` or `tanta`) instead of explicit bounds")
                .conflicts_with_all([LAT_MIN_ARG, LAT_MAX_ARG, LNG_MIN_ARG, LNG_MAX_ARG])
                .short('f')
                .long("fixture"),
        )
        .arg(tile_index_arg(X_START_ARG, "x-start", "First tile column of an explicit range"))
        .arg(tile_index_arg(X_END_ARG, "x-end", "Last tile column of an explicit range"))
        .arg(tile_index_arg(Y_START_ARG, "y-start", "First tile row of an explicit range"))
        .arg(tile_index_arg(Y_END_ARG, "y-end", "Last tile row of an explicit range"))
        .arg(
            Arg::new(ZOOM_ARG)
                .help("A zoom level to fetch. May be repeated.")
                .value_parser(zoom)
                .action(ArgAction::Append)
                .conflicts_with_all([MIN_ZOOM_ARG, MAX_ZOOM_ARG])
                .short('z')
                .long("zoom"),
        )
        .arg(
            Arg::new(MIN_ZOOM_ARG)
                .help("The minimum zoom level to fetch")
                .value_parser(zoom)
                .long("min-zoom"),
        )
        .arg(
            Arg::new(MAX_ZOOM_ARG)
                .help("The maximum zoom level to fetch")
                .value_parser(zoom)
                .long("max-zoom"),
        )
        .arg(output_arg())
        .arg(
            Arg::new(URL_ARG)
                .help("The tile server base URL, or a template with format specifiers `{z}`, `{x}`, `{y}`. Also supports the format specifier `{s}` which is replaced with `a`, `b` or `c` in turn to spread the load between different servers.")
                .default_value(DEFAULT_BASE_URL)
                .short('u')
                .long("url"),
        )
        .arg(
            Arg::new(USER_AGENT_ARG)
                .help("The client identifier sent to the tile server")
                .long("user-agent"),
        )
        .arg(
            Arg::new(TIMEOUT_ARG)
                .help("The timeout (in seconds) for fetching a single tile")
                .value_parser(positive::<u64>)
                .default_value("30")
                .short('t')
                .long("timeout"),
        )
        .arg(
            Arg::new(DELAY_ARG)
                .help("Pause (in milliseconds) after each downloaded tile [default: 30, 60 from zoom 19]")
                .value_parser(millis)
                .short('d')
                .long("delay"),
        )
        .arg(
            Arg::new(ZOOM_DELAY_ARG)
                .help("Per-zoom pause as ZOOM=MILLIS, e.g. `19=60`. May be repeated.")
                .value_parser(zoom_delay)
                .action(ArgAction::Append)
                .long("zoom-delay"),
        )
        .arg(
            Arg::new(CONCURRENCY_ARG)
                .help("The amount of tiles in flight at once. Requests stay spaced by the delay.")
                .value_parser(positive::<usize>)
                .default_value("1")
                .short('c')
                .long("concurrency"),
        )
        .arg(
            Arg::new(DRY_RUN_ARG)
                .help("Don't actually fetch anything, just determine how many tiles the region covers.")
                .action(ArgAction::SetTrue)
                .long("dry-run"),
        )
}

fn check_command() -> Command {
    Command::new(CHECK_CMD)
        .about("Report whether the tile at a point and its neighbours are cached")
        .arg(coord_arg(LAT_ARG, "lat", "Latitude of the point (in degrees)", true).required(true))
        .arg(coord_arg(LNG_ARG, "lng", "Longitude of the point (in degrees)", false).required(true))
        .arg(
            Arg::new(ZOOM_ARG)
                .help("The zoom level to check")
                .value_parser(zoom)
                .required(true)
                .short('z')
                .long("zoom"),
        )
        .arg(
            Arg::new(RADIUS_ARG)
                .help("How many tiles around the point to check")
                .value_parser(clap::value_parser!(u32))
                .default_value("1")
                .short('r')
                .long("radius"),
        )
        .arg(output_arg())
}

fn command() -> Command {
    command!()
        .propagate_version(true)
        .subcommand_required(true)
        .arg(
            Arg::new(VERBOSE_ARG)
                .help("Log every tile (overridden by RUST_LOG)")
                .action(ArgAction::SetTrue)
                .global(true)
                .short('v')
                .long("verbose"),
        )
        .subcommand(fill_command())
        .subcommand(check_command())
}
