mod animator;
mod config;
mod export;
mod geodata;
mod gpx;
mod player;
mod polyline;
mod route;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::config::{AnimationPacing, MapConfig};
use crate::player::RoutePlayer;
use crate::route::{Coordinate, RouteCollection};

#[derive(Parser)]
#[command(
    name = "runmap",
    about = "Replay recorded runs and rides as a route-drawing animation"
)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Map configuration (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Reveal one point every N milliseconds, regardless of route length
    #[arg(long, global = true)]
    step_ms: Option<u64>,

    /// Interface language, overriding the configuration file
    #[arg(long, global = true, value_enum)]
    locale: Option<config::Locale>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RouteInput {
    /// GPX or GeoJSON file
    #[arg(required_unless_present = "polyline", conflicts_with = "polyline")]
    input: Option<PathBuf>,

    /// Encoded polyline instead of a file
    #[arg(long)]
    polyline: Option<String>,

    /// Polyline precision (decimal digits)
    #[arg(long, default_value_t = config::DEFAULT_POLYLINE_PRECISION)]
    precision: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// Play the single-run animation
    Play {
        #[command(flatten)]
        source: RouteInput,

        /// Stop the animation after this many frames
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        stop_after: Option<u64>,

        /// Print every frame as a JSON line on stdout
        #[arg(long)]
        frames: bool,

        /// Replay the animation this many more times once it finishes
        #[arg(long, default_value_t = 0)]
        repeat: u64,
    },

    /// Export the animation timeline as GeoJSON
    Export {
        #[command(flatten)]
        source: RouteInput,

        /// Output file path
        #[arg(short, long, default_value = "output/timeline.geojson")]
        output: PathBuf,
    },

    /// Describe the routes and how they would be shown
    Info {
        #[command(flatten)]
        source: RouteInput,

        /// Map zoom used to decide the big-map overview
        #[arg(short, long, default_value_t = 10.0)]
        zoom: f64,
    },
}

enum PlayerEvent {
    Frame(Vec<Coordinate>),
    Done,
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install log subscriber")
}

fn load_routes(source: &RouteInput) -> Result<RouteCollection> {
    if let Some(encoded) = &source.polyline {
        let route = polyline::decode(encoded, source.precision)?;
        return Ok(RouteCollection::new(vec![route]));
    }
    let Some(path) = &source.input else {
        anyhow::bail!("No route given: pass a file or --polyline");
    };
    load_file(path)
}

fn load_file(path: &Path) -> Result<RouteCollection> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "gpx" => gpx::load_routes(path),
        "geojson" | "json" => geodata::load_routes(path),
        _ => anyhow::bail!(
            "Unrecognized route file '{}': expected .gpx, .geojson or .json",
            path.display()
        ),
    }
}

async fn do_play(
    config: &MapConfig,
    routes: &RouteCollection,
    stop_after: Option<u64>,
    print_frames: bool,
    repeat: u64,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let frame_tx = tx.clone();
    let mut player = RoutePlayer::new(config.animation)
        .on_frame(Rc::new(move |prefix: &[Coordinate]| {
            let _ = frame_tx.send(PlayerEvent::Frame(prefix.to_vec()));
        }))
        .on_complete(Rc::new(move || {
            let _ = tx.send(PlayerEvent::Done);
        }));

    player.show(routes);
    if !player.is_single_run() {
        info!(
            "{}: {} routes, nothing to animate",
            config.locale.all_runs_title(),
            routes.routes.len()
        );
        return Ok(());
    }
    if let Some(ends) = player.single_run_endpoints() {
        info!(
            "{}: ({:.6}, {:.6}) -> ({:.6}, {:.6})",
            config.locale.single_run_title(),
            ends.start.y,
            ends.start.x,
            ends.end.y,
            ends.end.x
        );
    }
    if !player.is_animating() {
        warn!("Route has fewer than two points, nothing to animate");
        return Ok(());
    }

    let mut seen = 0_u64;
    let mut replays = 0;
    while let Some(event) = rx.recv().await {
        match event {
            PlayerEvent::Frame(prefix) => {
                seen += 1;
                if print_frames {
                    let coords: Vec<[f64; 2]> = prefix.iter().map(|c| [c.x, c.y]).collect();
                    println!("{}", json!({ "frame": seen, "coordinates": coords }));
                }
                if stop_after.is_some_and(|limit| seen >= limit) {
                    player.stop();
                    info!("Stopped after {seen} frames");
                    break;
                }
            }
            PlayerEvent::Done if replays < repeat => {
                replays += 1;
                info!("Replaying ({replays}/{repeat})");
                player.trigger(replays);
            }
            PlayerEvent::Done => {
                info!(
                    "Animation complete: {seen} frames, {} points drawn",
                    player.animated_points().len()
                );
                break;
            }
        }
    }

    Ok(())
}

fn do_info(config: &MapConfig, routes: &RouteCollection, zoom: f64) {
    let big_map = config::is_big_map(zoom);
    let single = routes.single_run();
    let title = if single.is_some() {
        config.locale.single_run_title()
    } else {
        config.locale.all_runs_title()
    };

    println!("{title}: {} routes, {} points", routes.routes.len(), routes.total_points());
    println!("Map height: {} px", config.map_height_px);
    println!(
        "Lights: {} (control {})",
        if config.initial_lights() { "on" } else { "off" },
        if config.lights_control_visible() { "shown" } else { "hidden" },
    );
    println!(
        "Route line: opacity {}, dash {}",
        config.line_opacity,
        config
            .dash_pattern(single.is_some(), big_map)
            .unwrap_or("none"),
    );

    if let Some(route) = single {
        println!("Key: {}", route.key());
        if let Some(ends) = route.endpoints() {
            println!(
                "Start: {:.6}, {:.6}  End: {:.6}, {:.6}",
                ends.start.y, ends.start.x, ends.end.y, ends.end.x
            );
        }
        let pacing = &config.animation;
        println!(
            "Playback: {} frames, {} ms per frame, {} ms total",
            route.len().saturating_sub(1),
            pacing.step_delay(route.len()).as_millis(),
            pacing.total_duration(route.len()).as_millis(),
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    let mut config = MapConfig::load_or_default(cli.config.as_deref())?;
    if let Some(ms) = cli.step_ms {
        config.animation = AnimationPacing::fixed(Duration::from_millis(ms));
        config.validate()?;
    }
    if let Some(locale) = cli.locale {
        config.locale = locale;
    }

    match cli.command {
        Commands::Play {
            source,
            stop_after,
            frames,
            repeat,
        } => {
            info!("{}", config.locale.loading_text());
            let routes = load_routes(&source)?;
            LocalSet::new()
                .run_until(do_play(&config, &routes, stop_after, frames, repeat))
                .await?;
        }

        Commands::Export { source, output } => {
            let routes = load_routes(&source)?;
            let Some(route) = routes.single_run() else {
                anyhow::bail!(
                    "Export needs exactly one route, found {}",
                    routes.routes.len()
                );
            };
            export::export_json(route, &config.animation, &output)?;
        }

        Commands::Info { source, zoom } => {
            let routes = load_routes(&source)?;
            do_info(&config, &routes, zoom);
        }
    }

    Ok(())
}
