use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use ward_locator::config::AppConfig;
use ward_locator::controller::{Controller, Status, StatusKind};
use ward_locator::geolocation::ConfiguredGeolocator;
use ward_locator::render::RasterMapView;
use ward_locator::types::QueryPoint;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report which ward contains a coordinate
    Check {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        lat: String,
        #[arg(long, allow_hyphen_values = true)]
        lon: String,
        /// Boundary file to load instead of the configured default
        #[arg(short, long, value_name = "FILE")]
        boundaries: Option<PathBuf>,
        /// Write a PNG of the map afterwards
        #[arg(short, long, value_name = "PNG")]
        snapshot: Option<PathBuf>,
    },
    /// Report which ward contains the device position
    Locate {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(short, long, value_name = "FILE")]
        boundaries: Option<PathBuf>,
        #[arg(short, long, value_name = "PNG")]
        snapshot: Option<PathBuf>,
    },
    /// Line-oriented session: load files, enter coordinates, locate
    Interactive {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

type MapController = Controller<RasterMapView>;

const HELP: &str = "commands:
  load <file>      load a .kml or .geojson boundary file
  lat <value>      set the latitude input
  lon <value>      set the longitude input
  check            find the ward containing the entered coordinates
  locate           find the ward containing the device position
  snapshot <png>   write the current map to a PNG file
  status           show the status line and available actions
  quit";

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            config,
            lat,
            lon,
            boundaries,
            snapshot,
        } => {
            let app_config = AppConfig::load_or_default(&config)?;
            let mut controller = build_controller(&app_config)?;

            if !load(&mut controller, boundaries.as_deref()).await {
                print_status(controller.status());
                return Ok(ExitCode::FAILURE);
            }

            controller.set_latitude_input(lat);
            controller.set_longitude_input(lon);
            controller.check_coordinates();
            print_status(controller.status());

            if let Some(path) = snapshot {
                controller.view().snapshot(&path)?;
            }
            Ok(exit_code(controller.status()))
        }
        Commands::Locate {
            config,
            boundaries,
            snapshot,
        } => {
            let app_config = AppConfig::load_or_default(&config)?;
            let mut controller = build_controller(&app_config)?;

            if !load(&mut controller, boundaries.as_deref()).await {
                print_status(controller.status());
                return Ok(ExitCode::FAILURE);
            }

            print_status(controller.status());
            controller.locate_me().await;
            print_status(controller.status());

            if let Some(path) = snapshot {
                controller.view().snapshot(&path)?;
            }
            Ok(exit_code(controller.status()))
        }
        Commands::Interactive { config } => {
            let app_config = AppConfig::load_or_default(&config)?;
            let mut controller = build_controller(&app_config)?;
            controller.load_default().await;
            print_status(controller.status());
            run_interactive(&mut controller).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_controller(config: &AppConfig) -> anyhow::Result<MapController> {
    let [lat, lon] = config.map.initial_center;
    let center = QueryPoint::new(lat, lon).context("Invalid map.initial_center")?;
    let view = RasterMapView::new(
        config.map.snapshot_width,
        config.map.snapshot_height,
        center,
        config.map.initial_zoom,
    );
    let geolocator = ConfiguredGeolocator::from_config(&config.geolocation);
    Ok(Controller::new(config, view, Box::new(geolocator)))
}

async fn load(controller: &mut MapController, boundaries: Option<&Path>) -> bool {
    match boundaries {
        Some(path) => controller.load_file(path).await,
        None => controller.load_default().await,
    }
}

async fn run_interactive(controller: &mut MapController) -> anyhow::Result<()> {
    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };

        match command {
            "" => continue,
            "load" if !arg.is_empty() => {
                controller.load_file(Path::new(arg)).await;
                print_status(controller.status());
            }
            "lat" => {
                controller.set_latitude_input(arg);
                print_controls(controller);
            }
            "lon" => {
                controller.set_longitude_input(arg);
                print_controls(controller);
            }
            "check" => {
                if controller.controls().check {
                    controller.check_coordinates();
                    print_status(controller.status());
                } else {
                    println!("check is disabled: load boundaries and enter a valid latitude and longitude");
                }
            }
            "locate" => {
                if controller.controls().locate {
                    println!("Getting your location...");
                    controller.locate_me().await;
                    print_status(controller.status());
                } else {
                    println!("locate is disabled: load ward boundaries first");
                }
            }
            "snapshot" if !arg.is_empty() => {
                if let Err(e) = controller.view().snapshot(Path::new(arg)) {
                    println!("error: {:#}", e);
                }
            }
            "status" => {
                print_status(controller.status());
                print_controls(controller);
            }
            "help" => println!("{}", HELP),
            "quit" | "exit" => break,
            _ => println!("unknown command '{}', try 'help'", line),
        }
    }

    Ok(())
}

fn print_status(status: &Status) {
    match status.kind {
        StatusKind::Normal => println!("{}", status.message),
        StatusKind::Error => println!("error: {}", status.message),
    }
}

fn print_controls(controller: &MapController) {
    let controls = controller.controls();
    let state = |on: bool| if on { "enabled" } else { "disabled" };
    println!("locate {}, check {}", state(controls.locate), state(controls.check));
}

fn exit_code(status: &Status) -> ExitCode {
    match status.kind {
        StatusKind::Normal => ExitCode::SUCCESS,
        StatusKind::Error => ExitCode::FAILURE,
    }
}
