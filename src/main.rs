//! CLI entry point for the bikeflow tool.
//!
//! Provides subcommands for computing per-station traffic under a
//! time-of-day filter, profiling the minute buckets, exporting map-ready
//! GeoJSON layers, listing the station feed, and downloading the remote
//! documents for offline runs.

use anyhow::{Context, Result};
use bikeflow::{
    fetch::{BasicClient, HttpClient, fetch_bytes},
    geo::{merge_lane_collections, parse_feature_collection, stations_to_geojson},
    output::{append_records, write_json},
    stations::parse_station_feed,
    traffic::{
        MINUTES_PER_DAY, MinuteBuckets, RadiusScale, TimeFilter, compute_station_traffic,
        minute_label,
    },
    trips::parse_trips_slice,
};
use clap::{Parser, Subcommand};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

// Published documents the original Bluebikes map loads; every one can be
// overridden by flag or environment.
const DEFAULT_STATIONS_URL: &str = "https://dsc106.com/labs/lab07/data/bluebikes-stations.json";
const DEFAULT_TRIPS_URL: &str =
    "https://dsc106.com/labs/lab07/data/bluebikes-traffic-2024-03.csv";
const DEFAULT_BOSTON_LANES_URL: &str =
    "https://bostonopendata-boston.opendata.arcgis.com/datasets/boston::existing-bike-network-2022.geojson";
const DEFAULT_CAMBRIDGE_LANES_URL: &str =
    "https://raw.githubusercontent.com/cambridgegis/cambridgegis_data/main/Recreation/Bike_Facilities/RECREATION_BikeFacilities.geojson";

#[derive(Parser)]
#[command(name = "bikeflow")]
#[command(about = "A tool to analyze bike-share station traffic", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute per-station traffic for a time-of-day window
    Traffic {
        /// Station feed JSON file or URL
        #[arg(long)]
        stations: Option<String>,

        /// Trips CSV file or URL (plain or gzipped)
        #[arg(long)]
        trips: Option<String>,

        /// Minute of day to filter around, -1 for any time
        #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
        minute: i32,

        /// How many stations to list, busiest first
        #[arg(short, long, default_value_t = 10)]
        top: usize,

        /// CSV file to append station rows to
        #[arg(short, long)]
        output: Option<String>,

        /// JSON file to write station rows to
        #[arg(long)]
        json: Option<String>,
    },
    /// Write per-minute departure/arrival counts across the day
    Profile {
        /// Trips CSV file or URL (plain or gzipped)
        #[arg(long)]
        trips: Option<String>,

        /// Only count trips touching this station short name
        #[arg(short, long)]
        station: Option<String>,

        /// CSV file to write the 1440 minute rows to
        #[arg(short, long, default_value = "profile.csv")]
        output: String,
    },
    /// Export map-ready GeoJSON layers (station markers and bike lanes)
    Export {
        /// Station feed JSON file or URL
        #[arg(long)]
        stations: Option<String>,

        /// Trips CSV file or URL (plain or gzipped)
        #[arg(long)]
        trips: Option<String>,

        /// Boston bike-lane GeoJSON file or URL
        #[arg(long)]
        boston_lanes: Option<String>,

        /// Cambridge bike-lane GeoJSON file or URL
        #[arg(long)]
        cambridge_lanes: Option<String>,

        /// Minute of day to filter around, -1 for any time
        #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
        minute: i32,

        /// Directory to write the GeoJSON files into
        #[arg(short, long, default_value = "map_data")]
        out_dir: String,

        /// Skip the bike-lane layers
        #[arg(long, default_value_t = false)]
        skip_lanes: bool,
    },
    /// List stations from the station feed
    Stations {
        /// Station feed JSON file or URL
        #[arg(long)]
        stations: Option<String>,
    },
    /// Download the remote documents for offline runs
    Download {
        /// Directory to save the documents into
        #[arg(short, long, default_value = "data")]
        output_dir: String,

        /// Gzip compress the trips CSV on disk
        #[arg(long, default_value_t = false)]
        gzip: bool,

        /// Station feed URL
        #[arg(long)]
        stations: Option<String>,

        /// Trips CSV URL
        #[arg(long)]
        trips: Option<String>,

        /// Boston bike-lane GeoJSON URL
        #[arg(long)]
        boston_lanes: Option<String>,

        /// Cambridge bike-lane GeoJSON URL
        #[arg(long)]
        cambridge_lanes: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bikeflow.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bikeflow.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Traffic {
            stations,
            trips,
            minute,
            top,
            output,
            json,
        } => {
            run_traffic(
                resolve_source(stations, "BIKEFLOW_STATIONS_URL", DEFAULT_STATIONS_URL),
                resolve_source(trips, "BIKEFLOW_TRIPS_URL", DEFAULT_TRIPS_URL),
                minute,
                top,
                output,
                json,
            )
            .await?;
        }
        Commands::Profile {
            trips,
            station,
            output,
        } => {
            run_profile(
                resolve_source(trips, "BIKEFLOW_TRIPS_URL", DEFAULT_TRIPS_URL),
                station,
                output,
            )
            .await?;
        }
        Commands::Export {
            stations,
            trips,
            boston_lanes,
            cambridge_lanes,
            minute,
            out_dir,
            skip_lanes,
        } => {
            run_export(ExportSources {
                stations: resolve_source(stations, "BIKEFLOW_STATIONS_URL", DEFAULT_STATIONS_URL),
                trips: resolve_source(trips, "BIKEFLOW_TRIPS_URL", DEFAULT_TRIPS_URL),
                boston_lanes: resolve_source(
                    boston_lanes,
                    "BIKEFLOW_BOSTON_LANES_URL",
                    DEFAULT_BOSTON_LANES_URL,
                ),
                cambridge_lanes: resolve_source(
                    cambridge_lanes,
                    "BIKEFLOW_CAMBRIDGE_LANES_URL",
                    DEFAULT_CAMBRIDGE_LANES_URL,
                ),
                minute,
                out_dir,
                skip_lanes,
            })
            .await?;
        }
        Commands::Stations { stations } => {
            run_stations(resolve_source(
                stations,
                "BIKEFLOW_STATIONS_URL",
                DEFAULT_STATIONS_URL,
            ))
            .await?;
        }
        Commands::Download {
            output_dir,
            gzip,
            stations,
            trips,
            boston_lanes,
            cambridge_lanes,
        } => {
            run_download(DownloadSources {
                output_dir,
                gzip,
                stations: resolve_source(stations, "BIKEFLOW_STATIONS_URL", DEFAULT_STATIONS_URL),
                trips: resolve_source(trips, "BIKEFLOW_TRIPS_URL", DEFAULT_TRIPS_URL),
                boston_lanes: resolve_source(
                    boston_lanes,
                    "BIKEFLOW_BOSTON_LANES_URL",
                    DEFAULT_BOSTON_LANES_URL,
                ),
                cambridge_lanes: resolve_source(
                    cambridge_lanes,
                    "BIKEFLOW_CAMBRIDGE_LANES_URL",
                    DEFAULT_CAMBRIDGE_LANES_URL,
                ),
            })
            .await?;
        }
    }

    Ok(())
}

/// Flag value if given, else environment override, else the published URL.
fn resolve_source(cli_value: Option<String>, env_key: &str, default: &str) -> String {
    cli_value
        .or_else(|| std::env::var(env_key).ok())
        .unwrap_or_else(|| default.to_string())
}

/// Loads a document from a local file path or fetches it over HTTP.
#[tracing::instrument(skip(client), fields(source = %source))]
async fn fetcher<C: HttpClient>(client: &C, source: &str) -> Result<Vec<u8>> {
    let bytes = if source.starts_with("http") {
        fetch_bytes(client, source).await?
    } else {
        std::fs::read(source).with_context(|| format!("reading {source}"))?
    };
    Ok(bytes)
}

/// Computes per-station traffic for the filter window and logs the busiest
/// stations, optionally persisting the full table as CSV or JSON.
#[tracing::instrument(skip_all)]
async fn run_traffic(
    stations_src: String,
    trips_src: String,
    minute: i32,
    top: usize,
    output: Option<String>,
    json: Option<String>,
) -> Result<()> {
    let filter = TimeFilter::from_slider(minute)?;
    let client = BasicClient::new()?;

    info!(stations = %stations_src, trips = %trips_src, "Loading station and trip data");
    let (station_bytes, trip_bytes) = tokio::try_join!(
        fetcher(&client, &stations_src),
        fetcher(&client, &trips_src)
    )?;

    let stations = parse_station_feed(&station_bytes)
        .with_context(|| format!("parsing station feed from {stations_src}"))?;
    let trips = parse_trips_slice(&trip_bytes)
        .with_context(|| format!("parsing trips from {trips_src}"))?;
    info!(
        station_count = stations.len(),
        trip_count = trips.len(),
        "Data loaded"
    );

    let buckets = MinuteBuckets::from_trips(trips);
    let mut rows = compute_station_traffic(&stations, &buckets, filter);
    rows.sort_by(|a, b| b.total_traffic.cmp(&a.total_traffic));

    let time = minute_label(filter);
    for row in rows.iter().take(top) {
        let ratio = format!("{:.2}", row.departure_ratio());
        info!(
            station = %row.short_name,
            name = row.name.as_deref().unwrap_or("-"),
            departures = row.departures,
            arrivals = row.arrivals,
            total = row.total_traffic,
            ratio = %ratio,
            "Station"
        );
    }

    let window_trips: usize = rows.iter().map(|r| r.total_traffic).sum();
    info!(
        stations = rows.len(),
        window_trips,
        time = %time,
        "Traffic summary"
    );

    if let Some(path) = output {
        append_records(&path, &rows)?;
        info!(path, "Traffic rows appended");
    }
    if let Some(path) = json {
        write_json(&path, &rows)?;
        info!(path, "Traffic rows written as JSON");
    }

    Ok(())
}

/// One CSV row per minute of the day.
#[derive(serde::Serialize)]
struct MinuteProfileRow {
    minute: u16,
    label: String,
    departures: usize,
    arrivals: usize,
}

/// Dumps the minute buckets as a 1440-row day profile, optionally narrowed
/// to a single station.
#[tracing::instrument(skip_all)]
async fn run_profile(trips_src: String, station: Option<String>, output: String) -> Result<()> {
    let client = BasicClient::new()?;
    let trip_bytes = fetcher(&client, &trips_src).await?;
    let trips = parse_trips_slice(&trip_bytes)
        .with_context(|| format!("parsing trips from {trips_src}"))?;
    info!(trip_count = trips.len(), "Trips loaded");

    let buckets = MinuteBuckets::from_trips(trips);

    let rows: Vec<MinuteProfileRow> = (0..MINUTES_PER_DAY as u16)
        .map(|minute| {
            let departures = buckets
                .departures_at(minute)
                .filter(|t| station.as_deref().is_none_or(|s| t.start_station_id == s))
                .count();
            let arrivals = buckets
                .arrivals_at(minute)
                .filter(|t| station.as_deref().is_none_or(|s| t.end_station_id == s))
                .count();
            MinuteProfileRow {
                minute,
                label: minute_label(TimeFilter::Around(minute)),
                departures,
                arrivals,
            }
        })
        .collect();

    if station.is_some() && rows.iter().all(|r| r.departures == 0 && r.arrivals == 0) {
        warn!(
            station = station.as_deref().unwrap_or(""),
            "No trips matched this station short name"
        );
    }

    append_records(&output, &rows)?;
    info!(
        path = %output,
        rows = rows.len(),
        station = station.as_deref().unwrap_or("all"),
        "Minute profile written"
    );

    Ok(())
}

struct ExportSources {
    stations: String,
    trips: String,
    boston_lanes: String,
    cambridge_lanes: String,
    minute: i32,
    out_dir: String,
    skip_lanes: bool,
}

/// Produces the GeoJSON layers the map frontend loads: station markers
/// carrying traffic encodings, and the merged bike-lane layer.
#[tracing::instrument(skip_all)]
async fn run_export(sources: ExportSources) -> Result<()> {
    let filter = TimeFilter::from_slider(sources.minute)?;
    let client = BasicClient::new()?;

    std::fs::create_dir_all(&sources.out_dir)
        .with_context(|| format!("creating {}", sources.out_dir))?;

    info!(
        stations = %sources.stations,
        trips = %sources.trips,
        "Loading station and trip data"
    );
    let (station_bytes, trip_bytes) = tokio::try_join!(
        fetcher(&client, &sources.stations),
        fetcher(&client, &sources.trips)
    )?;

    let stations = parse_station_feed(&station_bytes)
        .with_context(|| format!("parsing station feed from {}", sources.stations))?;
    let trips = parse_trips_slice(&trip_bytes)
        .with_context(|| format!("parsing trips from {}", sources.trips))?;

    let buckets = MinuteBuckets::from_trips(trips);
    let rows = compute_station_traffic(&stations, &buckets, filter);
    let scale = RadiusScale::from_traffic(&rows);
    let markers = stations_to_geojson(&rows, &scale);

    let markers_path = format!("{}/stations.geojson", sources.out_dir);
    write_json(&markers_path, &markers)?;
    info!(
        path = %markers_path,
        markers = rows.len(),
        time = %minute_label(filter),
        "Station markers written"
    );

    if sources.skip_lanes {
        return Ok(());
    }

    let (boston_bytes, cambridge_bytes) = tokio::try_join!(
        fetcher(&client, &sources.boston_lanes),
        fetcher(&client, &sources.cambridge_lanes)
    )?;

    let boston = parse_feature_collection(&boston_bytes)
        .with_context(|| format!("parsing lanes from {}", sources.boston_lanes))?;
    let cambridge = parse_feature_collection(&cambridge_bytes)
        .with_context(|| format!("parsing lanes from {}", sources.cambridge_lanes))?;

    let lanes = merge_lane_collections(vec![("boston", boston), ("cambridge", cambridge)]);
    let lane_count = lanes.features.len();

    let lanes_path = format!("{}/lanes.geojson", sources.out_dir);
    write_json(&lanes_path, &lanes)?;
    info!(path = %lanes_path, features = lane_count, "Bike lanes written");

    Ok(())
}

/// Lists every station in the feed with a closing summary line.
#[tracing::instrument(skip_all)]
async fn run_stations(stations_src: String) -> Result<()> {
    let client = BasicClient::new()?;
    let bytes = fetcher(&client, &stations_src).await?;
    let stations = parse_station_feed(&bytes)
        .with_context(|| format!("parsing station feed from {stations_src}"))?;

    info!(total = stations.len(), "Station feed fetched");

    for station in &stations {
        info!(
            short_name = %station.short_name,
            name = station.display_name(),
            lon = station.lon,
            lat = station.lat,
            capacity = station.capacity,
            "Station"
        );
    }

    let named = stations.iter().filter(|s| s.name.is_some()).count();
    let with_capacity = stations.iter().filter(|s| s.capacity.is_some()).count();
    info!(
        total = stations.len(),
        named,
        with_capacity,
        "Station feed summary"
    );

    Ok(())
}

struct DownloadSources {
    output_dir: String,
    gzip: bool,
    stations: String,
    trips: String,
    boston_lanes: String,
    cambridge_lanes: String,
}

/// Saves the four remote documents locally, parsing each one first so a bad
/// URL fails here rather than on a later offline run.
#[tracing::instrument(skip_all)]
async fn run_download(sources: DownloadSources) -> Result<()> {
    std::fs::create_dir_all(&sources.output_dir)
        .with_context(|| format!("creating {}", sources.output_dir))?;
    let client = BasicClient::new()?;

    let station_bytes = fetcher(&client, &sources.stations).await?;
    let station_count = parse_station_feed(&station_bytes)
        .with_context(|| format!("parsing station feed from {}", sources.stations))?
        .len();
    let path = format!("{}/stations.json", sources.output_dir);
    std::fs::write(&path, &station_bytes)?;
    info!(path, stations = station_count, "Station feed saved");

    let trip_bytes = fetcher(&client, &sources.trips).await?;
    let trip_count = parse_trips_slice(&trip_bytes)
        .with_context(|| format!("parsing trips from {}", sources.trips))?
        .len();

    let (path, body) = if trip_bytes.starts_with(&[0x1f, 0x8b]) {
        // already compressed at the source, keep as-is
        (format!("{}/trips.csv.gz", sources.output_dir), trip_bytes)
    } else if sources.gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&trip_bytes)?;
        (
            format!("{}/trips.csv.gz", sources.output_dir),
            encoder.finish()?,
        )
    } else {
        (format!("{}/trips.csv", sources.output_dir), trip_bytes)
    };
    std::fs::write(&path, &body)?;
    info!(path, trips = trip_count, bytes = body.len(), "Trips saved");

    for (city, source) in [
        ("boston", &sources.boston_lanes),
        ("cambridge", &sources.cambridge_lanes),
    ] {
        let bytes = fetcher(&client, source).await?;
        let features = parse_feature_collection(&bytes)
            .with_context(|| format!("parsing lanes from {source}"))?
            .features
            .len();
        let path = format!("{}/{city}_lanes.geojson", sources.output_dir);
        std::fs::write(&path, &bytes)?;
        info!(path, features, "Lane layer saved");
    }

    info!(output_dir = %sources.output_dir, "Download complete");
    Ok(())
}
