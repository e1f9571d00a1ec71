use std::error::Error;
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use freeride::session::{MemoryPreferences, RideOption};
use freeride::tiles::FileTransport;
use futures_lite::future::block_on;
use serde_json::{json, Value};

#[derive(Parser)]
struct Cli {
    /// The path to the Overpass JSON dump (optionally .gz or .bz2 compressed)
    dump_file: PathBuf,

    /// Latitude of the start point
    start_lat: f64,

    /// Longitude of the start point
    start_lng: f64,

    /// Number of levels to ride along the top-ranked option
    #[arg(long, default_value_t = 0)]
    depth: usize,

    /// The path to a JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    colog::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => freeride::Config::from_json_str(&std::fs::read_to_string(path)?)?,
        None => freeride::Config::default(),
    };

    let transport = FileTransport::new(&cli.dump_file);
    let tiles = Rc::new(freeride::TileService::new(transport, &config));
    let mut session = freeride::RideSession::new(
        tiles,
        MemoryPreferences::default(),
        config.session.clone(),
    );

    let features = block_on(async {
        let start = freeride::Point::new(cli.start_lat, cli.start_lng);
        let options = session.select_start_position(Some(start)).await?;
        let mut features: Vec<Value> = options.iter().map(|o| feature(o, 0)).collect();

        for level in 1..=cli.depth {
            if session.apply_selected().is_err() {
                log::warn!("no options left after {} level(s)", level - 1);
                break;
            }

            let (options, lookahead) = session.get_next_options().await?;
            features.extend(options.iter().map(|o| feature(o, level)));
            lookahead.await;
        }

        Ok::<_, freeride::Error>(features)
    })?;

    let collection = json!({
        "type": "FeatureCollection",
        "features": features,
    });
    println!("{}", serde_json::to_string_pretty(&collection)?);

    Ok(())
}

fn feature(option: &RideOption, level: usize) -> Value {
    let coordinates: Vec<[f64; 2]> = option.path.iter().map(|p| [p.lng, p.lat]).collect();
    json!({
        "type": "Feature",
        "properties": {
            "level": level,
            "index": option.index,
            "way": option.way_id.to_string(),
            "label": option.label,
            "stroke": option.color,
            "heading_delta": option.heading_delta,
            "roundabout": option.roundabout,
        },
        "geometry": {
            "type": "LineString",
            "coordinates": coordinates,
        },
    })
}
