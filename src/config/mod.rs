pub mod toml_config;

pub use toml_config::{GeocodingConfig, SceneConfig};

#[cfg(feature = "cli")]
use crate::domain::model::ProviderId;
#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Parser)]
#[command(name = "overlay-sync")]
#[command(about = "Render map overlay scenes and query the geocoder")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Mount a scene on a headless map and print the native objects.
    Render {
        scene: PathBuf,

        #[arg(long, help = "Render for this provider instead of the scene's")]
        provider: Option<ProviderId>,

        #[arg(long, help = "Print the result as JSON")]
        json: bool,
    },

    /// Forward-geocode an address.
    Geocode {
        address: String,

        #[command(flatten)]
        geocoder: GeocoderArgs,
    },

    /// Reverse-geocode a coordinate.
    #[command(allow_negative_numbers = true)]
    Reverse {
        lat: f64,

        lng: f64,

        #[command(flatten)]
        geocoder: GeocoderArgs,
    },
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct GeocoderArgs {
    #[arg(long, help = "Scene file whose [geocoding] section to use")]
    pub scene: Option<PathBuf>,

    #[arg(long, help = "Geocoder endpoint URL")]
    pub endpoint: Option<String>,

    #[arg(long, help = "API key; defaults to $YANDEX_MAPS_API_KEY")]
    pub api_key: Option<String>,

    #[arg(long, default_value = "yandex")]
    pub provider: ProviderId,
}
