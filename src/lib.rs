pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{Cli, Command, GeocoderArgs};

pub use adapters::geocode::HttpGeocoder;
pub use adapters::headless::HeadlessMap;
pub use config::{GeocodingConfig, SceneConfig};
pub use core::{MapContext, MapSession, MarkerEngine, ReconcileReport, ZoneEngine};
pub use domain::model::{
    GeoObject, MapView, MarkerDescriptor, Point, ProviderId, ZoneDescriptor, ZoneKind, ZoneShape,
};
pub use domain::ports::{Geocoder, NativeMap};
pub use utils::error::{GeoError, Result};
