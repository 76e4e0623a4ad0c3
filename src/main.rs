use anyhow::Context;
use clap::Parser;
use overlay_sync::adapters::headless::HeadlessObject;
use overlay_sync::domain::native::NativeObject;
use overlay_sync::utils::error::ErrorSeverity;
use overlay_sync::utils::logger::{self, LogFormat};
use overlay_sync::{
    Cli, Command, GeoError, GeoObject, Geocoder, GeocoderArgs, GeocodingConfig, HeadlessMap, HttpGeocoder, MapSession,
    MapView, Point, ProviderId, ReconcileReport, SceneConfig,
};
use serde::Serialize;
use std::path::Path;
use std::rc::Rc;

#[derive(Serialize)]
struct RenderOutput {
    provider: ProviderId,
    view: MapView,
    markers: ReconcileReport,
    zones: ReconcileReport,
    objects: Vec<RenderedObject>,
}

#[derive(Serialize)]
struct RenderedObject {
    object: NativeObject,
    #[serde(flatten)]
    native: HeadlessObject,
}

fn render(scene_path: &Path, provider: Option<ProviderId>, json: bool) -> anyhow::Result<()> {
    let mut scene = SceneConfig::from_file(scene_path)
        .with_context(|| format!("failed to load scene {}", scene_path.display()))?;
    if let Some(provider) = provider {
        scene = scene.for_provider(provider);
    }
    scene.validate_config()?;

    let provider = scene.provider();
    tracing::info!("🗺️  Rendering {} on {}", scene_path.display(), provider);

    let mut session = MapSession::with_default_adapters(
        provider,
        scene.circle_segments(),
        Rc::new(|id, p| tracing::info!("Marker {} moved to ({}, {})", id, p.lat, p.lng)),
        Rc::new(|id, _| tracing::info!("Zone {} edited", id)),
    );
    session.set_view(scene.view())?;
    let markers = session.sync_markers(&scene.markers())?;
    let zones = session.sync_zones(&scene.zones())?;

    let map = HeadlessMap::shared(provider);
    let replay = session.map_ready(map.clone())?;
    let output = RenderOutput {
        provider,
        view: session.view(),
        markers: replay.markers.unwrap_or(markers),
        zones: replay.zones.unwrap_or(zones),
        objects: map
            .live_objects()
            .into_iter()
            .map(|(object, native)| RenderedObject { object, native })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output).map_err(GeoError::from)?);
        return Ok(());
    }

    println!("Provider: {}", output.provider);
    if let Some(center) = output.view.center {
        println!("Center: ({}, {})", center.lat, center.lng);
    }
    if let Some(zoom) = output.view.zoom {
        println!("Zoom: {}", zoom);
    }
    for (label, report) in [("markers", &output.markers), ("zones", &output.zones)] {
        println!(
            "{}: {} mounted, {} failed, {} capability gap(s), {} skipped for other providers",
            label,
            report.mounted.len(),
            report.failed.len(),
            report.capability_gaps.len(),
            report.skipped_foreign.len()
        );
        for failure in &report.failed {
            println!("  ✗ {}: {}", failure.id, failure.reason);
        }
    }
    for object in &output.objects {
        let props: serde_json::Map<String, serde_json::Value> = object.native.props.clone().into_iter().collect();
        println!("#{} {} {}", object.object.raw(), object.native.class, serde_json::Value::Object(props));
    }
    Ok(())
}

fn geocoder(args: &GeocoderArgs) -> anyhow::Result<HttpGeocoder> {
    let mut config = match &args.scene {
        Some(path) => {
            SceneConfig::from_file(path)
                .with_context(|| format!("failed to load scene {}", path.display()))?
                .geocoding
        }
        None => GeocodingConfig::default(),
    };
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(key) = &args.api_key {
        config.api_key = Some(key.clone());
    }
    if config.api_key.is_none() {
        config.api_key = std::env::var("YANDEX_MAPS_API_KEY").ok();
    }
    overlay_sync::utils::validation::validate_url("geocoding.endpoint", &config.endpoint)?;
    Ok(HttpGeocoder::from_config(&config))
}

fn print_results(results: &[GeoObject]) {
    if results.is_empty() {
        println!("No results");
        return;
    }
    for result in results {
        println!("{:.6}, {:.6}  {}", result.coords.lat, result.coords.lng, result.text);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Render { scene, provider, json } => render(&scene, provider, json),
        Command::Geocode { address, geocoder: args } => {
            let results = geocoder(&args)?.geocode(args.provider, &address).await;
            print_results(&results);
            Ok(())
        }
        Command::Reverse { lat, lng, geocoder: args } => {
            let point = Point::new(lat, lng);
            overlay_sync::utils::validation::validate_point("position", point)?;
            let results = geocoder(&args)?.reverse_geocode(args.provider, point).await;
            print_results(&results);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logger::init_logger(LogFormat::from_flag(cli.json_logs), cli.verbose);

    if let Err(e) = run(cli).await {
        let Some(geo) = e.downcast_ref::<GeoError>() else {
            return Err(e);
        };
        tracing::error!("❌ {:#} (Severity: {:?})", e, geo.severity());
        tracing::error!("💡 Recovery suggestion: {}", geo.recovery_suggestion());
        eprintln!("❌ {}", geo.user_friendly_message());

        let exit_code = match geo.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}
