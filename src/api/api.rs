use std::sync::OnceLock;

use anyhow::Result;

use crate::day::Day;
use crate::export_options::ExportOptions;
use crate::geojson_export::{DayExporter, ExporterHelp, GeoJsonExporter, ImageOutcome};
use crate::logs;

static LOGGING: OnceLock<()> = OnceLock::new();

pub fn init(log_dir: String) {
    let mut already_initialized = true;
    LOGGING.get_or_init(|| {
        already_initialized = false;
        match logs::init(&log_dir) {
            Ok(()) => info!("initialized"),
            // someone else (e.g. a test harness) owns the global logger
            Err(e) => eprintln!("logging not initialized: {e:#}"),
        }
    });
    if already_initialized {
        warn!("`init` is called multiple times");
    }
}

pub fn describe() -> Result<ExporterHelp> {
    Ok(GeoJsonExporter::new(ExportOptions::default())?
        .help()
        .clone())
}

/// Exports one day given as Moves storyline JSON. `options_json` may be empty
/// to use the defaults. Returns the day's date once the GeoJSON file is on
/// disk; map image problems are only logged.
pub fn export_day(day_json: &str, options_json: &str) -> Result<String> {
    let options = if options_json.trim().is_empty() {
        ExportOptions::default()
    } else {
        ExportOptions::from_json(options_json)?
    };
    let day = Day::from_json(day_json)?;
    let exporter = GeoJsonExporter::new(options)?;
    let outcome = exporter.export_day(&day)?;
    if let ImageOutcome::Failed(e) = &outcome.image {
        warn!("day {} exported without map image: {e}", outcome.date);
    }
    Ok(outcome.date)
}
