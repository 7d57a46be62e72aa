use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use itertools::Itertools;
use serde_json::json;

use crate::day::{Day, Location, Segment};
use crate::error::ExportError;
use crate::export_options::ExportOptions;
use crate::geometry::{bounding_box, mid_location};
use crate::renderer::{
    HttpTileFetcher, ImageFormat, MapImageRenderer, RenderRequest, StaticMapRenderer,
};
use crate::utils::write_file_atomically;

pub const PLACE_FILL_STYLE: &str = "rgb(200, 0, 0, 0.6)";
pub const PLACE_RADIUS: u32 = 10;
pub const MOVEMENT_LINE_WIDTH: &str = "6";
pub const MOVEMENT_STROKE_STYLE: &str = "rgba(0,0,200,0.5)";
pub const MOVEMENTS_KIND: &str = "movements";

pub const IMAGE_WIDTH: u32 = 800;
pub const IMAGE_HEIGHT: u32 = 600;

#[derive(Debug, Clone, PartialEq)]
pub struct ExporterHelp {
    pub name: &'static str,
    pub description: &'static str,
    pub options: Vec<(&'static str, &'static str)>,
}

/// What every day exporter offers to the host.
pub trait DayExporter {
    fn help(&self) -> &ExporterHelp;

    /// The output path for the day with this date.
    fn filename(&self, date: &str) -> PathBuf;

    /// Returns only once the main output file is completely written.
    fn export_day(&self, day: &Day) -> Result<ExportOutcome, ExportError>;
}

#[derive(Debug)]
pub enum ImageOutcome {
    Disabled,
    /// Nothing to center the map on.
    Skipped,
    Written(PathBuf),
    /// The GeoJSON file is still valid when this happens.
    Failed(ExportError),
}

#[derive(Debug)]
pub struct ExportOutcome {
    pub date: String,
    pub path: PathBuf,
    pub image: ImageOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceVisit {
    pub name: Option<String>,
    pub location: Location,
    pub start_time: Option<DateTime<FixedOffset>>,
    pub end_time: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovementPoint {
    pub location: Location,
    pub activity: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classified {
    pub places: Vec<PlaceVisit>,
    pub points: Vec<MovementPoint>,
}

impl Classified {
    pub fn locations(&self) -> impl Iterator<Item = Location> + '_ {
        self.places
            .iter()
            .map(|x| x.location)
            .chain(self.points.iter().map(|x| x.location))
    }
}

/// Single pass over the segments, keeping encounter order for both places
/// and movement points.
pub fn classify(segments: &[Segment]) -> Classified {
    let mut classified = Classified::default();
    for segment in segments {
        match segment {
            Segment::Place(place_segment) => classified.places.push(PlaceVisit {
                name: place_segment.place.name.clone(),
                location: place_segment.place.location,
                start_time: segment.start_time(),
                end_time: segment.end_time(),
            }),
            Segment::Move(move_segment) => {
                // a move without a usable activity list contributes nothing
                let Some(activities) = &move_segment.activities else {
                    continue;
                };
                for activity in activities {
                    for point in &activity.track_points {
                        classified.points.push(MovementPoint {
                            location: Location::new(point.lat, point.lon),
                            activity: activity.activity.clone(),
                        });
                    }
                }
            }
            Segment::Unknown => {}
        }
    }
    classified
}

// GeoJSON wants longitude first
fn position(location: &Location) -> Vec<f64> {
    vec![location.lon, location.lat]
}

fn feature(value: Value, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn place_feature(place: &PlaceVisit, options: &ExportOptions) -> Feature {
    let mut properties = JsonObject::new();
    if let Some(name) = &place.name {
        properties.insert("name".to_string(), json!(name));
    }
    if options.include_times {
        if let Some(start_time) = place.start_time {
            properties.insert("startTime".to_string(), json!(start_time.to_rfc3339()));
        }
        if let Some(end_time) = place.end_time {
            properties.insert("endTime".to_string(), json!(end_time.to_rfc3339()));
        }
    }
    if options.include_style {
        properties.insert(
            "style".to_string(),
            json!({ "fillStyle": PLACE_FILL_STYLE, "radius": PLACE_RADIUS }),
        );
    }
    feature(Value::Point(position(&place.location)), properties)
}

fn movements_feature(points: &[MovementPoint], options: &ExportOptions) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("kind".to_string(), json!(MOVEMENTS_KIND));
    if options.include_style {
        properties.insert(
            "style".to_string(),
            json!({ "lineWidth": MOVEMENT_LINE_WIDTH, "strokeStyle": MOVEMENT_STROKE_STYLE }),
        );
        let activities = points
            .iter()
            .filter_map(|x| x.activity.as_deref())
            .unique()
            .collect_vec();
        properties.insert("activities".to_string(), json!(activities));
    }
    let coordinates = points.iter().map(|x| position(&x.location)).collect_vec();
    feature(Value::LineString(coordinates), properties)
}

/// Places first in encounter order, then the movement line. The line is
/// emitted even when it has no coordinates.
pub fn build_feature_collection(
    date: &str,
    classified: &Classified,
    options: &ExportOptions,
) -> FeatureCollection {
    let mut features = Vec::new();
    if options.include_places {
        features.extend(classified.places.iter().map(|x| place_feature(x, options)));
    }
    if options.include_movements {
        features.push(movements_feature(&classified.points, options));
    }

    let mut foreign_members = JsonObject::new();
    foreign_members.insert("properties".to_string(), json!({ "date": date }));
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign_members),
    }
}

pub fn image_path_for(path: &Path) -> PathBuf {
    let mut image_path = OsString::from(path.as_os_str());
    image_path.push(".png");
    PathBuf::from(image_path)
}

pub struct GeoJsonExporter {
    options: ExportOptions,
    help: ExporterHelp,
    renderer: Option<Box<dyn MapImageRenderer>>,
}

impl GeoJsonExporter {
    /// Images are rendered from the configured provider's tile servers.
    pub fn new(options: ExportOptions) -> Result<Self> {
        options.validate()?;
        let renderer: Option<Box<dyn MapImageRenderer>> = if options.include_image {
            let fetcher = HttpTileFetcher::new(
                options.map_provider.tile_source(),
                Duration::from_secs(options.render_timeout_secs),
            );
            Some(Box::new(StaticMapRenderer::new(fetcher)))
        } else {
            None
        };
        Ok(Self::build(options, renderer))
    }

    pub fn with_renderer(
        options: ExportOptions,
        renderer: Box<dyn MapImageRenderer>,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self::build(options, Some(renderer)))
    }

    fn build(options: ExportOptions, renderer: Option<Box<dyn MapImageRenderer>>) -> Self {
        GeoJsonExporter {
            options,
            help: ExporterHelp {
                name: "GeoJsonExport",
                description: "Writes places and movements of a day as a GeoJSON FeatureCollection",
                options: vec![
                    ("outputFile", "File name format for output files, placeholders: %date%"),
                    ("includePlaces", "Add places as point features (default: true)"),
                    ("includeMovements", "Add movements as a line feature (default: true)"),
                    ("includeImage", "Write an additional map image file (default: false)"),
                    ("includeStyle", "Add style hints for canvas renderers (default: false)"),
                    ("includeTimes", "Add start and end times to places (default: false)"),
                    ("dateFormat", "Date format to use (default: YYYYMMDD)"),
                    ("zoomLevel", "The zoom level (0-18) for the map image (default: 14)"),
                    ("mapProvider", "The map source to use: either osm or mapquest (default: mapquest)"),
                    ("renderTimeoutSecs", "Timeout for map tile requests (default: 30)"),
                ],
            },
            renderer,
        }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    fn render_image(
        &self,
        renderer: &dyn MapImageRenderer,
        date: &str,
        classified: &Classified,
        collection: &FeatureCollection,
        path: &Path,
    ) -> ImageOutcome {
        let Some(bbox) = bounding_box(classified.locations()) else {
            info!("day {date} has no coordinates, skipping map image");
            return ImageOutcome::Skipped;
        };
        // TODO: derive the zoom from the bounding box instead of the fixed option
        let center = mid_location(&bbox);
        let request = RenderRequest {
            width: IMAGE_WIDTH,
            height: IMAGE_HEIGHT,
            zoom: self.options.zoom_level,
            lat: center.lat,
            lng: center.lon,
            format: ImageFormat::Png,
            geojson: collection,
        };

        let image_path = image_path_for(path);
        let result = renderer
            .render(&request)
            .map_err(ExportError::Render)
            .and_then(|png| {
                write_file_atomically(&image_path, &png).map_err(|source| ExportError::Write {
                    path: image_path.clone(),
                    source,
                })
            });
        match result {
            Ok(()) => {
                info!("map image for day {date} written to {}", image_path.display());
                ImageOutcome::Written(image_path)
            }
            Err(e) => {
                warn!("map image for day {date} failed: {e}");
                ImageOutcome::Failed(e)
            }
        }
    }
}

impl DayExporter for GeoJsonExporter {
    fn help(&self) -> &ExporterHelp {
        &self.help
    }

    fn filename(&self, date: &str) -> PathBuf {
        self.options.resolve_output_path(date)
    }

    fn export_day(&self, day: &Day) -> Result<ExportOutcome, ExportError> {
        let segments = day
            .segments
            .as_deref()
            .ok_or_else(|| ExportError::MissingSegments {
                date: day.date.clone(),
            })?;

        let classified = classify(segments);
        debug!(
            "day {}: {} segments, {} places, {} movement points",
            day.date,
            segments.len(),
            classified.places.len(),
            classified.points.len()
        );
        let collection = build_feature_collection(&day.date, &classified, &self.options);

        let path = self.filename(&day.date);
        let data = serde_json::to_vec(&collection).map_err(|e| ExportError::Write {
            path: path.clone(),
            source: e.into(),
        })?;
        write_file_atomically(&path, &data).map_err(|source| ExportError::Write {
            path: path.clone(),
            source,
        })?;
        info!("day {} exported to {}", day.date, path.display());

        let image = match &self.renderer {
            Some(renderer) if self.options.include_image => {
                self.render_image(renderer.as_ref(), &day.date, &classified, &collection, &path)
            }
            _ => ImageOutcome::Disabled,
        };

        Ok(ExportOutcome {
            date: day.date.clone(),
            path,
            image,
        })
    }
}
