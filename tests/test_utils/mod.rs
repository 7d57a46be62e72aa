#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use storyline_export::day::{Activity, Day, Location, MoveSegment, Place, PlaceSegment, Segment, TrackPoint};
use storyline_export::export_options::ExportOptions;
use storyline_export::renderer::{MapImageRenderer, RenderRequest};

pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nnot really";

pub fn load_fixture_day() -> Day {
    Day::from_json(&fs::read_to_string("./tests/data/storyline_20230615.json").unwrap()).unwrap()
}

pub fn place(name: &str, lat: f64, lon: f64) -> Segment {
    Segment::Place(PlaceSegment {
        start_time: None,
        end_time: None,
        place: Place {
            name: Some(name.to_string()),
            location: Location::new(lat, lon),
        },
    })
}

pub fn movement(activities: Vec<(&str, Vec<(f64, f64)>)>) -> Segment {
    Segment::Move(MoveSegment {
        start_time: None,
        end_time: None,
        activities: Some(
            activities
                .into_iter()
                .map(|(activity, points)| Activity {
                    activity: Some(activity.to_string()),
                    track_points: points
                        .into_iter()
                        .map(|(lat, lon)| TrackPoint {
                            lat,
                            lon,
                            time: None,
                        })
                        .collect(),
                })
                .collect(),
        ),
    })
}

pub fn options_in(dir: &Path) -> ExportOptions {
    ExportOptions {
        output_file: dir.join("%date%.geojson").to_string_lossy().into_owned(),
        ..ExportOptions::default()
    }
}

pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|x| x.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub width: u32,
    pub height: u32,
    pub zoom: u8,
    pub lat: f64,
    pub lng: f64,
    pub feature_count: usize,
}

/// Stands in for the tile rendering service.
pub struct FakeRenderer {
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
    pub fail: bool,
}

impl FakeRenderer {
    pub fn new(fail: bool) -> (Self, Arc<Mutex<Vec<RecordedRequest>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        (
            FakeRenderer {
                requests: requests.clone(),
                fail,
            },
            requests,
        )
    }
}

impl MapImageRenderer for FakeRenderer {
    fn render(&self, request: &RenderRequest) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(RecordedRequest {
            width: request.width,
            height: request.height,
            zoom: request.zoom,
            lat: request.lat,
            lng: request.lng,
            feature_count: request.geojson.features.len(),
        });
        if self.fail {
            anyhow::bail!("tile server unavailable");
        }
        Ok(FAKE_PNG.to_vec())
    }
}
