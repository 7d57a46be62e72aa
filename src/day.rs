use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// e.g. `20230615T083000+0200`
const MOVES_TIME_FORMAT: &str = "%Y%m%dT%H%M%S%z";

pub fn parse_moves_time(input: &str) -> Option<DateTime<FixedOffset>> {
    let input = input.trim();
    // Moves writes `Z` for UTC, which `%z` does not accept.
    match input.strip_suffix('Z') {
        Some(utc) => DateTime::parse_from_str(&format!("{utc}+0000"), MOVES_TIME_FORMAT).ok(),
        None => DateTime::parse_from_str(input, MOVES_TIME_FORMAT).ok(),
    }
}

/// One day of the storyline, as handed over by whoever fetched it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Day {
    pub date: String,
    /// `None` when the upstream record carries no segment list at all.
    #[serde(default, deserialize_with = "deserialize_segments")]
    pub segments: Option<Vec<Segment>>,
}

impl Day {
    pub fn new(date: impl Into<String>, segments: Option<Vec<Segment>>) -> Self {
        Day {
            date: date.into(),
            segments,
        }
    }

    /// Accepts a single day object or the one-element array the Moves API
    /// returns for a daily storyline request.
    pub fn from_json(json: &str) -> Result<Day> {
        match serde_json::from_str::<Value>(json)? {
            Value::Array(mut days) => {
                if days.len() != 1 {
                    bail!("expected exactly one day, got {}", days.len());
                }
                Ok(serde_json::from_value(days.remove(0))?)
            }
            value => Ok(serde_json::from_value(value)?),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub fn new(lat: f64, lon: f64) -> Self {
        Location { lat, lon }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Place {
    #[serde(default)]
    pub name: Option<String>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// e.g. "walking", "cycling", "transport"
    #[serde(default)]
    pub activity: Option<String>,
    #[serde(default)]
    pub track_points: Vec<TrackPoint>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceSegment {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    pub place: Place,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveSegment {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    /// `None` when the record has no usable activity list.
    #[serde(default, deserialize_with = "deserialize_activities")]
    pub activities: Option<Vec<Activity>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Segment {
    Place(PlaceSegment),
    Move(MoveSegment),
    #[serde(other)]
    Unknown,
}

impl Segment {
    fn from_value(value: Value) -> Segment {
        match serde_json::from_value(value) {
            Ok(segment) => segment,
            Err(e) => {
                debug!("ignoring malformed segment: {e}");
                Segment::Unknown
            }
        }
    }

    fn raw_times(&self) -> (Option<&str>, Option<&str>) {
        match self {
            Segment::Place(s) => (s.start_time.as_deref(), s.end_time.as_deref()),
            Segment::Move(s) => (s.start_time.as_deref(), s.end_time.as_deref()),
            Segment::Unknown => (None, None),
        }
    }

    pub fn start_time(&self) -> Option<DateTime<FixedOffset>> {
        self.raw_times().0.and_then(parse_moves_time)
    }

    pub fn end_time(&self) -> Option<DateTime<FixedOffset>> {
        self.raw_times().1.and_then(parse_moves_time)
    }
}

fn deserialize_segments<'de, D>(deserializer: D) -> Result<Option<Vec<Segment>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    Ok(raw.map(|values| values.into_iter().map(Segment::from_value).collect()))
}

fn deserialize_activities<'de, D>(deserializer: D) -> Result<Option<Vec<Activity>>, D::Error>
where
    D: Deserializer<'de>,
{
    let activities = match Value::deserialize(deserializer)? {
        Value::Array(values) => values
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<Activity>(value) {
                Ok(activity) => Some(activity),
                Err(e) => {
                    debug!("ignoring malformed activity: {e}");
                    None
                }
            })
            .collect(),
        _ => return Ok(None),
    };
    Ok(Some(activities))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_time() {
        let t = parse_moves_time("20230615T083000+0200").unwrap();
        assert_eq!(t.to_rfc3339(), "2023-06-15T08:30:00+02:00");
        let t = parse_moves_time("20230615T083000Z").unwrap();
        assert_eq!(t.to_rfc3339(), "2023-06-15T08:30:00+00:00");
        assert!(parse_moves_time("yesterday").is_none());
    }

    #[test]
    fn unknown_and_malformed_segments() {
        let day: Day = serde_json::from_str(
            r#"{"date": "20230615", "segments": [
                {"type": "off", "startTime": "20230615T000000Z"},
                {"type": "place", "place": {"name": "no location"}},
                {"type": "move", "activities": "nope"},
                {"type": "move", "activities": [{"activity": "walking", "trackPoints": [{"lat": 1, "lon": 2}]}, 7]}
            ]}"#,
        )
        .unwrap();
        let segments = day.segments.unwrap();
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0], Segment::Unknown);
        assert_eq!(segments[1], Segment::Unknown);
        match &segments[2] {
            Segment::Move(m) => assert!(m.activities.is_none()),
            other => panic!("unexpected segment {other:?}"),
        }
        match &segments[3] {
            Segment::Move(m) => {
                let activities = m.activities.as_ref().unwrap();
                assert_eq!(activities.len(), 1);
                assert_eq!(activities[0].activity.as_deref(), Some("walking"));
                assert_eq!(activities[0].track_points.len(), 1);
            }
            other => panic!("unexpected segment {other:?}"),
        }
    }

    #[test]
    fn missing_segments() {
        let day: Day = serde_json::from_str(r#"{"date": "20230615"}"#).unwrap();
        assert!(day.segments.is_none());
        let day: Day = serde_json::from_str(r#"{"date": "20230615", "segments": null}"#).unwrap();
        assert!(day.segments.is_none());
    }

    #[test]
    fn from_json_accepts_moves_array() {
        let day = Day::from_json(r#"[{"date": "20230615", "segments": []}]"#).unwrap();
        assert_eq!(day.date, "20230615");
        assert!(Day::from_json("[]").is_err());
    }
}
