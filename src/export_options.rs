use std::fmt::Write;
use std::path::PathBuf;

use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::map_provider::MapProvider;

pub const DATE_PLACEHOLDER: &str = "%date%";
pub const MAX_ZOOM_LEVEL: u8 = 18;

// Formats `Day::date` may come in. Moves uses the compact one.
const DAY_DATE_FORMATS: &[&str] = &["%Y%m%d", "%Y-%m-%d"];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawExportOptions")]
pub struct ExportOptions {
    /// Output path template, `%date%` is the only placeholder.
    pub output_file: String,
    pub include_places: bool,
    pub include_movements: bool,
    pub include_image: bool,
    /// Adds `style` properties understood by canvas-based renderers.
    pub include_style: bool,
    /// Adds `startTime`/`endTime` to place features.
    pub include_times: bool,
    /// Moment-style tokens, e.g. `YYYYMMDD` or `YYYY-MM-DD`.
    pub date_format: String,
    pub zoom_level: u8,
    pub map_provider: MapProvider,
    pub render_timeout_secs: u64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            output_file: format!("{DATE_PLACEHOLDER}.geojson"),
            include_places: true,
            include_movements: true,
            include_image: false,
            include_style: false,
            include_times: false,
            date_format: "YYYYMMDD".to_string(),
            zoom_level: 14,
            map_provider: MapProvider::MapQuest,
            render_timeout_secs: 30,
        }
    }
}

// Both option spellings seen in the wild are accepted. The `include*` keys
// win over the legacy `remove*`/`image` ones when both are given.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExportOptions {
    output_file: Option<String>,
    include_places: Option<bool>,
    remove_places: Option<bool>,
    include_movements: Option<bool>,
    remove_movements: Option<bool>,
    include_image: Option<bool>,
    image: Option<bool>,
    include_style: Option<bool>,
    include_times: Option<bool>,
    date_format: Option<String>,
    zoom_level: Option<u8>,
    map_provider: Option<MapProvider>,
    render_timeout_secs: Option<u64>,
}

impl From<RawExportOptions> for ExportOptions {
    fn from(raw: RawExportOptions) -> Self {
        let default = ExportOptions::default();
        ExportOptions {
            output_file: raw.output_file.unwrap_or(default.output_file),
            include_places: raw
                .include_places
                .or(raw.remove_places.map(|x| !x))
                .unwrap_or(default.include_places),
            include_movements: raw
                .include_movements
                .or(raw.remove_movements.map(|x| !x))
                .unwrap_or(default.include_movements),
            include_image: raw
                .include_image
                .or(raw.image)
                .unwrap_or(default.include_image),
            include_style: raw.include_style.unwrap_or(default.include_style),
            include_times: raw.include_times.unwrap_or(default.include_times),
            date_format: raw.date_format.unwrap_or(default.date_format),
            zoom_level: raw.zoom_level.unwrap_or(default.zoom_level),
            map_provider: raw.map_provider.unwrap_or(default.map_provider),
            render_timeout_secs: raw
                .render_timeout_secs
                .unwrap_or(default.render_timeout_secs),
        }
    }
}

impl ExportOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.output_file.is_empty() {
            bail!("`outputFile` must not be empty");
        }
        if self.zoom_level > MAX_ZOOM_LEVEL {
            bail!(
                "`zoomLevel` must be between 0 and {MAX_ZOOM_LEVEL}, got {}",
                self.zoom_level
            );
        }
        if self.include_image {
            let source = self.map_provider.tile_source();
            if self.zoom_level < source.min_zoom || self.zoom_level > source.max_zoom {
                bail!(
                    "`zoomLevel` {} is not served by {}",
                    self.zoom_level,
                    source.name
                );
            }
        }
        Ok(())
    }

    /// Formats a day's date for the filename. Dates that cannot be parsed are
    /// used as they are.
    pub fn format_date(&self, date: &str) -> String {
        let parsed = DAY_DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(date, fmt).ok());
        let Some(parsed) = parsed else {
            warn!("cannot parse day date {date:?}, using it verbatim");
            return date.to_owned();
        };

        let chrono_format = moment_to_chrono_format(&self.date_format);
        let mut formatted = String::new();
        // time tokens render as midnight
        match write!(
            formatted,
            "{}",
            parsed.and_time(NaiveTime::MIN).format(&chrono_format)
        ) {
            Ok(()) => formatted,
            Err(_) => {
                warn!(
                    "date format {:?} is not usable, using {date:?} verbatim",
                    self.date_format
                );
                date.to_owned()
            }
        }
    }

    pub fn resolve_output_path(&self, date: &str) -> PathBuf {
        PathBuf::from(
            self.output_file
                .replace(DATE_PLACEHOLDER, &self.format_date(date)),
        )
    }
}

/// Translates moment.js style tokens into a `chrono` strftime string.
/// Text in `[brackets]` and anything that is not a token is kept literally.
pub fn moment_to_chrono_format(format: &str) -> String {
    // longer tokens first so `YYYY` is not read as `YY` twice
    const TOKENS: &[(&str, &str)] = &[
        ("YYYY", "%Y"),
        ("YY", "%y"),
        ("MMMM", "%B"),
        ("MMM", "%b"),
        ("MM", "%m"),
        ("M", "%-m"),
        ("DDDD", "%j"),
        ("DD", "%d"),
        ("D", "%-d"),
        ("dddd", "%A"),
        ("ddd", "%a"),
        ("HH", "%H"),
        ("H", "%-H"),
        ("hh", "%I"),
        ("h", "%-I"),
        ("mm", "%M"),
        ("ss", "%S"),
        ("A", "%p"),
    ];

    let mut out = String::with_capacity(format.len() * 2);
    let mut rest = format;
    'outer: while let Some(c) = rest.chars().next() {
        if c == '[' {
            if let Some(end) = rest.find(']') {
                push_literal(&mut out, &rest[1..end]);
                rest = &rest[end + 1..];
                continue;
            }
        }
        for (token, spec) in TOKENS {
            if let Some(remaining) = rest.strip_prefix(token) {
                out.push_str(spec);
                rest = remaining;
                continue 'outer;
            }
        }
        push_literal(&mut out, &rest[..c.len_utf8()]);
        rest = &rest[c.len_utf8()..];
    }
    out
}

fn push_literal(out: &mut String, literal: &str) {
    out.push_str(&literal.replace('%', "%%"));
}
