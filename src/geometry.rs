use crate::day::Location;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Location,
    pub max: Location,
}

impl BoundingBox {
    /// `[[min_lat, min_lon], [max_lat, max_lon]]`
    pub fn corners(&self) -> [[f64; 2]; 2] {
        [
            [self.min.lat, self.min.lon],
            [self.max.lat, self.max.lon],
        ]
    }
}

/// Min/max latitude and longitude tracked independently.
///
/// Both ends are seeded with infinities, so inputs lying entirely in the
/// negative quadrants get their real maxima instead of being clamped to 0.
/// Returns `None` for an empty input rather than a sentinel box.
pub fn bounding_box<I>(locations: I) -> Option<BoundingBox>
where
    I: IntoIterator<Item = Location>,
{
    let mut locations = locations.into_iter().peekable();
    locations.peek()?;

    let mut min = Location::new(f64::INFINITY, f64::INFINITY);
    let mut max = Location::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for location in locations {
        min.lat = min.lat.min(location.lat);
        min.lon = min.lon.min(location.lon);
        max.lat = max.lat.max(location.lat);
        max.lon = max.lon.max(location.lon);
    }
    Some(BoundingBox { min, max })
}

pub fn mid_location(bbox: &BoundingBox) -> Location {
    Location::new(
        bbox.min.lat + (bbox.max.lat - bbox.min.lat) / 2.0,
        bbox.min.lon + (bbox.max.lon - bbox.min.lon) / 2.0,
    )
}
