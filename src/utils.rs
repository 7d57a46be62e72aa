use std::f64::consts::PI;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::Path;

// https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames
// Same projection as the tile index formula, but kept fractional and scaled
// to pixels so a viewport can start in the middle of a tile.
pub fn lng_lat_to_world_pixel(lng: f64, lat: f64, zoom: u8, tile_size: u32) -> (f64, f64) {
    let n = f64::powi(2.0, zoom as i32) * tile_size as f64;
    let lat_rad = (lat / 180.0) * PI;
    let x = ((lng + 180.0) / 360.0) * n;
    let y = (1.0 - ((lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI)) / 2.0 * n;
    (x, y)
}

pub fn world_pixel_to_lng_lat(x: f64, y: f64, zoom: u8, tile_size: u32) -> (f64, f64) {
    let n = f64::powi(2.0, zoom as i32) * tile_size as f64;
    let lng = (x / n) * 360.0 - 180.0;
    let lat = (f64::atan(f64::sinh(PI * (1.0 - (2.0 * y) / n))) * 180.0) / PI;
    (lng, lat)
}

pub fn tiles_per_axis(zoom: u8) -> i64 {
    1_i64 << zoom
}

/// Writes into a uniquely named sibling temp file and renames it over
/// `path`, so readers never see a truncated file and concurrent writers of
/// the same target do not trip over each other. The temp file is removed on
/// failure.
pub fn write_file_atomically(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut prefix = OsString::from(".");
    prefix.push(path.file_name().unwrap_or_default());
    prefix.push(".");

    let mut file = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_float_eq::*;

    #[test]
    fn world_pixel_round_trip() {
        let (x, y) = lng_lat_to_world_pixel(4.3, 52.1, 14, 256);
        let (lng, lat) = world_pixel_to_lng_lat(x, y, 14, 256);
        assert_float_absolute_eq!(lng, 4.3, 1e-9);
        assert_float_absolute_eq!(lat, 52.1, 1e-9);
    }

    #[test]
    fn world_pixel_origin() {
        let (x, y) = lng_lat_to_world_pixel(0.0, 0.0, 1, 256);
        assert_float_absolute_eq!(x, 256.0, 1e-9);
        assert_float_absolute_eq!(y, 256.0, 1e-9);
        assert_eq!(tiles_per_axis(1), 2);
    }

    #[test]
    fn atomic_write_replaces_and_cleans_up() {
        let temp_dir = tempdir::TempDir::new("utils-atomic_write").unwrap();
        let path = temp_dir.path().join("20230615.geojson");
        write_file_atomically(&path, b"first").unwrap();
        write_file_atomically(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);

        let missing = temp_dir.path().join("missing/20230615.geojson");
        assert!(write_file_atomically(&missing, b"data").is_err());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }
}
