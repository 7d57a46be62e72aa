use anyhow::{Context, Result};
use geojson::{Feature, Value};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_circle_mut;

use crate::geojson_export::{
    MOVEMENT_LINE_WIDTH, MOVEMENT_STROKE_STYLE, PLACE_FILL_STYLE, PLACE_RADIUS,
};
use crate::renderer::utils::{
    image_to_png_data, parse_css_color, style_color, style_number, DEFAULT_BG_COLOR,
    DEFAULT_TILE_SIZE,
};
use crate::renderer::{ImageFormat, MapImageRenderer, RenderRequest, TileFetcher};
use crate::utils::{lng_lat_to_world_pixel, tiles_per_axis};

/// Stitches raster tiles around the requested center into one image and
/// draws the GeoJSON points and lines over it.
pub struct StaticMapRenderer<F: TileFetcher> {
    fetcher: F,
    tile_size: u32,
}

// pixel coordinates relative to the top left of the output image
type PixelPoint = (f64, f64);

struct Viewport {
    zoom: u8,
    tile_size: u32,
    left: f64,
    top: f64,
    width: u32,
    height: u32,
}

impl Viewport {
    fn new(request: &RenderRequest, tile_size: u32) -> Self {
        let (center_x, center_y) =
            lng_lat_to_world_pixel(request.lng, request.lat, request.zoom, tile_size);
        Viewport {
            zoom: request.zoom,
            tile_size,
            left: center_x - request.width as f64 / 2.0,
            top: center_y - request.height as f64 / 2.0,
            width: request.width,
            height: request.height,
        }
    }

    fn project(&self, position: &[f64]) -> Option<PixelPoint> {
        let (lon, lat) = (*position.first()?, *position.get(1)?);
        let (x, y) = lng_lat_to_world_pixel(lon, lat, self.zoom, self.tile_size);
        Some((x - self.left, y - self.top))
    }

    fn tile_range(&self, start: f64, length: u32) -> std::ops::RangeInclusive<i64> {
        let tile_size = self.tile_size as f64;
        let first = (start / tile_size).floor() as i64;
        let last = ((start + length as f64 - 1.0) / tile_size).floor() as i64;
        first..=last
    }
}

impl<F: TileFetcher> StaticMapRenderer<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_tile_size(fetcher, DEFAULT_TILE_SIZE)
    }

    pub fn with_tile_size(fetcher: F, tile_size: u32) -> Self {
        Self { fetcher, tile_size }
    }

    fn draw_base_map(&self, viewport: &Viewport, canvas: &mut RgbaImage) -> Result<()> {
        let n = tiles_per_axis(viewport.zoom);
        let tile_size = self.tile_size as f64;
        for tile_y in viewport.tile_range(viewport.top, viewport.height) {
            // nothing north or south of the world, leave the background
            if tile_y < 0 || tile_y >= n {
                continue;
            }
            for tile_x in viewport.tile_range(viewport.left, viewport.width) {
                let wrapped_x = tile_x.rem_euclid(n);
                let data = self
                    .fetcher
                    .fetch_tile(viewport.zoom, wrapped_x as u32, tile_y as u32)
                    .with_context(|| {
                        format!("fetching tile {}/{wrapped_x}/{tile_y}", viewport.zoom)
                    })?;
                let mut tile = image::load_from_memory(&data)
                    .with_context(|| {
                        format!("decoding tile {}/{wrapped_x}/{tile_y}", viewport.zoom)
                    })?
                    .to_rgba8();
                if tile.dimensions() != (self.tile_size, self.tile_size) {
                    tile = imageops::resize(&tile, self.tile_size, self.tile_size, FilterType::Triangle);
                }
                let offset_x = (tile_x as f64 * tile_size - viewport.left).round() as i64;
                let offset_y = (tile_y as f64 * tile_size - viewport.top).round() as i64;
                imageops::overlay(canvas, &tile, offset_x, offset_y);
            }
        }
        Ok(())
    }
}

impl<F: TileFetcher> MapImageRenderer for StaticMapRenderer<F> {
    fn render(&self, request: &RenderRequest) -> Result<Vec<u8>> {
        match request.format {
            ImageFormat::Png => {}
        }
        if request.width == 0 || request.height == 0 {
            bail!("empty image size {}x{}", request.width, request.height);
        }

        let viewport = Viewport::new(request, self.tile_size);
        let mut canvas = RgbaImage::from_pixel(request.width, request.height, DEFAULT_BG_COLOR);
        self.draw_base_map(&viewport, &mut canvas)?;

        // Shapes are painted opaque-per-pixel on their own layer so overlapping
        // stamps of one line do not stack up their alpha.
        let mut layer = RgbaImage::new(request.width, request.height);
        let features = &request.geojson.features;
        // lines below points
        for feature in features {
            if let Some(Value::LineString(line)) = feature.geometry.as_ref().map(|x| &x.value) {
                draw_line_feature(&mut layer, &viewport, feature, line);
            }
        }
        for feature in features {
            if let Some(Value::Point(point)) = feature.geometry.as_ref().map(|x| &x.value) {
                draw_point_feature(&mut layer, &viewport, feature, point);
            }
        }
        imageops::overlay(&mut canvas, &layer, 0, 0);

        image_to_png_data(&canvas)
    }
}

fn feature_style(feature: &Feature) -> Option<&serde_json::Value> {
    feature.properties.as_ref()?.get("style")
}

fn draw_point_feature(layer: &mut RgbaImage, viewport: &Viewport, feature: &Feature, point: &[f64]) {
    let Some(center) = viewport.project(point) else {
        return;
    };
    let style = feature_style(feature);
    let radius = style_number(style, "radius").unwrap_or(PLACE_RADIUS as f64);
    let color = style_color(style, "fillStyle").or_else(|| parse_css_color(PLACE_FILL_STYLE));
    if let Some(color) = color {
        stamp(layer, center, radius, color);
    }
}

fn draw_line_feature(
    layer: &mut RgbaImage,
    viewport: &Viewport,
    feature: &Feature,
    line: &[Vec<f64>],
) {
    let style = feature_style(feature);
    let width = style_number(style, "lineWidth")
        .or_else(|| MOVEMENT_LINE_WIDTH.parse().ok())
        .unwrap_or(1.0);
    let Some(color) =
        style_color(style, "strokeStyle").or_else(|| parse_css_color(MOVEMENT_STROKE_STYLE))
    else {
        return;
    };
    let points: Vec<PixelPoint> = line.iter().filter_map(|x| viewport.project(x)).collect();
    stroke_polyline(layer, &points, width, color);
}

fn stamp(layer: &mut RgbaImage, center: PixelPoint, radius: f64, color: Rgba<u8>) {
    let radius = radius.round().max(1.0);
    let (width, height) = (layer.width() as f64, layer.height() as f64);
    if center.0 < -radius
        || center.1 < -radius
        || center.0 > width + radius
        || center.1 > height + radius
    {
        return;
    }
    draw_filled_circle_mut(
        layer,
        (center.0.round() as i32, center.1.round() as i32),
        radius as i32,
        color,
    );
}

/// Strokes by stamping discs along each segment after clipping it to the
/// (slightly grown) image, so far away points cost nothing.
pub(crate) fn stroke_polyline(
    layer: &mut RgbaImage,
    points: &[PixelPoint],
    width: f64,
    color: Rgba<u8>,
) {
    let radius = (width / 2.0).max(0.5);
    let step = (radius / 2.0).max(0.5);
    let min = (-radius, -radius);
    let max = (layer.width() as f64 + radius, layer.height() as f64 + radius);

    if let [single] = points {
        stamp(layer, *single, radius, color);
        return;
    }
    for (p0, p1) in points.iter().zip(points.iter().skip(1)) {
        let Some((a, b)) = clip_segment(*p0, *p1, min, max) else {
            continue;
        };
        let length = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
        let steps = (length / step).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            stamp(layer, (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t), radius, color);
        }
    }
}

// Liang-Barsky
fn clip_segment(
    p0: PixelPoint,
    p1: PixelPoint,
    min: PixelPoint,
    max: PixelPoint,
) -> Option<(PixelPoint, PixelPoint)> {
    let (dx, dy) = (p1.0 - p0.0, p1.1 - p0.1);
    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;
    for (p, q) in [
        (-dx, p0.0 - min.0),
        (dx, max.0 - p0.0),
        (-dy, p0.1 - min.1),
        (dy, max.1 - p0.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
    }
    Some((
        (p0.0 + t0 * dx, p0.1 + t0 * dy),
        (p0.0 + t1 * dx, p0.1 + t1 * dy),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_inside_and_outside() {
        let min = (0.0, 0.0);
        let max = (100.0, 100.0);
        assert_eq!(
            clip_segment((10.0, 10.0), (20.0, 20.0), min, max),
            Some(((10.0, 10.0), (20.0, 20.0)))
        );
        assert_eq!(
            clip_segment((-50.0, 50.0), (150.0, 50.0), min, max),
            Some(((0.0, 50.0), (100.0, 50.0)))
        );
        assert_eq!(clip_segment((-50.0, -10.0), (150.0, -10.0), min, max), None);
    }

    #[test]
    fn stroke_covers_segment() {
        let mut layer = RgbaImage::new(50, 20);
        let color = Rgba([0, 0, 200, 128]);
        stroke_polyline(&mut layer, &[(5.0, 10.0), (45.0, 10.0)], 6.0, color);
        for x in 5..=45 {
            assert_eq!(*layer.get_pixel(x, 10), color);
        }
        assert_eq!(*layer.get_pixel(25, 0), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn stroke_far_away_segment_is_noop() {
        let mut layer = RgbaImage::new(10, 10);
        stroke_polyline(
            &mut layer,
            &[(-1.0e7, -1.0e7), (-1.0e7, 1.0e7)],
            6.0,
            Rgba([255, 0, 0, 255]),
        );
        assert!(layer.pixels().all(|p| p.0[3] == 0));
    }
}
