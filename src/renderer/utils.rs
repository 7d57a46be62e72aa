use anyhow::Result;
use image::Rgba;
use image::RgbaImage;
use serde_json::Value;
use std::io::Cursor;

pub const DEFAULT_TILE_SIZE: u32 = 256;
pub const DEFAULT_BG_COLOR: Rgba<u8> = Rgba([221, 221, 221, 255]);

pub fn image_to_png_data(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut image_png: Vec<u8> = Vec::new();
    image.write_to(&mut Cursor::new(&mut image_png), image::ImageFormat::Png)?;
    Ok(image_png)
}

fn alpha_to_u8(alpha: f64) -> u8 {
    (alpha.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Understands `rgb(r, g, b)`, `rgba(r, g, b, a)` (also `rgb` with an alpha,
/// which canvas accepts), `#rrggbb` and `#rrggbbaa`.
pub fn parse_css_color(input: &str) -> Option<Rgba<u8>> {
    let input = input.trim();
    if let Some(hex) = input.strip_prefix('#') {
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        return match hex.len() {
            6 => Some(Rgba([channel(0)?, channel(2)?, channel(4)?, 255])),
            8 => Some(Rgba([channel(0)?, channel(2)?, channel(4)?, channel(6)?])),
            _ => None,
        };
    }

    let args = input
        .strip_prefix("rgba(")
        .or_else(|| input.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let mut rgba = [0, 0, 0, 255];
    for (i, part) in parts[..3].iter().enumerate() {
        rgba[i] = part.parse::<f64>().ok()?.clamp(0.0, 255.0).round() as u8;
    }
    if let Some(alpha) = parts.get(3) {
        rgba[3] = alpha_to_u8(alpha.parse().ok()?);
    }
    Some(Rgba(rgba))
}

/// Style values show up both as JSON numbers and as numeric strings.
pub fn style_number(style: Option<&Value>, key: &str) -> Option<f64> {
    match style?.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn style_color(style: Option<&Value>, key: &str) -> Option<Rgba<u8>> {
    style?.get(key)?.as_str().and_then(parse_css_color)
}
