use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose;
use image::{Rgba, RgbaImage, imageops};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut, draw_polygon_mut,
};
use imageproc::point::Point;
use imageproc::rect::Rect;
use qrcode::{EcLevel, QrCode};
use tracing::debug;

use crate::error::Error;
use crate::logo::{self, Logo};

/// Edge length of the finished image in pixels.
pub const QR_SIZE: u32 = 256;

/// Quiet zone around the symbol, in modules.
const QUIET_ZONE_MODULES: u32 = 1;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BADGE_OUTLINE: Rgba<u8> = Rgba([51, 51, 51, 255]);

/// Label drawn on the default badge.
const MARK_LABEL: &str = "NTU";

// Badge sizing relative to the image edge. The default mark takes a quarter
// of the width with a 6 px clearance ring; custom logos get 30% and 5 px.
// Both occlusions stay far below what EC level H can recover.
const MARK_DIAMETER_FACTOR: f32 = 0.25;
const MARK_CLEAR_PADDING: i32 = 6;
const CUSTOM_DIAMETER_FACTOR: f32 = 0.30;
const CUSTOM_CLEAR_PADDING: i32 = 5;

/// Label height relative to the badge diameter.
const MARK_FONT_FACTOR: f32 = 0.35;

/// Rendering knobs for one code. The background is always white; scanner
/// contrast comes from the foreground alone.
#[derive(Debug, Clone)]
pub struct QrStyle {
    pub foreground: Rgba<u8>,
    pub logo: Logo,
}

impl Default for QrStyle {
    fn default() -> Self {
        QrStyle {
            foreground: Rgba([0, 0, 0, 255]),
            logo: Logo::Mark,
        }
    }
}

/// Render `payload` as a 256 × 256 QR code with the styled center badge.
///
/// The payload is embedded exactly as given; link normalization happens
/// before this point. On any failure the whole image is abandoned, never
/// emitted half-drawn.
pub fn compose(payload: &str, style: &QrStyle) -> Result<RgbaImage, Error> {
    let mut canvas = render_symbol(payload, style.foreground)?;

    let (factor, padding) = match style.logo {
        Logo::Mark => (MARK_DIAMETER_FACTOR, MARK_CLEAR_PADDING),
        Logo::Custom(_) => (CUSTOM_DIAMETER_FACTOR, CUSTOM_CLEAR_PADDING),
    };
    let diameter = (QR_SIZE as f32 * factor) as i32;
    let center = (QR_SIZE as i32 / 2, QR_SIZE as i32 / 2);

    // Punch the clear zone first: a background circle slightly wider than
    // the badge, so modules never touch the artwork.
    draw_filled_circle_mut(&mut canvas, center, diameter / 2 + padding, BACKGROUND);

    match &style.logo {
        Logo::Mark => draw_mark(&mut canvas, center, diameter, style.foreground),
        Logo::Custom(bytes) => {
            let artwork = logo::rasterize(bytes, diameter as u32)?;
            overlay_clipped(&mut canvas, artwork, diameter);
        }
    }

    Ok(canvas)
}

/// Serialize a composited image to PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, Error> {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| Error::EncodingFailed(e.to_string()))?;
    Ok(png)
}

/// The browser-friendly form of the finished PNG.
pub fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(png))
}

/// Encode the payload at EC level H and paint it one pixel per module,
/// quiet zone included, then blow it up to the output size. Nearest keeps
/// module edges crisp whatever the symbol version turns out to be.
fn render_symbol(payload: &str, foreground: Rgba<u8>) -> Result<RgbaImage, Error> {
    let code = QrCode::with_error_correction_level(payload, EcLevel::H)
        .map_err(|e| Error::EncodingFailed(e.to_string()))?;

    let modules = code.to_colors();
    let width = code.width() as u32;
    let side = width + 2 * QUIET_ZONE_MODULES;
    debug!(modules = width, "encoded payload");

    let mut symbol = RgbaImage::from_pixel(side, side, BACKGROUND);
    for (index, module) in modules.iter().enumerate() {
        if *module == qrcode::Color::Dark {
            let x = QUIET_ZONE_MODULES + index as u32 % width;
            let y = QUIET_ZONE_MODULES + index as u32 / width;
            symbol.put_pixel(x, y, foreground);
        }
    }

    Ok(imageops::resize(
        &symbol,
        QR_SIZE,
        QR_SIZE,
        imageops::FilterType::Nearest,
    ))
}

/// The default badge: white disc, thin outline, the label on top.
fn draw_mark(canvas: &mut RgbaImage, center: (i32, i32), diameter: i32, foreground: Rgba<u8>) {
    draw_filled_circle_mut(canvas, center, diameter / 2, BACKGROUND);
    draw_hollow_circle_mut(canvas, center, diameter / 2, BADGE_OUTLINE);
    draw_label(
        canvas,
        MARK_LABEL,
        center,
        diameter as f32 * MARK_FONT_FACTOR,
        foreground,
    );
}

/// Zero out alpha outside the inscribed circle and alpha-composite what is
/// left over the center of the canvas.
fn overlay_clipped(canvas: &mut RgbaImage, mut artwork: RgbaImage, diameter: i32) {
    let radius = artwork.width() as f32 / 2.0;
    for (x, y, pixel) in artwork.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - radius;
        let dy = y as f32 + 0.5 - radius;
        if dx * dx + dy * dy > radius * radius {
            pixel.0[3] = 0;
        }
    }

    let corner = i64::from((QR_SIZE as i32 - diameter) / 2);
    imageops::overlay(canvas, &artwork, corner, corner);
}

// The label is stroked from the tables below instead of a bundled font:
// axis-aligned bars plus one parallelogram per glyph, in a unit box with y
// growing downward. The raster is identical on every platform.
enum Stroke {
    Bar { x: f32, y: f32, w: f32, h: f32 },
    Slant { top: (f32, f32), bottom: (f32, f32), w: f32 },
}

const GLYPH_N: &[Stroke] = &[
    Stroke::Bar { x: 0.0, y: 0.0, w: 0.2, h: 1.0 },
    Stroke::Bar { x: 0.8, y: 0.0, w: 0.2, h: 1.0 },
    Stroke::Slant { top: (0.0, 0.0), bottom: (0.8, 1.0), w: 0.2 },
];

const GLYPH_T: &[Stroke] = &[
    Stroke::Bar { x: 0.0, y: 0.0, w: 1.0, h: 0.2 },
    Stroke::Bar { x: 0.4, y: 0.0, w: 0.2, h: 1.0 },
];

const GLYPH_U: &[Stroke] = &[
    Stroke::Bar { x: 0.0, y: 0.0, w: 0.2, h: 0.9 },
    Stroke::Bar { x: 0.8, y: 0.0, w: 0.2, h: 0.9 },
    Stroke::Bar { x: 0.0, y: 0.8, w: 1.0, h: 0.2 },
];

fn glyph(letter: char) -> Option<&'static [Stroke]> {
    match letter {
        'N' => Some(GLYPH_N),
        'T' => Some(GLYPH_T),
        'U' => Some(GLYPH_U),
        _ => None,
    }
}

/// Center `text` on `center`, sized so the cap height reads as bold text at
/// `font_px`. Letters without a stroke table still advance the pen.
fn draw_label(canvas: &mut RgbaImage, text: &str, center: (i32, i32), font_px: f32, color: Rgba<u8>) {
    let count = text.chars().count() as f32;
    if count == 0.0 {
        return;
    }

    // Proportions of a bold geometric sans: cap height, advance and
    // letter-spacing as fractions of the font size.
    let cap = font_px * 0.72;
    let advance = font_px * 0.62;
    let gap = font_px * 0.16;

    let total = advance * count + gap * (count - 1.0);
    let mut left = center.0 as f32 - total / 2.0;
    let top = center.1 as f32 - cap / 2.0;

    for letter in text.chars() {
        if let Some(strokes) = glyph(letter) {
            for stroke in strokes {
                draw_stroke(canvas, stroke, (left, top), (advance, cap), color);
            }
        }
        left += advance + gap;
    }
}

fn draw_stroke(
    canvas: &mut RgbaImage,
    stroke: &Stroke,
    origin: (f32, f32),
    scale: (f32, f32),
    color: Rgba<u8>,
) {
    match stroke {
        Stroke::Bar { x, y, w, h } => {
            let left = (origin.0 + x * scale.0).round() as i32;
            let top = (origin.1 + y * scale.1).round() as i32;
            let width = ((w * scale.0).round() as u32).max(1);
            let height = ((h * scale.1).round() as u32).max(1);
            draw_filled_rect_mut(canvas, Rect::at(left, top).of_size(width, height), color);
        }
        Stroke::Slant { top, bottom, w } => {
            let band = (w * scale.0).round().max(1.0);
            let points = [
                point_at(origin, scale, top.0, top.1),
                point_at(origin, scale, top.0 + band / scale.0, top.1),
                point_at(origin, scale, bottom.0 + band / scale.0, bottom.1),
                point_at(origin, scale, bottom.0, bottom.1),
            ];
            draw_polygon_mut(canvas, &points, color);
        }
    }
}

fn point_at(origin: (f32, f32), scale: (f32, f32), x: f32, y: f32) -> Point<i32> {
    Point::new(
        (origin.0 + x * scale.0).round() as i32,
        (origin.1 + y * scale.1).round() as i32,
    )
}
