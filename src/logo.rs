use image::{RgbaImage, imageops};
use resvg::{tiny_skia, usvg};
use tracing::debug;

use crate::error::Error;

/// Hard cap on uploaded artwork. Anything at or past this is refused before
/// a single byte is decoded.
pub const MAX_LOGO_BYTES: usize = 1_048_576;

/// What goes in the middle of the code.
#[derive(Debug, Clone, Default)]
pub enum Logo {
    /// The built-in badge: a white circle with the "NTU" mark.
    #[default]
    Mark,
    /// Caller-supplied PNG, JPEG, GIF or SVG, clipped to a circle.
    Custom(Vec<u8>),
}

impl Logo {
    /// Accept caller artwork, enforcing the size cap up front.
    pub fn custom(bytes: Vec<u8>) -> Result<Self, Error> {
        if bytes.len() >= MAX_LOGO_BYTES {
            return Err(Error::LogoTooLarge { size: bytes.len() });
        }
        Ok(Logo::Custom(bytes))
    }
}

/// Decode artwork and scale it to a `size` × `size` square, stretching
/// non-square inputs rather than letterboxing them.
///
/// Raster formats are sniffed from their magic bytes; anything unsniffable
/// is treated as SVG, the one accepted text format.
pub(crate) fn rasterize(bytes: &[u8], size: u32) -> Result<RgbaImage, Error> {
    match infer::get(bytes).map(|kind| kind.mime_type()) {
        Some(mime @ ("image/png" | "image/jpeg" | "image/gif")) => {
            debug!(mime, bytes = bytes.len(), "decoding raster logo");
            let decoded = image::load_from_memory(bytes)
                .map_err(|e| Error::LogoLoadFailed(e.to_string()))?;
            Ok(imageops::resize(
                &decoded.to_rgba8(),
                size,
                size,
                imageops::FilterType::Triangle,
            ))
        }
        Some(mime) => Err(Error::LogoLoadFailed(format!(
            "unsupported logo format {mime}"
        ))),
        None => rasterize_svg(bytes, size),
    }
}

fn rasterize_svg(bytes: &[u8], size: u32) -> Result<RgbaImage, Error> {
    debug!(bytes = bytes.len(), "decoding svg logo");

    let mut options = usvg::Options::default();
    // Logos rarely carry <text>, but when they do the glyphs should not
    // silently vanish.
    std::sync::Arc::make_mut(&mut options.fontdb).load_system_fonts();

    let tree = usvg::Tree::from_data(bytes, &options)
        .map_err(|e| Error::LogoLoadFailed(e.to_string()))?;

    let mut pixmap = tiny_skia::Pixmap::new(size, size).ok_or(Error::SurfaceUnavailable)?;
    let scale_x = size as f32 / tree.size().width();
    let scale_y = size as f32 / tree.size().height();
    resvg::render(
        &tree,
        tiny_skia::Transform::from_scale(scale_x, scale_y),
        &mut pixmap.as_mut(),
    );

    let mut rgba = Vec::with_capacity((size * size * 4) as usize);
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        rgba.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }
    RgbaImage::from_raw(size, size, rgba).ok_or(Error::SurfaceUnavailable)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgba, RgbaImage};

    use super::*;

    fn encoded(side: u32, color: Rgba<u8>, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbaImage::from_pixel(side, side, color)
            .write_to(&mut Cursor::new(&mut bytes), format)
            .unwrap();
        bytes
    }

    #[test]
    fn cap_is_inclusive() {
        assert!(matches!(
            Logo::custom(vec![0; MAX_LOGO_BYTES]),
            Err(Error::LogoTooLarge { size: MAX_LOGO_BYTES })
        ));
        assert!(Logo::custom(vec![0; MAX_LOGO_BYTES - 1]).is_ok());
    }

    #[test]
    fn png_scales_to_requested_size() {
        let red = Rgba([255, 0, 0, 255]);
        let logo = rasterize(&encoded(10, red, ImageFormat::Png), 64).unwrap();
        assert_eq!(logo.dimensions(), (64, 64));
        assert_eq!(*logo.get_pixel(32, 32), red);
    }

    #[test]
    fn gif_first_frame_is_used() {
        let bytes = encoded(12, Rgba([0, 128, 0, 255]), ImageFormat::Gif);
        assert_eq!(rasterize(&bytes, 76).unwrap().dimensions(), (76, 76));
    }

    #[test]
    fn non_square_input_is_stretched() {
        let mut bytes = Vec::new();
        RgbaImage::from_pixel(20, 5, Rgba([0, 0, 255, 255]))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        assert_eq!(rasterize(&bytes, 64).unwrap().dimensions(), (64, 64));
    }

    #[test]
    fn svg_rasterizes_through_the_text_path() {
        let svg = br##"<svg xmlns="http://www.w3.org/2000/svg" width="8" height="8"><rect width="8" height="8" fill="#0000ff"/></svg>"##;
        let logo = rasterize(svg, 76).unwrap();
        assert_eq!(logo.dimensions(), (76, 76));
        assert_eq!(*logo.get_pixel(38, 38), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn sniffable_but_unsupported_format_is_refused() {
        let bytes = encoded(8, Rgba([0, 0, 0, 255]), ImageFormat::Bmp);
        match rasterize(&bytes, 64) {
            Err(Error::LogoLoadFailed(message)) => assert!(message.contains("unsupported")),
            other => panic!("expected LogoLoadFailed, got {other:?}"),
        }
    }

    #[test]
    fn nonsense_bytes_are_refused() {
        assert!(matches!(
            rasterize(b"definitely not an image", 64),
            Err(Error::LogoLoadFailed(_))
        ));
    }
}
