//! Image metadata extraction: dimensions, container format and color mode.
//!
//! Decoding happens only after the path has been authorized and confirmed to
//! carry an image extension. A codec failure is not an error at this layer;
//! the caller falls back to extension-derived fields, mirroring a viewer that
//! simply has no decoder for the format.

use std::path::Path;

use image::{ColorType, ImageReader};

#[derive(Debug, Clone, Default)]
pub struct ImageInfo {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
    pub mode: Option<String>,
}

/// Inspect an image file. Never fails: undecodable input yields a default
/// (all-`None`) or format-only result.
pub fn inspect(path: &Path) -> ImageInfo {
    let reader = match ImageReader::open(path).and_then(|r| r.with_guessed_format()) {
        Ok(r) => r,
        Err(_) => return ImageInfo::default(),
    };
    let format = reader
        .format()
        .map(|f| format!("{f:?}").to_uppercase());
    match reader.decode() {
        Ok(img) => ImageInfo {
            width: Some(img.width()),
            height: Some(img.height()),
            mode: Some(mode_label(img.color()).to_string()),
            format,
        },
        Err(_) => ImageInfo {
            width: None,
            height: None,
            mode: None,
            format,
        },
    }
}

/// Pillow-style color mode labels, the vocabulary the frontend expects.
fn mode_label(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 | ColorType::L16 => "L",
        ColorType::La8 | ColorType::La16 => "LA",
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => "RGB",
        ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => "RGBA",
        _ => "RGB",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn decodes_png_dimensions_and_mode() {
        let tmp = tempdir().unwrap();
        let p = tmp.path().join("dot.png");
        image::GrayImage::from_pixel(3, 2, image::Luma([128u8]))
            .save(&p)
            .unwrap();
        let info = inspect(&p);
        assert_eq!(info.width, Some(3));
        assert_eq!(info.height, Some(2));
        assert_eq!(info.format.as_deref(), Some("PNG"));
        assert_eq!(info.mode.as_deref(), Some("L"));
    }

    #[test]
    fn decodes_rgba_mode() {
        let tmp = tempdir().unwrap();
        let p = tmp.path().join("pixel.png");
        image::RgbaImage::from_pixel(1, 1, image::Rgba([1, 2, 3, 4]))
            .save(&p)
            .unwrap();
        let info = inspect(&p);
        assert_eq!(info.mode.as_deref(), Some("RGBA"));
    }

    #[test]
    fn garbage_input_degrades_gracefully() {
        let tmp = tempdir().unwrap();
        let p = tmp.path().join("junk.png");
        std::fs::write(&p, b"not an image at all").unwrap();
        let info = inspect(&p);
        assert_eq!(info.width, None);
        assert_eq!(info.height, None);
    }

    #[test]
    fn missing_file_yields_default() {
        let info = inspect(Path::new("/definitely/not/here.png"));
        assert!(info.width.is_none() && info.format.is_none());
    }
}
