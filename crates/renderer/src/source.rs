use std::path::Path;

use image::RgbImage;

use crate::error::SetupError;
use crate::types::Extent;

/// Decoded input image. Row-major RGB8, top row first, never mutated after load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    extent: Extent,
    pixels: Vec<u8>,
}

impl SourceImage {
    pub fn open(path: &Path) -> Result<Self, SetupError> {
        let decoded = image::open(path).map_err(|source| SetupError::ImageDecode {
            path: path.to_path_buf(),
            source,
        })?;
        let rgb = decoded.to_rgb8();
        if rgb.width() == 0 || rgb.height() == 0 {
            return Err(SetupError::EmptyImage {
                path: path.to_path_buf(),
            });
        }
        tracing::debug!(
            path = %path.display(),
            width = rgb.width(),
            height = rgb.height(),
            color = ?decoded.color(),
            "decoded source image"
        );
        Ok(Self::from_rgb(rgb))
    }

    pub fn from_rgb(image: RgbImage) -> Self {
        let extent = Extent::new(image.width(), image.height());
        Self {
            extent,
            pixels: image.into_raw(),
        }
    }

    /// Builds an image where every pixel has the same colour.
    pub fn solid(extent: Extent, rgb: [u8; 3]) -> Self {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(extent.area() * 3)
            .collect();
        Self { extent, pixels }
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Expands to RGBA8 with opaque alpha for texture upload.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(self.extent.area() * 4);
        for rgb in self.pixels.chunks_exact(3) {
            rgba.extend_from_slice(rgb);
            rgba.push(u8::MAX);
        }
        rgba
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_expansion_keeps_channel_order() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, image::Rgb([1, 2, 3]));
        image.put_pixel(1, 0, image::Rgb([4, 5, 6]));
        let source = SourceImage::from_rgb(image);
        assert_eq!(source.to_rgba8(), vec![1, 2, 3, 255, 4, 5, 6, 255]);
        assert_eq!(source.extent(), Extent::new(2, 1));
    }

    #[test]
    fn missing_file_reports_decode_error() {
        let err = SourceImage::open(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, SetupError::ImageDecode { .. }));
    }
}
