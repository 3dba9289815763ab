use image::imageops::FilterType;
use image::DynamicImage;

/// Maximum display box for a materialized image. Layout code that has not
/// been sized yet falls back to [`PixelBound::default`] (400x400).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBound {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for PixelBound {
    fn default() -> Self {
        Self {
            max_width: 400,
            max_height: 400,
        }
    }
}

impl PixelBound {
    /// Bound from a laid-out display area. Degenerate dimensions (a widget
    /// that has not been sized yet reports a few pixels) use the default.
    pub fn from_layout(width: u32, height: u32) -> Self {
        if width > 10 && height > 10 {
            Self {
                max_width: width,
                max_height: height,
            }
        } else {
            Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MaterializeError {
    #[error("downloaded image data is empty")]
    EmptyPayload,
    #[error("unsupported or corrupt image data: {0}")]
    UnsupportedFormat(String),
}

/// A decoded raster ready for display, plus the size of the payload it came
/// from. Replaced wholesale whenever a new job completes.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
    pub source_len: usize,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Decode raw bytes and scale the raster down to fit within `bound`,
/// preserving aspect ratio with Lanczos resampling. Images already inside
/// the bound are never upscaled.
pub fn decode_scaled(bytes: &[u8], bound: PixelBound) -> Result<DecodedImage, MaterializeError> {
    if bytes.is_empty() {
        return Err(MaterializeError::EmptyPayload);
    }
    let decoded = image::load_from_memory(bytes)
        .map_err(|err| MaterializeError::UnsupportedFormat(err.to_string()))?;

    let image = if decoded.width() > bound.max_width || decoded.height() > bound.max_height {
        decoded.resize(bound.max_width, bound.max_height, FilterType::Lanczos3)
    } else {
        decoded
    };

    Ok(DecodedImage {
        image,
        source_len: bytes.len(),
    })
}
