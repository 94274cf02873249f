//! Post image validation.

use std::num::NonZeroU32;

use imagesize::ImageError;
use thiserror::Error;

pub const MAX_DIMENSION: u32 = 10_000;

pub const INVALID_IMAGE_MESSAGE: &str = concat!(
    "Upload a valid image. The file you uploaded was either not an image ",
    "or a corrupted image."
);

/// Image attached to a post submission, before it is stored.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: bytes::Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: NonZeroU32,
    pub height: NonZeroU32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageValidationError {
    #[error("uploaded file is empty")]
    Empty,
    #[error("uploaded file is not a supported image")]
    NotAnImage,
    #[error("uploaded image is corrupted")]
    Corrupted,
    #[error("image dimensions {width}x{height} are out of range")]
    OutOfRange { width: usize, height: usize },
}

/// Probe the image header and reject anything that does not decode to sane dimensions.
pub fn inspect_image(bytes: &[u8]) -> Result<ImageDimensions, ImageValidationError> {
    if bytes.is_empty() {
        return Err(ImageValidationError::Empty);
    }

    let size = match imagesize::blob_size(bytes) {
        Ok(size) => size,
        Err(ImageError::NotSupported) => return Err(ImageValidationError::NotAnImage),
        Err(ImageError::CorruptedImage | ImageError::IoError(_)) => {
            return Err(ImageValidationError::Corrupted);
        }
    };

    let out_of_range = ImageValidationError::OutOfRange {
        width: size.width,
        height: size.height,
    };
    let width = u32::try_from(size.width)
        .ok()
        .filter(|value| *value <= MAX_DIMENSION)
        .and_then(NonZeroU32::new);
    let height = u32::try_from(size.height)
        .ok()
        .filter(|value| *value <= MAX_DIMENSION)
        .and_then(NonZeroU32::new);

    match (width, height) {
        (Some(width), Some(height)) => Ok(ImageDimensions { width, height }),
        _ => Err(out_of_range),
    }
}
