use serde::{Deserialize, Serialize};

use crate::models::{ProcessingError, Result, StoredImage};

/// Input size of the road-surface classifier
pub const CLASSIFIER_INPUT: (u32, u32) = (224, 224);

/// Pixel rectangle, right/bottom exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropWindow {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropWindow {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    pub fn as_bbox(&self) -> [f64; 4] {
        [self.left as f64, self.top as f64, self.right as f64, self.bottom as f64]
    }

    /// Window centred horizontally, with its centre pushed a quarter of the
    /// image height below the vertical centre, clamped to the image.
    pub fn for_classifier(width: u32, height: u32, crop: (u32, u32)) -> Self {
        let center_x = width / 2;
        let center_y = height / 2 + height / 4;
        let half_w = crop.0 / 2;
        let half_h = crop.1 / 2;

        Self {
            left: center_x.saturating_sub(half_w),
            top: center_y.saturating_sub(half_h),
            right: (center_x + half_w).min(width),
            bottom: (center_y + half_h).min(height),
        }
    }
}

/// Geometry and identity of one stored image after the preprocessing stage.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedImage {
    pub image_id: String,
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub crop: CropWindow,
    pub digest: [u8; 32],
}

/// Decodes the bytes fully (so corrupt files fail here, not later) and returns the dimensions.
/// CPU-bound; call from `spawn_blocking`.
pub fn decode_dimensions_blocking(data: &[u8]) -> Result<(u32, u32)> {
    let img = ::image::load_from_memory(data)?;
    Ok((img.width(), img.height()))
}

pub async fn preprocess_image(image_id: String, stored: &StoredImage, data: Vec<u8>) -> Result<PreprocessedImage> {
    let (width, height) = tokio::task::spawn_blocking(move || decode_dimensions_blocking(&data))
        .await
        .map_err(|e| ProcessingError::Task(format!("decode: {}", e)))??;

    let digest = digest_from_hex(&stored.sha256)?;
    let crop = CropWindow::for_classifier(width, height, CLASSIFIER_INPUT);

    tracing::debug!(
        image_id = %image_id,
        width,
        height,
        crop_left = crop.left,
        crop_top = crop.top,
        "Preprocessed image"
    );

    Ok(PreprocessedImage { image_id, url: stored.url.clone(), width, height, crop, digest })
}

fn digest_from_hex(hex: &str) -> Result<[u8; 32]> {
    let invalid = || ProcessingError::Validation(format!("invalid sha256 digest '{}'", hex));
    if hex.len() != 64 {
        return Err(invalid());
    }
    let mut out = [0u8; 32];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
    }
    Ok(out)
}
