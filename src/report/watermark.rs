//! Page watermarking

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use tracing::debug;

use crate::error::SealError;

/// Top-left anchor of the watermark, in pixels
pub const WATERMARK_ORIGIN: (i32, i32) = (10, 10);
pub const WATERMARK_COLOR: Rgb<u8> = Rgb([185, 185, 185]);
pub const WATERMARK_PX: f32 = 24.0;

pub trait PageStamper: Send + Sync {
    fn stamp(&self, page: &mut RgbImage, text: &str) -> Result<(), SealError>;
}

/// Draws the text with a TrueType face
pub struct FontStamper {
    font: FontVec,
    scale: PxScale,
}

impl FontStamper {
    pub fn from_file(path: &Path) -> Result<Self, SealError> {
        let data = std::fs::read(path).map_err(|e| SealError::Font(format!("{}: {}", path.display(), e)))?;
        Self::from_bytes(data)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self, SealError> {
        let font = FontVec::try_from_vec(data).map_err(|e| SealError::Font(e.to_string()))?;
        Ok(Self {
            font,
            scale: PxScale::from(WATERMARK_PX),
        })
    }
}

impl PageStamper for FontStamper {
    fn stamp(&self, page: &mut RgbImage, text: &str) -> Result<(), SealError> {
        if page.width() == 0 || page.height() == 0 {
            return Err(SealError::Watermark("empty page image".into()));
        }
        let (x, y) = WATERMARK_ORIGIN;
        draw_text_mut(page, WATERMARK_COLOR, x, y, self.scale, &self.font, text);
        debug!(width = page.width(), height = page.height(), "Page stamped");
        Ok(())
    }
}
