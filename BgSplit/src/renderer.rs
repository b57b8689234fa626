//! Tile rendering
//!
//! Crops each planned cell out of the source image and encodes it. Cropping
//! copies pixels one-to-one, so seams carry no interpolation blur. Cells are
//! independent and are rendered in parallel.
//!
//! SPDX-FileCopyrightText: 2025 CyberDeco
//! SPDX-License-Identifier: MIT

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, GenericImageView};
use rayon::prelude::*;

use crate::config::TileFormat;
use crate::error::{Error, Result};
use crate::planner::{TileGridPlan, TileRect};

/// Encoder settings shared by every tile of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSettings {
    pub format: TileFormat,
    /// 1-100, lossy formats only
    pub quality: u8,
}

/// One encoded tile
#[derive(Debug, Clone)]
pub struct EncodedTile {
    pub rect: TileRect,
    pub bytes: Vec<u8>,
}

/// Crop `rect` out of `image` and encode it.
pub fn render_tile(image: &DynamicImage, rect: &TileRect, settings: EncodeSettings) -> Result<EncodedTile> {
    let (width, height) = image.dimensions();
    if rect.offset_x + rect.width > width || rect.offset_y + rect.height > height {
        return Err(Error::TileEncode {
            col: rect.col,
            row: rect.row,
            message: format!(
                "cell {}x{}+{}+{} outside {width}x{height} image",
                rect.width, rect.height, rect.offset_x, rect.offset_y
            ),
        });
    }

    let tile = image.crop_imm(rect.offset_x, rect.offset_y, rect.width, rect.height);
    let bytes = encode(&tile, settings).map_err(|e| Error::TileEncode {
        col: rect.col,
        row: rect.row,
        message: e.to_string(),
    })?;

    Ok(EncodedTile { rect: *rect, bytes })
}

fn encode(tile: &DynamicImage, settings: EncodeSettings) -> image::ImageResult<Vec<u8>> {
    let mut out = Vec::new();
    match settings.format {
        TileFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(tile.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, settings.quality))?;
        }
        TileFormat::Webp => {
            let rgba = DynamicImage::ImageRgba8(tile.to_rgba8());
            rgba.write_with_encoder(WebPEncoder::new_lossless(&mut out))?;
        }
        TileFormat::Png => {
            tile.write_with_encoder(PngEncoder::new(&mut out))?;
        }
    }
    Ok(out)
}

/// Render every cell of `plan`, returned in the plan's row-major order.
pub fn render_plan(image: &DynamicImage, plan: &TileGridPlan, settings: EncodeSettings) -> Result<Vec<EncodedTile>> {
    let tiles = plan
        .cells
        .par_iter()
        .map(|rect| render_tile(image, rect, settings))
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        tiles = tiles.len(),
        bytes = tiles.iter().map(|t| t.bytes.len()).sum::<usize>(),
        "Rendered tiles"
    );
    Ok(tiles)
}
