//! Globe colours and surface masks.

use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::GlobeError;

/// Colours are sRGB hex as configured; the shader receives them linear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobeStyle {
    pub land: u32,
    pub sea: u32,
    pub fresnel: u32,
    pub fresnel_intensity: f32,
}

impl Default for GlobeStyle {
    fn default() -> Self {
        Self {
            land: 0x525252,
            sea: 0x242424,
            fresnel: 0x444444,
            fresnel_intensity: 0.0,
        }
    }
}

impl GlobeStyle {
    pub(crate) fn land_linear(&self) -> [f32; 4] {
        srgb_to_linear(self.land, 1.0)
    }

    pub(crate) fn sea_linear(&self) -> [f32; 4] {
        srgb_to_linear(self.sea, 1.0)
    }

    pub(crate) fn fresnel_linear(&self) -> [f32; 4] {
        srgb_to_linear(self.fresnel, self.fresnel_intensity)
    }
}

/// Parse `#rrggbb` (or `rrggbb`).
pub fn parse_hex_colour(text: &str) -> Result<u32, GlobeError> {
    let digits = text.trim().trim_start_matches('#');
    if digits.len() != 6 {
        return Err(GlobeError::InvalidColour(text.to_string()));
    }
    u32::from_str_radix(digits, 16).map_err(|_| GlobeError::InvalidColour(text.to_string()))
}

fn srgb_to_linear(hex: u32, w: f32) -> [f32; 4] {
    let channel = |shift: u32| {
        let c = ((hex >> shift) & 0xff) as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    [channel(16), channel(8), channel(0), w]
}

/// Land mask and highlight mask. Only the red channel of each is read.
///
/// A missing mask is a single white texel: the whole globe counts as land
/// and markers glow everywhere.
#[derive(Debug, Clone, Default)]
pub struct GlobeTextures {
    pub land: Option<RgbaImage>,
    pub highlight: Option<RgbaImage>,
}

impl GlobeTextures {
    pub fn load(land: Option<&Path>, highlight: Option<&Path>) -> Result<Self, GlobeError> {
        Ok(Self {
            land: land.map(load_mask).transpose()?,
            highlight: highlight.map(load_mask).transpose()?,
        })
    }

    pub(crate) fn land_or_default(&self) -> Result<RgbaImage, GlobeError> {
        mask_or_default("land", self.land.as_ref())
    }

    pub(crate) fn highlight_or_default(&self) -> Result<RgbaImage, GlobeError> {
        mask_or_default("highlight", self.highlight.as_ref())
    }
}

fn load_mask(path: &Path) -> Result<RgbaImage, GlobeError> {
    let image = image::open(path).map_err(|source| GlobeError::LoadTexture {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), width = image.width(), height = image.height(), "loaded globe mask");
    Ok(image.to_rgba8())
}

fn mask_or_default(name: &'static str, image: Option<&RgbaImage>) -> Result<RgbaImage, GlobeError> {
    match image {
        Some(image) if image.width() == 0 || image.height() == 0 => {
            Err(GlobeError::EmptyTexture { name })
        }
        Some(image) => Ok(image.clone()),
        None => Ok(RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255]))),
    }
}
