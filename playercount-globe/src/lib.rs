//! Rotating globe showing where players are looking.
//!
//! Positions arrive as longitude/latitude pairs ([`playercount_sdk::AngularPosition`]),
//! are mapped onto the unit sphere by [`coords::to_unit_sphere`], and are
//! drawn by [`PositionVisualizer`] through a cubemap overlay.

use std::path::PathBuf;

pub mod camera;
pub mod coords;
pub mod marker;
pub mod mesh;
mod shader;
pub mod style;
mod visualizer;

pub use style::{GlobeStyle, GlobeTextures};
pub use visualizer::{
    CUBEMAP_FAR, CUBEMAP_NEAR, CUBEMAP_RESOLUTION, MARKER_CORE_THRESHOLD, MARKER_SIZE,
    PositionVisualizer, SPHERE_SEGMENTS, Viewport,
};

#[derive(Debug, thiserror::Error)]
pub enum GlobeError {
    #[error("{name} texture has no pixels")]
    EmptyTexture { name: &'static str },
    #[error("failed to load texture {}: {source}", path.display())]
    LoadTexture {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid colour {0:?}, expected #rrggbb")]
    InvalidColour(String),
}
