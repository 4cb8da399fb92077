//! Core alignment and fusion modules

pub mod alignment;
pub mod color;
pub mod contrast;
pub mod fusion;
pub mod hillshade;
pub mod pipeline;

// Re-export main types
pub use alignment::{AlignedRasters, AlignmentParams, RasterAligner};
pub use color::HsvImage;
pub use contrast::{ChannelContrastNormalizer, ContrastParams};
pub use fusion::{FusionParams, FusionRenderer, FusionStrategy};
pub use hillshade::{HillshadeCalculator, HillshadeField, HillshadeParams};
pub use pipeline::{FusionConfig, FusionPipeline, FusionProducts};
