//! Slug normalization and generation

pub mod ai;
pub mod codec;
pub mod generator;

pub use ai::{TextGenerator, WorkersAiClient};
pub use codec::SlugCodec;
pub use generator::SlugGenerator;
