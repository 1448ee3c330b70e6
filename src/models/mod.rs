pub mod analysis;
pub mod common;
pub mod gemini;
pub mod generation;
pub mod image;
pub mod response;

pub use analysis::*;
pub use common::*;
pub use generation::*;
pub use image::*;
pub use response::*;
