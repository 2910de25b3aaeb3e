pub mod error;
pub mod geometry;
pub mod math;
pub mod pipeline;
pub mod print;
pub mod surface;
pub mod topology;

pub use error::{Result, RoofprintError};
