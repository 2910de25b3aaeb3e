//! Ground projections of building surfaces.
//!
//! A [`FacePrint`] is one projected facet. A [`BrickPrint`] resolves the
//! occlusion between many of them so that only what is visible from above
//! survives. [`FootPrint`] and [`ScenePrint`] attach georeferencing, and
//! [`RasterPrint`] samples the result on a pixel grid.

pub mod brick_print;
pub mod face_print;
pub mod foot_print;
pub mod raster_print;

pub use brick_print::{BrickPrint, HeightPolicy, Resolution, HEIGHT_TOLERANCE};
pub use face_print::FacePrint;
pub use foot_print::{FootPrint, ScenePrint};
pub use raster_print::{GridSpec, RasterPrint, MAX_PIXELS, NO_DATA};
