use thiserror::Error;

/// Top-level error type for the roofprint crate.
#[derive(Debug, Error)]
pub enum RoofprintError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Errors related to geometric computations.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    #[error("zero-length vector")]
    ZeroVector,

    /// Height queried on a vertical plane, which has no elevation at a
    /// ground location.
    #[error("height undefined at ({x}, {y}): supporting plane is vertical")]
    HeightUndefined { x: f64, y: f64 },
}

/// Errors related to half-edge topology.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("unsafe facet join: {0}")]
    UnsafeJoin(String),

    #[error("invalid topology: {0}")]
    InvalidTopology(String),
}

/// Errors related to footprint operations.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("polygon boolean operation failed: {0}")]
    BooleanFailure(String),
}

/// Errors raised while driving a batch of buildings.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("building {name} failed: {reason}")]
    BuildingFailed { name: String, reason: String },

    #[error("thread pool: {0}")]
    ThreadPool(String),
}

/// Convenience type alias for results using [`RoofprintError`].
pub type Result<T> = std::result::Result<T, RoofprintError>;
