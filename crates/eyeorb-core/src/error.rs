//! Error types for the orb subsystem

use thiserror::Error;

/// Core orb errors
///
/// None of these reach the host application: the controller contains them
/// and degrades to the static fallback instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrbError {
    // Capability errors
    #[error("Graphics context unavailable: {0}")]
    GraphicsUnavailable(String),

    #[error("Capability detection failed: {0}")]
    DetectionFailed(String),

    // Pipeline errors
    #[error("Shader program build failed: {0}")]
    ProgramBuild(String),

    #[error("Geometry upload failed: {0}")]
    GeometryUpload(String),

    #[error("Draw failed: {0}")]
    DrawFailed(String),

    #[error("Graphics context lost")]
    ContextLost,

    #[error("Renderer already disposed")]
    Disposed,

    // Input errors
    #[error("Permission request failed: {0}")]
    PermissionRequest(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for orb operations
pub type OrbResult<T> = Result<T, OrbError>;
