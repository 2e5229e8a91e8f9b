//! Error types surfaced by the texture pipeline.
//!
//! Low-level kernels (resize/CAS/blur/flood/SDF) run on a worker pool and
//! report failure by incrementing an atomic counter per task; the phase
//! orchestrator checks the counter once all tasks have joined and maps a
//! non-zero count onto one of the variants below. Contract violations
//! (bad dimensions, non-power-of-two mips, enum mismatches) are asserted
//! instead, per the propagation policy: those are bugs in the caller, not
//! recoverable conditions.

use thiserror::Error;

/// Error surfaced by a fallible texture-pipeline operation.
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("resize failed on {failed} of {total} slice(s)")]
    ResizeFailed { failed: usize, total: usize },

    #[error("mip chain generation failed on {failed} of {total} slice(s)")]
    MipFailed { failed: usize, total: usize },

    #[error("mip flood failed on {failed} of {total} slice(s)")]
    FloodFailed { failed: usize, total: usize },

    #[error("no compression implementation selected for generation")]
    MissingCompression,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decoder error: {0}")]
    Decoder(#[from] image::ImageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TextureError>;
