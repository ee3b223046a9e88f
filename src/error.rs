use thiserror::Error;

/// Everything that can make a remap or a parameter update fail.
///
/// None of these leave the [`Engine`](crate::Engine) in a partially updated
/// state, so the caller can simply retry with corrected input on the next frame.
#[derive(Debug, Error)]
pub enum Error {
    /// The source disc is empty or lies outside of the frame it was cropped from.
    #[error("invalid source: {0}")]
    InvalidSource(String),
    /// A view was given a field of view or angle outside of its valid range.
    #[error("invalid view parameters: {0}")]
    InvalidParameters(String),
    #[error("view {index} does not exist, the engine has {count} views")]
    NoSuchView { index: usize, count: usize },
    #[error("destination size {width}x{height} is empty")]
    InvalidDestination { width: usize, height: usize },
    /// The canvas and the source disagree on the number of color channels.
    #[error("source disc has {disc} channels but the canvas has {canvas}")]
    ChannelMismatch { disc: usize, canvas: usize },
    #[error("failed to start the remap workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
