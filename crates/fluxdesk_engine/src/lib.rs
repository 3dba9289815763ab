//! Fluxdesk engine: transport, orchestration, and image materialization.
//!
//! Everything here runs off the interactive thread. The [`EngineHandle`]
//! owns a worker thread with a tokio runtime; consumers receive
//! [`EngineEvent`]s over an mpsc channel or register callbacks on a
//! [`JobClient`].
mod client;
mod engine;
mod extract;
mod materialize;
mod runner;
mod transport;

pub use client::JobClient;
pub use engine::{EngineConfig, EngineEvent, EngineHandle, ImageError};
pub use extract::{
    extract_outputs, ImagesArrayExtractor, ResultExtractor, SingleUrlExtractor,
    TypedImageExtractor,
};
pub use materialize::{decode_scaled, DecodedImage, MaterializeError, PixelBound};
pub use transport::{
    ApiKey, HttpTransport, QueueTransport, TransportError, TransportSettings,
};
