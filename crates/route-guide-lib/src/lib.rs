//! Route Guide Library - Core of the route guide service
//!
//! This library holds everything the route guide service needs besides the transport:
//! an immutable feature database, fixed-point geometry, a concurrent note registry and
//! the four call patterns built on top of them.
//!
//! # Architecture
//!
//! - **[`FeatureStore`]**: Immutable, load-once storage of named locations
//! - **[`utils`]**: Containment and haversine distance on fixed-point coordinates
//! - **[`NoteRegistry`]**: Sharded, append-only map of notes per location
//! - **[`RouteGuide`]**: GetFeature, ListFeatures, RecordRoute and RouteChat
//!
//! # Streams
//!
//! Inbound streams are any [`tokio_stream::Stream`] of `Result<T>` items, where the end of
//! the stream is a clean end-of-input and an `Err` item is a receive failure reported by
//! the transport. Outbound streams are bounded [`tokio::sync::mpsc::Sender`]s; a closed
//! receiver means the consumer went away.

mod notes;
mod point;
mod service;
mod store;
pub mod utils;

// Public API exports
pub use notes::NoteRegistry;
pub use point::{Feature, Point, Rectangle, RouteNote, RouteSummary};
pub use service::{Config, RouteGuide};
pub use store::{FeatureStore, StoreInfo};

use std::path::PathBuf;

/// Error types for the route guide core
#[derive(Debug, thiserror::Error)]
pub enum RouteGuideError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feature database parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to load features from {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: Box<RouteGuideError>,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Outbound stream closed by the receiver")]
    StreamClosed,
}

pub type Result<T> = std::result::Result<T, RouteGuideError>;
