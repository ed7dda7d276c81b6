//! Route Guide - Driver binary
//!
//! Loads the feature database, then exercises GetFeature, ListFeatures, RecordRoute and
//! RouteChat against an in-process service and logs what comes back.

mod demo;
mod logging;
mod settings;

use route_guide_lib::{Config, FeatureStore, RouteGuide, RouteGuideError};
use settings::Settings;
use std::sync::Arc;

/// Error types for the driver
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    RouteGuide(#[from] RouteGuideError),

    #[error("Session task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Failed to start the async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

fn main() {
    let settings = Settings::from_cli();
    let guard: logging::LoggingGuard = logging::setup_logging();
    tracing::info!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    if let Err(e) = start(settings) {
        tracing::error!("{}", e);
        drop(guard);
        std::process::exit(1);
    }
}

fn start(settings: Settings) -> Result<(), AppError> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(run(settings))
}

async fn run(settings: Settings) -> Result<(), AppError> {
    let store = FeatureStore::from_path(&settings.db_path)?;
    let info = store.info();
    match info.bounding_box {
        Some(bbox) => tracing::info!(
            "Store holds {} features ({} named) between {:?} and {:?}",
            info.feature_count,
            info.named_count,
            bbox.min(),
            bbox.max()
        ),
        None => tracing::warn!("Store is empty, every lookup will come back unnamed"),
    }

    let config = Config {
        stream_buffer: settings.stream_buffer,
    };
    let service = Arc::new(RouteGuide::with_config(store, config));

    if settings.skip_demo {
        return Ok(());
    }

    demo::run(&service, settings.route_points, settings.chat_sessions).await?;

    tracing::info!(
        "Note registry holds {} notes at {} locations",
        service.notes().note_count(),
        service.notes().location_count()
    );
    Ok(())
}
