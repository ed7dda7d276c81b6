//! In-process client driving the four route guide calls
//!
//! Each call is run the way a remote client would: streamed requests are fed from a
//! separate task through a channel and streamed replies are drained as they arrive.

use crate::AppError;
use route_guide_lib::{
    Feature, Point, Rectangle, RouteGuide, RouteGuideError, RouteNote, RouteSummary,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

/// Run every call once (RouteChat `chat_sessions` times in parallel)
pub async fn run(
    service: &Arc<RouteGuide>,
    route_points: usize,
    chat_sessions: usize,
) -> Result<(), AppError> {
    print_feature(service, Point::new(409_146_138, -746_188_906));
    print_feature(service, Point::new(0, 0));

    print_features(
        service,
        Rectangle::new(
            Point::new(400_000_000, -750_000_000),
            Point::new(420_000_000, -730_000_000),
        ),
    )
    .await;

    let summary = run_record_route(service, sample_route(service, route_points)).await?;
    tracing::info!(
        "Route summary: {} points, {} features, {} m, {} s",
        summary.point_count,
        summary.feature_count,
        summary.distance,
        summary.elapsed_time
    );

    let mut sessions = JoinSet::new();
    for session in 0..chat_sessions {
        let service = Arc::clone(service);
        sessions.spawn(async move { run_route_chat(&service, session).await });
    }
    while let Some(result) = sessions.join_next().await {
        result??;
    }

    Ok(())
}

fn print_feature(service: &RouteGuide, point: Point) {
    tracing::info!("Getting feature for point {}", point);
    let feature = service.get_feature(&point);
    if feature.is_named() {
        tracing::info!("Found feature {:?} at {}", feature.name, feature.location);
    } else {
        tracing::info!("No feature at {}", feature.location);
    }
}

async fn print_features(service: &Arc<RouteGuide>, rect: Rectangle) {
    tracing::info!("Looking for features within {}", rect);
    let mut features = service.spawn_list_features(rect);
    let mut count = 0;
    while let Some(Feature { location, name }) = features.next().await {
        tracing::info!("Feature {:?} at {}", name, location);
        count += 1;
    }
    tracing::info!("{} features within {}", count, rect);
}

/// Walk the store in a fixed stride, nudging every third point off its feature
fn sample_route(service: &RouteGuide, count: usize) -> Vec<Point> {
    let features = service.store().features();
    (0..count)
        .map(|i| match features.len() {
            0 => Point::new((i as i32 % 180 - 90) * 10_000_000, 0),
            len => {
                let location = features[(i * 7) % len].location;
                if i % 3 == 2 {
                    Point::new(location.latitude, location.longitude.saturating_add(1))
                } else {
                    location
                }
            }
        })
        .collect()
}

async fn run_record_route(
    service: &RouteGuide,
    points: Vec<Point>,
) -> Result<RouteSummary, AppError> {
    tracing::info!("Traversing {} points", points.len());
    let (tx, rx) = mpsc::channel(points.len().max(1));

    let client = tokio::spawn(async move {
        for point in points {
            if tx.send(Ok(point)).await.is_err() {
                break;
            }
        }
    });

    let summary = service.record_route(ReceiverStream::new(rx)).await?;
    client.await?;
    Ok(summary)
}

async fn run_route_chat(service: &RouteGuide, session: usize) -> Result<(), AppError> {
    let notes = vec![
        RouteNote::new(Point::new(0, 1), format!("First message from session {session}")),
        RouteNote::new(Point::new(0, 2), format!("Second message from session {session}")),
        RouteNote::new(Point::new(0, 3), format!("Third message from session {session}")),
        RouteNote::new(Point::new(0, 1), format!("Fourth message from session {session}")),
        RouteNote::new(Point::new(0, 2), format!("Fifth message from session {session}")),
        RouteNote::new(Point::new(0, 3), format!("Sixth message from session {session}")),
    ];
    chat_session(service, session, notes.into_iter().map(Ok).collect()).await
}

/// Feed `inbound` through RouteChat from one task while another logs the replies
async fn chat_session(
    service: &RouteGuide,
    session: usize,
    inbound: Vec<Result<RouteNote, RouteGuideError>>,
) -> Result<(), AppError> {
    let (in_tx, in_rx) = mpsc::channel(1);
    let (out_tx, mut out_rx) =
        mpsc::channel::<RouteNote>(service.config().stream_buffer.max(1));

    let sender = tokio::spawn(async move {
        for note in inbound {
            if in_tx.send(note).await.is_err() {
                break;
            }
        }
    });

    let receiver = tokio::spawn(async move {
        let mut received = 0;
        while let Some(note) = out_rx.recv().await {
            tracing::info!(
                "Session {}: got message {:?} at {}",
                session,
                note.message,
                note.location
            );
            received += 1;
        }
        received
    });

    let result = service
        .route_chat(ReceiverStream::new(in_rx), &out_tx)
        .await;
    drop(out_tx);
    if let Err(e) = result {
        sender.abort();
        receiver.abort();
        return Err(e.into());
    }

    sender.await?;
    let received = receiver.await?;
    tracing::info!("Session {} finished after {} replies", session, received);
    Ok(())
}
