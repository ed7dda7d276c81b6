//! RouteGuide - The four call patterns on top of the store and registry
//!
//! This module knows nothing about the transport. Unary calls are plain methods,
//! inbound streams are [`Stream`]s of `Result` items and outbound streams are bounded
//! [`mpsc::Sender`]s owned by the caller.

use crate::{
    Feature, FeatureStore, NoteRegistry, Point, Rectangle, Result, RouteGuideError, RouteNote,
    RouteSummary, utils,
};

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

/// Configuration for the route guide service
#[derive(Debug, Clone)]
pub struct Config {
    /// Capacity of the channels created by [`RouteGuide::spawn_list_features`] and of
    /// the reply queue inside each RouteChat session.
    /// Default: 100
    pub stream_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self { stream_buffer: 100 }
    }
}

/// Route guide service state shared by every session
///
/// Wrap it in an `Arc` to serve sessions from several tasks.
#[derive(Debug)]
pub struct RouteGuide {
    /// Read-only feature database
    store: FeatureStore,
    /// Notes sent through RouteChat, for the lifetime of the service
    notes: NoteRegistry,
    /// Configuration settings
    config: Config,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl RouteGuide {
    /// Create a service over a loaded store with the default configuration
    pub fn new(store: FeatureStore) -> Self {
        Self::with_config(store, Config::default())
    }

    pub fn with_config(store: FeatureStore, config: Config) -> Self {
        Self {
            store,
            notes: NoteRegistry::new(),
            config,
        }
    }

    #[inline]
    pub fn store(&self) -> &FeatureStore {
        &self.store
    }

    #[inline]
    pub fn notes(&self) -> &NoteRegistry {
        &self.notes
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// GetFeature: the feature at a point, or an unnamed feature if there is none
    pub fn get_feature(&self, point: &Point) -> Feature {
        tracing::debug!("GetFeature {}", point);
        self.store.lookup(point)
    }

    /// ListFeatures: send every feature inside `rect` to `tx`, in store order
    ///
    /// Returns how many features were sent. Stops with [`RouteGuideError::StreamClosed`]
    /// as soon as the receiver is dropped.
    pub async fn list_features(
        &self,
        rect: &Rectangle,
        tx: &mpsc::Sender<Feature>,
    ) -> Result<usize> {
        tracing::debug!("ListFeatures {}", rect);

        let mut sent = 0;
        for feature in self.store.query(rect) {
            tx.send(feature.clone())
                .await
                .map_err(|_| RouteGuideError::StreamClosed)?;
            sent += 1;
        }
        Ok(sent)
    }

    /// ListFeatures on a spawned task, returning the receiving half as a stream
    ///
    /// The channel holds up to [`Config::stream_buffer`] features. Dropping the stream
    /// stops the task at its next send.
    pub fn spawn_list_features(self: &Arc<Self>, rect: Rectangle) -> ReceiverStream<Feature> {
        let (tx, rx) = mpsc::channel(self.config.stream_buffer.max(1));
        let service = Arc::clone(self);

        tokio::spawn(async move {
            match service.list_features(&rect, &tx).await {
                Ok(sent) => {
                    tracing::debug!("ListFeatures {} finished after {} features", rect, sent)
                }
                Err(e) => tracing::debug!("ListFeatures {} aborted: {}", rect, e),
            }
        });

        ReceiverStream::new(rx)
    }

    /// RecordRoute: consume a stream of points and summarize the route
    ///
    /// The summary is produced only when the stream ends cleanly. A receive error aborts
    /// the session and the partial aggregate is dropped.
    pub async fn record_route<S>(&self, mut points: S) -> Result<RouteSummary>
    where
        S: Stream<Item = Result<Point>> + Unpin,
    {
        let mut route = RouteAccumulator::start();

        while let Some(point) = points.next().await {
            let point = point?;
            route.push(&self.store, point);
        }

        let summary = route.finish();
        tracing::debug!(
            "RecordRoute finished: {} points, {} features, {} m in {} s",
            summary.point_count,
            summary.feature_count,
            summary.distance,
            summary.elapsed_time
        );
        Ok(summary)
    }

    /// RouteChat: record each inbound note and reply with the history of its location
    ///
    /// Receiving and replying run concurrently: up to [`Config::stream_buffer`] replies
    /// are queued while `outbound` is full, so a peer may send ahead of its reads. Once
    /// the queue is full the session stops reading until the peer catches up. The
    /// session ends once the inbound stream is exhausted and every queued reply is sent.
    pub async fn route_chat<S>(
        &self,
        mut inbound: S,
        outbound: &mpsc::Sender<RouteNote>,
    ) -> Result<()>
    where
        S: Stream<Item = Result<RouteNote>> + Unpin,
    {
        // Bounded so a peer that never reads cannot grow the session without limit
        let (queue_tx, mut queue_rx) =
            mpsc::channel::<Vec<RouteNote>>(self.config.stream_buffer.max(1));

        let receive = async move {
            while let Some(note) = inbound.next().await {
                let note = note?;
                tracing::debug!("RouteChat note at {}: {:?}", note.location, note.message);
                let snapshot = self.notes.append(note);
                if queue_tx.send(snapshot).await.is_err() {
                    break;
                }
            }
            Ok::<(), RouteGuideError>(())
        };

        let send = async {
            while let Some(snapshot) = queue_rx.recv().await {
                for note in snapshot {
                    outbound
                        .send(note)
                        .await
                        .map_err(|_| RouteGuideError::StreamClosed)?;
                }
            }
            Ok::<(), RouteGuideError>(())
        };

        tokio::try_join!(receive, send)?;
        Ok(())
    }
}

/// Running state of one RecordRoute session
#[derive(Debug)]
struct RouteAccumulator {
    point_count: i32,
    feature_count: i32,
    distance: i32,
    last_point: Option<Point>,
    started: Instant,
}

impl RouteAccumulator {
    fn start() -> Self {
        Self {
            point_count: 0,
            feature_count: 0,
            distance: 0,
            last_point: None,
            started: Instant::now(),
        }
    }

    fn push(&mut self, store: &FeatureStore, point: Point) {
        self.point_count = self.point_count.saturating_add(1);
        // Every stored feature at this exact location counts
        let matches = i32::try_from(store.count_at(&point)).unwrap_or(i32::MAX);
        self.feature_count = self.feature_count.saturating_add(matches);
        if let Some(prev) = self.last_point {
            self.distance = self.distance.saturating_add(utils::distance(&prev, &point));
        }
        self.last_point = Some(point);
    }

    fn finish(self) -> RouteSummary {
        let elapsed = self.started.elapsed().as_secs();
        RouteSummary {
            point_count: self.point_count,
            feature_count: self.feature_count,
            distance: self.distance,
            elapsed_time: i32::try_from(elapsed).unwrap_or(i32::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn create_test_store() -> FeatureStore {
        FeatureStore::from_features(vec![
            Feature::new(Point::new(407_838_351, -746_143_763), "Patriots Path"),
            Feature::new(Point::new(408_122_808, -743_999_179), "New Jersey 10"),
            Feature::new(Point::new(413_628_156, -749_015_468), "Shohola"),
            Feature::new(Point::new(419_999_544, -740_371_136), ""),
        ])
    }

    fn create_test_service() -> RouteGuide {
        RouteGuide::new(create_test_store())
    }

    fn ok_stream<T>(items: Vec<T>) -> impl Stream<Item = Result<T>> + Unpin {
        tokio_stream::iter(items.into_iter().map(Ok))
    }

    #[test]
    fn test_get_feature() {
        let service = create_test_service();

        let found = service.get_feature(&Point::new(408_122_808, -743_999_179));
        assert_eq!(found.name, "New Jersey 10");

        let point = Point::new(0, 0);
        let missing = service.get_feature(&point);
        assert_eq!(missing, Feature::unnamed(point));
    }

    #[tokio::test]
    async fn test_list_features_world() {
        let service = create_test_service();
        let (tx, mut rx) = mpsc::channel(16);

        let sent = service.list_features(&Rectangle::world(), &tx).await.unwrap();
        drop(tx);

        let mut received = Vec::new();
        while let Some(feature) = rx.recv().await {
            received.push(feature);
        }
        assert_eq!(sent, 4);
        assert_eq!(received, service.store().features());
    }

    #[tokio::test]
    async fn test_list_features_stops_when_receiver_dropped() {
        let service = create_test_service();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let result = service.list_features(&Rectangle::world(), &tx).await;
        assert!(matches!(result, Err(RouteGuideError::StreamClosed)));
    }

    #[tokio::test]
    async fn test_list_features_stops_when_receiver_dropped_midway() {
        let service = Arc::new(create_test_service());
        let (tx, mut rx) = mpsc::channel(1);

        let listing = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.list_features(&Rectangle::world(), &tx).await })
        };

        let first = rx.recv().await.unwrap();
        assert_eq!(first, service.store().features()[0]);
        drop(rx);

        let result = tokio::time::timeout(Duration::from_secs(5), listing)
            .await
            .expect("listing kept running after the receiver was dropped")
            .unwrap();
        assert!(matches!(result, Err(RouteGuideError::StreamClosed)));
    }

    #[tokio::test]
    async fn test_spawn_list_features_task_ends_when_stream_dropped() {
        let service = Arc::new(RouteGuide::with_config(
            create_test_store(),
            Config { stream_buffer: 1 },
        ));

        let mut features = service.spawn_list_features(Rectangle::world());
        let first = features.next().await.unwrap();
        assert_eq!(first.name, "Patriots Path");
        drop(features);

        // The spawned task holds a clone of the service until it returns
        let finished = async {
            while Arc::strong_count(&service) > 1 {
                tokio::task::yield_now().await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), finished)
            .await
            .expect("spawned listing outlived its stream");
    }

    #[tokio::test]
    async fn test_spawn_list_features() {
        let service = Arc::new(RouteGuide::with_config(
            create_test_store(),
            Config { stream_buffer: 1 },
        ));
        let rect = Rectangle::new(
            Point::new(400_000_000, -750_000_000),
            Point::new(410_000_000, -740_000_000),
        );

        let names: Vec<String> = service
            .spawn_list_features(rect)
            .map(|feature| feature.name)
            .collect()
            .await;
        assert_eq!(names, vec!["Patriots Path", "New Jersey 10"]);
    }

    #[tokio::test]
    async fn test_record_route_summary() {
        let service = create_test_service();
        let p1 = Point::new(407_838_351, -746_143_763);
        let p2 = Point::new(410_000_000, -745_000_000);
        let p3 = Point::new(413_628_156, -749_015_468);

        let summary = service
            .record_route(ok_stream(vec![p1, p2, p3]))
            .await
            .unwrap();

        assert_eq!(summary.point_count, 3);
        assert_eq!(summary.feature_count, 2);
        assert_eq!(
            summary.distance,
            utils::distance(&p1, &p2) + utils::distance(&p2, &p3)
        );
    }

    #[tokio::test]
    async fn test_record_route_counts_every_feature_at_a_point() {
        let p = Point::new(5, 5);
        let service = RouteGuide::new(FeatureStore::from_features(vec![
            Feature::new(p, "a"),
            Feature::new(Point::new(6, 6), "elsewhere"),
            Feature::new(p, "b"),
        ]));

        let summary = service.record_route(ok_stream(vec![p])).await.unwrap();
        assert_eq!(summary.point_count, 1);
        assert_eq!(summary.feature_count, 2);

        let summary = service.record_route(ok_stream(vec![p, p])).await.unwrap();
        assert_eq!(summary.feature_count, 4);
    }

    #[tokio::test]
    async fn test_record_route_empty() {
        let service = create_test_service();
        let summary = service.record_route(ok_stream(Vec::<Point>::new())).await.unwrap();
        assert_eq!(summary, RouteSummary::default());
    }

    #[tokio::test]
    async fn test_record_route_single_point_has_no_distance() {
        let service = create_test_service();
        let summary = service
            .record_route(ok_stream(vec![Point::new(1, 1)]))
            .await
            .unwrap();
        assert_eq!(summary.point_count, 1);
        assert_eq!(summary.distance, 0);
    }

    #[tokio::test]
    async fn test_record_route_receive_error_discards_summary() {
        let service = create_test_service();
        let points = tokio_stream::iter(vec![
            Ok(Point::new(407_838_351, -746_143_763)),
            Err(RouteGuideError::Transport("connection reset".to_string())),
            Ok(Point::new(0, 0)),
        ]);

        let result = service.record_route(points).await;
        assert!(matches!(result, Err(RouteGuideError::Transport(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_route_elapsed_time_is_truncated() {
        let service = create_test_service();
        let (tx, rx) = mpsc::channel(4);

        let client = tokio::spawn(async move {
            tx.send(Ok(Point::new(0, 0))).await.unwrap();
            tokio::time::sleep(Duration::from_millis(2_900)).await;
            tx.send(Ok(Point::new(0, 1))).await.unwrap();
        });

        let summary = service
            .record_route(ReceiverStream::new(rx))
            .await
            .unwrap();
        client.await.unwrap();

        assert_eq!(summary.point_count, 2);
        assert_eq!(summary.elapsed_time, 2);
    }

    #[tokio::test]
    async fn test_route_chat_returns_location_history() {
        let service = create_test_service();
        let here = Point::new(0, 1);
        let there = Point::new(0, 2);
        let notes = vec![
            RouteNote::new(here, "N1"),
            RouteNote::new(there, "elsewhere"),
            RouteNote::new(here, "N2"),
        ];
        let (tx, mut rx) = mpsc::channel(16);

        service.route_chat(ok_stream(notes), &tx).await.unwrap();
        drop(tx);

        let mut replies = Vec::new();
        while let Some(note) = rx.recv().await {
            replies.push(note.message);
        }
        // [N1] for the first note, [elsewhere] for the second, [N1, N2] for the third
        assert_eq!(replies, vec!["N1", "elsewhere", "N1", "N2"]);
    }

    #[tokio::test]
    async fn test_route_chat_shares_history_between_sessions() {
        let service = create_test_service();
        let here = Point::new(7, 7);

        let (tx, mut rx) = mpsc::channel(16);
        service
            .route_chat(ok_stream(vec![RouteNote::new(here, "from a")]), &tx)
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().message, "from a");

        service
            .route_chat(ok_stream(vec![RouteNote::new(here, "from b")]), &tx)
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().message, "from a");
        assert_eq!(rx.recv().await.unwrap().message, "from b");
    }

    #[tokio::test]
    async fn test_route_chat_keeps_receiving_while_outbound_is_full() {
        const NOTES: usize = 10;

        let service = Arc::new(create_test_service());
        let here = Point::new(3, 3);
        let (in_tx, in_rx) = mpsc::channel(1);
        let (out_tx, mut out_rx) = mpsc::channel(1);

        let session = {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .route_chat(ReceiverStream::new(in_rx), &out_tx)
                    .await
            })
        };

        // Send everything before reading any reply
        let sending = async {
            for i in 0..NOTES {
                in_tx
                    .send(Ok(RouteNote::new(here, i.to_string())))
                    .await
                    .unwrap();
            }
            drop(in_tx);
        };
        tokio::time::timeout(Duration::from_secs(5), sending)
            .await
            .expect("inbound side stalled");

        let mut replies = 0;
        while out_rx.recv().await.is_some() {
            replies += 1;
        }
        session.await.unwrap().unwrap();

        // Snapshot k carries k notes
        assert_eq!(replies, NOTES * (NOTES + 1) / 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_route_chat_queue_is_bounded_by_stream_buffer() {
        const NOTES: usize = 20;

        let service = Arc::new(RouteGuide::with_config(
            create_test_store(),
            Config { stream_buffer: 2 },
        ));
        let here = Point::new(4, 4);
        let (in_tx, in_rx) = mpsc::channel(1);
        let (out_tx, mut out_rx) = mpsc::channel(1);

        let session = {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .route_chat(ReceiverStream::new(in_rx), &out_tx)
                    .await
            })
        };
        let feeder = tokio::spawn(async move {
            for i in 0..NOTES {
                in_tx
                    .send(Ok(RouteNote::new(here, i.to_string())))
                    .await
                    .unwrap();
            }
        });

        // The clock only advances once every task is blocked
        tokio::time::sleep(Duration::from_secs(1)).await;

        // One reply in `outbound`, one snapshot being sent, two queued, one waiting
        let stored = service.notes().notes_at(&here).len();
        assert!(stored <= 5, "session read {stored} notes without being drained");

        let mut replies = 0;
        while out_rx.recv().await.is_some() {
            replies += 1;
        }
        feeder.await.unwrap();
        session.await.unwrap().unwrap();

        assert_eq!(replies, NOTES * (NOTES + 1) / 2);
    }

    #[tokio::test]
    async fn test_route_chat_receive_error_propagates() {
        let service = create_test_service();
        let inbound = tokio_stream::iter(vec![
            Ok(RouteNote::new(Point::new(1, 1), "ok")),
            Err(RouteGuideError::Transport("stream reset".to_string())),
        ]);
        let (tx, _rx) = mpsc::channel(16);

        let result = service.route_chat(inbound, &tx).await;
        assert!(matches!(result, Err(RouteGuideError::Transport(_))));
    }

    #[tokio::test]
    async fn test_route_chat_send_error_propagates() {
        let service = create_test_service();
        let (tx, rx) = mpsc::channel(16);
        drop(rx);

        let result = service
            .route_chat(ok_stream(vec![RouteNote::new(Point::new(2, 2), "lost")]), &tx)
            .await;
        assert!(matches!(result, Err(RouteGuideError::StreamClosed)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_chat_sessions_lose_nothing() {
        const SESSIONS: usize = 8;
        const PER_SESSION: usize = 50;

        let service = Arc::new(create_test_service());
        let here = Point::new(11, 11);

        let sessions: Vec<_> = (0..SESSIONS)
            .map(|s| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    let notes: Vec<RouteNote> = (0..PER_SESSION)
                        .map(|i| RouteNote::new(here, format!("{s}-{i}")))
                        .collect();
                    let (tx, mut rx) = mpsc::channel(8);
                    let drain = tokio::spawn(async move {
                        let mut last = None;
                        while let Some(note) = rx.recv().await {
                            last = Some(note);
                        }
                        last
                    });
                    service.route_chat(ok_stream(notes), &tx).await.unwrap();
                    drop(tx);
                    drain.await.unwrap()
                })
            })
            .collect();

        for (s, session) in sessions.into_iter().enumerate() {
            // The last reply of a session is its own last note
            let last = session.await.unwrap().unwrap();
            assert_eq!(last.message, format!("{s}-{}", PER_SESSION - 1));
        }

        assert_eq!(service.notes().notes_at(&here).len(), SESSIONS * PER_SESSION);
    }
}
