//! Pointer-driven drawing of new boxes on the color stream.
//!
//! A drag produces a draft box in canonical pixel space. The draft keeps
//! whatever sign the drag gave it; it is normalized only when read or
//! submitted. Submission tags the box with the latest frame seen on the
//! signal bus, so capture never reaches into the engine.
//!
//! An optional preview surface shows the live draft at canonical scale.

use std::sync::Arc;

use rgbd_core::types::DbId;
use rgbd_core::{BoundingBox, NewAnnotation, Point, Stream};
use rgbd_events::{FrameChanged, SignalBus, SignalEnvelope, SyncSignal};
use rgbd_store::{AnnotationStore, Created, StoreError};
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::overlay::{OverlaySurface, PixelRect};

/// Placeholder shown for each field while there is no draft.
const NO_VALUE: &str = "–";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptureState {
    Idle,
    Dragging { origin: Point, draft: BoundingBox },
    Drawn { draft: BoundingBox },
}

/// Result of a submit attempt that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Nothing has been drawn.
    NoDraft,
    /// The draft has no area after rounding; the store was not called.
    Discarded,
    /// Stored. The refreshed list is absent when the re-read after the
    /// create failed.
    Submitted(Created),
}

pub struct BoxCapture {
    state: CaptureState,
    label: String,
    stream: Stream,
    last_frame: FrameChanged,
    signals: broadcast::Receiver<SignalEnvelope>,
    preview: Option<Arc<dyn OverlaySurface>>,
}

impl BoxCapture {
    /// Start idle, listening to frame updates on `bus`.
    pub fn new(bus: &SignalBus) -> Self {
        Self {
            state: CaptureState::Idle,
            label: String::new(),
            stream: Stream::Rgb,
            last_frame: FrameChanged {
                current_time: 0.0,
                frame_index: 0,
            },
            signals: bus.subscribe(),
            preview: None,
        }
    }

    /// Paint the live draft on `surface`, one canonical pixel per surface
    /// pixel.
    pub fn with_preview(mut self, surface: Arc<dyn OverlaySurface>) -> Self {
        self.preview = Some(surface);
        self.repaint();
        self
    }

    fn repaint(&self) {
        let Some(surface) = &self.preview else {
            return;
        };
        surface.clear();
        if let Some(b) = self.draft() {
            surface.stroke_rect(PixelRect {
                x: b.x as i64,
                y: b.y as i64,
                width: b.width as i64,
                height: b.height as i64,
            });
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    // ---- pointer input ----

    pub fn pointer_down(&mut self, at: Point) {
        self.state = CaptureState::Dragging {
            origin: at,
            draft: BoundingBox::new(at.x, at.y, 0.0, 0.0),
        };
        self.repaint();
    }

    /// Stretch the draft to `at`. Ignored unless a drag is in progress.
    pub fn pointer_move(&mut self, at: Point) {
        if let CaptureState::Dragging { origin, .. } = self.state {
            self.state = CaptureState::Dragging {
                origin,
                draft: BoundingBox::from_drag(origin, at),
            };
            self.repaint();
        }
    }

    pub fn pointer_up(&mut self) {
        self.finish_drag();
    }

    /// Leaving the surface mid-drag ends the drag where it stands.
    pub fn pointer_leave(&mut self) {
        self.finish_drag();
    }

    fn finish_drag(&mut self) {
        if let CaptureState::Dragging { draft, .. } = self.state {
            self.state = CaptureState::Drawn { draft };
        }
    }

    // ---- draft ----

    /// The current draft, normalized and rounded to whole pixels.
    pub fn draft(&self) -> Option<BoundingBox> {
        match self.state {
            CaptureState::Idle => None,
            CaptureState::Dragging { draft, .. } | CaptureState::Drawn { draft } => {
                Some(draft.normalized().rounded())
            }
        }
    }

    /// One-line readout of the draft geometry.
    pub fn info_text(&self) -> String {
        match self.draft() {
            Some(b) => format!("x: {}, y: {}, w: {}, h: {}", b.x, b.y, b.width, b.height),
            None => format!("x: {NO_VALUE}, y: {NO_VALUE}, w: {NO_VALUE}, h: {NO_VALUE}"),
        }
    }

    pub fn select_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn clear(&mut self) {
        self.state = CaptureState::Idle;
        self.repaint();
    }

    // ---- frame tracking ----

    /// Drain pending bus signals, keeping the newest frame update.
    ///
    /// The preview is repainted when a frame arrived, since the stream
    /// underneath it has moved.
    pub fn observe_signals(&mut self) -> FrameChanged {
        let mut moved = false;
        loop {
            match self.signals.try_recv() {
                Ok(SignalEnvelope {
                    signal: SyncSignal::FrameChanged(frame),
                    ..
                }) => {
                    self.last_frame = frame;
                    moved = true;
                }
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Box capture skipped stale frame updates");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        if moved {
            self.repaint();
        }
        self.last_frame
    }

    pub fn last_frame(&self) -> FrameChanged {
        self.last_frame
    }

    // ---- submission ----

    /// Build the create request for the current draft, if it has area.
    pub fn request(&mut self) -> Option<NewAnnotation> {
        let frame = self.observe_signals();
        let draft = self.draft()?;
        if !draft.has_area() {
            return None;
        }
        Some(NewAnnotation::from_box(
            &draft,
            frame.frame_index,
            frame.current_time,
            self.stream,
            self.label.clone(),
        ))
    }

    /// Send the draft to `store`.
    ///
    /// Any `Ok` from the store means the record exists, so the draft is
    /// cleared even when no refreshed list came back. On error the draft
    /// and label are kept so the user can retry.
    pub async fn submit(
        &mut self,
        store: &dyn AnnotationStore,
        scenario_id: DbId,
    ) -> Result<SubmitOutcome, StoreError> {
        if self.draft().is_none() {
            return Ok(SubmitOutcome::NoDraft);
        }
        let Some(request) = self.request() else {
            tracing::debug!("Discarding zero-area box");
            return Ok(SubmitOutcome::Discarded);
        };

        match store.create(scenario_id, &request).await {
            Ok(created) => {
                tracing::info!(
                    scenario_id,
                    frame_index = request.frame_index,
                    label = %request.label,
                    refreshed = created.rows.is_some(),
                    "Annotation submitted"
                );
                self.clear();
                Ok(SubmitOutcome::Submitted(created))
            }
            Err(e) => {
                tracing::warn!(scenario_id, error = %e, "Annotation submission failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::MemorySurface;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use rgbd_core::Annotation;
    use rgbd_store::InMemoryAnnotationStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum Script {
        Stored,
        /// The record is written but the re-read fails.
        StoredUnlisted,
        Fail,
    }

    /// Records every create request and answers with a fixed result.
    struct ScriptedStore {
        calls: AtomicUsize,
        requests: Mutex<Vec<NewAnnotation>>,
        script: Script,
    }

    impl ScriptedStore {
        fn new(fail: bool) -> Self {
            Self::scripted(if fail { Script::Fail } else { Script::Stored })
        }

        fn scripted(script: Script) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
                script,
            }
        }
    }

    #[async_trait]
    impl AnnotationStore for ScriptedStore {
        async fn create(
            &self,
            _scenario_id: DbId,
            request: &NewAnnotation,
        ) -> Result<Created, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            match self.script {
                Script::Stored => Ok(Created {
                    annotation: None,
                    rows: Some(Vec::new()),
                }),
                Script::StoredUnlisted => Ok(Created {
                    annotation: None,
                    rows: None,
                }),
                Script::Fail => Err(StoreError::Api {
                    status: 500,
                    body: "boom".to_string(),
                }),
            }
        }

        async fn list(&self, _scenario_id: DbId) -> Result<Vec<Annotation>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn frame(bus: &SignalBus, frame_index: i64, current_time: f64) {
        bus.publish(SyncSignal::FrameChanged(FrameChanged {
            current_time,
            frame_index,
        }));
    }

    fn drag(capture: &mut BoxCapture, from: (f64, f64), to: (f64, f64)) {
        capture.pointer_down(Point::new(from.0, from.1));
        capture.pointer_move(Point::new(to.0, to.1));
        capture.pointer_up();
    }

    // -- drawing --------------------------------------------------------

    #[test]
    fn move_without_down_does_nothing() {
        let bus = SignalBus::default();
        let mut capture = BoxCapture::new(&bus);
        capture.pointer_move(Point::new(50.0, 50.0));
        assert_eq!(capture.state(), CaptureState::Idle);
        assert_eq!(capture.draft(), None);
    }

    #[test]
    fn drag_up_and_left_is_normalized_on_read() {
        let bus = SignalBus::default();
        let mut capture = BoxCapture::new(&bus);
        drag(&mut capture, (110.0, 60.0), (10.0, 10.0));

        assert_matches!(capture.state(), CaptureState::Drawn { draft } if draft.width == -100.0);
        assert_eq!(
            capture.draft(),
            Some(BoundingBox::new(10.0, 10.0, 100.0, 50.0))
        );
    }

    #[test]
    fn leaving_the_surface_ends_the_drag() {
        let bus = SignalBus::default();
        let mut capture = BoxCapture::new(&bus);
        capture.pointer_down(Point::new(0.0, 0.0));
        capture.pointer_move(Point::new(20.0, 30.0));
        capture.pointer_leave();
        capture.pointer_move(Point::new(400.0, 400.0));

        assert_eq!(capture.draft(), Some(BoundingBox::new(0.0, 0.0, 20.0, 30.0)));
    }

    #[test]
    fn info_text_shows_placeholders_then_geometry() {
        let bus = SignalBus::default();
        let mut capture = BoxCapture::new(&bus);
        assert_eq!(capture.info_text(), "x: –, y: –, w: –, h: –");

        drag(&mut capture, (10.4, 10.6), (110.0, 60.0));
        assert_eq!(capture.info_text(), "x: 10, y: 11, w: 100, h: 49");
    }

    #[test]
    fn latest_frame_update_wins() {
        let bus = SignalBus::default();
        let mut capture = BoxCapture::new(&bus);
        frame(&bus, 10, 0.34);
        frame(&bus, 42, 1.4);

        assert_eq!(capture.observe_signals().frame_index, 42);
        assert_eq!(capture.last_frame().current_time, 1.4);
    }

    // -- submission -----------------------------------------------------

    #[tokio::test]
    async fn submit_builds_exact_request_and_clears_draft() {
        let bus = SignalBus::default();
        let store = ScriptedStore::new(false);
        let mut capture = BoxCapture::new(&bus);

        frame(&bus, 42, 1.4);
        drag(&mut capture, (10.0, 10.0), (110.0, 60.0));
        capture.select_label("car");

        let outcome = capture.submit(&store, 7).await.unwrap();
        assert_matches!(outcome, SubmitOutcome::Submitted(_));
        assert_eq!(
            store.requests.lock().unwrap().clone(),
            vec![NewAnnotation {
                frame_index: 42,
                time_sec: 1.4,
                stream: Stream::Rgb,
                label: "car".to_string(),
                x: 10,
                y: 10,
                width: 100,
                height: 50,
            }]
        );
        assert_eq!(capture.state(), CaptureState::Idle);
        assert_eq!(capture.label(), "car");
    }

    #[tokio::test]
    async fn zero_area_draft_never_reaches_the_store() {
        let bus = SignalBus::default();
        let store = ScriptedStore::new(false);
        let mut capture = BoxCapture::new(&bus);
        capture.select_label("car");

        drag(&mut capture, (10.0, 10.0), (10.0, 80.0));
        assert_matches!(
            capture.submit(&store, 1).await,
            Ok(SubmitOutcome::Discarded)
        );

        // Rounds down to zero width.
        drag(&mut capture, (10.0, 10.0), (10.3, 80.0));
        assert_matches!(
            capture.submit(&store, 1).await,
            Ok(SubmitOutcome::Discarded)
        );
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submit_without_draft_is_a_no_op() {
        let bus = SignalBus::default();
        let store = ScriptedStore::new(false);
        let mut capture = BoxCapture::new(&bus);

        assert_matches!(capture.submit(&store, 1).await, Ok(SubmitOutcome::NoDraft));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_submit_keeps_draft_and_label() {
        let bus = SignalBus::default();
        let store = ScriptedStore::new(true);
        let mut capture = BoxCapture::new(&bus);
        drag(&mut capture, (10.0, 10.0), (110.0, 60.0));
        capture.select_label("pedestrian");

        assert_matches!(
            capture.submit(&store, 1).await,
            Err(StoreError::Api { status: 500, .. })
        );
        assert_eq!(
            capture.draft(),
            Some(BoundingBox::new(10.0, 10.0, 100.0, 50.0))
        );
        assert_eq!(capture.label(), "pedestrian");
    }

    #[tokio::test]
    async fn stored_but_unlisted_submit_still_clears_the_draft() {
        let bus = SignalBus::default();
        let store = ScriptedStore::scripted(Script::StoredUnlisted);
        let mut capture = BoxCapture::new(&bus);
        drag(&mut capture, (10.0, 10.0), (110.0, 60.0));
        capture.select_label("car");

        assert_matches!(
            capture.submit(&store, 1).await,
            Ok(SubmitOutcome::Submitted(Created { rows: None, .. }))
        );
        assert_eq!(capture.draft(), None);

        // A second press has nothing left to send, so no duplicate row.
        assert_matches!(capture.submit(&store, 1).await, Ok(SubmitOutcome::NoDraft));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_label_is_rejected_by_the_store() {
        let bus = SignalBus::default();
        let store = InMemoryAnnotationStore::new();
        let mut capture = BoxCapture::new(&bus);
        drag(&mut capture, (10.0, 10.0), (110.0, 60.0));

        assert_matches!(
            capture.submit(&store, 1).await,
            Err(StoreError::Rejected(_))
        );
        assert!(capture.draft().is_some());
        assert!(store.is_empty().await);
    }

    // -- preview --------------------------------------------------------

    fn preview(bus: &SignalBus) -> (BoxCapture, Arc<MemorySurface>) {
        let surface = Arc::new(MemorySurface::new(848.0, 480.0));
        let capture = BoxCapture::new(bus).with_preview(surface.clone());
        (capture, surface)
    }

    #[test]
    fn preview_follows_the_drag_at_canonical_scale() {
        let bus = SignalBus::default();
        let (mut capture, surface) = preview(&bus);
        assert_eq!(surface.drawn(), None);

        capture.pointer_down(Point::new(110.0, 60.0));
        capture.pointer_move(Point::new(40.0, 20.0));
        assert_eq!(
            surface.drawn(),
            Some(PixelRect {
                x: 40,
                y: 20,
                width: 70,
                height: 40
            })
        );

        capture.pointer_move(Point::new(10.4, 10.6));
        capture.pointer_up();
        assert_eq!(
            surface.drawn(),
            Some(PixelRect {
                x: 10,
                y: 11,
                width: 100,
                height: 49
            })
        );
    }

    #[test]
    fn preview_survives_frame_updates_and_goes_on_clear() {
        let bus = SignalBus::default();
        let (mut capture, surface) = preview(&bus);
        drag(&mut capture, (10.0, 10.0), (110.0, 60.0));

        // Something else wiped the surface; the next frame repaints it.
        surface.clear();
        frame(&bus, 12, 0.4);
        capture.observe_signals();
        assert_eq!(surface.drawn().map(|r| (r.width, r.height)), Some((100, 50)));

        capture.clear();
        assert_eq!(surface.drawn(), None);
    }

    #[tokio::test]
    async fn preview_is_cleared_after_a_successful_submit() {
        let bus = SignalBus::default();
        let store = ScriptedStore::new(false);
        let (mut capture, surface) = preview(&bus);
        drag(&mut capture, (10.0, 10.0), (110.0, 60.0));
        capture.select_label("car");

        capture.submit(&store, 1).await.unwrap();
        assert_eq!(surface.drawn(), None);
    }
}
