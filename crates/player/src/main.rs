use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rgbd_core::types::DbId;
use rgbd_core::{Point, SyncConfig};
use rgbd_events::SignalBus;
use rgbd_store::{AnnotationList, AnnotationStore, HttpAnnotationStore, InMemoryAnnotationStore};
use rgbd_sync::{
    BoxCapture, MemorySurface, SimulatedMedia, SubmitOutcome, SyncEngine, TracingHook,
};
use tokio_util::sync::CancellationToken;

/// Length of the simulated clip in seconds.
const CLIP_SECS: f64 = 12.0;

/// The depth sensor's clock runs slightly fast, so the engine has drift to
/// correct.
const DEPTH_RATE: f64 = 1.01;

/// Wall-clock period of the shared media clock.
const CLOCK_TICK: Duration = Duration::from_millis(33);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rgbd_player=info,rgbd_sync=debug,rgbd_store=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = SyncConfig::from_env().context("invalid sync configuration")?;
    tracing::info!(
        fps = config.fps,
        reference_width = config.reference_width,
        reference_height = config.reference_height,
        drift_tolerance = config.drift_tolerance,
        seek_timeout_ms = config.seek_timeout.as_millis() as u64,
        "Loaded sync configuration"
    );

    let scenario_id: DbId = match std::env::var("SCENARIO_ID") {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("SCENARIO_ID must be an integer, got '{raw}'"))?,
        Err(_) => 1,
    };

    // --- Annotation store ---
    let store: Arc<dyn AnnotationStore> = match std::env::var("ANNOTATION_STORE_URL") {
        Ok(url) => {
            tracing::info!(%url, "Using remote annotation store");
            Arc::new(HttpAnnotationStore::new(url))
        }
        Err(_) => {
            tracing::info!("ANNOTATION_STORE_URL not set, using in-memory annotation store");
            Arc::new(InMemoryAnnotationStore::new())
        }
    };

    // --- Signal bus ---
    let bus = Arc::new(SignalBus::default());

    // --- Media and overlays ---
    let rgb = Arc::new(SimulatedMedia::new("rgb"));
    let depth = Arc::new(SimulatedMedia::new("depth").with_rate(DEPTH_RATE));
    let rgb_overlay = Arc::new(MemorySurface::new(
        config.reference_width,
        config.reference_height,
    ));
    let depth_overlay = Arc::new(MemorySurface::new(
        config.reference_width / 2.0,
        config.reference_height / 2.0,
    ));

    // --- Sync engine ---
    let engine = Arc::new(
        SyncEngine::new(config.clone(), Arc::clone(&bus))
            .with_primary(rgb.clone())
            .with_secondary(depth.clone())
            .with_overlay(rgb_overlay.clone())
            .with_overlay(depth_overlay.clone())
            .with_hook(Arc::new(TracingHook::new(config.trace_events))),
    );

    let cancel = CancellationToken::new();
    let engine_handle = tokio::spawn(Arc::clone(&engine).run(cancel.clone()));
    let clock_handle = tokio::spawn(run_clock(
        vec![Arc::clone(&rgb), Arc::clone(&depth)],
        cancel.clone(),
    ));

    let session = Session {
        engine: Arc::clone(&engine),
        store,
        capture: BoxCapture::new(&bus),
        list: AnnotationList::new(Arc::clone(&bus)),
        scenario_id,
    };

    // Streams report metadata once the engine is listening.
    tokio::time::sleep(Duration::from_millis(50)).await;
    for media in [&rgb, &depth] {
        media.load_metadata(CLIP_SECS);
        media.load_data();
    }

    tokio::select! {
        result = session.run() => result?,
        _ = shutdown_signal() => tracing::info!("Interrupted, shutting down"),
    }

    tracing::info!(
        rgb_box = ?rgb_overlay.drawn(),
        depth_box = ?depth_overlay.drawn(),
        "Final overlay state"
    );

    // --- Shutdown ---
    cancel.cancel();
    engine_handle.await.context("sync engine task failed")?;
    clock_handle.await.context("media clock task failed")?;
    tracing::info!("Session complete");
    Ok(())
}

/// The scripted annotation session the binary plays through.
struct Session {
    engine: Arc<SyncEngine>,
    store: Arc<dyn AnnotationStore>,
    capture: BoxCapture,
    list: AnnotationList,
    scenario_id: DbId,
}

impl Session {
    async fn run(mut self) -> anyhow::Result<()> {
        // Play for a while, then pause on whatever frame we reached.
        self.engine.toggle_play().await;
        tokio::time::sleep(Duration::from_millis(1500)).await;
        self.engine.toggle_play().await;

        let state = self.engine.playback_state();
        tracing::info!(
            time = state.current_time,
            frame = state.frame_index,
            "Paused for annotation"
        );

        // Draw a box right-to-left and label it.
        self.capture.pointer_down(Point::new(310.0, 260.0));
        self.capture.pointer_move(Point::new(120.0, 140.0));
        self.capture.pointer_up();
        self.capture.select_label("car");
        tracing::info!(draft = %self.capture.info_text(), "Box drawn");

        match self.capture.submit(self.store.as_ref(), self.scenario_id).await {
            Ok(SubmitOutcome::Submitted(created)) => match created.rows {
                Some(rows) => {
                    tracing::info!(count = rows.len(), "Annotation stored");
                    self.list.replace(rows);
                }
                None => {
                    tracing::info!("Annotation stored, reloading the list");
                    if let Err(e) = self.list.refresh(self.store.as_ref(), self.scenario_id).await {
                        tracing::warn!(error = %e, "Could not load annotation list");
                    }
                }
            },
            Ok(outcome) => tracing::info!(?outcome, "Nothing submitted"),
            Err(e) => {
                tracing::warn!(error = %e, "Submission failed, keeping the draft");
                if let Err(e) = self.list.refresh(self.store.as_ref(), self.scenario_id).await {
                    tracing::warn!(error = %e, "Could not load annotation list");
                }
            }
        }

        // Jump away, then back to the stored box through the list.
        self.engine.seek_by_slider_percent(75.0).await;
        if let Some(id) = self.list.rows().first().map(|a| a.id) {
            self.list.activate(id)?;
            // The engine seeks on its own task; give it time to settle.
            tokio::time::sleep(self.engine.config().seek_timeout).await;
            tracing::info!(
                id,
                selected = ?self.engine.selected_box(),
                frame = %self.engine.display().frame_text,
                "Annotation activated"
            );
        }

        // Scrubbing to the middle clears the selection.
        let outcome = self.engine.seek_by_slider_percent(50.0).await;
        tracing::info!(
            ?outcome,
            time = %self.engine.display().time_text,
            selected = ?self.engine.selected_box(),
            "Scrubbed to the middle"
        );
        Ok(())
    }
}

/// Advance every simulated handle on a shared wall clock.
async fn run_clock(media: Vec<Arc<SimulatedMedia>>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(CLOCK_TICK);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                for handle in &media {
                    handle.tick(CLOCK_TICK);
                }
            }
        }
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
