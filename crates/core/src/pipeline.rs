//! Pipeline orchestration: component wiring, lifecycle, and drive loops
//!
//! A pipeline owns its components exclusively. Starting it spawns one drive
//! loop per stream, one worker per detector, one ordering gate per stream,
//! one alert dispatcher, and a supervisor that owns the teardown path. Frames
//! fan out from every stream to every detector; detector invocations overlap
//! freely across instances, and the per-stream gate re-aligns results so
//! alerts leave in frame-sequence order.
//!
//! Lifecycle: `Idle → Running → Stopping → Stopped`, with `Running → Failed`
//! when a stream or detector errors. Either way every attached component
//! receives exactly one `clean_up`; termination errors are collected into the
//! report, never re-raised.

use crate::alert::Alert;
use crate::component::ComponentInstance;
use crate::detect::{AsyncDetector, DetectionResult};
use crate::dispatch::{dispatch, Cooldown, NamedSubscriber};
use crate::error::{ComponentError, DetectorError, PipelineError, SettingsError, StreamError};
use crate::video::{AsyncVideoStream, Frame};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lifecycle state of a pipeline, observable while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Built but not started
    Idle,
    /// Drive loops are pumping frames
    Running,
    /// Shutdown signalled, teardown in progress
    Stopping,
    /// Terminated cleanly
    Stopped,
    /// Terminated because a stream or detector failed
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Running => "running",
            PipelineState::Stopping => "stopping",
            PipelineState::Stopped => "stopped",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tunable knobs of a pipeline, loadable from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Frames buffered per detector queue before drive loops back-pressure
    pub frame_buffer: usize,

    /// Alerts buffered between the ordering gates and the dispatcher
    pub alert_buffer: usize,

    /// Per-call detector timeout in seconds; a timed-out call is a detector
    /// failure. `None` disables the timeout.
    pub detect_timeout: Option<f64>,

    /// Per-call frame-read timeout in seconds. `None` (the default) lets a
    /// quiet camera block indefinitely without being declared dead.
    pub frame_timeout: Option<f64>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            frame_buffer: 8,
            alert_buffer: 100,
            detect_timeout: Some(30.0),
            frame_timeout: None,
        }
    }
}

impl PipelineSettings {
    /// Load settings from a YAML file; absent keys keep their defaults.
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }
}

/// Per-stream attachment options.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    /// Minimum spacing between detector invocations for this stream, in
    /// seconds. Frames inside the window skip detection and count as empty
    /// results.
    pub detect_interval: Option<f64>,

    /// Minimum spacing between dispatched alerts from this stream, in
    /// seconds. Alerts inside the window are suppressed.
    pub alert_cooldown: Option<f64>,
}

/// One failed `clean_up` collected during termination.
#[derive(Debug)]
pub struct TerminationFailure {
    pub component: String,
    pub error: ComponentError,
}

/// Accounting returned when a pipeline terminates cleanly.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Frames pulled across all streams
    pub frames: u64,

    /// Alerts delivered to the subscriber set
    pub alerts: u64,

    /// Alerts suppressed by per-stream cooldowns
    pub alerts_suppressed: u64,

    /// Individual failed deliveries (never pipeline-fatal)
    pub subscriber_failures: u64,

    /// Clean-up errors, collected and never re-raised
    pub termination_failures: Vec<TerminationFailure>,
}

struct StreamSlot {
    name: String,
    options: StreamOptions,
    stream: Box<dyn AsyncVideoStream>,
}

struct DetectorSlot {
    name: String,
    detector: Box<dyn AsyncDetector>,
}

struct Components {
    streams: Vec<StreamSlot>,
    detectors: Vec<DetectorSlot>,
    subscribers: Vec<NamedSubscriber>,
}

/// Wires instantiated components into a [`Pipeline`].
///
/// Sync components are lifted onto the blocking adapter here; the running
/// pipeline only ever sees the async contracts.
pub struct PipelineBuilder {
    name: String,
    settings: PipelineSettings,
    streams: Vec<StreamSlot>,
    detectors: Vec<DetectorSlot>,
    subscribers: Vec<NamedSubscriber>,
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("streams", &self.streams.len())
            .field("detectors", &self.detectors.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: PipelineSettings::default(),
            streams: Vec::new(),
            detectors: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Attach a video stream component under a name.
    pub fn add_stream(
        self,
        name: impl Into<String>,
        instance: ComponentInstance,
    ) -> Result<Self, PipelineError> {
        self.add_stream_with(name, instance, StreamOptions::default())
    }

    /// Attach a video stream component with per-stream options.
    pub fn add_stream_with(
        mut self,
        name: impl Into<String>,
        instance: ComponentInstance,
        options: StreamOptions,
    ) -> Result<Self, PipelineError> {
        let name = name.into();
        let kind = instance.kind();
        let Some(stream) = instance.into_stream() else {
            return Err(PipelineError::WrongKind {
                name,
                expected: "video stream",
                actual: kind,
            });
        };
        self.streams.push(StreamSlot {
            name,
            options,
            stream,
        });
        Ok(self)
    }

    /// Attach a detector component under a name.
    pub fn add_detector(
        mut self,
        name: impl Into<String>,
        instance: ComponentInstance,
    ) -> Result<Self, PipelineError> {
        let name = name.into();
        let kind = instance.kind();
        let Some(detector) = instance.into_detector() else {
            return Err(PipelineError::WrongKind {
                name,
                expected: "detector",
                actual: kind,
            });
        };
        self.detectors.push(DetectorSlot { name, detector });
        Ok(self)
    }

    /// Attach an alert subscriber component under a name.
    pub fn add_subscriber(
        mut self,
        name: impl Into<String>,
        instance: ComponentInstance,
    ) -> Result<Self, PipelineError> {
        let name = name.into();
        let kind = instance.kind();
        let Some(subscriber) = instance.into_subscriber() else {
            return Err(PipelineError::WrongKind {
                name,
                expected: "subscriber",
                actual: kind,
            });
        };
        self.subscribers.push(NamedSubscriber::new(name, subscriber));
        Ok(self)
    }

    /// Finish wiring. A pipeline needs at least one stream, one detector,
    /// and one subscriber.
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        if self.streams.is_empty() {
            return Err(PipelineError::Missing {
                name: self.name,
                what: "video stream",
            });
        }
        if self.detectors.is_empty() {
            return Err(PipelineError::Missing {
                name: self.name,
                what: "detector",
            });
        }
        if self.subscribers.is_empty() {
            return Err(PipelineError::Missing {
                name: self.name,
                what: "subscriber",
            });
        }

        let (state_tx, state_rx) = watch::channel(PipelineState::Idle);
        Ok(Pipeline {
            name: self.name,
            settings: self.settings,
            state_tx: Arc::new(state_tx),
            state_rx,
            components: Some(Components {
                streams: self.streams,
                detectors: self.detectors,
                subscribers: self.subscribers,
            }),
            active: None,
        })
    }
}

struct Active {
    shutdown: Arc<watch::Sender<bool>>,
    supervisor: JoinHandle<Result<PipelineReport, PipelineError>>,
}

/// A wired pipeline owning its components through their whole lifecycle.
///
/// # Example
///
/// ```no_run
/// # use vigil_core::{ArgMap, ComponentKind, Pipeline, Registry};
/// # fn startup_registry() -> Registry { Registry::default() }
/// # tokio_test::block_on(async {
/// let registry = startup_registry();
/// let args = ArgMap::new();
///
/// let stream = registry
///     .instantiate(
///         registry
///             .find(ComponentKind::AsyncVideoStream, "test-pattern")
///             .unwrap(),
///         &args,
///     )
///     .unwrap();
/// # let detector = registry
/// #     .instantiate(registry.find(ComponentKind::SyncDetector, "frame-diff").unwrap(), &args)
/// #     .unwrap();
/// # let subscriber = registry
/// #     .instantiate(registry.find(ComponentKind::AsyncSubscriber, "log").unwrap(), &args)
/// #     .unwrap();
///
/// let mut pipeline = Pipeline::builder("front-door")
///     .add_stream("camera", stream).unwrap()
///     .add_detector("motion", detector).unwrap()
///     .add_subscriber("log", subscriber).unwrap()
///     .build()
///     .unwrap();
///
/// pipeline.start().await.unwrap();
/// let report = pipeline.join().await.unwrap();
/// println!("{} frames, {} alerts", report.frames, report.alerts);
/// # });
/// ```
pub struct Pipeline {
    name: String,
    settings: PipelineSettings,
    state_tx: Arc<watch::Sender<PipelineState>>,
    state_rx: watch::Receiver<PipelineState>,
    components: Option<Components>,
    active: Option<Active>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        *self.state_rx.borrow()
    }

    /// Watch lifecycle transitions, for dashboards and supervisors.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.state_tx.subscribe()
    }

    /// Spawn the pipeline's task set. Only valid from `Idle`.
    pub async fn start(&mut self) -> Result<(), PipelineError> {
        let state = self.state();
        if state != PipelineState::Idle {
            return Err(PipelineError::InvalidState {
                expected: "idle",
                actual: state,
            });
        }
        let components = self.components.take().ok_or(PipelineError::InvalidState {
            expected: "idle",
            actual: state,
        })?;

        let stream_count = components.streams.len();
        let detector_count = components.detectors.len();
        let subscriber_count = components.subscribers.len();
        let frame_buffer = self.settings.frame_buffer.max(1);
        let alert_buffer = self.settings.alert_buffer.max(1);
        let detect_timeout = self.settings.detect_timeout.map(Duration::from_secs_f64);
        let frame_timeout = self.settings.frame_timeout.map(Duration::from_secs_f64);

        let (shutdown_tx, _) = watch::channel(false);
        let shutdown = Arc::new(shutdown_tx);
        let (error_tx, error_rx) = mpsc::channel(stream_count + detector_count + 1);
        let (alert_tx, alert_rx) = mpsc::channel(alert_buffer);

        let detector_names: Vec<String> = components
            .detectors
            .iter()
            .map(|slot| slot.name.clone())
            .collect();

        // One bounded frame queue per detector; every stream fans out to all
        // of them.
        let mut frame_txs = Vec::with_capacity(detector_count);
        let mut frame_rxs = Vec::with_capacity(detector_count);
        for _ in 0..detector_count {
            let (tx, rx) = mpsc::channel(frame_buffer);
            frame_txs.push(tx);
            frame_rxs.push(rx);
        }

        // One ordering gate per stream, fed by every detector worker.
        let mut gate_txs = Vec::with_capacity(stream_count);
        let mut gate_rxs = Vec::with_capacity(stream_count);
        for _ in 0..stream_count {
            let (tx, rx) = mpsc::channel(frame_buffer * detector_count);
            gate_txs.push(tx);
            gate_rxs.push(rx);
        }

        // Publish `Running` before any task spawns so the supervisor's
        // terminal state always lands after it.
        self.state_tx.send_replace(PipelineState::Running);

        let mut workers = Vec::with_capacity(detector_count);
        for (index, (slot, frame_rx)) in
            components.detectors.into_iter().zip(frame_rxs).enumerate()
        {
            workers.push(tokio::spawn(run_detector(
                index,
                slot.name,
                slot.detector,
                detect_timeout,
                frame_rx,
                gate_txs.clone(),
                error_tx.clone(),
                shutdown.subscribe(),
            )));
        }
        drop(gate_txs);

        let mut drives = Vec::with_capacity(stream_count);
        let mut gates = Vec::with_capacity(stream_count);
        for (index, (slot, gate_rx)) in
            components.streams.into_iter().zip(gate_rxs).enumerate()
        {
            let cooldown = slot.options.alert_cooldown.map(Duration::from_secs_f64);
            gates.push(tokio::spawn(run_gate(
                slot.name.clone(),
                detector_names.clone(),
                cooldown,
                gate_rx,
                alert_tx.clone(),
            )));
            drives.push(tokio::spawn(drive_stream(
                index,
                slot.name,
                slot.stream,
                slot.options,
                frame_timeout,
                frame_txs.clone(),
                error_tx.clone(),
                shutdown.subscribe(),
            )));
        }
        drop(frame_txs);
        drop(alert_tx);
        drop(error_tx);

        let dispatcher = tokio::spawn(run_dispatch(components.subscribers, alert_rx));

        let supervisor = tokio::spawn(supervise(
            self.name.clone(),
            Arc::clone(&self.state_tx),
            Arc::clone(&shutdown),
            error_rx,
            TaskSet {
                drives,
                workers,
                gates,
                dispatcher,
            },
        ));

        self.active = Some(Active {
            shutdown,
            supervisor,
        });
        info!(
            "Pipeline '{}' started: {} stream(s), {} detector(s), {} subscriber(s)",
            self.name, stream_count, detector_count, subscriber_count
        );
        Ok(())
    }

    /// Signal shutdown and wait for full teardown. Valid while `Running` or
    /// `Stopping`.
    pub async fn stop(&mut self) -> Result<PipelineReport, PipelineError> {
        let active = self.take_active()?;
        info!("Stopping pipeline '{}'", self.name);
        self.state_tx.send_if_modified(|state| {
            if *state == PipelineState::Running {
                *state = PipelineState::Stopping;
                true
            } else {
                false
            }
        });
        let _ = active.shutdown.send(true);
        self.await_supervisor(active.supervisor).await
    }

    /// Wait for the pipeline to finish on its own: every stream exhausted, or
    /// a stream/detector failure.
    pub async fn join(&mut self) -> Result<PipelineReport, PipelineError> {
        let active = self.take_active()?;
        self.await_supervisor(active.supervisor).await
    }

    // Presence of the handle, not the state snapshot, decides whether there
    // is anything to wait on: a naturally-finished pipeline may already be
    // `Stopped` while its report is still unharvested.
    fn take_active(&mut self) -> Result<Active, PipelineError> {
        let state = self.state();
        self.active.take().ok_or(PipelineError::InvalidState {
            expected: "running",
            actual: state,
        })
    }

    async fn await_supervisor(
        &self,
        supervisor: JoinHandle<Result<PipelineReport, PipelineError>>,
    ) -> Result<PipelineReport, PipelineError> {
        match supervisor.await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                self.state_tx.send_replace(PipelineState::Failed);
                Err(PipelineError::Panic {
                    task: format!("supervisor: {}", join_error),
                })
            }
        }
    }
}

/// One frame on its way to a detector queue.
#[derive(Clone)]
struct FrameJob {
    stream: usize,
    sequence: u64,
    frame: Arc<Frame>,
    /// Inside the stream's detect interval: report an empty result without
    /// invoking the detector.
    skip: bool,
}

/// One detector result on its way to a stream's ordering gate.
struct GateEntry {
    detector: usize,
    sequence: u64,
    frame_timestamp: f64,
    result: DetectionResult,
}

struct DriveOutcome {
    stream: Box<dyn AsyncVideoStream>,
    name: String,
    frames: u64,
}

struct WorkerOutcome {
    detector: Box<dyn AsyncDetector>,
    name: String,
}

struct DispatchOutcome {
    subscribers: Vec<NamedSubscriber>,
    alerts: u64,
    failures: u64,
}

struct TaskSet {
    drives: Vec<JoinHandle<DriveOutcome>>,
    workers: Vec<JoinHandle<WorkerOutcome>>,
    gates: Vec<JoinHandle<u64>>,
    dispatcher: JoinHandle<DispatchOutcome>,
}

async fn next_frame_with_timeout(
    stream: &mut dyn AsyncVideoStream,
    limit: Option<Duration>,
) -> Result<Option<Frame>, StreamError> {
    match limit {
        Some(limit) => match tokio::time::timeout(limit, stream.next_frame()).await {
            Ok(result) => result,
            Err(_) => Err(StreamError::Timeout(limit.as_secs_f64())),
        },
        None => stream.next_frame().await,
    }
}

async fn detect_with_timeout(
    detector: &mut dyn AsyncDetector,
    frame: Arc<Frame>,
    limit: Option<Duration>,
) -> Result<DetectionResult, DetectorError> {
    match limit {
        Some(limit) => match tokio::time::timeout(limit, detector.detect(frame)).await {
            Ok(result) => result,
            Err(_) => Err(DetectorError::Timeout(limit.as_secs_f64())),
        },
        None => detector.detect(frame).await,
    }
}

/// Pull frames from one stream, stamp sequence numbers, and fan each frame
/// out to every detector queue. Exhaustion ends the loop; a stream error is
/// reported as pipeline-fatal.
#[allow(clippy::too_many_arguments)]
async fn drive_stream(
    stream_index: usize,
    name: String,
    mut stream: Box<dyn AsyncVideoStream>,
    options: StreamOptions,
    frame_timeout: Option<Duration>,
    frame_txs: Vec<mpsc::Sender<FrameJob>>,
    error_tx: mpsc::Sender<PipelineError>,
    mut shutdown: watch::Receiver<bool>,
) -> DriveOutcome {
    let detect_interval = options.detect_interval.map(Duration::from_secs_f64);
    let mut last_detect: Option<tokio::time::Instant> = None;
    let mut sequence: u64 = 0;

    'drive: loop {
        let pulled = tokio::select! {
            biased;
            _ = shutdown.changed() => break 'drive,
            pulled = next_frame_with_timeout(stream.as_mut(), frame_timeout) => pulled,
        };

        match pulled {
            Ok(Some(mut frame)) => {
                frame.sequence = sequence;
                let skip = match detect_interval {
                    Some(interval) => match last_detect {
                        Some(at) if at.elapsed() < interval => true,
                        _ => {
                            last_detect = Some(tokio::time::Instant::now());
                            false
                        }
                    },
                    None => false,
                };
                let job = FrameJob {
                    stream: stream_index,
                    sequence,
                    frame: Arc::new(frame),
                    skip,
                };
                for tx in &frame_txs {
                    if tx.send(job.clone()).await.is_err() {
                        break 'drive;
                    }
                }
                sequence += 1;
            }
            Ok(None) => {
                debug!("Video stream '{}' exhausted after {} frame(s)", name, sequence);
                break 'drive;
            }
            Err(error) => {
                let _ = error_tx
                    .send(PipelineError::Stream {
                        name: name.clone(),
                        source: error,
                    })
                    .await;
                break 'drive;
            }
        }
    }

    DriveOutcome {
        stream,
        name,
        frames: sequence,
    }
}

/// Consume one detector's frame queue strictly in order and forward each
/// result to the originating stream's gate. Detector errors are
/// pipeline-fatal.
#[allow(clippy::too_many_arguments)]
async fn run_detector(
    detector_index: usize,
    name: String,
    mut detector: Box<dyn AsyncDetector>,
    detect_timeout: Option<Duration>,
    mut frame_rx: mpsc::Receiver<FrameJob>,
    gate_txs: Vec<mpsc::Sender<GateEntry>>,
    error_tx: mpsc::Sender<PipelineError>,
    mut shutdown: watch::Receiver<bool>,
) -> WorkerOutcome {
    'work: loop {
        let job = tokio::select! {
            biased;
            _ = shutdown.changed() => break 'work,
            job = frame_rx.recv() => match job {
                Some(job) => job,
                None => break 'work,
            },
        };

        let result = if job.skip {
            Ok(DetectionResult::empty())
        } else {
            detect_with_timeout(detector.as_mut(), Arc::clone(&job.frame), detect_timeout).await
        };

        match result {
            Ok(result) => {
                let entry = GateEntry {
                    detector: detector_index,
                    sequence: job.sequence,
                    frame_timestamp: job.frame.timestamp,
                    result,
                };
                if gate_txs[job.stream].send(entry).await.is_err() {
                    break 'work;
                }
            }
            Err(error) => {
                let _ = error_tx
                    .send(PipelineError::Detector {
                        name: name.clone(),
                        source: error,
                    })
                    .await;
                break 'work;
            }
        }
    }

    WorkerOutcome { detector, name }
}

/// Re-align detector results for one stream and release alerts in
/// frame-sequence order. Returns the number of alerts suppressed by the
/// stream's cooldown.
async fn run_gate(
    stream_name: String,
    detector_names: Vec<String>,
    cooldown: Option<Duration>,
    mut entry_rx: mpsc::Receiver<GateEntry>,
    alert_tx: mpsc::Sender<Arc<Alert>>,
) -> u64 {
    let mut lanes: Vec<VecDeque<GateEntry>> =
        (0..detector_names.len()).map(|_| VecDeque::new()).collect();
    let mut next_sequence: u64 = 0;
    let mut cooldown = cooldown.map(Cooldown::new);
    let mut suppressed: u64 = 0;

    'gate: while let Some(entry) = entry_rx.recv().await {
        lanes[entry.detector].push_back(entry);

        // A round is complete once every detector has reported the next
        // sequence number; only then may its alerts leave.
        while lanes.iter().all(|lane| !lane.is_empty()) {
            for lane_index in 0..lanes.len() {
                let Some(entry) = lanes[lane_index].pop_front() else {
                    continue;
                };
                debug_assert_eq!(entry.sequence, next_sequence);
                if entry.result.is_empty() {
                    continue;
                }

                if !cooldown.as_mut().map_or(true, Cooldown::allow) {
                    suppressed += 1;
                    debug!("Alert from stream '{}' suppressed by cooldown", stream_name);
                    continue;
                }

                let alert = Alert::from_detections(
                    stream_name.clone(),
                    detector_names[lane_index].clone(),
                    entry.sequence,
                    entry.frame_timestamp,
                    entry.result.detections,
                );
                if alert_tx.send(Arc::new(alert)).await.is_err() {
                    break 'gate;
                }
            }
            next_sequence += 1;
        }
    }

    suppressed
}

/// Deliver ordered alerts to the subscriber set. Subscriber failures are
/// isolated and counted, never fatal.
async fn run_dispatch(
    mut subscribers: Vec<NamedSubscriber>,
    mut alert_rx: mpsc::Receiver<Arc<Alert>>,
) -> DispatchOutcome {
    let mut alerts: u64 = 0;
    let mut failures: u64 = 0;

    while let Some(alert) = alert_rx.recv().await {
        debug!(
            "Dispatching alert {} from '{}': {}",
            alert.id, alert.source, alert.description
        );
        let report = dispatch(&alert, &mut subscribers).await;
        alerts += 1;
        failures += report.failures.len() as u64;
    }

    DispatchOutcome {
        subscribers,
        alerts,
        failures,
    }
}

fn record_clean_up(
    result: Result<(), ComponentError>,
    component: &str,
    report: &mut PipelineReport,
) {
    if let Err(error) = result {
        warn!("Clean-up of component '{}' failed: {}", component, error);
        report.termination_failures.push(TerminationFailure {
            component: component.to_string(),
            error,
        });
    }
}

/// Own the teardown path: wait for the first fatal error (or for every
/// producer to finish), fan out shutdown, join every task, and run exactly
/// one `clean_up` per component.
async fn supervise(
    name: String,
    state: Arc<watch::Sender<PipelineState>>,
    shutdown: Arc<watch::Sender<bool>>,
    mut error_rx: mpsc::Receiver<PipelineError>,
    tasks: TaskSet,
) -> Result<PipelineReport, PipelineError> {
    // First fatal error wins; `None` means every producer finished or was
    // told to stop.
    let mut failure = error_rx.recv().await;

    match &failure {
        Some(error) => {
            warn!("Pipeline '{}' failing: {}", name, error);
            state.send_replace(PipelineState::Failed);
        }
        None => {
            state.send_if_modified(|current| {
                if *current == PipelineState::Running {
                    *current = PipelineState::Stopping;
                    true
                } else {
                    false
                }
            });
        }
    }
    let _ = shutdown.send(true);

    let mut report = PipelineReport::default();

    for handle in tasks.drives {
        match handle.await {
            Ok(mut outcome) => {
                report.frames += outcome.frames;
                record_clean_up(outcome.stream.clean_up().await, &outcome.name, &mut report);
            }
            Err(join_error) => {
                warn!("Pipeline '{}' stream task panicked: {}", name, join_error);
                failure.get_or_insert(PipelineError::Panic {
                    task: format!("stream driver: {}", join_error),
                });
            }
        }
    }

    for handle in tasks.workers {
        match handle.await {
            Ok(mut outcome) => {
                record_clean_up(
                    outcome.detector.clean_up().await,
                    &outcome.name,
                    &mut report,
                );
            }
            Err(join_error) => {
                warn!("Pipeline '{}' detector task panicked: {}", name, join_error);
                failure.get_or_insert(PipelineError::Panic {
                    task: format!("detector worker: {}", join_error),
                });
            }
        }
    }

    for handle in tasks.gates {
        match handle.await {
            Ok(suppressed) => report.alerts_suppressed += suppressed,
            Err(join_error) => {
                warn!("Pipeline '{}' gate task panicked: {}", name, join_error);
                failure.get_or_insert(PipelineError::Panic {
                    task: format!("ordering gate: {}", join_error),
                });
            }
        }
    }

    match tasks.dispatcher.await {
        Ok(outcome) => {
            report.alerts = outcome.alerts;
            report.subscriber_failures = outcome.failures;
            for mut named in outcome.subscribers {
                record_clean_up(named.subscriber.clean_up().await, &named.name, &mut report);
            }
        }
        Err(join_error) => {
            warn!("Pipeline '{}' dispatcher task panicked: {}", name, join_error);
            failure.get_or_insert(PipelineError::Panic {
                task: format!("alert dispatcher: {}", join_error),
            });
        }
    }

    // Late errors lost the race to be the failure; keep them visible.
    while let Ok(error) = error_rx.try_recv() {
        debug!("Pipeline '{}' follow-on error: {}", name, error);
    }

    match failure {
        Some(error) => {
            state.send_replace(PipelineState::Failed);
            Err(error)
        }
        None => {
            state.send_replace(PipelineState::Stopped);
            info!(
                "Pipeline '{}' stopped: {} frame(s) pulled, {} alert(s) dispatched",
                name, report.frames, report.alerts
            );
            Ok(report)
        }
    }
}
