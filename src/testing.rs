//! Test doubles shared by the unit tests.

use crate::capture::FrameSource;
use crate::combat::LivenessTracker;
use crate::common::{Frame, Point, Region, Size, WindowRect};
use crate::config::TimingSettings;
use crate::error::{CaptureError, WorkerError};
use crate::flow::FlowClassifiers;
use crate::input::{GameWindow, InputInjector, WindowHandle, WindowLocator};
use crate::orchestrator::ManagedResource;
use crate::state::{SharedHandle, SharedState, shared};
use crate::vision::{Classifier, ClassifierResult, Target, TargetDetector};
use crate::worker::Worker;
use async_trait::async_trait;
use image::DynamicImage;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

pub fn test_frame(sequence: u64) -> Frame {
    Frame::new(sequence, DynamicImage::new_rgb8(8, 8))
}

pub fn frame_buffer(frame: &Frame) -> Arc<DynamicImage> {
    frame.shared_image()
}

pub fn test_state() -> SharedState {
    let timing = TimingSettings::default();
    SharedState::new(
        LivenessTracker::new(timing.death_duration(), timing.combat_grace()),
        false,
    )
}

pub fn shared_test_state() -> SharedHandle {
    shared(test_state())
}

/// Window handle backed by a [`StaticWindow`] of 1280x720 at the origin.
pub fn test_window(focused: bool) -> GameWindow {
    GameWindow::new(WindowHandle(7), Arc::new(StaticWindow::new(focused)))
}

pub fn flow_classifiers(confidence: f32) -> FlowClassifiers {
    FlowClassifiers {
        team_select: StubClassifier::fixed(confidence),
        match_ready: StubClassifier::fixed(confidence),
        disconnected: StubClassifier::fixed(confidence),
        in_menu: StubClassifier::fixed(confidence),
        cancel_search: StubClassifier::fixed(confidence),
        start_button: StubClassifier::fixed(confidence),
        mode_indicator: StubClassifier::fixed(confidence),
    }
}

/// Classifier returning whatever it was last told to, and counting calls.
#[derive(Default)]
pub struct StubClassifier {
    confidence: Mutex<f32>,
    region: Mutex<Option<Region>>,
    artifact: Mutex<Option<Frame>>,
    last_region: Mutex<Option<Region>>,
    calls: AtomicUsize,
}

impl StubClassifier {
    pub fn fixed(confidence: f32) -> Arc<Self> {
        let stub = Self::default();
        *stub.confidence.lock() = confidence;
        Arc::new(stub)
    }

    pub fn set(&self, confidence: f32) {
        *self.confidence.lock() = confidence;
    }

    pub fn set_region(&self, region: Option<Region>) {
        *self.region.lock() = region;
    }

    pub fn set_artifact(&self, artifact: Option<Frame>) {
        *self.artifact.lock() = artifact;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_region(&self) -> Option<Region> {
        *self.last_region.lock()
    }
}

impl Classifier for StubClassifier {
    fn detect(&self, _frame: &Frame, region: Option<Region>) -> ClassifierResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_region.lock() = region;
        ClassifierResult {
            confidence: *self.confidence.lock(),
            region: *self.region.lock(),
            artifact: self.artifact.lock().clone(),
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}

#[derive(Default)]
pub struct StubDetector {
    targets: Mutex<Vec<Target>>,
}

impl StubDetector {
    pub fn with_targets(targets: Vec<Target>) -> Arc<Self> {
        Arc::new(Self {
            targets: Mutex::new(targets),
        })
    }
}

impl TargetDetector for StubDetector {
    fn detect(&self, _frame: &Frame) -> Vec<Target> {
        self.targets.lock().clone()
    }

    fn name(&self) -> &str {
        "stub-detector"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Click(Point),
    Aim { x: f32, y: f32 },
    Fire,
    Key(String),
}

type ClickHook = Box<dyn Fn(usize) + Send + Sync>;

/// Injector that records every call. An optional hook runs after each click
/// with the number of clicks so far.
#[derive(Default)]
pub struct RecordingInjector {
    events: Mutex<Vec<InputEvent>>,
    on_click: Mutex<Option<ClickHook>>,
}

impl RecordingInjector {
    pub fn on_click(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        *self.on_click.lock() = Some(Box::new(hook));
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.events.lock().clone()
    }

    pub fn clicks(&self) -> Vec<Point> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                InputEvent::Click(point) => Some(*point),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: InputEvent) {
        self.events.lock().push(event);
    }
}

impl InputInjector for RecordingInjector {
    fn click_at(&self, _window: WindowHandle, point: Point) {
        self.record(InputEvent::Click(point));
        let count = self.clicks().len();
        if let Some(hook) = self.on_click.lock().as_ref() {
            hook(count);
        }
    }

    fn aim_to(&self, x: f32, y: f32, _window_origin: Point, _window_size: Size) {
        self.record(InputEvent::Aim { x, y });
    }

    fn fire(&self) {
        self.record(InputEvent::Fire);
    }

    fn press_key(&self, _window: WindowHandle, key: &str) {
        self.record(InputEvent::Key(key.to_string()));
    }
}

/// Locator with one 1280x720 window titled "Game" unless told otherwise.
pub struct StaticWindow {
    title: String,
    focused: AtomicBool,
    rect: WindowRect,
}

impl StaticWindow {
    pub fn new(focused: bool) -> Self {
        Self::titled("Game", focused)
    }

    pub fn titled(title: &str, focused: bool) -> Self {
        Self {
            title: title.to_string(),
            focused: AtomicBool::new(focused),
            rect: WindowRect::new(Point::new(0, 0), Size::new(1280, 720)),
        }
    }
}

impl WindowLocator for StaticWindow {
    fn find_by_title(&self, title_substring: &str) -> Option<WindowHandle> {
        self.title.contains(title_substring).then_some(WindowHandle(7))
    }

    fn is_foreground_and_focused(&self, _window: WindowHandle) -> bool {
        self.focused.load(Ordering::SeqCst)
    }

    fn window_rect(&self, _window: WindowHandle) -> Option<WindowRect> {
        Some(self.rect)
    }
}

pub struct CountingResource {
    name: String,
    released: Arc<AtomicUsize>,
}

impl CountingResource {
    pub fn new(name: &str) -> (Self, Arc<AtomicUsize>) {
        let released = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name: name.to_string(),
                released: released.clone(),
            },
            released,
        )
    }
}

impl ManagedResource for CountingResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Ignores cancellation entirely.
pub struct HungWorker;

#[async_trait]
impl Worker for HungWorker {
    fn name(&self) -> &'static str {
        "hung"
    }

    async fn run(&mut self, _cancel: CancellationToken) -> Result<(), WorkerError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

pub struct FailingWorker;

#[async_trait]
impl Worker for FailingWorker {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn run(&mut self, _cancel: CancellationToken) -> Result<(), WorkerError> {
        Err(WorkerError::Failed("detector runtime crashed".to_string()))
    }
}

/// Yields `remaining` blank images, then reports exhaustion.
pub struct VecSource {
    remaining: usize,
}

impl VecSource {
    pub fn new(remaining: usize) -> Self {
        Self { remaining }
    }
}

impl FrameSource for VecSource {
    fn next_frame(&mut self) -> Result<Option<DynamicImage>, CaptureError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(DynamicImage::new_rgb8(4, 4)))
    }

    fn name(&self) -> &str {
        "vec"
    }
}
