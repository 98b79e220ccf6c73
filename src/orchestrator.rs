use crate::capture::{CaptureWorker, FrameDistributor, FrameSource};
use crate::combat::{LivenessTracker, LivenessWorker};
use crate::config::Settings;
use crate::error::BotError;
use crate::flow::{FlowClassifiers, FlowProbes, FlowWorker};
use crate::input::{GameWindow, InputInjector, WindowLocator};
use crate::map::MapWorker;
use crate::purchase::PurchaseWorker;
use crate::state::{SharedHandle, SharedState, StateReader, shared};
use crate::targeting::{AimWorker, CooldownGate, DetectionWorker, WeaponWorker, target_channel};
use crate::vision::{Classifier, Probe, TargetDetector};
use crate::worker::{StopCompletion, Worker, WorkerExit};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A native handle (capture session, input device, detector runtime) the
/// orchestrator owns and releases exactly once: during `stop`, or on drop if
/// `stop` never ran.
pub trait ManagedResource: Send {
    fn name(&self) -> &str;
    fn release(&mut self);
}

fn release_all(resources: &mut Vec<Box<dyn ManagedResource>>) {
    for mut resource in resources.drain(..) {
        debug!("Releasing {}", resource.name());
        resource.release();
    }
}

/// How each worker ended during [`Orchestrator::stop`].
#[derive(Debug, Clone, Default)]
pub struct StopReport {
    pub exits: Vec<(&'static str, WorkerExit)>,
    pub timed_out: bool,
}

impl StopReport {
    pub fn exit_of(&self, name: &str) -> Option<&WorkerExit> {
        self.exits
            .iter()
            .find(|(worker, _)| *worker == name)
            .map(|(_, exit)| exit)
    }
}

/// Owns every worker, the shared state, the frame distributor and the one
/// cancellation token. Workers start together once and stop together.
pub struct Orchestrator {
    pending: Vec<Box<dyn Worker>>,
    completions: Vec<StopCompletion>,
    started: bool,
    cancel: CancellationToken,
    shared: SharedHandle,
    distributor: Arc<FrameDistributor>,
    resources: Vec<Box<dyn ManagedResource>>,
    stop_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        shared: SharedHandle,
        distributor: Arc<FrameDistributor>,
        stop_timeout: Duration,
    ) -> Self {
        Self {
            pending: Vec::new(),
            completions: Vec::new(),
            started: false,
            cancel: CancellationToken::new(),
            shared,
            distributor,
            resources: Vec::new(),
            stop_timeout,
        }
    }

    pub fn builder(settings: Settings) -> OrchestratorBuilder {
        OrchestratorBuilder::new(settings)
    }

    pub fn add_worker(&mut self, worker: Box<dyn Worker>) {
        self.pending.push(worker);
    }

    pub fn add_resource(&mut self, resource: Box<dyn ManagedResource>) {
        self.resources.push(resource);
    }

    pub fn worker_names(&self) -> Vec<&'static str> {
        self.pending
            .iter()
            .map(|worker| worker.name())
            .chain(self.completions.iter().map(|completion| completion.name()))
            .collect()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn shared(&self) -> SharedHandle {
        self.shared.clone()
    }

    pub fn reader(&self) -> StateReader {
        StateReader::new(self.shared.clone())
    }

    pub fn distributor(&self) -> Arc<FrameDistributor> {
        self.distributor.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Starts every worker. Workers are never restarted, so a second call
    /// fails.
    pub fn start(&mut self) -> Result<(), BotError> {
        if self.started {
            return Err(BotError::AlreadyStarted);
        }
        self.started = true;
        info!("Starting {} workers", self.pending.len());
        for worker in self.pending.drain(..) {
            self.completions.push(worker.start(self.cancel.clone()));
        }
        Ok(())
    }

    /// Cancels every worker, waits up to the stop timeout for them to exit,
    /// aborts stragglers and releases every resource. Failed or panicked
    /// workers are reported after all of that has happened.
    pub async fn stop(&mut self) -> Result<StopReport, BotError> {
        self.cancel.cancel();
        if !self.started {
            release_all(&mut self.resources);
            return Err(BotError::NotStarted);
        }

        info!("Stopping {} workers", self.completions.len());
        let waits = join_all(self.completions.iter_mut().map(|completion| completion.wait()));
        let timed_out = tokio::time::timeout(self.stop_timeout, waits).await.is_err();
        if timed_out {
            warn!("Workers did not stop within {:?}", self.stop_timeout);
        }
        for completion in &mut self.completions {
            completion.abandon();
        }

        release_all(&mut self.resources);
        self.distributor.close();

        let exits: Vec<(&'static str, WorkerExit)> = self
            .completions
            .drain(..)
            .filter_map(|completion| {
                completion
                    .exit()
                    .cloned()
                    .map(|exit| (completion.name(), exit))
            })
            .collect();
        let failures: Vec<String> = exits
            .iter()
            .filter(|(_, exit)| exit.is_unexpected())
            .map(|(name, exit)| format!("{}: {}", name, exit))
            .collect();
        if !failures.is_empty() {
            error!("{} workers failed", failures.len());
            return Err(BotError::WorkerFailures(failures));
        }
        info!("All workers stopped");
        Ok(StopReport { exits, timed_out })
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.cancel.cancel();
        for completion in &mut self.completions {
            completion.abort();
        }
        release_all(&mut self.resources);
    }
}

/// Wires collaborators and settings into an [`Orchestrator`] with one worker
/// per loop. Nothing is started by `build`.
pub struct OrchestratorBuilder {
    settings: Settings,
    locator: Option<Arc<dyn WindowLocator>>,
    injector: Option<Arc<dyn InputInjector>>,
    frame_source: Option<Box<dyn FrameSource>>,
    flow: Option<FlowClassifiers>,
    death: Option<Arc<dyn Classifier>>,
    detector: Option<Arc<dyn TargetDetector>>,
    weapons: Vec<(String, Arc<dyn Classifier>)>,
    maps: Vec<(String, Arc<dyn Classifier>)>,
    map_marker: Option<Arc<dyn Classifier>>,
    resources: Vec<Box<dyn ManagedResource>>,
    extra_workers: Vec<Box<dyn Worker>>,
}

impl OrchestratorBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            locator: None,
            injector: None,
            frame_source: None,
            flow: None,
            death: None,
            detector: None,
            weapons: Vec::new(),
            maps: Vec::new(),
            map_marker: None,
            resources: Vec::new(),
            extra_workers: Vec::new(),
        }
    }

    pub fn window_locator(mut self, locator: Arc<dyn WindowLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn injector(mut self, injector: Arc<dyn InputInjector>) -> Self {
        self.injector = Some(injector);
        self
    }

    // Without a source, frames must be published through `Orchestrator::distributor`.
    pub fn frame_source(mut self, source: Box<dyn FrameSource>) -> Self {
        self.frame_source = Some(source);
        self
    }

    pub fn flow_classifiers(mut self, classifiers: FlowClassifiers) -> Self {
        self.flow = Some(classifiers);
        self
    }

    pub fn death_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.death = Some(classifier);
        self
    }

    pub fn target_detector(mut self, detector: Arc<dyn TargetDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn weapon_classifier(mut self, name: impl Into<String>, classifier: Arc<dyn Classifier>) -> Self {
        self.weapons.push((name.into(), classifier));
        self
    }

    pub fn map_classifier(mut self, name: impl Into<String>, classifier: Arc<dyn Classifier>) -> Self {
        self.maps.push((name.into(), classifier));
        self
    }

    pub fn map_marker_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.map_marker = Some(classifier);
        self
    }

    pub fn resource(mut self, resource: Box<dyn ManagedResource>) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn worker(mut self, worker: Box<dyn Worker>) -> Self {
        self.extra_workers.push(worker);
        self
    }

    /// Validates settings and resolves the window. On failure every resource
    /// handed to the builder has already been released.
    pub fn build(mut self) -> Result<Orchestrator, BotError> {
        let mut resources = std::mem::take(&mut self.resources);
        match self.assemble() {
            Ok(mut orchestrator) => {
                orchestrator.resources.append(&mut resources);
                Ok(orchestrator)
            }
            Err(e) => {
                error!("Startup failed: {}", e);
                release_all(&mut resources);
                Err(e)
            }
        }
    }

    fn assemble(self) -> Result<Orchestrator, BotError> {
        let settings = self.settings;
        settings.validate()?;
        let locator = self
            .locator
            .ok_or(BotError::MissingComponent("window locator"))?;
        let injector = self.injector.ok_or(BotError::MissingComponent("injector"))?;
        let flow = self
            .flow
            .ok_or(BotError::MissingComponent("flow classifiers"))?;
        let death = self
            .death
            .ok_or(BotError::MissingComponent("death classifier"))?;
        let detector = self
            .detector
            .ok_or(BotError::MissingComponent("target detector"))?;
        if !self.maps.is_empty() && self.map_marker.is_none() {
            return Err(BotError::MissingComponent("map marker classifier"));
        }

        let title = settings.window.title.clone();
        let handle = locator
            .find_by_title(&title)
            .ok_or_else(|| BotError::WindowNotFound(title.clone()))?;
        info!("Attached to window '{}' ({})", title, handle);
        let window = GameWindow::new(handle, locator);

        let timing = settings.timing.clone();
        let thresholds = &settings.thresholds;
        let state = shared(SharedState::new(
            LivenessTracker::new(timing.death_duration(), timing.combat_grace()),
            settings.debug_artifacts,
        ));
        let distributor = Arc::new(FrameDistributor::new());
        let mut orchestrator =
            Orchestrator::new(state.clone(), distributor.clone(), timing.stop_timeout());

        if let Some(source) = self.frame_source {
            orchestrator.add_worker(Box::new(CaptureWorker::new(
                source,
                distributor.clone(),
                settings.capture.frame_interval(),
            )));
        }

        orchestrator.add_worker(Box::new(FlowWorker::new(
            FlowProbes::new(flow, thresholds),
            distributor.register_consumer(),
            state.clone(),
            window.clone(),
            injector.clone(),
            settings.clicks.clone(),
            timing.clone(),
        )));

        orchestrator.add_worker(Box::new(LivenessWorker::new(
            Probe::new("death", death, thresholds.death_marker),
            distributor.register_consumer(),
            state.clone(),
            timing.idle_backoff(),
        )));

        let (sender, receiver) = target_channel();
        orchestrator.add_worker(Box::new(DetectionWorker::new(
            detector,
            distributor.register_consumer(),
            state.clone(),
            window.clone(),
            sender,
            CooldownGate::from_settings(&settings.cooldowns),
            thresholds.target,
            settings.aim.clone(),
            timing.clone(),
        )));
        orchestrator.add_worker(Box::new(AimWorker::new(
            receiver,
            injector.clone(),
            state.clone(),
            settings.aim.clone(),
        )));

        if !self.weapons.is_empty() {
            let probes = self
                .weapons
                .into_iter()
                .map(|(name, classifier)| Probe::new(name, classifier, thresholds.weapon))
                .collect();
            orchestrator.add_worker(Box::new(WeaponWorker::new(
                probes,
                distributor.register_consumer(),
                state.clone(),
                timing.clone(),
            )));
        }

        let map_tracked = self.map_marker.is_some();
        if let Some(marker) = self.map_marker {
            let probes = self
                .maps
                .into_iter()
                .map(|(name, classifier)| Probe::new(name, classifier, thresholds.map))
                .collect();
            orchestrator.add_worker(Box::new(MapWorker::new(
                probes,
                Probe::new("map marker", marker, thresholds.map_marker),
                settings.map.bounds,
                distributor.register_consumer(),
                state.clone(),
                timing.clone(),
            )));
        }

        // Purchase preconditions are only ever satisfied by the map worker.
        if map_tracked {
            orchestrator.add_worker(Box::new(PurchaseWorker::new(
                state,
                window,
                injector,
                settings.purchase.clone(),
                timing,
            )));
        } else {
            warn!("No map classifiers registered, purchasing is disabled");
        }

        for worker in self.extra_workers {
            orchestrator.add_worker(worker);
        }
        debug!("Built workers: {:?}", orchestrator.worker_names());
        Ok(orchestrator)
    }
}
