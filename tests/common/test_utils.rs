#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, VecDeque},
    rc::Rc,
};

use anyhow::anyhow;
use cgmath::Vector3;
use flow_ar::{
    config::ViewerConfig,
    data_structures::{
        instance::Transform,
        model::{MeshData, ModelVertex, Primitive},
    },
    engine::{Engine, RenderingProvider},
    events::{Dispatcher, Spawner, ViewerEvent},
    lifecycle::{Host, ListenerHandle, ListenerKind, Services, TriggerHandle, TriggerSpec, Viewer},
    resources::AssetImporter,
    scene::{ImportedAsset, MeshNode, Scene},
    xr::{XrExperience, XrOptions, XrProvider, XrState},
};
use futures::{
    FutureExt, StreamExt,
    channel::{mpsc, oneshot},
    executor::LocalPool,
    future::LocalBoxFuture,
    stream::{self, LocalBoxStream},
};

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

thread_local! {
    static CAPTURED: RefCell<Vec<(log::Level, String)>> = const { RefCell::new(Vec::new()) };
}

/// Keeps records per thread, so tests running in parallel only see their own.
struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        CAPTURED.with(|c| c.borrow_mut().push((record.level(), record.args().to_string())));
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;

/// Records of the current thread from the moment [`capture_logs`] was called.
pub struct LogCapture;

/// Installs the capturing logger (once per test binary) and starts a fresh capture.
pub fn capture_logs() -> LogCapture {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Trace);
    }
    CAPTURED.with(|c| c.borrow_mut().clear());
    LogCapture
}

impl LogCapture {
    pub fn messages(&self, level: log::Level) -> Vec<String> {
        CAPTURED.with(|c| {
            c.borrow()
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, m)| m.clone())
                .collect()
        })
    }

    /// `true` if a record at `level` contains `needle`.
    pub fn contains(&self, level: log::Level, needle: &str) -> bool {
        self.messages(level).iter().any(|m| m.contains(needle))
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct EngineStats {
    pub frames: u32,
    pub fits: u32,
    pub disposed: bool,
    pub meshes_seen: usize,
}

pub struct MockEngine {
    stats: Rc<RefCell<EngineStats>>,
}

impl MockEngine {
    pub fn new() -> (Self, Rc<RefCell<EngineStats>>) {
        let stats = Rc::new(RefCell::new(EngineStats::default()));
        (
            Self {
                stats: stats.clone(),
            },
            stats,
        )
    }
}

impl Engine for MockEngine {
    fn fit_to_surface(&mut self) {
        self.stats.borrow_mut().fits += 1;
    }

    fn render(&mut self, scene: &Scene) -> anyhow::Result<()> {
        let mut stats = self.stats.borrow_mut();
        if stats.disposed {
            return Err(anyhow!("engine has been disposed"));
        }
        stats.frames += 1;
        stats.meshes_seen = scene.meshes().len();
        Ok(())
    }

    fn dispose(&mut self) {
        self.stats.borrow_mut().disposed = true;
    }

    fn is_disposed(&self) -> bool {
        self.stats.borrow().disposed
    }
}

/// Hands out [`MockEngine`]s for a `()` surface and counts how often it was asked.
pub struct MockProvider {
    pub created: Rc<Cell<u32>>,
    pub fail: bool,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            created: Rc::new(Cell::new(0)),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }
}

impl RenderingProvider for MockProvider {
    type Surface = ();
    type Engine = MockEngine;

    fn create_engine(&self, _surface: ()) -> LocalBoxFuture<'static, anyhow::Result<MockEngine>> {
        self.created.set(self.created.get() + 1);
        let fail = self.fail;
        async move {
            if fail {
                Err(anyhow!("no adapter"))
            } else {
                Ok(MockEngine::new().0)
            }
        }
        .boxed_local()
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

#[derive(Default)]
struct HostState {
    next_id: u64,
    triggers: HashMap<u64, (TriggerSpec, Dispatcher)>,
    listeners: HashMap<u64, (ListenerKind, Dispatcher)>,
    fail_trigger: bool,
}

/// A document that only records what was registered on it.
pub struct MockHost {
    state: Rc<RefCell<HostState>>,
}

/// Test-side view of a [`MockHost`] that stays usable after the host moved into a viewer.
#[derive(Clone)]
pub struct PageView {
    state: Rc<RefCell<HostState>>,
}

impl MockHost {
    pub fn new() -> (Self, PageView) {
        let state = Rc::new(RefCell::new(HostState::default()));
        (
            Self {
                state: state.clone(),
            },
            PageView { state },
        )
    }

    /// A host whose `create_trigger` fails.
    pub fn without_trigger() -> (Self, PageView) {
        let (host, page) = Self::new();
        host.state.borrow_mut().fail_trigger = true;
        (host, page)
    }
}

impl Host for MockHost {
    fn create_trigger(&mut self, spec: &TriggerSpec, dispatch: Dispatcher) -> anyhow::Result<TriggerHandle> {
        let mut state = self.state.borrow_mut();
        if state.fail_trigger {
            return Err(anyhow!("document has no body"));
        }
        state.next_id += 1;
        let id = state.next_id;
        state.triggers.insert(id, (spec.clone(), dispatch));
        Ok(TriggerHandle(id))
    }

    fn remove_trigger(&mut self, handle: TriggerHandle) {
        self.state.borrow_mut().triggers.remove(&handle.0);
    }

    fn add_listener(&mut self, kind: ListenerKind, dispatch: Dispatcher) -> anyhow::Result<ListenerHandle> {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        state.listeners.insert(id, (kind, dispatch));
        Ok(ListenerHandle(id))
    }

    fn remove_listener(&mut self, handle: ListenerHandle) {
        self.state.borrow_mut().listeners.remove(&handle.0);
    }
}

impl PageView {
    pub fn trigger_count(&self) -> usize {
        self.state.borrow().triggers.len()
    }

    pub fn trigger_labels(&self) -> Vec<String> {
        self.state
            .borrow()
            .triggers
            .values()
            .map(|(spec, _)| spec.label.clone())
            .collect()
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    pub fn listener_count_of(&self, kind: ListenerKind) -> usize {
        self.state
            .borrow()
            .listeners
            .values()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    /// Activates every registered trigger.
    pub fn click(&self) {
        let dispatchers: Vec<_> = self
            .state
            .borrow()
            .triggers
            .values()
            .map(|(_, d)| d.clone())
            .collect();
        dispatchers.iter().for_each(|d| d.dispatch(ViewerEvent::EnterAr));
    }

    pub fn fire_resize(&self) {
        self.fire(ListenerKind::Resize, || ViewerEvent::Resize);
    }

    pub fn fire_wheel(&self, delta_y: f32) {
        self.fire(ListenerKind::Wheel, || ViewerEvent::Wheel { delta_y });
    }

    fn fire(&self, kind: ListenerKind, event: impl Fn() -> ViewerEvent) {
        let dispatchers: Vec<_> = self
            .state
            .borrow()
            .listeners
            .values()
            .filter(|(k, _)| *k == kind)
            .map(|(_, d)| d.clone())
            .collect();
        dispatchers.iter().for_each(|d| d.dispatch(event()));
    }
}

// ---------------------------------------------------------------------------
// Event loop stand-in
// ---------------------------------------------------------------------------

/// A `LocalPool` plus an event queue, playing the part of the winit loop.
pub struct Harness {
    pool: LocalPool,
    queue: Rc<RefCell<VecDeque<ViewerEvent>>>,
    dispatch: Dispatcher,
}

impl Harness {
    pub fn new() -> Self {
        let queue = Rc::new(RefCell::new(VecDeque::new()));
        let sink = queue.clone();
        Self {
            pool: LocalPool::new(),
            queue,
            dispatch: Dispatcher::new(move |event| sink.borrow_mut().push_back(event)),
        }
    }

    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatch.clone()
    }

    pub fn spawner(&self) -> Rc<dyn Spawner> {
        Rc::new(self.pool.spawner())
    }

    pub fn services(&self, importer: impl AssetImporter + 'static, xr: impl XrProvider + 'static) -> Services {
        Services {
            importer: Rc::new(importer),
            xr: Rc::new(xr),
            spawner: self.spawner(),
            dispatch: self.dispatcher(),
        }
    }

    /// Runs spawned tasks without delivering their events.
    pub fn run_tasks(&mut self) {
        self.pool.run_until_stalled();
    }

    /// Events dispatched but not yet delivered.
    pub fn take_events(&self) -> Vec<ViewerEvent> {
        self.queue.borrow_mut().drain(..).collect()
    }

    /// Runs tasks and delivers events to `viewer` until nothing is left to do.
    /// Returns the number of events delivered.
    pub fn pump<E: Engine, H: Host>(&mut self, viewer: &mut Viewer<E, H>) -> usize {
        let mut delivered = 0;
        loop {
            self.pool.run_until_stalled();
            let next = self.queue.borrow_mut().pop_front();
            match next {
                Some(event) => {
                    viewer.handle(event);
                    delivered += 1;
                }
                None => return delivered,
            }
        }
    }
}

pub fn mount(
    harness: &Harness,
    importer: impl AssetImporter + 'static,
    xr: impl XrProvider + 'static,
) -> (Viewer<MockEngine, MockHost>, Rc<RefCell<EngineStats>>, PageView) {
    let (engine, stats) = MockEngine::new();
    let (host, page) = MockHost::new();
    let viewer = Viewer::mount(engine, host, harness.services(importer, xr), ViewerConfig::default())
        .expect("mount");
    (viewer, stats, page)
}

// ---------------------------------------------------------------------------
// Importers
// ---------------------------------------------------------------------------

/// Two nodes: the root (raised to y = 5) and a "band" with one triangle.
pub fn sample_asset() -> ImportedAsset {
    let mut root = MeshNode::root();
    root.transform.position = Vector3::new(1.0, 5.0, -2.0);
    let band = MeshNode::new("band", Transform::from(Vector3::new(0.0, 0.5, 0.0)), Some(0)).with_geometry(
        MeshData {
            primitives: vec![Primitive {
                vertices: vec![
                    ModelVertex {
                        position: [0.0, 0.0, 0.0],
                        normal: [0.0, 0.0, 1.0],
                    },
                    ModelVertex {
                        position: [1.0, 0.0, 0.0],
                        normal: [0.0, 0.0, 1.0],
                    },
                    ModelVertex {
                        position: [0.0, 1.0, 0.0],
                        normal: [0.0, 0.0, 1.0],
                    },
                ],
                indices: vec![0, 1, 2],
                base_colour: [0.9, 0.8, 0.2, 1.0],
            }],
        },
    );
    ImportedAsset {
        meshes: vec![root, band],
    }
}

/// Resolves immediately with a fixed asset and records what was requested.
pub struct StaticImporter {
    asset: ImportedAsset,
    pub requested: Rc<RefCell<Vec<String>>>,
}

impl StaticImporter {
    pub fn new(asset: ImportedAsset) -> Self {
        Self {
            asset,
            requested: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl AssetImporter for StaticImporter {
    fn import(&self, location: &str) -> LocalBoxFuture<'static, anyhow::Result<ImportedAsset>> {
        self.requested.borrow_mut().push(location.to_string());
        let asset = self.asset.clone();
        async move { Ok(asset) }.boxed_local()
    }
}

pub struct FailingImporter(pub &'static str);

impl AssetImporter for FailingImporter {
    fn import(&self, _location: &str) -> LocalBoxFuture<'static, anyhow::Result<ImportedAsset>> {
        let message = self.0;
        async move { Err(anyhow!(message)) }.boxed_local()
    }
}

/// Never finishes on its own; the test completes it through the returned sender.
pub struct PendingImporter {
    rx: RefCell<Option<oneshot::Receiver<ImportedAsset>>>,
}

impl PendingImporter {
    pub fn new() -> (Self, oneshot::Sender<ImportedAsset>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                rx: RefCell::new(Some(rx)),
            },
            tx,
        )
    }
}

impl AssetImporter for PendingImporter {
    fn import(&self, _location: &str) -> LocalBoxFuture<'static, anyhow::Result<ImportedAsset>> {
        let rx = self.rx.borrow_mut().take();
        async move {
            match rx {
                Some(rx) => rx.await.map_err(|_| anyhow!("import abandoned")),
                None => Err(anyhow!("imported twice")),
            }
        }
        .boxed_local()
    }
}

// ---------------------------------------------------------------------------
// XR
// ---------------------------------------------------------------------------

/// Replays a stream of states and notes when it is released.
pub struct StreamExperience {
    states: Option<LocalBoxStream<'static, XrState>>,
    released: Rc<Cell<bool>>,
}

impl StreamExperience {
    pub fn new(states: LocalBoxStream<'static, XrState>) -> (Self, Rc<Cell<bool>>) {
        let released = Rc::new(Cell::new(false));
        (
            Self {
                states: Some(states),
                released: released.clone(),
            },
            released,
        )
    }

    /// An experience driven through the returned sender.
    pub fn channel() -> (Self, mpsc::UnboundedSender<XrState>, Rc<Cell<bool>>) {
        let (tx, rx) = mpsc::unbounded();
        let (experience, released) = Self::new(rx.boxed_local());
        (experience, tx, released)
    }
}

impl XrExperience for StreamExperience {
    fn state_changes(&mut self) -> LocalBoxStream<'static, XrState> {
        self.states.take().unwrap_or_else(|| stream::empty().boxed_local())
    }
}

impl Drop for StreamExperience {
    fn drop(&mut self) {
        self.released.set(true);
    }
}

/// Every request succeeds and replays the same states.
pub struct ScriptedXr {
    states: Vec<XrState>,
    pub requests: Rc<Cell<u32>>,
}

impl ScriptedXr {
    pub fn new(states: Vec<XrState>) -> Self {
        Self {
            states,
            requests: Rc::new(Cell::new(0)),
        }
    }
}

impl XrProvider for ScriptedXr {
    fn create_ar_experience(
        &self,
        _options: &XrOptions,
    ) -> LocalBoxFuture<'static, anyhow::Result<Box<dyn XrExperience>>> {
        self.requests.set(self.requests.get() + 1);
        let (experience, _) = StreamExperience::new(stream::iter(self.states.clone()).boxed_local());
        async move { Ok(Box::new(experience) as Box<dyn XrExperience>) }.boxed_local()
    }
}

pub struct RejectingXr(pub &'static str);

impl XrProvider for RejectingXr {
    fn create_ar_experience(
        &self,
        _options: &XrOptions,
    ) -> LocalBoxFuture<'static, anyhow::Result<Box<dyn XrExperience>>> {
        let message = self.0;
        async move { Err(anyhow!(message)) }.boxed_local()
    }
}

type PendingRequest = oneshot::Sender<anyhow::Result<Box<dyn XrExperience>>>;

/// Requests stay pending until the test answers them.
#[derive(Clone, Default)]
pub struct ControlledXr {
    requests: Rc<RefCell<Vec<PendingRequest>>>,
    pub options_seen: Rc<RefCell<Vec<XrOptions>>>,
}

impl ControlledXr {
    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    /// Answers the oldest pending request. Returns `false` if the requester already gave up.
    pub fn answer(&self, result: anyhow::Result<Box<dyn XrExperience>>) -> bool {
        let tx = self.requests.borrow_mut().remove(0);
        tx.send(result).is_ok()
    }

    /// `true` if the oldest pending request was dropped by its requester.
    pub fn oldest_abandoned(&self) -> bool {
        self.requests
            .borrow()
            .first()
            .map(|tx| tx.is_canceled())
            .unwrap_or(false)
    }
}

impl XrProvider for ControlledXr {
    fn create_ar_experience(
        &self,
        options: &XrOptions,
    ) -> LocalBoxFuture<'static, anyhow::Result<Box<dyn XrExperience>>> {
        self.options_seen.borrow_mut().push(options.clone());
        let (tx, rx) = oneshot::channel();
        self.requests.borrow_mut().push(tx);
        async move { rx.await.unwrap_or_else(|_| Err(anyhow!("request abandoned"))) }.boxed_local()
    }
}
