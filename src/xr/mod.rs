//! Immersive AR session control.
//!
//! The viewer never talks to WebXR directly. It asks an [`XrProvider`] for an
//! experience and watches the experience's state stream. [`ArSessionController`]
//! is the small state machine on top of that:
//!
//! ```text
//!            enter()               InXr
//! Inactive ───────────▶ Requesting ──────▶ Active
//!    ▲                      │                │
//!    └──────── Failed ──────┘                │
//!    └────── ExitingXr / NotInXr / Ended ────┘
//! ```
//!
//! `enter()` is only honoured while `Inactive`; further clicks are ignored
//! until the current request has either failed or the session has ended.

use std::rc::Rc;

use futures::{
    StreamExt,
    future::{AbortHandle, LocalBoxFuture},
    stream::LocalBoxStream,
};

use crate::{
    error::{ViewerError, describe},
    events::{Dispatcher, Spawner, ViewerEvent, spawn_abortable},
};

#[cfg(not(target_arch = "wasm32"))]
pub mod unsupported;
#[cfg(target_arch = "wasm32")]
pub mod web;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    ImmersiveAr,
    ImmersiveVr,
    Inline,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImmersiveAr => "immersive-ar",
            Self::ImmersiveVr => "immersive-vr",
            Self::Inline => "inline",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrOptions {
    pub session_mode: SessionMode,
    pub optional_features: Vec<String>,
}

impl Default for XrOptions {
    fn default() -> Self {
        Self {
            session_mode: SessionMode::ImmersiveAr,
            optional_features: vec!["local-floor".to_string()],
        }
    }
}

/// States reported by an experience. The numeric codes follow the usual web XR
/// helper convention; `InXr` is the only "active" one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrState {
    EnteringXr,
    InXr,
    ExitingXr,
    NotInXr,
}

impl XrState {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::EnteringXr),
            1 => Some(Self::InXr),
            2 => Some(Self::ExitingXr),
            3 => Some(Self::NotInXr),
            _ => None,
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Self::EnteringXr => 0,
            Self::InXr => 1,
            Self::ExitingXr => 2,
            Self::NotInXr => 3,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::InXr)
    }
}

/// A negotiated XR experience. Dropping it releases the underlying session.
pub trait XrExperience {
    /// Stream of state changes, starting with whatever happened since creation.
    fn state_changes(&mut self) -> LocalBoxStream<'static, XrState>;
}

pub trait XrProvider {
    fn create_ar_experience(
        &self,
        options: &XrOptions,
    ) -> LocalBoxFuture<'static, anyhow::Result<Box<dyn XrExperience>>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Inactive,
    Requesting,
    Active,
}

/// Progress of one AR request, tagged with the attempt that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XrEvent {
    Ready { attempt: u64 },
    StateChanged { attempt: u64, state: XrState },
    Failed { attempt: u64, error: ViewerError },
    /// The state stream closed and the experience was released.
    Ended { attempt: u64 },
}

impl XrEvent {
    pub fn attempt(&self) -> u64 {
        match self {
            Self::Ready { attempt }
            | Self::StateChanged { attempt, .. }
            | Self::Failed { attempt, .. }
            | Self::Ended { attempt } => *attempt,
        }
    }
}

#[derive(Debug)]
pub struct ArSessionController {
    options: XrOptions,
    phase: SessionPhase,
    attempt: u64,
    task: Option<AbortHandle>,
}

impl ArSessionController {
    pub fn new(options: XrOptions) -> Self {
        Self {
            options,
            phase: SessionPhase::Inactive,
            attempt: 0,
            task: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Starts a new AR request. Returns `false` if the request was ignored
    /// because one is already in flight or a session is running.
    pub fn enter(
        &mut self,
        provider: &dyn XrProvider,
        spawner: &dyn Spawner,
        dispatch: &Dispatcher,
    ) -> bool {
        if self.phase != SessionPhase::Inactive {
            log::warn!("Ignoring AR request while the session is {:?}", self.phase);
            return false;
        }
        self.cancel_task();
        self.attempt += 1;
        self.phase = SessionPhase::Requesting;

        let attempt = self.attempt;
        let request = provider.create_ar_experience(&self.options);
        let dispatch = dispatch.clone();
        let send = move |event: XrEvent| dispatch.dispatch(ViewerEvent::Xr(event));
        log::info!("Requesting {} session", self.options.session_mode.as_str());

        self.task = Some(spawn_abortable(spawner, async move {
            match request.await {
                Ok(mut experience) => {
                    send(XrEvent::Ready { attempt });
                    let mut states = experience.state_changes();
                    while let Some(state) = states.next().await {
                        send(XrEvent::StateChanged { attempt, state });
                    }
                    drop(experience);
                    send(XrEvent::Ended { attempt });
                }
                Err(err) => send(XrEvent::Failed {
                    attempt,
                    error: ViewerError::XrNegotiation(describe(&err)),
                }),
            }
        }));
        true
    }

    pub fn on_event(&mut self, event: XrEvent) {
        if event.attempt() != self.attempt {
            log::debug!("Discarding {:?} from a superseded AR request", event);
            return;
        }
        match event {
            XrEvent::Ready { .. } => log::info!("WebXR AR experience is ready"),
            XrEvent::StateChanged { state, .. } => {
                log::info!("WebXR state changed: {:?} ({})", state, state.code());
                if state.is_active() {
                    log::info!("AR session is active.");
                } else {
                    log::info!("AR session not active.");
                }
                match state {
                    XrState::InXr => self.phase = SessionPhase::Active,
                    XrState::EnteringXr => (),
                    XrState::ExitingXr => self.phase = SessionPhase::Inactive,
                    XrState::NotInXr => {
                        self.phase = SessionPhase::Inactive;
                        self.cancel_task();
                    }
                }
            }
            XrEvent::Failed { error, .. } => {
                log::error!("{}", error);
                self.phase = SessionPhase::Inactive;
                self.task = None;
            }
            XrEvent::Ended { .. } => {
                if self.phase != SessionPhase::Inactive {
                    log::info!("AR session ended.");
                }
                self.phase = SessionPhase::Inactive;
                self.task = None;
            }
        }
    }

    /// Drops any pending request or running subscription.
    pub fn shutdown(&mut self) {
        self.cancel_task();
        self.phase = SessionPhase::Inactive;
    }

    fn cancel_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ArSessionController {
    fn drop(&mut self) {
        self.cancel_task();
    }
}

/// The XR provider for the current target: WebXR in the browser, a rejecting stub elsewhere.
pub fn default_provider() -> Rc<dyn XrProvider> {
    #[cfg(target_arch = "wasm32")]
    {
        Rc::new(web::WebXrProvider)
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        Rc::new(unsupported::UnsupportedXr)
    }
}
