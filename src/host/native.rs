use std::collections::HashMap;

use winit::{
    event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

use crate::{
    events::{Dispatcher, ViewerEvent},
    lifecycle::{Host, ListenerHandle, ListenerKind, TriggerHandle, TriggerSpec},
};

/// Pixels per wheel "line", matching what browsers report in `deltaY`.
const LINE_HEIGHT_PX: f32 = 100.0;

/// A desktop window standing in for the document.
///
/// The AR trigger becomes a key binding and the listeners are fed from the
/// window events the event loop forwards.
#[derive(Debug, Default)]
pub struct WindowHost {
    next_id: u64,
    triggers: HashMap<u64, (KeyCode, Dispatcher)>,
    listeners: HashMap<u64, (ListenerKind, Dispatcher)>,
}

impl WindowHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn notify(&self, kind: ListenerKind, event: impl Fn() -> ViewerEvent) {
        self.listeners
            .values()
            .filter(|(k, _)| *k == kind)
            .for_each(|(_, dispatch)| dispatch.dispatch(event()));
    }
}

/// Converts winit's wheel delta into the browser's `deltaY` convention.
fn wheel_delta_y(delta: &MouseScrollDelta) -> f32 {
    match delta {
        // winit reports scrolling away from the user as positive, the DOM as negative
        MouseScrollDelta::LineDelta(_, y) => -y * LINE_HEIGHT_PX,
        MouseScrollDelta::PixelDelta(pos) => -pos.y as f32,
    }
}

impl Host for WindowHost {
    fn create_trigger(&mut self, spec: &TriggerSpec, dispatch: Dispatcher) -> anyhow::Result<TriggerHandle> {
        let id = self.next_id();
        self.triggers.insert(id, (spec.shortcut, dispatch));
        log::info!("Press {:?} to {}", spec.shortcut, spec.label);
        Ok(TriggerHandle(id))
    }

    fn remove_trigger(&mut self, handle: TriggerHandle) {
        self.triggers.remove(&handle.0);
    }

    fn add_listener(&mut self, kind: ListenerKind, dispatch: Dispatcher) -> anyhow::Result<ListenerHandle> {
        let id = self.next_id();
        self.listeners.insert(id, (kind, dispatch));
        Ok(ListenerHandle(id))
    }

    fn remove_listener(&mut self, handle: ListenerHandle) {
        self.listeners.remove(&handle.0);
    }

    fn window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                self.notify(ListenerKind::Resize, || ViewerEvent::Resize);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let delta_y = wheel_delta_y(delta);
                self.notify(ListenerKind::Wheel, || ViewerEvent::Wheel { delta_y });
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                self.triggers
                    .values()
                    .filter(|(key, _)| key == code)
                    .for_each(|(_, dispatch)| dispatch.dispatch(ViewerEvent::EnterAr));
            }
            _ => {}
        }
    }
}
