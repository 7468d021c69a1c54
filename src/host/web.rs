use std::collections::HashMap;

use anyhow::{Context, anyhow};
use wasm_bindgen::{JsCast, JsValue, closure::Closure};
use web_sys::{AddEventListenerOptions, Document, Event, EventTarget, HtmlCanvasElement, HtmlElement, WheelEvent};

use crate::{
    events::{Dispatcher, ViewerEvent},
    lifecycle::{Host, ListenerHandle, ListenerKind, TriggerHandle, TriggerSpec},
};

type Callback = Closure<dyn FnMut(Event)>;

fn js_err(value: JsValue) -> anyhow::Error {
    anyhow!("{}", value.as_string().unwrap_or_else(|| format!("{:?}", value)))
}

struct Registration {
    target: EventTarget,
    event: &'static str,
    callback: Callback,
}

impl Registration {
    fn release(self) {
        if let Err(e) = self
            .target
            .remove_event_listener_with_callback(self.event, self.callback.as_ref().unchecked_ref())
        {
            log::warn!("Could not remove `{}` listener: {:?}", self.event, e);
        }
    }
}

/// The page the canvas lives in.
pub struct DomHost {
    document: Document,
    canvas: HtmlCanvasElement,
    next_id: u64,
    triggers: HashMap<u64, (HtmlElement, Registration)>,
    listeners: HashMap<u64, Registration>,
}

impl DomHost {
    pub fn new(canvas: HtmlCanvasElement) -> anyhow::Result<Self> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .context("no document to attach to")?;
        Ok(Self {
            document,
            canvas,
            next_id: 0,
            triggers: HashMap::new(),
            listeners: HashMap::new(),
        })
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn button(&self, spec: &TriggerSpec) -> anyhow::Result<HtmlElement> {
        let button: HtmlElement = self
            .document
            .create_element("button")
            .map_err(js_err)?
            .dyn_into()
            .map_err(|_| anyhow!("created element is not an HtmlElement"))?;
        button.set_text_content(Some(&spec.label));
        let style = button.style();
        for (property, value) in [
            ("position", "absolute".to_string()),
            ("bottom", format!("{}px", spec.bottom_px)),
            ("left", format!("{}px", spec.left_px)),
            ("z-index", "10".to_string()),
        ] {
            style.set_property(property, &value).map_err(js_err)?;
        }
        Ok(button)
    }
}

impl Host for DomHost {
    fn create_trigger(&mut self, spec: &TriggerSpec, dispatch: Dispatcher) -> anyhow::Result<TriggerHandle> {
        let button = self.button(spec)?;
        let callback: Callback = Closure::wrap(Box::new(move |_event: Event| {
            dispatch.dispatch(ViewerEvent::EnterAr);
        }) as Box<dyn FnMut(_)>);
        button
            .add_event_listener_with_callback("click", callback.as_ref().unchecked_ref())
            .map_err(js_err)?;
        let body = self.document.body().context("document has no body")?;
        body.append_child(&button).map_err(js_err)?;

        let id = self.next_id();
        let target: EventTarget = button.clone().into();
        self.triggers.insert(
            id,
            (
                button,
                Registration {
                    target,
                    event: "click",
                    callback,
                },
            ),
        );
        Ok(TriggerHandle(id))
    }

    fn remove_trigger(&mut self, handle: TriggerHandle) {
        if let Some((button, registration)) = self.triggers.remove(&handle.0) {
            registration.release();
            button.remove();
        }
    }

    fn add_listener(&mut self, kind: ListenerKind, dispatch: Dispatcher) -> anyhow::Result<ListenerHandle> {
        let registration = match kind {
            ListenerKind::Resize => {
                let target: EventTarget = web_sys::window().context("no global window")?.into();
                let callback: Callback = Closure::wrap(Box::new(move |_event: Event| {
                    dispatch.dispatch(ViewerEvent::Resize);
                }) as Box<dyn FnMut(_)>);
                target
                    .add_event_listener_with_callback("resize", callback.as_ref().unchecked_ref())
                    .map_err(js_err)?;
                Registration {
                    target,
                    event: "resize",
                    callback,
                }
            }
            ListenerKind::Wheel => {
                let target: EventTarget = self.canvas.clone().into();
                let callback: Callback = Closure::wrap(Box::new(move |event: Event| {
                    // keep the page from scrolling while zooming
                    event.prevent_default();
                    if let Some(wheel) = event.dyn_ref::<WheelEvent>() {
                        dispatch.dispatch(ViewerEvent::Wheel {
                            delta_y: wheel.delta_y() as f32,
                        });
                    }
                }) as Box<dyn FnMut(_)>);
                let options = AddEventListenerOptions::new();
                options.set_passive(false);
                target
                    .add_event_listener_with_callback_and_add_event_listener_options(
                        "wheel",
                        callback.as_ref().unchecked_ref(),
                        &options,
                    )
                    .map_err(js_err)?;
                Registration {
                    target,
                    event: "wheel",
                    callback,
                }
            }
        };
        let id = self.next_id();
        self.listeners.insert(id, registration);
        Ok(ListenerHandle(id))
    }

    fn remove_listener(&mut self, handle: ListenerHandle) {
        if let Some(registration) = self.listeners.remove(&handle.0) {
            registration.release();
        }
    }
}
