//! WebXR provider for the browser.
//!
//! `navigator.xr` is reached through `js-sys` reflection so the crate builds
//! without `web_sys_unstable_apis`. The session is requested directly; the
//! returned experience reports `EnteringXr`/`InXr` straight away and
//! `ExitingXr`/`NotInXr` once the session fires `end`.
//!
//! Limitation: no `XRWebGLLayer` is attached and no render state is set, so
//! the session runs (camera passthrough, tracking) but the model is not drawn
//! inside it. The wgpu scene keeps rendering to the page canvas only.

use anyhow::{Context, anyhow, bail};
use futures::{
    FutureExt, StreamExt,
    channel::mpsc::{self, UnboundedSender},
    future::LocalBoxFuture,
    stream::LocalBoxStream,
};
use js_sys::{Array, Function, Object, Promise, Reflect};
use wasm_bindgen::{JsCast, JsValue, closure::Closure};
use wasm_bindgen_futures::JsFuture;

use super::{XrExperience, XrOptions, XrProvider, XrState};

fn js_err(value: JsValue) -> anyhow::Error {
    anyhow!("{}", value.as_string().unwrap_or_else(|| format!("{:?}", value)))
}

fn method(target: &JsValue, name: &str) -> anyhow::Result<Function> {
    Reflect::get(target, &JsValue::from_str(name))
        .map_err(js_err)?
        .dyn_into::<Function>()
        .map_err(|_| anyhow!("`{}` is not a function", name))
}

async fn await_promise(value: JsValue) -> anyhow::Result<JsValue> {
    let promise: Promise = value
        .dyn_into()
        .map_err(|_| anyhow!("expected a promise"))?;
    JsFuture::from(promise).await.map_err(js_err)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WebXrProvider;

impl XrProvider for WebXrProvider {
    fn create_ar_experience(
        &self,
        options: &XrOptions,
    ) -> LocalBoxFuture<'static, anyhow::Result<Box<dyn XrExperience>>> {
        let options = options.clone();
        async move {
            let window = web_sys::window().context("no global window")?;
            let xr = Reflect::get(&window.navigator(), &JsValue::from_str("xr")).map_err(js_err)?;
            if xr.is_undefined() || xr.is_null() {
                bail!("WebXR is not available in this browser");
            }
            let mode = JsValue::from_str(options.session_mode.as_str());

            let supported = method(&xr, "isSessionSupported")?
                .call1(&xr, &mode)
                .map_err(js_err)?;
            if !await_promise(supported).await?.as_bool().unwrap_or(false) {
                bail!(
                    "`{}` sessions are not supported on this device",
                    options.session_mode.as_str()
                );
            }

            let init = Object::new();
            let features: Array = options
                .optional_features
                .iter()
                .map(|feature| JsValue::from_str(feature))
                .collect();
            Reflect::set(&init, &JsValue::from_str("optionalFeatures"), &features)
                .map_err(js_err)?;
            let request = method(&xr, "requestSession")?
                .call2(&xr, &mode, &init)
                .map_err(js_err)?;
            let session = await_promise(request).await?;

            Ok(Box::new(WebXrExperience::new(session)?) as Box<dyn XrExperience>)
        }
        .boxed_local()
    }
}

struct WebXrExperience {
    session: web_sys::EventTarget,
    ended: std::rc::Rc<std::cell::Cell<bool>>,
    states: Option<mpsc::UnboundedReceiver<XrState>>,
    on_end: Closure<dyn FnMut()>,
}

impl WebXrExperience {
    fn new(session: JsValue) -> anyhow::Result<Self> {
        let session: web_sys::EventTarget = session
            .dyn_into()
            .map_err(|_| anyhow!("XR session is not an event target"))?;
        let (sender, receiver) = mpsc::unbounded();
        send(&sender, XrState::EnteringXr);
        send(&sender, XrState::InXr);

        let ended = std::rc::Rc::new(std::cell::Cell::new(false));
        let ended_flag = ended.clone();
        let on_end = Closure::<dyn FnMut()>::new(move || {
            ended_flag.set(true);
            send(&sender, XrState::ExitingXr);
            send(&sender, XrState::NotInXr);
            sender.close_channel();
        });
        session
            .add_event_listener_with_callback("end", on_end.as_ref().unchecked_ref())
            .map_err(js_err)?;

        Ok(Self {
            session,
            ended,
            states: Some(receiver),
            on_end,
        })
    }
}

fn send(sender: &UnboundedSender<XrState>, state: XrState) {
    if sender.unbounded_send(state).is_err() {
        log::debug!("XR state {:?} dropped, nobody is listening", state);
    }
}

impl XrExperience for WebXrExperience {
    fn state_changes(&mut self) -> LocalBoxStream<'static, XrState> {
        match self.states.take() {
            Some(states) => states.boxed_local(),
            None => futures::stream::empty().boxed_local(),
        }
    }
}

impl Drop for WebXrExperience {
    fn drop(&mut self) {
        let _ = self
            .session
            .remove_event_listener_with_callback("end", self.on_end.as_ref().unchecked_ref());
        if !self.ended.get() {
            let end = method(&self.session, "end").and_then(|end| end.call0(&self.session).map_err(js_err));
            if let Err(e) = end {
                log::warn!("Could not end XR session: {:#}", e);
            }
        }
    }
}
