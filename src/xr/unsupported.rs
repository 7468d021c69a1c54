use futures::{FutureExt, future::LocalBoxFuture};

use super::{XrExperience, XrOptions, XrProvider};

/// Native windows have no WebXR runtime; every request is rejected so the
/// controller falls back to `Inactive` and the user can keep looking at the model.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedXr;

impl XrProvider for UnsupportedXr {
    fn create_ar_experience(
        &self,
        options: &XrOptions,
    ) -> LocalBoxFuture<'static, anyhow::Result<Box<dyn XrExperience>>> {
        let mode = options.session_mode.as_str();
        async move { Err(anyhow::anyhow!("`{}` sessions are not available on this platform", mode)) }
            .boxed_local()
    }
}
