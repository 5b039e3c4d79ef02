//! Cloud proxy event entry point.
//!
//! The cloud-function transport: one event in, one proxy result out. The
//! request body already lives in the event, so there is nothing to stream
//! on the way in, and the result is always a complete buffered payload.

use edgestack_core::EdgeRequest;
use edgestack_model::{EdgeResult, ProxyEvent, ProxyResult};
use tracing::debug;

use crate::service::EdgeHttpService;

impl EdgeHttpService {
    /// Handle one cloud proxy event end to end.
    ///
    /// # Errors
    ///
    /// Returns [`edgestack_model::EdgeError::UnsupportedEvent`] for an
    /// unrecognized payload version. Pipeline failures do not surface here;
    /// they are rendered into the result as a structured error response.
    pub async fn handle_event(&self, event: &ProxyEvent) -> EdgeResult<ProxyResult> {
        let request = EdgeRequest::from_event(event)?;
        debug!(method = %request.method, path = request.path(), "handling proxy event");

        let mut ctx = self.context_for(request);
        ctx.handle(self.shared().router()).await;
        ctx.response.into_proxy_result()
    }
}
