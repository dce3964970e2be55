//! Authority service implementation.

use std::future::{Ready, ready};
use std::sync::Arc;
use std::task::{Context, Poll};

use agas_proto::{Request, ResponsePayload, ServiceError};
use tower_service::Service;

use crate::core::Authority;

/// Per-connection request handler.
///
/// Each IPC connection gets its own instance sharing one [`Authority`].
/// Requests are answered synchronously, so the returned future is always ready.
#[derive(Debug, Clone)]
pub struct AuthorityService {
	authority: Arc<Authority>,
}

impl AuthorityService {
	/// Create a service handle for `authority`.
	#[must_use]
	pub fn new(authority: Arc<Authority>) -> Self {
		Self { authority }
	}
}

impl Service<Request> for AuthorityService {
	type Response = ResponsePayload;
	type Error = ServiceError;
	type Future = Ready<Result<Self::Response, Self::Error>>;

	fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		Poll::Ready(Ok(()))
	}

	fn call(&mut self, req: Request) -> Self::Future {
		tracing::trace!(id = req.id.0, op = req.payload.name(), "request");
		ready(self.authority.dispatch(req.payload))
	}
}
