//! Server-side request pump.

use std::future::poll_fn;

use tokio::io::{AsyncBufRead, AsyncWrite};
use tower_service::Service;

use crate::protocol::{Inbound, Protocol};
use crate::{Error, Result};

/// Serve one connection until the peer hangs up.
///
/// Requests are handled strictly in arrival order: each one is answered before
/// the next is read, so replies on a connection preserve request order. Handler
/// errors become error responses and never end the loop; only transport
/// failures do. A clean EOF between frames, or a peer that vanishes while its
/// reply is being written, ends the loop with `Ok(())`.
///
/// # Errors
///
/// Returns the transport error that terminated the connection.
pub async fn serve_connection<P, S, R, W>(
	mut protocol: P,
	mut service: S,
	mut input: R,
	mut output: W,
) -> Result<()>
where
	P: Protocol,
	S: Service<P::Request, Response = P::ReqResult, Error = P::ReqError> + Send,
	S::Future: Send,
	R: AsyncBufRead + Unpin + Send,
	W: AsyncWrite + Unpin + Send,
{
	loop {
		let msg = match protocol.read_message(&mut input).await {
			Ok(msg) => msg,
			Err(Error::Eof) => return Ok(()),
			Err(e) => return Err(e),
		};

		let req = match P::split_inbound(msg) {
			Inbound::Request(req) => req,
			Inbound::Response(resp) => {
				tracing::warn!(id = ?P::response_id(&resp), "dropping unsolicited response");
				continue;
			}
		};

		let id = P::request_id(&req);
		let result = match poll_fn(|cx| service.poll_ready(cx)).await {
			Ok(()) => service.call(req).await,
			Err(e) => Err(e),
		};
		let resp = match result {
			Ok(ok) => P::response_ok(id, ok),
			Err(err) => P::response_err(id, err),
		};

		match protocol.write_message(&mut output, &P::wrap_response(resp)).await {
			Ok(()) => {}
			Err(e) if e.is_disconnect() => {
				tracing::debug!(error = %e, "peer went away before reply was written");
				return Ok(());
			}
			Err(e) => return Err(e),
		}
	}
}
