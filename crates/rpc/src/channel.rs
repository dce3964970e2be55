//! Client-side request channel.

use std::fmt;

use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::Mutex;

use crate::protocol::{Inbound, Protocol};
use crate::{Error, Result};

/// One request/reply connection shared by many tasks.
///
/// Calls are serialized: a task holds the connection from writing its request
/// until the matching reply arrives, so replies can never be handed to the
/// wrong caller. Responses whose ID does not match the in-flight request are
/// discarded.
///
/// A call that fails or is dropped before its reply is fully read leaves the
/// stream at an unknown frame boundary. The channel is then broken and every
/// later call fails with [`Error::Broken`]; callers must reconnect.
pub struct Channel<P: Protocol, R, W> {
	inner: Mutex<Inner<P, R, W>>,
}

struct Inner<P: Protocol, R, W> {
	protocol: P,
	id_gen: P::IdGen,
	input: R,
	output: W,
	/// Set while a call is between writing and fully reading; stays set if it never finishes.
	broken: bool,
}

impl<P: Protocol, R, W> fmt::Debug for Channel<P, R, W> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Channel").finish_non_exhaustive()
	}
}

impl<P, R, W> Channel<P, R, W>
where
	P: Protocol,
	R: AsyncBufRead + Unpin + Send,
	W: AsyncWrite + Unpin + Send,
{
	/// Wrap the two halves of a connection.
	pub fn new(protocol: P, id_gen: P::IdGen, input: R, output: W) -> Self {
		Self {
			inner: Mutex::new(Inner {
				protocol,
				id_gen,
				input,
				output,
				broken: false,
			}),
		}
	}

	/// Send `req` with a fresh ID and wait for its response.
	///
	/// # Errors
	///
	/// Returns a transport error if the connection fails, closes, or the peer
	/// sends a request instead of a response, and [`Error::Broken`] if an
	/// earlier call on this channel did not complete.
	pub async fn call(&self, mut req: P::Request) -> Result<P::Response> {
		let mut guard = self.inner.lock().await;
		let inner = &mut *guard;
		if inner.broken {
			return Err(Error::Broken);
		}
		inner.broken = true;

		let id = P::next_id(&mut inner.id_gen);
		P::set_request_id(&mut req, id.clone());
		inner
			.protocol
			.write_message(&mut inner.output, &P::wrap_request(req))
			.await?;

		loop {
			let msg = inner.protocol.read_message(&mut inner.input).await?;
			match P::split_inbound(msg) {
				Inbound::Response(resp) if P::response_id(&resp) == id => {
					inner.broken = false;
					return Ok(resp);
				}
				Inbound::Response(resp) => {
					tracing::debug!(expected = ?id, got = ?P::response_id(&resp), "discarding stale response");
				}
				Inbound::Request(req) => {
					return Err(Error::Protocol(format!(
						"peer sent request {:?} on a client channel",
						P::request_id(&req)
					)));
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::future::{Ready, ready};
	use std::task::{Context, Poll};

	use std::time::Duration;

	use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf, split};
	use tower_service::Service;

	use super::*;
	use crate::{CounterIdGen, serve_connection};

	const REQUEST: u8 = 0;
	const OK: u8 = 1;
	const ERR: u8 = 2;

	/// Fixed-width test frames: tag, id, value.
	#[derive(Debug, Clone, Copy)]
	struct Frame {
		tag: u8,
		id: u64,
		value: i64,
	}

	struct FixedProtocol;

	impl Protocol for FixedProtocol {
		type Id = u64;
		type Message = Frame;
		type Request = Frame;
		type Response = Frame;
		type ReqResult = i64;
		type ReqError = i64;
		type IdGen = CounterIdGen;

		fn next_id(id_gen: &mut CounterIdGen) -> u64 {
			id_gen.next()
		}

		async fn read_message(
			&mut self,
			input: &mut (impl AsyncBufRead + Unpin + Send),
		) -> Result<Frame> {
			let tag = match input.read_u8().await {
				Ok(tag) => tag,
				Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(Error::Eof),
				Err(e) => return Err(e.into()),
			};
			let id = input.read_u64_le().await?;
			let value = input.read_i64_le().await?;
			Ok(Frame { tag, id, value })
		}

		async fn write_message(
			&mut self,
			output: &mut (impl AsyncWrite + Unpin + Send),
			msg: &Frame,
		) -> Result<()> {
			output.write_u8(msg.tag).await?;
			output.write_u64_le(msg.id).await?;
			output.write_i64_le(msg.value).await?;
			output.flush().await?;
			Ok(())
		}

		fn split_inbound(msg: Frame) -> Inbound<Frame, Frame> {
			if msg.tag == REQUEST {
				Inbound::Request(msg)
			} else {
				Inbound::Response(msg)
			}
		}

		fn request_id(req: &Frame) -> u64 {
			req.id
		}

		fn set_request_id(req: &mut Frame, id: u64) {
			req.id = id;
		}

		fn response_id(resp: &Frame) -> u64 {
			resp.id
		}

		fn wrap_request(req: Frame) -> Frame {
			req
		}

		fn wrap_response(resp: Frame) -> Frame {
			resp
		}

		fn response_ok(id: u64, result: i64) -> Frame {
			Frame { tag: OK, id, value: result }
		}

		fn response_err(id: u64, error: i64) -> Frame {
			Frame { tag: ERR, id, value: error }
		}
	}

	/// Doubles non-negative values, rejects negative ones.
	struct Doubler;

	impl Service<Frame> for Doubler {
		type Response = i64;
		type Error = i64;
		type Future = Ready<std::result::Result<i64, i64>>;

		fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), i64>> {
			Poll::Ready(Ok(()))
		}

		fn call(&mut self, req: Frame) -> Self::Future {
			ready(if req.value < 0 { Err(req.value) } else { Ok(req.value * 2) })
		}
	}

	type TestChannel =
		Channel<FixedProtocol, BufReader<ReadHalf<tokio::io::DuplexStream>>, WriteHalf<tokio::io::DuplexStream>>;

	fn spawn_pair() -> (TestChannel, tokio::task::JoinHandle<Result<()>>) {
		let (client, server) = tokio::io::duplex(1024);
		let (server_rx, server_tx) = split(server);
		let task = tokio::spawn(serve_connection(
			FixedProtocol,
			Doubler,
			BufReader::new(server_rx),
			server_tx,
		));
		let (client_rx, client_tx) = split(client);
		let channel = Channel::new(FixedProtocol, CounterIdGen::new(), BufReader::new(client_rx), client_tx);
		(channel, task)
	}

	fn request(value: i64) -> Frame {
		Frame { tag: REQUEST, id: 0, value }
	}

	#[tokio::test(flavor = "current_thread")]
	async fn replies_match_requests() -> Result<()> {
		let (channel, task) = spawn_pair();

		let first = channel.call(request(21)).await?;
		assert_eq!((first.tag, first.id, first.value), (OK, 0, 42));

		let second = channel.call(request(-3)).await?;
		assert_eq!((second.tag, second.id, second.value), (ERR, 1, -3));

		drop(channel);
		assert!(task.await.expect("server task panicked").is_ok());
		Ok(())
	}

	#[tokio::test(flavor = "current_thread")]
	async fn server_closing_surfaces_as_eof() {
		let (client, server) = tokio::io::duplex(64);
		drop(server);
		let (rx, tx) = split(client);
		let channel = Channel::new(FixedProtocol, CounterIdGen::new(), BufReader::new(rx), tx);
		let err = channel.call(request(1)).await.unwrap_err();
		assert!(err.is_disconnect(), "unexpected error: {err}");
	}

	#[tokio::test(flavor = "current_thread")]
	async fn unsolicited_response_is_ignored_by_server() -> Result<()> {
		let (client, server) = tokio::io::duplex(1024);
		let (server_rx, server_tx) = split(server);
		let task = tokio::spawn(serve_connection(
			FixedProtocol,
			Doubler,
			BufReader::new(server_rx),
			server_tx,
		));
		let (rx, mut tx) = split(client);
		let mut rx = BufReader::new(rx);

		let mut protocol = FixedProtocol;
		protocol.write_message(&mut tx, &Frame { tag: OK, id: 9, value: 0 }).await?;
		protocol.write_message(&mut tx, &Frame { tag: REQUEST, id: 4, value: 5 }).await?;
		let reply = protocol.read_message(&mut rx).await?;
		assert_eq!((reply.tag, reply.id, reply.value), (OK, 4, 10));

		drop(tx);
		drop(rx);
		assert!(task.await.expect("server task panicked").is_ok());
		Ok(())
	}

	#[tokio::test(flavor = "current_thread")]
	async fn abandoned_call_breaks_the_channel() -> Result<()> {
		let (client, server) = tokio::io::duplex(1024);
		let (server_rx, mut server_tx) = split(server);
		let mut server_rx = BufReader::new(server_rx);
		let (rx, tx) = split(client);
		let channel = Channel::new(FixedProtocol, CounterIdGen::new(), BufReader::new(rx), tx);

		let mut protocol = FixedProtocol;
		let (timed_out, partial) = tokio::join!(
			tokio::time::timeout(Duration::from_millis(50), channel.call(request(7))),
			async {
				let req = protocol.read_message(&mut server_rx).await?;
				// Only the head of the reply arrives before the caller gives up.
				server_tx.write_u8(OK).await?;
				server_tx.write_u64_le(req.id).await?;
				server_tx.flush().await?;
				Ok::<_, Error>(req)
			}
		);
		assert!(timed_out.is_err());
		assert_eq!(partial?.value, 7);

		server_tx.write_i64_le(14).await?;
		protocol.write_message(&mut server_tx, &Frame { tag: OK, id: 1, value: 16 }).await?;
		let err = channel.call(request(8)).await.unwrap_err();
		assert!(matches!(err, Error::Broken), "unexpected error: {err}");
		assert!(err.is_disconnect());
		Ok(())
	}
}
