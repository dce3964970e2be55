//! Paths from a client to the authority.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use agas_authority::Authority;
use agas_proto::{
	AgasProtocol, ErrorCode, PROTOCOL_VERSION, Request, RequestPayload, Response, ResponsePayload, Status,
};
use agas_rpc::{Channel, CounterIdGen};
use async_trait::async_trait;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::error::{ClientError, Result};

/// Carries one namespace operation to the authority and back.
#[async_trait]
pub trait Transport: Send + Sync {
	/// Issue `payload` and wait for the authority's answer.
	///
	/// # Errors
	///
	/// Returns [`ClientError::Namespace`] when the authority rejects the
	/// operation and [`ClientError::Transport`] when it cannot be reached.
	async fn request(&self, payload: RequestPayload) -> Result<ResponsePayload>;
}

/// In-process transport for the locality that hosts the authority.
#[derive(Debug, Clone)]
pub struct LocalTransport {
	authority: Arc<Authority>,
}

impl LocalTransport {
	/// Wrap a shared authority.
	#[must_use]
	pub fn new(authority: Arc<Authority>) -> Self {
		Self { authority }
	}

	/// The authority requests are dispatched to.
	#[must_use]
	pub fn authority(&self) -> &Arc<Authority> {
		&self.authority
	}
}

#[async_trait]
impl Transport for LocalTransport {
	async fn request(&self, payload: RequestPayload) -> Result<ResponsePayload> {
		Ok(self.authority.dispatch(payload)?)
	}
}

type TcpChannel = Channel<AgasProtocol, BufReader<OwnedReadHalf>, OwnedWriteHalf>;

/// Transport to a remote authority over one TCP connection.
///
/// Requests from concurrent tasks are serialized on the connection. A request
/// that times out leaves the connection broken, and every later request fails
/// with a disconnect error until a new transport is connected.
#[derive(Debug)]
pub struct TcpTransport {
	channel: TcpChannel,
	peer: SocketAddr,
	timeout: Duration,
}

impl TcpTransport {
	/// Connect to `addr` and perform the version handshake.
	///
	/// `timeout` bounds the connect and every later request.
	///
	/// # Errors
	///
	/// Fails if the connection cannot be established in time or the authority
	/// speaks another protocol version.
	pub async fn connect(addr: SocketAddr, timeout: Duration) -> Result<Self> {
		let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
			.await
			.map_err(|_| agas_rpc::Error::Timeout(timeout))?
			.map_err(agas_rpc::Error::from)?;
		stream.set_nodelay(true).map_err(agas_rpc::Error::from)?;

		let (reader, writer) = stream.into_split();
		let transport = Self {
			channel: Channel::new(AgasProtocol::new(), CounterIdGen::new(), BufReader::new(reader), writer),
			peer: addr,
			timeout,
		};
		transport.handshake().await?;
		tracing::debug!(peer = %addr, "connected to authority");
		Ok(transport)
	}

	/// Address of the authority.
	#[must_use]
	pub fn peer(&self) -> SocketAddr {
		self.peer
	}

	async fn handshake(&self) -> Result<()> {
		let hello = RequestPayload::Hello {
			version: PROTOCOL_VERSION,
		};
		match self.request(hello).await {
			Ok(ResponsePayload::Welcome { version }) if version == PROTOCOL_VERSION => Ok(()),
			Ok(ResponsePayload::Welcome { version }) => Err(agas_rpc::Error::VersionMismatch {
				local: PROTOCOL_VERSION,
				remote: version,
			}
			.into()),
			Ok(_) => Err(ClientError::UnexpectedReply { op: "hello" }),
			Err(ClientError::Namespace {
				code: ErrorCode::VersionMismatch,
				message,
			}) => Err(agas_rpc::Error::Protocol(message).into()),
			Err(e) => Err(e),
		}
	}
}

#[async_trait]
impl Transport for TcpTransport {
	async fn request(&self, payload: RequestPayload) -> Result<ResponsePayload> {
		let op = payload.name();
		let response = tokio::time::timeout(self.timeout, self.channel.call(Request::new(payload)))
			.await
			.map_err(|_| ClientError::from(agas_rpc::Error::Timeout(self.timeout)))??;
		into_result(op, response)
	}
}

fn into_result(op: &'static str, response: Response) -> Result<ResponsePayload> {
	match response.status {
		Status::Error(code) => Err(ClientError::Namespace {
			code,
			message: response.message.unwrap_or_default(),
		}),
		Status::Success | Status::NoSuccess => response.payload.ok_or(ClientError::UnexpectedReply { op }),
	}
}
