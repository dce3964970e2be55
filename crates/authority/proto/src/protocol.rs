//! Length-prefixed postcard framing for [`IpcFrame`]s.

use agas_rpc::{CounterIdGen, Error, Inbound, Protocol, Result};
use tokio::io::{AsyncBufRead, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::types::{IpcFrame, Request, RequestId, Response, ResponsePayload, ServiceError};

/// Largest frame body accepted from a peer.
pub const MAX_FRAME_LEN: usize = 1 << 20;

/// Binding of the namespace protocol to [`agas_rpc`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AgasProtocol;

impl AgasProtocol {
	/// Creates the protocol binding.
	#[must_use]
	pub const fn new() -> Self {
		Self
	}
}

/// Read one frame: a little-endian `u32` length followed by a postcard body.
///
/// # Errors
///
/// Returns [`Error::Eof`] if the stream ends before the length prefix,
/// [`Error::FrameTooLarge`] for oversized frames and [`Error::Decode`] for
/// bodies that are not a valid [`IpcFrame`].
pub async fn read_frame(input: &mut (impl AsyncRead + Unpin + Send)) -> Result<IpcFrame> {
	let len = match input.read_u32_le().await {
		Ok(len) => len as usize,
		Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(Error::Eof),
		Err(e) => return Err(e.into()),
	};
	if len > MAX_FRAME_LEN {
		return Err(Error::FrameTooLarge {
			len,
			limit: MAX_FRAME_LEN,
		});
	}

	let mut buf = vec![0u8; len];
	input.read_exact(&mut buf).await?;
	postcard::from_bytes(&buf).map_err(|e| Error::Decode(e.to_string()))
}

/// Write one frame and flush it.
///
/// # Errors
///
/// Returns an error if encoding fails or the stream rejects the write.
pub async fn write_frame(output: &mut (impl AsyncWrite + Unpin + Send), frame: &IpcFrame) -> Result<()> {
	let buf = postcard::to_allocvec(frame).map_err(|e| Error::Encode(e.to_string()))?;
	if buf.len() > MAX_FRAME_LEN {
		return Err(Error::FrameTooLarge {
			len: buf.len(),
			limit: MAX_FRAME_LEN,
		});
	}
	output.write_u32_le(buf.len() as u32).await?;
	output.write_all(&buf).await?;
	output.flush().await?;
	Ok(())
}

impl Protocol for AgasProtocol {
	type Id = RequestId;
	type Message = IpcFrame;
	type Request = Request;
	type Response = Response;
	type ReqResult = ResponsePayload;
	type ReqError = ServiceError;
	type IdGen = CounterIdGen;

	fn next_id(id_gen: &mut CounterIdGen) -> RequestId {
		RequestId(id_gen.next())
	}

	async fn read_message(&mut self, input: &mut (impl AsyncBufRead + Unpin + Send)) -> Result<IpcFrame> {
		read_frame(input).await
	}

	async fn write_message(
		&mut self,
		output: &mut (impl AsyncWrite + Unpin + Send),
		msg: &IpcFrame,
	) -> Result<()> {
		write_frame(output, msg).await
	}

	fn split_inbound(msg: IpcFrame) -> Inbound<Request, Response> {
		match msg {
			IpcFrame::Request(req) => Inbound::Request(req),
			IpcFrame::Response(resp) => Inbound::Response(resp),
		}
	}

	fn request_id(req: &Request) -> RequestId {
		req.id
	}

	fn set_request_id(req: &mut Request, id: RequestId) {
		req.id = id;
	}

	fn response_id(resp: &Response) -> RequestId {
		resp.request_id
	}

	fn wrap_request(req: Request) -> IpcFrame {
		IpcFrame::Request(req)
	}

	fn wrap_response(resp: Response) -> IpcFrame {
		IpcFrame::Response(resp)
	}

	fn response_ok(id: RequestId, result: ResponsePayload) -> Response {
		Response::ok(id, result)
	}

	fn response_err(id: RequestId, error: ServiceError) -> Response {
		Response::error(id, error)
	}
}

#[cfg(test)]
mod tests {
	use agas_primitives::{Endpoint, Gid, GvaRecord, ObjectKind, Prefix};

	use super::*;
	use crate::types::{ErrorCode, RequestPayload, Status};

	fn endpoint() -> Endpoint {
		Endpoint("10.0.0.1:7910".parse().unwrap())
	}

	#[tokio::test(flavor = "current_thread")]
	async fn bind_request_survives_framing() -> Result<()> {
		let (mut a, mut b) = tokio::io::duplex(4096);
		let gid = Gid::from_prefix(Prefix(3)).checked_add(1).unwrap();
		let record = GvaRecord {
			endpoint: endpoint(),
			kind: ObjectKind(7),
			count: 16,
			address: 0xdead_0000,
			offset: 8,
			element_size: 64,
		};
		let frame = IpcFrame::Request(Request {
			id: RequestId(5),
			payload: RequestPayload::BindGid { gid, record },
		});

		write_frame(&mut a, &frame).await?;
		let IpcFrame::Request(decoded) = read_frame(&mut b).await? else {
			panic!("expected request frame");
		};
		assert_eq!(decoded.id, RequestId(5));
		let RequestPayload::BindGid {
			gid: decoded_gid,
			record: decoded_record,
		} = decoded.payload
		else {
			panic!("expected bind_gid payload");
		};
		assert_eq!(decoded_gid, gid);
		assert_eq!(decoded_record, record);
		Ok(())
	}

	#[tokio::test(flavor = "current_thread")]
	async fn error_response_keeps_code_and_message() -> Result<()> {
		let (mut a, mut b) = tokio::io::duplex(4096);
		let resp = Response::error(RequestId(1), ServiceError::new(ErrorCode::BadParameter, "overlap"));
		write_frame(&mut a, &IpcFrame::Response(resp)).await?;

		let IpcFrame::Response(decoded) = read_frame(&mut b).await? else {
			panic!("expected response frame");
		};
		assert_eq!(decoded.status, Status::Error(ErrorCode::BadParameter));
		assert_eq!(decoded.message.as_deref(), Some("overlap"));
		assert!(decoded.payload.is_none());
		Ok(())
	}

	#[tokio::test(flavor = "current_thread")]
	async fn oversized_length_is_rejected() {
		let (mut a, mut b) = tokio::io::duplex(64);
		a.write_u32_le((MAX_FRAME_LEN + 1) as u32).await.unwrap();
		let err = read_frame(&mut b).await.unwrap_err();
		assert!(matches!(err, Error::FrameTooLarge { .. }), "unexpected error: {err}");
	}

	#[tokio::test(flavor = "current_thread")]
	async fn garbage_body_is_a_decode_error() {
		let (mut a, mut b) = tokio::io::duplex(64);
		a.write_u32_le(3).await.unwrap();
		a.write_all(&[0xff, 0xff, 0xff]).await.unwrap();
		let err = read_frame(&mut b).await.unwrap_err();
		assert!(matches!(err, Error::Decode(_)), "unexpected error: {err}");
	}

	#[tokio::test(flavor = "current_thread")]
	async fn clean_close_is_eof() {
		let (a, mut b) = tokio::io::duplex(64);
		drop(a);
		assert!(matches!(read_frame(&mut b).await, Err(Error::Eof)));
	}

	#[test]
	fn negative_results_map_to_no_success() {
		assert_eq!(ResponsePayload::GidResolved(None).status(), Status::NoSuccess);
		assert_eq!(ResponsePayload::Unbound(None).status(), Status::NoSuccess);
		assert_eq!(ResponsePayload::GidBound { created: false }.status(), Status::NoSuccess);
		assert_eq!(ResponsePayload::GidBound { created: true }.status(), Status::Success);
		assert_eq!(ResponsePayload::Incremented { total: 3 }.status(), Status::Success);
	}
}
