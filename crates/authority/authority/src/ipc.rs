//! TCP server for authority communication.

use std::net::SocketAddr;
use std::sync::Arc;

use agas_proto::AgasProtocol;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::core::Authority;
use crate::service::AuthorityService;

/// Bind `addr` and serve the authority until `shutdown` fires.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn serve(addr: SocketAddr, authority: Arc<Authority>, shutdown: CancellationToken) -> std::io::Result<()> {
	let listener = TcpListener::bind(addr).await?;
	serve_listener(listener, authority, shutdown).await
}

/// Serve the authority on an already bound listener until `shutdown` fires.
///
/// Connections in progress are not interrupted by shutdown; they end when the
/// peer hangs up.
///
/// # Errors
///
/// Returns an error if the listener's local address cannot be read.
pub async fn serve_listener(
	listener: TcpListener,
	authority: Arc<Authority>,
	shutdown: CancellationToken,
) -> std::io::Result<()> {
	tracing::info!(addr = %listener.local_addr()?, "Authority server listening");

	loop {
		tokio::select! {
			_ = shutdown.cancelled() => {
				let stats = authority.stats();
				tracing::info!(
					localities = stats.localities,
					bindings = stats.bindings,
					refcounts = stats.refcounts,
					"Authority server shutting down"
				);
				break;
			}
			res = listener.accept() => {
				match res {
					Ok((stream, peer)) => {
						tokio::spawn(handle_connection(stream, peer, authority.clone()));
					}
					Err(e) => {
						tracing::error!(error = %e, "Failed to accept connection");
					}
				}
			}
		}
	}

	Ok(())
}

/// Handle a single client connection.
pub(crate) async fn handle_connection(stream: TcpStream, peer: SocketAddr, authority: Arc<Authority>) {
	tracing::debug!(%peer, "New authority connection");
	if let Err(e) = stream.set_nodelay(true) {
		tracing::debug!(%peer, error = %e, "Failed to set TCP_NODELAY");
	}

	let (reader, writer) = stream.into_split();
	let reader = tokio::io::BufReader::new(reader);
	let service = AuthorityService::new(authority);

	if let Err(e) = agas_rpc::serve_connection(AgasProtocol::new(), service, reader, writer).await {
		tracing::warn!(%peer, error = %e, "Authority connection error");
	}

	tracing::debug!(%peer, "Authority connection closed");
}
