//! AGAS namespace authority binary.
//!
//! The authority runs as a daemon process and owns:
//! - the locality partition table
//! - the global identifier bindings
//! - the credit reference counts

use std::net::SocketAddr;
use std::path::PathBuf;

use agas_authority::{Authority, AuthorityConfig};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Authority command line arguments.
#[derive(Parser, Debug)]
#[command(name = "agas-authority")]
#[command(about = "Global address namespace authority")]
struct Args {
	/// TOML configuration file
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Address to listen on (overrides the configuration file)
	#[arg(short, long, value_name = "ADDR")]
	listen: Option<SocketAddr>,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	info!("starting agas-authority");

	let mut config = match &args.config {
		Some(path) => AuthorityConfig::load(path)?,
		None => AuthorityConfig::default(),
	};
	if let Some(listen) = args.listen {
		config.listen = listen;
	}

	info!(
		listen = %config.listen,
		decrement_policy = ?config.decrement_policy,
		max_localities = config.max_localities,
		"configuration loaded"
	);

	let listen = config.listen;
	let authority = Authority::new_with_config(config);
	let shutdown = CancellationToken::new();

	let on_signal = shutdown.clone();
	tokio::spawn(async move {
		match tokio::signal::ctrl_c().await {
			Ok(()) => info!("interrupt received"),
			Err(e) => tracing::error!(error = %e, "failed to listen for interrupt"),
		}
		on_signal.cancel();
	});

	agas_authority::ipc::serve(listen, authority, shutdown).await?;

	Ok(())
}

fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::fmt::format::FmtSpan;
	use tracing_subscriber::prelude::*;

	// AGAS_LOG_DIR redirects logs to a per-process file
	if let Some(log_dir) = std::env::var("AGAS_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let pid = std::process::id();
		let log_path = log_dir.join(format!("agas-authority.{pid}.log"));

		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
				if verbose {
					EnvFilter::new("agas_authority=trace,agas_rpc=debug,info")
				} else {
					EnvFilter::new("agas_authority=debug,info")
				}
			});

			let file_layer = tracing_subscriber::fmt::layer()
				.with_writer(file)
				.with_ansi(false)
				.with_span_events(FmtSpan::CLOSE)
				.with_target(true);

			tracing_subscriber::registry()
				.with(filter)
				.with(file_layer)
				.init();

			tracing::info!(path = ?log_path, "Authority tracing initialized");
			return;
		}
	}

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		EnvFilter::new(if verbose { "debug" } else { "info" })
	});
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}
