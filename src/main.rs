use anyhow::{anyhow, Context};
use clap::Parser;
use dbgsync::bridge::{AbsoluteAddress, Session};
use dbgsync::config::Config;
use dbgsync::rpc::tracer::FileTracer;
use dbgsync::rpc::{request_shutdown, RpcServer};
use dbgsync::view::ObjectView;
use dbgsync::{sync_info, sync_warn};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Program to analyze.
    #[arg(required_unless_present = "stop")]
    binary: Option<PathBuf>,

    /// Config file (default: ~/.config/dbgsync/config.toml)
    #[clap(long, env = "DBGSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on (default: 127.0.0.1:1337)
    #[clap(long)]
    listen: Option<String>,

    /// Page size used to compute the base address from the entry point.
    #[clap(long, value_parser = parse_page_size)]
    page_size: Option<u64>,

    /// Debug level logging.
    #[clap(short, long)]
    verbose: bool,

    /// Disable logging.
    #[clap(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Optional log file for server diagnostics.
    #[clap(long)]
    log_file: Option<PathBuf>,

    /// Trace RPC traffic (requests/responses) into the log file.
    /// Requires --log-file.
    #[clap(long)]
    trace_rpc: bool,

    /// Ask a running server to stop and exit.
    #[clap(long)]
    stop: bool,
}

fn parse_page_size(s: &str) -> Result<u64, String> {
    s.parse::<AbsoluteAddress>()
        .map(u64::from)
        .map_err(|e| e.to_string())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dbgsync::log::init(args.verbose);
    if args.quiet {
        dbgsync::log::disable();
    }
    let config = Config::from_file(args.config.as_deref());
    if config.verbose && !args.quiet {
        dbgsync::log::set_verbose(true);
    }

    let listen = args.listen.clone().unwrap_or_else(|| config.listen_addr());
    if args.stop {
        request_shutdown(listen.as_str()).context("stop request")?;
        return Ok(());
    }

    let binary = args
        .binary
        .as_deref()
        .ok_or_else(|| anyhow!("binary path required"))?;
    let page_size = args.page_size.unwrap_or(config.page_size);
    let view = Arc::new(
        ObjectView::load(binary, page_size)
            .with_context(|| format!("load {}", binary.display()))?,
    );

    let session = Session::new(view.as_ref(), view.clone(), view.clone(), config.palette())?
        .into_shared();

    let tracer = match &args.log_file {
        Some(path) => Some(FileTracer::new(path)?),
        None => None,
    };
    if args.trace_rpc && tracer.is_none() {
        sync_warn!(target: "rpc", "--trace-rpc requires --log-file; tracing disabled");
    }

    let server = RpcServer::bind(&listen, session)?.with_tracer(tracer, args.trace_rpc);
    let addr = server.local_addr()?;
    sync_info!(
        target: "rpc",
        "listening on {addr}, use `dbgsync --stop --listen {addr}` to stop"
    );

    let shutdown = server.shutdown_signal();
    _ = ctrlc::set_handler(move || {
        if !shutdown.raise() {
            // second interrupt while the server is still stopping
            std::process::exit(130);
        }
        sync_info!(target: "rpc", "interrupted, stopping rpc server");
    });

    server
        .spawn()?
        .join()
        .map_err(|_| anyhow!("rpc worker panicked"))?
}
