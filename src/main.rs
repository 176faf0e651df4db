use captime::capture::{self, PacketStream, PcapStream};
use captime::cli;
use captime::config::{self, RuntimeConfig};
use captime::display::PacketRenderer;
use captime::session::Session;
use captime::shutdown::ShutdownToken;
use clap::error::ErrorKind;
use clap::Parser;
use std::io::{self, Write};
use std::path::Path;

fn main() {
    let args = match cli::Cli::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            // Nothing useful to do if stderr is gone.
            let _ = err.print();
            std::process::exit(code);
        }
    };

    // Initialize tracing/logging
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let program = program_name();

    let config = match config::load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}: {}", program, err);
            eprintln!("Try '{} --help' for more information.", program);
            std::process::exit(1);
        }
    };

    if let Err(e) = run_session(&config, &program) {
        eprintln!("{}: {}", program, e);
        std::process::exit(1);
    }
}

/// Name the binary was invoked as, e.g. /usr/bin/captime -> captime
fn program_name() -> String {
    std::env::args()
        .next()
        .as_deref()
        .and_then(|arg0| Path::new(arg0).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

/// Open the stream and filter, run the session and print the summary.
fn run_session(config: &RuntimeConfig, program: &str) -> Result<(), Box<dyn std::error::Error>> {
    let stream = PcapStream::open(
        &config.stream_address(),
        config.iface.as_deref(),
        &config.capture,
    )?;
    tracing::info!(stream = %stream.describe(), "stream opened");

    let filter = capture::filter::compile(&config.filter, stream.linktype())?;

    let shutdown = ShutdownToken::new();
    if let Err(e) = shutdown.install(program) {
        tracing::warn!(error = %e, "failed to set Ctrl-C handler");
    }

    let renderer = PacketRenderer::new(config.format.clone());
    let session = Session::new(
        config.session.clone(),
        Box::new(stream),
        filter,
        renderer,
        shutdown,
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let summary = session.run(&mut out)?;
    if summary.read_errors > 0 {
        tracing::warn!(errors = summary.read_errors, "some reads failed and were skipped");
    }
    summary.write(&mut out)?;
    out.flush()?;
    Ok(())
}
