//! `odolink-cli` – odolink Command Line Interface
//!
//! This binary wires the telemetry stack together.  It:
//!
//! 1. Loads `~/.odolink/config.toml`, writing the defaults on first run.
//! 2. Opens the link (first positional argument, else `link_path`).
//! 3. Starts the feed thread and the monitor poller.
//! 4. Drops the user into an **interactive REPL** with slash-commands
//!    (`/show`, `/pose`, `/speed`, `/pulse`, `/help`, …).
//! 5. Intercepts **Ctrl-C** to send a zero-speed command and exit safely.
//!
//! When the link is stdin (`-`) there is no REPL: frames are consumed until
//! end of stream, then the final poses and counters are printed.

mod config;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use odolink_kernel::{SnapshotStore, TelemetryPipeline};
use odolink_middleware::link::STDIN_PATH;
use odolink_middleware::{CommandSink, OutboundCommand, open_link};
use odolink_runtime::telemetry::init_tracing;
use odolink_runtime::{FeedWorker, Monitor, Panel, render_panel};

fn main() {
    // Held for the whole process; dropping it flushes exported spans.
    let _guard = init_tracing("odolink");

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let mut cfg = match config::load_or_init() {
        Ok(cfg) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };
    if let Some(path) = std::env::args().nth(1) {
        cfg.link_path = path;
    }

    let geometry = match cfg.odometry() {
        Ok(geometry) => Arc::new(geometry),
        Err(e) => {
            println!("{}: {}", "Invalid wheel geometry".red(), e);
            std::process::exit(2);
        }
    };

    // ── Link ──────────────────────────────────────────────────────────────
    print!("  Opening link {} … ", cfg.link_path.yellow());
    let link = match open_link(&cfg.link_path, cfg.baud_rate) {
        Ok(link) => {
            println!("{}", "OK".green());
            link
        }
        Err(e) => {
            println!("{}", "FAILED".red());
            println!("  {}", e.to_string().dimmed());
            std::process::exit(1);
        }
    };
    let sink: Arc<dyn CommandSink> = Arc::new(link.sink);

    // ── Pipeline + feed ───────────────────────────────────────────────────
    let store = Arc::new(SnapshotStore::new());
    let pipeline = TelemetryPipeline::new(geometry, Arc::clone(&store));
    let feed = match FeedWorker::spawn(link.source, pipeline) {
        Ok(feed) => feed,
        Err(e) => {
            println!("{}: {}", "Feed error".red(), e);
            std::process::exit(1);
        }
    };

    // ── Shared shutdown flag + Ctrl-C handler ─────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = Arc::clone(&shutdown);
    let sink_ctrlc = Arc::clone(&sink);
    let writable = link.writable;

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – initiating graceful shutdown …".yellow().bold());
        if writable {
            let stop = OutboundCommand::Speed { left: 0.0, right: 0.0 };
            match sink_ctrlc.send(&stop) {
                Ok(()) => println!("{}", "  ✓ Zero-speed command sent.".green()),
                Err(e) => println!("  {} {}", "✗ Zero-speed command failed:".red(), e),
            }
        }
        println!("{}", "  Press Enter to leave the shell.".dimmed());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    if cfg.link_path == STDIN_PATH {
        run_headless(&feed, &store, &shutdown);
        // A read blocked on stdin is left to the process exit.
        feed.request_stop();
        return;
    }

    // ── Monitor + interactive REPL ────────────────────────────────────────
    let monitor = match cfg
        .pose_trace()
        .and_then(|trace| Monitor::spawn(Arc::clone(&store), cfg.poll_interval(), trace))
    {
        Ok(monitor) => monitor,
        Err(e) => {
            println!("{}: {}", "Monitor error".red(), e);
            std::process::exit(1);
        }
    };

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    let mut session = repl::Session {
        config: cfg,
        store,
        monitor,
        feed,
        sink,
        writable,
        pulse: None,
    };
    repl::run(&mut session, shutdown);

    // ── Teardown ──────────────────────────────────────────────────────────
    if let Some(mut pulse) = session.pulse.take() {
        pulse.stop();
    }
    session.feed.request_stop();
    // Serial reads time out, so the feed notices the stop request.
    if let Some(exit) = session.feed.join() {
        info!(exit = ?exit, "feed joined");
    }
    session.monitor.shutdown();
    info!(
        accepted = session.feed.stats().accepted(),
        rejected = session.feed.stats().rejected(),
        "odolink exiting"
    );
}

/// Consume the stdin feed to completion (or Ctrl-C) and print a summary.
fn run_headless(feed: &FeedWorker, store: &SnapshotStore, shutdown: &AtomicBool) {
    println!("  Reading frames from stdin; the shell is disabled in this mode.");
    while !feed.is_finished() && !shutdown.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
    }

    let snapshot = store.read();
    println!();
    repl::print_rows(Panel::Estimated.name(), &render_panel(snapshot.as_deref(), Panel::Estimated));
    println!(
        "  {} frames accepted, {} rejected",
        feed.stats().accepted().to_string().bold(),
        feed.stats().rejected().to_string().bold()
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"            __      ___      __  "#.bold().cyan());
    println!("{}", r#"  ___  ____/ /___  / (_)__  / /__"#.bold().cyan());
    println!("{}", r#" / _ \/ __  / __ \/ / / _ \/  '_/"#.bold().cyan());
    println!("{}", r#" \___/\_,_/\____/_/_/_//_/_/\_\  "#.bold().cyan());
    println!();
    println!("  {} {}",
        "odolink".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Robot telemetry monitor and dead-reckoning odometry");
    println!();
}
