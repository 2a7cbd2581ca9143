//! REPL – Read-Eval-Print Loop for the odolink interactive shell.
//!
//! Supported slash-commands:
//!   /help                 – show this list
//!   /status               – link, feed and snapshot summary
//!   /show <panel>         – print a panel (general, battery, odometry,
//!                           encoder, estimated)
//!   /pose                 – controller-reported and estimated poses
//!   /trace [n]            – last `n` pose trace points (default 10)
//!   /speed <l> <r>        – send `speed:<l>:<r>@`
//!   /twist <lin> <ang>    – send `twist:<lin>:<ang>@`
//!   /ping                 – send `test@`
//!   /send <token>         – send a raw token (`@` appended if missing)
//!   /pulse start|stop     – toggle the interval sender
//!   /json                 – dump the current snapshot as JSON
//!   /quit | /exit         – gracefully exit the CLI

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use odolink_kernel::{Snapshot, SnapshotStore};
use odolink_middleware::{CommandSink, OutboundCommand};
use odolink_perception::EncoderPair;
use odolink_runtime::monitor::{PLACEHOLDER, REPORTED_POSE_KEYS, TracePoint};
use odolink_runtime::{FeedWorker, Monitor, Panel, PulseSender};
use odolink_types::Pose;
use tracing::{info, warn};

use crate::config::Config;

const DEFAULT_TRACE_ROWS: usize = 10;

/// A parsed shell line.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Help,
    Status,
    Show(Panel),
    Pose,
    Trace(usize),
    Send(OutboundCommand),
    PulseStart,
    PulseStop,
    Json,
    Quit,
}

impl ReplCommand {
    /// Parse one non-empty input line.
    pub fn parse(line: &str) -> Result<ReplCommand, String> {
        let mut parts = line.split_whitespace();
        let head = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match (head, args.as_slice()) {
            ("/help", []) => Ok(ReplCommand::Help),
            ("/status" | "/stats", []) => Ok(ReplCommand::Status),
            ("/show", [name]) => Panel::from_name(name)
                .map(ReplCommand::Show)
                .ok_or_else(|| format!("unknown panel '{name}'")),
            ("/show", _) => Err("usage: /show <general|battery|odometry|encoder|estimated>".into()),
            ("/pose", []) => Ok(ReplCommand::Pose),
            ("/trace", []) => Ok(ReplCommand::Trace(DEFAULT_TRACE_ROWS)),
            ("/trace", [n]) => n
                .parse()
                .map(ReplCommand::Trace)
                .map_err(|_| format!("'{n}' is not a row count")),
            ("/speed", [l, r]) => {
                let (left, right) = (parse_number(l)?, parse_number(r)?);
                Ok(ReplCommand::Send(OutboundCommand::Speed { left, right }))
            }
            ("/speed", _) => Err("usage: /speed <left> <right>".into()),
            ("/twist", [lin, ang]) => {
                let (linear, angular) = (parse_number(lin)?, parse_number(ang)?);
                Ok(ReplCommand::Send(OutboundCommand::Twist { linear, angular }))
            }
            ("/twist", _) => Err("usage: /twist <linear> <angular>".into()),
            ("/ping", []) => Ok(ReplCommand::Send(OutboundCommand::Ping)),
            ("/send", [token]) => Ok(ReplCommand::Send(OutboundCommand::Raw(token.to_string()))),
            ("/send", _) => Err("usage: /send <token>".into()),
            ("/pulse", ["start"]) => Ok(ReplCommand::PulseStart),
            ("/pulse", ["stop"]) => Ok(ReplCommand::PulseStop),
            ("/pulse", _) => Err("usage: /pulse start|stop".into()),
            ("/json", []) => Ok(ReplCommand::Json),
            ("/quit" | "/exit", []) => Ok(ReplCommand::Quit),
            (other, _) => Err(format!("unknown command '{other}'")),
        }
    }
}

fn parse_number(raw: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("'{raw}' is not a number"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the shell operates on.
pub struct Session {
    pub config: Config,
    pub store: Arc<SnapshotStore>,
    pub monitor: Monitor,
    pub feed: FeedWorker,
    pub sink: Arc<dyn CommandSink>,
    pub writable: bool,
    pub pulse: Option<PulseSender>,
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(session: &mut Session, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "odolink>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match ReplCommand::parse(input) {
            Ok(ReplCommand::Quit) => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Ok(cmd) => execute(session, cmd),
            Err(msg) => println!(
                "{} {}. Type {} for available commands.",
                "Error:".red(),
                msg.yellow(),
                "/help".bold()
            ),
        }
    }
}

fn execute(session: &mut Session, cmd: ReplCommand) {
    match cmd {
        ReplCommand::Help => cmd_help(),
        ReplCommand::Status => cmd_status(session),
        ReplCommand::Show(panel) => print_rows(panel.name(), &session.monitor.panel(panel)),
        ReplCommand::Pose => cmd_pose(session.store.read().as_deref()),
        ReplCommand::Trace(n) => cmd_trace(session, n),
        ReplCommand::Send(command) => cmd_send(session, &command),
        ReplCommand::PulseStart => cmd_pulse_start(session),
        ReplCommand::PulseStop => cmd_pulse_stop(session),
        ReplCommand::Json => cmd_json(session.store.read().as_deref()),
        ReplCommand::Quit => {}
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "odolink Commands".bold().underline());
    println!("  {}             – link, feed and snapshot summary", "/status".bold().cyan());
    println!("  {}       – general | battery | odometry | encoder | estimated", "/show <panel>".bold().cyan());
    println!("  {}               – both estimated poses", "/pose".bold().cyan());
    println!("  {}          – recent pose trace points", "/trace [n]".bold().cyan());
    println!("  {}      – send a wheel speed command", "/speed <l> <r>".bold().cyan());
    println!("  {}  – send a twist command", "/twist <lin> <ang>".bold().cyan());
    println!("  {}               – send the test token", "/ping".bold().cyan());
    println!("  {}       – send a raw token", "/send <token>".bold().cyan());
    println!("  {}  – toggle the interval sender", "/pulse start|stop".bold().cyan());
    println!("  {}               – dump the snapshot as JSON", "/json".bold().cyan());
    println!("  {}        – exit the CLI", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_status(session: &Session) {
    let stats = session.feed.stats();
    println!("{}", "Status".bold().underline());
    println!(
        "  Link      : {} @ {} baud ({})",
        session.config.link_path.bold(),
        session.config.baud_rate,
        if session.writable { "read/write".green() } else { "read-only".yellow() }
    );
    println!(
        "  Feed      : {} ({} accepted, {} rejected)",
        if session.feed.is_finished() { "stopped".red() } else { "running".green() },
        stats.accepted().to_string().bold(),
        stats.rejected().to_string().bold()
    );
    match session.store.read() {
        Some(snap) => println!(
            "  Snapshot  : #{} at {}",
            snap.sequence().to_string().bold(),
            snap.published_at().to_rfc3339()
        ),
        None => println!("  Snapshot  : {}", "none yet".dimmed()),
    }
    let pulse = match &session.pulse {
        Some(p) if p.is_running() => format!("every {} ms, {} sent", p.interval().as_millis(), p.sent()).green(),
        _ => "off".dimmed(),
    };
    println!("  Pulse     : {pulse}");
}

const POSE_LABELS: [&str; 4] = [
    "controller      (odom2)",
    "controller      (odom3)",
    "short encoders  (odom4)",
    "position actual (odom5)",
];

/// The four poses of `snapshot` in [`POSE_LABELS`] order.
fn snapshot_poses(snapshot: &Snapshot) -> [Option<Pose>; 4] {
    let [keys2, keys3] = REPORTED_POSE_KEYS;
    [
        snapshot.pose_at(keys2),
        snapshot.pose_at(keys3),
        snapshot.pose(EncoderPair::ShortEncoder),
        snapshot.pose(EncoderPair::PositionActual),
    ]
}

fn cmd_pose(snapshot: Option<&Snapshot>) {
    println!("{}", "Poses".bold().underline());
    let poses = snapshot.map_or([None; 4], snapshot_poses);
    for (label, pose) in POSE_LABELS.iter().zip(poses) {
        match pose {
            Some(pose) => println!("  {label} : {}", format_pose(&pose)),
            None => println!("  {label} : {}", PLACEHOLDER.dimmed()),
        }
    }
}

fn cmd_trace(session: &Session, rows: usize) {
    let trace = session.monitor.trace();
    println!(
        "{} ({} of {} points, last {} s)",
        "Pose trace".bold().underline(),
        trace.len(),
        trace.capacity(),
        trace.window().as_secs()
    );
    let skip = trace.len().saturating_sub(rows);
    for point in trace.points().skip(skip) {
        println!("{}", format_trace_point(point));
    }
}

fn cmd_send(session: &Session, command: &OutboundCommand) {
    if !session.writable {
        println!("{}", "Link is read-only; command discarded.".yellow());
        return;
    }
    match session.sink.send(command) {
        Ok(()) => println!("{} {}", "✓ Sent".green(), command.encode().bold()),
        Err(e) => {
            warn!(error = %e, "command send failed");
            println!("{}: {}", "Send failed".red(), e);
        }
    }
}

fn cmd_pulse_start(session: &mut Session) {
    if session.pulse.as_ref().is_some_and(PulseSender::is_running) {
        println!("{}", "Pulse already running.".yellow());
        return;
    }
    match PulseSender::start(
        Arc::clone(&session.sink),
        OutboundCommand::pulse(),
        session.config.pulse_interval(),
    ) {
        Ok(pulse) => {
            info!(interval_ms = session.config.pulse_interval_ms, "pulse enabled");
            println!(
                "{} every {} ms",
                "✓ Pulse started".green(),
                session.config.pulse_interval_ms
            );
            session.pulse = Some(pulse);
        }
        Err(e) => println!("{}: {}", "Pulse failed".red(), e),
    }
}

fn cmd_pulse_stop(session: &mut Session) {
    match session.pulse.take() {
        Some(mut pulse) => {
            pulse.stop();
            println!("{} ({} sent)", "✓ Pulse stopped".green(), pulse.sent());
        }
        None => println!("{}", "Pulse is not running.".yellow()),
    }
}

fn cmd_json(snapshot: Option<&Snapshot>) {
    match snapshot {
        Some(snap) => match snap.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => println!("{}: {}", "Serialization failed".red(), e),
        },
        None => println!("{}", "No snapshot yet.".dimmed()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn print_rows(title: &str, rows: &[(&'static str, String)]) {
    let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    println!("{}", title.bold().underline());
    for (key, value) in rows {
        println!("  {} : {}", format!("{key:<width$}").cyan(), value);
    }
}

fn format_pose(pose: &Pose) -> String {
    format!("x={:+.4} m  y={:+.4} m  θ={:+.4} rad", pose.x, pose.y, pose.theta)
}

fn format_trace_point(point: &TracePoint) -> String {
    let poses = [point.reported2, point.reported3, point.short, point.position];
    let mut out = format!("  #{} at {}", point.sequence, point.published_at.format("%H:%M:%S%.3f"));
    for (label, pose) in POSE_LABELS.iter().zip(poses) {
        out.push_str(&format!("\n    {label} : {}", format_pose(&pose)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_panel_commands() {
        assert_eq!(ReplCommand::parse("/show battery"), Ok(ReplCommand::Show(Panel::Battery)));
        assert_eq!(ReplCommand::parse("/show ESTIMATED"), Ok(ReplCommand::Show(Panel::Estimated)));
        assert!(ReplCommand::parse("/show map").is_err());
        assert!(ReplCommand::parse("/show").is_err());
    }

    #[test]
    fn parses_motion_commands() {
        assert_eq!(
            ReplCommand::parse("/speed 10 -10"),
            Ok(ReplCommand::Send(OutboundCommand::Speed { left: 10.0, right: -10.0 }))
        );
        assert_eq!(
            ReplCommand::parse("/twist 0.2  0.5"),
            Ok(ReplCommand::Send(OutboundCommand::Twist { linear: 0.2, angular: 0.5 }))
        );
        assert!(ReplCommand::parse("/speed fast 1").is_err());
        assert!(ReplCommand::parse("/speed NaN 1").is_err());
        assert!(ReplCommand::parse("/twist 1").is_err());
    }

    #[test]
    fn parses_simple_commands() {
        assert_eq!(ReplCommand::parse("/ping"), Ok(ReplCommand::Send(OutboundCommand::Ping)));
        assert_eq!(
            ReplCommand::parse("/send reset"),
            Ok(ReplCommand::Send(OutboundCommand::Raw("reset".into())))
        );
        assert_eq!(ReplCommand::parse("/pulse start"), Ok(ReplCommand::PulseStart));
        assert_eq!(ReplCommand::parse("/pulse stop"), Ok(ReplCommand::PulseStop));
        assert_eq!(ReplCommand::parse("/stats"), Ok(ReplCommand::Status));
        assert_eq!(ReplCommand::parse("/exit"), Ok(ReplCommand::Quit));
        assert_eq!(ReplCommand::parse("/trace"), Ok(ReplCommand::Trace(DEFAULT_TRACE_ROWS)));
        assert_eq!(ReplCommand::parse("/trace 3"), Ok(ReplCommand::Trace(3)));
        assert!(ReplCommand::parse("/trace -1").is_err());
        assert!(ReplCommand::parse("/pulse").is_err());
        assert!(ReplCommand::parse("/start").is_err());
    }

    #[test]
    fn pose_formatting_is_fixed_precision() {
        let pose = Pose { x: 1.0, y: -0.5, theta: 2.000147 };
        assert_eq!(format_pose(&pose), "x=+1.0000 m  y=-0.5000 m  θ=+2.0001 rad");
    }

    #[test]
    fn poses_include_controller_odometry() {
        use odolink_kernel::TelemetryPipeline;
        use odolink_middleware::FrameBuilder;
        use odolink_perception::WheelOdometryConfig;

        let store = Arc::new(SnapshotStore::new());
        let mut p = TelemetryPipeline::new(Arc::new(WheelOdometryConfig::default()), Arc::clone(&store));
        let mut builder = FrameBuilder::new();
        builder.set("odom_x2", 4.5).unwrap();
        builder.set("odom_th3", 1.5).unwrap();
        let snap = p.process_line(&builder.build()).unwrap();

        let [odom2, odom3, short, position] = snapshot_poses(&snap);
        assert_eq!(odom2.map(|p| p.x), Some(4.5));
        assert_eq!(odom3.map(|p| p.theta), Some(1.5));
        assert_eq!(short, Some(Pose::default()));
        assert_eq!(position, Some(Pose::default()));

        let mut trace = odolink_runtime::PoseTrace::new(2).unwrap();
        assert!(trace.record(&snap));
        let text = format_trace_point(trace.latest().unwrap());
        assert_eq!(text.lines().count(), 5);
        assert!(text.contains("(odom2) : x=+4.5000 m"));
    }
}
