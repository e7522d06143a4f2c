// padseq - Plays a drum pattern on the wall clock, optionally synced over MIDI clock
//
// Usage: padseq [session.ron|session.json] [--loops N] [--list-ports]
// Log level comes from PADSEQ_LOG (error, warn, info, debug, trace).

use log::{LevelFilter, Metadata, Record, error, info, warn};
use padseq::clock::{Clock, WallClock};
use padseq::messaging::create_clock_channel;
use padseq::midi::{MidiDeviceManager, MidirClockInput, MidirClockOutput};
use padseq::sequencer::{PadHit, Pattern, Scheduler, TransportEngine, TriggerSink, step_trigger};
use padseq::sync::{ClockRole, ClockSync, SyncMode, TempoTracker};
use padseq::{SessionConfig, TransportConfig};
use ringbuf::traits::Consumer;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

// Inbound MIDI clock burst capacity: 24 pulses per beat at 300 BPM is
// 120 messages/second, so 256 covers two seconds of a stalled control loop
const CLOCK_RINGBUFFER_CAPACITY: usize = 256;
const DEFAULT_LOOPS: u32 = 2;
// How long a clock slave waits for the master before giving up
const SLAVE_TIMEOUT: Duration = Duration::from_secs(60);
const IDLE_SLEEP: Duration = Duration::from_millis(1);

const PAD_NAMES: [&str; 3] = ["kick", "snare", "hat"];

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging() {
    let level = std::env::var("PADSEQ_LOG")
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

struct Args {
    config_path: Option<String>,
    loops: u32,
    list_ports: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config_path: None,
        loops: DEFAULT_LOOPS,
        list_ports: false,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--list-ports" => args.list_ports = true,
            "--loops" => {
                let value = iter.next().ok_or("--loops needs a value")?;
                args.loops = value
                    .parse()
                    .map_err(|_| format!("invalid loop count: {}", value))?;
            }
            other if other.starts_with("--") => return Err(format!("unknown option: {}", other)),
            path => args.config_path = Some(path.to_string()),
        }
    }
    Ok(args)
}

/// Kick on beats, snare on 2 and 4, hats on every off-beat
fn four_on_the_floor(config: &TransportConfig) -> Pattern {
    let grid = config.grid_spec;
    let mut pattern = Pattern::new(1, "Four on the floor".to_string(), grid, PAD_NAMES.len());
    let steps_per_beat = (grid.steps_per_bar() / 4).max(1) as usize;

    for bar in 0..grid.bars as usize {
        for step in 0..grid.steps_per_bar() as usize {
            if step % steps_per_beat == 0 {
                let beat = step / steps_per_beat;
                pattern.set(bar, step, 0, 1.0);
                if beat % 2 == 1 {
                    pattern.set(bar, step, 1, 0.9);
                }
            } else if step % steps_per_beat == steps_per_beat / 2 {
                pattern.set(bar, step, 2, 0.6);
            }
        }
    }
    pattern
}

/// Prints each trigger with its lead time over the wall clock
struct PrintSink {
    clock: Rc<dyn Clock>,
}

impl TriggerSink for PrintSink {
    fn trigger(&mut self, hit: PadHit, audio_time: f64) {
        let lead_ms = (audio_time - self.clock.audio_time()) * 1000.0;
        println!(
            "  {:>8.3}s  {:<5} vel {:.2}  (+{:.1} ms ahead)",
            audio_time,
            PAD_NAMES.get(hit.pad).copied().unwrap_or("?"),
            hit.velocity,
            lead_ms
        );
    }
}

fn list_ports() {
    let manager = MidiDeviceManager::new();
    println!("MIDI outputs:");
    for port in manager.list_output_ports() {
        println!("  {}", port.name);
    }
    println!("MIDI inputs:");
    for port in manager.list_input_ports() {
        println!("  {}", port.name);
    }
}

fn main() {
    init_logging();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(2);
        }
    };

    if args.list_ports {
        list_ports();
        return;
    }

    let config = match &args.config_path {
        Some(path) => match SessionConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => SessionConfig::default(),
    };

    println!("=== padseq ===");
    println!("{}", config.transport);

    let clock: Rc<dyn Clock> = Rc::new(WallClock::new());

    // Transport and its audio hook
    let transport_scheduler = Scheduler::new(Rc::clone(&clock), config.scheduler);
    let pattern = Rc::new(RefCell::new(four_on_the_floor(&config.transport)));
    let sink = Rc::new(RefCell::new(PrintSink {
        clock: Rc::clone(&clock),
    }));
    let mut engine = TransportEngine::new(
        Rc::clone(&clock),
        transport_scheduler,
        config.transport,
        step_trigger(pattern, sink),
    );
    let _steps = engine.subscribe(|state| {
        if state.is_playing {
            println!("step {}", state.current_step);
        }
    });

    // Clock sync runs its own scheduler on the same clock
    let mut sync = ClockSync::new(Rc::clone(&clock), config.sync.scheduler, config.transport.bpm);
    let sync_scheduler = sync.scheduler();
    sync.set_mode(config.sync.mode);
    sync.set_role(config.sync.role);

    let slave = config.sync.mode == SyncMode::MidiClock && config.sync.role == ClockRole::Slave;
    let mut _input = None;
    let mut inbound = None;

    if config.sync.mode == SyncMode::MidiClock {
        match config.sync.role {
            ClockRole::Master => match MidirClockOutput::connect(config.sync.output_port.as_deref()) {
                Ok(output) => sync.set_output(Some(Box::new(output))),
                Err(e) => warn!("MIDI clock output unavailable, not sending clock: {}", e),
            },
            ClockRole::Slave => {
                let (producer, consumer) = create_clock_channel(CLOCK_RINGBUFFER_CAPACITY);
                match MidirClockInput::connect(config.sync.input_port.as_deref(), producer) {
                    Ok(input) => {
                        _input = Some(input);
                        inbound = Some(consumer);
                    }
                    Err(e) => {
                        error!("MIDI clock input unavailable: {}", e);
                        std::process::exit(1);
                    }
                }
            }
        }
    }

    let loop_seconds =
        config.transport.step_duration_sec() * config.transport.total_steps().max(1) as f64;
    let play_for = loop_seconds * args.loops as f64;

    if slave {
        info!("Waiting for MIDI clock start...");
    } else {
        info!("Playing {} loop(s), {:.2}s", args.loops, play_for);
        engine.start();
        sync.start_transport();
    }

    let started = Instant::now();
    let mut tracker = TempoTracker::new();
    let mut transport_config = config.transport;
    let mut was_playing = engine.is_playing();

    loop {
        let now = Instant::now();

        if let Some(consumer) = inbound.as_mut() {
            while let Some(timed) = consumer.try_pop() {
                if let Some(bpm) = tracker.on_message(&timed) {
                    // Follow the master's tempo once it drifts noticeably
                    if (bpm - transport_config.bpm).abs() > 0.5 {
                        transport_config.bpm = bpm;
                        engine.set_config(transport_config);
                        sync.set_bpm(bpm);
                    }
                }
                sync.handle_message(timed.message);
            }

            let playing = sync.state().is_playing;
            if playing && !engine.is_playing() {
                engine.start();
            } else if !playing && engine.is_playing() {
                engine.stop();
            }
        }

        engine.poll(now);
        sync_scheduler.poll(now);

        if slave {
            if was_playing && !engine.is_playing() {
                info!("Master stopped");
                break;
            }
            was_playing = engine.is_playing();
            if !was_playing && started.elapsed() > SLAVE_TIMEOUT {
                warn!("No MIDI clock start received, giving up");
                break;
            }
        } else if clock.audio_time() >= play_for {
            break;
        }

        std::thread::sleep(IDLE_SLEEP);
    }

    sync.stop_transport();
    engine.stop();
    println!("=== stopped ===");
}
