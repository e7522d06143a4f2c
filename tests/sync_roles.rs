// Integration test: Clock-role sync beside a running transport
//
// Master role sends MIDI clock in step with the transport grid; slave role
// follows an inbound pulse stream delivered through the ring buffer.

use padseq::clock::ManualClock;
use padseq::error::MidiError;
use padseq::messaging::{TimedClockMessage, create_clock_channel};
use padseq::midi::{ClockMessage, ClockOutput, seconds_per_clock_tick};
use padseq::sequencer::{GridSpec, Scheduler, SchedulerConfig, TransportConfig, TransportEngine};
use padseq::sync::{ClockAuthority, ClockRole, ClockSync, SyncMode, TempoTracker};
use ringbuf::traits::{Consumer, Producer};
use std::cell::RefCell;
use std::rc::Rc;

type Sent = Rc<RefCell<Vec<(ClockMessage, f64)>>>;

struct RecordingOutput(Sent);

impl ClockOutput for RecordingOutput {
    fn send(&mut self, message: ClockMessage, at: f64) -> Result<(), MidiError> {
        self.0.borrow_mut().push((message, at));
        Ok(())
    }
}

struct FailingOutput;

impl ClockOutput for FailingOutput {
    fn send(&mut self, _message: ClockMessage, _at: f64) -> Result<(), MidiError> {
        Err(MidiError::Send("port closed".to_string()))
    }
}

fn pulse_times(sent: &Sent) -> Vec<f64> {
    sent.borrow()
        .iter()
        .filter(|(m, _)| *m == ClockMessage::Clock)
        .map(|(_, at)| *at)
        .collect()
}

#[test]
fn test_master_clock_lines_up_with_transport_beats() {
    let clock = Rc::new(ManualClock::new());
    let config = TransportConfig::new(120.0, GridSpec::new(1, 16));

    let steps = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&steps);
    let mut engine = TransportEngine::new(
        clock.clone(),
        Scheduler::new(clock.clone(), SchedulerConfig::default()),
        config,
        move |step, at| s.borrow_mut().push((step, at)),
    );

    let mut sync = ClockSync::new(clock.clone(), SchedulerConfig::default(), config.bpm);
    let sync_scheduler = sync.scheduler();
    let sent: Sent = Rc::new(RefCell::new(Vec::new()));
    sync.set_output(Some(Box::new(RecordingOutput(Rc::clone(&sent)))));
    sync.set_mode(SyncMode::MidiClock);

    engine.start();
    sync.start_transport();
    for i in 1..=200 {
        clock.set(i as f64 * 0.005);
        engine.tick();
        engine.scheduler().flush();
        sync_scheduler.flush();
    }

    assert_eq!(sent.borrow()[0].0, ClockMessage::Start);

    // Horizon at t=1.0 reaches 1.1s: pulses 0..=52
    let pulses = pulse_times(&sent);
    assert_eq!(pulses.len(), 53);

    // Every 24th pulse coincides with a quarter note, i.e. every 4th 16th step
    let steps = steps.borrow();
    for beat in 0..2 {
        let pulse = pulses[beat * 24];
        let (step, at) = steps[beat * 4];
        assert_eq!(step, beat * 4);
        assert!((pulse - at).abs() < 1e-9, "beat {}: {} vs {}", beat, pulse, at);
    }

    sync.stop_transport();
    engine.stop();
    assert_eq!(sent.borrow().last().map(|(m, _)| *m), Some(ClockMessage::Stop));
    assert_eq!(sync_scheduler.pending_len(), 0);
}

#[test]
fn test_sync_edits_leave_transport_boundaries_alone() {
    let clock = Rc::new(ManualClock::new());
    let config = TransportConfig::new(120.0, GridSpec::new(1, 4));

    let steps = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&steps);
    let mut engine = TransportEngine::new(
        clock.clone(),
        Scheduler::new(clock.clone(), SchedulerConfig::default()),
        config,
        move |step, at| s.borrow_mut().push((step, at)),
    );
    let mut sync = ClockSync::new(clock.clone(), SchedulerConfig::default(), config.bpm);
    let sent: Sent = Rc::new(RefCell::new(Vec::new()));
    sync.set_output(Some(Box::new(RecordingOutput(Rc::clone(&sent)))));
    sync.set_mode(SyncMode::MidiClock);

    engine.start();
    sync.start_transport();
    assert_eq!(engine.scheduler().pending_times(), vec![0.5]);

    // Every kind of sync restart, while a transport boundary is pending
    clock.set(0.2);
    sync.set_bpm(140.0);
    sync.set_role(ClockRole::Slave);
    sync.set_role(ClockRole::Master);
    sync.set_mode(SyncMode::Internal);
    sync.set_mode(SyncMode::MidiClock);
    sync.stop_transport();
    assert_eq!(engine.scheduler().pending_times(), vec![0.5]);
    assert!(engine.scheduler().is_running());

    for i in 1..=80 {
        clock.set(0.2 + i as f64 * 0.025);
        engine.tick();
        engine.scheduler().flush();
    }
    let fired: Vec<usize> = steps.borrow().iter().map(|(step, _)| *step).collect();
    assert_eq!(fired, vec![0, 1, 2, 3, 0]);
}

#[test]
fn test_only_one_pulse_loop_after_many_edits() {
    let clock = Rc::new(ManualClock::new());
    let mut sync = ClockSync::new(clock.clone(), SchedulerConfig::default(), 120.0);
    let scheduler = sync.scheduler();
    let sent: Sent = Rc::new(RefCell::new(Vec::new()));
    sync.set_output(Some(Box::new(RecordingOutput(Rc::clone(&sent)))));
    sync.set_mode(SyncMode::MidiClock);
    sync.start_transport();

    for bpm in [90.0, 150.0, 60.0, 174.0, 150.0] {
        clock.advance(0.013);
        sync.set_bpm(bpm);
        scheduler.flush();
        assert_eq!(scheduler.pending_len(), 1);
    }

    // The surviving loop runs at the last tempo only
    let before = pulse_times(&sent).len();
    clock.advance(0.5);
    scheduler.flush();
    let pulses = pulse_times(&sent);
    let tick = seconds_per_clock_tick(150.0);
    for pair in pulses[before - 1..].windows(2) {
        assert!((pair[1] - pair[0] - tick).abs() < 1e-9);
    }

    // No pulse was ever sent twice or out of order across the edits
    assert!(pulses.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn test_role_switch_to_slave_stops_sending() {
    let clock = Rc::new(ManualClock::new());
    let mut sync = ClockSync::new(clock.clone(), SchedulerConfig::default(), 120.0);
    let scheduler = sync.scheduler();
    let sent: Sent = Rc::new(RefCell::new(Vec::new()));
    sync.set_output(Some(Box::new(RecordingOutput(Rc::clone(&sent)))));
    sync.set_mode(SyncMode::MidiClock);
    sync.start_transport();
    scheduler.flush();

    sync.set_role(ClockRole::Slave);
    let count = sent.borrow().len();
    clock.advance(1.0);
    scheduler.flush();
    assert_eq!(sent.borrow().len(), count);
    assert_eq!(sync.state().clock_authority, ClockAuthority::External);
}

#[test]
fn test_send_failures_do_not_stop_the_loop() {
    let clock = Rc::new(ManualClock::new());
    let mut sync = ClockSync::new(clock.clone(), SchedulerConfig::default(), 120.0);
    let scheduler = sync.scheduler();
    sync.set_output(Some(Box::new(FailingOutput)));
    sync.set_mode(SyncMode::MidiClock);
    sync.start_transport();

    scheduler.flush();
    assert_eq!(sync.state().phase, 5);
    assert_eq!(scheduler.pending_len(), 1);
}

#[test]
fn test_slave_follows_pulses_from_input_thread() {
    let clock = Rc::new(ManualClock::new());
    let mut sync = ClockSync::new(clock, SchedulerConfig::default(), 120.0);
    let scheduler = sync.scheduler();
    sync.set_mode(SyncMode::MidiClock);
    sync.set_role(ClockRole::Slave);

    let (mut producer, mut consumer) = create_clock_channel(256);
    let handle = std::thread::spawn(move || {
        let tick_micros = (seconds_per_clock_tick(100.0) * 1_000_000.0) as u64;
        let _ = producer.try_push(TimedClockMessage::new(ClockMessage::Start, 0));
        for i in 1..=49 {
            let _ = producer.try_push(TimedClockMessage::new(ClockMessage::Clock, i * tick_micros));
        }
    });
    handle.join().unwrap();

    let mut tracker = TempoTracker::new();
    let mut bpm = None;
    while let Some(timed) = consumer.try_pop() {
        bpm = tracker.on_message(&timed).or(bpm);
        sync.handle_message(timed.message);
    }

    let state = sync.state();
    assert!(state.is_playing);
    assert_eq!(state.phase, 1);
    assert!((bpm.unwrap() - 100.0).abs() < 0.01);

    // Slaves never drive pulses of their own
    assert_eq!(scheduler.pending_len(), 0);
}
