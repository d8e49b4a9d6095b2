//! Relay controller.
//!
//! Maps the logical relay state to a physical pin level according to the
//! configured polarity and runs either a one-shot set or a timed ON/OFF
//! cycling loop. Interruption (Ctrl-C) is a controlled shutdown, never an
//! error: the controller finishes by driving the relay OFF and releasing
//! the pin on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::error::Result;
use crate::gpio::{Level, OutputPin};

/// How often a sleeping controller checks the stop flag.
const STOP_POLL: Duration = Duration::from_millis(50);

/// Logical state of the relay, independent of wiring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayState {
    On,
    Off,
}

impl RelayState {
    pub fn as_str(self) -> &'static str {
        match self {
            RelayState::On => "ON",
            RelayState::Off => "OFF",
        }
    }
}

/// Whether the relay's control input is energized by HIGH or LOW.
///
/// ```
/// use jetson_relay::{Level, Polarity, RelayState};
///
/// assert_eq!(Polarity::ActiveHigh.level(RelayState::On), Level::High);
/// assert_eq!(Polarity::ActiveLow.level(RelayState::On), Level::Low);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Polarity {
    ActiveHigh,
    ActiveLow,
}

impl Polarity {
    /// The physical level that puts the relay into `state`.
    pub fn level(self, state: RelayState) -> Level {
        match (self, state) {
            (Polarity::ActiveHigh, RelayState::On) => Level::High,
            (Polarity::ActiveHigh, RelayState::Off) => Level::Low,
            (Polarity::ActiveLow, RelayState::On) => Level::Low,
            (Polarity::ActiveLow, RelayState::Off) => Level::High,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Polarity::ActiveHigh => "active HIGH",
            Polarity::ActiveLow => "active LOW",
        }
    }
}

/// Parameters of the cycling loop. Built from CLI input at process start.
#[derive(Clone, Copy, Debug)]
pub struct CycleConfig {
    /// Time the relay stays ON in each cycle.
    pub on_time: Duration,
    /// Time the relay stays OFF in each cycle.
    pub off_time: Duration,
    /// Number of ON/OFF pairs to run; 0 runs until interrupted.
    pub cycles: u32,
    /// State the pin is driven to while it is being configured.
    pub initial_state: RelayState,
}

impl CycleConfig {
    /// Physical level to apply during pin setup.
    pub fn initial_level(&self, polarity: Polarity) -> Level {
        polarity.level(self.initial_state)
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        CycleConfig {
            on_time: Duration::from_secs(2),
            off_time: Duration::from_secs(2),
            cycles: 0,
            initial_state: RelayState::Off,
        }
    }
}

/// Drives one relay through an already-configured output pin.
pub struct Relay<P: OutputPin> {
    pin: P,
    channel: u32,
    polarity: Polarity,
    stop: Arc<AtomicBool>,
    last: Option<RelayState>,
    released: bool,
}

impl<P: OutputPin> Relay<P> {
    /// Wraps a configured pin. `stop` is shared with the signal handler;
    /// once it turns true every wait in this controller returns promptly.
    pub fn new(pin: P, channel: u32, polarity: Polarity, stop: Arc<AtomicBool>) -> Self {
        Relay {
            pin,
            channel,
            polarity,
            stop,
            last: None,
            released: false,
        }
    }

    /// Drives the relay to a logical state.
    pub fn set(&mut self, state: RelayState) -> Result<()> {
        let level = self.polarity.level(state);
        self.pin.write(level)?;
        self.last = Some(state);
        info!(
            "Relay {} (pin {} driven {})",
            state.as_str(),
            self.channel,
            level.as_str()
        );
        Ok(())
    }

    /// One-shot mode: set the state, hold it, release.
    ///
    /// A zero `hold_time` holds until interrupted. Interruption drives the
    /// relay OFF before release; a hold that simply expires releases the pin
    /// without a further write.
    pub fn hold(&mut self, state: RelayState, hold_time: Duration) -> Result<()> {
        match self.hold_inner(state, hold_time) {
            Ok(true) => self.finish(),
            Ok(false) => self.release(),
            Err(e) => {
                let _ = self.release();
                Err(e)
            }
        }
    }

    fn hold_inner(&mut self, state: RelayState, hold_time: Duration) -> Result<bool> {
        self.set(state)?;

        if hold_time.is_zero() {
            info!("holding state until interrupted (press Ctrl-C to exit)");
            self.park();
            info!("stopped by user");
            return Ok(true);
        }

        info!("holding state for {:.1} seconds", hold_time.as_secs_f64());
        let interrupted = !self.pause(hold_time);
        if interrupted {
            info!("stopped by user");
        }
        Ok(interrupted)
    }

    /// Cycling mode: repeat ON/`on_time`/OFF/`off_time`, `cfg.cycles` times
    /// (forever when 0), then drive OFF and release.
    pub fn cycle(&mut self, cfg: &CycleConfig) -> Result<()> {
        let run = self.cycle_inner(cfg);
        let cleanup = self.finish();
        run.and(cleanup)
    }

    fn cycle_inner(&mut self, cfg: &CycleConfig) -> Result<()> {
        let mut completed = 0u32;

        while !self.stopped() && (cfg.cycles == 0 || completed < cfg.cycles) {
            self.set(RelayState::On)?;
            if !self.pause(cfg.on_time) {
                break;
            }

            self.set(RelayState::Off)?;
            if !self.pause(cfg.off_time) {
                break;
            }

            completed += 1;
            if cfg.cycles > 0 {
                info!("completed cycle {} of {}", completed, cfg.cycles);
            }
        }

        if self.stopped() {
            info!("stopped by user");
        }
        Ok(())
    }

    /// Final OFF-then-release. The OFF write is skipped when the relay is
    /// already OFF, so a completed bounded loop releases without a further
    /// write.
    fn finish(&mut self) -> Result<()> {
        let off = if self.last != Some(RelayState::Off) {
            self.set(RelayState::Off)
        } else {
            Ok(())
        };
        let released = self.release();
        off.and(released)
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        debug!("releasing pin {}", self.channel);
        self.pin.release()
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Sleeps for `total`, polling the stop flag. Returns false when the
    /// wait was interrupted before the full duration elapsed.
    fn pause(&self, total: Duration) -> bool {
        let deadline = Instant::now() + total;
        while !self.stopped() {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(STOP_POLL));
        }
        false
    }

    /// Blocks until the stop flag is raised.
    fn park(&self) {
        while !self.stopped() {
            thread::sleep(STOP_POLL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct PinLog {
        writes: Vec<Level>,
        releases: u32,
    }

    /// Records writes instead of touching hardware; optionally raises the
    /// stop flag once a given number of writes have landed, standing in for
    /// a user pressing Ctrl-C mid-run.
    struct FakePin {
        log: Rc<RefCell<PinLog>>,
        stop_after: Option<(Arc<AtomicBool>, usize)>,
    }

    impl FakePin {
        fn new() -> (Self, Rc<RefCell<PinLog>>) {
            let log = Rc::new(RefCell::new(PinLog::default()));
            (
                FakePin {
                    log: log.clone(),
                    stop_after: None,
                },
                log,
            )
        }

        fn stopping_after(writes: usize, stop: Arc<AtomicBool>) -> (Self, Rc<RefCell<PinLog>>) {
            let (mut pin, log) = FakePin::new();
            pin.stop_after = Some((stop, writes));
            (pin, log)
        }
    }

    impl OutputPin for FakePin {
        fn write(&mut self, level: Level) -> Result<()> {
            let mut log = self.log.borrow_mut();
            log.writes.push(level);
            if let Some((stop, n)) = &self.stop_after {
                if log.writes.len() >= *n {
                    stop.store(true, Ordering::Relaxed);
                }
            }
            Ok(())
        }

        fn release(&mut self) -> Result<()> {
            self.log.borrow_mut().releases += 1;
            Ok(())
        }
    }

    fn fast_config(cycles: u32) -> CycleConfig {
        CycleConfig {
            on_time: Duration::ZERO,
            off_time: Duration::ZERO,
            cycles,
            initial_state: RelayState::Off,
        }
    }

    #[test]
    fn polarity_mapping_matches_wiring() {
        assert_eq!(Polarity::ActiveHigh.level(RelayState::On), Level::High);
        assert_eq!(Polarity::ActiveHigh.level(RelayState::Off), Level::Low);
        assert_eq!(Polarity::ActiveLow.level(RelayState::On), Level::Low);
        assert_eq!(Polarity::ActiveLow.level(RelayState::Off), Level::High);
    }

    #[test]
    fn bounded_cycling_writes_exact_pairs_then_releases() {
        let stop = Arc::new(AtomicBool::new(false));
        let (pin, log) = FakePin::new();
        let mut relay = Relay::new(pin, 7, Polarity::ActiveHigh, stop);

        relay.cycle(&fast_config(3)).unwrap();

        let log = log.borrow();
        // three ON/OFF pairs; the final OFF is the third pair's own write
        assert_eq!(
            log.writes,
            vec![
                Level::High,
                Level::Low,
                Level::High,
                Level::Low,
                Level::High,
                Level::Low,
            ]
        );
        assert_eq!(log.releases, 1);
    }

    #[test]
    fn active_low_cycling_inverts_levels() {
        let stop = Arc::new(AtomicBool::new(false));
        let (pin, log) = FakePin::new();
        let mut relay = Relay::new(pin, 7, Polarity::ActiveLow, stop);

        relay.cycle(&fast_config(2)).unwrap();

        let log = log.borrow();
        assert_eq!(
            log.writes,
            vec![Level::Low, Level::High, Level::Low, Level::High]
        );
        assert_eq!(log.releases, 1);
    }

    #[test]
    fn interrupting_cycling_forces_off_and_releases_once() {
        let stop = Arc::new(AtomicBool::new(false));
        let (pin, log) = FakePin::stopping_after(3, stop.clone());
        let mut relay = Relay::new(pin, 7, Polarity::ActiveHigh, stop);

        relay.cycle(&fast_config(0)).unwrap();

        let log = log.borrow();
        // interrupted right after the second ON write; cleanup adds one OFF
        assert_eq!(log.writes.len(), 4);
        assert_eq!(log.writes.last(), Some(&Level::Low));
        assert_eq!(log.releases, 1);
    }

    #[test]
    fn unbounded_cycling_runs_until_interrupted() {
        let stop = Arc::new(AtomicBool::new(false));
        let (pin, log) = FakePin::stopping_after(9, stop.clone());
        let mut relay = Relay::new(pin, 7, Polarity::ActiveHigh, stop);

        relay.cycle(&fast_config(0)).unwrap();

        let log = log.borrow();
        let on_writes = log.writes.iter().filter(|l| **l == Level::High).count();
        assert!(on_writes >= 4, "loop ended after {} ON writes", on_writes);
        assert_eq!(log.writes.last(), Some(&Level::Low));
        assert_eq!(log.releases, 1);
    }

    #[test]
    fn expired_hold_releases_without_forcing_off() {
        let stop = Arc::new(AtomicBool::new(false));
        let (pin, log) = FakePin::new();
        let mut relay = Relay::new(pin, 7, Polarity::ActiveHigh, stop);

        relay
            .hold(RelayState::On, Duration::from_millis(1))
            .unwrap();

        let log = log.borrow();
        assert_eq!(log.writes, vec![Level::High]);
        assert_eq!(log.releases, 1);
    }

    #[test]
    fn indefinite_hold_blocks_until_interrupted_then_releases_off() {
        let stop = Arc::new(AtomicBool::new(false));
        let (pin, log) = FakePin::stopping_after(1, stop.clone());
        let mut relay = Relay::new(pin, 7, Polarity::ActiveHigh, stop);

        relay.hold(RelayState::On, Duration::ZERO).unwrap();

        let log = log.borrow();
        assert_eq!(log.writes, vec![Level::High, Level::Low]);
        assert_eq!(log.releases, 1);
    }

    #[test]
    fn interrupted_hold_of_an_off_relay_does_not_rewrite() {
        let stop = Arc::new(AtomicBool::new(false));
        let (pin, log) = FakePin::stopping_after(1, stop.clone());
        let mut relay = Relay::new(pin, 7, Polarity::ActiveHigh, stop);

        relay.hold(RelayState::Off, Duration::ZERO).unwrap();

        let log = log.borrow();
        assert_eq!(log.writes, vec![Level::Low]);
        assert_eq!(log.releases, 1);
    }

    #[test]
    fn initial_level_follows_polarity() {
        let cfg = CycleConfig {
            initial_state: RelayState::On,
            ..CycleConfig::default()
        };
        assert_eq!(cfg.initial_level(Polarity::ActiveLow), Level::Low);
        assert_eq!(cfg.initial_level(Polarity::ActiveHigh), Level::High);
    }
}
