use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use jetson_relay::{CycleConfig, Level, OutputPin, Polarity, Relay, RelayState, SysfsPin};

// Needs a Jetson with board pin 7 free and gpio group membership.
// Run on the device with `cargo test -- --ignored`.
#[test]
#[ignore]
fn test_toggle_relay_pin_7() {
    let mut pin = SysfsPin::configure(7, Some(Level::Low)).unwrap();

    for _ in 0..2 {
        std::thread::sleep(Duration::from_secs(1));
        pin.write(Level::High).unwrap();
        std::thread::sleep(Duration::from_secs(1));
        pin.write(Level::Low).unwrap();
    }

    pin.release().unwrap();
}

#[test]
#[ignore]
fn test_cycle_relay_pin_7() {
    let stop = Arc::new(AtomicBool::new(false));
    let config = CycleConfig {
        on_time: Duration::from_millis(500),
        off_time: Duration::from_millis(500),
        cycles: 2,
        initial_state: RelayState::Off,
    };

    let pin = SysfsPin::configure(7, Some(config.initial_level(Polarity::ActiveHigh))).unwrap();
    let mut relay = Relay::new(pin, 7, Polarity::ActiveHigh, stop);
    relay.cycle(&config).unwrap();
}
