use adaflow_core::gcode::GcodeCommand;
use adaflow_core::tap::CommandTap;
use rstest::rstest;
use std::sync::{Arc, Mutex};

#[rstest]
fn subscribers_see_commands_in_program_order() {
    let tap = CommandTap::new();
    let seen: Arc<Mutex<Vec<GcodeCommand>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    tap.subscribe(move |cmd| sink.lock().unwrap().push(*cmd));

    tap.publish_line("M83");
    tap.publish_line("G1 X10 E0.5 F3000");
    tap.publish_line("G92 E0");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0], GcodeCommand::RelativeExtrusion);
    assert!(matches!(seen[1], GcodeCommand::Move(_)));
    assert_eq!(seen[2], GcodeCommand::ResetExtruder(Some(0.0)));
}

#[rstest]
fn panicking_subscriber_is_isolated() {
    // Keep the default panic hook from spamming the test output.
    std::panic::set_hook(Box::new(|_| {}));
    let tap = CommandTap::new();
    tap.subscribe(|_| panic!("subscriber bug"));
    let count = Arc::new(Mutex::new(0_u32));
    let sink = count.clone();
    tap.subscribe(move |_| *sink.lock().unwrap() += 1);

    // Dispatch must survive and still reach the healthy subscriber.
    tap.publish_line("G1 X1 E0.1 F1200");
    tap.publish_line("G1 X2 E0.1 F1200");
    let _ = std::panic::take_hook();

    assert_eq!(*count.lock().unwrap(), 2);
    assert_eq!(tap.subscriber_count(), 2);
}

#[rstest]
fn broadcast_reaches_all_subscribers() {
    let tap = CommandTap::new();
    let a = Arc::new(Mutex::new(0_u32));
    let b = Arc::new(Mutex::new(0_u32));
    for counter in [a.clone(), b.clone()] {
        tap.subscribe(move |_| *counter.lock().unwrap() += 1);
    }
    for _ in 0..5 {
        tap.publish_line("G1 X1 E0.1 F1200");
    }
    assert_eq!(*a.lock().unwrap(), 5);
    assert_eq!(*b.lock().unwrap(), 5);
}
