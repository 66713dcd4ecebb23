//! Every delivery of an OS signal reaches the trigger source.
#![cfg(unix)]

use lifeline::lifecycle::{OsSignals, ShutdownTrigger, SignalKind, SignalSource};
use std::process::Command;
use std::time::Duration;

fn raise(signal: &str) {
    let status = Command::new("kill")
        .arg(format!("-{signal}"))
        .arg(std::process::id().to_string())
        .status()
        .unwrap();
    assert!(status.success());
}

async fn next(signals: &mut OsSignals) -> Option<ShutdownTrigger> {
    tokio::time::timeout(Duration::from_secs(5), signals.recv())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_same_signal_is_delivered_twice() {
    let mut signals = OsSignals::install().unwrap();

    raise("INT");
    assert_eq!(next(&mut signals).await, Some(ShutdownTrigger::Signal(SignalKind::Interrupt)));

    raise("INT");
    assert_eq!(next(&mut signals).await, Some(ShutdownTrigger::Signal(SignalKind::Interrupt)));

    raise("TERM");
    assert_eq!(next(&mut signals).await, Some(ShutdownTrigger::Signal(SignalKind::Terminate)));
}
