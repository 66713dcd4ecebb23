//! A second Ctrl-C cuts a hung shutdown short when hastening is enabled.
#![cfg(unix)]

use async_trait::async_trait;
use lifeline::lifecycle::{
    CapturedExit, CoordinatorState, GracefulCoordinator, Lifecycle, LifecycleError,
};
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

struct HangsOnStop;

#[async_trait]
impl Lifecycle for HangsOnStop {
    async fn start(&self) -> Result<(), LifecycleError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), LifecycleError> {
        std::future::pending().await
    }

    fn name(&self) -> &str {
        "hangs-on-stop"
    }
}

#[tokio::test]
async fn test_second_interrupt_forces_exit() {
    let exit = CapturedExit::new();
    let coordinator = GracefulCoordinator::builder()
        .grace_period(Duration::from_secs(60))
        .without_deadline()
        .hasten_on_second_signal(true)
        .exit(exit.clone())
        .create(|_ready| HangsOnStop)
        .await
        .unwrap();
    let mut state = coordinator.subscribe_state();

    raise("INT");
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|state| *state == CoordinatorState::Draining),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(exit.code(), None);

    raise("INT");
    tokio::time::timeout(Duration::from_secs(5), coordinator.terminated())
        .await
        .unwrap();
    assert_eq!(exit.code(), Some(0));
}
