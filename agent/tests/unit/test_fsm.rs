//! FSM unit tests

use dockhand::deploy::fsm::{PipelineEvent, PipelineFsm, PipelineState};

#[test]
fn test_fsm_initial_state() {
    let fsm = PipelineFsm::new();
    assert_eq!(fsm.state(), &PipelineState::Idle);
    assert!(fsm.error().is_none());
    assert!(!fsm.degraded());
}

fn advance_to(fsm: &mut PipelineFsm, state: PipelineState) {
    let sequence = [
        (PipelineState::Locked, PipelineEvent::LockGranted),
        (PipelineState::Syncing, PipelineEvent::SyncStarted),
        (PipelineState::Building, PipelineEvent::BuildStarted),
        (PipelineState::Restarting, PipelineEvent::RestartStarted),
        (PipelineState::HealthChecking, PipelineEvent::HealthCheckStarted),
    ];
    for (target, event) in sequence {
        fsm.process(event).unwrap();
        if target == state {
            return;
        }
    }
    panic!("{:?} is not reachable through the happy path", state);
}

#[test]
fn test_fsm_rollback_from_each_mutation_stage() {
    for stage in [
        PipelineState::Syncing,
        PipelineState::Building,
        PipelineState::Restarting,
    ] {
        let mut fsm = PipelineFsm::new();
        advance_to(&mut fsm, stage);

        fsm.process(PipelineEvent::RollbackSucceeded("stage failed".to_string()))
            .unwrap();
        assert_eq!(fsm.state(), &PipelineState::RolledBack);
        assert_eq!(fsm.error(), Some("stage failed"));
    }
}

#[test]
fn test_fsm_rollback_failure_from_each_mutation_stage() {
    for stage in [
        PipelineState::Syncing,
        PipelineState::Building,
        PipelineState::Restarting,
    ] {
        let mut fsm = PipelineFsm::new();
        advance_to(&mut fsm, stage);

        fsm.process(PipelineEvent::RollbackFailed("reset failed".to_string()))
            .unwrap();
        assert_eq!(fsm.state(), &PipelineState::Failed);
        assert!(fsm.state().is_terminal());
    }
}

#[test]
fn test_fsm_health_checking_never_rolls_back() {
    // The new revision is already serving by this point
    let mut fsm = PipelineFsm::new();
    advance_to(&mut fsm, PipelineState::HealthChecking);

    assert!(fsm
        .process(PipelineEvent::RollbackSucceeded("late".to_string()))
        .is_err());
    assert_eq!(fsm.state(), &PipelineState::HealthChecking);
}

#[test]
fn test_fsm_terminal_states_accept_nothing() {
    let terminal_runs: [&[PipelineEvent]; 2] = [
        &[
            PipelineEvent::LockGranted,
            PipelineEvent::SyncStarted,
            PipelineEvent::BuildStarted,
            PipelineEvent::RestartStarted,
            PipelineEvent::HealthCheckStarted,
            PipelineEvent::Healthy,
        ],
        &[
            PipelineEvent::LockGranted,
            PipelineEvent::SyncStarted,
            PipelineEvent::RollbackFailed("x".to_string()),
        ],
    ];

    for run in terminal_runs {
        let mut fsm = PipelineFsm::new();
        for event in run {
            fsm.process(event.clone()).unwrap();
        }
        assert!(fsm.state().is_terminal());
        assert!(fsm.process(PipelineEvent::LockGranted).is_err());
        assert!(fsm.process(PipelineEvent::SyncStarted).is_err());
    }
}

#[test]
fn test_fsm_degraded_flag_only_set_by_degraded_event() {
    let mut fsm = PipelineFsm::new();
    advance_to(&mut fsm, PipelineState::HealthChecking);
    fsm.process(PipelineEvent::Degraded).unwrap();

    assert_eq!(fsm.state(), &PipelineState::Succeeded);
    assert!(fsm.degraded());
    assert!(fsm.error().is_none());
}
