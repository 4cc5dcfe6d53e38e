//! Delivery FSM tests

use deployer::deploy::fsm::{DeliveryEvent, DeliveryFsm, DeliveryState};

#[test]
fn test_fsm_initial_state() {
    let fsm = DeliveryFsm::new();
    assert_eq!(fsm.state(), DeliveryState::Pending);
    assert!(fsm.error().is_none());
    assert!(!fsm.is_terminal());
}

#[test]
fn test_fsm_cannot_send_before_finish() {
    let mut fsm = DeliveryFsm::new();

    // Pipeline still running
    assert!(fsm.process(DeliveryEvent::SendSuccess).is_err());
    assert_eq!(fsm.state(), DeliveryState::Pending);
}

#[test]
fn test_fsm_terminal_states_are_final() {
    let mut fsm = DeliveryFsm::new();
    fsm.process(DeliveryEvent::Finish).unwrap();
    fsm.process(DeliveryEvent::SendFailed("timeout".to_string()))
        .unwrap();

    assert!(fsm.process(DeliveryEvent::SendSuccess).is_err());
    assert!(fsm.process(DeliveryEvent::Finish).is_err());
    assert_eq!(fsm.state(), DeliveryState::SendFailed);
    assert_eq!(fsm.error(), Some("timeout"));
}
