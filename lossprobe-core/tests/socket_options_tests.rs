//! Integration tests for the options the load generator relies on

use lossprobe_core::options::{OverflowPolicy, SocketOptions};
use lossprobe_core::reconnect::ReconnectState;
use std::time::Duration;

#[test]
fn test_load_generator_profile() {
    // 5000 outstanding messages, capacity at least twice that
    let opts = SocketOptions::new().with_hwm(8192 * 2);

    assert!(opts.send_hwm >= 2 * 5000);
    assert!(opts.recv_hwm >= 2 * 5000);
    assert_eq!(opts.overflow, OverflowPolicy::Block);
    assert!(opts.validate().is_ok());
}

#[test]
fn test_drop_policy_profile() {
    let opts = SocketOptions::new()
        .with_send_hwm(10)
        .with_overflow(OverflowPolicy::Drop);

    assert_eq!(opts.send_hwm, 10);
    assert_eq!(opts.recv_hwm, 1000);
    assert_eq!(opts.overflow, OverflowPolicy::Drop);
}

#[test]
fn test_linger_settings() {
    let opts = SocketOptions::default();
    assert_eq!(opts.linger, Some(Duration::from_secs(30)));

    let opts = opts.with_linger(None);
    assert_eq!(opts.linger, None);

    let opts = opts.with_linger(Some(Duration::ZERO));
    assert_eq!(opts.linger, Some(Duration::ZERO));
}

#[test]
fn test_reconnect_state_follows_options() {
    let opts = SocketOptions::new()
        .with_reconnect_ivl(Duration::from_millis(20))
        .with_reconnect_ivl_max(Duration::from_millis(80));
    let mut state = ReconnectState::new(&opts);

    let delays: Vec<_> = (0..4).map(|_| state.next_delay()).collect();
    assert_eq!(
        delays,
        vec![
            Duration::from_millis(20),
            Duration::from_millis(40),
            Duration::from_millis(80),
            Duration::from_millis(80),
        ]
    );
    for attempt in 0..4 {
        assert_eq!(opts.next_reconnect_ivl(attempt), delays[attempt as usize]);
    }
}

#[test]
fn test_buffer_sizes() {
    let opts = SocketOptions::new()
        .with_buffer_sizes(4096, 16384)
        .with_max_msg_size(Some(1024));

    assert_eq!(opts.read_buffer_size, 4096);
    assert_eq!(opts.write_buffer_size, 16384);
    assert_eq!(opts.max_msg_size, Some(1024));
    assert!(SocketOptions::new().with_buffer_sizes(0, 0).validate().is_err());
}
