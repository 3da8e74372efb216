//! Monitor loop behaviour against a scripted host and transport (paused clock).
mod common;

use common::{AckMode, FakeHost, FakeTransport};
use rtpm_agent::monitor::{MonitorLoop, MonitorSettings};
use rtpm_agent::publisher::ChannelPublisher;
use rtpm_agent::report::MemoryThreshold;
use rtpm_agent::transport::Transport;
use rtpm_agent::types::RamUnit;
use tokio::time::{sleep, Duration, Instant};

fn settings(max_cpu: u32, period: u32) -> MonitorSettings {
    MonitorSettings {
        server_name: "test-host".into(),
        max_cpu_usage: max_cpu,
        period,
        memory: MemoryThreshold::new(10, RamUnit::Megabytes),
        settle: Duration::from_secs(1),
        top_k: None,
    }
}

fn monitor(
    host: FakeHost,
    mode: AckMode,
    s: MonitorSettings,
) -> (MonitorLoop<FakeHost, FakeTransport>, FakeTransport) {
    let transport = FakeTransport::new(mode);
    let publisher = ChannelPublisher::new(transport.clone(), "PNRTPM", Duration::from_secs(30));
    (MonitorLoop::new(s, host, publisher), transport)
}

#[tokio::test(start_paused = true)]
async fn breach_scenario_publishes_once_per_full_window() {
    let host = FakeHost::new(&[60.0, 55.0, 70.0, 40.0, 80.0, 80.0, 80.0])
        .with_process(10, "idle", 0.0)
        .with_process(11, "hog", 90.0);
    let (mut mon, transport) = monitor(host, AckMode::Ack, settings(50, 3));

    let mut publish_ticks = Vec::new();
    for tick in 1..=7 {
        let outcomes = mon.tick().await;
        if !outcomes.is_empty() {
            assert!(outcomes.iter().all(|o| o.acknowledged));
            publish_ticks.push(tick);
        }
    }
    assert_eq!(publish_ticks, vec![3, 7]);
    assert_eq!(mon.detector().hits(), 0);
    assert_eq!(transport.kinds(), vec!["PROCESS_ALERT", "PROCESS_ALERT"]);

    let (channel, last) = transport.published().pop().unwrap();
    assert_eq!(channel, "PNRTPM");
    assert_eq!(last["ServerName"], "test-host");
    assert_eq!(last["CPUUsage"], 80.0);
    assert_eq!(last["Processes"][0]["ProcessName"], "hog");
    assert_eq!(last["Processes"][1]["ProcessName"], "idle");
}

#[tokio::test(start_paused = true)]
async fn dip_before_period_publishes_nothing() {
    let host = FakeHost::new(&[90.0, 90.0, 10.0, 90.0, 90.0]);
    let (mut mon, transport) = monitor(host, AckMode::Ack, settings(50, 3));
    for _ in 0..5 {
        assert!(mon.tick().await.is_empty());
    }
    assert_eq!(mon.detector().hits(), 2);
    assert!(transport.published().is_empty());
}

#[tokio::test(start_paused = true)]
async fn low_memory_alerts_every_tick_without_cpu_breach() {
    let host = FakeHost::new(&[5.0, 5.0, 5.0]).with_available_mb(4);
    let (mut mon, transport) = monitor(host, AckMode::Ack, settings(50, 3));
    for _ in 0..3 {
        let outcomes = mon.tick().await;
        assert_eq!(outcomes.len(), 1);
    }
    assert_eq!(transport.kinds(), vec!["RAM_ALERT"; 3]);
    let (_, alert) = &transport.published()[0];
    assert_eq!(alert["Message"], "RAM Alert! Less than 10 MB available");
    assert_eq!(alert["RAMAvailable"], 4);
}

#[tokio::test(start_paused = true)]
async fn breach_and_low_memory_in_the_same_tick() {
    let host = FakeHost::new(&[99.0]).with_available_mb(1);
    let (mut mon, transport) = monitor(host, AckMode::Ack, settings(50, 1));
    assert_eq!(mon.tick().await.len(), 2);
    assert_eq!(transport.kinds(), vec!["PROCESS_ALERT", "RAM_ALERT"]);
}

#[tokio::test(start_paused = true)]
async fn unavailable_cpu_counter_never_alerts() {
    let host = FakeHost::without_cpu_counter();
    let (mut mon, transport) = monitor(host, AckMode::Ack, settings(0, 1));
    for _ in 0..3 {
        assert!(mon.tick().await.is_empty());
    }
    assert!(transport.published().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unacknowledged_publish_times_out_and_the_loop_moves_on() {
    let host = FakeHost::new(&[95.0, 95.0]);
    let (mut mon, transport) = monitor(host, AckMode::Never, settings(50, 1));

    let started = Instant::now();
    let first = mon.tick().await;
    assert_eq!(first.len(), 1);
    assert!(!first[0].acknowledged);
    assert!(first[0].timed_out);
    assert!(first[0].error.is_some());
    // sample settle + ranking settle + ack wait
    assert!(started.elapsed() >= Duration::from_secs(32));
    assert!(started.elapsed() < Duration::from_secs(40));

    let second = mon.tick().await;
    assert_eq!(second.len(), 1);
    assert!(second[0].timed_out);
    assert_eq!(transport.published().len(), 2);
    assert_eq!(mon.ticks(), 2);
}

#[tokio::test(start_paused = true)]
async fn transport_error_is_reported_not_retried() {
    let host = FakeHost::new(&[95.0]);
    let (mut mon, transport) = monitor(host, AckMode::Fail, settings(50, 1));
    let outcomes = mon.tick().await;
    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].acknowledged);
    assert!(!outcomes[0].timed_out);
    assert!(outcomes[0]
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("quota exceeded"));
    assert_eq!(transport.published().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_halts_ticks_and_hands_back_the_publisher() {
    let host = FakeHost::new(&[]).with_available_mb(2);
    let (mon, transport) = monitor(host, AckMode::Ack, settings(50, 60));
    let handle = mon.start();

    sleep(Duration::from_millis(5500)).await;
    assert!(!handle.is_finished());
    let mut publisher = handle.stop().await.expect("loop stops cleanly");
    let count = transport.published().len();
    assert!(count >= 4, "expected one alert per tick, got {count}");

    sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.published().len(), count);

    publisher.transport_mut().disconnect().await.unwrap();
    assert!(transport
        .disconnected
        .load(std::sync::atomic::Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn stop_waits_for_an_in_flight_publish() {
    let host = FakeHost::new(&[]).with_available_mb(2);
    let (mon, transport) = monitor(host, AckMode::Never, settings(50, 60));
    let handle = mon.start();

    // First publish is in flight after the 1s settle.
    sleep(Duration::from_secs(3)).await;
    assert_eq!(transport.published().len(), 1);

    let stopped_at = Instant::now();
    assert!(handle.stop().await.is_some());
    // Resolved by the 30s ack timeout, well within the stop grace.
    assert!(stopped_at.elapsed() <= Duration::from_secs(30));
    assert_eq!(transport.published().len(), 1);
}
