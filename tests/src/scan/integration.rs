use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sweepr_common::config::Config;
use sweepr_common::network::mode::{ModeKind, ScanMode};
use sweepr_common::network::range::NetworkRange;
use sweepr_common::scan::ScanStatus;
use sweepr_core::probe::TcpConnectProbe;
use sweepr_core::{ScanEngine, StopSignal, scan};
use tokio::net::TcpListener;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn config() -> Config {
    Config {
        timeout: Duration::from_millis(500),
        concurrency: 4,
    }
}

async fn open_port() -> (TcpListener, u16) {
    let listener: TcpListener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
    let port: u16 = listener.local_addr().unwrap().port();
    (listener, port)
}

/// 127.0.0.0/30 holds 127.0.0.1 and 127.0.0.2. Only the first one listens.
#[tokio::test]
async fn tcp_scan_finds_the_listening_loopback_host() {
    let (_listener, port) = open_port().await;
    let range: NetworkRange = "127.0.0.0/30".parse().unwrap();
    let mode: ScanMode = ScanMode::from_parts(ModeKind::Tcp, Some(u32::from(port))).unwrap();

    let result = scan(&range, mode, config(), StopSignal::new()).await.unwrap();

    assert!(result.is_complete(), "scan did not complete: {:?}", result.status());
    assert_eq!(result.probed(), 2);
    assert_eq!(result.live_hosts(), &[LOCALHOST]);
}

#[tokio::test]
async fn tcp_scan_of_closed_port_is_empty_and_complete() {
    let (listener, port) = open_port().await;
    drop(listener);

    let range: NetworkRange = "127.0.0.1/32".parse().unwrap();
    let mode: ScanMode = ScanMode::from_parts(ModeKind::Tcp, Some(u32::from(port))).unwrap();

    let start: Instant = Instant::now();
    let result = scan(&range, mode, config(), StopSignal::new()).await.unwrap();

    assert!(result.is_empty());
    assert!(matches!(result.status(), ScanStatus::Completed));
    assert!(start.elapsed() < config().timeout + Duration::from_millis(500));
}

#[tokio::test]
async fn stopped_scan_returns_without_probing() {
    let (_listener, port) = open_port().await;
    let stop: StopSignal = StopSignal::new();
    stop.stop();

    let range: NetworkRange = "127.0.0.0/29".parse().unwrap();
    let engine = ScanEngine::new(Arc::new(TcpConnectProbe::new(port).unwrap()), config())
        .with_stop_signal(stop);

    let result = engine.run(&range).await;

    assert!(result.is_empty());
    assert!(matches!(result.status(), ScanStatus::Cancelled));
}

#[test]
fn tcp_mode_without_port_never_reaches_the_engine() {
    assert!(ScanMode::from_parts(ModeKind::Tcp, None).is_err());
}
