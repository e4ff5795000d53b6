//! # Scan Engine
//!
//! Walks every host of a [`NetworkRange`] with a bounded pool of workers.
//!
//! Workers pull addresses from one shared enumerator and hand their outcomes
//! to a single collector over a channel. The collector is the only writer of
//! the result set and the progress counter, so no insert ever races.
//!
//! A raised [`StopSignal`] keeps workers from starting new probes. Probes
//! already in flight end at their timeout at the latest, after which the
//! partial result is returned.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sweepr_common::config::Config;
use sweepr_common::error::ProbeSetupError;
use sweepr_common::network::mode::ScanMode;
use sweepr_common::network::range::{Hosts, NetworkRange};
use sweepr_common::scan::{ProbeOutcome, ProbeReport, ResultSink, ScanResult, ScanStatus};
use sweepr_common::{error, info, success};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::debug;

use crate::probe::{self, Prober};

/// Target for per-host "offline" lines, so they can be filtered separately.
pub const OFFLINE_TARGET: &str = "sweepr::offline";

/// Cloneable cancellation flag shared between a scan and whoever may stop it.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

type ProbeCallback = Box<dyn Fn(&ProbeReport) + Send + Sync>;

enum WorkerEvent {
    Resolved(IpAddr, ProbeOutcome),
    SetupFailed(ProbeSetupError),
}

pub struct ScanEngine {
    prober: Arc<dyn Prober>,
    method: String,
    cfg: Config,
    stop: StopSignal,
    on_probe: Option<ProbeCallback>,
}

impl ScanEngine {
    pub fn new(prober: Arc<dyn Prober>, cfg: Config) -> Self {
        Self {
            prober,
            method: String::from("a custom prober"),
            cfg,
            stop: StopSignal::new(),
            on_probe: None,
        }
    }

    /// Builds the engine for `mode`, opening whatever sockets `range` needs.
    pub fn for_mode(mode: ScanMode, range: &NetworkRange, cfg: Config) -> Result<Self, ProbeSetupError> {
        let prober: Arc<dyn Prober> = probe::for_mode(mode, range)?;
        Ok(Self {
            method: mode.to_string(),
            ..Self::new(prober, cfg)
        })
    }

    /// Lets `stop` cancel the scan from the outside.
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Registers a callback invoked after every resolved probe.
    pub fn on_probe<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProbeReport) + Send + Sync + 'static,
    {
        self.on_probe = Some(Box::new(callback));
        self
    }

    /// Probes every host of `range` and returns the live ones.
    ///
    /// Never fails: cancellation and setup errors are reported through
    /// [`ScanResult::status`] alongside whatever was found until then.
    pub async fn run(&self, range: &NetworkRange) -> ScanResult {
        let total: usize = usize::try_from(range.host_count()).unwrap_or(usize::MAX);
        let workers: usize = self.cfg.concurrency.clamp(1, total.max(1));
        info!("Scanning {} hosts in {range} using {}", range.host_count(), self.method);
        debug!("{workers} workers");

        let hosts: Arc<Mutex<Hosts>> = Arc::new(Mutex::new(range.hosts()));
        let halt: StopSignal = StopSignal::new();
        let (tx, mut rx) = mpsc::channel::<WorkerEvent>(workers);

        let mut pool: JoinSet<()> = JoinSet::new();
        for _ in 0..workers {
            pool.spawn(worker(
                self.prober.clone(),
                hosts.clone(),
                self.cfg.timeout,
                self.stop.clone(),
                halt.clone(),
                tx.clone(),
            ));
        }
        drop(tx);

        let mut sink: ResultSink = ResultSink::new();
        let mut failure: Option<ProbeSetupError> = None;

        while let Some(event) = rx.recv().await {
            match event {
                WorkerEvent::Resolved(host, outcome) => {
                    sink.record(host, outcome);
                    self.report(host, outcome, sink.probed(), total);
                }
                WorkerEvent::SetupFailed(err) => {
                    halt.stop();
                    if failure.is_none() {
                        error!("Probing is not possible: {err}");
                        failure = Some(err);
                    }
                }
            }
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                error!("Scan worker failed: {e}");
            }
        }

        let status: ScanStatus = match failure {
            Some(err) => ScanStatus::Aborted(err),
            None if self.stop.is_stopped() && sink.probed() < total => ScanStatus::Cancelled,
            None => ScanStatus::Completed,
        };

        sink.finish(status)
    }

    fn report(&self, host: IpAddr, outcome: ProbeOutcome, completed: usize, total: usize) {
        let label: String = self.prober.label(host);
        match outcome {
            ProbeOutcome::Reachable => success!("{label} is online."),
            ProbeOutcome::Unreachable => info!(target: OFFLINE_TARGET, "{label} is offline."),
        }

        if let Some(callback) = &self.on_probe {
            callback(&ProbeReport {
                host,
                outcome,
                completed,
                total,
            });
        }
    }
}

async fn worker(
    prober: Arc<dyn Prober>,
    hosts: Arc<Mutex<Hosts>>,
    probe_timeout: Duration,
    stop: StopSignal,
    halt: StopSignal,
    tx: mpsc::Sender<WorkerEvent>,
) {
    loop {
        if stop.is_stopped() || halt.is_stopped() {
            break;
        }

        let next: Option<IpAddr> = hosts.lock().await.next();
        let Some(host) = next else {
            break;
        };

        // The prober is trusted to honour the timeout, but never beyond it.
        let event = match tokio::time::timeout(probe_timeout, prober.probe(host, probe_timeout)).await {
            Ok(Ok(outcome)) => WorkerEvent::Resolved(host, outcome),
            Ok(Err(err)) => WorkerEvent::SetupFailed(err),
            Err(_elapsed) => WorkerEvent::Resolved(host, ProbeOutcome::Unreachable),
        };

        let fatal: bool = matches!(event, WorkerEvent::SetupFailed(_));
        if tx.send(event).await.is_err() || fatal {
            break;
        }
    }
}

/// Scans `range` in `mode`.
///
/// Returns `Err` only when the prober cannot be set up at all. Anything that
/// goes wrong once probing has started is reported inside the [`ScanResult`].
pub async fn scan(
    range: &NetworkRange,
    mode: ScanMode,
    cfg: Config,
    stop: StopSignal,
) -> Result<ScanResult, ProbeSetupError> {
    let engine: ScanEngine = ScanEngine::for_mode(mode, range, cfg)?.with_stop_signal(stop);
    Ok(engine.run(range).await)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::io;
    use std::net::Ipv4Addr;
    use std::sync::atomic::AtomicUsize;
    use sweepr_common::network::mode::ModeKind;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn last_octet(host: IpAddr) -> u8 {
        match host {
            IpAddr::V4(v4) => v4.octets()[3],
            IpAddr::V6(_) => unreachable!("tests only scan IPv4"),
        }
    }

    fn later_answers_first(host: IpAddr) -> Duration {
        Duration::from_millis(5 * u64::from(16 - last_octet(host)))
    }

    fn short_delay(_host: IpAddr) -> Duration {
        Duration::from_millis(10)
    }

    fn cfg(concurrency: usize) -> Config {
        Config {
            timeout: Duration::from_secs(1),
            concurrency,
        }
    }

    /// In-memory prober answering from a fixed script.
    #[derive(Default)]
    struct ScriptedProber {
        reachable: HashSet<IpAddr>,
        delay: Option<fn(IpAddr) -> Duration>,
        fail_on: Option<IpAddr>,
        stop_on: Option<(IpAddr, StopSignal)>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Prober for ScriptedProber {
        async fn probe(&self, host: IpAddr, _timeout: Duration) -> Result<ProbeOutcome, ProbeSetupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some((at, stop)) = &self.stop_on {
                if *at == host {
                    stop.stop();
                }
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay(host)).await;
            }
            if self.fail_on == Some(host) {
                return Err(ProbeSetupError::PermissionDenied {
                    host,
                    source: io::Error::from(io::ErrorKind::PermissionDenied),
                });
            }

            if self.reachable.contains(&host) {
                Ok(ProbeOutcome::Reachable)
            } else {
                Ok(ProbeOutcome::Unreachable)
            }
        }
    }

    /// Never answers on its own.
    struct HangingProber;

    #[async_trait]
    impl Prober for HangingProber {
        async fn probe(&self, _host: IpAddr, _timeout: Duration) -> Result<ProbeOutcome, ProbeSetupError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ProbeOutcome::Reachable)
        }
    }

    fn range(s: &str) -> NetworkRange {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn all_unreachable_yields_empty_result() {
        let prober = Arc::new(ScriptedProber::default());
        let result = ScanEngine::new(prober.clone(), cfg(8)).run(&range("10.0.0.0/28")).await;

        assert!(result.is_empty());
        assert!(result.is_complete());
        assert_eq!(result.probed(), 14);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 14);
    }

    #[tokio::test]
    async fn mixed_result_is_independent_of_completion_order() {
        let expected: HashSet<IpAddr> = [ip(2), ip(3), ip(7), ip(11), ip(13)].into_iter().collect();
        let prober = Arc::new(ScriptedProber {
            reachable: expected.clone(),
            delay: Some(later_answers_first as fn(IpAddr) -> Duration),
            ..Default::default()
        });

        let result = ScanEngine::new(prober, cfg(14)).run(&range("10.0.0.0/28")).await;

        let found: HashSet<IpAddr> = result.live_hosts().iter().copied().collect();
        assert_eq!(found, expected);
        assert_eq!(result.len(), expected.len());
        assert_eq!(result.sorted_hosts(), vec![ip(2), ip(3), ip(7), ip(11), ip(13)]);
        assert!(result.is_complete());
    }

    #[tokio::test]
    async fn sequential_scan_preserves_address_order() {
        let prober = Arc::new(ScriptedProber {
            reachable: [ip(6), ip(1), ip(4)].into_iter().collect(),
            ..Default::default()
        });

        let result = ScanEngine::new(prober, cfg(1)).run(&range("10.0.0.0/29")).await;
        assert_eq!(result.live_hosts(), &[ip(1), ip(4), ip(6)]);
    }

    #[tokio::test]
    async fn cancellation_returns_hosts_resolved_before_it() {
        let stop = StopSignal::new();
        let prober = Arc::new(ScriptedProber {
            reachable: (1..=14).filter(|n| n % 2 == 0).map(ip).collect(),
            stop_on: Some((ip(5), stop.clone())),
            ..Default::default()
        });

        let result = ScanEngine::new(prober.clone(), cfg(1))
            .with_stop_signal(stop)
            .run(&range("10.0.0.0/28"))
            .await;

        assert!(matches!(result.status(), ScanStatus::Cancelled));
        assert_eq!(result.live_hosts(), &[ip(2), ip(4)]);
        assert_eq!(result.probed(), 5);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn cancellation_with_workers_in_flight_has_no_duplicates() {
        let stop = StopSignal::new();
        let prober = Arc::new(ScriptedProber {
            reachable: (1..=254).map(ip).collect(),
            delay: Some(short_delay as fn(IpAddr) -> Duration),
            stop_on: Some((ip(40), stop.clone())),
            ..Default::default()
        });

        let result = ScanEngine::new(prober.clone(), cfg(8))
            .with_stop_signal(stop)
            .run(&range("10.0.0.0/24"))
            .await;

        let unique: HashSet<&IpAddr> = result.live_hosts().iter().collect();
        assert!(matches!(result.status(), ScanStatus::Cancelled));
        assert_eq!(unique.len(), result.len());
        assert_eq!(result.len(), prober.calls.load(Ordering::SeqCst));
        assert!(result.len() < 254);
        assert!(result.live_hosts().contains(&ip(40)));
    }

    #[tokio::test]
    async fn stop_before_start_probes_nothing() {
        let stop = StopSignal::new();
        stop.stop();
        let prober = Arc::new(ScriptedProber::default());

        let result = ScanEngine::new(prober.clone(), cfg(4))
            .with_stop_signal(stop)
            .run(&range("10.0.0.0/29"))
            .await;

        assert!(result.is_empty());
        assert_eq!(result.probed(), 0);
        assert!(matches!(result.status(), ScanStatus::Cancelled));
    }

    #[tokio::test]
    async fn setup_error_aborts_with_partial_result() {
        let prober = Arc::new(ScriptedProber {
            reachable: [ip(2), ip(5)].into_iter().collect(),
            fail_on: Some(ip(3)),
            ..Default::default()
        });

        let result = ScanEngine::new(prober.clone(), cfg(1)).run(&range("10.0.0.0/28")).await;

        assert_eq!(prober.calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.live_hosts(), &[ip(2)]);
        assert!(matches!(result.into_failure(), Some(ProbeSetupError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn probes_never_outlive_the_timeout() {
        let config = Config {
            timeout: Duration::from_millis(50),
            concurrency: 4,
        };

        let start = std::time::Instant::now();
        let result = ScanEngine::new(Arc::new(HangingProber), config)
            .run(&range("10.0.0.0/29"))
            .await;

        assert!(result.is_empty());
        assert_eq!(result.probed(), 6);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn callback_sees_every_probe() {
        let reports = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = reports.clone();
        let prober = Arc::new(ScriptedProber {
            reachable: [ip(1)].into_iter().collect(),
            ..Default::default()
        });

        let result = ScanEngine::new(prober, cfg(3))
            .on_probe(move |report| sink.lock().unwrap().push(*report))
            .run(&range("10.0.0.0/29"))
            .await;

        let reports = reports.lock().unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(reports.len(), 6);
        assert!(reports.iter().all(|r| r.total == 6));
        assert_eq!(reports.last().map(|r| r.completed), Some(6));
        assert_eq!(reports.iter().filter(|r| r.outcome.is_reachable()).count(), 1);
    }

    #[tokio::test]
    async fn engine_for_tcp_mode_finds_a_listening_port() {
        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let mode = ScanMode::from_parts(ModeKind::Tcp, Some(u32::from(port))).unwrap();
        let range = range("127.0.0.1/32");

        let result = ScanEngine::for_mode(mode, &range, cfg(4)).unwrap().run(&range).await;

        assert!(result.is_complete());
        assert_eq!(result.live_hosts(), &[IpAddr::V4(Ipv4Addr::LOCALHOST)]);
    }

    #[tokio::test]
    async fn single_host_range() {
        let prober = Arc::new(ScriptedProber {
            reachable: [ip(9)].into_iter().collect(),
            ..Default::default()
        });

        let result = ScanEngine::new(prober, cfg(32)).run(&range("10.0.0.9/32")).await;
        assert_eq!(result.live_hosts(), &[ip(9)]);
    }
}
