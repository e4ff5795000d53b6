use std::net::IpAddr;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Args, ValueEnum};
use colored::*;
use tracing::{Instrument, info_span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use sweepr_common::config::{Config, DEFAULT_CONCURRENCY};
use sweepr_common::error::{ConfigurationError, ProbeSetupError};
use sweepr_common::network::mode::{ModeKind, ScanMode};
use sweepr_common::network::range::NetworkRange;
use sweepr_common::scan::{ScanResult, ScanStatus};
use sweepr_common::{info, success, warn};
use sweepr_core::{ScanEngine, StopSignal};

use crate::terminal::{colors, print, progress};

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Network to scan in CIDR notation, e.g. 192.168.1.0/24
    pub network: String,

    /// How reachability is tested
    pub mode: ModeArg,

    /// Port to connect to (required for TCP mode)
    #[arg(short, long)]
    pub port: Option<u32>,

    /// Seconds to wait for each host
    #[arg(short, long, default_value_t = 1.0)]
    pub timeout: f64,

    /// Number of hosts probed at the same time
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    /// ICMP echo request (ping)
    Icmp,
    /// TCP handshake against --port
    Tcp,
}

impl From<ModeArg> for ModeKind {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Icmp => ModeKind::Icmp,
            ModeArg::Tcp => ModeKind::Tcp,
        }
    }
}

/// Everything a scan needs, validated before any packet leaves.
struct ScanPlan {
    range: NetworkRange,
    mode: ScanMode,
    cfg: Config,
}

impl TryFrom<&ScanArgs> for ScanPlan {
    type Error = anyhow::Error;

    fn try_from(args: &ScanArgs) -> anyhow::Result<Self> {
        let range: NetworkRange = args
            .network
            .parse()
            .with_context(|| format!("invalid network '{}'", args.network))?;
        let mode: ScanMode = ScanMode::from_parts(args.mode.into(), args.port)?;
        let timeout: Duration =
            Duration::try_from_secs_f64(args.timeout).map_err(|_| ConfigurationError::InvalidTimeout)?;
        let cfg: Config = Config {
            timeout,
            concurrency: args.concurrency,
        }
        .validate()?;

        Ok(Self { range, mode, cfg })
    }
}

pub async fn scan(args: ScanArgs) -> anyhow::Result<()> {
    let plan: ScanPlan = ScanPlan::try_from(&args)?;
    print_plan(&plan);

    let engine: ScanEngine =
        ScanEngine::for_mode(plan.mode, &plan.range, plan.cfg).inspect_err(privilege_hint)?;

    let stop: StopSignal = StopSignal::new();
    let signal_task = tokio::spawn(wait_for_interrupt(stop.clone()));

    let total: u64 = u64::try_from(plan.range.host_count()).unwrap_or(u64::MAX);
    let span = info_span!("scan", indicatif.pb_show = true);
    span.pb_set_style(&progress::style());
    span.pb_set_length(total);
    span.pb_set_message(&format!("probing {}", plan.range));

    let progress_span = span.clone();
    let engine: ScanEngine = engine
        .with_stop_signal(stop)
        .on_probe(move |_report| progress_span.pb_inc(1));

    let start_time: Instant = Instant::now();
    let result: ScanResult = engine.run(&plan.range).instrument(span).await;
    signal_task.abort();

    scan_ends(result, start_time.elapsed())
}

async fn wait_for_interrupt(stop: StopSignal) {
    if tokio::signal::ctrl_c().await.is_ok() {
        stop.stop();
        warn!("Interrupted, waiting for probes in flight to finish...");
    }
}

fn privilege_hint(err: &ProbeSetupError) {
    if err.is_permission_error() && !is_root::is_root() {
        warn!("ICMP probing needs root privileges (or CAP_NET_RAW). Retry with sudo or use tcp mode.");
    }
}

fn print_plan(plan: &ScanPlan) {
    print::set_key_width(&["Network", "Hosts", "Mode", "Timeout", "Workers"]);
    print::aligned_line("Network", plan.range.to_string().color(colors::PRIMARY));
    print::aligned_line("Hosts", plan.range.host_count().to_string());
    print::aligned_line("Mode", plan.mode.to_string());
    print::aligned_line("Timeout", format!("{:.2}s", plan.cfg.timeout.as_secs_f64()));
    print::aligned_line("Workers", plan.cfg.concurrency.to_string());
}

fn scan_ends(result: ScanResult, total_time: Duration) -> anyhow::Result<()> {
    let probed: usize = result.probed();
    let cancelled: bool = matches!(result.status(), ScanStatus::Cancelled);
    let hosts: Vec<IpAddr> = result.sorted_hosts();
    let failure: Option<ProbeSetupError> = result.into_failure();

    print::header("scan results");
    if hosts.is_empty() {
        info!("No live hosts found.");
    } else {
        success!("Live hosts:");
        print_hosts(&hosts);
    }

    print_summary(hosts.len(), probed, total_time);

    if cancelled {
        warn!("Scan was interrupted, results are partial.");
    }

    match failure {
        Some(err) => {
            privilege_hint(&err);
            Err(anyhow::Error::new(err).context("scan aborted"))
        }
        None => Ok(()),
    }
}

fn print_hosts(hosts: &[IpAddr]) {
    // Results go to stdout, one per line, so they can be piped.
    for host in hosts {
        println!("{host}");
    }
}

fn print_summary(live: usize, probed: usize, total_time: Duration) {
    let active_hosts: ColoredString = format!("{live} live hosts").bold().green();
    let probed: ColoredString = format!("{probed} probed").bold();
    let total_time: ColoredString = format!("{:.2}s", total_time.as_secs_f64()).bold().yellow();
    let output: ColoredString =
        format!("Scan Complete: {active_hosts} of {probed} in {total_time}").color(colors::TEXT_DEFAULT);

    print::fat_separator();
    print::centerln(&output);
}
