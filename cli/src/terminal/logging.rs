use colored::*;
use tracing::{Event, Level, Subscriber};
use tracing_indicatif::IndicatifLayer;
use tracing_indicatif::filter::IndicatifFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::{self, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use sweepr_core::engine::OFFLINE_TARGET;

/// Events on this target are printed verbatim, without a status symbol.
pub const PRINT_TARGET: &str = "sweepr::print";
const SUCCESS_TARGET: &str = "sweepr::success";

const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber.
///
/// Log lines are routed through the progress bar layer so they never tear an
/// active bar. `RUST_LOG` overrides the default `info` filter.
pub fn init(quiet: bool) -> anyhow::Result<()> {
    let mut filter: EnvFilter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if quiet {
        filter = filter.add_directive(format!("{OFFLINE_TARGET}=off").parse()?);
    }

    let indicatif_layer = IndicatifLayer::new();

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(SweeprFormatter)
                .with_writer(indicatif_layer.get_stderr_writer()),
        )
        .with(indicatif_layer.with_filter(IndicatifFilter::new(false)))
        .try_init()?;

    Ok(())
}

pub struct SweeprFormatter;

impl SweeprFormatter {
    fn symbol(meta: &tracing::Metadata<'_>) -> ColoredString {
        if meta.target() == SUCCESS_TARGET {
            return "[+]".green().bold();
        }

        match *meta.level() {
            Level::TRACE => "[ ]".dimmed(),
            Level::DEBUG => "[?]".blue(),
            Level::INFO => "[~]".bright_black().bold(),
            Level::WARN => "[*]".yellow().bold(),
            Level::ERROR => "[-]".red().bold(),
        }
    }
}

impl<S, N> FormatEvent<S, N> for SweeprFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> format::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();

        if meta.target() != PRINT_TARGET {
            write!(writer, "{} ", Self::symbol(meta))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}
