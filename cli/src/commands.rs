pub mod scan;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sweepr")]
#[command(about = "Finds the live hosts of a subnet.", version)]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,

    /// Hide per-host lines for hosts that did not answer
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Do not print the banner
    #[arg(long, global = true)]
    pub no_banner: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe every host of a network for reachability
    #[command(alias = "s")]
    Scan(scan::ScanArgs),
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
