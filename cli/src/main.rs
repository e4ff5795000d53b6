mod commands;
mod terminal;

use commands::{CommandLine, Commands, scan};
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init(commands.quiet)?;
    print::banner(commands.no_banner);

    match commands.command {
        Commands::Scan(args) => {
            print::header("getting ready to scan");
            scan::scan(args).await
        }
    }
}
