mod commands;
mod terminal;

use commands::{CommandLine, Commands, rules, run};
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init_logging(commands.verbose, commands.log_file.as_deref())?;
    print::banner(commands.no_banner, commands.quiet);

    match commands.command {
        Commands::Run(args) => {
            print::header("getting ready", commands.quiet);
            run::run(args, commands.quiet, commands.no_banner).await
        }
        Commands::Rules { rules: path } => {
            print::header("checking rules", commands.quiet);
            rules::rules(&path, commands.quiet)
        }
    }
}
