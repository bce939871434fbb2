use clap::Parser;
use ruletrader::cli::{run, Cli};
use ruletrader::logging;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);
    run(cli)
}
