use std::error::Error;
use rcmp::cli::run_cli;

fn main() -> Result<(), Box<dyn Error>> {
    run_cli()
}
