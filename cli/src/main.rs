mod cli;

use cli::Cli;

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();

    // RUST_LOG, when set, takes precedence over -v.
    pretty_env_logger::formatted_builder()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    let report = wardmap::run(&cli.config())?;
    println!("{report}");
    Ok(())
}

fn main() -> anyhow::Result<()> { run() }
