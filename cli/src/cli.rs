use std::path::PathBuf;

/// Northern Ireland ward population, transport and county analysis
#[derive(clap::Parser, Debug)]
#[command(name = "wardmap", version, about)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Directory holding the shapefiles and transport CSV, defaults to "data_files"
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub data_dir: Option<PathBuf>,

    /// Output map image, defaults to "./sample_map.png"
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

impl Cli {
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        }
    }

    pub fn config(&self) -> wardmap::Config {
        let mut config = wardmap::Config::default();
        if let Some(dir) = &self.data_dir { config.data_dir = dir.clone() }
        if let Some(output) = &self.output { config.output = output.clone() }
        config
    }
}
