use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[clap(value_enum, short, long, global = true, ignore_case = true, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bosnia and Herzegovina municipalities from Wikipedia + Wikidata
    Bih {
        #[clap(short, long, default_value = "data/geo/bih_locations.json")]
        output: PathBuf,
        /// Country profile (TOML) replacing the built-in reference tables
        #[clap(short, long)]
        profile: Option<PathBuf>,
    },
    /// EU-27 states, NUTS regions and Urban Audit cities from Eurostat GISCO
    Eu {
        #[clap(short, long, default_value = "data/geo/eu_locations.json")]
        output: PathBuf,
        /// Previously generated BiH dataset to merge, skipped if absent
        #[clap(long, default_value = "data/geo/bih_locations.json")]
        bih_dataset: PathBuf,
    },
    /// German states, districts and major cities from Wikidata
    De {
        #[clap(short, long, default_value = "data/geo/germany_locations.json")]
        output: PathBuf,
        #[clap(short, long)]
        profile: Option<PathBuf>,
        #[clap(long, default_value_t = 50_000)]
        min_population: u64,
    },
}

#[derive(ValueEnum, Clone, Debug)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}
