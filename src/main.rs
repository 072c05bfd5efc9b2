use clap::{Parser, Subcommand};
use hdb_geo::config::GeoConfig;
use hdb_geo::enrich;
use hdb_geo::geo::{Geocoding, ResolveStrategy};
use std::path::PathBuf;

/// hdb-geo — geocode HDB block addresses
///
/// Resolves "<block> <street>" addresses through OneMap and Street Directory,
/// caching every resolution so repeated runs cost nothing.
///
/// Examples:
///   hdb-geo resolve "123A EXAMPLE ST" "370 ANG MO KIO AVE 1"
///   hdb-geo --config hdb-geo.toml enrich --json-dir data/json --log data/cleanup.log
#[derive(Parser)]
#[command(name = "hdb-geo", version, about, long_about = None)]
struct Cli {
    /// TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Geocode addresses and print the results as JSON.
    Resolve {
        /// Addresses of the form "<block> <street>".
        #[arg(required = true)]
        addresses: Vec<String>,
    },
    /// Attach geolocation to every block of the scraped JSON files.
    Enrich {
        #[arg(long, default_value = "data/json")]
        json_dir: PathBuf,

        /// Cleanup completion log.
        #[arg(long, default_value = "data/cleanup.log")]
        log: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = GeoConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    let geocoding = Geocoding::new(config);

    match cli.command {
        Command::Resolve { addresses } => {
            let resolutions = geocoding
                .geocode_detailed(addresses.as_slice())
                .unwrap_or_else(|e| {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                });
            for r in resolutions.iter().filter(|r| r.strategy == ResolveStrategy::Reverse) {
                eprintln!("  {} resolved by reverse lookup, check the result", r.address);
            }
            let results: Vec<_> = resolutions.into_iter().map(|r| r.result).collect();
            match serde_json::to_string_pretty(&results) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Command::Enrich { json_dir, log } => {
            let summary = enrich::run(&json_dir, &log, |addresses| geocoding.geocode(addresses))
                .unwrap_or_else(|e| {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                });
            if !summary.skipped_step {
                eprintln!(
                    "  Geocoded {} of {} files",
                    summary.files_updated, summary.files_seen
                );
            }
        }
    }
}
