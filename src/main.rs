use anyhow::{Context, Result};
use clap::Parser;
use geoharvest::{
    config::{Command, Config},
    dataset::{bih, de, eu},
    log, output,
    profile::{Country, CountryProfile},
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    log::setup_trace(&config);

    match config.command {
        Command::Bih { output: path, profile } => {
            let profile = CountryProfile::builtin_or_load(Country::BosniaAndHerzegovina, profile.as_deref())
                .context("Failed to load country profile")?;
            let dataset = bih::harvest(&profile).await
                .context("Failed to build the Bosnia and Herzegovina dataset")?;
            output::write_json(&path, &dataset)?;
            info!("Wrote {} city records to {}", dataset.cities.len(), path.display());
        }
        Command::Eu { output: path, bih_dataset } => {
            let bih = output::read_json::<bih::BihDataset>(&bih_dataset)
                .context("Failed to read the Bosnia and Herzegovina dataset")?;
            if bih.is_none() {
                info!("{} not found, skipping Bosnia and Herzegovina", bih_dataset.display());
            }
            let dataset = eu::harvest(bih).await
                .context("Failed to build the EU dataset")?;
            output::write_json(&path, &dataset)?;
            let counts = &dataset.metadata.counts;
            info!(
                "Wrote {} states, {} regions and {} cities to {}",
                counts.states, counts.regions, counts.cities, path.display(),
            );
        }
        Command::De { output: path, profile, min_population } => {
            let profile = CountryProfile::builtin_or_load(Country::Germany, profile.as_deref())
                .context("Failed to load country profile")?;
            let dataset = de::harvest(&profile, min_population).await
                .context("Failed to build the Germany dataset")?;
            output::write_json(&path, &dataset)?;
            let counts = &dataset.metadata.records;
            info!(
                "Wrote {} regions and {} cities to {}",
                counts.total_regions, counts.cities, path.display(),
            );
        }
    }

    Ok(())
}
