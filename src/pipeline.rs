//! Stage sequencing: load, reproject, derive, join, aggregate, render.

use anyhow::{Context, Result};
use polars::frame::DataFrame;

use crate::{
    analysis::{self, columns::WARD_CODE, Report},
    config::Config,
    layer::{read_layer, read_table, spatial_join, Layer},
    render::render_map,
};

/// Raw inputs as read from disk.
#[derive(Debug, Clone)]
pub struct Inputs {
    /// Loaded and validated, not analysed further.
    pub roads: Layer,
    pub counties: Layer,
    pub wards: Layer,
    pub transport: DataFrame,
}

/// Reprojected layers and everything computed from them.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub counties: Layer,
    /// Wards with `area` and `density`.
    pub wards: Layer,
    /// Wards joined with transport, with `Bus_Per_Capita`.
    pub transport: Layer,
    /// Counties ⋈ wards on intersection.
    pub county_wards: Layer,
    pub report: Report,
}

pub fn load(config: &Config) -> Result<Inputs> {
    let roads = read_layer(&config.roads_path())?;
    let counties = read_layer(&config.counties_path())?;
    let wards = read_layer(&config.wards_path())?;
    let transport = read_table(&config.transport_path())?;

    log::info!(
        "loaded {} roads, {} counties, {} wards, {} transport rows",
        roads.len(), counties.len(), wards.len(), transport.height(),
    );

    Ok(Inputs { roads, counties, wards, transport })
}

/// Run every analysis stage on already-loaded inputs.
pub fn analyse(inputs: &Inputs, config: &Config) -> Result<Analysis> {
    let target = &config.target_crs;
    let counties = inputs.counties.to_crs(target)?;
    let wards = inputs.wards.to_crs(target)?;
    log::info!("reprojected counties and wards to {target}");

    let wards = analysis::with_density(&analysis::with_area(&wards)?)?;
    log::debug!("derived area and density for {} wards", wards.len());

    let transport = analysis::attribute_join(&wards, &inputs.transport, WARD_CODE)?;
    let transport = transport.with_data(analysis::coerce_bus_counts(transport.data())?)?;
    let transport = analysis::with_bus_per_capita(&transport)?;

    let county_wards = spatial_join(&counties, &wards)?;

    let report = Report {
        population_by_county: analysis::population_by_county(&county_wards)?,
        counties_per_ward: analysis::counties_per_ward(&county_wards)?,
        duplicates: analysis::duplicate_wards(&county_wards, &wards)?,
        max_population_wards: analysis::max_population_wards(&wards)?,
        min_population_wards: analysis::min_population_wards(&wards)?,
        bus_per_capita: transport.data().clone(),
    };
    log::info!(
        "aggregated {} county/ward pairs into {} counties",
        county_wards.len(), report.population_by_county.height(),
    );

    Ok(Analysis { counties, wards, transport, county_wards, report })
}

/// Load inputs, analyse them, write the map and return the report.
pub fn run(config: &Config) -> Result<Report> {
    let inputs = load(config)?;
    let analysis = analyse(&inputs, config)?;

    render_map(&analysis.wards, &analysis.counties, &config.style, config.output_path())
        .with_context(|| format!("[run] failed to render {}", config.output_path().display()))?;

    Ok(analysis.report)
}
