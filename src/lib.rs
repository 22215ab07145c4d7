#![doc = "Ward population and transport analysis for Northern Ireland boundary data"]
mod analysis;
mod config;
mod crs;
mod error;
mod layer;
mod pipeline;
mod render;

#[doc(inline)]
pub use analysis::{
    attribute_join, coerce_bus_counts, columns, counties_per_ward, duplicate_wards,
    max_population_wards, min_population_wards, population_by_county, with_area,
    with_bus_per_capita, with_density, zero_area_rows, DuplicateWards, Report,
};

#[doc(inline)]
pub use config::{Config, MapStyle};

#[doc(inline)]
pub use crs::{Crs, Transformer};

#[doc(inline)]
pub use error::AnalysisError;

#[doc(inline)]
pub use layer::{read_layer, read_table, spatial_join, Layer};

#[doc(inline)]
pub use pipeline::{analyse, load, run, Analysis, Inputs};

#[doc(inline)]
pub use render::render_map;
