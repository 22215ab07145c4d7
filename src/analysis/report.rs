use std::fmt;

use polars::frame::DataFrame;

use super::DuplicateWards;

/// Everything the run prints to the console.
#[derive(Debug, Clone)]
pub struct Report {
    pub population_by_county: DataFrame,
    pub counties_per_ward: DataFrame,
    pub duplicates: DuplicateWards,
    pub max_population_wards: DataFrame,
    pub min_population_wards: DataFrame,
    pub bus_per_capita: DataFrame,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Population by county:")?;
        writeln!(f, "{}", self.population_by_county)?;

        writeln!(f, "Counties per ward:")?;
        writeln!(f, "{}", self.counties_per_ward)?;

        writeln!(f, "Wards in more than one county:")?;
        writeln!(f, "{}", self.duplicates.wards)?;
        writeln!(f, "population of wards that are not unique is: {}", self.duplicates.population)?;

        writeln!(f, "the ward with the maximum population is:")?;
        writeln!(f, "{}", self.max_population_wards)?;
        writeln!(f, "the ward with the minimum population is:")?;
        writeln!(f, "{}", self.min_population_wards)?;

        writeln!(f, "Bus stops per capita:")?;
        write!(f, "{}", self.bus_per_capita.head(Some(5)))
    }
}
