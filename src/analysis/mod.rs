mod aggregate;
mod derive;
mod join;
mod report;

pub use aggregate::{counties_per_ward, duplicate_wards, max_population_wards, min_population_wards, population_by_county, DuplicateWards};
pub use derive::{coerce_bus_counts, with_area, with_bus_per_capita, with_density, zero_area_rows};
pub use join::attribute_join;
pub(crate) use derive::float_values;
pub use report::Report;

/// Attribute names used by the source layers and the derived columns.
pub mod columns {
    pub const COUNTY_NAME: &str = "CountyName";
    pub const WARD: &str = "Ward";
    pub const WARD_CODE: &str = "Ward Code";
    pub const POPULATION: &str = "Population";
    pub const NUM_BUS: &str = "NumBus";

    pub const AREA: &str = "area";
    pub const DENSITY: &str = "density";
    pub const BUS_PER_CAPITA: &str = "Bus_Per_Capita";
    pub const COUNTIES: &str = "counties";
}
