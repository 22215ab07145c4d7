use ahash::{AHashMap, AHashSet};
use anyhow::{bail, Context, Result};
use polars::prelude::{col, lit, Column, DataFrame, DataType, IntoLazy, NamedFrom, SortMultipleOptions};

use crate::layer::Layer;
use super::{columns::{COUNTIES, COUNTY_NAME, POPULATION, WARD}, derive::float_values};

/// Wards that intersect more than one county, and their combined population counted once each.
#[derive(Debug, Clone)]
pub struct DuplicateWards {
    pub wards: DataFrame,
    pub population: f64,
}

impl DuplicateWards {
    /// Ward names in order.
    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self.wards.column(WARD)?.str()?
            .into_iter()
            .flatten()
            .map(str::to_owned)
            .collect())
    }
}

/// Find `name` in a join result, accepting the `_left`/`_right` forms a collision produces.
fn resolve(df: &DataFrame, name: &str) -> Result<String> {
    [name.to_string(), format!("{name}_right"), format!("{name}_left")]
        .into_iter()
        .find(|candidate| df.column(candidate).is_ok())
        .with_context(|| format!("missing column {name:?}"))
}

/// Sum population per county over a county ⋈ ward join, sorted by county name.
pub fn population_by_county(join: &Layer) -> Result<DataFrame> {
    let county = resolve(join.data(), COUNTY_NAME)?;
    let population = resolve(join.data(), POPULATION)?;

    let summed = join.data().clone().lazy()
        .select([
            col(county.as_str()).alias(COUNTY_NAME),
            col(population.as_str()).cast(DataType::Float64).alias(POPULATION),
        ])
        .group_by([col(COUNTY_NAME)])
        .agg([col(POPULATION).sum()])
        .sort([COUNTY_NAME], SortMultipleOptions::default())
        .collect()
        .context("[population_by_county] aggregation failed")?;

    Ok(summed)
}

/// Number of distinct counties each ward appears in, sorted by ward name.
pub fn counties_per_ward(join: &Layer) -> Result<DataFrame> {
    let ward = resolve(join.data(), WARD)?;
    let county = resolve(join.data(), COUNTY_NAME)?;

    let wards = join.data().column(&ward)?.str()
        .with_context(|| format!("[counties_per_ward] {ward:?} is not text"))?;
    let counties = join.data().column(&county)?.str()
        .with_context(|| format!("[counties_per_ward] {county:?} is not text"))?;

    let mut seen: AHashMap<&str, AHashSet<&str>> = AHashMap::new();
    for (ward, county) in wards.into_iter().zip(counties.into_iter()) {
        let (Some(ward), Some(county)) = (ward, county) else { continue };
        seen.entry(ward).or_default().insert(county);
    }

    let mut counts = seen.into_iter()
        .map(|(ward, counties)| (ward, counties.len() as u32))
        .collect::<Vec<_>>();
    counts.sort_unstable();

    Ok(DataFrame::new(vec![
        Column::new(WARD.into(), counts.iter().map(|(ward, _)| *ward).collect::<Vec<_>>()),
        Column::new(COUNTIES.into(), counts.iter().map(|(_, n)| *n).collect::<Vec<_>>()),
    ])?)
}

/// Wards appearing in more than one county of the join, with the population they carry in the
/// ward table (each ward once, however many counties it touches).
pub fn duplicate_wards(join: &Layer, wards: &Layer) -> Result<DuplicateWards> {
    let duplicated = counties_per_ward(join)?.lazy()
        .filter(col(COUNTIES).gt(lit(1u32)))
        .collect()?;

    let names = duplicated.column(WARD)?.str()?
        .into_iter()
        .flatten()
        .collect::<AHashSet<_>>();

    let ward_names = wards.data().column(WARD)?.str()
        .with_context(|| format!("[duplicate_wards] {WARD:?} is not text"))?;
    let population = ward_names.into_iter()
        .zip(float_values(wards.data(), POPULATION)?)
        .filter(|(ward, _)| ward.is_some_and(|ward| names.contains(ward)))
        .filter_map(|(_, population)| population)
        .sum::<f64>();

    if !names.is_empty() {
        log::warn!("{} wards intersect more than one county", names.len());
    }

    Ok(DuplicateWards { wards: duplicated, population })
}

/// Every ward whose population equals the maximum.
pub fn max_population_wards(wards: &Layer) -> Result<DataFrame> {
    population_extreme(wards, true)
}

/// Every ward whose population equals the minimum.
pub fn min_population_wards(wards: &Layer) -> Result<DataFrame> {
    population_extreme(wards, false)
}

fn population_extreme(wards: &Layer, max: bool) -> Result<DataFrame> {
    if wards.is_empty() {
        bail!("[population_extreme] {:?} has no rows", wards.name());
    }

    let population = col(POPULATION);
    let extreme = if max { population.clone().max() } else { population.clone().min() };

    Ok(wards.data().clone().lazy()
        .filter(population.eq(extreme))
        .collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{crs::Crs, layer::tests::square};

    fn join(rows: &[(&str, &str, f64)]) -> Layer {
        let data = DataFrame::new(vec![
            Column::new(COUNTY_NAME.into(), rows.iter().map(|r| r.0).collect::<Vec<_>>()),
            Column::new(WARD.into(), rows.iter().map(|r| r.1).collect::<Vec<_>>()),
            Column::new(POPULATION.into(), rows.iter().map(|r| r.2).collect::<Vec<_>>()),
        ]).unwrap();
        let geoms = rows.iter().map(|_| square(0.0, 0.0, 1.0)).collect();
        Layer::new("join", Some(Crs::ITM), geoms, data).unwrap()
    }

    fn wards(rows: &[(&str, f64)]) -> Layer {
        let data = DataFrame::new(vec![
            Column::new(WARD.into(), rows.iter().map(|r| r.0).collect::<Vec<_>>()),
            Column::new(POPULATION.into(), rows.iter().map(|r| r.1).collect::<Vec<_>>()),
        ]).unwrap();
        let geoms = rows.iter().map(|_| square(0.0, 0.0, 1.0)).collect();
        Layer::new("wards", Some(Crs::ITM), geoms, data).unwrap()
    }

    fn text(df: &DataFrame, name: &str) -> Vec<String> {
        df.column(name).unwrap().str().unwrap().into_iter().flatten().map(str::to_owned).collect()
    }

    #[test]
    fn sums_population_per_county() {
        let joined = join(&[("Down", "a", 10.0), ("Antrim", "b", 5.0), ("Down", "c", 7.0)]);
        let summed = population_by_county(&joined).unwrap();

        assert_eq!(text(&summed, COUNTY_NAME), ["Antrim", "Down"]);
        assert_eq!(float_values(&summed, POPULATION).unwrap(), [Some(5.0), Some(17.0)]);
    }

    #[test]
    fn resolves_suffixed_population() {
        let joined = join(&[("Down", "a", 10.0)]);
        let mut data = joined.data().clone();
        data.rename(POPULATION, "Population_right".into()).unwrap();
        let summed = population_by_county(&joined.with_data(data).unwrap()).unwrap();
        assert_eq!(float_values(&summed, POPULATION).unwrap(), [Some(10.0)]);
    }

    #[test]
    fn duplicate_wards_counted_once() {
        let joined = join(&[("Down", "a", 10.0), ("Armagh", "a", 10.0), ("Down", "b", 4.0), ("Down", "b", 4.0)]);
        let counts = counties_per_ward(&joined).unwrap();
        assert_eq!(text(&counts, WARD), ["a", "b"]);

        let duplicates = duplicate_wards(&joined, &wards(&[("a", 10.0), ("b", 4.0)])).unwrap();
        assert_eq!(duplicates.names().unwrap(), ["a"]);
        assert_eq!(duplicates.population, 10.0);
    }

    #[test]
    fn extremes_return_all_ties() {
        let layer = wards(&[("a", 5.0), ("b", 9.0), ("c", 1.0), ("d", 9.0), ("e", 1.0)]);
        assert_eq!(text(&max_population_wards(&layer).unwrap(), WARD), ["b", "d"]);
        assert_eq!(text(&min_population_wards(&layer).unwrap(), WARD), ["c", "e"]);
    }
}
