use anyhow::{Context, Result};
use geo::Area;
use polars::prelude::{Column, DataFrame, DataType, NamedFrom};

use crate::{error::AnalysisError, layer::Layer};
use super::columns::{AREA, BUS_PER_CAPITA, DENSITY, NUM_BUS, POPULATION, WARD, WARD_CODE};

/// Add an `area` column: planar area of each geometry in the layer CRS's square units.
pub fn with_area(layer: &Layer) -> Result<Layer> {
    let crs = layer.crs()
        .ok_or_else(|| AnalysisError::MissingCrs { layer: layer.name().into() })?;
    if crs.is_geographic() {
        return Err(AnalysisError::GeographicArea { layer: layer.name().into() }.into());
    }

    let areas = layer.geoms().iter()
        .map(|geom| geom.unsigned_area())
        .collect::<Vec<f64>>();

    let mut data = layer.data().clone();
    data.with_column(Column::new(AREA.into(), areas))?;

    let anomalies = zero_area_rows(&data)?;
    if !anomalies.is_empty() {
        log::warn!("{}: {} zero-area rows: {:?}", layer.name(), anomalies.len(), anomalies);
    }

    layer.with_data(data)
}

/// Add `density = Population / area`. A zero area is a `DivisionByZero` error.
pub fn with_density(layer: &Layer) -> Result<Layer> {
    let data = divide(layer.data(), POPULATION, AREA, DENSITY)?;
    layer.with_data(data)
}

/// Add `Bus_Per_Capita = Population / NumBus`. A zero bus count is a `DivisionByZero` error.
pub fn with_bus_per_capita(layer: &Layer) -> Result<Layer> {
    let data = divide(layer.data(), POPULATION, NUM_BUS, BUS_PER_CAPITA)?;
    layer.with_data(data)
}

/// Parse the `NumBus` column into `Int64`. Text must be a plain integer (surrounding whitespace
/// allowed); nulls and anything else fail with `InvalidCount`.
pub fn coerce_bus_counts(df: &DataFrame) -> Result<DataFrame> {
    let column = df.column(NUM_BUS)
        .with_context(|| format!("[coerce_bus_counts] missing column {NUM_BUS:?}"))?;

    let counts = if column.dtype() == &DataType::String {
        column.str()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| value
                .and_then(|text| text.trim().parse::<i64>().ok())
                .ok_or_else(|| AnalysisError::InvalidCount {
                    column: NUM_BUS.into(),
                    row,
                    value: value.map(str::to_owned),
                }))
            .collect::<Result<Vec<i64>, _>>()?
    } else {
        let cast = column.cast(&DataType::Int64)?;
        cast.i64()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| value.ok_or_else(|| AnalysisError::InvalidCount {
                column: NUM_BUS.into(),
                row,
                value: None,
            }))
            .collect::<Result<Vec<i64>, _>>()?
    };

    let mut df = df.clone();
    df.with_column(Column::new(NUM_BUS.into(), counts))?;
    Ok(df)
}

/// Row positions whose `area` is exactly zero.
pub fn zero_area_rows(df: &DataFrame) -> Result<Vec<usize>> {
    Ok(float_values(df, AREA)?
        .into_iter()
        .enumerate()
        .filter_map(|(row, area)| (area == Some(0.0)).then_some(row))
        .collect())
}

/// Read a numeric column as `f64`, casting if necessary.
pub(crate) fn float_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)
        .with_context(|| format!("missing column {name:?}"))?;

    let column = if column.dtype() != &DataType::Float64 {
        column.cast(&DataType::Float64)?
    } else {
        column.clone()
    };

    let values = column.f64()
        .with_context(|| format!("column {name:?} is not numeric"))?;
    Ok(values.into_iter().collect())
}

/// `out = numerator / denominator`, row by row. Nulls propagate; a zero denominator is an error
/// naming the row and, when available, its ward.
fn divide(df: &DataFrame, numerator: &str, denominator: &str, out: &str) -> Result<DataFrame> {
    let num = float_values(df, numerator)
        .with_context(|| format!("[{out}] numerator"))?;
    let den = float_values(df, denominator)
        .with_context(|| format!("[{out}] denominator"))?;

    let row_key = |row: usize| -> String {
        [WARD_CODE, WARD].iter()
            .find_map(|&key| df.column(key).ok()
                .and_then(|col| col.str().ok())
                .and_then(|values| values.get(row))
                .map(|value| format!("{key} {value}")))
            .unwrap_or_else(|| format!("row {row}"))
    };

    let quotient = num.iter().zip(den.iter()).enumerate()
        .map(|(row, (n, d))| match (n, d) {
            (_, Some(d)) if *d == 0.0 => Err(AnalysisError::DivisionByZero {
                column: out.into(),
                row,
                key: row_key(row),
            }),
            (Some(n), Some(d)) => Ok(Some(n / d)),
            _ => Ok(None),
        })
        .collect::<Result<Vec<Option<f64>>, _>>()?;

    let mut df = df.clone();
    df.with_column(Column::new(out.into(), quotient))?;
    Ok(df)
}
