mod io;
mod reproject;
mod sjoin;

pub use io::{read_layer, read_table};
pub use sjoin::spatial_join;

use anyhow::{ensure, Context, Result};
use geo::{BoundingRect, Geometry, Rect};
use polars::{frame::DataFrame, prelude::{DataType, IdxCa, IdxSize}};

use crate::crs::Crs;

/// Name of the temporary row-index column used to keep geometries aligned through joins.
pub(crate) const ROW_INDEX: &str = "__row";

/// An attribute table whose rows are paired 1:1 with geometries.
#[derive(Debug, Clone)]
pub struct Layer {
    name: String,
    crs: Option<Crs>,
    geoms: Vec<Geometry<f64>>,
    data: DataFrame,
}

impl Layer {
    pub fn new(name: impl Into<String>, crs: Option<Crs>, geoms: Vec<Geometry<f64>>, data: DataFrame) -> Result<Self> {
        let name = name.into();
        ensure!(geoms.len() == data.height(),
            "[layer] {name:?}: {} geometries for {} attribute rows",
            geoms.len(),
            data.height(),
        );

        Ok(Self { name, crs, geoms, data })
    }

    #[inline] pub fn name(&self) -> &str { &self.name }

    #[inline] pub fn crs(&self) -> Option<&Crs> { self.crs.as_ref() }

    #[inline] pub fn geoms(&self) -> &[Geometry<f64>] { &self.geoms }

    #[inline] pub fn data(&self) -> &DataFrame { &self.data }

    #[inline] pub fn len(&self) -> usize { self.geoms.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.geoms.is_empty() }

    /// Replace the attribute table, keeping geometries. Row count must match.
    pub fn with_data(&self, data: DataFrame) -> Result<Self> {
        Layer::new(self.name.clone(), self.crs.clone(), self.geoms.clone(), data)
    }

    /// Bounding rectangle of all geometries, if any are non-empty.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.geoms.iter()
            .filter_map(|geom| geom.bounding_rect())
            .reduce(|a, b| Rect::new(
                (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
                (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
            ))
    }

    /// Keep only the rows whose original positions appear in `data[ROW_INDEX]`, in that order,
    /// then drop the index column. Used after polars operations that reorder or filter rows.
    pub(crate) fn realign(&self, data: DataFrame) -> Result<Self> {
        let rows = data.column(ROW_INDEX)
            .with_context(|| format!("[layer] {:?}: missing row index after join", self.name))?
            .cast(&DataType::UInt64)?;

        let geoms = rows.u64()?
            .into_iter()
            .map(|row| {
                let row = row.context("[layer] null row index")? as usize;
                self.geoms.get(row).cloned()
                    .with_context(|| format!("[layer] row index {row} out of range"))
            })
            .collect::<Result<Vec<_>>>()?;

        Layer::new(self.name.clone(), self.crs.clone(), geoms, data.drop(ROW_INDEX)?)
    }

    /// Select rows by position, repeating as requested.
    pub(crate) fn take(&self, rows: &[IdxSize]) -> Result<Self> {
        let data = self.data.take(&IdxCa::from_vec("".into(), rows.to_vec()))?;
        let geoms = rows.iter()
            .map(|&row| self.geoms[row as usize].clone())
            .collect();

        Layer::new(self.name.clone(), self.crs.clone(), geoms, data)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};
    use polars::prelude::*;

    /// Axis-aligned square as a geometry.
    pub(crate) fn square(x: f64, y: f64, size: f64) -> Geometry<f64> {
        Geometry::MultiPolygon(MultiPolygon(vec![polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
            (x: x, y: y),
        ]]))
    }

    fn sample() -> Layer {
        let data = DataFrame::new(vec![
            Column::new("name".into(), &["a", "b", "c"]),
        ]).unwrap();
        let geoms = vec![square(0.0, 0.0, 1.0), square(5.0, 5.0, 2.0), square(-3.0, 1.0, 1.0)];
        Layer::new("sample", Some(Crs::ITM), geoms, data).unwrap()
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let data = DataFrame::new(vec![Column::new("name".into(), &["a"])]).unwrap();
        assert!(Layer::new("bad", None, vec![], data).is_err());
    }

    #[test]
    fn bounds_cover_all_geometries() {
        let bounds = sample().bounds().unwrap();
        assert_eq!(bounds.min(), geo::coord! { x: -3.0, y: 0.0 });
        assert_eq!(bounds.max(), geo::coord! { x: 7.0, y: 7.0 });
    }

    #[test]
    fn take_repeats_rows_with_geometries() {
        let layer = sample().take(&[2, 0, 2]).unwrap();
        assert_eq!(layer.len(), 3);
        let names = layer.data().column("name").unwrap().str().unwrap()
            .into_iter().map(|s| s.unwrap().to_string()).collect::<Vec<_>>();
        assert_eq!(names, ["c", "a", "c"]);
        assert_eq!(layer.geoms()[0], square(-3.0, 1.0, 1.0));
        assert_eq!(layer.geoms()[1], square(0.0, 0.0, 1.0));
    }
}
