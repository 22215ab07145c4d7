use anyhow::{Context, Result};
use geo::{Coord, MapCoords};

use crate::{crs::{Crs, Transformer}, error::AnalysisError};
use super::Layer;

impl Layer {
    /// Return a copy of this layer with every geometry transformed into `target`.
    pub fn to_crs(&self, target: &Crs) -> Result<Layer> {
        let source = self.crs.as_ref()
            .ok_or_else(|| AnalysisError::MissingCrs { layer: self.name.clone() })?;

        if source == target {
            return Ok(self.clone());
        }

        let transformer = Transformer::new(source, target)?;
        let geoms = self.geoms.iter()
            .map(|geom| geom.try_map_coords(|coord: Coord<f64>| transformer.apply(coord)))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("[to_crs] {:?}: {source} -> {target}", self.name))?;

        log::info!("reprojected {} ({} features) {source} -> {target}", self.name, geoms.len());

        Layer::new(self.name.clone(), Some(target.clone()), geoms, self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, Geometry, Point};
    use polars::prelude::*;

    use crate::layer::tests::square;

    fn layer(crs: Option<Crs>, geoms: Vec<Geometry<f64>>) -> Layer {
        let names = (0..geoms.len()).map(|i| format!("g{i}")).collect::<Vec<_>>();
        let data = DataFrame::new(vec![Column::new("name".into(), names)]).unwrap();
        Layer::new("test", crs, geoms, data).unwrap()
    }

    #[test]
    fn reprojects_lonlat_to_itm() {
        let source = layer(Some(Crs::WGS84), vec![Geometry::Point(Point::new(-8.0, 53.5))]);
        let projected = source.to_crs(&Crs::ITM).unwrap();

        assert_eq!(projected.crs(), Some(&Crs::ITM));
        let Geometry::Point(p) = &projected.geoms()[0] else { panic!("expected a point") };
        assert!((p.x() - 600_000.0).abs() < 1.0);
        assert!((p.y() - 750_000.0).abs() < 1.0);
        assert!(projected.data().equals(source.data()));
    }

    #[test]
    fn projected_area_is_metric() {
        // A 0.01 degree square near the ITM origin covers roughly 660 m x 1110 m.
        let source = layer(Some(Crs::WGS84), vec![square(-8.0, 53.5, 0.01)]);
        let area = source.to_crs(&Crs::ITM).unwrap().geoms()[0].unsigned_area();
        assert!(area > 600_000.0 && area < 800_000.0, "area = {area}");
    }

    #[test]
    fn same_crs_is_a_copy() {
        let source = layer(Some(Crs::ITM), vec![square(0.0, 0.0, 10.0)]);
        let copy = source.to_crs(&Crs::ITM).unwrap();
        assert_eq!(copy.geoms(), source.geoms());
    }

    #[test]
    fn unknown_crs_cannot_be_reprojected() {
        let source = layer(None, vec![square(0.0, 0.0, 1.0)]);
        let err = source.to_crs(&Crs::ITM).unwrap_err();
        assert_eq!(
            err.downcast_ref::<AnalysisError>(),
            Some(&AnalysisError::MissingCrs { layer: "test".into() }),
        );
    }
}
