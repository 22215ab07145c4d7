use ahash::AHashSet;
use anyhow::Result;
use geo::{BoundingRect, Intersects, Rect};
use polars::prelude::{Column, DataFrame, IdxSize, NamedFrom};
use rstar::{RTree, RTreeObject, AABB};

use crate::error::AnalysisError;
use super::Layer;

/// Bounding box of one right-hand geometry, indexed by row.
#[derive(Debug, Clone)]
struct BoundingBox {
    idx: usize,
    bbox: Rect<f64>,
}

impl RTreeObject for BoundingBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

/// Inner spatial join on the `intersects` predicate (boundary contact counts).
///
/// Produces one row per intersecting (left, right) pair, ordered by left row then right row.
/// Columns are the left attributes, `index_right`, then the right attributes; names present on
/// both sides are suffixed `_left` / `_right`. The output keeps the left geometries.
pub fn spatial_join(left: &Layer, right: &Layer) -> Result<Layer> {
    let (left_crs, right_crs) = match (left.crs(), right.crs()) {
        (Some(l), Some(r)) => (l, r),
        (None, _) => return Err(AnalysisError::MissingCrs { layer: left.name().into() }.into()),
        (_, None) => return Err(AnalysisError::MissingCrs { layer: right.name().into() }.into()),
    };
    if left_crs != right_crs {
        return Err(AnalysisError::CrsMismatch { left: left_crs.to_string(), right: right_crs.to_string() }.into());
    }

    let rtree = RTree::bulk_load(right.geoms().iter().enumerate()
        .filter_map(|(idx, geom)| geom.bounding_rect().map(|bbox| BoundingBox { idx, bbox }))
        .collect());

    let mut left_rows: Vec<IdxSize> = Vec::new();
    let mut right_rows: Vec<IdxSize> = Vec::new();
    for (i, geom) in left.geoms().iter().enumerate() {
        let Some(rect) = geom.bounding_rect() else { continue };
        let search = AABB::from_corners(rect.min().into(), rect.max().into());

        let mut hits = rtree.locate_in_envelope_intersecting(&search)
            .map(|cand| cand.idx)
            .filter(|&j| geom.intersects(&right.geoms()[j]))
            .collect::<Vec<_>>();
        hits.sort_unstable();

        for j in hits {
            left_rows.push(i as IdxSize);
            right_rows.push(j as IdxSize);
        }
    }

    let joined_left = left.take(&left_rows)?;
    let joined_right = right.take(&right_rows)?;

    let left_names = left.data().get_column_names_str().into_iter().map(str::to_owned).collect::<AHashSet<_>>();
    let right_names = right.data().get_column_names_str().into_iter().map(str::to_owned).collect::<AHashSet<_>>();

    let mut data = joined_left.data().clone();
    for name in left_names.intersection(&right_names) {
        data.rename(name, format!("{name}_left").into())?;
    }

    let mut columns = vec![Column::new(
        "index_right".into(),
        right_rows.iter().map(|&j| j as u64).collect::<Vec<_>>(),
    )];
    for column in joined_right.data().get_columns() {
        let mut column = column.clone();
        if left_names.contains(column.name().as_str()) {
            column.rename(format!("{}_right", column.name()).into());
        }
        columns.push(column);
    }
    let data = data.hstack(&columns)?;

    log::info!("spatial join {} x {}: {} intersecting pairs",
        left.name(), right.name(), data.height());

    Layer::new(format!("{}_{}", left.name(), right.name()), left.crs().cloned(), joined_left.geoms().to_vec(), data)
}
