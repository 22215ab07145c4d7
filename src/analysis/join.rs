use anyhow::{Context, Result};
use polars::prelude::{DataFrame, DataFrameJoinOps, SortMultipleOptions};

use crate::layer::{Layer, ROW_INDEX};

/// Inner equi-join of a layer's attributes with a plain table on `key`.
///
/// Rows without a match on either side are dropped. Left row order is kept and geometries follow
/// their rows. On name collisions the layer's column keeps its name and the table's column gets
/// the `_right` suffix; the table's key column is merged into the layer's.
pub fn attribute_join(layer: &Layer, table: &DataFrame, key: &str) -> Result<Layer> {
    layer.data().column(key)
        .with_context(|| format!("[attribute_join] {:?}: missing key column {key:?}", layer.name()))?;
    table.column(key)
        .with_context(|| format!("[attribute_join] table: missing key column {key:?}"))?;

    let indexed = layer.data().with_row_index(ROW_INDEX.into(), None)?;
    let joined = indexed.inner_join(table, [key], [key])?
        .sort([ROW_INDEX], SortMultipleOptions::default().with_maintain_order(true))?;

    let joined = layer.realign(joined)?;
    let dropped = layer.len().saturating_sub(joined.len());
    if dropped > 0 {
        log::warn!("{}: {dropped} rows without a {key:?} match were dropped", layer.name());
    }
    log::info!("joined {} with table on {key:?}: {} rows", layer.name(), joined.len());

    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    use crate::{crs::Crs, layer::tests::square};

    fn wards() -> Layer {
        let data = DataFrame::new(vec![
            Column::new("Ward Code".into(), &["W1", "W2", "W3", "W4"]),
            Column::new("Ward".into(), &["Abbey", "Ballysally", "Castle", "Dunmore"]),
        ]).unwrap();
        let geoms = (0..4).map(|i| square(i as f64, 0.0, 1.0)).collect();
        Layer::new("wards", Some(Crs::ITM), geoms, data).unwrap()
    }

    #[test]
    fn inner_join_keeps_only_shared_codes() {
        let transport = DataFrame::new(vec![
            Column::new("Ward Code".into(), &["W4", "W2", "X9"]),
            Column::new("NumBus".into(), &["3", "8", "1"]),
            Column::new("Ward".into(), &["dunmore", "ballysally", "elsewhere"]),
        ]).unwrap();

        let joined = attribute_join(&wards(), &transport, "Ward Code").unwrap();
        assert_eq!(joined.len(), 2);
        assert_eq!(joined.data().get_column_names_str(), ["Ward Code", "Ward", "NumBus", "Ward_right"]);

        let codes = joined.data().column("Ward Code").unwrap().str().unwrap()
            .into_iter().flatten().collect::<Vec<_>>();
        assert_eq!(codes, ["W2", "W4"]);
        let wards = joined.data().column("Ward").unwrap().str().unwrap()
            .into_iter().flatten().collect::<Vec<_>>();
        assert_eq!(wards, ["Ballysally", "Dunmore"]);
        assert_eq!(joined.geoms(), [square(1.0, 0.0, 1.0), square(3.0, 0.0, 1.0)]);
    }

    #[test]
    fn codes_match_exactly() {
        let transport = DataFrame::new(vec![
            Column::new("Ward Code".into(), &["w1", " W2", "W3"]),
            Column::new("NumBus".into(), &["1", "2", "3"]),
        ]).unwrap();

        let joined = attribute_join(&wards(), &transport, "Ward Code").unwrap();
        assert_eq!(joined.len(), 1);
    }
}
