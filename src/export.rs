//! Flat entity-to-cluster export.

use std::io::Write;

use serde::Serialize;

use crate::cluster::ClusterSet;
use crate::error::ExportError;

/// Fixed CSV header of the export.
pub const EXPORT_HEADER: [&str; 4] = ["entity_id", "cluster_id", "cluster_number", "cluster_size"];

/// One (cluster, member) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    /// Member id.
    pub entity_id: String,
    /// Cluster stable key.
    pub cluster_id: String,
    /// 1-based cluster rank.
    #[serde(rename = "cluster_number")]
    pub cluster_rank: usize,
    /// Members in the cluster.
    pub cluster_size: usize,
}

/// Flattens clusters into rows, cluster order then member order.
#[must_use]
pub fn export_rows(set: &ClusterSet) -> Vec<ExportRow> {
    set.iter()
        .flat_map(|cluster| {
            cluster.entity_ids.iter().map(move |id| ExportRow {
                entity_id: id.to_string(),
                cluster_id: cluster.stable_key.clone(),
                cluster_rank: cluster.rank,
                cluster_size: cluster.size,
            })
        })
        .collect()
}

/// Writes the export as CSV. The header is written even for an empty set.
///
/// # Errors
///
/// Returns [`ExportError`] when the writer fails.
pub fn write_csv<W: Write>(set: &ClusterSet, writer: W) -> Result<(), ExportError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(EXPORT_HEADER)?;
    for row in export_rows(set) {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Renders the export as a CSV string.
///
/// # Errors
///
/// Returns [`ExportError`] when serialization fails.
pub fn to_csv_string(set: &ClusterSet) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_csv(set, &mut buf)?;
    String::from_utf8(buf).map_err(|_| ExportError::Utf8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::assemble_clusters;
    use crate::entity::{Attributes, EntityId};
    use crate::record::MatchRecord;

    fn rec(left: &str, right: &str, p: f64) -> MatchRecord {
        MatchRecord {
            left_id: EntityId::parse(left).unwrap(),
            right_id: EntityId::parse(right).unwrap(),
            probability: p,
            left_attrs: Attributes::new(),
            right_attrs: Attributes::new(),
        }
    }

    #[test]
    fn test_export_rows_one_per_member() {
        let set = assemble_clusters(
            &[rec("A", "B", 0.9), rec("B", "C", 0.8), rec("D", "E", 0.95)],
            0.5,
        )
        .unwrap();
        let rows = export_rows(&set);
        assert_eq!(rows.len(), 5);
        for row in &rows[..3] {
            assert_eq!((row.cluster_rank, row.cluster_size), (1, 3));
        }
        for row in &rows[3..] {
            assert_eq!((row.cluster_rank, row.cluster_size), (2, 2));
        }
        assert_eq!(rows[0].cluster_id, set.clusters()[0].stable_key);
    }

    #[test]
    fn test_csv_header_and_body() {
        let set = assemble_clusters(&[rec("x", "y", 0.9)], 0.5).unwrap();
        let csv = to_csv_string(&set).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("entity_id,cluster_id,cluster_number,cluster_size")
        );
        let key = &set.clusters()[0].stable_key;
        assert_eq!(lines.next(), Some(format!("x,{key},1,2").as_str()));
        assert_eq!(lines.next(), Some(format!("y,{key},1,2").as_str()));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_csv_empty_set_has_header_only() {
        let csv = to_csv_string(&ClusterSet::default()).unwrap();
        assert_eq!(csv, "entity_id,cluster_id,cluster_number,cluster_size\n");
    }

    #[test]
    fn test_csv_quotes_awkward_ids() {
        let set = assemble_clusters(&[rec("a,1", "b\"2", 0.9)], 0.5).unwrap();
        let csv = to_csv_string(&set).unwrap();
        assert!(csv.contains("\"a,1\""));
        assert!(csv.contains("\"b\"\"2\""));
    }
}
