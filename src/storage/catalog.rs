//! Catalog aggregation
//!
//! The catalog is written once per run, after every backend has returned.
//! Row order follows completion order and carries no meaning.

use anyhow::{Context, Result};
use std::path::Path;

use crate::processing::ObjectRecord;

/// Flatten per-frame record lists and write them as one catalog.
///
/// Returns the number of rows written.
pub fn aggregate(lists: Vec<Vec<ObjectRecord>>, path: &Path) -> Result<usize> {
    let records: Vec<ObjectRecord> = lists.into_iter().flatten().collect();
    write_catalog(&records, path)?;
    tracing::info!(rows = records.len(), path = %path.display(), "Catalog written");
    Ok(records.len())
}

/// Serialize records as CSV, header first even when there are no rows
pub fn write_catalog(records: &[ObjectRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating catalog directory {}", parent.display()))?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("creating catalog {}", path.display()))?;

    writer.write_record(ObjectRecord::HEADERS)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .flush()
        .with_context(|| format!("writing catalog {}", path.display()))?;

    Ok(())
}

pub fn read_catalog(path: &Path) -> Result<Vec<ObjectRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening catalog {}", path.display()))?;
    reader
        .deserialize()
        .collect::<Result<Vec<ObjectRecord>, _>>()
        .with_context(|| format!("parsing catalog {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(object_id: u64, origin: &str) -> ObjectRecord {
        ObjectRecord {
            object_id,
            x: 1.5,
            y: 2.5,
            origin: origin.to_string(),
            flux: 100.0,
            npix: 5,
        }
    }

    #[test]
    fn test_aggregate_flattens_lists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("objects.csv");

        let lists = vec![
            vec![record(1, "A"), record(2, "A")],
            vec![],
            vec![record(1, "B")],
        ];
        let rows = aggregate(lists, &path).unwrap();

        assert_eq!(rows, 3);
        let catalog = read_catalog(&path).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog[2], record(1, "B"));
    }

    #[test]
    fn test_header_comes_first() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("objects.csv");
        write_catalog(&[record(3, "A")], &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Object_ID,X,Y,origin,Flux,Npix"));
        assert!(lines.next().unwrap().starts_with("3,1.5,2.5,A,"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_empty_catalog_still_has_header() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("objects.csv");
        aggregate(Vec::new(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_end(), "Object_ID,X,Y,origin,Flux,Npix");
        assert!(read_catalog(&path).unwrap().is_empty());
    }
}
