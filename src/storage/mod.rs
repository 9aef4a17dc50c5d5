//! Output tree management and spectrum persistence
//!
//! Layout:
//! ```text
//! <parent>/objects.csv              catalog
//! <parent>/<output_dir>/<origin>/   one directory per frame
//!     <object_id>.csv               one spectrum per object
//! ```

use anyhow::Context;
use std::io;
use std::path::{Path, PathBuf};

use crate::processing::{Spectrum, SpectrumStore};

pub mod catalog;

pub use catalog::{aggregate, read_catalog, write_catalog};

/// Delete and recreate `path` so that it exists and is empty.
///
/// Safe to call repeatedly. A plain file sitting at `path` is replaced too.
pub fn reset_directory(path: &Path) -> io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path)?,
        Ok(_) => std::fs::remove_file(path)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    std::fs::create_dir_all(path)
}

/// The catalog sits next to the output directory, not inside it.
///
/// Paths without a final name (`.`, `..`, `/`) go through `..` literally.
pub fn catalog_path(output_dir: &Path, catalog_name: &str) -> PathBuf {
    match (output_dir.file_name(), output_dir.parent()) {
        (Some(_), Some(parent)) => parent.join(catalog_name),
        _ => output_dir.join("..").join(catalog_name),
    }
}

/// Writes each spectrum as a two-column CSV (`index,flux`)
#[derive(Debug, Clone)]
pub struct CsvSpectrumStore {
    extension: String,
}

impl CsvSpectrumStore {
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn spectrum_path(&self, object_id: u64, subdir: &Path) -> PathBuf {
        subdir.join(format!("{object_id}.{}", self.extension))
    }
}

impl SpectrumStore for CsvSpectrumStore {
    fn persist(
        &self,
        spectrum: &Spectrum,
        object_id: u64,
        subdir: &Path,
    ) -> anyhow::Result<PathBuf> {
        let path = self.spectrum_path(object_id, subdir);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("creating {}", path.display()))?;

        writer.write_record(["index", "flux"])?;
        for (index, value) in spectrum.iter().enumerate() {
            writer.write_record([index.to_string(), value.to_string()])?;
        }
        writer.flush()?;

        Ok(path)
    }
}

/// Read a spectrum written by [`CsvSpectrumStore`]
pub fn read_spectrum(path: &Path) -> anyhow::Result<Spectrum> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let mut spectrum = Vec::new();
    for row in reader.records() {
        let row = row?;
        let value = row.get(1).context("spectrum row without flux column")?;
        spectrum.push(value.parse::<f64>().context("parsing flux")?);
    }
    Ok(spectrum)
}
