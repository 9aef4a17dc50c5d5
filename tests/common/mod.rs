//! Shared fixtures: synthetic FITS frames on disk

#![allow(dead_code)]

use fitsweep::astro::{fits::write_image, synthetic_frame};
use fitsweep::frames::InputFile;
use fitsweep::parallel::Reporter;
use fitsweep::processing::{FileOutcome, ObjectRecord};
use std::path::Path;
use std::sync::Mutex;

/// Two well separated point sources
pub const TWO_SOURCES: &[(f64, f64, f64)] = &[(12.0, 6.0, 200.0), (40.0, 20.0, 300.0)];

pub fn write_frame(dir: &Path, name: &str, sources: &[(f64, f64, f64)]) {
    let image = synthetic_frame(64, 32, 100.0, sources);
    write_image(&dir.join(name), &image).unwrap();
}

pub fn write_frames(dir: &Path, names: &[&str]) {
    for name in names {
        write_frame(dir, name, TWO_SOURCES);
    }
}

/// Catalog rows sorted so runs can be compared as sets
pub fn sorted(mut records: Vec<ObjectRecord>) -> Vec<ObjectRecord> {
    records.sort_by(|a, b| (&a.origin, a.object_id).cmp(&(&b.origin, b.object_id)));
    records
}

#[derive(Default)]
pub struct RecordingReporter {
    pub finished: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<(String, String)>>,
}

impl Reporter for RecordingReporter {
    fn file_finished(&self, _worker: usize, file: &InputFile, outcome: &FileOutcome) {
        self.finished.lock().unwrap().push(file.name.clone());
        if let Err(e) = outcome {
            self.errors
                .lock()
                .unwrap()
                .push((file.name.clone(), e.to_string()));
        }
    }
}
