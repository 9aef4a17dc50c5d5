use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use super::{
    FileError, FileOutcome, FramePreprocessor, ObjectDetector, ObjectRecord, SpectrumExtractor,
    SpectrumStore,
};
use crate::frames::InputFile;

/// Runs the full per-frame pipeline and isolates its failures.
///
/// Any collaborator error, or panic, aborts only the current frame; the caller
/// receives it as `Err(FileError)` and decides how to report it.
pub struct FileProcessor {
    preprocessor: Box<dyn FramePreprocessor>,
    detector: Box<dyn ObjectDetector>,
    extractor: Box<dyn SpectrumExtractor>,
    store: Box<dyn SpectrumStore>,
    cleanup_failed: bool,
}

impl FileProcessor {
    pub fn new(
        preprocessor: Box<dyn FramePreprocessor>,
        detector: Box<dyn ObjectDetector>,
        extractor: Box<dyn SpectrumExtractor>,
        store: Box<dyn SpectrumStore>,
    ) -> Self {
        Self {
            preprocessor,
            detector,
            extractor,
            store,
            cleanup_failed: true,
        }
    }

    /// Whether a failed frame's output subdirectory is removed
    pub fn with_cleanup(mut self, cleanup_failed: bool) -> Self {
        self.cleanup_failed = cleanup_failed;
        self
    }

    pub fn process(&self, file: &InputFile, output_dir: &Path) -> FileOutcome {
        let subdir = output_dir.join(&file.origin);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_stages(file, &subdir)))
            .unwrap_or_else(|payload| Err(FileError::Panicked(panic_message(payload.as_ref()))));

        if outcome.is_err() && self.cleanup_failed {
            remove_partial_output(&subdir);
        }

        outcome
    }

    fn run_stages(&self, file: &InputFile, subdir: &Path) -> FileOutcome {
        let frame = self
            .preprocessor
            .preprocess(&file.path)
            .map_err(FileError::Preprocess)?;

        let detections = self
            .detector
            .detect(&frame.image)
            .map_err(FileError::Detect)?;

        std::fs::create_dir_all(subdir).map_err(|source| FileError::CreateDir {
            path: subdir.to_path_buf(),
            source,
        })?;

        let mut records = Vec::with_capacity(detections.len());
        for detection in detections {
            let object_id = detection.object_id;

            let spectrum = self
                .extractor
                .extract(&frame.image, detection.x, detection.y)
                .map_err(|cause| FileError::Extract { object_id, cause })?;

            self.store
                .persist(&spectrum, object_id, subdir)
                .map_err(|cause| FileError::Persist { object_id, cause })?;

            records.push(ObjectRecord::from_detection(detection, &file.origin));
        }

        tracing::debug!(file = %file.name, objects = records.len(), "Processed frame");
        Ok(records)
    }
}

fn remove_partial_output(subdir: &Path) {
    if !subdir.exists() {
        return;
    }
    if let Err(e) = std::fs::remove_dir_all(subdir) {
        tracing::warn!(dir = %subdir.display(), error = %e, "Failed to remove partial output");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
