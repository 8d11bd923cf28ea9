use crate::client::Recognizer;
use crate::extractor::{AttemptState, Delay, Extraction, RetryingExtractor};
use crate::types::{
    BatchResult, ExtractedRecord, ImageNumber, RecognitionParams, RecognitionRequest,
};
use crate::writer::{self, ResultWriter, SavedPaths};
use log::{error, info};
use rand::seq::SliceRandom;
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const TEST_RESULT_FILE: &str = "test_result.xlsx";
pub const TEST_RESPONSE_FILE: &str = "test_response.json";

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.iter().any(|x| *x == e)
        })
        .unwrap_or(false)
}

/// Image files in `dir`, in directory listing order.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, failure::Error> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_image(&path) {
            images.push(path);
        }
    }
    Ok(images)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Drives the extractor over a set of images, one at a time.
pub struct BatchRunner<R, D> {
    extractor: RetryingExtractor<R, D>,
    params: RecognitionParams,
}

impl<R: Recognizer, D: Delay> BatchRunner<R, D> {
    pub fn new(extractor: RetryingExtractor<R, D>, params: RecognitionParams) -> Self {
        BatchRunner { extractor, params }
    }

    /// An unreadable file still yields a record, with every field null.
    pub fn process_file(&mut self, path: &Path) -> Extraction {
        let filename = file_name(path);
        match fs::read(path) {
            Ok(image) => self.extractor.extract(&RecognitionRequest {
                filename,
                image,
                params: self.params.clone(),
            }),
            Err(e) => {
                error!("Unable to read {}: {}", path.display(), e);
                Extraction {
                    record: ExtractedRecord::empty(&filename),
                    response: None,
                    attempts: 0,
                    state: AttemptState::Exhausted,
                }
            }
        }
    }

    /// Processes `paths` in order and returns the batch sorted by image number.
    /// Every filename must carry an image number; a bad one fails the run
    /// before any image is sent.
    pub fn run(&mut self, paths: &[PathBuf]) -> Result<BatchResult, failure::Error> {
        for path in paths {
            ImageNumber::parse(&file_name(path))?;
        }
        let mut batch = BatchResult::default();
        for path in paths {
            let extraction = self.process_file(path);
            batch.push(extraction.record, extraction.response);
        }
        batch.sort_by_image_number()?;
        Ok(batch)
    }

    pub fn process_all(&mut self, dir: &Path) -> Result<BatchResult, failure::Error> {
        let images = list_images(dir)?;
        info!("Found {} images in {}", images.len(), dir.display());
        self.run(&images)
    }

    /// Processes `count` distinct images chosen at random, or all of them if
    /// fewer are available.
    pub fn process_random<G: Rng + ?Sized>(
        &mut self,
        dir: &Path,
        count: usize,
        rng: &mut G,
    ) -> Result<BatchResult, failure::Error> {
        let images = list_images(dir)?;
        let count = count.min(images.len());
        let sample: Vec<PathBuf> = images.choose_multiple(rng, count).cloned().collect();
        info!(
            "Selected {} of {} images in {}",
            sample.len(),
            images.len(),
            dir.display()
        );
        self.run(&sample)
    }

    /// Returns `None` when the path does not exist.
    pub fn process_single(&mut self, path: &Path) -> Option<Extraction> {
        if !path.exists() {
            error!("Image file not found at {}", path.display());
            return None;
        }
        info!("Testing image: {}", file_name(path));
        Some(self.process_file(path))
    }
}

pub fn process_all_images<R: Recognizer, D: Delay>(
    runner: &mut BatchRunner<R, D>,
    dir: &Path,
    writer: &ResultWriter,
) -> Result<(BatchResult, SavedPaths), failure::Error> {
    let start = Instant::now();
    let batch = runner.process_all(dir)?;
    let paths = writer.save(&batch)?;
    info!("Total processing time for all images: {:?}", start.elapsed());
    Ok((batch, paths))
}

pub fn process_random_images<R: Recognizer, D: Delay, G: Rng + ?Sized>(
    runner: &mut BatchRunner<R, D>,
    count: usize,
    dir: &Path,
    writer: &ResultWriter,
    rng: &mut G,
) -> Result<(BatchResult, SavedPaths), failure::Error> {
    let start = Instant::now();
    let batch = runner.process_random(dir, count, rng)?;
    let paths = writer.save(&batch)?;
    info!("Total processing time for random images: {:?}", start.elapsed());
    Ok((batch, paths))
}

/// Runs one image and stores its record and raw response under `out_dir`.
pub fn test_single_image<R: Recognizer, D: Delay>(
    runner: &mut BatchRunner<R, D>,
    path: &Path,
    out_dir: &Path,
) -> Result<Option<Extraction>, failure::Error> {
    let start = Instant::now();
    let extraction = match runner.process_single(path) {
        Some(x) => x,
        None => return Ok(None),
    };

    let record = &extraction.record;
    info!("License Plate: {:?}", record.plate);
    info!("Make: {:?}", record.make);
    info!("Model: {:?}", record.model);

    writer::create_dir(out_dir)?;
    let excel_path = out_dir.join(TEST_RESULT_FILE);
    writer::write_records_xlsx(&excel_path, std::slice::from_ref(record))?;
    info!("Results saved to {}", excel_path.display());
    if let Some(response) = &extraction.response {
        let json_path = out_dir.join(TEST_RESPONSE_FILE);
        writer::write_json(&json_path, &response.to_value()?)?;
        info!("Full response saved to {}", json_path.display());
    }

    info!("Total test time: {:?}", start.elapsed());
    Ok(Some(extraction))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_extensions_are_case_insensitive() {
        assert!(is_image(Path::new("dir/1.jpg")));
        assert!(is_image(Path::new("1.JPG")));
        assert!(is_image(Path::new("1.Jpeg")));
        assert!(is_image(Path::new("1.png")));
        assert!(!is_image(Path::new("1.gif")));
        assert!(!is_image(Path::new("notes.txt")));
        assert!(!is_image(Path::new("jpg")));
    }

    #[test]
    fn list_images_skips_other_files_and_directories() {
        let tmp = tempfile::tempdir().unwrap();
        for name in &["1.jpg", "2.PNG", "3.txt", "4.jpeg"] {
            fs::write(tmp.path().join(name), b"x").unwrap();
        }
        fs::create_dir(tmp.path().join("5.jpg")).unwrap();
        let mut names: Vec<String> = list_images(tmp.path())
            .unwrap()
            .iter()
            .map(|p| file_name(p))
            .collect();
        names.sort();
        assert_eq!(names, vec!["1.jpg", "2.PNG", "4.jpeg"]);
    }

    #[test]
    fn bad_filename_is_rejected_before_any_request() {
        use crate::error::{PipelineError, RecognitionError};
        use crate::extractor::RetryPolicy;
        use crate::types::RecognitionResponse;
        use std::cell::Cell;

        struct Counting(Cell<u32>);

        impl Recognizer for Counting {
            fn recognize(
                &self,
                _: &RecognitionRequest,
            ) -> Result<RecognitionResponse, RecognitionError> {
                self.0.set(self.0.get() + 1);
                Ok(RecognitionResponse::default())
            }
        }

        struct NoWait;

        impl Delay for NoWait {
            fn wait(&mut self, _: std::time::Duration) {}
        }

        let tmp = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = ["1.jpg", "2.jpg", "car.jpg"]
            .iter()
            .map(|n| tmp.path().join(n))
            .collect();
        for path in &paths {
            fs::write(path, b"x").unwrap();
        }
        let service = Counting(Cell::new(0));
        let extractor = RetryingExtractor::with_delay(&service, RetryPolicy::default(), NoWait);
        let mut runner = BatchRunner::new(extractor, RecognitionParams::default());

        let err = runner.run(&paths).unwrap_err();
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::InvalidFilename(name)) => assert_eq!(name, "car.jpg"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(service.0.get(), 0);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(list_images(&tmp.path().join("nope")).is_err());
    }
}
