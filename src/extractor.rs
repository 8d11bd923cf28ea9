use crate::client::Recognizer;
use crate::error::RecognitionError;
use crate::types::{ExtractedRecord, RecognitionRequest, RecognitionResponse};
use log::{debug, info, warn};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Blocks between attempts. Tests swap in an implementation that only
/// records what it was asked to wait.
pub trait Delay {
    fn wait(&mut self, duration: Duration);
}

pub struct ThreadSleep;

impl Delay for ThreadSleep {
    fn wait(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

impl<D: Delay + ?Sized> Delay for &mut D {
    fn wait(&mut self, duration: Duration) {
        (**self).wait(duration)
    }
}

/// Progress of a single image through the retry loop. `Retrying` carries the
/// number of the attempt about to be made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Pending,
    Retrying(u32),
    Accepted,
    Exhausted,
}

impl AttemptState {
    fn advance(self, accepted: bool, attempt: u32, max_attempts: u32) -> AttemptState {
        match self {
            AttemptState::Accepted | AttemptState::Exhausted => self,
            AttemptState::Pending | AttemptState::Retrying(_) => {
                if accepted {
                    AttemptState::Accepted
                } else if attempt >= max_attempts {
                    AttemptState::Exhausted
                } else {
                    AttemptState::Retrying(attempt + 1)
                }
            }
        }
    }

    pub fn is_terminal(self) -> bool {
        match self {
            AttemptState::Accepted | AttemptState::Exhausted => true,
            AttemptState::Pending | AttemptState::Retrying(_) => false,
        }
    }
}

/// Outcome for one image. `response` is the raw body from the final attempt,
/// absent if that attempt failed at the service.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: ExtractedRecord,
    pub response: Option<RecognitionResponse>,
    pub attempts: u32,
    pub state: AttemptState,
}

/// Fields as last reported by the service, before normalization.
#[derive(Debug, Default)]
struct Detection {
    plate: Option<String>,
    make: Option<String>,
    model: Option<String>,
}

pub struct RetryingExtractor<R, D> {
    recognizer: R,
    delay: D,
    policy: RetryPolicy,
}

impl<R: Recognizer> RetryingExtractor<R, ThreadSleep> {
    pub fn new(recognizer: R, policy: RetryPolicy) -> Self {
        RetryingExtractor::with_delay(recognizer, policy, ThreadSleep)
    }
}

impl<R: Recognizer, D: Delay> RetryingExtractor<R, D> {
    pub fn with_delay(recognizer: R, policy: RetryPolicy, delay: D) -> Self {
        RetryingExtractor {
            recognizer,
            delay,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Runs the retry loop for one image. Never fails: when every attempt is
    /// rejected the last detection seen is returned, possibly all-null.
    pub fn extract(&mut self, request: &RecognitionRequest) -> Extraction {
        let start = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut state = AttemptState::Pending;
        let mut detection = Detection::default();
        let mut response = None;
        let mut attempt = 0;

        while !state.is_terminal() {
            attempt += 1;
            info!("Processing: {} (attempt {})", request.filename, attempt);
            let verdict = match self.recognizer.recognize(request) {
                Ok(r) => {
                    let verdict = assess(&r, &mut detection);
                    response = Some(r);
                    verdict
                }
                Err(e) => {
                    response = None;
                    Err(e)
                }
            };
            if let Err(e) = &verdict {
                if e.is_remote_failure() {
                    warn!("Recognition of {} failed: {}", request.filename, e);
                } else {
                    info!("Retrying {}: {}", request.filename, e);
                }
            }
            state = state.advance(verdict.is_ok(), attempt, max_attempts);
            if let AttemptState::Retrying(next) = state {
                debug!(
                    "Waiting {:?} before attempt {} for {}",
                    self.policy.delay, next, request.filename
                );
                self.delay.wait(self.policy.delay);
            }
        }

        if state == AttemptState::Exhausted {
            warn!("Giving up on {} after {} attempts", request.filename, attempt);
        }
        info!("Image processing completed in {:?}", start.elapsed());
        Extraction {
            record: normalize(&request.filename, detection),
            response,
            attempts: attempt,
            state,
        }
    }
}

/// Records what the top candidate reported and decides whether it is good
/// enough. An empty candidate list leaves the previous detection in place.
fn assess(response: &RecognitionResponse, detection: &mut Detection) -> Result<(), RecognitionError> {
    let candidate = match response.top_candidate() {
        Some(c) => c,
        None => return Err(RecognitionError::MissingDetection),
    };
    detection.plate = candidate.plate.clone();
    let class = candidate.vehicle_class();
    detection.make = class.and_then(|c| c.make.clone());
    detection.model = class.and_then(|c| c.model.clone());

    if is_blank(&detection.plate) {
        return Err(RecognitionError::MissingDetection);
    }
    if class.is_some() && (is_blank(&detection.make) || is_blank(&detection.model)) {
        return Err(RecognitionError::IncompleteClassification);
    }
    Ok(())
}

fn is_blank(field: &Option<String>) -> bool {
    field.as_deref().map_or(true, str::is_empty)
}

fn normalize(filename: &str, detection: Detection) -> ExtractedRecord {
    ExtractedRecord {
        filename: filename.to_string(),
        plate: non_empty(detection.plate).map(|p| p.to_uppercase()),
        make: non_empty(detection.make).map(|m| title_case(&m)),
        model: non_empty(detection.model).map(|m| title_case(&m)),
    }
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.is_empty())
}

/// Uppercases the first letter of every run of letters and lowercases the
/// rest, so `mercedes-benz` becomes `Mercedes-Benz` and `x5m` becomes `X5M`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}
