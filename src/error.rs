/// Why a single recognition attempt was not accepted. All of these are
/// retryable and never abort a batch.
#[derive(Debug, Clone, Fail)]
pub enum RecognitionError {
    #[fail(display = "remote service returned {}: {}", status, body)]
    RemoteService { status: u16, body: String },
    #[fail(display = "request to remote service failed: {}", _0)]
    Transport(String),
    #[fail(display = "unable to decode remote service response: {}", _0)]
    Decode(String),
    #[fail(display = "no plate detected")]
    MissingDetection,
    #[fail(display = "make or model information is missing")]
    IncompleteClassification,
}

impl RecognitionError {
    pub fn is_remote_failure(&self) -> bool {
        match self {
            RecognitionError::RemoteService { .. }
            | RecognitionError::Transport(_)
            | RecognitionError::Decode(_) => true,
            RecognitionError::MissingDetection | RecognitionError::IncompleteClassification => {
                false
            }
        }
    }
}

/// Conditions that stop a pipeline.
#[derive(Debug, Fail)]
pub enum PipelineError {
    #[fail(
        display = "filename {:?} does not start with a decimal image number",
        _0
    )]
    InvalidFilename(String),
    #[fail(display = "column {:?} not found in {}", column, path)]
    MissingColumn { column: String, path: String },
    #[fail(display = "no worksheet found in {}", _0)]
    EmptyWorkbook(String),
    #[fail(display = "{} environment variable unset", _0)]
    MissingConfig(&'static str),
    #[fail(display = "invalid value {:?} for {}", value, name)]
    InvalidConfig { name: &'static str, value: String },
}
