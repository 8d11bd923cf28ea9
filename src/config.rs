use crate::error::PipelineError;
use crate::extractor::RetryPolicy;
use crate::types::RecognitionParams;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.platerecognizer.com/v1/plate-reader/";

/// Everything the recognition client needs. The token is passed in here
/// rather than held globally.
#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    pub token: String,
    pub url: Url,
    pub params: RecognitionParams,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunMode {
    All,
    Random(usize),
    Single(PathBuf),
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub recognizer: RecognizerConfig,
    pub retry: RetryPolicy,
    pub mode: RunMode,
    pub image_dir: PathBuf,
    pub excel_dir: PathBuf,
    pub json_dir: PathBuf,
    pub test_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    pub predicted: PathBuf,
    pub truth: PathBuf,
    pub output_dir: PathBuf,
    pub row_limit: usize,
}

impl RunConfig {
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("PLATE_RECOGNIZER_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(PipelineError::MissingConfig("PLATE_RECOGNIZER_TOKEN"))?;
        let raw_url = lookup("PLATE_RECOGNIZER_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let url = Url::parse(&raw_url).map_err(|_| PipelineError::InvalidConfig {
            name: "PLATE_RECOGNIZER_URL",
            value: raw_url.clone(),
        })?;
        let regions: Vec<String> = lookup("PLATE_REGIONS")
            .unwrap_or_else(|| "sg".to_string())
            .split(',')
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        let params = RecognitionParams {
            regions,
            strict_region: parse_or(&lookup, "PLATE_STRICT_REGION", true)?,
            mmc: parse_or(&lookup, "PLATE_MMC", true)?,
        };
        let recognizer = RecognizerConfig {
            token,
            url,
            params,
            timeout: Duration::from_secs(parse_or(&lookup, "PLATE_TIMEOUT_SECS", 30)?),
        };

        let max_attempts: u32 = parse_or(&lookup, "PLATE_MAX_ATTEMPTS", 3)?;
        if max_attempts == 0 {
            return Err(PipelineError::InvalidConfig {
                name: "PLATE_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }
        let retry = RetryPolicy {
            max_attempts,
            delay: Duration::from_secs(parse_or(&lookup, "PLATE_RETRY_DELAY_SECS", 2)?),
        };

        let mode = match lookup("PLATE_RUN_MODE").as_deref().map(str::trim) {
            None | Some("") | Some("all") => RunMode::All,
            Some("random") => RunMode::Random(parse_or(&lookup, "PLATE_RANDOM_COUNT", 2)?),
            Some("single") => RunMode::Single(path_or(
                &lookup,
                "PLATE_TEST_IMAGE",
                "selected_images/21.jpg",
            )),
            Some(other) => {
                return Err(PipelineError::InvalidConfig {
                    name: "PLATE_RUN_MODE",
                    value: other.to_string(),
                })
            }
        };

        Ok(RunConfig {
            recognizer,
            retry,
            mode,
            image_dir: path_or(&lookup, "PLATE_IMAGE_DIR", "selected_images"),
            excel_dir: path_or(&lookup, "PLATE_EXCEL_DIR", "output/excel"),
            json_dir: path_or(&lookup, "PLATE_JSON_DIR", "output/json"),
            test_dir: path_or(&lookup, "PLATE_TEST_DIR", "test_results"),
        })
    }
}

impl EvaluationConfig {
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(EvaluationConfig {
            predicted: path_or(&lookup, "EVAL_PREDICTED", "recognized_plates.xlsx"),
            truth: path_or(&lookup, "EVAL_TRUTH", "truth_label_format.xlsx"),
            output_dir: path_or(&lookup, "EVAL_OUTPUT_DIR", "output"),
            row_limit: parse_or(&lookup, "EVAL_ROW_LIMIT", 45)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, PipelineError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => {
            value
                .trim()
                .to_ascii_lowercase()
                .parse()
                .map_err(|_| PipelineError::InvalidConfig { name, value })
        }
        _ => Ok(default),
    }
}

fn path_or<F>(lookup: &F, name: &str, default: &str) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    PathBuf::from(lookup(name).unwrap_or_else(|| default.to_string()))
}
