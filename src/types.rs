use crate::error::PipelineError;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

pub const FILENAME_COLUMN: &str = "Image Number (Filename)";
pub const PLATE_COLUMN: &str = "License Plate";
pub const MAKE_COLUMN: &str = "Make";
pub const MODEL_COLUMN: &str = "Model";

/// Fixed parameters sent along with every image.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionParams {
    pub regions: Vec<String>,
    pub strict_region: bool,
    pub mmc: bool,
}

impl Default for RecognitionParams {
    fn default() -> Self {
        RecognitionParams {
            regions: vec!["sg".to_string()],
            strict_region: true,
            mmc: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    pub filename: String,
    pub image: Vec<u8>,
    pub params: RecognitionParams,
}

/// Decoded body of a successful plate-reader call. Every field the service
/// may omit is optional; unknown fields are carried through untouched.
/// Responses read off the wire also keep the body exactly as sent in `raw`,
/// and that is what gets persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<Candidate>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    pub raw: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_make: Option<Vec<MakeModel>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MakeModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RecognitionResponse {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let mut response: RecognitionResponse = serde_json::from_value(value.clone())?;
        response.raw = Some(value);
        Ok(response)
    }

    /// The body as received, or the typed view for responses built in code.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match &self.raw {
            Some(raw) => Ok(raw.clone()),
            None => serde_json::to_value(self),
        }
    }

    /// Only the first candidate is ever considered.
    pub fn top_candidate(&self) -> Option<&Candidate> {
        self.results.as_ref().and_then(|r| r.first())
    }
}

impl Candidate {
    /// The first make/model guess, if the block is present and non-empty.
    pub fn vehicle_class(&self) -> Option<&MakeModel> {
        self.model_make.as_ref().and_then(|m| m.first())
    }
}

/// Distilled per-image outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    #[serde(rename = "Image Number (Filename)")]
    pub filename: String,
    #[serde(rename = "License Plate")]
    pub plate: Option<String>,
    #[serde(rename = "Make")]
    pub make: Option<String>,
    #[serde(rename = "Model")]
    pub model: Option<String>,
}

impl ExtractedRecord {
    pub fn empty(filename: &str) -> Self {
        ExtractedRecord {
            filename: filename.to_string(),
            plate: None,
            make: None,
            model: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEntry {
    #[serde(rename = "Image Number (Filename)")]
    pub filename: String,
    #[serde(rename = "Full Response", serialize_with = "serialize_as_received")]
    pub response: RecognitionResponse,
}

fn serialize_as_received<S: Serializer>(
    response: &RecognitionResponse,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match &response.raw {
        Some(raw) => raw.serialize(serializer),
        None => response.serialize(serializer),
    }
}

/// Ordering key taken from the decimal prefix of an image filename,
/// e.g. `10` for `10.jpg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageNumber(pub u64);

impl ImageNumber {
    pub fn parse(filename: &str) -> Result<ImageNumber, PipelineError> {
        let prefix = filename.split('.').next().unwrap_or("");
        if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PipelineError::InvalidFilename(filename.to_string()));
        }
        prefix
            .parse()
            .map(ImageNumber)
            .map_err(|_| PipelineError::InvalidFilename(filename.to_string()))
    }
}

/// Records and raw responses gathered over one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    pub records: Vec<ExtractedRecord>,
    pub responses: Vec<ResponseEntry>,
}

impl BatchResult {
    pub fn push(&mut self, record: ExtractedRecord, response: Option<RecognitionResponse>) {
        if let Some(response) = response {
            self.responses.push(ResponseEntry {
                filename: record.filename.clone(),
                response,
            });
        }
        self.records.push(record);
    }

    /// Sorts both collections by image number. Every filename is validated
    /// before anything is reordered, so a bad name leaves the batch untouched.
    pub fn sort_by_image_number(&mut self) -> Result<(), PipelineError> {
        let record_keys = self
            .records
            .iter()
            .map(|r| ImageNumber::parse(&r.filename))
            .collect::<Result<Vec<_>, _>>()?;
        let response_keys = self
            .responses
            .iter()
            .map(|r| ImageNumber::parse(&r.filename))
            .collect::<Result<Vec<_>, _>>()?;
        self.records = reorder(std::mem::take(&mut self.records), record_keys);
        self.responses = reorder(std::mem::take(&mut self.responses), response_keys);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn reorder<T>(items: Vec<T>, keys: Vec<ImageNumber>) -> Vec<T> {
    let mut keyed: Vec<(ImageNumber, T)> = keys.into_iter().zip(items).collect();
    keyed.sort_by_key(|(key, _)| *key);
    keyed.into_iter().map(|(_, item)| item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(name: &str) -> ExtractedRecord {
        ExtractedRecord::empty(name)
    }

    #[test]
    fn image_number_uses_prefix_before_first_dot() {
        assert_eq!(ImageNumber::parse("10.jpg").unwrap(), ImageNumber(10));
        assert_eq!(ImageNumber::parse("7.back.png").unwrap(), ImageNumber(7));
        assert_eq!(ImageNumber::parse("042.jpeg").unwrap(), ImageNumber(42));
    }

    #[test]
    fn image_number_rejects_non_numeric_prefix() {
        for name in &["car.jpg", ".jpg", "12a.jpg", "-1.jpg", ""] {
            match ImageNumber::parse(name) {
                Err(PipelineError::InvalidFilename(n)) => assert_eq!(n, *name),
                other => panic!("expected InvalidFilename for {:?}, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn sorts_numerically_not_lexicographically() {
        let mut batch = BatchResult::default();
        batch.push(record("1.jpg"), Some(RecognitionResponse::default()));
        batch.push(record("10.jpg"), Some(RecognitionResponse::default()));
        batch.push(record("2.jpg"), Some(RecognitionResponse::default()));
        batch.sort_by_image_number().unwrap();
        let names: Vec<_> = batch.records.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["1.jpg", "2.jpg", "10.jpg"]);
        let names: Vec<_> = batch.responses.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["1.jpg", "2.jpg", "10.jpg"]);
    }

    #[test]
    fn sorting_a_sorted_batch_is_a_no_op() {
        let mut batch = BatchResult::default();
        for name in &["3.jpg", "20.png", "100.jpeg"] {
            batch.push(record(name), None);
        }
        let before = batch.clone();
        batch.sort_by_image_number().unwrap();
        assert_eq!(batch, before);
        batch.sort_by_image_number().unwrap();
        assert_eq!(batch, before);
    }

    #[test]
    fn bad_filename_fails_and_keeps_order() {
        let mut batch = BatchResult::default();
        batch.push(record("5.jpg"), None);
        batch.push(record("plate.jpg"), None);
        batch.push(record("1.jpg"), None);
        assert!(batch.sort_by_image_number().is_err());
        let names: Vec<_> = batch.records.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["5.jpg", "plate.jpg", "1.jpg"]);
    }

    #[test]
    fn responses_without_expected_fields_decode() {
        let response: RecognitionResponse =
            serde_json::from_value(json!({"processing_time": 12.5})).unwrap();
        assert!(response.top_candidate().is_none());

        let response: RecognitionResponse = serde_json::from_value(json!({
            "results": [{"plate": "sgx1234a", "score": 0.9}, {"plate": "ignored"}]
        }))
        .unwrap();
        let top = response.top_candidate().unwrap();
        assert_eq!(top.plate.as_deref(), Some("sgx1234a"));
        assert!(top.vehicle_class().is_none());
    }

    #[test]
    fn unknown_fields_survive_serialization() {
        let raw = json!({
            "filename": "1.jpg",
            "results": [{
                "plate": "abc123",
                "box": {"xmin": 1},
                "model_make": [{"make": "toyota", "model": "corolla", "score": 0.5}]
            }]
        });
        let response: RecognitionResponse = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&response).unwrap(), raw);
    }

    #[test]
    fn null_fields_are_persisted_as_received() {
        let raw = json!({
            "results": null,
            "processing_time": 80.1,
            "nested": {"plate": null}
        });
        let response = RecognitionResponse::from_value(raw.clone()).unwrap();
        assert!(response.top_candidate().is_none());
        assert_eq!(response.to_value().unwrap(), raw);

        let entry = ResponseEntry {
            filename: "4.jpg".to_string(),
            response,
        };
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({"Image Number (Filename)": "4.jpg", "Full Response": raw})
        );
    }

    #[test]
    fn responses_built_in_code_serialize_their_fields() {
        let response = RecognitionResponse {
            results: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(response.to_value().unwrap(), json!({"results": []}));
    }

    #[test]
    fn record_serializes_with_column_names() {
        let rec = ExtractedRecord {
            filename: "1.jpg".to_string(),
            plate: Some("ABC123".to_string()),
            make: None,
            model: Some("Corolla".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&rec).unwrap(),
            json!({
                "Image Number (Filename)": "1.jpg",
                "License Plate": "ABC123",
                "Make": null,
                "Model": "Corolla"
            })
        );
    }
}
