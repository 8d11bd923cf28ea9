use crate::config::RecognizerConfig;
use crate::error::RecognitionError;
use crate::types::{RecognitionRequest, RecognitionResponse};
use image::ImageFormat;
use log::{debug, error, info};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Instant;
use url::Url;

/// Anything that can turn an image into a plate-reader response.
pub trait Recognizer {
    fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Result<RecognitionResponse, RecognitionError>;
}

impl<R: Recognizer + ?Sized> Recognizer for &R {
    fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Result<RecognitionResponse, RecognitionError> {
        (**self).recognize(request)
    }
}

/// Blocking client for the Plate Recognizer `plate-reader` endpoint.
pub struct RecognitionClient {
    http: Client,
    url: Url,
    token: String,
}

impl RecognitionClient {
    pub fn new(config: &RecognizerConfig) -> Result<Self, failure::Error> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(RecognitionClient {
            http,
            url: config.url.clone(),
            token: config.token.clone(),
        })
    }

    fn form(request: &RecognitionRequest) -> Result<Form, RecognitionError> {
        let mime = ImageFormat::from_path(&request.filename)
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream");
        let upload = Part::bytes(request.image.clone())
            .file_name(request.filename.clone())
            .mime_str(mime)
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;

        let mut form = Form::new().part("upload", upload);
        for region in &request.params.regions {
            form = form.text("regions", region.clone());
        }
        form = form.text("mmc", request.params.mmc.to_string());
        if request.params.strict_region {
            form = form.text("config", json!({"region": "strict"}).to_string());
        }
        Ok(form)
    }
}

impl Recognizer for RecognitionClient {
    fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Result<RecognitionResponse, RecognitionError> {
        let start = Instant::now();
        debug!("Posting {} to {}", request.filename, self.url);
        let response = self
            .http
            .post(self.url.clone())
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .multipart(Self::form(request)?)
            .send()
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            let value = response
                .json::<Value>()
                .map_err(|e| RecognitionError::Decode(e.to_string()))?;
            let body = RecognitionResponse::from_value(value)
                .map_err(|e| RecognitionError::Decode(e.to_string()))?;
            info!("API call completed in {:?}", start.elapsed());
            Ok(body)
        } else {
            let body = response.text().unwrap_or_default();
            error!("Error: {} {}", status.as_u16(), body);
            Err(RecognitionError::RemoteService {
                status: status.as_u16(),
                body,
            })
        }
    }
}
