use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

// One uploaded file, lives for a single request
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>, // declared by the client
    pub file_name: String,
}

// Classifier /predict response format, only relayed
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct PredictionResult {
    pub predicted_species: String,
    pub confidence: f64,
}

// Classifier /species response format, only relayed
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct SpeciesList {
    pub species: Vec<String>,
}

// What came back from the classifier: status + body, untouched
#[derive(Debug, Clone)]
pub struct Relay {
    pub status: StatusCode,
    pub body: serde_json::Value,
}
