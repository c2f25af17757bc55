use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::{Duration, Instant};

use crate::config::normalize_base_url;
use crate::metrics::{UPSTREAM_FAILURES, UPSTREAM_LATENCY};
use crate::models::{PredictionResult, Relay, SpeciesList, UploadedImage};

pub const IMAGE_FIELD: &str = "image";

// Client for the remote classifier
#[derive(Clone)]
pub struct Classifier {
    client: reqwest::Client,
    base_url: String,
}

impl Classifier {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: normalize_base_url(base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // POST the image as a single-field multipart form to /predict
    pub async fn predict(&self, image: UploadedImage) -> Result<Relay, reqwest::Error> {
        let mut part = Part::bytes(image.bytes).file_name(image.file_name);
        if let Some(content_type) = image.content_type.as_deref() {
            part = part.mime_str(content_type)?;
        }
        let form = Form::new().part(IMAGE_FIELD, part);

        let request = self
            .client
            .post(format!("{}/predict", self.base_url))
            .multipart(form);
        let relay = self.relay("predict", request).await?;
        if let Ok(prediction) = PredictionResult::deserialize(&relay.body) {
            tracing::info!(
                species = %prediction.predicted_species,
                confidence = prediction.confidence,
                "prediction relayed"
            );
        }
        Ok(relay)
    }

    // GET /species
    pub async fn species(&self) -> Result<Relay, reqwest::Error> {
        let request = self.client.get(format!("{}/species", self.base_url));
        let relay = self.relay("species", request).await?;
        if let Ok(list) = SpeciesList::deserialize(&relay.body) {
            tracing::debug!(count = list.species.len(), "species list relayed");
        }
        Ok(relay)
    }

    async fn relay(
        &self,
        endpoint: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<Relay, reqwest::Error> {
        let start_time = Instant::now();

        let result = async {
            let res = request.send().await?;
            let status = res.status();
            // a body that is not JSON counts as a failed call
            let body = res.json::<serde_json::Value>().await?;
            Ok::<_, reqwest::Error>(Relay { status, body })
        }
        .await;

        UPSTREAM_LATENCY
            .with_label_values(&[endpoint])
            .observe(start_time.elapsed().as_secs_f64());

        match &result {
            Ok(relay) => {
                tracing::info!(endpoint, status = relay.status.as_u16(), "classifier responded");
            }
            Err(e) => {
                UPSTREAM_FAILURES.with_label_values(&[endpoint]).inc();
                tracing::warn!(endpoint, error = %e, "classifier call failed");
            }
        }
        result
    }
}
