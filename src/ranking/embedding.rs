//! Text embedding backends.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;
use crate::error::VoxError;
use crate::provider::http::{bearer_headers, build_client, request_error, status_to_error};

/// Turns text into a dense vector.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    fn model(&self) -> &str;

    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, VoxError>;
}

/// OpenAI-style `/embeddings` endpoint.
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
    dimensions: usize,
    timeout: Duration,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    encoding_format: &'static str,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl HttpEmbeddingClient {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, VoxError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        Ok(Self {
            client: build_client(timeout)?,
            url: config.url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            dimensions: config.dimensions,
            timeout,
        })
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, VoxError> {
        let payload = EmbeddingRequest {
            model: &self.model,
            input: text,
            encoding_format: "float",
            dimensions: self.dimensions,
        };

        let resp = self
            .client
            .post(&self.url)
            .headers(bearer_headers(&self.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let data: EmbeddingResponse = resp.json().await.map_err(|e| request_error(e, self.timeout))?;
        data.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| VoxError::RankingBackend("embedding response contained no data".into()))
    }
}

/// Scale to unit length in place. Returns false for an all-zero vector.
pub fn normalize(vector: &mut [f32]) -> bool {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    vector.iter_mut().for_each(|v| *v /= norm);
    true
}

pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_scales_to_unit_length() {
        let mut v = vec![3.0_f32, 4.0];
        assert!(normalize(&mut v));
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert!((dot(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_rejects_zero_vector() {
        let mut v = vec![0.0_f32; 4];
        assert!(!normalize(&mut v));
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn request_payload_uses_float_encoding() {
        let payload = EmbeddingRequest {
            model: "BAAI/bge-m3",
            input: "turn the lights on",
            encoding_format: "float",
            dimensions: 1024,
        };
        let value = serde_json::to_value(&payload).expect("payload serializes");
        assert_eq!(
            value,
            serde_json::json!({
                "model": "BAAI/bge-m3",
                "input": "turn the lights on",
                "encoding_format": "float",
                "dimensions": 1024
            })
        );
    }
}
