//! Blocking client for an Ollama-compatible model server.
//!
//! One narrow client covers the three model services the pipeline
//! consumes over HTTP: text completion, image captioning (multimodal
//! generate), and batch embedding. Adapters wrap the client with a
//! model name to satisfy the service traits.

use std::path::Path;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    services::{ImageCaptioner, TextCompletion, TextEmbedder},
};

/// Prompt used when captioning an image through a multimodal model.
const CAPTION_PROMPT: &str =
    "Describe this image in one short, factual sentence.";

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl OllamaClient {
    /// Build a client for the server at `base_url`
    /// (e.g. `http://localhost:11434`).
    ///
    /// Model calls can run for minutes; no client-side deadline is set.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(None::<Duration>)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Run one blocking completion. `images` carries base64-encoded
    /// payloads for multimodal models; empty for plain text prompts.
    pub fn generate(
        &self,
        model: &str,
        prompt: &str,
        images: &[String],
    ) -> Result<String> {
        let body = GenerateRequest {
            model,
            prompt,
            images,
            stream: false,
        };
        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()?;
        let response = check_status(response)?;
        let parsed: GenerateResponse = response.json()?;
        Ok(parsed.response)
    }

    /// Embed a batch of strings in one call. The server returns one
    /// vector per input, in input order.
    pub fn embed(
        &self,
        model: &str,
        input: &[String],
    ) -> Result<Vec<Vec<f32>>> {
        let body = EmbedRequest { model, input };
        let response = self
            .http
            .post(format!("{}/api/embed", self.base_url))
            .json(&body)
            .send()?;
        let response = check_status(response)?;
        let parsed: EmbedResponse = response.json()?;
        Ok(parsed.embeddings)
    }
}

fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    Err(Error::Service {
        service: "ollama",
        message: format!("{status}: {body}"),
    })
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    images: &'a [String],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Batch embedding through `/api/embed`.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl TextEmbedder for OllamaEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.client.embed(&self.model, texts)
    }
}

/// Text completion through `/api/generate`.
#[derive(Debug, Clone)]
pub struct OllamaCompletion {
    client: OllamaClient,
    model: String,
}

impl OllamaCompletion {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl TextCompletion for OllamaCompletion {
    fn complete(&self, prompt: &str) -> Result<String> {
        self.client.generate(&self.model, prompt, &[])
    }
}

/// Image captioning through a multimodal model.
#[derive(Debug, Clone)]
pub struct OllamaCaptioner {
    client: OllamaClient,
    model: String,
}

impl OllamaCaptioner {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl ImageCaptioner for OllamaCaptioner {
    fn caption(&self, image: &Path) -> Result<String> {
        let bytes = std::fs::read(image)?;
        let encoded = BASE64.encode(bytes);
        let caption =
            self.client
                .generate(&self.model, CAPTION_PROMPT, &[encoded])?;
        Ok(caption.trim().to_string())
    }
}
