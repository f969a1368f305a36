use anyhow::{Context, Result, anyhow};
use reqwest::header::USER_AGENT;

use crate::http_client::http_client;
use crate::prediction::{PredictRequest, PredictResponse};

const DEFAULT_PREDICTOR_URL: &str = "http://127.0.0.1:5000";

pub trait Predictor {
    fn predict(&self, request: &PredictRequest) -> Result<PredictResponse>;
}

#[derive(Debug, Clone)]
pub struct HttpPredictor {
    base_url: String,
}

impl HttpPredictor {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_env() -> Self {
        let url = std::env::var("PREDICTOR_URL")
            .ok()
            .filter(|val| !val.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PREDICTOR_URL.to_string());
        Self::new(url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Predictor for HttpPredictor {
    fn predict(&self, request: &PredictRequest) -> Result<PredictResponse> {
        let url = format!("{}/predict", self.base_url);
        let resp = http_client()?
            .post(&url)
            .header(USER_AGENT, "strategy_lens")
            .json(request)
            .send()
            .context("predict request failed")?;
        let status = resp.status();
        let body = resp.text().context("failed reading predict body")?;
        if !status.is_success() {
            return Err(anyhow!("http {}: {}", status, body));
        }
        parse_predict_response(&body)
    }
}

pub fn parse_predict_response(raw: &str) -> Result<PredictResponse> {
    serde_json::from_str(raw).context("invalid predict response json")
}
