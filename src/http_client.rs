use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Shared blocking client. Prediction requests can take a while on the
/// model side, so the timeout is configurable via `PREDICTOR_TIMEOUT_SECS`.
pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs()))
            .build()
            .context("failed to build http client")
    })
}

fn request_timeout_secs() -> u64 {
    std::env::var("PREDICTOR_TIMEOUT_SECS")
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECS)
        .max(1)
}
