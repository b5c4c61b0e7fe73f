//! Upload client for the third-party image host.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{multipart, Client};
use serde::Deserialize;
use tracing::info;

use crate::models::UploadedImage;

use super::ApiClient;

pub const DEFAULT_IMAGE_API_BASE_URL: &str = "https://api.imgbb.com/1";

/// Uploads can be large; allow more time than regular API calls.
const UPLOAD_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    data: UploadData,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    url: String,
    size: ByteSize,
    image: UploadFile,
}

#[derive(Debug, Deserialize)]
struct UploadFile {
    filename: String,
}

/// The host reports sizes as numbers or numeric strings depending on the
/// endpoint version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ByteSize {
    Number(u64),
    Text(String),
}

impl ByteSize {
    fn bytes(&self) -> Result<u64> {
        match self {
            ByteSize::Number(n) => Ok(*n),
            ByteSize::Text(s) => s
                .trim()
                .parse()
                .with_context(|| format!("Invalid image size: {}", s)),
        }
    }
}

#[derive(Clone)]
pub struct ImageUploader {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ImageUploader {
    pub fn new(base_url: &str, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Upload a base64-encoded image and return where it is hosted
    pub async fn upload(&self, image_base64: String) -> Result<UploadedImage> {
        let url = format!("{}/upload", self.base_url);
        let form = multipart::Form::new().text("image", image_base64);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .multipart(form)
            .send()
            .await
            .context("Failed to send image upload request")?;

        let response = ApiClient::check_response(response).await?;
        let text = response.text().await.context("Failed to read upload response body")?;
        let image = parse_upload_response(&text)?;

        info!(filename = %image.filename, size = image.size, "Uploaded image");
        Ok(image)
    }
}

fn parse_upload_response(text: &str) -> Result<UploadedImage> {
    let parsed: UploadResponse =
        serde_json::from_str(text).context("Failed to parse image upload response")?;

    Ok(UploadedImage {
        size: parsed.data.size.bytes()?,
        url: parsed.data.url,
        filename: parsed.data.image.filename,
    })
}
