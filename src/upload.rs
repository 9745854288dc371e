//! Image host adapter: unsigned, preset-authorized Cloudinary uploads.

use crate::{Error, Result};
use async_trait::async_trait;
use base64::Engine as Base64Engine;
use log::info;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Destination account for an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudinaryAccount {
    pub cloud_name: String,
    pub upload_preset: String,
}

/// Publishes a rendered PNG and returns its durable URL.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// `public_id` identifies the image in logs; the remote side names it.
    async fn upload(&self, png: &[u8], public_id: &str, account: &CloudinaryAccount) -> Result<String>;
}

#[derive(Serialize)]
struct UploadRequest<'a> {
    file: String,
    upload_preset: &'a str,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    public_id: Option<String>,
}

/// Cloudinary upload API client. No secret key is sent; the preset decides
/// what the upload may do.
#[derive(Clone)]
pub struct CloudinaryClient {
    http: reqwest::Client,
    api_base: String,
}

impl CloudinaryClient {
    pub fn new(api_base: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, api_base: api_base.into().trim_end_matches('/').to_string() })
    }

    pub fn upload_url(&self, cloud_name: &str) -> String {
        format!("{}/{}/image/upload", self.api_base, cloud_name)
    }
}

/// `data:` URI carrying the PNG, the form Cloudinary accepts as `file`.
pub fn png_data_uri(png: &[u8]) -> String {
    format!(
        "data:image/png;base64,{}",
        Base64Engine::encode(&base64::engine::general_purpose::STANDARD, png)
    )
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    async fn upload(&self, png: &[u8], public_id: &str, account: &CloudinaryAccount) -> Result<String> {
        info!(
            "[Cloudinary] Uploading {} to {} with preset {}",
            public_id, account.cloud_name, account.upload_preset
        );

        let body = UploadRequest { file: png_data_uri(png), upload_preset: &account.upload_preset };
        let response = self.http.post(self.upload_url(&account.cloud_name)).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upload { status: status.as_u16(), body });
        }

        let text = response.text().await?;
        let parsed: UploadResponse = serde_json::from_str(&text).map_err(|e| Error::Upload {
            status: status.as_u16(),
            body: format!("unreadable response ({}): {}", e, text),
        })?;
        let url = parsed.secure_url.ok_or_else(|| Error::Upload {
            status: status.as_u16(),
            body: format!("response has no secure_url: {}", text),
        })?;

        info!(
            "[Cloudinary] Upload success: {}",
            parsed.public_id.as_deref().unwrap_or(public_id)
        );
        Ok(url)
    }
}
