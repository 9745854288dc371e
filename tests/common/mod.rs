//! Fakes shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use slideshot::orchestrator::SlideOrchestrator;
use slideshot::render::SnapshotRenderer;
use slideshot::server::AppState;
use slideshot::template::TemplateResolver;
use slideshot::upload::{CloudinaryAccount, ImageHost};
use slideshot::{Error, Result};
use std::sync::{Arc, Mutex};

pub const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

pub fn templates_dir() -> String {
    format!("{}/templates", env!("CARGO_MANIFEST_DIR"))
}

/// Records every HTML document it is asked to render.
#[derive(Default)]
pub struct RecordingRenderer {
    pub pages: Mutex<Vec<String>>,
    /// 1-based call number that fails with a render timeout
    pub fail_on: Option<usize>,
}

impl RecordingRenderer {
    pub fn failing_on(call: usize) -> Self {
        Self { pages: Mutex::new(Vec::new()), fail_on: Some(call) }
    }

    pub fn pages(&self) -> Vec<String> {
        self.pages.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotRenderer for RecordingRenderer {
    async fn render_png(&self, html: &str) -> Result<Vec<u8>> {
        let mut pages = self.pages.lock().unwrap();
        pages.push(html.to_string());
        if self.fail_on == Some(pages.len()) {
            return Err(Error::RenderTimeout(30000));
        }
        let mut png = PNG_MAGIC.to_vec();
        png.push(pages.len() as u8);
        Ok(png)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostedUpload {
    pub public_id: String,
    pub bytes: usize,
    pub account: CloudinaryAccount,
}

/// Image host that hands out predictable URLs.
#[derive(Default)]
pub struct FakeHost {
    pub uploads: Mutex<Vec<HostedUpload>>,
    /// 1-based call number that the host rejects
    pub reject_on: Option<usize>,
}

impl FakeHost {
    pub fn rejecting_on(call: usize) -> Self {
        Self { uploads: Mutex::new(Vec::new()), reject_on: Some(call) }
    }

    pub fn uploads(&self) -> Vec<HostedUpload> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageHost for FakeHost {
    async fn upload(&self, png: &[u8], public_id: &str, account: &CloudinaryAccount) -> Result<String> {
        let mut uploads = self.uploads.lock().unwrap();
        if self.reject_on == Some(uploads.len() + 1) {
            return Err(Error::Upload { status: 400, body: "Upload preset must be whitelisted".into() });
        }
        uploads.push(HostedUpload { public_id: public_id.to_string(), bytes: png.len(), account: account.clone() });
        Ok(format!("https://res.cloudinary.test/{}/image/upload/v1/{}.png", account.cloud_name, uploads.len()))
    }
}

pub fn default_account() -> CloudinaryAccount {
    CloudinaryAccount { cloud_name: "dpptdb3sr".into(), upload_preset: "eevdbifs".into() }
}

pub fn app_state(renderer: Arc<RecordingRenderer>, host: Arc<FakeHost>) -> AppState {
    AppState {
        orchestrator: SlideOrchestrator::new(TemplateResolver::new(templates_dir()), renderer),
        host,
        default_account: default_account(),
        max_body_bytes: 10 * 1024 * 1024,
    }
}
