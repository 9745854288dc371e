//! HTTP surface: `GET /health` and `POST /generate`.
//!
//! The accept loop runs on its own thread over `tiny_http`; every request is
//! handed to the tokio runtime so a long render never blocks new connections.
//! Routing itself is a plain async function ([`route`]) so it can be driven
//! without sockets.

use crate::orchestrator::{SlideOrchestrator, SlideSpec};
use crate::render::RenderedImage;
use crate::upload::{CloudinaryAccount, ImageHost};
use crate::{Error, Result};
use chrono::{SecondsFormat, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::io::Read;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tiny_http::{Header, Request, Response, Server};

pub const DEFAULT_TEMPLATE_FAMILY: &str = "carousel";

/// Everything a request needs, shared across all in-flight requests.
pub struct AppState {
    pub orchestrator: SlideOrchestrator,
    pub host: Arc<dyn ImageHost>,
    pub default_account: CloudinaryAccount,
    pub max_body_bytes: usize,
}

/// Status code plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn failure(err: &Error) -> Self {
        Self::error(err.status_code(), &err.to_string())
    }

    fn error(status: u16, message: &str) -> Self {
        Self { status, body: json!({ "success": false, "error": message }) }
    }
}

/// Where a `/generate` request is in its lifecycle; failure can occur in any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Rendering,
    Uploading,
    Responding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Rendering => "rendering",
            Stage::Uploading => "uploading",
            Stage::Responding => "responding",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    template: Option<String>,
    background_url: Option<String>,
    slides: Option<Value>,
    cloudinary_preset: Option<String>,
    cloudinary_cloud_name: Option<String>,
}

/// A request that passed validation.
#[derive(Debug, Clone)]
pub struct GenerateJob {
    pub family: String,
    pub background_url: String,
    pub slides: Vec<SlideSpec>,
    pub account: CloudinaryAccount,
}

/// One hosted slide in the success response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub slide_index: usize,
    #[serde(rename = "type")]
    pub slide_type: String,
    pub url: String,
}

/// Parse and validate a `/generate` body.
pub fn parse_job(body: &[u8], defaults: &CloudinaryAccount) -> Result<GenerateJob> {
    let req: GenerateRequest =
        serde_json::from_slice(body).map_err(|e| Error::Validation(format!("Invalid JSON body: {}", e)))?;

    let background_url = match req.background_url {
        Some(url) if !url.is_empty() => url,
        _ => return Err(Error::Validation("Missing backgroundUrl".into())),
    };

    let items = match req.slides {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => return Err(Error::Validation("Missing or empty slides array".into())),
    };
    let slides = items
        .into_iter()
        .enumerate()
        .map(|(i, v)| SlideSpec::from_value(i + 1, v))
        .collect::<Result<Vec<_>>>()?;

    Ok(GenerateJob {
        family: req.template.unwrap_or_else(|| DEFAULT_TEMPLATE_FAMILY.to_string()),
        background_url,
        slides,
        account: CloudinaryAccount {
            cloud_name: req.cloudinary_cloud_name.unwrap_or_else(|| defaults.cloud_name.clone()),
            upload_preset: req.cloudinary_preset.unwrap_or_else(|| defaults.upload_preset.clone()),
        },
    })
}

/// Route one request. `received` is when the request arrived, before its body was read.
pub async fn route(state: &AppState, method: &str, url: &str, body: &[u8], received: Instant) -> ApiResponse {
    let path = url.split('?').next().unwrap_or(url);
    match (method, path) {
        ("GET", "/health") => health(),
        ("POST", "/generate") => handle_generate(state, body, received).await,
        (_, "/health") | (_, "/generate") => ApiResponse::error(405, "Method not allowed"),
        _ => ApiResponse::error(404, "Not found"),
    }
}

fn health() -> ApiResponse {
    ApiResponse::ok(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

/// `POST /generate`: validate, render every slide, upload every image.
///
/// Any error ends the request with a failure envelope; images already
/// uploaded are not returned. The reported duration runs from `received`.
pub async fn handle_generate(state: &AppState, body: &[u8], received: Instant) -> ApiResponse {
    let mut stage = Stage::Validating;

    match generate(state, body, &mut stage).await {
        Ok(images) => {
            stage = Stage::Responding;
            debug!("[Generate] {}", stage);
            let duration = received.elapsed().as_millis();
            info!("[Complete] {} images in {}ms", images.len(), duration);
            ApiResponse::ok(json!({
                "success": true,
                "images": images,
                "duration": format!("{}ms", duration),
            }))
        }
        Err(e) => {
            match &e {
                Error::Validation(_) => warn!("[Generate] Rejected while {}: {}", stage, e),
                _ => error!("[Error] Failed while {}: {}", stage, e),
            }
            ApiResponse::failure(&e)
        }
    }
}

async fn generate(state: &AppState, body: &[u8], stage: &mut Stage) -> Result<Vec<UploadResult>> {
    let job = parse_job(body, &state.default_account)?;
    info!("[Generate] Template: {}, Slides: {}", job.family, job.slides.len());

    *stage = Stage::Rendering;
    let images = state
        .orchestrator
        .render_slides(&job.family, &job.background_url, &job.slides)
        .await?;
    info!("[Render] Generated {} images", images.len());

    *stage = Stage::Uploading;
    upload_all(state.host.as_ref(), images, &job.account).await
}

/// Upload images one at a time, in order. Each buffer is released once sent.
pub async fn upload_all(
    host: &dyn ImageHost,
    images: Vec<RenderedImage>,
    account: &CloudinaryAccount,
) -> Result<Vec<UploadResult>> {
    let total = images.len();
    let mut uploaded: Vec<UploadResult> = Vec::with_capacity(total);

    for image in images {
        let public_id = format!("ig_{}_slide_{}", Utc::now().timestamp_millis(), image.slide_index);
        match host.upload(&image.png, &public_id, account).await {
            Ok(url) => {
                info!("[Upload] Slide {} uploaded", image.slide_index);
                uploaded.push(UploadResult {
                    slide_index: image.slide_index,
                    slide_type: image.slide_type,
                    url,
                });
            }
            Err(e) => {
                if !uploaded.is_empty() {
                    let hosted: Vec<&str> = uploaded.iter().map(|u| u.url.as_str()).collect();
                    warn!(
                        "[Upload] Aborted at slide {} of {}; already hosted: {}",
                        image.slide_index,
                        total,
                        hosted.join(", ")
                    );
                }
                return Err(e);
            }
        }
    }

    Ok(uploaded)
}

/// Bind the listening socket.
pub fn bind(addr: &str) -> Result<Arc<Server>> {
    Server::http(addr)
        .map(Arc::new)
        .map_err(|e| Error::ConfigError(format!("Failed to bind {}: {}", addr, e)))
}

/// Accept connections until [`Server::unblock`] is called, dispatching each
/// onto `runtime`.
pub fn spawn_accept_loop(
    server: Arc<Server>,
    state: Arc<AppState>,
    runtime: tokio::runtime::Handle,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for request in server.incoming_requests() {
            runtime.spawn(dispatch(state.clone(), request, Instant::now()));
        }
        info!("Accept loop stopped");
    })
}

async fn dispatch(state: Arc<AppState>, request: Request, received: Instant) {
    let method = request.method().to_string();
    let url = request.url().to_string();
    let limit = state.max_body_bytes;

    let read = tokio::task::spawn_blocking(move || {
        let mut request = request;
        let body = read_body(&mut request, limit);
        (request, body)
    })
    .await;
    let (request, body) = match read {
        Ok(pair) => pair,
        Err(e) => {
            error!("Body read task failed for {} {}: {}", method, url, e);
            return;
        }
    };

    let response = match body {
        Ok(body) => route(&state, &method, &url, &body, received).await,
        Err(e) => {
            warn!("{} {} rejected: {}", method, url, e);
            ApiResponse::failure(&e)
        }
    };

    match tokio::task::spawn_blocking(move || respond(request, response)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to write response for {} {}: {}", method, url, e),
        Err(e) => error!("Response task failed for {} {}: {}", method, url, e),
    }
}

fn read_body(request: &mut Request, limit: usize) -> Result<Vec<u8>> {
    if request.body_length().is_some_and(|len| len > limit) {
        return Err(Error::PayloadTooLarge(limit));
    }
    let mut body = Vec::new();
    request
        .as_reader()
        .take(limit as u64 + 1)
        .read_to_end(&mut body)
        .map_err(|e| Error::Validation(format!("Failed to read request body: {}", e)))?;
    if body.len() > limit {
        return Err(Error::PayloadTooLarge(limit));
    }
    Ok(body)
}

fn respond(request: Request, response: ApiResponse) -> std::io::Result<()> {
    let content_type = "Content-Type: application/json"
        .parse::<Header>()
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "bad header"))?;
    request.respond(
        Response::from_string(response.body.to_string())
            .with_status_code(response.status)
            .with_header(content_type),
    )
}
