//! Renderer seam between slide orchestration and the browser backend.

use crate::Result;
use async_trait::async_trait;

/// Turns final slide HTML into a fixed-size PNG.
///
/// Implementations own their browser resources; each call must release any
/// per-call surface (tab) before returning, whether it succeeded or not.
#[async_trait]
pub trait SnapshotRenderer: Send + Sync {
    async fn render_png(&self, html: &str) -> Result<Vec<u8>>;
}

/// A rendered slide, held until it is handed to the image host.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    /// 1-based position in the request
    pub slide_index: usize,
    /// Slide type the image was rendered from
    pub slide_type: String,
    /// PNG bytes
    pub png: Vec<u8>,
}
