//! Slideshot
//!
//! Renders a multi-slide image carousel (or quote sequence) from HTML
//! templates to fixed-size PNGs with headless Chrome, then publishes each
//! image to Cloudinary and returns the hosted URLs.
//!
//! # Pipeline
//!
//! - **Templates**: a (family, slide type) pair selects an HTML file, which is
//!   filled from the slide's fields plus computed ones (`slideIndex`,
//!   `totalSlides`, `backgroundUrl`, `coverTitle`).
//! - **Rendering**: each slide is loaded into a fresh 1080x1350 tab of one
//!   shared browser and captured once network activity and fonts settle.
//! - **Upload**: each PNG is sent to the image host with an unsigned preset.
//!
//! Slides are rendered and uploaded strictly one at a time. Any failure aborts
//! the whole request.
//!
//! # Example
//!
//! ```no_run
//! use slideshot::orchestrator::{SlideOrchestrator, SlideSpec};
//! use slideshot::template::TemplateResolver;
//! # use slideshot::render::SnapshotRenderer;
//! # async fn demo(renderer: std::sync::Arc<dyn SnapshotRenderer>) -> slideshot::Result<()> {
//! let orchestrator = SlideOrchestrator::new(TemplateResolver::new("templates"), renderer);
//! let slides = vec![SlideSpec::new("cover").with("title", "Five habits")];
//! let images = orchestrator
//!     .render_slides("carousel", "https://example.com/bg.jpg", &slides)
//!     .await?;
//! assert_eq!(images[0].slide_index, 1);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub mod orchestrator;
pub mod render;
pub mod server;
pub mod template;
pub mod upload;

#[cfg(feature = "cdp")]
pub mod cdp;

/// Configuration for the snapshot renderer
///
/// The defaults produce Instagram-portrait slides: a 1080x1350 viewport at
/// device scale 1, a 30 second network-idle budget and a 5 second font wait.
///
/// # Examples
///
/// ```
/// let cfg = slideshot::RenderConfig::default();
/// assert_eq!((cfg.viewport.width, cfg.viewport.height), (1080, 1350));
/// ```
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Viewport dimensions, also the exact screenshot size
    pub viewport: Viewport,
    /// Timeout for the page to reach network idle, in milliseconds
    pub timeout_ms: u64,
    /// How long to wait for web fonts before capturing anyway, in milliseconds
    pub font_wait_ms: u64,
    /// Chrome executable to launch instead of the auto-detected one
    pub chrome_path: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            timeout_ms: 30000,
            font_wait_ms: 5000,
            chrome_path: None,
        }
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1350,
        }
    }
}
