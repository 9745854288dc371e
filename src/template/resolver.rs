use crate::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Top-level style set a request renders with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFamily {
    Carousel,
    Quote,
}

impl TemplateFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateFamily::Carousel => "carousel",
            TemplateFamily::Quote => "quote",
        }
    }

    /// Template file (relative to the templates root) for a slide type.
    pub fn file_for(&self, slide_type: &str) -> Option<&'static str> {
        match (self, slide_type) {
            (TemplateFamily::Carousel, "cover") => Some("carousel/cover.html"),
            (TemplateFamily::Carousel, "content") => Some("carousel/content.html"),
            (TemplateFamily::Carousel, "cta") => Some("carousel/cta.html"),
            (TemplateFamily::Quote, "quote-cover") => Some("quote/cover.html"),
            (TemplateFamily::Quote, "quote-reflection") => Some("quote/reflection.html"),
            _ => None,
        }
    }
}

impl fmt::Display for TemplateFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateFamily {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "carousel" => Ok(TemplateFamily::Carousel),
            "quote" => Ok(TemplateFamily::Quote),
            _ => Err(()),
        }
    }
}

/// Maps (family, slide type) pairs onto template files under a root directory.
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    root: PathBuf,
}

impl TemplateResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the template for `slide_type` in `family`.
    ///
    /// An unmapped pair (including an unknown family) is a configuration
    /// mismatch and fails with [`Error::UnknownTemplate`].
    pub fn resolve(&self, family: &str, slide_type: &str) -> Result<PathBuf> {
        family
            .parse::<TemplateFamily>()
            .ok()
            .and_then(|f| f.file_for(slide_type))
            .map(|file| self.root.join(file))
            .ok_or_else(|| Error::UnknownTemplate {
                family: family.to_string(),
                slide_type: slide_type.to_string(),
            })
    }

    /// Read a resolved template from disk.
    pub async fn load(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|source| Error::TemplateRead { path: path.to_path_buf(), source })
    }
}
