//! Slide orchestration: per-slide context building, template filling and
//! rendering, in input order.

use crate::render::{RenderedImage, SnapshotRenderer};
use crate::template::{is_truthy, substitute, TemplateResolver};
use crate::{Error, Result};
use log::{debug, info};
use serde_json::{Map, Value};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// One slide as supplied by the caller: a `type` plus arbitrary fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideSpec {
    slide_type: String,
    fields: Map<String, Value>,
}

impl SlideSpec {
    pub fn new(slide_type: impl Into<String>) -> Self {
        let slide_type = slide_type.into();
        let mut fields = Map::new();
        fields.insert("type".to_string(), Value::String(slide_type.clone()));
        Self { slide_type, fields }
    }

    /// Builder-style field setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != "type" {
            self.fields.insert(key, value.into());
        }
        self
    }

    /// Parse the `position`-th (1-based) element of a request's `slides` array.
    pub fn from_value(position: usize, value: Value) -> Result<Self> {
        let invalid = || Error::Validation(format!("Slide {} is missing a string \"type\" field", position));
        let Value::Object(fields) = value else {
            return Err(invalid());
        };
        let slide_type = match fields.get("type") {
            Some(Value::String(t)) => t.clone(),
            _ => return Err(invalid()),
        };
        Ok(Self { slide_type, fields })
    }

    pub fn slide_type(&self) -> &str {
        &self.slide_type
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Key/value map a single slide's template is filled from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderContext {
    values: Map<String, Value>,
}

impl RenderContext {
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Slide fields overlaid with the computed ones; computed keys win.
    pub fn for_slide(slide: &SlideSpec, batch: &BatchFields, slide_index: usize) -> Self {
        let mut values = slide.fields.clone();
        values.insert("slideIndex".to_string(), Value::from(slide_index));
        values.insert("totalSlides".to_string(), Value::from(batch.total_slides));
        values.insert("backgroundUrl".to_string(), Value::String(batch.background_url.clone()));
        values.insert("coverTitle".to_string(), batch.cover_title.clone());
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

/// Values computed once per request and shared by every slide.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFields {
    pub total_slides: usize,
    pub background_url: String,
    pub cover_title: Value,
}

impl BatchFields {
    pub fn new(background_url: &str, slides: &[SlideSpec]) -> Self {
        Self {
            total_slides: slides.len(),
            background_url: background_url.to_string(),
            cover_title: cover_title(slides),
        }
    }
}

/// First slide's `title`, else its `quote`, else the empty string.
pub fn cover_title(slides: &[SlideSpec]) -> Value {
    slides
        .first()
        .and_then(|first| {
            ["title", "quote"]
                .iter()
                .filter_map(|key| first.get(key))
                .find(|v| is_truthy(v))
                .cloned()
        })
        .unwrap_or_else(|| Value::String(String::new()))
}

/// Renders a request's slides one at a time through the injected renderer.
pub struct SlideOrchestrator {
    resolver: TemplateResolver,
    renderer: Arc<dyn SnapshotRenderer>,
}

impl SlideOrchestrator {
    pub fn new(resolver: TemplateResolver, renderer: Arc<dyn SnapshotRenderer>) -> Self {
        Self { resolver, renderer }
    }

    /// Render every slide, returning images in input order.
    ///
    /// All templates are resolved before the first render, so an unmapped
    /// slide type fails the request without rendering anything.
    pub async fn render_slides(
        &self,
        family: &str,
        background_url: &str,
        slides: &[SlideSpec],
    ) -> Result<Vec<RenderedImage>> {
        if slides.is_empty() {
            return Err(Error::Validation("Missing or empty slides array".into()));
        }

        let paths = slides
            .iter()
            .map(|s| self.resolver.resolve(family, s.slide_type()))
            .collect::<Result<Vec<_>>>()?;

        let batch = BatchFields::new(background_url, slides);
        let mut templates: HashMap<PathBuf, String> = HashMap::new();
        let mut images = Vec::with_capacity(slides.len());

        for (i, (slide, path)) in slides.iter().zip(paths).enumerate() {
            let slide_index = i + 1;
            let raw = match templates.entry(path.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(self.resolver.load(&path).await?),
            };

            let ctx = RenderContext::for_slide(slide, &batch, slide_index);
            let html = substitute(raw, &ctx);
            debug!("[Render] Slide {} using {}", slide_index, path.display());

            let png = self.renderer.render_png(&html).await?;
            info!(
                "[Render] Slide {}/{} ({}) rendered, {} bytes",
                slide_index,
                batch.total_slides,
                slide.slide_type(),
                png.len()
            );

            images.push(RenderedImage {
                slide_index,
                slide_type: slide.slide_type().to_string(),
                png,
            });
        }

        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_requires_string_type() {
        let spec = SlideSpec::from_value(1, json!({"type": "cover", "title": "Hi"})).unwrap();
        assert_eq!(spec.slide_type(), "cover");
        assert_eq!(spec.get("title"), Some(&json!("Hi")));

        for bad in [json!({"title": "x"}), json!({"type": 3}), json!("cover"), json!(null)] {
            let err = SlideSpec::from_value(2, bad).unwrap_err();
            assert_eq!(err.to_string(), "Slide 2 is missing a string \"type\" field");
        }
    }

    #[test]
    fn test_cover_title_prefers_title_then_quote() {
        let slides = vec![SlideSpec::new("cover").with("title", "T").with("quote", "Q")];
        assert_eq!(cover_title(&slides), json!("T"));

        let slides = vec![SlideSpec::new("quote-cover").with("title", "").with("quote", "Q")];
        assert_eq!(cover_title(&slides), json!("Q"));

        let slides = vec![SlideSpec::new("cover"), SlideSpec::new("content").with("title", "later")];
        assert_eq!(cover_title(&slides), json!(""));

        assert_eq!(cover_title(&[]), json!(""));
    }

    #[test]
    fn test_computed_fields_override_slide_fields() {
        let slide = SlideSpec::new("content")
            .with("slideIndex", 99)
            .with("backgroundUrl", "https://evil.example/bg.png")
            .with("body", "text");
        let batch = BatchFields {
            total_slides: 3,
            background_url: "https://cdn.example/bg.jpg".into(),
            cover_title: json!("Cover"),
        };
        let ctx = RenderContext::for_slide(&slide, &batch, 2);

        assert_eq!(ctx.get("slideIndex"), Some(&json!(2)));
        assert_eq!(ctx.get("totalSlides"), Some(&json!(3)));
        assert_eq!(ctx.get("backgroundUrl"), Some(&json!("https://cdn.example/bg.jpg")));
        assert_eq!(ctx.get("coverTitle"), Some(&json!("Cover")));
        assert_eq!(ctx.get("body"), Some(&json!("text")));
        assert_eq!(ctx.get("type"), Some(&json!("content")));
    }

    #[test]
    fn test_with_does_not_change_type() {
        let slide = SlideSpec::new("cover").with("type", "cta");
        assert_eq!(slide.slide_type(), "cover");
        assert_eq!(slide.get("type"), Some(&json!("cover")));
    }
}
