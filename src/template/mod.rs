//! HTML slide templates: locating the file for a slide and filling it in.
//!
//! Templates are plain HTML with two kinds of placeholder:
//!
//! - `{{key}}` is replaced with the context value for `key`, or left verbatim
//!   when the key is absent so the gap is visible in the rendered image.
//! - `{{#if key}}...{{/if}}` keeps its body when `key` is truthy and is removed
//!   entirely otherwise. Blocks do not nest.

mod resolver;
mod substitute;

pub use resolver::{TemplateFamily, TemplateResolver};
pub use substitute::{is_truthy, substitute};
