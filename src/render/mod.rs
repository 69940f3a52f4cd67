//! Rendering: pluggable engines, the render context and the transaction that
//! drives a build's rendering.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`engine`] | [`Renderer`] trait and the extension → engine [`RendererRegistry`] |
//! | [`markdown`] | Markdown engine (`md`, `markdown`) |
//! | [`template`] | Moustache-style template engine (`tpl`) |
//! | [`context`] | The values a template can read |
//! | [`transaction`] | Two-phase rendering and contributing-file capture |

pub mod context;
pub mod engine;
pub mod markdown;
pub mod template;
pub mod transaction;

pub use context::{Context, Object, Value};
pub use engine::{RenderError, Renderer, RendererRegistry, SourceDescriptor};
pub use markdown::MarkdownRenderer;
pub use template::{Template, TemplateRenderer};
pub use transaction::{Commit, RenderFailure, RenderTransaction, Rendered};
