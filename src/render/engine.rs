//! The renderer plugin contract and the extension registry.

use super::context::Context;
use super::markdown::MarkdownRenderer;
use super::template::TemplateRenderer;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("{path}: {message}")]
    Template { path: PathBuf, message: String },
    #[error("{path}: {extension} renderer failed: {message}")]
    Engine {
        path: PathBuf,
        extension: String,
        message: String,
    },
}

/// What is being rendered: the file a template came from and the extension
/// whose engine is running.
#[derive(Debug, Clone, Copy)]
pub struct SourceDescriptor<'a> {
    pub path: &'a Path,
    /// Folder-relative, `/`-separated.
    pub relative_path: &'a str,
    pub extension: &'a str,
}

/// A template engine.
///
/// `render` receives the text produced so far (the file body for the first
/// extension in a chain, the previous engine's output after that). Returning
/// `Ok(None)` means the engine produced nothing; the document is skipped.
pub trait Renderer: Send + Sync {
    /// Lowercase extensions this engine handles.
    fn extensions(&self) -> &[&'static str];

    fn render(
        &self,
        source: &SourceDescriptor<'_>,
        template: &str,
        context: &Context<'_>,
    ) -> Result<Option<String>, RenderError>;

    /// Forget anything compiled from `paths`.
    fn unload(&self, _paths: &[PathBuf]) {}
}

/// Lowercase extension → engine.
#[derive(Clone, Default)]
pub struct RendererRegistry {
    engines: HashMap<String, Arc<dyn Renderer>>,
}

impl std::fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut extensions: Vec<&String> = self.engines.keys().collect();
        extensions.sort();
        f.debug_struct("RendererRegistry")
            .field("extensions", &extensions)
            .finish()
    }
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Markdown (`md`, `markdown`) and templates (`tpl`).
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MarkdownRenderer));
        registry.register(Arc::new(TemplateRenderer::new()));
        registry
    }

    /// Register `engine` for each of its extensions, replacing earlier ones.
    pub fn register(&mut self, engine: Arc<dyn Renderer>) {
        for ext in engine.extensions() {
            if self
                .engines
                .insert(ext.to_lowercase(), Arc::clone(&engine))
                .is_some()
            {
                tracing::debug!(extension = ext, "renderer replaced");
            }
        }
    }

    pub fn get(&self, extension: &str) -> Option<&Arc<dyn Renderer>> {
        self.engines.get(&extension.to_lowercase())
    }

    pub fn extensions(&self) -> HashSet<String> {
        self.engines.keys().cloned().collect()
    }

    /// Ask every engine to drop cached state for `paths`.
    pub fn unload(&self, paths: &[PathBuf]) {
        // One engine may be registered under several extensions.
        let mut seen: Vec<&Arc<dyn Renderer>> = Vec::new();
        for engine in self.engines.values() {
            if seen.iter().any(|s| Arc::ptr_eq(s, engine)) {
                continue;
            }
            seen.push(engine);
            engine.unload(paths);
        }
    }
}
