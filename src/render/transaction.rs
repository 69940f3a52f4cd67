//! The render transaction: one build's rendering, in two phases.
//!
//! [`RenderTransaction::begin`] borrows the site mutably for the lifetime of
//! the transaction, so a second transaction cannot be opened while one is
//! active. Renderers reach the site, other documents and partials only
//! through the [`Context`] handed to them, which carries the transaction.
//!
//! ```text
//! phase 1  par_iter(targets): own content   body → ext₁ → ext₂ → …
//! phase 2  par_iter(targets): layout chain  content → layout₁ → layout₂ → …
//! ```
//!
//! Phase 2 starts only after phase 1 has finished for every target, because a
//! template may read any other document's content. Content is memoized per
//! document and rendered on first use, so partials and documents read through
//! queries render lazily, once. Two threads may race to render the same
//! document; the first result stored wins.
//!
//! The only shared mutations are the per-document contributing-file lists
//! (behind a `Mutex`) and the memoized content (a `OnceLock`).
//! [`RenderTransaction::commit`] hands the collected edges back so the
//! caller can record them on the site once the borrow has ended.

use super::context::{Context, Scope};
use super::engine::{RendererRegistry, SourceDescriptor};
use crate::content::{DocId, FileRef, MetadataCollection};
use crate::site::Site;
use rayon::prelude::*;
use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::sync::{Mutex, OnceLock, PoisonError};

/// Layout keys never copied onto a document.
const LAYOUT_EXCLUDED_KEYS: &[&str] = &[
    "id",
    "extension",
    "layout",
    "modified",
    "name",
    "sourcepath",
    "sourcecontent",
];

/// Documents whose own content is being rendered on this thread, outermost
/// first. Used to break include cycles.
#[derive(Debug, Default)]
pub(crate) struct RenderStack {
    open: RefCell<Vec<DocId>>,
    /// Depth of the lowest open frame inside a cycle that was cut.
    cut_from: Cell<Option<usize>>,
}

impl RenderStack {
    /// Open a frame for `id` and return its depth. When `id` is already open
    /// the cycle is cut instead: every frame from `id` up is marked.
    fn enter(&self, id: DocId) -> Option<usize> {
        let mut open = self.open.borrow_mut();
        if let Some(at) = open.iter().position(|&d| d == id) {
            let floor = self.cut_from.get().map_or(at, |floor| floor.min(at));
            self.cut_from.set(Some(floor));
            return None;
        }
        open.push(id);
        Some(open.len() - 1)
    }

    /// Close the frame at `depth`. Returns whether its content was rendered
    /// with a cycle cut, and so depends on where the cycle was entered.
    fn leave(&self, depth: usize) -> bool {
        self.open.borrow_mut().truncate(depth);
        let cut = self.cut_from.get().is_some_and(|floor| floor <= depth);
        if self.cut_from.get() == Some(depth) {
            self.cut_from.set(None);
        }
        cut
    }
}

/// A document that could not be rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFailure {
    pub document: DocId,
    pub message: String,
}

/// The final output of one target.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub document: DocId,
    /// `None` when the document was skipped or failed.
    pub output: Option<String>,
}

/// What a finished transaction hands back.
#[derive(Debug, Default)]
pub struct Commit {
    /// Contributing files observed per document.
    pub edges: Vec<(DocId, Vec<FileRef>)>,
    pub failures: Vec<RenderFailure>,
}

pub struct RenderTransaction<'s> {
    site: &'s Site,
    registry: &'s RendererRegistry,
    contents: Vec<OnceLock<Option<String>>>,
    edges: Vec<Mutex<Vec<FileRef>>>,
    failures: Mutex<Vec<RenderFailure>>,
}

impl<'s> RenderTransaction<'s> {
    pub fn begin(site: &'s mut Site, registry: &'s RendererRegistry) -> Self {
        let site: &'s Site = site;
        let count = site.documents.len();
        Self {
            site,
            registry,
            contents: (0..count).map(|_| OnceLock::new()).collect(),
            edges: (0..count).map(|_| Mutex::new(Vec::new())).collect(),
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn site(&self) -> &'s Site {
        self.site
    }

    /// Record that `file` contributed to `document`. Self-edges are dropped.
    pub(crate) fn record(&self, document: DocId, file: FileRef) {
        if file == FileRef::Document(document) {
            return;
        }
        let mut edges = self.edges[document.0]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !edges.contains(&file) {
            edges.push(file);
        }
    }

    pub(crate) fn fail(&self, document: DocId, message: String) {
        tracing::error!(
            document = %self.site.document(document).source.relative_path,
            "{message}"
        );
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RenderFailure { document, message });
    }

    /// Own content of `id`, rendering it on first use.
    ///
    /// Content rendered while an include cycle was cut is returned but not
    /// memoized, so every entry point into the cycle sees the same result.
    pub(crate) fn content(&self, id: DocId, stack: &RenderStack) -> Option<String> {
        let cell = &self.contents[id.0];
        if let Some(done) = cell.get() {
            return done.clone();
        }
        let Some(depth) = stack.enter(id) else {
            tracing::warn!(
                document = %self.site.document(id).source.relative_path,
                "document includes itself, ignoring the inner reference"
            );
            return None;
        };
        let rendered = self.render_own(id, stack);
        if stack.leave(depth) {
            return rendered;
        }
        // First writer wins if another thread got here too.
        let _ = cell.set(rendered);
        cell.get().cloned().flatten()
    }

    fn render_own(&self, id: DocId, stack: &RenderStack) -> Option<String> {
        let doc = self.site.document(id);
        let mut text = doc.body.clone();
        for extension in &doc.extensions {
            let source = SourceDescriptor {
                path: &doc.source.path,
                relative_path: &doc.source.relative_path,
                extension,
            };
            let context = Context::new(
                Scope::new(self, id, stack),
                Cow::Borrowed(&doc.metadata),
                None,
                None,
            );
            text = self.run(id, &source, &text, &context)?;
        }
        Some(text)
    }

    /// Wrap `content` in each layout of the document's chain, innermost first.
    fn apply_layouts(&self, id: DocId, mut content: String, stack: &RenderStack) -> Option<String> {
        let doc = self.site.document(id);
        let mut metadata: MetadataCollection = doc.metadata.clone();
        for &layout_id in &doc.layouts {
            let layout = self.site.layout(layout_id);
            if layout.extensions.is_empty() {
                tracing::warn!(
                    layout = %layout.source.relative_path,
                    document = %doc.source.relative_path,
                    "no renderer for layout, skipping it"
                );
                continue;
            }
            let mut text = layout.body.clone();
            for extension in &layout.extensions {
                let source = SourceDescriptor {
                    path: &layout.source.path,
                    relative_path: &layout.source.relative_path,
                    extension,
                };
                let context = Context::new(
                    Scope::new(self, id, stack),
                    Cow::Borrowed(&metadata),
                    Some(content.clone()),
                    Some(layout_id),
                );
                text = self.run(id, &source, &text, &context)?;
            }
            self.record(id, FileRef::Layout(layout_id));
            metadata.merge_missing(&layout.metadata, LAYOUT_EXCLUDED_KEYS);
            content = text;
        }
        Some(content)
    }

    fn run(
        &self,
        id: DocId,
        source: &SourceDescriptor<'_>,
        template: &str,
        context: &Context<'_>,
    ) -> Option<String> {
        let Some(engine) = self.registry.get(source.extension) else {
            tracing::warn!(
                file = source.relative_path,
                extension = source.extension,
                "no renderer for extension, skipping"
            );
            return None;
        };
        match engine.render(source, template, context) {
            Ok(Some(text)) => Some(text),
            Ok(None) => {
                tracing::warn!(
                    file = source.relative_path,
                    extension = source.extension,
                    "renderer produced no output, skipping"
                );
                None
            }
            Err(e) => {
                self.fail(id, e.to_string());
                None
            }
        }
    }

    /// Render `targets`: every own content first, then every layout chain.
    pub fn render(&self, targets: &[DocId]) -> Vec<Rendered> {
        targets.par_iter().for_each(|&id| {
            let stack = RenderStack::default();
            self.content(id, &stack);
        });
        tracing::debug!(documents = targets.len(), "own content rendered");

        targets
            .par_iter()
            .map(|&id| {
                let stack = RenderStack::default();
                let output = self
                    .content(id, &stack)
                    .and_then(|content| self.apply_layouts(id, content, &stack));
                Rendered {
                    document: id,
                    output,
                }
            })
            .collect()
    }

    /// End the transaction, returning the observed edges and failures.
    pub fn commit(self) -> Commit {
        let edges = self
            .edges
            .into_iter()
            .enumerate()
            .map(|(i, m)| (DocId(i), m.into_inner().unwrap_or_else(PoisonError::into_inner)))
            .filter(|(_, files)| !files.is_empty())
            .collect();
        Commit {
            edges,
            failures: self
                .failures
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
        }
    }
}
