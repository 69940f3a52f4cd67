//! Shared test utilities for the folio test suite.
//!
//! Provides fixture builders for on-disk sites and in-memory documents, and
//! lookups that panic with a clear message on a miss.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = site_with(&[
//!     ("documents/index.html.tpl", "Home"),
//!     ("layouts/default.html.tpl", "<main>{{content}}</main>"),
//! ]);
//! let site = loaded_site(tmp.path());
//! let home = find_doc(&site, "");
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::TempDir;

use crate::config::SiteConfig;
use crate::content::{DocId, DocumentFile, DocumentOptions, SourceFile};
use crate::naming::parse_date;
use crate::render::RendererRegistry;
use crate::site::Site;

// =========================================================================
// Fixture setup
// =========================================================================

/// Write `contents` to `root/relative`, creating parent folders.
pub fn write_file(root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

/// A temp site root containing `files` (`(relative path, contents)`).
pub fn site_with(files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for (relative, contents) in files {
        write_file(tmp.path(), relative, contents);
    }
    tmp
}

/// Extensions handled by the built-in renderers.
pub fn render_extensions() -> HashSet<String> {
    RendererRegistry::with_builtin().extensions()
}

/// Load the site at `root` with default config.
pub fn loaded_site(root: &Path) -> Site {
    Site::load(root, SiteConfig::default(), &render_extensions()).unwrap()
}

// =========================================================================
// In-memory documents
// =========================================================================

/// A bare document with the given identity, for ordering tests.
pub fn doc(id: &str, parent_id: &str, order: i64, date: &str) -> DocumentFile {
    let relative = if id.is_empty() {
        "index.html".to_string()
    } else {
        format!("{id}.html")
    };
    let source = SourceFile::new(
        PathBuf::from("/site/documents").join(&relative),
        relative,
        SystemTime::UNIX_EPOCH,
        SystemTime::UNIX_EPOCH,
    );
    let options = DocumentOptions {
        output_root: PathBuf::from("/site/build"),
        root_url: "/".into(),
        clean_urls: true,
        render_extensions: HashSet::new(),
    };
    let mut document = DocumentFile::load(source, "", &options);
    document.id = id.to_string();
    document.parent_id = parent_id.to_string();
    document.order = order;
    document.date = parse_date(date).unwrap_or_else(|| panic!("bad test date '{date}'"));
    document
}

// =========================================================================
// Lookups
// =========================================================================

/// Position of the document with `id` in `documents`. Panics if absent.
pub fn doc_index(documents: &[DocumentFile], id: &str) -> DocId {
    documents
        .iter()
        .position(|d| d.id == id && !d.is_clone())
        .map(DocId)
        .unwrap_or_else(|| {
            let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
            panic!("document '{id}' not found. Available: {ids:?}")
        })
}

/// Find a document in a loaded site by Id. Panics if absent.
pub fn find_doc<'a>(site: &'a Site, id: &str) -> &'a DocumentFile {
    let index = doc_index(&site.documents, id);
    site.document(index)
}
