//! The site: every discovered file, in one arena.
//!
//! Loading walks the four source folders, reads and parses files on the rayon
//! pool, and resolves each document's layout chain. The arena is then handed
//! through the pipeline stages: ordering and pagination mutate it on a single
//! thread, rendering reads it from many.
//!
//! ## Contributing files
//!
//! Each source file records which other files influenced its output (layouts,
//! partials, documents pulled in by queries). [`Site::all_contributing_files`]
//! follows these edges transitively, tolerating cycles.

use crate::config::{IoConfig, SiteConfig};
use crate::content::{
    DataFile, DataId, DocId, DocumentFile, DocumentOptions, FileId, FileRef, LayoutFile, LayoutId,
    MetadataCollection, SourceFile, StaticFile, relative_slash_path,
};
use crate::ordering::BookTree;
use crate::query::{Query, QueryResults, QuerySource};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// All content of one site.
#[derive(Debug, Clone)]
pub struct Site {
    pub root: PathBuf,
    pub config: SiteConfig,
    pub output_root: PathBuf,
    pub metadata: MetadataCollection,
    pub documents: Vec<DocumentFile>,
    pub layouts: Vec<LayoutFile>,
    pub data: Vec<DataFile>,
    pub files: Vec<StaticFile>,
    pub books: BookTree,
    document_index: HashMap<String, DocId>,
    layout_index: HashMap<String, LayoutId>,
}

impl Site {
    /// Discover and load everything under `root`.
    ///
    /// `render_extensions` decides which trailing extensions form a render
    /// chain (and so which files are documents rather than plain names).
    pub fn load(
        root: &Path,
        config: SiteConfig,
        render_extensions: &HashSet<String>,
    ) -> Result<Self, SiteError> {
        let output_root = root.join(&config.output);
        let options = DocumentOptions {
            output_root: output_root.clone(),
            root_url: config.root_url.clone(),
            clean_urls: config.urls.clean_urls,
            render_extensions: render_extensions.clone(),
        };
        let folders = &config.folders;

        let documents = load_text_files(&root.join(&folders.documents), &output_root, &config.io, |source, text| {
            DocumentFile::load(source, &text, &options)
        })?;
        let layouts = load_text_files(&root.join(&folders.layouts), &output_root, &config.io, |source, text| {
            LayoutFile::load(source, &text, render_extensions)
        })?;
        let data = load_text_files(&root.join(&folders.data), &output_root, &config.io, |source, text| {
            DataFile::load(source, &text)
        })?;

        let files_folder = root.join(&folders.files);
        let files = discover(&files_folder, &output_root)?
            .par_iter()
            .map(|path| {
                SourceFile::from_disk(&files_folder, path)
                    .map(|source| StaticFile::new(source, &output_root, &config.root_url))
                    .map_err(|source| SiteError::Io {
                        path: path.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            documents = documents.len(),
            layouts = layouts.len(),
            data = data.len(),
            files = files.len(),
            "loaded site"
        );

        let mut site = Self::from_parts(root, config, documents, layouts, data, files);
        site.resolve_layouts();
        Ok(site)
    }

    /// Assemble a site from already-loaded content.
    pub fn from_parts(
        root: &Path,
        config: SiteConfig,
        documents: Vec<DocumentFile>,
        layouts: Vec<LayoutFile>,
        data: Vec<DataFile>,
        files: Vec<StaticFile>,
    ) -> Self {
        let mut site = Self {
            root: root.to_path_buf(),
            output_root: root.join(&config.output),
            metadata: config.site_metadata(),
            config,
            documents,
            layouts,
            data,
            files,
            books: BookTree::default(),
            document_index: HashMap::new(),
            layout_index: HashMap::new(),
        };
        site.rebuild_indexes();
        site
    }

    fn rebuild_indexes(&mut self) {
        self.document_index.clear();
        for (i, doc) in self.documents.iter().enumerate() {
            if doc.is_clone() {
                continue;
            }
            self.document_index.entry(doc.id.clone()).or_insert(DocId(i));
        }
        self.layout_index.clear();
        for (i, layout) in self.layouts.iter().enumerate() {
            if self.layout_index.contains_key(&layout.id) {
                tracing::warn!(layout = %layout.id, "duplicate layout name, keeping the first");
                continue;
            }
            self.layout_index.insert(layout.id.clone(), LayoutId(i));
        }
    }

    /// Resolve every document's layout chain from its `layout` name.
    ///
    /// HTML documents without a `layout` get `default_layout` when that layout
    /// exists. Missing layouts and loops end the chain with a warning.
    pub fn resolve_layouts(&mut self) {
        let default = self
            .find_layout(&self.config.default_layout)
            .map(|_| self.config.default_layout.clone());
        let chains: Vec<Vec<LayoutId>> = self
            .documents
            .iter()
            .map(|doc| {
                if doc.partial {
                    return Vec::new();
                }
                let start = match &doc.layout_name {
                    Some(name) => Some(name.clone()),
                    None if doc.output.extension == "html" => default.clone(),
                    None => None,
                };
                self.layout_chain(start, &doc.source.relative_path)
            })
            .collect();
        for (doc, chain) in self.documents.iter_mut().zip(chains) {
            doc.layouts = chain;
        }
    }

    fn layout_chain(&self, start: Option<String>, document: &str) -> Vec<LayoutId> {
        let mut chain = Vec::new();
        let mut next = start;
        while let Some(name) = next {
            let Some(id) = self.find_layout(&name) else {
                tracing::warn!(layout = %name, document, "layout not found");
                break;
            };
            if chain.contains(&id) {
                tracing::warn!(layout = %name, document, "layout chain loops back on itself");
                break;
            }
            chain.push(id);
            next = self.layouts[id.0].layout.clone();
        }
        chain
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn document(&self, id: DocId) -> &DocumentFile {
        &self.documents[id.0]
    }

    pub fn layout(&self, id: LayoutId) -> &LayoutFile {
        &self.layouts[id.0]
    }

    /// Find a document (partials included, clones excluded) by Id.
    pub fn find_document(&self, id: &str) -> Option<DocId> {
        self.document_index
            .get(&id.trim().trim_matches('/').to_lowercase())
            .copied()
    }

    pub fn find_layout(&self, name: &str) -> Option<LayoutId> {
        self.layout_index
            .get(&name.trim().trim_matches('/').to_lowercase())
            .copied()
    }

    /// Documents visible to `documents` queries: no partials, drafts or clones.
    pub fn published_documents(&self) -> impl Iterator<Item = (DocId, &DocumentFile)> {
        self.documents
            .iter()
            .enumerate()
            .filter(|(_, d)| !d.partial && !d.draft && !d.is_clone())
            .map(|(i, d)| (DocId(i), d))
    }

    pub fn source_of(&self, file: FileRef) -> &SourceFile {
        match file {
            FileRef::Document(id) => &self.documents[id.0].source,
            FileRef::Layout(id) => &self.layouts[id.0].source,
            FileRef::Data(id) => &self.data[id.0].source,
            FileRef::File(id) => &self.files[id.0].source,
        }
    }

    fn source_of_mut(&mut self, file: FileRef) -> &mut SourceFile {
        match file {
            FileRef::Document(id) => &mut self.documents[id.0].source,
            FileRef::Layout(id) => &mut self.layouts[id.0].source,
            FileRef::Data(id) => &mut self.data[id.0].source,
            FileRef::File(id) => &mut self.files[id.0].source,
        }
    }

    /// Path relative to the site root, `/`-separated.
    pub fn root_relative(&self, path: &Path) -> String {
        relative_slash_path(&self.root, path)
    }

    /// Append a document (a pagination clone) to the arena.
    pub fn push_document(&mut self, document: DocumentFile) -> DocId {
        self.documents.push(document);
        DocId(self.documents.len() - 1)
    }

    /// Run a query against its source collection.
    pub fn execute(&self, query: &Query) -> QueryResults<FileRef> {
        match query.source {
            QuerySource::Documents => query.execute(
                self.published_documents()
                    .map(|(id, d)| (FileRef::Document(id), d)),
            ),
            QuerySource::Data => query.execute(
                self.data
                    .iter()
                    .enumerate()
                    .map(|(i, d)| (FileRef::Data(DataId(i)), d)),
            ),
            QuerySource::Files => query.execute(
                self.files
                    .iter()
                    .enumerate()
                    .map(|(i, f)| (FileRef::File(FileId(i)), f)),
            ),
            QuerySource::Layouts => query.execute(
                self.layouts
                    .iter()
                    .enumerate()
                    .map(|(i, l)| (FileRef::Layout(LayoutId(i)), l)),
            ),
        }
    }

    // =========================================================================
    // Contributing files
    // =========================================================================

    /// Record that `contributor` influenced `file`. Self-edges are ignored.
    pub fn add_contributing_file(&mut self, file: FileRef, contributor: FileRef) -> bool {
        if file == contributor {
            return false;
        }
        self.source_of_mut(file).add_contributing_file(contributor)
    }

    /// Record every edge gathered during a render.
    pub fn record_contributions(&mut self, edges: Vec<(DocId, Vec<FileRef>)>) {
        for (document, contributors) in edges {
            for contributor in contributors {
                self.add_contributing_file(FileRef::Document(document), contributor);
            }
        }
    }

    /// Breadth-first closure of contributing files, excluding `file` itself.
    pub fn all_contributing_files(&self, file: FileRef) -> Vec<FileRef> {
        let mut visited = HashSet::from([file]);
        let mut queue = VecDeque::from([file]);
        let mut found = Vec::new();
        while let Some(current) = queue.pop_front() {
            for &next in self.source_of(current).contributing_files() {
                if visited.insert(next) {
                    found.push(next);
                    queue.push_back(next);
                }
            }
        }
        found
    }
}

/// Files under `folder`, sorted, skipping hidden entries and the output folder.
/// A missing folder yields nothing.
fn discover(folder: &Path, output_root: &Path) -> Result<Vec<PathBuf>, SiteError> {
    if !folder.is_dir() {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    let walker = WalkDir::new(folder)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let hidden = entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.');
            !hidden && entry.path() != output_root
        });
    for entry in walker {
        let entry = entry.map_err(|source| SiteError::Walk {
            path: folder.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

fn load_text_files<T, F>(
    folder: &Path,
    output_root: &Path,
    io_config: &IoConfig,
    parse: F,
) -> Result<Vec<T>, SiteError>
where
    T: Send,
    F: Fn(SourceFile, String) -> T + Sync,
{
    discover(folder, output_root)?
        .par_iter()
        .map(|path| {
            let wrap = |source| SiteError::Io {
                path: path.clone(),
                source,
            };
            let text = read_with_retry(path, io_config).map_err(wrap)?;
            let source = SourceFile::from_disk(folder, path).map_err(wrap)?;
            Ok(parse(source, text))
        })
        .collect()
}

/// Read a file, retrying transient failures a bounded number of times.
pub fn read_with_retry(path: &Path, config: &IoConfig) -> io::Result<String> {
    let mut attempt = 0;
    loop {
        match std::fs::read_to_string(path) {
            Ok(text) => return Ok(text),
            Err(e)
                if attempt < config.retries
                    && !matches!(
                        e.kind(),
                        io::ErrorKind::NotFound | io::ErrorKind::InvalidData
                    ) =>
            {
                attempt += 1;
                tracing::debug!(path = %path.display(), attempt, error = %e, "retrying read");
                std::thread::sleep(Duration::from_millis(config.retry_delay_ms));
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{render_extensions, write_file};
    use tempfile::TempDir;

    fn load(tmp: &TempDir) -> Site {
        Site::load(tmp.path(), SiteConfig::default(), &render_extensions()).unwrap()
    }

    // =========================================================================
    // Discovery
    // =========================================================================

    #[test]
    fn loads_all_four_folders() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "documents/index.html.tpl", "Home");
        write_file(tmp.path(), "documents/blog/post.html.md", "# Post");
        write_file(tmp.path(), "layouts/default.html.tpl", "{{content}}");
        write_file(tmp.path(), "data/authors.txt", "name: Ann");
        write_file(tmp.path(), "files/css/site.css", "body {}");

        let site = load(&tmp);
        assert_eq!(site.documents.len(), 2);
        assert_eq!(site.layouts.len(), 1);
        assert_eq!(site.data.len(), 1);
        assert_eq!(site.files.len(), 1);
        assert_eq!(site.files[0].output.relative_path, "css/site.css");
    }

    #[test]
    fn discovery_order_is_sorted_and_skips_hidden() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "documents/b.html.md", "");
        write_file(tmp.path(), "documents/a.html.md", "");
        write_file(tmp.path(), "documents/.hidden.html.md", "");
        write_file(tmp.path(), "documents/.git/x.html.md", "");

        let site = load(&tmp);
        let ids: Vec<&str> = site.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn missing_folders_are_empty() {
        let tmp = TempDir::new().unwrap();
        let site = load(&tmp);
        assert!(site.documents.is_empty());
        assert!(site.files.is_empty());
    }

    #[test]
    fn read_with_retry_gives_up_on_missing_file() {
        let tmp = TempDir::new().unwrap();
        let config = IoConfig {
            retries: 2,
            retry_delay_ms: 1,
        };
        let err = read_with_retry(&tmp.path().join("nope"), &config).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    // =========================================================================
    // Layout resolution
    // =========================================================================

    #[test]
    fn layout_chain_follows_parent_layouts() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "documents/post.html.md", "---\nlayout: post\n---\nx");
        write_file(tmp.path(), "layouts/post.html.tpl", "---\nlayout: default\n---\n{{content}}");
        write_file(tmp.path(), "layouts/default.html.tpl", "{{content}}");

        let site = load(&tmp);
        let chain: Vec<&str> = site.documents[0]
            .layouts
            .iter()
            .map(|&l| site.layout(l).id.as_str())
            .collect();
        assert_eq!(chain, vec!["post", "default"]);
    }

    #[test]
    fn default_layout_applies_to_html_only() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "documents/page.html.md", "x");
        write_file(tmp.path(), "documents/feed.xml.tpl", "x");
        write_file(tmp.path(), "layouts/default.html.tpl", "{{content}}");

        let site = load(&tmp);
        let feed = site.find_document("feed").unwrap();
        let page = site.find_document("page").unwrap();
        assert!(site.document(feed).layouts.is_empty());
        assert_eq!(site.document(page).layouts.len(), 1);
    }

    #[test]
    fn missing_and_looping_layouts_end_the_chain() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "documents/a.html.md", "---\nlayout: nowhere\n---\n");
        write_file(tmp.path(), "documents/b.html.md", "---\nlayout: one\n---\n");
        write_file(tmp.path(), "layouts/one.html.tpl", "---\nlayout: two\n---\n");
        write_file(tmp.path(), "layouts/two.html.tpl", "---\nlayout: one\n---\n");

        let site = load(&tmp);
        assert!(site.documents[0].layouts.is_empty());
        assert_eq!(site.documents[1].layouts.len(), 2);
    }

    // =========================================================================
    // Queries and contributing files
    // =========================================================================

    #[test]
    fn documents_query_skips_partials_and_drafts() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "documents/a.html.md", "");
        write_file(tmp.path(), "documents/b.html.md", "---\ndraft: true\n---\n");
        write_file(tmp.path(), "documents/nav.partial.tpl", "");

        let site = load(&tmp);
        let results = site.execute(&Query::parse("documents").unwrap());
        assert_eq!(results.len(), 1);
        assert!(site.find_document("nav").is_some());
    }

    #[test]
    fn contributing_closure_is_transitive_and_cycle_safe() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "documents/a.html.md", "");
        write_file(tmp.path(), "documents/b.html.md", "");
        write_file(tmp.path(), "documents/c.html.md", "");
        let mut site = load(&tmp);
        let [a, b, c] = [0, 1, 2].map(|i| FileRef::Document(DocId(i)));

        assert!(site.add_contributing_file(a, b));
        assert!(site.add_contributing_file(b, c));
        assert!(site.add_contributing_file(c, a));
        assert!(!site.add_contributing_file(a, a));

        assert_eq!(site.all_contributing_files(a), vec![b, c]);
        assert_eq!(site.all_contributing_files(c), vec![a, b]);
    }
}
