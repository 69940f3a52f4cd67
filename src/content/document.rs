//! Documents: source files that render to an output page.
//!
//! [`DocumentFile::load`] owns identity and URL derivation. No other module
//! recomputes output paths or URLs; they read [`DocumentFile::output`].
//!
//! ## Derivation, in order
//!
//! 1. `output` metadata replaces the source-relative path.
//! 2. Trailing rendering extensions are stripped from the filename. They form
//!    the render chain, innermost first (`a.html.tpl.md` renders `md` then
//!    `tpl`). A `.partial` marker makes the document a partial.
//! 3. A `YYYY-M-D-` prefix supplies the date (front matter wins) and an `N.-`
//!    prefix supplies the order (`order` metadata wins).
//! 4. An explicit date is injected as `YYYY/MM/DD` folders.
//! 5. Path segments are sanitized.
//! 6. `name.html` becomes `name/index.html` (clean URLs).
//!
//! Steps 3 to 6 can each be switched off with a `Disable*` metadata flag,
//! consumed here:
//!
//! ```text
//! DisableDateFromFileName   DisableOrderFromFileName   DisableInsertDateIntoPath
//! DisableSanitizePath       DisableCleanUrls
//! ```
//!
//! `Id` is the sanitized output path before clean-URL rewriting, without
//! extension and without a trailing `/index` (the site root index has Id
//! `""`). `ParentId` is the sanitized folder the source lives in, or for an
//! `index` document the folder above it, so `guide/index.html` sits beside
//! `guide`'s siblings and is the parent of `guide/*`.

use super::metadata::{MetaValue, MetadataCollection};
use super::source::{DocId, LayoutId, SourceFile};
use crate::frontmatter;
use crate::naming::{self, parse_file_name};
use crate::ordering::{BookId, NodeId};
use crate::paginate::Paginator;
use crate::query::Queryable;
use chrono::{Datelike, NaiveDateTime};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Where a file lands in the output tree and how it is addressed.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLocation {
    /// Absolute output path.
    pub path: PathBuf,
    /// Output-root-relative path, `/`-separated.
    pub relative_path: String,
    /// Lowercase target extension (`html`), empty when there is none.
    pub extension: String,
    pub root_url: String,
    /// URL path relative to `root_url`. Ends at the folder for `index.html`.
    pub relative_url: String,
}

impl OutputLocation {
    pub fn new(output_root: &Path, relative_path: &str, root_url: &str) -> Self {
        let relative_path = relative_path.trim_start_matches('/').to_string();
        let file_name = relative_path.rsplit('/').next().unwrap_or_default();
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        let relative_url = match relative_path.strip_suffix("index.html") {
            Some(folder) if folder.is_empty() || folder.ends_with('/') => folder.to_string(),
            _ => relative_path.clone(),
        };
        Self {
            path: output_root.join(&relative_path),
            relative_path,
            extension,
            root_url: root_url.to_string(),
            relative_url,
        }
    }

    /// `root_url` + `relative_url` with exactly one slash between them.
    pub fn url(&self) -> String {
        join_url(&self.root_url, &self.relative_url)
    }
}

/// Join URL parts with exactly one `/` between them.
pub fn join_url(root: &str, relative: &str) -> String {
    format!(
        "{}/{}",
        root.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

/// Site-wide inputs to identity derivation.
#[derive(Debug, Clone)]
pub struct DocumentOptions {
    pub output_root: PathBuf,
    pub root_url: String,
    pub clean_urls: bool,
    /// Lowercase extensions that have a registered renderer.
    pub render_extensions: HashSet<String>,
}

/// A renderable document and everything derived about it.
#[derive(Debug, Clone)]
pub struct DocumentFile {
    pub source: SourceFile,
    pub output: OutputLocation,
    /// Unique, lowercase lookup key.
    pub id: String,
    pub parent_id: String,
    /// 0 means unordered (chained by date).
    pub order: i64,
    /// Explicit date, or the source modified time when there is none.
    pub date: NaiveDateTime,
    pub draft: bool,
    pub partial: bool,
    pub paginate_query: Option<String>,
    /// Layout name requested by the document (`layout` metadata).
    pub layout_name: Option<String>,
    /// Resolved layout chain, innermost first.
    pub layouts: Vec<LayoutId>,
    /// Render chain, applied in order.
    pub extensions: Vec<String>,
    pub metadata: MetadataCollection,
    pub queries: IndexMap<String, String>,
    pub body: String,

    pub next: Option<DocId>,
    pub previous: Option<DocId>,
    pub parent: Option<DocId>,
    pub book: Option<BookId>,
    pub chapter: Option<NodeId>,
    pub paginator: Option<Paginator>,
    /// Set on pagination clones: the document this page was cloned from.
    pub cloned_from: Option<DocId>,
}

impl DocumentFile {
    /// Parse `text` and derive the document's identity.
    pub fn load(source: SourceFile, text: &str, options: &DocumentOptions) -> Self {
        let parsed = frontmatter::parse(text);
        let mut metadata = parsed.metadata;

        let relative = metadata
            .get_and_remove("output")
            .map(|v| v.to_string())
            .unwrap_or_else(|| source.relative_path.clone());
        let no_date_prefix = metadata.get_and_remove_flag("DisableDateFromFileName");
        let no_order_prefix = metadata.get_and_remove_flag("DisableOrderFromFileName");
        let no_date_folders = metadata.get_and_remove_flag("DisableInsertDateIntoPath");
        let no_sanitize = metadata.get_and_remove_flag("DisableSanitizePath");
        let no_clean_urls =
            metadata.get_and_remove_flag("DisableCleanUrls") || !options.clean_urls;

        let (folder, file_name) = match relative.trim_start_matches('/').rsplit_once('/') {
            Some((folder, name)) => (folder.to_string(), name.to_string()),
            None => (String::new(), relative.trim_start_matches('/').to_string()),
        };
        let (file_name, extensions, partial) =
            strip_render_extensions(&file_name, &options.render_extensions);

        let prefixes = parse_file_name(&file_name, !no_date_prefix, !no_order_prefix);
        let explicit_date = parsed.date.or(prefixes.date);
        let order = metadata
            .get_and_remove("order")
            .and_then(|v| v.as_int())
            .or(prefixes.order)
            .unwrap_or(0);

        let mut out_folder = folder.clone();
        if !no_date_folders && let Some(date) = explicit_date {
            let segments = format!("{:04}/{:02}/{:02}", date.year(), date.month(), date.day());
            out_folder = join_path(&out_folder, &segments);
        }
        let (out_folder, name) = if no_sanitize {
            (out_folder, prefixes.name)
        } else {
            (naming::sanitize_path(&out_folder), naming::sanitize(&prefixes.name))
        };

        let stem = name.rsplit_once('.').map_or(name.as_str(), |(stem, _)| stem);
        let id = id_from_path(&join_path(&out_folder, stem));
        let folder_id = naming::sanitize_path(&folder).to_lowercase();
        // An index stands for its folder: its parent is the folder's parent.
        let parent_id = if stem.eq_ignore_ascii_case("index") {
            folder_id
                .rsplit_once('/')
                .map_or_else(String::new, |(up, _)| up.to_string())
        } else {
            folder_id
        };

        let is_html = name.to_lowercase().ends_with(".html");
        let final_name = if !no_clean_urls && is_html && !name.eq_ignore_ascii_case("index.html") {
            format!("{stem}/index.html")
        } else {
            name.clone()
        };
        let output = OutputLocation::new(
            &options.output_root,
            &join_path(&out_folder, &final_name),
            &options.root_url,
        );

        let layout_name = metadata.get_and_remove("layout").map(|v| v.to_string());
        let paginate_query = metadata
            .get_and_remove("paginate")
            .map(|v| v.to_string())
            .filter(|q| !q.trim().is_empty());
        let date = explicit_date.unwrap_or_else(|| source.modified_date());

        Self {
            source,
            output,
            id,
            parent_id,
            order,
            date,
            draft: parsed.draft,
            partial,
            paginate_query,
            layout_name,
            layouts: Vec::new(),
            extensions,
            metadata,
            queries: parsed.queries,
            body: parsed.body,
            next: None,
            previous: None,
            parent: None,
            book: None,
            chapter: None,
            paginator: None,
            cloned_from: None,
        }
    }

    /// A copy of this document for another pagination page.
    ///
    /// Metadata is deep-copied, the contributing-file list starts empty, and
    /// the copy remembers which document it came from.
    pub fn clone_for_page(&self, original: DocId, output: OutputLocation) -> Self {
        let mut source = self.source.clone();
        source.clear_contributing_files();
        let stem = output
            .relative_path
            .rsplit_once('.')
            .map_or(output.relative_path.as_str(), |(stem, _)| stem);
        Self {
            source,
            id: id_from_path(stem),
            output,
            metadata: self.metadata.clone(),
            paginator: None,
            cloned_from: Some(original),
            ..self.clone()
        }
    }

    pub fn is_clone(&self) -> bool {
        self.cloned_from.is_some()
    }

    /// Metadata title, falling back to the Id.
    pub fn title(&self) -> String {
        self.metadata
            .get_text("title")
            .unwrap_or_else(|| self.id.clone())
    }
}

impl Queryable for DocumentFile {
    fn property(&self, name: &str) -> Option<MetaValue> {
        let value = match name.to_lowercase().as_str() {
            "id" => MetaValue::Text(self.id.clone()),
            "parentid" => MetaValue::Text(self.parent_id.clone()),
            "order" => MetaValue::Int(self.order),
            "date" => MetaValue::Date(self.date),
            "modified" => MetaValue::Date(self.source.modified_date()),
            "draft" => MetaValue::Bool(self.draft),
            "partial" => MetaValue::Bool(self.partial),
            "url" => MetaValue::Text(self.output.url()),
            "relativeurl" => MetaValue::Text(self.output.relative_url.clone()),
            "outputpath" => MetaValue::Text(self.output.relative_path.clone()),
            "sourcepath" => MetaValue::Text(self.source.relative_path.clone()),
            "extension" => MetaValue::Text(self.output.extension.clone()),
            _ => return self.metadata.get(name).cloned(),
        };
        Some(value)
    }
}

/// Strip rendering extensions and `.partial` markers from the end of a
/// filename. Returns the remaining name, the render chain and the partial flag.
fn strip_render_extensions(file_name: &str, known: &HashSet<String>) -> (String, Vec<String>, bool) {
    let mut name = file_name.to_string();
    let mut chain = Vec::new();
    let mut partial = false;
    while let Some((stem, ext)) = name.rsplit_once('.') {
        if stem.is_empty() {
            break;
        }
        let ext = ext.to_lowercase();
        if known.contains(&ext) {
            chain.push(ext);
        } else if ext == "partial" {
            partial = true;
        } else {
            break;
        }
        name = stem.to_string();
    }
    // `nav.partial.html` keeps its target extension.
    if let Some(pos) = name.to_lowercase().find(".partial.") {
        name.replace_range(pos..pos + ".partial".len(), "");
        partial = true;
    }
    (name, chain, partial)
}

fn join_path(folder: &str, name: &str) -> String {
    match (folder.trim_matches('/'), name.trim_start_matches('/')) {
        ("", name) => name.to_string(),
        (folder, "") => folder.to_string(),
        (folder, name) => format!("{folder}/{name}"),
    }
}

fn id_from_path(path: &str) -> String {
    let lower = path.trim_matches('/').to_lowercase();
    if lower == "index" {
        return String::new();
    }
    match lower.strip_suffix("/index") {
        Some(folder) => folder.to_string(),
        None => lower,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::SystemTime;

    fn options() -> DocumentOptions {
        DocumentOptions {
            output_root: PathBuf::from("/out"),
            root_url: "/".into(),
            clean_urls: true,
            render_extensions: ["md", "tpl"].iter().map(|s| s.to_string()).collect(),
        }
    }

    fn load(relative: &str, text: &str) -> DocumentFile {
        let source = SourceFile::new(
            PathBuf::from("/site/documents").join(relative),
            relative.to_string(),
            SystemTime::UNIX_EPOCH,
            SystemTime::UNIX_EPOCH,
        );
        DocumentFile::load(source, text, &options())
    }

    // =========================================================================
    // Identity and URLs
    // =========================================================================

    #[test]
    fn dated_file_name_moves_into_date_folders() {
        let doc = load("parent/2013-12-18-c.html.md", "Body");
        let expected = NaiveDate::from_ymd_opt(2013, 12, 18)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(doc.date, expected);
        assert_eq!(doc.output.relative_path, "parent/2013/12/18/c/index.html");
        assert_eq!(doc.output.url(), "/parent/2013/12/18/c/");
        assert_eq!(doc.id, "parent/2013/12/18/c");
        assert_eq!(doc.parent_id, "parent");
        assert_eq!(doc.extensions, vec!["md"]);
    }

    #[test]
    fn index_keeps_its_name_and_takes_folder_id() {
        let doc = load("blog/index.html.tpl", "");
        assert_eq!(doc.output.relative_path, "blog/index.html");
        assert_eq!(doc.output.relative_url, "blog/");
        assert_eq!(doc.id, "blog");
        assert_eq!(doc.parent_id, "");
    }

    #[test]
    fn nested_index_parent_is_the_folder_above() {
        let doc = load("docs/guide/index.html.md", "");
        assert_eq!(doc.id, "docs/guide");
        assert_eq!(doc.parent_id, "docs");
        let child = load("docs/guide/1.-intro.html.md", "");
        assert_eq!(child.parent_id, doc.id);
    }

    #[test]
    fn root_index_has_empty_id() {
        let doc = load("index.html.tpl", "");
        assert_eq!(doc.id, "");
        assert_eq!(doc.parent_id, "");
        assert_eq!(doc.output.url(), "/");
    }

    #[test]
    fn render_chain_is_innermost_first() {
        let doc = load("a.html.tpl.md", "");
        assert_eq!(doc.extensions, vec!["md", "tpl"]);
        assert_eq!(doc.output.relative_path, "a/index.html");
    }

    #[test]
    fn non_html_targets_are_not_rewritten() {
        let doc = load("feed.xml.tpl", "");
        assert_eq!(doc.output.relative_path, "feed.xml");
        assert_eq!(doc.output.extension, "xml");
        assert_eq!(doc.id, "feed");
    }

    #[test]
    fn order_prefix_sets_order() {
        let doc = load("guide/2.-install.html.md", "");
        assert_eq!(doc.order, 2);
        assert_eq!(doc.id, "guide/install");
    }

    #[test]
    fn order_metadata_wins_over_prefix() {
        let doc = load("guide/2.-install.html.md", "---\norder: 7\n---\n");
        assert_eq!(doc.order, 7);
        assert!(!doc.metadata.contains("order"));
    }

    #[test]
    fn front_matter_date_wins_over_prefix() {
        let doc = load("2013-12-18-c.html.md", "---\ndate: 2020-1-2\n---\n");
        assert_eq!(doc.output.relative_path, "2020/01/02/c/index.html");
    }

    #[test]
    fn output_metadata_overrides_path() {
        let doc = load("x.html.md", "---\noutput: special/Thing.html\n---\n");
        assert_eq!(doc.output.relative_path, "special/thing/index.html");
        assert!(!doc.metadata.contains("output"));
    }

    #[test]
    fn file_names_are_sanitized() {
        let doc = load("My Posts/Hello World!.html.md", "");
        assert_eq!(doc.output.relative_path, "my-posts/hello-world/index.html");
        assert_eq!(doc.parent_id, "my-posts");
    }

    // =========================================================================
    // Disable* flags
    // =========================================================================

    #[test]
    fn disable_flags_are_honored_and_consumed() {
        let doc = load(
            "2013-12-18-1.-Post.html.md",
            "---\nDisableDateFromFileName: true\nDisableOrderFromFileName: yes\nDisableSanitizePath: true\nDisableCleanUrls: true\n---\n",
        );
        assert_eq!(doc.output.relative_path, "2013-12-18-1.-Post.html");
        assert_eq!(doc.order, 0);
        assert!(doc.metadata.is_empty());
    }

    #[test]
    fn disable_insert_date_keeps_folder() {
        let doc = load("2013-12-18-c.html.md", "---\nDisableInsertDateIntoPath: true\n---\n");
        assert_eq!(doc.output.relative_path, "c/index.html");
        assert_eq!(doc.date.date(), NaiveDate::from_ymd_opt(2013, 12, 18).unwrap());
    }

    #[test]
    fn undated_document_falls_back_to_modified_time() {
        let doc = load("about.html.md", "");
        assert_eq!(doc.date, doc.source.modified_date());
        assert_eq!(doc.output.relative_path, "about/index.html");
    }

    // =========================================================================
    // Partials, layout and paginate metadata
    // =========================================================================

    #[test]
    fn partial_marker_before_extension() {
        let doc = load("nav.partial.tpl", "");
        assert!(doc.partial);
        assert_eq!(doc.id, "nav");
    }

    #[test]
    fn partial_marker_in_middle() {
        let doc = load("menu.partial.html.tpl", "");
        assert!(doc.partial);
        assert_eq!(doc.id, "menu");
    }

    #[test]
    fn layout_and_paginate_are_consumed() {
        let doc = load(
            "index.html.tpl",
            "---\nlayout: home\npaginate: documents every 5\ntitle: Home\n---\n",
        );
        assert_eq!(doc.layout_name.as_deref(), Some("home"));
        assert_eq!(doc.paginate_query.as_deref(), Some("documents every 5"));
        assert_eq!(doc.metadata.len(), 1);
        assert_eq!(doc.title(), "Home");
    }

    #[test]
    fn clone_for_page_gets_new_identity() {
        let doc = load("blog/index.html.tpl", "---\ntitle: Blog\n---\n");
        let location = OutputLocation::new(Path::new("/out"), "blog/page/2/index.html", "/");
        let clone = doc.clone_for_page(DocId(0), location);
        assert_eq!(clone.id, "blog/page/2");
        assert_eq!(clone.output.url(), "/blog/page/2/");
        assert_eq!(clone.cloned_from, Some(DocId(0)));
        assert!(clone.source.contributing_files().is_empty());
        assert_eq!(clone.title(), "Blog");
    }

    // =========================================================================
    // URL helpers and queryable properties
    // =========================================================================

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("/", "a/"), "/a/");
        assert_eq!(join_url("https://example.com/", "/a"), "https://example.com/a");
        assert_eq!(join_url("/", ""), "/");
    }

    #[test]
    fn structural_properties_are_queryable() {
        let doc = load("guide/3.-x.html.md", "---\nnumber: 20\n---\n");
        assert_eq!(doc.property("Order"), Some(MetaValue::Int(3)));
        assert_eq!(doc.property("parentid"), Some(MetaValue::Text("guide".into())));
        assert_eq!(doc.property("number").and_then(|v| v.as_int()), Some(20));
        assert_eq!(doc.property("missing"), None);
    }
}
