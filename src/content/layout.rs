//! Layouts, data files and static files.

use super::document::OutputLocation;
use super::metadata::{MetaValue, MetadataCollection};
use super::source::SourceFile;
use crate::frontmatter;
use crate::query::Queryable;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::Path;

/// Lowercased relative path with every extension removed:
/// `Blog/Post.html.tpl` → `blog/post`.
fn name_from_path(relative_path: &str) -> String {
    let (folder, file) = relative_path
        .rsplit_once('/')
        .map_or(("", relative_path), |(f, n)| (f, n));
    let stem = file.split('.').next().unwrap_or(file);
    let name = if folder.is_empty() {
        stem.to_string()
    } else {
        format!("{folder}/{stem}")
    };
    name.to_lowercase()
}

/// A template that wraps document content.
#[derive(Debug, Clone)]
pub struct LayoutFile {
    pub source: SourceFile,
    /// Name documents refer to it by (`layout: default`).
    pub id: String,
    /// Render chain, innermost first.
    pub extensions: Vec<String>,
    /// The layout this layout is itself wrapped in.
    pub layout: Option<String>,
    pub metadata: MetadataCollection,
    pub queries: IndexMap<String, String>,
    pub body: String,
}

impl LayoutFile {
    pub fn load(source: SourceFile, text: &str, render_extensions: &HashSet<String>) -> Self {
        let parsed = frontmatter::parse(text);
        let mut metadata = parsed.metadata;
        let layout = metadata.get_and_remove("layout").map(|v| v.to_string());

        let mut extensions: Vec<String> = source
            .file_name()
            .split('.')
            .skip(1)
            .map(str::to_lowercase)
            .collect();
        extensions.reverse();
        let extensions = extensions
            .into_iter()
            .take_while(|ext| render_extensions.contains(ext))
            .collect();

        Self {
            id: name_from_path(&source.relative_path),
            source,
            extensions,
            layout,
            metadata,
            queries: parsed.queries,
            body: parsed.body,
        }
    }
}

impl Queryable for LayoutFile {
    fn property(&self, name: &str) -> Option<MetaValue> {
        let value = match name.to_lowercase().as_str() {
            "id" | "name" => MetaValue::Text(self.id.clone()),
            "sourcepath" => MetaValue::Text(self.source.relative_path.clone()),
            "modified" => MetaValue::Date(self.source.modified_date()),
            "layout" => MetaValue::Text(self.layout.clone()?),
            _ => return self.metadata.get(name).cloned(),
        };
        Some(value)
    }
}

/// Structured content that is queried but never rendered on its own.
#[derive(Debug, Clone)]
pub struct DataFile {
    pub source: SourceFile,
    pub id: String,
    pub metadata: MetadataCollection,
    pub body: String,
}

impl DataFile {
    pub fn load(source: SourceFile, text: &str) -> Self {
        let parsed = frontmatter::parse(text);
        let mut metadata = parsed.metadata;
        if let Some(date) = parsed.date {
            metadata.add("date", MetaValue::Date(date));
        }
        Self {
            id: name_from_path(&source.relative_path),
            source,
            metadata,
            body: parsed.body,
        }
    }
}

impl Queryable for DataFile {
    fn property(&self, name: &str) -> Option<MetaValue> {
        let value = match name.to_lowercase().as_str() {
            "id" => MetaValue::Text(self.id.clone()),
            "sourcepath" => MetaValue::Text(self.source.relative_path.clone()),
            "modified" => MetaValue::Date(self.source.modified_date()),
            "content" => MetaValue::Text(self.body.clone()),
            _ => return self.metadata.get(name).cloned(),
        };
        Some(value)
    }
}

/// A file copied to the output unchanged.
#[derive(Debug, Clone)]
pub struct StaticFile {
    pub source: SourceFile,
    pub output: OutputLocation,
}

impl StaticFile {
    pub fn new(source: SourceFile, output_root: &Path, root_url: &str) -> Self {
        let output = OutputLocation::new(output_root, &source.relative_path, root_url);
        Self { source, output }
    }
}

impl Queryable for StaticFile {
    fn property(&self, name: &str) -> Option<MetaValue> {
        let value = match name.to_lowercase().as_str() {
            "id" | "path" | "outputpath" => MetaValue::Text(self.output.relative_path.clone()),
            "sourcepath" => MetaValue::Text(self.source.relative_path.clone()),
            "url" => MetaValue::Text(self.output.url()),
            "extension" => MetaValue::Text(self.output.extension.clone()),
            "name" => MetaValue::Text(self.source.file_name().to_string()),
            "modified" => MetaValue::Date(self.source.modified_date()),
            _ => return None,
        };
        Some(value)
    }
}
