//! The data a renderer sees.
//!
//! A [`Context`] is a tree of [`Object`]s answering `get(name)` for a fixed
//! set of fields, falling back to metadata. Names are case-insensitive.
//!
//! | Root name | Value |
//! |-----------|-------|
//! | `content` | the content being wrapped (layouts) |
//! | `document`, `page` | the document being rendered |
//! | `layout` | the layout being rendered, if any |
//! | `site` | every document, file, layout, data file and book, plus site metadata |
//! | `query` | the named queries of the document and layout |
//! | anything else | the document's field or metadata, then a named query |
//!
//! Document fields: `Id`, `ParentId`, `Order`, `Draft`, `Partial`, `Title`,
//! `Date`, `DateUtc`, `FriendlyDate`, `StandardUtcDate`, `Modified`, `Url`,
//! `RootUrl`, `FullUrl`, `RelativeUrl`, `SourcePath`, `OutputPath`,
//! `Extension`, `Content`, `Next`, `Previous`, `Parent`, `Book`, `Chapter`,
//! `Paginator`.
//!
//! Values are built when asked for. Reaching another file through the context
//! (a neighbour, a query result, a paginator item, a book page) records that
//! file as contributing to the document being rendered.

use super::transaction::{RenderStack, RenderTransaction};
use crate::content::{
    DataId, DocId, FileId, FileRef, LayoutId, MetaValue, MetadataCollection, friendly_date,
    join_url, standard_utc_date, utc_date,
};
use crate::naming;
use crate::ordering::PageView;
use crate::paginate::Pagination;
use crate::query::Query;
use crate::site::Site;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use std::borrow::Cow;
use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A context value.
#[derive(Clone)]
pub enum Value<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Date(NaiveDateTime),
    List(Vec<Value<'a>>),
    Object(Rc<dyn Object<'a> + 'a>),
}

/// Something with named fields.
pub trait Object<'a> {
    /// Look up a field by case-insensitive name.
    fn get(&self, name: &str) -> Option<Value<'a>>;

    /// Field names, for enumeration.
    fn keys(&self) -> Vec<String> {
        Vec::new()
    }

    /// Text shown when the object itself is interpolated.
    fn display(&self) -> String {
        String::new()
    }
}

impl<'a> Value<'a> {
    pub fn object(object: impl Object<'a> + 'a) -> Self {
        Value::Object(Rc::new(object))
    }

    fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    fn optional<T>(value: Option<T>, f: impl FnOnce(T) -> Value<'a>) -> Self {
        value.map_or(Value::Null, f)
    }

    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Text(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d %H:%M:%S").to_string(),
            Value::List(items) => items
                .iter()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(", "),
            Value::Object(o) => o.display(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Text(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Date(_) | Value::Object(_) => true,
        }
    }

    /// Field access: object fields, or `count` / an index on lists.
    pub fn get(&self, name: &str) -> Option<Value<'a>> {
        match self {
            Value::Object(o) => o.get(name),
            Value::List(items) if name.eq_ignore_ascii_case("count") => {
                Some(Value::Int(items.len() as i64))
            }
            Value::List(items) => name.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
            _ => None,
        }
    }

    pub fn from_meta(value: &MetaValue) -> Self {
        match value {
            MetaValue::Text(s) => Value::Text(s.clone()),
            MetaValue::Bool(b) => Value::Bool(*b),
            MetaValue::Int(n) => Value::Int(*n),
            MetaValue::Date(d) => Value::Date(*d),
            MetaValue::List(items) => Value::List(items.iter().map(Value::text).collect()),
            MetaValue::Json(json) => Value::from_json(json),
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Text(n.to_string()),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => Value::object(MapObject(
                map.iter()
                    .map(|(k, v)| (k.to_lowercase(), Value::from_json(v)))
                    .collect(),
            )),
        }
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Object(o) => write!(f, "Object{:?}", o.keys()),
            other => write!(f, "{:?}", other.to_text()),
        }
    }
}

/// Fixed fields built up front. Keys are lowercase.
pub struct MapObject<'a>(IndexMap<String, Value<'a>>);

impl<'a> MapObject<'a> {
    fn new(fields: impl IntoIterator<Item = (&'static str, Value<'a>)>) -> Self {
        Self(fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }
}

impl<'a> Object<'a> for MapObject<'a> {
    fn get(&self, name: &str) -> Option<Value<'a>> {
        self.0.get(&name.to_lowercase()).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }
}

fn metadata_object<'a>(metadata: &MetadataCollection) -> Value<'a> {
    Value::object(MapObject(
        metadata
            .iter()
            .map(|(k, v)| (k.to_lowercase(), Value::from_meta(v)))
            .collect(),
    ))
}

// =========================================================================
// Scope: the render a context belongs to
// =========================================================================

/// The transaction, the document being rendered, and the chain of documents
/// whose content is being rendered on this thread.
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    tx: &'a RenderTransaction<'a>,
    rendering: DocId,
    stack: &'a RenderStack,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(tx: &'a RenderTransaction<'a>, rendering: DocId, stack: &'a RenderStack) -> Self {
        Self {
            tx,
            rendering,
            stack,
        }
    }

    fn site(&self) -> &'a Site {
        self.tx.site()
    }

    fn record(&self, file: FileRef) {
        self.tx.record(self.rendering, file);
    }

    /// A context value for `file`, recording it as a contributor.
    fn item(&self, file: FileRef) -> Value<'a> {
        self.record(file);
        match file {
            FileRef::Document(id) => Value::object(DocumentObject::new(*self, id)),
            FileRef::Layout(id) => Value::object(LayoutObject { scope: *self, id }),
            FileRef::Data(id) => Value::object(DataObject { scope: *self, id }),
            FileRef::File(id) => Value::object(FileObject { scope: *self, id }),
        }
    }

    fn document(&self, id: Option<DocId>) -> Value<'a> {
        Value::optional(id, |id| self.item(FileRef::Document(id)))
    }

    fn items(&self, files: impl Iterator<Item = FileRef>) -> Value<'a> {
        Value::List(files.map(|f| self.item(f)).collect())
    }

    /// Own content of `id`, rendered on first use.
    fn content_of(&self, id: DocId) -> Option<String> {
        self.tx.content(id, self.stack)
    }
}

// =========================================================================
// Root context
// =========================================================================

/// Everything a renderer can read while rendering one document.
pub struct Context<'a> {
    scope: Scope<'a>,
    document: Rc<DocumentObject<'a>>,
    layout: Option<LayoutId>,
    queries: Rc<QueriesObject<'a>>,
}

impl<'a> Context<'a> {
    /// `metadata` is the document's metadata as seen at this point (layouts
    /// add keys as the chain is applied). `content` is the content being
    /// wrapped when rendering a layout.
    pub(crate) fn new(
        scope: Scope<'a>,
        metadata: Cow<'a, MetadataCollection>,
        content: Option<String>,
        layout: Option<LayoutId>,
    ) -> Self {
        let site = scope.site();
        let document = site.document(scope.rendering);
        let mut queries: Vec<(String, String)> = document
            .queries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(layout) = layout {
            queries.extend(
                site.layout(layout)
                    .queries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
        }
        let wrapped = OnceCell::new();
        if let Some(content) = content {
            let _ = wrapped.set(Value::Text(content));
        }
        Self {
            scope,
            document: Rc::new(DocumentObject {
                scope,
                id: scope.rendering,
                metadata,
                content: wrapped,
            }),
            layout,
            queries: Rc::new(QueriesObject {
                scope,
                queries,
                results: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// The document being rendered.
    pub fn document_id(&self) -> DocId {
        self.scope.rendering
    }

    pub fn get(&self, name: &str) -> Option<Value<'a>> {
        match name.to_lowercase().as_str() {
            "document" | "page" => Some(Value::Object(self.document.clone())),
            "layout" => Some(Value::optional(self.layout, |id| {
                Value::object(LayoutObject {
                    scope: self.scope,
                    id,
                })
            })),
            "site" => Some(Value::object(SiteObject { scope: self.scope })),
            "query" | "queries" => Some(Value::Object(self.queries.clone())),
            _ => self
                .document
                .get(name)
                .or_else(|| self.queries.get(name)),
        }
    }

    /// Render the document with sanitized Id `id` (typically a partial) and
    /// return its content. Missing documents yield `None` with a warning.
    pub fn partial(&self, id: &str) -> Option<String> {
        let site = self.scope.site();
        let Some(found) = site.find_document(&naming::sanitize_path(id)) else {
            tracing::warn!(
                partial = id,
                document = %site.document(self.scope.rendering).source.relative_path,
                "partial not found"
            );
            return None;
        };
        self.scope.record(FileRef::Document(found));
        self.scope.content_of(found)
    }
}

// =========================================================================
// Documents
// =========================================================================

pub struct DocumentObject<'a> {
    scope: Scope<'a>,
    id: DocId,
    metadata: Cow<'a, MetadataCollection>,
    content: OnceCell<Value<'a>>,
}

impl<'a> DocumentObject<'a> {
    fn new(scope: Scope<'a>, id: DocId) -> Self {
        Self {
            scope,
            id,
            metadata: Cow::Borrowed(&scope.site().document(id).metadata),
            content: OnceCell::new(),
        }
    }

    fn content(&self) -> Value<'a> {
        self.content
            .get_or_init(|| {
                // A document's own content is not available while it renders.
                if self.id == self.scope.rendering {
                    return Value::Null;
                }
                Value::optional(self.scope.content_of(self.id), Value::Text)
            })
            .clone()
    }
}

const DOCUMENT_FIELDS: &[&str] = &[
    "id",
    "parentid",
    "order",
    "draft",
    "partial",
    "title",
    "date",
    "dateutc",
    "friendlydate",
    "standardutcdate",
    "modified",
    "url",
    "rooturl",
    "fullurl",
    "relativeurl",
    "sourcepath",
    "outputpath",
    "extension",
    "content",
    "next",
    "previous",
    "parent",
    "book",
    "chapter",
    "paginator",
];

impl<'a> Object<'a> for DocumentObject<'a> {
    fn get(&self, name: &str) -> Option<Value<'a>> {
        let scope = self.scope;
        let site = scope.site();
        let doc = site.document(self.id);
        let value = match name.to_lowercase().as_str() {
            "id" => Value::text(&doc.id),
            "parentid" => Value::text(&doc.parent_id),
            "order" => Value::Int(doc.order),
            "draft" => Value::Bool(doc.draft),
            "partial" => Value::Bool(doc.partial),
            "title" => Value::Text(
                self.metadata
                    .get_text("title")
                    .unwrap_or_else(|| doc.id.clone()),
            ),
            "date" => Value::Date(doc.date),
            "dateutc" => Value::Text(utc_date(doc.date)),
            "friendlydate" => Value::Text(friendly_date(doc.date)),
            "standardutcdate" => Value::Text(standard_utc_date(doc.date)),
            "modified" => Value::Date(doc.source.modified_date()),
            "url" => Value::Text(doc.output.url()),
            "rooturl" => Value::text(&doc.output.root_url),
            "fullurl" => Value::Text(join_url(&site.config.url, &doc.output.url())),
            "relativeurl" => Value::text(&doc.output.relative_url),
            "sourcepath" => Value::text(&doc.source.relative_path),
            "outputpath" => Value::text(&doc.output.relative_path),
            "extension" => Value::text(&doc.output.extension),
            "content" => self.content(),
            "next" => scope.document(doc.next),
            "previous" => scope.document(doc.previous),
            "parent" => scope.document(doc.parent),
            "book" => Value::optional(doc.book, |book| {
                Value::object(BookObject {
                    scope,
                    view: site.books.view(book, scope.rendering),
                })
            }),
            "chapter" => Value::optional(doc.chapter, |node| {
                Value::object(PageViewObject {
                    scope,
                    view: site.books.page_view(node, scope.rendering),
                })
            }),
            "paginator" => Value::optional(doc.paginator.as_ref(), |_| {
                Value::object(PaginatorObject { scope, id: self.id })
            }),
            _ => return self.metadata.get(name).map(Value::from_meta),
        };
        Some(value)
    }

    fn keys(&self) -> Vec<String> {
        DOCUMENT_FIELDS
            .iter()
            .map(|k| k.to_string())
            .chain(self.metadata.iter().map(|(k, _)| k.to_lowercase()))
            .collect()
    }

    fn display(&self) -> String {
        self.scope.site().document(self.id).output.url()
    }
}

// =========================================================================
// Named queries
// =========================================================================

/// Named queries, run on first access.
struct QueriesObject<'a> {
    scope: Scope<'a>,
    queries: Vec<(String, String)>,
    results: RefCell<HashMap<String, Value<'a>>>,
}

impl<'a> Object<'a> for QueriesObject<'a> {
    fn get(&self, name: &str) -> Option<Value<'a>> {
        let key = name.to_lowercase();
        if let Some(done) = self.results.borrow().get(&key) {
            return Some(done.clone());
        }
        let (_, text) = self
            .queries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))?;
        let value = match Query::parse(text) {
            Ok(query) => {
                let results = self.scope.site().execute(&query);
                self.scope.items(results.iter())
            }
            Err(e) => {
                self.scope
                    .tx
                    .fail(self.scope.rendering, format!("query '{name}': {e}"));
                Value::Null
            }
        };
        self.results.borrow_mut().insert(key, value.clone());
        Some(value)
    }

    fn keys(&self) -> Vec<String> {
        self.queries.iter().map(|(k, _)| k.to_lowercase()).collect()
    }
}

// =========================================================================
// Site, layouts, data and files
// =========================================================================

struct SiteObject<'a> {
    scope: Scope<'a>,
}

impl<'a> Object<'a> for SiteObject<'a> {
    fn get(&self, name: &str) -> Option<Value<'a>> {
        let scope = self.scope;
        let site = scope.site();
        let value = match name.to_lowercase().as_str() {
            "documents" => scope.items(
                site.published_documents()
                    .map(|(id, _)| FileRef::Document(id)),
            ),
            "layouts" => scope.items((0..site.layouts.len()).map(|i| FileRef::Layout(LayoutId(i)))),
            "data" => scope.items((0..site.data.len()).map(|i| FileRef::Data(DataId(i)))),
            "files" => scope.items((0..site.files.len()).map(|i| FileRef::File(FileId(i)))),
            "books" => Value::List(
                site.books
                    .books()
                    .map(|(book, _)| {
                        Value::object(BookObject {
                            scope,
                            view: site.books.view(book, scope.rendering),
                        })
                    })
                    .collect(),
            ),
            "metadata" => metadata_object(&site.metadata),
            "url" => Value::text(&site.config.url),
            "rooturl" => Value::text(&site.config.root_url),
            // Single-site builds have no parent site.
            "parent" => Value::Null,
            _ => return site.metadata.get(name).map(Value::from_meta),
        };
        Some(value)
    }

    fn keys(&self) -> Vec<String> {
        ["documents", "layouts", "data", "files", "books", "metadata", "url", "rooturl", "parent"]
            .iter()
            .map(|k| k.to_string())
            .collect()
    }
}

struct LayoutObject<'a> {
    scope: Scope<'a>,
    id: LayoutId,
}

impl<'a> Object<'a> for LayoutObject<'a> {
    fn get(&self, name: &str) -> Option<Value<'a>> {
        let layout = self.scope.site().layout(self.id);
        let value = match name.to_lowercase().as_str() {
            "id" | "name" => Value::text(&layout.id),
            "layout" => Value::optional(layout.layout.as_ref(), Value::text),
            "sourcepath" => Value::text(&layout.source.relative_path),
            "modified" => Value::Date(layout.source.modified_date()),
            _ => return layout.metadata.get(name).map(Value::from_meta),
        };
        Some(value)
    }

    fn display(&self) -> String {
        self.scope.site().layout(self.id).id.clone()
    }
}

struct DataObject<'a> {
    scope: Scope<'a>,
    id: DataId,
}

impl<'a> Object<'a> for DataObject<'a> {
    fn get(&self, name: &str) -> Option<Value<'a>> {
        let data = &self.scope.site().data[self.id.0];
        let value = match name.to_lowercase().as_str() {
            "id" => Value::text(&data.id),
            "sourcepath" => Value::text(&data.source.relative_path),
            "modified" => Value::Date(data.source.modified_date()),
            "content" => Value::text(&data.body),
            _ => return data.metadata.get(name).map(Value::from_meta),
        };
        Some(value)
    }

    fn display(&self) -> String {
        self.scope.site().data[self.id.0].body.clone()
    }
}

struct FileObject<'a> {
    scope: Scope<'a>,
    id: FileId,
}

impl<'a> Object<'a> for FileObject<'a> {
    fn get(&self, name: &str) -> Option<Value<'a>> {
        let file = &self.scope.site().files[self.id.0];
        let value = match name.to_lowercase().as_str() {
            "url" => Value::Text(file.output.url()),
            "relativeurl" => Value::text(&file.output.relative_url),
            "outputpath" | "path" => Value::text(&file.output.relative_path),
            "sourcepath" => Value::text(&file.source.relative_path),
            "extension" => Value::text(&file.output.extension),
            "name" => Value::text(file.source.file_name()),
            "modified" => Value::Date(file.source.modified_date()),
            _ => return None,
        };
        Some(value)
    }

    fn display(&self) -> String {
        self.scope.site().files[self.id.0].output.url()
    }
}

// =========================================================================
// Books
// =========================================================================

struct BookObject<'a> {
    scope: Scope<'a>,
    view: crate::ordering::BookView,
}

impl<'a> Object<'a> for BookObject<'a> {
    fn get(&self, name: &str) -> Option<Value<'a>> {
        let value = match name.to_lowercase().as_str() {
            "parent" => self.scope.document(self.view.parent),
            "parentid" => Value::text(&self.scope.site().books.book(self.view.book).parent_id),
            "chapters" => Value::List(
                self.view
                    .chapters
                    .iter()
                    .map(|view| {
                        Value::object(PageViewObject {
                            scope: self.scope,
                            view: Rc::clone(view),
                        })
                    })
                    .collect(),
            ),
            _ => return None,
        };
        Some(value)
    }
}

/// A book page seen from the document being rendered. Unknown names are
/// read from the page's document.
struct PageViewObject<'a> {
    scope: Scope<'a>,
    view: Rc<PageView>,
}

impl<'a> Object<'a> for PageViewObject<'a> {
    fn get(&self, name: &str) -> Option<Value<'a>> {
        let value = match name.to_lowercase().as_str() {
            "document" => self.scope.document(Some(self.view.document)),
            "active" => Value::Bool(self.view.active),
            "hasactivedescendant" => Value::Bool(self.view.has_active_descendant),
            "ischapter" => Value::Bool(self.view.chapter),
            "subpages" | "pages" => Value::List(
                self.view
                    .sub_pages
                    .iter()
                    .map(|view| {
                        Value::object(PageViewObject {
                            scope: self.scope,
                            view: Rc::clone(view),
                        })
                    })
                    .collect(),
            ),
            _ => return self.scope.document(Some(self.view.document)).get(name),
        };
        Some(value)
    }
}

// =========================================================================
// Pagination
// =========================================================================

struct PaginatorObject<'a> {
    scope: Scope<'a>,
    id: DocId,
}

impl<'a> Object<'a> for PaginatorObject<'a> {
    fn get(&self, name: &str) -> Option<Value<'a>> {
        let paginator = self.scope.site().document(self.id).paginator.as_ref()?;
        let value = match name.to_lowercase().as_str() {
            "items" | "documents" => self.scope.items(paginator.items()),
            "count" => Value::Int(paginator.len() as i64),
            "total" => Value::Int(paginator.total() as i64),
            "pagination" => Value::optional(paginator.pagination.as_ref(), pagination_value),
            _ => return None,
        };
        Some(value)
    }
}

fn pagination_value<'a>(pagination: &Pagination) -> Value<'a> {
    let pages = pagination
        .pages
        .iter()
        .map(|link| {
            Value::object(MapObject::new([
                ("page", Value::Int(link.page as i64)),
                ("url", Value::text(&link.url)),
                ("active", Value::Bool(link.active)),
            ]))
        })
        .collect();
    Value::object(MapObject::new([
        ("page", Value::Int(pagination.page as i64)),
        ("perpage", Value::Int(pagination.per_page as i64)),
        ("totalpages", Value::Int(pagination.total_pages as i64)),
        ("nexturl", Value::optional(pagination.next_url.as_ref(), Value::text)),
        ("previousurl", Value::optional(pagination.previous_url.as_ref(), Value::text)),
        ("pages", Value::List(pages)),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{loaded_site, site_with};

    fn text(value: Option<Value<'_>>) -> String {
        value.map(|v| v.to_text()).unwrap_or_default()
    }

    #[test]
    fn value_text_and_truthiness() {
        assert_eq!(Value::Null.to_text(), "");
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Text(String::new()).is_truthy());
        assert!(Value::Int(2).is_truthy());
        let list = Value::List(vec![Value::text("a"), Value::Int(1)]);
        assert_eq!(list.to_text(), "a, 1");
        assert_eq!(list.get("count").map(|v| v.to_text()).as_deref(), Some("2"));
        assert_eq!(list.get("0").map(|v| v.to_text()).as_deref(), Some("a"));
    }

    #[test]
    fn json_objects_are_case_insensitive() {
        let json: serde_json::Value = serde_json::from_str(r#"{"Name": "Ann", "tags": ["a", "b"]}"#).unwrap();
        let value = Value::from_json(&json);
        assert_eq!(text(value.get("name")), "Ann");
        assert_eq!(text(value.get("TAGS")), "a, b");
    }

    #[test]
    fn document_fields_and_metadata() {
        let tmp = site_with(&[
            ("documents/2013-12-18-post.html.md", "---\ntitle: Hello\nauthor: Ann\n---\nx"),
            ("documents/about.html.md", "y"),
        ]);
        let mut site = loaded_site(tmp.path());
        let registry = crate::render::RendererRegistry::with_builtin();
        let post = site.find_document("2013/12/18/post").unwrap();
        let tx = RenderTransaction::begin(&mut site, &registry);
        let stack = RenderStack::default();
        let scope = Scope::new(&tx, post, &stack);
        let context = Context::new(scope, Cow::Borrowed(&tx.site().document(post).metadata), None, None);

        assert_eq!(text(context.get("Title")), "Hello");
        assert_eq!(text(context.get("author")), "Ann");
        assert_eq!(text(context.get("url")), "/2013/12/18/post/");
        assert_eq!(text(context.get("friendlydate")), "December 18, 2013");
        assert_eq!(text(context.get("document").and_then(|d| d.get("id"))), "2013/12/18/post");
        assert!(context.get("nothing").is_none());
        assert_eq!(
            text(context.get("site").and_then(|s| s.get("documents")).and_then(|d| d.get("count"))),
            "2"
        );
    }
}
