//! Pagination: splitting a query's results across pages.
//!
//! A document with `paginate: <query>` in its front matter lists the query's
//! results. With `every N` the results are split into pages of `N`; with a
//! `formaturl` each page past the first gets its own output, a clone of the
//! owning document:
//!
//! ```text
//! paginate: documents where id startswith blog/ descending date every 10 formaturl "blog/page/{0}/"
//!
//! page 1 → blog/index.html          (the document itself)
//! page 2 → blog/page/2/index.html   (clone)
//! page 3 → blog/page/3/index.html   (clone)
//! ```
//!
//! A format without an extension names a folder (`blog/page-{0}` writes
//! `blog/page-2/index.html`), and page links use the clone's own URL.
//! Without a `formaturl` only page 1 exists and holds the first slice.
//! Every page gets a [`Paginator`]; when there is more than one page it also
//! carries a [`Pagination`] block for navigation, with a window of at most
//! [`PAGE_WINDOW`] page links centered on the current page.

use crate::content::{DocId, FileRef, OutputLocation};
use crate::query::{Query, QueryError, QueryResults};
use crate::site::Site;
use std::ops::{Range, RangeInclusive};
use std::sync::Arc;
use thiserror::Error;

/// Most page links shown at once.
pub const PAGE_WINDOW: usize = 7;

#[derive(Error, Debug)]
#[error("invalid paginate query in {document}: {source}")]
pub struct PaginateError {
    pub document: String,
    #[source]
    pub source: QueryError,
}

/// One page's slice of the results.
///
/// The results are shared between all pages of a document and hold handles
/// only, so nothing is rendered until an item is read.
#[derive(Debug, Clone)]
pub struct Paginator {
    results: Arc<QueryResults<FileRef>>,
    range: Range<usize>,
    pub pagination: Option<Pagination>,
}

impl Paginator {
    pub fn new(results: Arc<QueryResults<FileRef>>, range: Range<usize>) -> Self {
        Self {
            results,
            range,
            pagination: None,
        }
    }

    /// Items on this page.
    pub fn items(&self) -> impl Iterator<Item = FileRef> + '_ {
        self.results.slice(self.range.clone())
    }

    pub fn len(&self) -> usize {
        self.items().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total results across all pages.
    pub fn total(&self) -> usize {
        self.results.len()
    }
}

/// Navigation between pages.
#[derive(Debug, Clone, PartialEq)]
pub struct Pagination {
    /// 1-based.
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub next_url: Option<String>,
    pub previous_url: Option<String>,
    pub pages: Vec<PageLink>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageLink {
    pub page: usize,
    pub url: String,
    pub active: bool,
}

impl Pagination {
    /// Navigation for `page` given every page's URL (`urls[0]` is page 1).
    pub fn new(page: usize, per_page: usize, urls: &[String]) -> Self {
        let total_pages = urls.len();
        let url = |n: usize| urls[n - 1].clone();
        Self {
            page,
            per_page,
            total_pages,
            next_url: (page < total_pages).then(|| url(page + 1)),
            previous_url: (page > 1).then(|| url(page - 1)),
            pages: page_window(page, total_pages)
                .map(|n| PageLink {
                    page: n,
                    url: url(n),
                    active: n == page,
                })
                .collect(),
        }
    }
}

/// `ceil(items / per_page)`, never less than 1.
pub fn page_count(items: usize, per_page: usize) -> usize {
    items.div_ceil(per_page.max(1)).max(1)
}

/// Up to [`PAGE_WINDOW`] page numbers centered on `current`, clamped to
/// `1..=total`.
pub fn page_window(current: usize, total: usize) -> RangeInclusive<usize> {
    if total == 0 {
        return 1..=0;
    }
    let current = current.clamp(1, total);
    let start = current.saturating_sub(PAGE_WINDOW / 2).max(1);
    let end = (start + PAGE_WINDOW - 1).min(total);
    let start = end.saturating_sub(PAGE_WINDOW - 1).max(1);
    start..=end
}

/// Substitute the page number into a `formaturl` string.
pub fn format_page_url(format: &str, page: usize) -> String {
    format.replace("{0}", &page.to_string())
}

/// Output path for a formatted page URL: a trailing `/` (or no extension)
/// means `index.html` inside that folder.
fn page_output_path(url: &str) -> String {
    let url = url.trim_start_matches('/');
    let last = url.rsplit('/').next().unwrap_or_default();
    if url.is_empty() || url.ends_with('/') {
        format!("{url}index.html")
    } else if !last.contains('.') {
        format!("{url}/index.html")
    } else {
        url.to_string()
    }
}

/// Attach paginators to every paginating document and append clones for
/// pages past the first. Returns the clones' ids.
pub fn paginate(site: &mut Site) -> Result<Vec<DocId>, PaginateError> {
    let owners: Vec<(DocId, String)> = site
        .documents
        .iter()
        .enumerate()
        .filter(|(_, d)| !d.partial && !d.is_clone())
        .filter_map(|(i, d)| d.paginate_query.clone().map(|q| (DocId(i), q)))
        .collect();

    let mut clones = Vec::new();
    for (owner, text) in owners {
        let query = Query::parse(&text).map_err(|source| PaginateError {
            document: site.document(owner).source.relative_path.clone(),
            source,
        })?;
        let results = Arc::new(site.execute(&query));
        let total = results.len();
        let per_page = query.every.filter(|&n| n > 0).unwrap_or(total.max(1));

        let pages = match &query.format_url {
            Some(_) => page_count(total, per_page),
            None => 1,
        };
        let root_url = site.config.root_url.clone();
        // Page 1 is the owner itself; pages past it get their own output.
        let locations: Vec<Option<OutputLocation>> = (1..=pages)
            .map(|n| match &query.format_url {
                Some(format) if n > 1 => Some(OutputLocation::new(
                    &site.output_root,
                    &page_output_path(&format_page_url(format, n)),
                    &root_url,
                )),
                _ => None,
            })
            .collect();
        let urls: Vec<String> = locations
            .iter()
            .map(|location| match location {
                Some(location) => location.url(),
                None => site.document(owner).output.url(),
            })
            .collect();

        tracing::debug!(
            document = %site.document(owner).id,
            items = total,
            pages,
            "paginated"
        );

        for (n, location) in (1..=pages).zip(locations) {
            let range = (n - 1) * per_page..n * per_page;
            let mut paginator = Paginator::new(Arc::clone(&results), range);
            if pages > 1 {
                paginator.pagination = Some(Pagination::new(n, per_page, &urls));
            }
            let Some(location) = location else {
                site.documents[owner.0].paginator = Some(paginator);
                continue;
            };
            let mut clone = site.document(owner).clone_for_page(owner, location);
            clone.paginator = Some(paginator);
            clones.push(site.push_document(clone));
        }
    }
    Ok(clones)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{loaded_site, write_file};
    use tempfile::TempDir;

    // =========================================================================
    // Arithmetic
    // =========================================================================

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(10, 3), 4);
        assert_eq!(page_count(9, 3), 3);
        assert_eq!(page_count(0, 3), 1);
        assert_eq!(page_count(5, 0), 5);
    }

    #[test]
    fn window_is_centered_and_clamped() {
        assert_eq!(page_window(1, 3), 1..=3);
        assert_eq!(page_window(1, 20), 1..=7);
        assert_eq!(page_window(10, 20), 7..=13);
        assert_eq!(page_window(20, 20), 14..=20);
        assert_eq!(page_window(18, 20), 14..=20);
    }

    #[test]
    fn page_urls() {
        assert_eq!(format_page_url("blog/page/{0}/", 3), "blog/page/3/");
        assert_eq!(page_output_path("blog/page/3/"), "blog/page/3/index.html");
        assert_eq!(page_output_path("/blog/page-3"), "blog/page-3/index.html");
        assert_eq!(page_output_path("blog/3.html"), "blog/3.html");
    }

    #[test]
    fn pagination_links() {
        let urls: Vec<String> = (1..=3).map(|n| format!("/p/{n}/")).collect();
        let p = Pagination::new(2, 5, &urls);
        assert_eq!(p.previous_url.as_deref(), Some("/p/1/"));
        assert_eq!(p.next_url.as_deref(), Some("/p/3/"));
        assert_eq!(p.pages.len(), 3);
        assert!(p.pages[1].active);
        let first = Pagination::new(1, 5, &urls);
        assert_eq!(first.previous_url, None);
    }

    // =========================================================================
    // Site pagination
    // =========================================================================

    fn blog(tmp: &TempDir, posts: usize, paginate: &str) -> Site {
        write_file(
            tmp.path(),
            "documents/blog/index.html.tpl",
            &format!("---\npaginate: {paginate}\n---\n"),
        );
        for i in 0..posts {
            write_file(
                tmp.path(),
                &format!("documents/blog/post{i}.html.md"),
                &format!("---\nnumber: {i}\n---\n"),
            );
        }
        loaded_site(tmp.path())
    }

    #[test]
    fn clones_for_pages_past_the_first() {
        let tmp = TempDir::new().unwrap();
        let mut site = blog(
            &tmp,
            5,
            r#"documents where id startswith blog/ ascending number every 2 formaturl "blog/page/{0}/""#,
        );
        let before = site.documents.len();
        let clones = paginate(&mut site).unwrap();

        assert_eq!(clones.len(), 2);
        assert_eq!(site.documents.len(), before + 2);
        let owner = site.find_document("blog").unwrap();
        assert_eq!(site.document(clones[0]).output.url(), "/blog/page/2/");
        assert_eq!(site.document(clones[1]).output.url(), "/blog/page/3/");
        assert_eq!(site.document(clones[1]).cloned_from, Some(owner));

        let first = site.document(owner).paginator.as_ref().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first.total(), 5);
        let pagination = first.pagination.as_ref().unwrap();
        assert_eq!(pagination.total_pages, 3);
        assert_eq!(pagination.next_url.as_deref(), Some("/blog/page/2/"));

        let last = site.document(clones[1]).paginator.as_ref().unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(
            last.pagination.as_ref().unwrap().previous_url.as_deref(),
            Some("/blog/page/2/")
        );
    }

    #[test]
    fn page_links_match_clone_urls_without_trailing_slash() {
        let tmp = TempDir::new().unwrap();
        let mut site = blog(
            &tmp,
            5,
            r#"documents where id startswith blog/ every 2 formaturl "blog/page-{0}""#,
        );
        let clones = paginate(&mut site).unwrap();
        let owner = site.find_document("blog").unwrap();
        let links = &site.document(owner).paginator.as_ref().unwrap().pagination.as_ref().unwrap().pages;
        let urls: Vec<&str> = links.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["/blog/", "/blog/page-2/", "/blog/page-3/"]);
        for (clone, link) in clones.iter().zip(&links[1..]) {
            assert_eq!(site.document(*clone).output.url(), link.url);
        }
        assert_eq!(
            site.document(clones[0]).output.relative_path,
            "blog/page-2/index.html"
        );
    }

    #[test]
    fn page_one_keeps_the_original_identity() {
        let tmp = TempDir::new().unwrap();
        let mut site = blog(&tmp, 3, r#"documents where id startswith blog/ every 2 formaturl "blog/{0}/""#);
        paginate(&mut site).unwrap();
        let owner = site.find_document("blog").unwrap();
        assert_eq!(site.document(owner).output.url(), "/blog/");
        assert!(!site.document(owner).is_clone());
    }

    #[test]
    fn without_format_only_first_page_exists() {
        let tmp = TempDir::new().unwrap();
        let mut site = blog(&tmp, 5, "documents where id startswith blog/ every 2");
        let clones = paginate(&mut site).unwrap();
        assert!(clones.is_empty());
        let owner = site.find_document("blog").unwrap();
        let paginator = site.document(owner).paginator.as_ref().unwrap();
        assert_eq!(paginator.len(), 2);
        assert!(paginator.pagination.is_none());
    }

    #[test]
    fn without_every_all_items_on_one_page() {
        let tmp = TempDir::new().unwrap();
        let mut site = blog(&tmp, 4, r#"documents where id startswith blog/ formaturl "blog/{0}/""#);
        let clones = paginate(&mut site).unwrap();
        assert!(clones.is_empty());
        let owner = site.find_document("blog").unwrap();
        assert_eq!(site.document(owner).paginator.as_ref().unwrap().len(), 4);
    }

    #[test]
    fn invalid_query_names_the_document() {
        let tmp = TempDir::new().unwrap();
        let mut site = blog(&tmp, 1, "posts every 2");
        let err = paginate(&mut site).unwrap_err();
        assert_eq!(err.document, "blog/index.html.tpl");
        assert_eq!(err.source, QueryError::UnknownSource("posts".into()));
    }
}
