//! Ordering: previous/next/parent links and the book/chapter tree.
//!
//! Documents are split by their `order`:
//!
//! - **Implicit** (`order <= 0`): documents sharing a `ParentId` are chained
//!   by ascending date. Their parent is the document whose `Id` equals that
//!   `ParentId`, when there is one.
//! - **Explicit** (`order > 0`): documents sharing a `ParentId` are sorted by
//!   order. If the parent document is itself explicitly ordered, it becomes a
//!   chapter and the group its sub-pages. Otherwise the group starts a new
//!   [`Book`] whose top-level chapters are the group's documents.
//!
//! Each book is then walked depth-first. Every page gets its structural
//! parent, and previous/next links run across the whole walk, so the last
//! sub-page of one chapter links to the next chapter.
//!
//! ```text
//! guide/1.-intro        Book "guide"
//! guide/2.-install        1 intro
//! guide/install/1.-linux  2 install (chapter)
//! guide/install/2.-mac      1 linux
//! guide/3.-usage            2 mac
//!                         3 usage
//! walk: intro → install → linux → mac → usage
//! ```
//!
//! Pages are stored in an arena ([`BookTree`]) and addressed by [`NodeId`].
//! A page that gains sub-pages after it was placed is promoted in place
//! ([`BookTree::promote`]), keeping its position in its parent's list.
//! All sorts are stable, so ties keep discovery order.

use crate::content::{DocId, DocumentFile};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::rc::Rc;

/// Index of a book in a [`BookTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BookId(pub usize);

/// Index of a page in a [`BookTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// One position in a book.
#[derive(Debug, Clone, PartialEq)]
pub enum BookPage {
    Page(DocId),
    Chapter { document: DocId, sub_pages: Vec<NodeId> },
}

impl BookPage {
    pub fn document(&self) -> DocId {
        match self {
            BookPage::Page(document) | BookPage::Chapter { document, .. } => *document,
        }
    }

    pub fn is_chapter(&self) -> bool {
        matches!(self, BookPage::Chapter { .. })
    }

    pub fn sub_pages(&self) -> &[NodeId] {
        match self {
            BookPage::Page(_) => &[],
            BookPage::Chapter { sub_pages, .. } => sub_pages,
        }
    }
}

/// A top-level group of chapters sharing a `ParentId`.
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub parent_id: String,
    /// The document with Id == `parent_id`, if any.
    pub parent: Option<DocId>,
    pub chapters: Vec<NodeId>,
}

/// Arena of books and pages.
#[derive(Debug, Clone, Default)]
pub struct BookTree {
    pages: Vec<BookPage>,
    books: Vec<Book>,
    by_document: HashMap<DocId, NodeId>,
}

impl BookTree {
    pub fn page(&self, node: NodeId) -> &BookPage {
        &self.pages[node.0]
    }

    pub fn book(&self, book: BookId) -> &Book {
        &self.books[book.0]
    }

    pub fn books(&self) -> impl Iterator<Item = (BookId, &Book)> {
        self.books.iter().enumerate().map(|(i, b)| (BookId(i), b))
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// The page for a document, if it has one.
    pub fn node_of(&self, document: DocId) -> Option<NodeId> {
        self.by_document.get(&document).copied()
    }

    fn add(&mut self, page: BookPage) -> NodeId {
        let node = NodeId(self.pages.len());
        self.by_document.insert(page.document(), node);
        self.pages.push(page);
        node
    }

    /// Turn a leaf page into a chapter without moving it.
    pub fn promote(&mut self, node: NodeId) {
        if let BookPage::Page(document) = self.pages[node.0] {
            self.pages[node.0] = BookPage::Chapter {
                document,
                sub_pages: Vec::new(),
            };
        }
    }

    /// The chapter node for `document`, creating or promoting as needed.
    fn chapter_for(&mut self, document: DocId) -> NodeId {
        match self.node_of(document) {
            Some(node) => {
                self.promote(node);
                node
            }
            None => self.add(BookPage::Chapter {
                document,
                sub_pages: Vec::new(),
            }),
        }
    }

    /// The view of a book from the document being rendered.
    pub fn view(&self, book: BookId, active: DocId) -> BookView {
        let b = &self.books[book.0];
        BookView {
            book,
            parent: b.parent,
            chapters: b.chapters.iter().map(|&n| self.page_view(n, active)).collect(),
        }
    }

    /// The view of one page (and its descendants) from `active`.
    pub fn page_view(&self, node: NodeId, active: DocId) -> Rc<PageView> {
        let page = &self.pages[node.0];
        let sub_pages: Vec<Rc<PageView>> = page
            .sub_pages()
            .iter()
            .map(|&n| self.page_view(n, active))
            .collect();
        let has_active_descendant = sub_pages
            .iter()
            .any(|p| p.active || p.has_active_descendant);
        Rc::new(PageView {
            document: page.document(),
            chapter: page.is_chapter(),
            active: page.document() == active,
            has_active_descendant,
            sub_pages,
        })
    }
}

/// A book seen from one document. Built per render; never stored.
#[derive(Debug, Clone)]
pub struct BookView {
    pub book: BookId,
    pub parent: Option<DocId>,
    pub chapters: Vec<Rc<PageView>>,
}

#[derive(Debug, Clone)]
pub struct PageView {
    pub document: DocId,
    pub chapter: bool,
    pub active: bool,
    pub has_active_descendant: bool,
    pub sub_pages: Vec<Rc<PageView>>,
}

/// Link every ordered document and build the book tree.
///
/// Partials and pagination clones take no part. Links already present on the
/// documents are overwritten.
pub fn order_documents(documents: &mut [DocumentFile]) -> BookTree {
    let eligible: Vec<DocId> = (0..documents.len())
        .map(DocId)
        .filter(|&d| !documents[d.0].partial && !documents[d.0].is_clone())
        .collect();

    let mut by_id: HashMap<String, DocId> = HashMap::new();
    for &d in &eligible {
        let id = documents[d.0].id.clone();
        if let Some(existing) = by_id.get(&id) {
            tracing::warn!(
                id,
                first = %documents[existing.0].source.relative_path,
                second = %documents[d.0].source.relative_path,
                "duplicate document id, keeping the first"
            );
            continue;
        }
        by_id.insert(id, d);
    }

    let mut implicit: IndexMap<String, Vec<DocId>> = IndexMap::new();
    let mut explicit: IndexMap<String, Vec<DocId>> = IndexMap::new();
    for &d in &eligible {
        let doc = &mut documents[d.0];
        doc.next = None;
        doc.previous = None;
        doc.parent = None;
        doc.book = None;
        doc.chapter = None;
        let groups = if doc.order > 0 { &mut explicit } else { &mut implicit };
        groups.entry(doc.parent_id.clone()).or_default().push(d);
    }

    link_implicit(documents, &implicit, &by_id);
    let tree = build_books(documents, explicit, &by_id);
    walk_books(documents, &tree);
    tree
}

fn link_implicit(
    documents: &mut [DocumentFile],
    groups: &IndexMap<String, Vec<DocId>>,
    by_id: &HashMap<String, DocId>,
) {
    for (parent_id, members) in groups {
        let mut members = members.clone();
        members.sort_by_key(|d| documents[d.0].date);
        let parent = by_id.get(parent_id).copied();
        for (i, &d) in members.iter().enumerate() {
            let doc = &mut documents[d.0];
            doc.previous = i.checked_sub(1).map(|p| members[p]);
            doc.next = members.get(i + 1).copied();
            // The root index has Id "" and ParentId "": it is not its own parent.
            doc.parent = parent.filter(|&p| p != d);
        }
    }
}

fn build_books(
    documents: &[DocumentFile],
    groups: IndexMap<String, Vec<DocId>>,
    by_id: &HashMap<String, DocId>,
) -> BookTree {
    let mut tree = BookTree::default();
    for (parent_id, mut members) in groups {
        members.sort_by_key(|d| documents[d.0].order);
        let parent = by_id.get(&parent_id).copied();
        match parent.filter(|p| documents[p.0].order > 0) {
            Some(parent) => {
                let chapter = tree.chapter_for(parent);
                let subs: Vec<NodeId> = members
                    .iter()
                    .map(|&d| tree.node_of(d).unwrap_or_else(|| tree.add(BookPage::Page(d))))
                    .collect();
                if let BookPage::Chapter { sub_pages, .. } = &mut tree.pages[chapter.0] {
                    sub_pages.extend(subs);
                }
            }
            None => {
                let chapters = members.iter().map(|&d| tree.chapter_for(d)).collect();
                tree.books.push(Book {
                    parent_id,
                    parent,
                    chapters,
                });
            }
        }
    }
    tree
}

fn walk_books(documents: &mut [DocumentFile], tree: &BookTree) {
    for (book_id, book) in tree.books() {
        let mut sequence = Vec::new();
        for &chapter in &book.chapters {
            walk_page(documents, tree, chapter, book.parent, book_id, None, &mut sequence);
        }
        for (i, &d) in sequence.iter().enumerate() {
            let doc = &mut documents[d.0];
            doc.previous = i.checked_sub(1).map(|p| sequence[p]);
            doc.next = sequence.get(i + 1).copied();
        }
    }
}

fn walk_page(
    documents: &mut [DocumentFile],
    tree: &BookTree,
    node: NodeId,
    parent: Option<DocId>,
    book: BookId,
    enclosing_chapter: Option<NodeId>,
    sequence: &mut Vec<DocId>,
) {
    let page = tree.page(node);
    let document = page.document();
    if sequence.contains(&document) {
        return;
    }
    sequence.push(document);

    let chapter = if page.is_chapter() {
        Some(node)
    } else {
        enclosing_chapter
    };
    let doc = &mut documents[document.0];
    doc.parent = parent;
    doc.book = Some(book);
    doc.chapter = chapter;

    for &sub in page.sub_pages() {
        walk_page(documents, tree, sub, Some(document), book, chapter, sequence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{doc, doc_index};

    fn titles(documents: &[DocumentFile], chain: &[DocId]) -> Vec<String> {
        chain.iter().map(|d| documents[d.0].id.clone()).collect()
    }

    /// Follow `next` from `start`.
    fn follow(documents: &[DocumentFile], start: DocId) -> Vec<DocId> {
        let mut chain = vec![start];
        let mut current = start;
        while let Some(next) = documents[current.0].next {
            chain.push(next);
            current = next;
        }
        chain
    }

    // =========================================================================
    // Implicit chains
    // =========================================================================

    #[test]
    fn implicit_group_is_chained_by_date() {
        let mut documents = vec![
            doc("blog/c", "blog", 0, "2013-12-18"),
            doc("blog/a", "blog", 0, "2013-01-01"),
            doc("blog/b", "blog", 0, "2013-06-01"),
            doc("blog", "", 0, "2012-01-01"),
        ];
        order_documents(&mut documents);
        let first = doc_index(&documents, "blog/a");
        let chain = follow(&documents, first);
        assert_eq!(titles(&documents, &chain), vec!["blog/a", "blog/b", "blog/c"]);
        assert_eq!(documents[first.0].previous, None);
        let blog = doc_index(&documents, "blog");
        assert!(chain.iter().all(|d| documents[d.0].parent == Some(blog)));
    }

    #[test]
    fn equal_dates_keep_discovery_order() {
        let mut documents = vec![
            doc("x/one", "x", 0, "2013-01-01"),
            doc("x/two", "x", 0, "2013-01-01"),
        ];
        order_documents(&mut documents);
        assert_eq!(documents[0].next, Some(DocId(1)));
    }

    #[test]
    fn missing_parent_document_means_no_parent() {
        let mut documents = vec![doc("orphans/a", "orphans", 0, "2013-01-01")];
        order_documents(&mut documents);
        assert_eq!(documents[0].parent, None);
    }

    #[test]
    fn root_index_is_not_its_own_parent() {
        let mut documents = vec![
            doc("", "", 0, "2013-01-01"),
            doc("about", "", 0, "2013-01-02"),
        ];
        order_documents(&mut documents);
        assert_eq!(documents[0].parent, None);
        assert_eq!(documents[1].parent, Some(DocId(0)));
    }

    #[test]
    fn partials_are_not_ordered() {
        let mut documents = vec![
            doc("a", "", 0, "2013-01-01"),
            doc("nav", "", 0, "2013-01-02"),
        ];
        documents[1].partial = true;
        order_documents(&mut documents);
        assert_eq!(documents[0].next, None);
        assert_eq!(documents[1].previous, None);
    }

    // =========================================================================
    // Explicit books
    // =========================================================================

    fn guide() -> Vec<DocumentFile> {
        vec![
            doc("guide", "", 0, "2013-01-01"),
            doc("guide/usage", "guide", 3, "2013-01-01"),
            doc("guide/intro", "guide", 1, "2013-01-01"),
            doc("guide/install/mac", "guide/install", 2, "2013-01-01"),
            doc("guide/install", "guide", 2, "2013-01-01"),
            doc("guide/install/linux", "guide/install", 1, "2013-01-01"),
        ]
    }

    #[test]
    fn explicit_group_under_unordered_parent_becomes_book() {
        let mut documents = guide();
        let tree = order_documents(&mut documents);
        assert_eq!(tree.len(), 1);
        let (book_id, book) = tree.books().next().unwrap();
        assert_eq!(book.parent_id, "guide");
        assert_eq!(book.parent, Some(doc_index(&documents, "guide")));
        let chapters: Vec<DocId> = book.chapters.iter().map(|&n| tree.page(n).document()).collect();
        assert_eq!(
            titles(&documents, &chapters),
            vec!["guide/intro", "guide/install", "guide/usage"]
        );
        assert!(book.chapters.iter().all(|&n| tree.page(n).is_chapter()));
        assert!(documents[doc_index(&documents, "guide/intro").0].book == Some(book_id));
    }

    #[test]
    fn ordered_folder_index_heads_its_children() {
        // guide/index.html (order 1) with guide/1.-intro and guide/2.-usage.
        let mut documents = vec![
            doc("guide", "", 1, "2013-01-01"),
            doc("guide/intro", "guide", 1, "2013-01-01"),
            doc("guide/usage", "guide", 2, "2013-01-01"),
        ];
        let tree = order_documents(&mut documents);
        assert_eq!(tree.len(), 1);
        assert!(documents.iter().all(|d| d.book == Some(BookId(0))));

        let chain = follow(&documents, DocId(0));
        assert_eq!(titles(&documents, &chain), vec!["guide", "guide/intro", "guide/usage"]);
        assert_eq!(documents[0].parent, None);
        assert_eq!(documents[1].parent, Some(DocId(0)));
        assert_eq!(documents[2].previous, Some(DocId(1)));
    }

    #[test]
    fn walk_links_across_levels() {
        let mut documents = guide();
        order_documents(&mut documents);
        let chain = follow(&documents, doc_index(&documents, "guide/intro"));
        assert_eq!(
            titles(&documents, &chain),
            vec![
                "guide/intro",
                "guide/install",
                "guide/install/linux",
                "guide/install/mac",
                "guide/usage"
            ]
        );
    }

    #[test]
    fn structural_parents_follow_the_tree() {
        let mut documents = guide();
        order_documents(&mut documents);
        let guide_doc = doc_index(&documents, "guide");
        let install = doc_index(&documents, "guide/install");
        assert_eq!(documents[doc_index(&documents, "guide/intro").0].parent, Some(guide_doc));
        assert_eq!(documents[doc_index(&documents, "guide/install/mac").0].parent, Some(install));
    }

    #[test]
    fn chapter_is_nearest_enclosing_chapter() {
        let mut documents = guide();
        let tree = order_documents(&mut documents);
        let install = doc_index(&documents, "guide/install");
        let linux = doc_index(&documents, "guide/install/linux");
        let chapter = documents[linux.0].chapter.unwrap();
        assert_eq!(tree.page(chapter).document(), install);
    }

    #[test]
    fn sub_page_promoted_in_place_keeps_position() {
        // "a/b" is placed as a plain sub-page of "a" before its own children
        // are seen; it must become a chapter at the same index.
        let mut documents = vec![
            doc("a", "", 1, "2013-01-01"),
            doc("a/x", "a", 1, "2013-01-01"),
            doc("a/b", "a", 2, "2013-01-01"),
            doc("a/z", "a", 3, "2013-01-01"),
            doc("a/b/c", "a/b", 1, "2013-01-01"),
        ];
        let tree = order_documents(&mut documents);
        let a_node = tree.node_of(DocId(0)).unwrap();
        let subs: Vec<DocId> = tree
            .page(a_node)
            .sub_pages()
            .iter()
            .map(|&n| tree.page(n).document())
            .collect();
        assert_eq!(titles(&documents, &subs), vec!["a/x", "a/b", "a/z"]);
        let b_node = tree.node_of(DocId(2)).unwrap();
        assert!(tree.page(b_node).is_chapter());
        assert_eq!(tree.page(b_node).sub_pages().len(), 1);

        let chain = follow(&documents, DocId(0));
        assert_eq!(titles(&documents, &chain), vec!["a", "a/x", "a/b", "a/b/c", "a/z"]);
    }

    #[test]
    fn chapter_created_before_it_is_placed() {
        // Children of "a/b" are grouped before "a/b" itself is seen.
        let mut documents = vec![
            doc("a/b/c", "a/b", 1, "2013-01-01"),
            doc("a", "", 1, "2013-01-01"),
            doc("a/b", "a", 1, "2013-01-01"),
        ];
        order_documents(&mut documents);
        let chain = follow(&documents, doc_index(&documents, "a"));
        assert_eq!(titles(&documents, &chain), vec!["a", "a/b", "a/b/c"]);
        assert_eq!(documents[0].parent, Some(doc_index(&documents, "a/b")));
    }

    #[test]
    fn order_is_non_decreasing_along_chapters() {
        let mut documents = vec![
            doc("b", "", 5, "2013-01-01"),
            doc("a", "", 2, "2013-01-01"),
            doc("c", "", 2, "2013-01-01"),
        ];
        order_documents(&mut documents);
        let chain = follow(&documents, DocId(1));
        let orders: Vec<i64> = chain.iter().map(|d| documents[d.0].order).collect();
        assert_eq!(orders, vec![2, 2, 5]);
        assert_eq!(titles(&documents, &chain), vec!["a", "c", "b"]);
    }

    // =========================================================================
    // Active views
    // =========================================================================

    #[test]
    fn view_marks_active_page_and_ancestors() {
        let mut documents = guide();
        let tree = order_documents(&mut documents);
        let mac = doc_index(&documents, "guide/install/mac");
        let view = tree.view(BookId(0), mac);

        let install = &view.chapters[1];
        assert!(install.chapter);
        assert!(!install.active);
        assert!(install.has_active_descendant);
        assert!(install.sub_pages[1].active);
        assert!(!view.chapters[0].active && !view.chapters[0].has_active_descendant);
    }

    #[test]
    fn views_do_not_change_the_tree() {
        let mut documents = guide();
        let tree = order_documents(&mut documents);
        let before = format!("{tree:?}");
        let _ = tree.view(BookId(0), DocId(3));
        let _ = tree.view(BookId(0), DocId(2));
        assert_eq!(format!("{tree:?}"), before);
    }
}
