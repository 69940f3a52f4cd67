//! # Folio
//!
//! A content build engine. A site is a folder of source files: documents
//! with front matter, layouts that wrap them, data files and static files.
//! Folio turns it into an output tree, re-rendering only what changed since
//! the last build.
//!
//! # Architecture: Load, Link, Render
//!
//! ```text
//! 1. Load     documents/ layouts/ data/ files/  →  Site (arena of files)
//! 2. Link     order (prev/next, books) → paginate (clones) → classify (stale?)
//! 3. Render   own content (parallel) → layout chains (parallel) → write
//! ```
//!
//! Every file lives in an arena on the [`site::Site`] and is addressed by a
//! copyable handle. Navigation links and contributing-file edges are handles,
//! so the graph can be cyclic without reference-counting tricks.
//!
//! Linking needs the whole document set and runs single-threaded between
//! barriers. Rendering runs on the rayon pool inside one
//! [`render::RenderTransaction`], which borrows the site mutably for its whole
//! lifetime: only one can be open at a time.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`content`] | Documents, layouts, data and static files; identity and URL derivation |
//! | [`frontmatter`] | Splits a file into its metadata header and body |
//! | [`naming`] | Filename date and order prefixes, path sanitization |
//! | [`query`] | The embedded query language |
//! | [`ordering`] | Previous/next/parent links and the book tree |
//! | [`paginate`] | Splits query results across pages, cloning documents per page |
//! | [`staleness`] | The last-run record and stale/unmodified classification |
//! | [`render`] | Renderer plugins, the render context and the render transaction |
//! | [`site`] | Discovery, loading and the contributing-file graph |
//! | [`build`] | The end-to-end pipeline and output sink |
//! | [`config`] | `config.toml` loading, merging and validation |
//! | [`output`] | CLI summaries |
//!
//! # Incremental Builds
//!
//! While rendering, every file a document reads through its context (a
//! layout, a partial, a query result, a neighbour) is recorded as
//! contributing to it. The closure of those edges is saved next to the output
//! as `.folio-lastrun.json`. On the next build a document is only rendered
//! again when its source or any recorded contributor is newer than its output.

pub mod build;
pub mod config;
pub mod content;
pub mod frontmatter;
pub mod naming;
pub mod ordering;
pub mod output;
pub mod paginate;
pub mod query;
pub mod render;
pub mod site;
pub mod staleness;

#[cfg(test)]
pub(crate) mod test_helpers;
