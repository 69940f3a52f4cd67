//! The content model: every kind of file a site is built from.
//!
//! | Type | Folder | Rendered | Queryable as |
//! |------|--------|----------|--------------|
//! | [`DocumentFile`] | `documents/` | yes, to its [`OutputLocation`] | `documents` |
//! | [`LayoutFile`] | `layouts/` | around documents | `layouts` |
//! | [`DataFile`] | `data/` | no | `data` |
//! | [`StaticFile`] | `files/` | copied | `files` |

pub mod document;
pub mod layout;
pub mod metadata;
pub mod source;

pub use document::{DocumentFile, DocumentOptions, OutputLocation, join_url};
pub use layout::{DataFile, LayoutFile, StaticFile};
pub use metadata::{MetaValue, MetadataCollection};
pub use source::{
    DataId, DocId, FileId, FileRef, LayoutId, SourceFile, friendly_date, relative_slash_path,
    standard_utc_date, utc_date,
};
