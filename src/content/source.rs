//! Source files and the handles that address them.
//!
//! Every discovered file lives in one arena on the [`Site`](crate::site::Site)
//! and is referred to by a small copyable index (`DocId`, `LayoutId`, ...).
//! Cross-file relationships (prev/next links, contributing files) store these
//! handles instead of references, so the file graph can contain cycles without
//! ownership trouble.

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Index of a document in the site arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId(pub usize);

/// Index of a layout in the site arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayoutId(pub usize);

/// Index of a data file in the site arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataId(pub usize);

/// Index of a static file in the site arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub usize);

/// A handle to any kind of source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileRef {
    Document(DocId),
    Layout(LayoutId),
    Data(DataId),
    File(FileId),
}

/// What every discovered file has in common.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the folder the file was discovered in, `/`-separated.
    pub relative_path: String,
    pub created: SystemTime,
    pub modified: SystemTime,
    /// Files whose content influenced this one. Never contains the file itself.
    contributing: Vec<FileRef>,
}

impl SourceFile {
    pub fn new(
        path: PathBuf,
        relative_path: String,
        created: SystemTime,
        modified: SystemTime,
    ) -> Self {
        Self {
            path,
            relative_path,
            created,
            modified,
            contributing: Vec::new(),
        }
    }

    /// Stat `path` and record it relative to `folder`.
    pub fn from_disk(folder: &Path, path: &Path) -> io::Result<Self> {
        let meta = fs::metadata(path)?;
        let modified = meta.modified()?;
        // Not every filesystem records a birth time.
        let created = meta.created().unwrap_or(modified);
        Ok(Self::new(
            path.to_path_buf(),
            relative_slash_path(folder, path),
            created,
            modified,
        ))
    }

    /// The direct contributing files recorded so far.
    pub fn contributing_files(&self) -> &[FileRef] {
        &self.contributing
    }

    /// Record a contributor. Duplicates are ignored; returns whether it was new.
    /// Self-references are filtered by the caller, which knows this file's handle.
    pub(crate) fn add_contributing_file(&mut self, file: FileRef) -> bool {
        if self.contributing.contains(&file) {
            return false;
        }
        self.contributing.push(file);
        true
    }

    pub(crate) fn clear_contributing_files(&mut self) {
        self.contributing.clear();
    }

    /// Modified time as a local naive timestamp (the fallback document date).
    pub fn modified_date(&self) -> NaiveDateTime {
        DateTime::<Local>::from(self.modified).naive_local()
    }

    /// Final path component.
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

/// `path` relative to `root` with `/` separators, whatever the platform.
pub fn relative_slash_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// ISO 8601 rendering of a local date converted to UTC.
pub fn utc_date(date: NaiveDateTime) -> String {
    to_utc(date).format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Human-readable date, e.g. `December 18, 2013`.
pub fn friendly_date(date: NaiveDateTime) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// RFC 1123 date for feeds and headers, e.g. `Wed, 18 Dec 2013 00:00:00 GMT`.
pub fn standard_utc_date(date: NaiveDateTime) -> String {
    to_utc(date).format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn to_utc(date: NaiveDateTime) -> DateTime<Utc> {
    match date.and_local_timezone(Local) {
        chrono::LocalResult::Single(local) => local.with_timezone(&Utc),
        chrono::LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        chrono::LocalResult::None => date.and_utc(),
    }
}
