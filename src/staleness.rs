//! Incremental builds: deciding which outputs are still valid.
//!
//! Every build ends by writing a last-run record to
//! `<output>/.folio-lastrun.json`: for each rendered document, its source path,
//! its modified time, and every file that contributed to its output (layouts,
//! partials, documents read through queries) with their modified times.
//!
//! The next build reads that record before rendering and classifies:
//!
//! - **Static files**: unmodified when the output exists and its modified time
//!   is exactly the source's (the sink preserves timestamps on copy).
//! - **Documents**: unmodified when a record exists for the source, the output
//!   exists and is not older than the source, and no recorded contributor is
//!   newer than the output. A contributor that no longer exists makes the
//!   document stale.
//!
//! Pagination clones are always stale and never recorded.
//!
//! ## Bypassing the record
//!
//! `folio render --full` starts from [`LastRun::empty`], so every document is
//! rendered. The record is still written at the end.

use crate::content::{DocId, FileId, FileRef};
use crate::site::Site;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Name of the last-run record within the output directory.
const LAST_RUN_FILENAME: &str = ".folio-lastrun.json";

/// Version of the record format. Bumping it makes every existing record
/// unreadable, forcing a full build.
const LAST_RUN_VERSION: u32 = 1;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct LastRunContributingFile {
    /// Site-root-relative, `/`-separated.
    pub path: String,
    pub modified: SystemTime,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct LastRunDocument {
    /// Documents-folder-relative source path.
    pub source_relative_path: String,
    pub modified: SystemTime,
    pub contributors: Vec<LastRunContributingFile>,
}

/// What the previous build observed.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LastRun {
    pub version: u32,
    pub documents: Vec<LastRunDocument>,
}

impl LastRun {
    pub fn empty() -> Self {
        Self {
            version: LAST_RUN_VERSION,
            documents: Vec::new(),
        }
    }

    /// Load from the output directory. A missing, unreadable or outdated
    /// record loads as empty.
    pub fn load(output_dir: &Path) -> Self {
        let path = last_run_path(output_dir);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(record) if record.version == LAST_RUN_VERSION => record,
            Ok(_) => {
                tracing::debug!(path = %path.display(), "last-run record has another version, ignoring");
                Self::empty()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable last-run record, ignoring");
                Self::empty()
            }
        }
    }

    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(output_dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(last_run_path(output_dir), json)
    }

    fn lookup(&self) -> HashMap<&str, &LastRunDocument> {
        self.documents
            .iter()
            .map(|d| (d.source_relative_path.as_str(), d))
            .collect()
    }

    /// The record for the next build: `written` documents replace their
    /// previous entries, everything else passes through.
    pub fn merge(&self, site: &Site, written: &[DocId]) -> Self {
        let mut entries: IndexMap<String, LastRunDocument> = self
            .documents
            .iter()
            .map(|d| (d.source_relative_path.clone(), d.clone()))
            .collect();
        for &id in written {
            let document = site.document(id);
            if document.is_clone() {
                continue;
            }
            let contributors = site
                .all_contributing_files(FileRef::Document(id))
                .into_iter()
                .map(|file| {
                    let source = site.source_of(file);
                    LastRunContributingFile {
                        path: site.root_relative(&source.path),
                        modified: source.modified,
                    }
                })
                .collect();
            let record = LastRunDocument {
                source_relative_path: document.source.relative_path.clone(),
                modified: document.source.modified,
                contributors,
            };
            entries.insert(record.source_relative_path.clone(), record);
        }
        Self {
            version: LAST_RUN_VERSION,
            documents: entries.into_values().collect(),
        }
    }
}

/// Path of the last-run record for an output directory.
pub fn last_run_path(output_dir: &Path) -> PathBuf {
    output_dir.join(LAST_RUN_FILENAME)
}

/// Result of classifying every output of a site.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Staleness {
    /// In site order.
    pub stale_documents: IndexSet<DocId>,
    pub unmodified_documents: Vec<DocId>,
    pub stale_files: Vec<FileId>,
    pub unmodified_files: Vec<FileId>,
}

impl Staleness {
    pub fn is_document_stale(&self, id: DocId) -> bool {
        self.stale_documents.contains(&id)
    }
}

/// Modified times looked up once per build.
#[derive(Default)]
struct MtimeCache {
    times: HashMap<PathBuf, Option<SystemTime>>,
}

impl MtimeCache {
    fn get(&mut self, path: &Path) -> Option<SystemTime> {
        *self
            .times
            .entry(path.to_path_buf())
            .or_insert_with(|| modified_time(path))
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Classify static files and non-partial documents against `last_run`.
pub fn classify(site: &Site, last_run: &LastRun) -> Staleness {
    let mut result = Staleness::default();

    for (i, file) in site.files.iter().enumerate() {
        let id = FileId(i);
        if modified_time(&file.output.path) == Some(file.source.modified) {
            result.unmodified_files.push(id);
        } else {
            result.stale_files.push(id);
        }
    }

    let records = last_run.lookup();
    let mut mtimes = MtimeCache::default();
    for (i, document) in site.documents.iter().enumerate() {
        if document.partial {
            continue;
        }
        let id = DocId(i);
        let unmodified = !document.is_clone()
            && records
                .get(document.source.relative_path.as_str())
                .is_some_and(|record| {
                    let Some(output) = mtimes.get(&document.output.path) else {
                        return false;
                    };
                    output >= document.source.modified
                        && record.contributors.iter().all(|c| {
                            mtimes
                                .get(&site.root.join(&c.path))
                                .is_some_and(|current| current <= output)
                        })
                });
        tracing::debug!(document = %document.id, unmodified, "classified");
        if unmodified {
            result.unmodified_documents.push(id);
        } else {
            result.stale_documents.insert(id);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{loaded_site, write_file};
    use std::fs::{self, File};
    use std::time::Duration;
    use tempfile::TempDir;

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
    }

    /// A site with one document using one layout, rendered once at t=10.
    fn built_site(tmp: &TempDir) -> (Site, LastRun) {
        let root = tmp.path();
        write_file(root, "documents/page.html.md", "hello");
        write_file(root, "layouts/default.html.tpl", "{{content}}");
        set_mtime(&root.join("documents/page.html.md"), at(0));
        set_mtime(&root.join("layouts/default.html.tpl"), at(0));

        let mut site = loaded_site(root);
        let page = site.find_document("page").unwrap();
        site.add_contributing_file(FileRef::Document(page), FileRef::Layout(crate::content::LayoutId(0)));
        let output = site.document(page).output.path.clone();
        fs::create_dir_all(output.parent().unwrap()).unwrap();
        fs::write(&output, "<p>hello</p>").unwrap();
        set_mtime(&output, at(10));

        let record = LastRun::empty().merge(&site, &[page]);
        (site, record)
    }

    // =========================================================================
    // Record persistence
    // =========================================================================

    #[test]
    fn missing_record_loads_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(LastRun::load(tmp.path()).documents.is_empty());
    }

    #[test]
    fn corrupt_or_outdated_record_loads_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(last_run_path(tmp.path()), "not json").unwrap();
        assert!(LastRun::load(tmp.path()).documents.is_empty());

        fs::write(last_run_path(tmp.path()), r#"{"version": 999, "documents": []}"#).unwrap();
        assert_eq!(LastRun::load(tmp.path()).version, LAST_RUN_VERSION);
    }

    #[test]
    fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        let (site, record) = built_site(&tmp);
        record.save(&site.output_root).unwrap();
        let loaded = LastRun::load(&site.output_root);
        assert_eq!(loaded.documents, record.documents);
        assert_eq!(loaded.documents[0].contributors[0].path, "layouts/default.html.tpl");
    }

    #[test]
    fn merge_replaces_written_and_keeps_others() {
        let tmp = TempDir::new().unwrap();
        let (site, _) = built_site(&tmp);
        let previous = LastRun {
            version: LAST_RUN_VERSION,
            documents: vec![
                LastRunDocument {
                    source_relative_path: "gone.html.md".into(),
                    modified: at(0),
                    contributors: vec![],
                },
                LastRunDocument {
                    source_relative_path: "page.html.md".into(),
                    modified: at(0),
                    contributors: vec![],
                },
            ],
        };
        let page = site.find_document("page").unwrap();
        let merged = previous.merge(&site, &[page]);
        assert_eq!(merged.documents.len(), 2);
        assert_eq!(merged.documents[0].source_relative_path, "gone.html.md");
        assert_eq!(merged.documents[1].contributors.len(), 1);
    }

    // =========================================================================
    // Classification
    // =========================================================================

    #[test]
    fn up_to_date_document_is_unmodified() {
        let tmp = TempDir::new().unwrap();
        let (site, record) = built_site(&tmp);
        let result = classify(&site, &record);
        assert_eq!(result.unmodified_documents.len(), 1);
        assert!(result.stale_documents.is_empty());
    }

    #[test]
    fn touching_a_contributor_makes_it_stale() {
        let tmp = TempDir::new().unwrap();
        let (site, record) = built_site(&tmp);
        set_mtime(&tmp.path().join("layouts/default.html.tpl"), at(20));
        let result = classify(&site, &record);
        assert_eq!(result.stale_documents.len(), 1);
    }

    #[test]
    fn deleted_contributor_makes_it_stale() {
        let tmp = TempDir::new().unwrap();
        let (site, record) = built_site(&tmp);
        fs::remove_file(tmp.path().join("layouts/default.html.tpl")).unwrap();
        assert_eq!(classify(&site, &record).stale_documents.len(), 1);
    }

    #[test]
    fn no_record_or_no_output_is_stale() {
        let tmp = TempDir::new().unwrap();
        let (site, record) = built_site(&tmp);
        assert_eq!(classify(&site, &LastRun::empty()).stale_documents.len(), 1);

        let page = site.find_document("page").unwrap();
        fs::remove_file(&site.document(page).output.path).unwrap();
        assert_eq!(classify(&site, &record).stale_documents.len(), 1);
    }

    #[test]
    fn source_newer_than_output_is_stale() {
        let tmp = TempDir::new().unwrap();
        let (mut site, record) = built_site(&tmp);
        site.documents[0].source.modified = at(11);
        assert_eq!(classify(&site, &record).stale_documents.len(), 1);
    }

    #[test]
    fn clones_are_always_stale() {
        let tmp = TempDir::new().unwrap();
        let (mut site, record) = built_site(&tmp);
        let page = site.find_document("page").unwrap();
        let clone = site
            .document(page)
            .clone_for_page(page, site.document(page).output.clone());
        let clone = site.push_document(clone);
        let result = classify(&site, &record);
        assert!(result.is_document_stale(clone));
        assert!(!result.is_document_stale(page));

        let merged = record.merge(&site, &[page, clone]);
        assert_eq!(merged.documents.len(), 1);
    }

    #[test]
    fn stale_documents_keep_site_order() {
        let tmp = TempDir::new().unwrap();
        for name in ["a", "b", "c"] {
            write_file(tmp.path(), &format!("documents/{name}.html.md"), name);
        }
        let site = loaded_site(tmp.path());
        let result = classify(&site, &LastRun::empty());
        let ids: Vec<DocId> = result.stale_documents.iter().copied().collect();
        assert_eq!(ids, (0..site.documents.len()).map(DocId).collect::<Vec<_>>());
        assert!(ids.iter().all(|&id| result.is_document_stale(id)));
        assert!(!result.is_document_stale(DocId(99)));
    }

    #[test]
    fn static_file_needs_matching_mtime() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "files/site.css", "body {}");
        set_mtime(&tmp.path().join("files/site.css"), at(0));
        let site = loaded_site(tmp.path());
        assert_eq!(classify(&site, &LastRun::empty()).stale_files, vec![FileId(0)]);

        let output = &site.files[0].output.path;
        fs::create_dir_all(output.parent().unwrap()).unwrap();
        fs::write(output, "body {}").unwrap();
        set_mtime(output, at(0));
        assert_eq!(classify(&site, &LastRun::empty()).unmodified_files, vec![FileId(0)]);

        set_mtime(output, at(5));
        assert_eq!(classify(&site, &LastRun::empty()).stale_files, vec![FileId(0)]);
    }
}
