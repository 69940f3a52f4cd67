//! The end-to-end build.
//!
//! ```text
//! config.toml → Site::load → order → paginate → classify → copy files
//!             → render (two phases) → write → last-run record
//! ```
//!
//! Loading, ordering, pagination and classification are barriers: each sees
//! the complete document set before the next starts. Rendering and writing
//! run on the rayon pool.
//!
//! Output goes through an [`OutputSink`] so the pipeline can be exercised
//! without a real output tree; [`FileSystemSink`] is the one the CLI uses.
//!
//! Only a handful of problems stop a build: an unreadable config, a source
//! file that can't be read, an invalid `paginate` query, or a last-run record
//! that can't be saved. Everything else (render failures, duplicate output
//! paths, write errors) is collected per file in [`BuildReport::failures`] and
//! the rest of the site still builds.

use crate::config::{self, ConfigError, SiteConfig};
use crate::content::{DocId, FileId, FileRef, OutputLocation, StaticFile};
use crate::ordering::order_documents;
use crate::paginate::{PaginateError, paginate};
use crate::render::{RenderTransaction, RendererRegistry};
use crate::site::{Site, SiteError};
use crate::staleness::{LastRun, Staleness, classify};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Site(#[from] SiteError),
    #[error(transparent)]
    Paginate(#[from] PaginateError),
    #[error("failed to save {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where rendered documents and copied files go.
pub trait OutputSink: Sync {
    fn write(&self, location: &OutputLocation, contents: &str) -> io::Result<()>;

    /// Copy a static file, keeping its modified time.
    fn copy(&self, file: &StaticFile) -> io::Result<()>;
}

/// Writes into the output folder on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSystemSink;

impl OutputSink for FileSystemSink {
    fn write(&self, location: &OutputLocation, contents: &str) -> io::Result<()> {
        if let Some(parent) = location.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&location.path, contents)
    }

    fn copy(&self, file: &StaticFile) -> io::Result<()> {
        if let Some(parent) = file.output.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&file.source.path, &file.output.path)?;
        // Static staleness compares the copy's mtime with the source's.
        File::options()
            .write(true)
            .open(&file.output.path)?
            .set_modified(file.source.modified)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Ignore the last-run record and render everything.
    pub full: bool,
    /// Replaces the configured `output` folder.
    pub output: Option<PathBuf>,
}

/// A file that could not be produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildFailure {
    /// Folder-relative source path.
    pub source: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub output_root: PathBuf,
    /// Documents rendered and written.
    pub rendered: usize,
    /// Documents whose previous output is still valid.
    pub unmodified: usize,
    /// Static files copied.
    pub copied: usize,
    /// Drafts, and documents no renderer produced output for.
    pub skipped: usize,
    pub failures: Vec<BuildFailure>,
}

impl BuildReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// What a build would do, without rendering anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckReport {
    pub documents: usize,
    pub layouts: usize,
    pub data: usize,
    pub files: usize,
    pub books: usize,
    /// Pagination pages past the first.
    pub pages: usize,
    pub drafts: usize,
    pub partials: usize,
    /// Source paths of documents that would be rendered.
    pub stale: Vec<String>,
    pub unmodified: usize,
    pub stale_files: usize,
    pub failures: Vec<BuildFailure>,
}

/// Load `config.toml` from `root` and apply option overrides.
pub fn site_config(root: &Path, options: &BuildOptions) -> Result<SiteConfig, BuildError> {
    let mut config = config::load_config(root)?;
    if let Some(output) = &options.output {
        config.output = output.to_string_lossy().into_owned();
        config.validate()?;
    }
    Ok(config)
}

/// Load the site and run the whole-site passes: ordering and pagination.
pub fn prepare(root: &Path, config: SiteConfig, registry: &RendererRegistry) -> Result<Site, BuildError> {
    let mut site = Site::load(root, config, &registry.extensions())?;
    site.books = order_documents(&mut site.documents);
    let clones = paginate(&mut site)?;
    tracing::info!(
        documents = site.documents.len(),
        books = site.books.books().count(),
        pages = clones.len(),
        "ordered and paginated"
    );
    Ok(site)
}

/// Build the site at `root` into the configured output folder.
pub fn build(
    root: &Path,
    options: &BuildOptions,
    registry: &RendererRegistry,
    sink: &dyn OutputSink,
) -> Result<BuildReport, BuildError> {
    let config = site_config(root, options)?;
    let site = prepare(root, config, registry)?;
    build_site(site, options, registry, sink)
}

/// Render and write a prepared site.
pub fn build_site(
    mut site: Site,
    options: &BuildOptions,
    registry: &RendererRegistry,
    sink: &dyn OutputSink,
) -> Result<BuildReport, BuildError> {
    let last_run = if options.full {
        LastRun::empty()
    } else {
        LastRun::load(&site.output_root)
    };
    let staleness = classify(&site, &last_run);
    let (duplicates, mut failures) = duplicate_outputs(&site);

    let mut report = BuildReport {
        output_root: site.output_root.clone(),
        unmodified: staleness.unmodified_documents.len(),
        ..BuildReport::default()
    };

    // Static files
    let copies: Vec<(FileId, io::Result<()>)> = staleness
        .stale_files
        .par_iter()
        .filter(|&&id| !duplicates.contains(&FileRef::File(id)))
        .map(|&id| (id, sink.copy(&site.files[id.0])))
        .collect();
    for (id, result) in copies {
        match result {
            Ok(()) => report.copied += 1,
            Err(e) => failures.push(BuildFailure {
                source: site.files[id.0].source.relative_path.clone(),
                message: format!("copy failed: {e}"),
            }),
        }
    }

    // Documents
    let targets = render_targets(&site, &staleness, &duplicates, &mut report);
    registry.unload(&changed_sources(&site, &targets, &last_run));
    tracing::info!(
        stale = targets.len(),
        unmodified = report.unmodified,
        "rendering"
    );

    let (rendered, commit) = {
        let tx = RenderTransaction::begin(&mut site, registry);
        let rendered = tx.render(&targets);
        (rendered, tx.commit())
    };
    site.record_contributions(commit.edges);

    let failed: HashSet<DocId> = commit.failures.iter().map(|f| f.document).collect();
    for failure in commit.failures {
        failures.push(BuildFailure {
            source: site.document(failure.document).source.relative_path.clone(),
            message: failure.message,
        });
    }

    let writes: Vec<(DocId, io::Result<()>)> = rendered
        .par_iter()
        .filter(|r| !failed.contains(&r.document))
        .filter_map(|r| {
            let text = r.output.as_ref()?;
            Some((r.document, sink.write(&site.document(r.document).output, text)))
        })
        .collect();
    report.skipped += rendered
        .iter()
        .filter(|r| r.output.is_none() && !failed.contains(&r.document))
        .count();

    let mut written = Vec::with_capacity(writes.len());
    for (id, result) in writes {
        match result {
            Ok(()) => written.push(id),
            Err(e) => failures.push(BuildFailure {
                source: site.document(id).source.relative_path.clone(),
                message: format!("write failed: {e}"),
            }),
        }
    }
    report.rendered = written.len();

    let record = last_run.merge(&site, &written);
    record
        .save(&site.output_root)
        .map_err(|source| BuildError::Io {
            path: crate::staleness::last_run_path(&site.output_root),
            source,
        })?;

    report.failures = failures;
    tracing::info!(
        rendered = report.rendered,
        copied = report.copied,
        failed = report.failed(),
        "build finished"
    );
    Ok(report)
}

/// Report what a build would do.
pub fn check(
    root: &Path,
    options: &BuildOptions,
    registry: &RendererRegistry,
) -> Result<CheckReport, BuildError> {
    let config = site_config(root, options)?;
    let site = prepare(root, config, registry)?;
    let last_run = if options.full {
        LastRun::empty()
    } else {
        LastRun::load(&site.output_root)
    };
    let staleness = classify(&site, &last_run);
    let (_, failures) = duplicate_outputs(&site);

    Ok(CheckReport {
        documents: site.documents.iter().filter(|d| !d.is_clone()).count(),
        layouts: site.layouts.len(),
        data: site.data.len(),
        files: site.files.len(),
        books: site.books.books().count(),
        pages: site.documents.iter().filter(|d| d.is_clone()).count(),
        drafts: site.documents.iter().filter(|d| d.draft).count(),
        partials: site.documents.iter().filter(|d| d.partial).count(),
        stale: staleness
            .stale_documents
            .iter()
            .map(|&id| site.document(id))
            .filter(|d| !d.draft)
            .map(|d| d.source.relative_path.clone())
            .collect(),
        unmodified: staleness.unmodified_documents.len(),
        stale_files: staleness.stale_files.len(),
        failures,
    })
}

/// Stale documents to render. Drafts count as skipped.
fn render_targets(
    site: &Site,
    staleness: &Staleness,
    duplicates: &HashSet<FileRef>,
    report: &mut BuildReport,
) -> Vec<DocId> {
    let mut targets = Vec::new();
    for &id in &staleness.stale_documents {
        let document = site.document(id);
        if document.draft {
            tracing::debug!(document = %document.id, "draft, skipping");
            report.skipped += 1;
        } else if !document.partial && !duplicates.contains(&FileRef::Document(id)) {
            targets.push(id);
        }
    }
    targets
}

/// Sources whose compiled templates may be out of date: the documents about
/// to render, and layouts that changed since the last run.
fn changed_sources(site: &Site, targets: &[DocId], last_run: &LastRun) -> Vec<PathBuf> {
    let recorded: HashMap<&str, std::time::SystemTime> = last_run
        .documents
        .iter()
        .flat_map(|d| &d.contributors)
        .map(|c| (c.path.as_str(), c.modified))
        .collect();
    let layouts = site.layouts.iter().filter(|layout| {
        recorded.get(site.root_relative(&layout.source.path).as_str()) != Some(&layout.source.modified)
    });
    targets
        .iter()
        .map(|&id| site.document(id).source.path.clone())
        .chain(layouts.map(|layout| layout.source.path.clone()))
        .collect()
}

/// Outputs claimed by more than one document or static file. Every claimant is
/// excluded from writing and reported.
fn duplicate_outputs(site: &Site) -> (HashSet<FileRef>, Vec<BuildFailure>) {
    let mut claims: HashMap<String, Vec<FileRef>> = HashMap::new();
    for (i, document) in site.documents.iter().enumerate() {
        if document.draft || document.partial {
            continue;
        }
        claims
            .entry(document.output.relative_path.to_lowercase())
            .or_default()
            .push(FileRef::Document(DocId(i)));
    }
    for (i, file) in site.files.iter().enumerate() {
        claims
            .entry(file.output.relative_path.to_lowercase())
            .or_default()
            .push(FileRef::File(FileId(i)));
    }

    let mut excluded = HashSet::new();
    let mut failures = Vec::new();
    let mut groups: Vec<(String, Vec<FileRef>)> =
        claims.into_iter().filter(|(_, refs)| refs.len() > 1).collect();
    groups.sort();
    for (output, refs) in groups {
        let sources: Vec<&str> = refs
            .iter()
            .map(|&r| site.source_of(r).relative_path.as_str())
            .collect();
        tracing::error!(output = %output, sources = ?sources, "duplicate output path");
        for (&file, source) in refs.iter().zip(&sources) {
            excluded.insert(file);
            failures.push(BuildFailure {
                source: source.to_string(),
                message: format!("duplicate output path '{output}' (claimed by {})", sources.join(", ")),
            });
        }
    }
    (excluded, failures)
}
