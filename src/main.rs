use clap::{Parser, Subcommand};
use folio::build::{self, BuildOptions, FileSystemSink};
use folio::render::RendererRegistry;
use folio::{config, output};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Incremental content build engine")]
#[command(long_about = "\
Incremental content build engine

A site is a folder of source files. Documents carry front matter and render
through the engines named by their extensions, innermost first
(page.html.tpl.md renders markdown, then the template). Layouts wrap them.

Site structure:

  site/
  ├── config.toml                  # Site config (optional)
  ├── documents/                   # Rendered to the output folder
  │   ├── index.html.tpl           # → index.html
  │   ├── about.html.md            # → about/index.html
  │   ├── nav.partial.tpl          # Partial: only rendered when included
  │   └── blog/
  │       └── 2024-1-5-hello.html.md   # → blog/2024/01/05/hello/index.html
  ├── layouts/
  │   └── default.html.tpl         # Wraps HTML documents without a layout
  ├── data/                        # Queryable, never rendered
  └── files/                       # Copied as is

Only documents whose source or contributing files changed since the last
build are rendered again; pass --full to render everything.

Run 'folio gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Output directory (overrides `output` in config.toml)
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render the site
    Render {
        /// Ignore the last-run record and render every document
        #[arg(long)]
        full: bool,
        /// Site root
        #[arg(default_value = ".")]
        root: PathBuf,
    },
    /// Load the site and report what a render would do
    Check {
        /// Ignore the last-run record
        #[arg(long)]
        full: bool,
        /// Site root
        #[arg(default_value = ".")]
        root: PathBuf,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("folio=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let registry = RendererRegistry::with_builtin();

    match cli.command {
        Command::Render { full, root } => {
            let options = BuildOptions {
                full,
                output: cli.out,
            };
            let site_config = build::site_config(&root, &options)?;
            init_thread_pool(&site_config.processing);
            let site = build::prepare(&root, site_config, &registry)?;
            let report = build::build_site(site, &options, &registry, &FileSystemSink)?;
            output::print_build_report(&report);
            if !report.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Check { full, root } => {
            let options = BuildOptions {
                full,
                output: cli.out,
            };
            let report = build::check(&root, &options, &registry)?;
            output::print_check_output(&report);
            if !report.failures.is_empty() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: the config can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
