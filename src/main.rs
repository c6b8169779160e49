use clap::{Parser, Subcommand};
use postpress::config::{self, CONFIG_FILENAME, SiteConfig};
use postpress::output;
use postpress::pipeline::{self, BuildOutput, Context};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(name = "postpress")]
#[command(about = "Static blog builder with an HTML post-processing pass")]
#[command(long_about = "\
Static blog builder with an HTML post-processing pass

Every index.md below the pages directory becomes a page at the URL of its
directory. Pages whose front matter declares a date are posts: they are
listed on the home page and in the RSS feed, newest first.

Project structure:

  .
  ├── postpress.toml               # Configuration (optional)
  ├── public/                      # Copied verbatim to the output root
  │   └── styles/main.css          # Stylesheet minified by postprocess
  └── src/
      ├── scripts/index.js         # Entry script → scripts/index.js (optional)
      └── pages/
          ├── about/index.md       # Page → /about
          └── 2024/hello/
              ├── index.md         # Post → /2024/hello
              └── media/cover.jpg  # Copied next to the built page

Front matter:
  title:     page title
  date:      YYYY-MM-DD or RFC 3339; makes the page a post
  abstract:  summary shown in the listing and the page description
  draft:     true keeps a post out of the listing and feed

Post-processing rewrites every local <img> into responsive markup with
generated derivatives, minifies the stylesheet and adds view-transition
names linking listing entries to their articles.

Run 'postpress gen-config' to generate a documented postpress.toml.")]
#[command(version)]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Config file (default: <root>/postpress.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build pages, overview, feed and assets into the output directory
    Build,
    /// Post-process an existing build: stylesheet, images, view transitions
    Postprocess,
    /// Run build, then postprocess
    All,
    /// Discover pages and print an inventory without building
    Check,
    /// Discover pages and print them as JSON
    Pages,
    /// Print a stock postpress.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build => {
            let ctx = context(&cli)?;
            println!("==> Building {}", ctx.paths.root.display());
            let report = pipeline::build(&ctx)?;
            output::print_build_report(&report, &ctx.paths.root);
        }
        Command::Postprocess => {
            let ctx = context(&cli)?;
            let build = BuildOutput::open(&ctx.paths.output)?;
            println!("==> Post-processing {}", build.root().display());
            let report = pipeline::postprocess(&ctx, &build)?;
            output::print_postprocess_report(&report);
        }
        Command::All => {
            let ctx = context(&cli)?;
            println!("==> Stage 1: Building {}", ctx.paths.root.display());
            let report = pipeline::build(&ctx)?;
            output::print_build_report(&report, &ctx.paths.root);

            println!("==> Stage 2: Post-processing {}", report.output.root().display());
            let post = pipeline::postprocess(&ctx, &report.output)?;
            output::print_postprocess_report(&post);

            println!("==> Build complete: {}", report.output.root().display());
        }
        Command::Check => {
            let ctx = context(&cli)?;
            println!("==> Checking {}", ctx.paths.pages.display());
            let pages = pipeline::discover(&ctx)?;
            output::print_inventory(&pages, &ctx.paths.pages);
            println!("==> Content is valid");
        }
        Command::Pages => {
            let ctx = context(&cli)?;
            let pages = pipeline::discover(&ctx)?;
            println!("{}", serde_json::to_string_pretty(&pages)?);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Logs go to stderr so command output on stdout stays pipeable.
fn init_tracing(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// An explicit `--config` must exist; the default location may be absent.
fn load_site_config(root: &Path, explicit: Option<&Path>) -> Result<SiteConfig, config::ConfigError> {
    match explicit {
        Some(path) => config::parse_config(&std::fs::read_to_string(path)?),
        None => config::load_config(&root.join(CONFIG_FILENAME)),
    }
}

/// Load the config, size the thread pool and build the run context.
fn context(cli: &Cli) -> Result<Context, Box<dyn std::error::Error>> {
    let site_config = load_site_config(&cli.root, cli.config.as_deref())?;
    init_thread_pool(&site_config.processing);
    Ok(Context::new(&cli.root, site_config)?)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: the config can lower it, not raise it.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
