use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use powerful_cases::app::{App, ListFilter, ListSource, ProgressSink};
use powerful_cases::cache::Cache;
use powerful_cases::config::{ConfigLoader, ResolvedConfig};
use powerful_cases::error::CaseError;
use powerful_cases::locator::FileRequest;
use powerful_cases::output::{JsonOutput, OutputMode, TextOutput};
use powerful_cases::registry::{HttpRegistry, NoRegistry, RegistryClient};
use powerful_cases::resolver::Resolver;

#[derive(Parser)]
#[command(name = "pcase")]
#[command(about = "Find, cache and export power-system test cases")]
#[command(version, author)]
struct Cli {
    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    /// Path to a powerfulcases.json config file.
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List available cases")]
    List(ListArgs),
    #[command(about = "List bundled collections")]
    Collections,
    #[command(about = "Show case metadata and files")]
    Info(NameArgs),
    #[command(about = "Print the path of a case file by format")]
    File(FileArgs),
    #[command(about = "Copy a case directory somewhere else")]
    Export(ExportArgs),
    #[command(about = "Download a remote case into the cache")]
    Download(DownloadArgs),
    #[command(about = "Remove cached remote cases")]
    ClearCache(ClearArgs),
    #[command(about = "Show cache location and size")]
    CacheInfo,
    #[command(about = "Write an inferred manifest.toml into a case directory")]
    CreateManifest(DirArgs),
}

#[derive(Args)]
struct ListArgs {
    #[arg(long, conflicts_with = "cached")]
    remote: bool,

    #[arg(long)]
    cached: bool,

    #[arg(long)]
    collection: Option<String>,

    #[arg(long)]
    tag: Option<String>,
}

#[derive(Args)]
struct NameArgs {
    name: String,
}

#[derive(Args)]
struct FileArgs {
    name: String,

    format: String,

    #[arg(long)]
    format_version: Option<String>,

    #[arg(long)]
    variant: Option<String>,

    /// Print nothing instead of failing when no file matches.
    #[arg(long)]
    optional: bool,
}

#[derive(Args)]
struct ExportArgs {
    name: String,

    dest: Utf8PathBuf,

    #[arg(long)]
    overwrite: bool,
}

#[derive(Args)]
struct DownloadArgs {
    name: String,

    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct ClearArgs {
    name: Option<String>,

    #[arg(long, conflicts_with = "name")]
    all: bool,

    #[arg(long)]
    yes: bool,
}

#[derive(Args)]
struct DirArgs {
    dir: Utf8PathBuf,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<CaseError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CaseError) -> u8 {
    match error {
        CaseError::UnknownCase { .. }
        | CaseError::AmbiguousCase { .. }
        | CaseError::InvalidPath(_)
        | CaseError::FileNotFound(_)
        | CaseError::AlreadyExists(_) => 2,
        CaseError::RegistryHttp(_) | CaseError::RegistryStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let app = build_app(&config)?;
    run_command(cli.command, &app, output_mode)
}

fn build_app(config: &ResolvedConfig) -> Result<App<Box<dyn RegistryClient>>, CaseError> {
    let cache = Cache::at(config.cache_dir.clone());
    let registry: Box<dyn RegistryClient> = match &config.registry_url {
        Some(url) => Box::new(HttpRegistry::new(url.clone(), cache.clone())?),
        None => Box::new(NoRegistry),
    };
    Ok(App::new(Resolver::new(
        config.cases_dir.clone(),
        cache,
        registry,
    )))
}

fn run_command<R: RegistryClient>(
    command: Commands,
    app: &App<R>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Text => &TextOutput,
    };

    match command {
        Commands::List(args) => {
            let source = if args.remote {
                ListSource::Remote
            } else if args.cached {
                ListSource::Cached
            } else {
                ListSource::All
            };
            let result = app.list(&ListFilter {
                source,
                collection: args.collection,
                tag: args.tag,
            })?;
            emit(output_mode, &result, || {
                for case in &result.cases {
                    println!("{case}");
                }
            })
        }
        Commands::Collections => {
            let result = app.collections()?;
            emit(output_mode, &result, || {
                for collection in &result.collections {
                    println!("{collection}");
                }
            })
        }
        Commands::Info(args) => {
            let result = app.info(&args.name)?;
            emit(output_mode, &result, || {
                println!("name: {}", result.name);
                println!("dir: {}", result.dir);
                println!("remote: {}", result.is_remote);
                if let Some(collection) = &result.collection {
                    println!("collection: {collection}");
                }
                if let Some(description) = &result.description {
                    println!("description: {description}");
                }
                if !result.tags.is_empty() {
                    println!("tags: {}", result.tags.join(", "));
                }
                if let Some(license) = &result.license {
                    println!("license: {license}");
                }
                if !result.authors.is_empty() {
                    println!("authors: {}", result.authors.join(", "));
                }
                println!("files:");
                for file in &result.files {
                    let mut line = format!("  {} [{}", file.path, file.format);
                    if let Some(version) = &file.format_version {
                        line.push_str(&format!(" v{version}"));
                    }
                    if let Some(variant) = &file.variant {
                        line.push_str(&format!(" variant={variant}"));
                    }
                    if file.default {
                        line.push_str(" default");
                    }
                    line.push(']');
                    println!("{line}");
                }
            })
        }
        Commands::File(args) => {
            let mut request = FileRequest::new(args.format);
            if let Some(version) = args.format_version {
                request = request.version(version);
            }
            if let Some(variant) = args.variant {
                request = request.variant(variant);
            }
            let result = app.file(&args.name, &request, !args.optional)?;
            emit(output_mode, &result, || {
                if let Some(path) = &result.path {
                    println!("{path}");
                }
            })
        }
        Commands::Export(args) => {
            let result = app.export(&args.name, &args.dest, args.overwrite, sink)?;
            emit(output_mode, &result, || {
                println!("{}", result.destination);
            })
        }
        Commands::Download(args) => {
            let result = app.download(&args.name, args.force, sink)?;
            emit(output_mode, &result, || {
                println!("{}", result.dir);
            })
        }
        Commands::ClearCache(args) => {
            let name = match (args.name.as_deref(), args.all) {
                (Some(name), _) => Some(name),
                (None, true) if args.yes => None,
                (None, true) => {
                    return Err(miette::Report::msg(
                        "refusing to clear the whole cache without --yes",
                    ));
                }
                (None, false) => {
                    return Err(miette::Report::msg(
                        "specify a case name or --all (see `pcase clear-cache --help`)",
                    ));
                }
            };
            let result = app.clear_cache(name)?;
            emit(output_mode, &result, || {
                println!("cleared {}", result.cleared);
            })
        }
        Commands::CacheInfo => {
            let result = app.cache_info()?;
            emit(output_mode, &result, || {
                println!("directory: {}", result.directory);
                println!("exists: {}", result.exists);
                println!("cases: {}", result.num_cases);
                println!("size: {} MB", result.total_size_mb);
                for case in &result.cases {
                    println!("  {case}");
                }
            })
        }
        Commands::CreateManifest(args) => {
            let result = app.create_manifest(&args.dir)?;
            emit(output_mode, &result, || {
                println!("{}", result.manifest);
            })
        }
    }
}

fn emit<T: serde::Serialize>(
    output_mode: OutputMode,
    value: &T,
    text: impl FnOnce(),
) -> miette::Result<()> {
    match output_mode {
        OutputMode::Json => JsonOutput::print(value).into_diagnostic(),
        OutputMode::Text => {
            text();
            Ok(())
        }
    }
}
