use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "folio", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a scene JSON to a PDF document.
    Render(RenderArgs),
    /// Compile a scene and dump its paint-operation stream.
    Ops(OpsArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PDF path.
    #[arg(long)]
    out: PathBuf,

    /// Per-request timeout for remote assets, in seconds.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// What to do when an image/svg asset cannot be fetched.
    #[arg(long, value_enum, default_value_t = FetchFailureChoice::Abort)]
    on_fetch_error: FetchFailureChoice,

    /// Override the font-catalog CSS endpoint.
    #[arg(long)]
    font_catalog: Option<String>,
}

#[derive(Parser, Debug)]
struct OpsArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Print only the SHA-256 fingerprint of the op stream.
    #[arg(long)]
    fingerprint: bool,

    /// Per-request timeout for remote assets, in seconds.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FetchFailureChoice {
    Abort,
    Placeholder,
}

impl From<FetchFailureChoice> for folio::FetchFailurePolicy {
    fn from(choice: FetchFailureChoice) -> Self {
        match choice {
            FetchFailureChoice::Abort => folio::FetchFailurePolicy::Abort,
            FetchFailureChoice::Placeholder => folio::FetchFailurePolicy::Placeholder,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Ops(args) => cmd_ops(args),
    }
}

fn read_scene_json(path: &Path) -> anyhow::Result<folio::Scene> {
    let f = File::open(path).with_context(|| format!("open scene '{}'", path.display()))?;
    let r = BufReader::new(f);
    let scene: folio::Scene = serde_json::from_reader(r).with_context(|| "parse scene JSON")?;
    Ok(scene)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let scene = read_scene_json(&args.in_path)?;
    scene.validate()?;

    let mut options = folio::RenderOptions {
        fetch_timeout: Duration::from_secs(args.timeout_secs),
        catalog_base_url: args.font_catalog,
        ..Default::default()
    };
    options.config.fetch_failure = args.on_fetch_error.into();

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    folio::render_to_pdf(&scene, &args.out, &options)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_ops(args: OpsArgs) -> anyhow::Result<()> {
    let scene = read_scene_json(&args.in_path)?;
    scene.validate()?;

    let fetcher = folio::HttpFetcher::new(Duration::from_secs(args.timeout_secs));
    let catalog = folio::RemoteFontCatalog::default();
    let ops = folio::compile_to_ops(
        &scene,
        &fetcher,
        &catalog,
        folio::CompileConfig::default(),
    )?;

    if args.fingerprint {
        println!("{}", folio::fingerprint_ops(&ops));
    } else {
        println!("{}", serde_json::to_string_pretty(&ops)?);
    }
    Ok(())
}
