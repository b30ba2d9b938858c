//! brmaps CLI - static maps of Brazilian administrative boundaries

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::info;
use std::path::{Path, PathBuf};

use brmaps::collect::global_variables::{OUTPUT_PATH, SHARED_PATH};
use brmaps::collect::paths::keys;
use brmaps::maps::{output_file_name, run_state_report};
use brmaps::render::style::ColorMap;
use brmaps::{
    Capabilities, MapDriver, MapKind, MapOutcome, MapRequest, PathBundle, RegionType,
    RenderConfig, StateCode,
};

#[derive(Parser)]
#[command(
    name = "brmaps",
    version,
    about = "Render maps of Brazilian states, municipalities and regions"
)]
struct Cli {
    /// Render settings (JSON); defaults apply to absent keys
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the fetched datasets and receiving the maps
    #[arg(long, global = true, default_value = OUTPUT_PATH)]
    output_dir: PathBuf,

    /// Directory holding the South America base layer
    #[arg(long, global = true, default_value = SHARED_PATH)]
    shared_dir: PathBuf,

    /// JSON object of logical name -> path, overriding the default layout
    #[arg(long, global = true)]
    paths: Option<PathBuf>,

    /// Output image, instead of the default name in the output directory
    #[arg(long, short = 'o', global = true)]
    output: Option<PathBuf>,

    /// Colour map for single choropleth maps (viridis, plasma)
    #[arg(long, global = true, value_parser = parse_cmap)]
    cmap: Option<ColorMap>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Brazil with one state highlighted
    Highlight { state: String },
    /// Municipalities of one state
    Zoom { state: String },
    /// Municipalities of one state coloured by a column
    MunicipalChoropleth { state: String, column: String },
    /// Every state coloured by a column
    StateChoropleth { column: String },
    /// Immediate and intermediate regions of one state
    Regional { state: String },
    /// One kind of region clipped to a state
    ClippedRegion {
        state: String,
        #[arg(long, value_enum)]
        region: RegionArg,
    },
    /// Highlight, zoom and municipality choropleth for one state
    Report {
        state: String,
        #[arg(long, default_value = "population")]
        column: String,
    },
    /// List every dataset path and whether it exists
    CheckPaths { state: Option<String> },
}

#[derive(Clone, Copy, ValueEnum)]
enum RegionArg {
    Immediate,
    Intermediate,
}

impl From<RegionArg> for RegionType {
    fn from(arg: RegionArg) -> Self {
        match arg {
            RegionArg::Immediate => RegionType::Immediate,
            RegionArg::Intermediate => RegionType::Intermediate,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    info!("brmaps v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => RenderConfig::from_json_file(path)?,
        None => RenderConfig::default(),
    };

    match &cli.command {
        Commands::CheckPaths { state } => check_paths(&cli, state.as_deref()),
        Commands::Report { state, column } => {
            let state = StateCode::parse(state)?;
            let inputs = input_bundle(&cli, Some(&state))?;
            let capabilities = Capabilities::detect(&config);
            let driver = MapDriver::new(&config, &capabilities);
            let entries = run_state_report(&driver, &state, column, &inputs, &cli.output_dir);
            let mut failed = 0;
            for entry in &entries {
                match &entry.result {
                    Ok(outcome) => print_outcome(outcome),
                    Err(e) => {
                        failed += 1;
                        println!("FAILED {}: {}", entry.kind, e);
                    }
                }
            }
            if failed > 0 {
                bail!("{} of {} maps failed", failed, entries.len());
            }
            Ok(())
        }
        command => {
            let request = build_request(&cli, command)?;
            let capabilities = Capabilities::detect(&config);
            let driver = MapDriver::new(&config, &capabilities);
            let outcome = driver.run(&request)?;
            print_outcome(&outcome);
            Ok(())
        }
    }
}

/// Default layout for `state`, overlaid with the `--paths` file
fn input_bundle(cli: &Cli, state: Option<&StateCode>) -> anyhow::Result<PathBundle> {
    let mut bundle = PathBundle::standard(
        &cli.output_dir,
        &cli.shared_dir,
        state.map(StateCode::as_str),
    );
    if let Some(path) = &cli.paths {
        bundle.merge(PathBundle::from_json_file(path)?);
    }
    Ok(bundle)
}

fn build_request(cli: &Cli, command: &Commands) -> anyhow::Result<MapRequest> {
    let (kind, state, column) = match command {
        Commands::Highlight { state } => (MapKind::Highlight, Some(state), None),
        Commands::Zoom { state } => (MapKind::Zoom, Some(state), None),
        Commands::MunicipalChoropleth { state, column } => {
            (MapKind::MunicipalityChoropleth, Some(state), Some(column))
        }
        Commands::StateChoropleth { column } => (MapKind::StateChoropleth, None, Some(column)),
        Commands::Regional { state } => (MapKind::RegionalDivision, Some(state), None),
        Commands::ClippedRegion { state, region } => {
            (MapKind::ClippedRegion((*region).into()), Some(state), None)
        }
        Commands::Report { .. } | Commands::CheckPaths { .. } => {
            bail!("not a single-map command")
        }
    };
    let state = state.map(|s| StateCode::parse(s)).transpose()?;
    let mut paths = input_bundle(cli, state.as_ref())?;

    let output = match &cli.output {
        Some(path) => path.clone(),
        None => match paths.get(keys::SAIDA) {
            Some(path) => path.to_path_buf(),
            None => cli.output_dir.join(output_file_name(
                kind,
                state.as_ref(),
                column.map(String::as_str),
            )?),
        },
    };
    paths.insert(keys::SAIDA, output);

    let mut request = MapRequest::new(kind, paths);
    if let Some(state) = state {
        request = request.with_state(state);
    }
    if let Some(column) = column {
        request = request.with_column(column);
    }
    if let Some(cmap) = cli.cmap {
        request = request.with_cmap(cmap);
    }
    Ok(request)
}

fn parse_cmap(name: &str) -> Result<ColorMap, String> {
    ColorMap::from_name(name).ok_or_else(|| format!("unknown colour map '{}'", name))
}

fn check_paths(cli: &Cli, state: Option<&str>) -> anyhow::Result<()> {
    let state = state.map(StateCode::parse).transpose()?;
    let bundle = input_bundle(cli, state.as_ref())?;
    let mut missing = 0;
    for status in bundle.diagnose() {
        let mark = if status.exists { "ok" } else { "MISSING" };
        if !status.exists {
            missing += 1;
        }
        println!("{:<8} {:<15} {}", mark, status.key, status.path.display());
    }
    if state.is_none() {
        println!("(pass a state code to check its municipality file)");
    }
    if missing > 0 {
        info!("{} dataset(s) missing", missing);
    }
    check_dir(&cli.output_dir).context("output directory check failed")?;
    Ok(())
}

fn check_dir(dir: &Path) -> anyhow::Result<()> {
    if dir.exists() && !dir.is_dir() {
        bail!("{} exists but is not a directory", dir.display());
    }
    Ok(())
}

fn print_outcome(outcome: &MapOutcome) {
    println!(
        "{} -> {} ({}x{} px)",
        outcome.title,
        outcome.output.display(),
        outcome.size_px.0,
        outcome.size_px.1
    );
    for layer in &outcome.layers {
        println!("  z={:<2} {:<16} {} feature(s)", layer.z, layer.name, layer.features);
    }
    if !outcome.legend.is_empty() {
        println!("  legend: {}", outcome.legend.join(", "));
    }
    if outcome.fallback_used {
        println!("  municipality coverage unavailable, neutral background used");
    }
}
