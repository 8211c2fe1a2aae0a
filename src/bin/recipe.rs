//! Recipe CLI - build, test and package one recipe
//!
//! Usage:
//!   recipe export <recipe>          Copy the recipe's declared sources
//!   recipe configure <recipe>       Export, then resolve and configure
//!   recipe build <recipe>           ... up to build
//!   recipe test <recipe>            ... up to test
//!   recipe package <recipe>         ... up to package
//!   recipe create <recipe>          Full run, publishing the artifact descriptor
//!   recipe describe <install-dir>   Show a published artifact descriptor

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use recipe_forge::core::artifact::DESCRIPTOR_FILE;
use recipe_forge::{output, ArtifactDescriptor, Phase, Recipe, RecipeConfig, RecipeRun, RunLayout};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "recipe")]
#[command(about = "Dependency-aware build recipe executor")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Extra config file layered over the XDG config files
    #[arg(short, long, global = true, env = "RECIPE_CONFIG")]
    config: Option<PathBuf>,

    /// Root for export/build/package folders (default: build/ next to the recipe)
    #[arg(short, long, global = true)]
    workdir: Option<PathBuf>,

    /// Install directory for the package (default: <workdir>/package)
    #[arg(long, global = true)]
    install_dir: Option<PathBuf>,

    /// Echo every command the backend runs
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy declared sources into the export folder
    Export {
        /// Recipe file, or a directory containing recipe.rhai
        recipe: PathBuf,
    },

    /// Run up to and including configure
    Configure { recipe: PathBuf },

    /// Run up to and including build
    Build { recipe: PathBuf },

    /// Run up to and including test
    Test {
        recipe: PathBuf,

        /// Fail the run when the test binary fails
        #[arg(long)]
        strict_tests: bool,
    },

    /// Run up to and including package
    Package {
        recipe: PathBuf,

        #[arg(long)]
        strict_tests: bool,
    },

    /// Run every phase and publish the artifact descriptor
    Create {
        recipe: PathBuf,

        #[arg(long)]
        strict_tests: bool,
    },

    /// Show the descriptor published into an install directory
    Describe {
        #[arg(value_name = "INSTALL_DIR")]
        dir: PathBuf,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    output::set_verbose(cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let opts = RunOptions {
        config: cli.config,
        workdir: cli.workdir,
        install_dir: cli.install_dir,
    };

    match cli.command {
        Commands::Export { recipe } => run_phases(&opts, &recipe, Phase::Export, false),
        Commands::Configure { recipe } => run_phases(&opts, &recipe, Phase::Configure, false),
        Commands::Build { recipe } => run_phases(&opts, &recipe, Phase::Build, false),
        Commands::Test { recipe, strict_tests } => {
            run_phases(&opts, &recipe, Phase::Test, strict_tests)
        }
        Commands::Package { recipe, strict_tests } => {
            run_phases(&opts, &recipe, Phase::Package, strict_tests)
        }
        Commands::Create { recipe, strict_tests } => {
            run_phases(&opts, &recipe, Phase::PublishInfo, strict_tests)
        }
        Commands::Describe { dir, json } => describe(&dir, json),
    }
}

struct RunOptions {
    config: Option<PathBuf>,
    workdir: Option<PathBuf>,
    install_dir: Option<PathBuf>,
}

/// Run a fresh recipe run up to `last` and report it.
fn run_phases(opts: &RunOptions, recipe: &Path, last: Phase, strict_tests: bool) -> Result<i32> {
    let mut config = RecipeConfig::load(opts.config.as_deref())?;
    if strict_tests {
        config.strict_tests = true;
    }

    let recipe_path = resolve_recipe(recipe)?;
    let recipe = match Recipe::load(&recipe_path) {
        Ok(recipe) => recipe,
        Err(e) => {
            output::error(&e.to_string());
            return Ok(e.exit_code());
        }
    };

    let mut layout = RunLayout::for_recipe(&recipe, &config, opts.workdir.as_deref());
    if let Some(ref dir) = opts.install_dir {
        layout.package_dir = dir.clone();
    }
    let mut run = RecipeRun::from_config(recipe, &config, layout);
    let result = run.run_until(last);
    run.report().print();

    Ok(match result {
        Ok(()) => 0,
        Err(e) => e.exit_code(),
    })
}

/// Accept a recipe file or a directory holding `recipe.rhai` or `<dirname>.rhai`.
fn resolve_recipe(path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if path.is_dir() {
        let mut candidates = vec![path.join("recipe.rhai")];
        if let Some(name) = path.file_name() {
            candidates.push(path.join(format!("{}.rhai", name.to_string_lossy())));
        }
        if let Some(found) = candidates.into_iter().find(|p| p.is_file()) {
            return Ok(found);
        }
        anyhow::bail!("No recipe.rhai found in {}", path.display());
    }
    anyhow::bail!("Recipe file not found: {}", path.display())
}

fn describe(install_dir: &Path, json: bool) -> Result<i32> {
    use owo_colors::OwoColorize;

    let path = install_dir.join(DESCRIPTOR_FILE);
    let descriptor = ArtifactDescriptor::read_from(&path)?;

    if json {
        let text = serde_json::to_string_pretty(&descriptor)
            .context("Failed to serialize artifact descriptor")?;
        println!("{}", text);
        return Ok(0);
    }

    println!("{:<12} {}", "Name:".bold(), descriptor.name.bold().cyan());
    println!("{:<12} {}", "Version:".bold(), descriptor.version.green());
    println!("{:<12} {}", "Type:".bold(), descriptor.package_type);
    if !descriptor.libs.is_empty() {
        println!("{:<12} {}", "Libs:".bold(), descriptor.libs.join(", "));
    }
    if !descriptor.bins.is_empty() {
        println!("{:<12} {}", "Bins:".bold(), descriptor.bins.join(", "));
    }
    println!("{:<12} {}", "Includes:".bold(), join_paths(&descriptor.include_paths()));
    println!("{:<12} {}", "Lib dirs:".bold(), join_paths(&descriptor.lib_paths()));
    println!(
        "{:<12} {}",
        "Root:".bold(),
        descriptor.root.display().to_string().dimmed()
    );
    Ok(0)
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
