// src/commands.rs
//! Command handlers for the kiln CLI

use crate::cli::{Cli, ProjectArgs};
use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use clap::CommandFactory;
use clap_complete::Shell;
use kiln::catalog::Catalog;
use kiln::derivation::{
    BuildOutcome, CargoToolchain, CheckPhase, Composition, Derivation, Kiln, KilnConfig,
};
use kiln::environment::StoreLocator;
use kiln::manifest::{Manifest, parse_manifest_file, validate_manifest};
use kiln::platform::{FeatureSet, Platform};
use kiln::shell::provision;
use kiln::source::{RESULT_LINK, SourceTree, filter_source};
use kiln::version::{VersionInfo, compact_timestamp, derive_version, source_timestamp};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Manifest, filtered source and version, before dependency resolution
struct ProjectInputs {
    root: PathBuf,
    manifest: Manifest,
    source: SourceTree,
    version: VersionInfo,
}

/// A fully composed project
struct Project {
    root: PathBuf,
    manifest: Manifest,
    platform: Platform,
    features: FeatureSet,
    catalog: Catalog,
    derivation: Derivation,
}

fn project_root(manifest_path: &Path) -> PathBuf {
    manifest_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn read_manifest(path: &Path) -> Result<Manifest> {
    let manifest = parse_manifest_file(path)
        .with_context(|| format!("Failed to parse manifest: {}", path.display()))?;
    let warnings = validate_manifest(&manifest).with_context(|| "Manifest validation failed")?;
    for warning in &warnings {
        warn!("{}", warning);
    }
    Ok(manifest)
}

fn load_inputs(args: &ProjectArgs) -> Result<ProjectInputs> {
    let root = project_root(&args.manifest);
    let manifest = read_manifest(&args.manifest)?;

    let source = filter_source(&root, &manifest.exclude_rules())
        .with_context(|| format!("Failed to read source tree at {}", root.display()))?;

    // --timestamp, then the manifest, then the newest source file, then now
    let timestamp = args
        .timestamp
        .clone()
        .or_else(|| manifest.build.timestamp.clone())
        .or_else(|| source_timestamp(&source))
        .unwrap_or_else(|| compact_timestamp(Utc::now()));
    debug!("Using build timestamp {}", timestamp);
    let version = derive_version(&timestamp)?;

    Ok(ProjectInputs {
        root,
        manifest,
        source,
        version,
    })
}

fn load_project(args: &ProjectArgs) -> Result<Project> {
    let inputs = load_inputs(args)?;
    let manifest = inputs.manifest;

    let platform = match &args.platform {
        Some(tag) => tag.parse::<Platform>()?,
        None => Platform::host()?,
    };

    let mut features = manifest.features()?;
    features.extend(FeatureSet::parse(&args.features)?.iter());

    let catalog = match manifest.catalog_path(&inputs.root) {
        Some(path) => Catalog::from_file(&path)
            .with_context(|| format!("Failed to load catalog: {}", path.display()))?,
        None => Catalog::builtin(),
    };

    let deps = catalog.resolve(platform, &features)?;

    let derivation = Composition {
        name: manifest.package.name.clone(),
        platform,
        version: inputs.version,
        features: features.clone(),
        source: inputs.source,
        deps,
        lock_file: manifest.lock_path(&inputs.root),
        meta: manifest.meta()?,
        check: manifest.check_phase(),
        binary: Some(manifest.binary().to_string()),
    }
    .compose()?;

    Ok(Project {
        root: inputs.root,
        manifest,
        platform,
        features,
        catalog,
        derivation,
    })
}

fn kiln_config(args: &ProjectArgs, out_dir: Option<&Path>, keep_staging: bool) -> KilnConfig {
    let mut config = match out_dir {
        Some(dir) => KilnConfig::with_out_dir(dir),
        None => KilnConfig::default(),
    };
    if let Some(store) = &args.store {
        config = config.with_store_root(store);
    }
    config.keep_staging(keep_staging)
}

/// Validate the manifest, or compose and run the check phase
pub fn cmd_check(args: &ProjectArgs, validate_only: bool, keep_staging: bool) -> Result<()> {
    if validate_only {
        let manifest = read_manifest(&args.manifest)?;
        println!(
            "[OK] Manifest {} is valid ({})",
            args.manifest.display(),
            manifest.package.name
        );
        return Ok(());
    }

    let project = load_project(args)?;
    let drv = &project.derivation;

    if let CheckPhase::Disabled { reason } = drv.check_phase() {
        println!("Check phase disabled for {}: {}", drv.full_name(), reason);
        return Ok(());
    }

    let kiln = Kiln::new(
        kiln_config(args, None, keep_staging),
        CargoToolchain::locate()?,
    );
    kiln.check(drv)
        .with_context(|| format!("Check phase failed for {}", drv.full_name()))?;

    println!("[OK] Check phase passed for {}", drv.full_name());
    Ok(())
}

/// Build the derivation and link `result` to its output
pub fn cmd_build(
    args: &ProjectArgs,
    out_dir: Option<&Path>,
    jobs: Option<u32>,
    keep_staging: bool,
    no_link: bool,
) -> Result<()> {
    let project = load_project(args)?;
    let drv = &project.derivation;

    let mut config = kiln_config(args, out_dir, keep_staging);
    if let Some(j) = jobs {
        config.jobs = j;
    }

    println!(
        "Building {} for {} {}",
        drv.full_name(),
        project.platform,
        project.features
    );

    let kiln = Kiln::new(config, CargoToolchain::locate()?);
    let outcome = kiln
        .build(drv)
        .with_context(|| format!("Failed to build {}", drv.full_name()))?;

    print_outcome(&outcome);

    if !no_link {
        link_result(&project.root.join(RESULT_LINK), &outcome.out_path)?;
    }

    Ok(())
}

fn print_outcome(outcome: &BuildOutcome) {
    if outcome.from_cache {
        println!("[CACHED] {}", outcome.out_path.display());
    } else {
        println!("[COMPLETE] {}", outcome.out_path.display());
    }
    println!("  Binary: {}", outcome.artifact.display());
    println!("  Plan:   {}", outcome.plan_hash.short(16));
    for (key, value) in outcome.env.iter() {
        println!("  {}={}", key, value);
    }
}

#[cfg(unix)]
fn link_result(link: &Path, target: &Path) -> Result<()> {
    match link.symlink_metadata() {
        Ok(meta) if meta.file_type().is_symlink() => {
            std::fs::remove_file(link)
                .with_context(|| format!("Failed to replace {}", link.display()))?;
        }
        Ok(_) => {
            warn!(
                "{} exists and is not a symlink; leaving it in place",
                link.display()
            );
            return Ok(());
        }
        Err(_) => {}
    }

    std::os::unix::fs::symlink(target, link)
        .with_context(|| format!("Failed to link {}", link.display()))?;
    info!("Linked {} -> {}", link.display(), target.display());
    Ok(())
}

#[cfg(not(unix))]
fn link_result(link: &Path, _target: &Path) -> Result<()> {
    warn!("Result links are not supported here; skipping {}", link.display());
    Ok(())
}

/// Enter the dev shell, or print it as a script
pub fn cmd_dev_shell(args: &ProjectArgs, shell: Option<&Path>, print: bool) -> Result<()> {
    let project = load_project(args)?;

    let mut tools = project
        .catalog
        .dev_tools(project.platform, &project.features)?;
    tools.extend(project.manifest.shell_tools());

    let store = args
        .store
        .clone()
        .unwrap_or_else(|| KilnConfig::default().store_root);
    let locator = StoreLocator::new(&store);
    let env = provision(&project.derivation, &tools, &locator)?;

    if print {
        print!("{}", env.render_script());
        return Ok(());
    }

    let status = env.enter(shell)?;
    if !status.success() {
        return Err(anyhow!("Dev shell exited with {}", status));
    }
    Ok(())
}

/// Print the composed derivation as JSON
pub fn cmd_plan(args: &ProjectArgs, compact: bool) -> Result<()> {
    let project = load_project(args)?;
    let summary = project.derivation.summary();
    let json = if compact {
        serde_json::to_string(&summary)?
    } else {
        serde_json::to_string_pretty(&summary)?
    };
    println!("{}", json);
    Ok(())
}

/// Print the derived version
pub fn cmd_version(args: &ProjectArgs, semver: bool) -> Result<()> {
    let inputs = load_inputs(args)?;
    if semver {
        println!("{}", inputs.version.to_semver()?);
    } else {
        println!("{}", inputs.version);
    }
    Ok(())
}

/// Write completions for `shell` to stdout
pub fn cmd_completions(shell: Shell) -> Result<()> {
    clap_complete::generate(shell, &mut Cli::command(), "kiln", &mut std::io::stdout());
    Ok(())
}
