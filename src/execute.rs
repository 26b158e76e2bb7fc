use std::path::Path;
use anyhow::{Context, Result};
use clap::CommandFactory;
use colored::Colorize;
use brewlet::fetch::{Fetcher, UrlFetcher};
use brewlet::global::cache::{cached_archive_path, clean_cache};
use brewlet::global::config::Config;
use brewlet::installer::{
    fetch_verified, find_installed_paths, install, installed_packages, is_installed,
    remove_stale_staging, uninstall, InstallOptions,
};
use brewlet::formula::Formula;
use brewlet::util::{sha256_file, sha256_hex};
use crate::cli::{BrewletCommand, CLI};

pub fn execute(cli: CLI) -> Result<()> {
    let config = Config::load()?;
    if cli.prefix {
        println!("{}", config.prefix()?.root().display());
        return Ok(());
    }
    let Some(command) = cli.command else {
        CLI::command().print_help()?;
        return Ok(());
    };
    match command {
        BrewletCommand::Install { formula } => {
            execute_install(&config, &formula)
        }
        BrewletCommand::Uninstall { name } => {
            execute_uninstall(&config, &name)
        }
        BrewletCommand::List => {
            execute_list(&config)
        }
        BrewletCommand::Info { formula } => {
            execute_info(&config, &formula)
        }
        BrewletCommand::Which { name } => {
            execute_which(&config, &name)
        }
        BrewletCommand::Fetch { formula } => {
            execute_fetch(&config, &formula)
        }
        BrewletCommand::Sha256 { source } => {
            execute_sha256(&source)
        }
        BrewletCommand::Bump { formula, version, url } => {
            execute_bump(&formula, &version, &url)
        }
        BrewletCommand::Cleanup => {
            execute_cleanup(&config)
        }
    }
}

fn heading(text: impl AsRef<str>) {
    println!("{} {}", "==>".blue().bold(), text.as_ref().bold());
}

fn install_options(config: &Config) -> Result<InstallOptions> {
    Ok(InstallOptions {
        prefix_command: config.prefix_command(),
        cache_dir: Some(config.cache_dir()?),
    })
}

fn resolve_formula(config: &Config, query: &str) -> Result<Formula> {
    Ok(Formula::resolve(query, &config.formula_dir()?)?)
}

pub fn execute_install(config: &Config, query: &str) -> Result<()> {
    let formula = resolve_formula(config, query)?;
    let prefix = config.prefix()?;
    heading(format!("Installing {} {}", formula.name(), formula.version()));
    println!("Fetching {}", formula.source().url);
    let installed = install(&formula, &prefix, &install_options(config)?)
        .with_context(|| format!("Installation of {} failed", formula.name()))?;
    println!("{} {}", "Installed to".green(), installed.libexec.display());
    println!("{} {}", "Shim".green(), installed.shim.display());
    if !is_directory_in_path(&prefix.bin_dir()) {
        println!(
            "{} {} is not in your PATH. Add it with:\n  export PATH=\"{}:$PATH\"",
            "Warning:".yellow().bold(),
            prefix.bin_dir().display(),
            prefix.bin_dir().display()
        );
    }
    Ok(())
}

pub fn execute_uninstall(config: &Config, name: &str) -> Result<()> {
    println!("Uninstalling {}", name);
    uninstall(name, &config.prefix()?)?;
    println!("Done");
    Ok(())
}

pub fn execute_list(config: &Config) -> Result<()> {
    let receipts = installed_packages(&config.prefix()?)?;
    if receipts.is_empty() {
        println!("No packages installed");
        return Ok(());
    }
    for receipt in receipts {
        println!("{} {}", receipt.name.bold(), receipt.version);
    }
    Ok(())
}

pub fn execute_info(config: &Config, query: &str) -> Result<()> {
    let formula = resolve_formula(config, query)?;
    let prefix = config.prefix()?;
    let source = formula.source();
    heading(format!("{}: {}", formula.name(), formula.version()));
    println!("{}", formula.desc());
    println!("{}", formula.homepage());
    println!("  license: {}", formula.license());
    println!("  url: {}", source.url);
    println!("  sha256: {}", source.sha256);
    let platforms: Vec<&str> = formula.platforms().collect();
    if !platforms.is_empty() {
        println!("  platform overrides: {}", platforms.join(", "));
    }
    if is_installed(formula.name(), &prefix) {
        println!("  {} ({})", "installed".green(), prefix.package_dir(formula.name()).display());
    } else {
        println!("  not installed");
    }
    Ok(())
}

pub fn execute_which(config: &Config, name: &str) -> Result<()> {
    let (exe_path, shim_path) = find_installed_paths(name, &config.prefix()?);
    if exe_path.is_none() && shim_path.is_none() {
        println!("No installed paths found");
        return Ok(());
    }
    if let Some(exe_path) = exe_path {
        println!("Found executable at: {}", exe_path.display());
    }
    if let Some(shim_path) = shim_path {
        println!("Found shim at: {}", shim_path.display());
    }
    Ok(())
}

pub fn execute_fetch(config: &Config, query: &str) -> Result<()> {
    let formula = resolve_formula(config, query)?;
    let source = formula.source();
    heading(format!("Fetching {}", source.url));
    let options = install_options(config)?;
    fetch_verified(&formula, &options)?;
    let cached = cached_archive_path(&config.cache_dir()?, &source.url, &source.sha256)?;
    if cached.is_file() {
        println!("{} {}", "Verified".green(), cached.display());
    } else {
        println!(
            "{} {} ({})",
            "Verified".green(),
            source.url,
            "not cached".yellow()
        );
    }
    Ok(())
}

pub fn execute_sha256(source: &str) -> Result<()> {
    let digest = if source.contains("://") {
        let bytes = UrlFetcher
            .fetch(source)
            .with_context(|| format!("Could not fetch {source}"))?;
        sha256_hex(&bytes)
    } else {
        sha256_file(Path::new(source)).with_context(|| format!("Could not read {source}"))?
    };
    println!("{digest}");
    Ok(())
}

pub fn execute_bump(path: &str, version: &str, url: &str) -> Result<()> {
    let formula = Formula::load(path)?;
    heading(format!("Fetching {url}"));
    let bytes = UrlFetcher
        .fetch(url)
        .with_context(|| format!("Could not fetch {url}"))?;
    let bumped = formula.with_release(version, url, &sha256_hex(&bytes))?;
    bumped.save(path)?;
    println!(
        "{} {} {} -> {}",
        "Bumped".green(),
        bumped.name(),
        formula.version(),
        bumped.version()
    );
    Ok(())
}

pub fn execute_cleanup(config: &Config) -> Result<()> {
    let removed = clean_cache(&config.cache_dir()?)?;
    println!("Removed {removed} cached archive(s)");
    let staging = remove_stale_staging(&config.prefix()?, None)?;
    if staging > 0 {
        println!("Removed {staging} stale staging directory(ies)");
    }
    Ok(())
}

fn is_directory_in_path(dir: &Path) -> bool {
    std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).any(|p| p == dir))
        .unwrap_or(false)
}
