// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use fontsync::{
    catalog::CatalogEntry,
    config::Settings,
    fetch::{EnvCredentials, GithubRaw, StagedFetcher},
    install::{self, DirectoryInstaller, Installer},
    installed::InstalledSet,
    path::default_config_file,
    registry::{SourceRegistry, DEFAULT_DESCRIPTOR},
    store::{CatalogStore, Refreshed},
    SourceRecord,
};

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Confirm, Select};
use std::{path::PathBuf, process::exit, time::Duration};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  fontsync [options] <fontsync-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to settings file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let path = match self.config {
            Some(path) => path,
            None => default_config_file()?,
        };
        let settings = Settings::load(path)?;

        match self.command {
            Command::Add(opts) => run_add(settings, opts),
            Command::Remove(opts) => run_remove(settings, opts),
            Command::Sources => run_sources(settings),
            Command::Enable(opts) => run_toggle(settings, opts, true),
            Command::Disable(opts) => run_toggle(settings, opts, false),
            Command::Refresh => run_refresh(settings).await,
            Command::Search(opts) => run_search(settings, opts),
            Command::Show(opts) => run_show(settings, opts),
            Command::Install(opts) => blocking(move || run_install(settings, opts)).await,
            Command::Uninstall(opts) => run_uninstall(settings, opts),
            Command::Forget(opts) => run_forget(settings, opts),
            Command::Installed => run_installed(settings),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Register new font source.
    #[command(override_usage = "fontsync add [options] <owner> <repo>")]
    Add(AddOptions),

    /// Remove font source from registry.
    #[command(override_usage = "fontsync remove [options] <source_key>")]
    Remove(RemoveOptions),

    /// List registered font sources.
    #[command(override_usage = "fontsync sources")]
    Sources,

    /// Include font source in future refreshes.
    #[command(override_usage = "fontsync enable <source_key>")]
    Enable(KeyOptions),

    /// Exclude font source from future refreshes.
    #[command(override_usage = "fontsync disable <source_key>")]
    Disable(KeyOptions),

    /// Rebuild catalog from every enabled source.
    #[command(override_usage = "fontsync refresh")]
    Refresh,

    /// Search catalog by font name or family.
    #[command(override_usage = "fontsync search [query]")]
    Search(SearchOptions),

    /// Show catalog entry in detail.
    #[command(override_usage = "fontsync show <font_id>")]
    Show(ShowOptions),

    /// Download and install catalog font.
    #[command(override_usage = "fontsync install [options] <font_id>")]
    Install(InstallOptions),

    /// Uninstall fonts by ledger key.
    #[command(override_usage = "fontsync uninstall <key>...")]
    Uninstall(UninstallOptions),

    /// Forget fonts that were removed by hand.
    #[command(override_usage = "fontsync forget <filename>...")]
    Forget(ForgetOptions),

    /// List installed fonts.
    #[command(override_usage = "fontsync installed")]
    Installed,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AddOptions {
    /// Owner of remote repository.
    #[arg(required = true, value_name = "owner")]
    pub owner: String,

    /// Name of remote repository.
    #[arg(required = true, value_name = "repo")]
    pub repo: String,

    /// Path to descriptor document inside remote repository.
    #[arg(short, long, value_name = "path", default_value = DEFAULT_DESCRIPTOR)]
    pub descriptor: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RemoveOptions {
    /// Key of source to remove, e.g., "owner/repo".
    #[arg(required = true, value_name = "source_key")]
    pub key: String,

    /// Do not ask for confirmation.
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct KeyOptions {
    /// Key of target source, e.g., "owner/repo".
    #[arg(required = true, value_name = "source_key")]
    pub key: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SearchOptions {
    /// Text to look for in font names and families.
    #[arg(value_name = "query", default_value = "")]
    pub query: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ShowOptions {
    /// Identity of catalog font.
    #[arg(required = true, value_name = "font_id")]
    pub font: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InstallOptions {
    /// Identity of catalog font.
    #[arg(required = true, value_name = "font_id")]
    pub font: String,

    /// Source to install from when several offer the font.
    #[arg(short, long, value_name = "source_key")]
    pub source: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct UninstallOptions {
    /// Ledger keys of fonts to uninstall.
    #[arg(required = true, value_name = "key")]
    pub keys: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ForgetOptions {
    /// File names to drop from the ledger.
    #[arg(required = true, value_name = "filename")]
    pub filenames: Vec<String>,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

/// Run job that touches the blocking HTTP client off the async runtime.
async fn blocking<T>(job: impl FnOnce() -> Result<T> + Send + 'static) -> Result<T>
where
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job).await?
}

fn run_add(settings: Settings, opts: AddOptions) -> Result<()> {
    let mut registry = SourceRegistry::open(settings.sources_file());
    let source = registry.add(opts.owner, opts.repo, opts.descriptor)?;
    info!("run `fontsync refresh` to pull the descriptor of {}", source.key);

    Ok(())
}

fn run_remove(settings: Settings, opts: RemoveOptions) -> Result<()> {
    let mut registry = SourceRegistry::open(settings.sources_file());
    if registry.get(&opts.key).is_none() {
        warn!("source {} is not registered", opts.key);
        return Ok(());
    }

    if !opts.yes
        && !Confirm::new(&format!("remove source {}?", opts.key))
            .with_default(false)
            .prompt()?
    {
        return Ok(());
    }

    registry.remove(&opts.key)?;

    Ok(())
}

fn run_sources(settings: Settings) -> Result<()> {
    let registry = SourceRegistry::open(settings.sources_file());
    for source in registry.list() {
        let state = if source.enabled { "enabled" } else { "disabled" };
        println!("{:<40} [{}] {state}", source.key, source.descriptor);
    }

    Ok(())
}

fn run_toggle(settings: Settings, opts: KeyOptions, enabled: bool) -> Result<()> {
    let mut registry = SourceRegistry::open(settings.sources_file());
    registry.set_enabled(&opts.key, enabled)?;

    Ok(())
}

async fn run_refresh(settings: Settings) -> Result<()> {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template(
        "{elapsed_precise:.green}  {spinner:.yellow} {msg}",
    )?);
    bar.set_message("refreshing catalog");
    bar.enable_steady_tick(Duration::from_millis(100));

    let refreshed = blocking(move || -> Result<Refreshed> {
        let registry = SourceRegistry::open(settings.sources_file());
        let store = CatalogStore::open(settings.catalog_file());
        let github = GithubRaw::new(&settings, EnvCredentials::new(&settings.token_var))?;
        let fetcher = StagedFetcher::new(github, settings.staging_dir());
        Ok(store.refresh(&registry, &fetcher)?)
    })
    .await;
    bar.finish_and_clear();
    let refreshed = refreshed?;

    for failure in &refreshed.failures {
        warn!(
            "{} skipped ({} failure): {}",
            failure.key,
            failure.error.kind(),
            failure.error
        );
    }
    info!(
        "catalog holds {} fonts from {} sources",
        refreshed.catalog.len(),
        refreshed.merged
    );

    Ok(())
}

fn run_search(settings: Settings, opts: SearchOptions) -> Result<()> {
    let store = CatalogStore::open(settings.catalog_file());
    let catalog = store.get();
    if catalog.is_empty() {
        warn!("catalog is empty, run `fontsync refresh` first");
        return Ok(());
    }

    for (id, entry) in catalog.search(&opts.query) {
        println!(
            "{id:<40} {:<28} {:<12} {} source(s)",
            entry.meta.family.as_deref().unwrap_or_default(),
            entry.meta.style.as_deref().unwrap_or_default(),
            entry.sources.len()
        );
    }

    Ok(())
}

fn run_show(settings: Settings, opts: ShowOptions) -> Result<()> {
    let store = CatalogStore::open(settings.catalog_file());
    let catalog = store.get();
    let entry = lookup(&catalog, &opts.font)?;
    let meta = &entry.meta;
    let field = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".into());

    println!("id:      {}", meta.id);
    println!("name:    {}", field(&meta.name));
    println!("family:  {}", field(&meta.family));
    println!("style:   {}", field(&meta.style));
    println!("version: {}", field(&meta.version));
    println!("license: {}", field(&meta.license));
    for record in &entry.sources {
        println!("source:  {} [{}]", record.repo_key, record.descriptor);
        for file in &record.files {
            println!("         {file}");
        }
    }

    Ok(())
}

fn run_install(settings: Settings, opts: InstallOptions) -> Result<()> {
    let store = CatalogStore::open(settings.catalog_file());
    let catalog = store.get();
    let entry = lookup(&catalog, &opts.font)?;
    let source = match (entry.choose_source(opts.source.as_deref()), &opts.source) {
        (Some(source), _) => source.clone(),
        (None, Some(key)) => bail!("source {key} does not offer {}", opts.font),
        (None, None) => prompt_source(entry)?,
    };

    let github = GithubRaw::new(&settings, EnvCredentials::new(&settings.token_var))?;
    let installer = Installer::new(
        github,
        DirectoryInstaller::new(&settings.fonts_dir),
        settings.staging_dir(),
    );
    let mut ledger = InstalledSet::open(settings.installed_file());

    let bar = ProgressBar::new(source.files.len() as u64);
    bar.set_style(
        ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco."),
    );
    let report = installer.install_entry(entry, &source, &mut ledger, |progress| {
        bar.set_position(progress.index as u64 - 1);
        bar.set_message(progress.file.to_string());
    });
    bar.finish_and_clear();
    let report = report?;

    for failure in &report.failed {
        warn!("{} not installed: {}", failure.file, failure.error);
    }
    info!(
        "installed {} of {} files of {}",
        report.installed.len(),
        source.files.len(),
        entry.display_name()
    );

    Ok(())
}

fn run_uninstall(settings: Settings, opts: UninstallOptions) -> Result<()> {
    let installer = DirectoryInstaller::new(&settings.fonts_dir);
    let mut ledger = InstalledSet::open(settings.installed_file());
    for key in opts.keys {
        let record = install::uninstall(&installer, &key, &mut ledger)?;
        info!("uninstalled {key} ({})", record.filename);
    }

    Ok(())
}

fn run_forget(settings: Settings, opts: ForgetOptions) -> Result<()> {
    let mut ledger = InstalledSet::open(settings.installed_file());
    let forgotten = ledger.forget_filenames(&opts.filenames)?;
    if forgotten.is_empty() {
        warn!("no installed font uses any of those file names");
    }
    for key in forgotten {
        info!("forgot {key}");
    }

    Ok(())
}

fn run_installed(settings: Settings) -> Result<()> {
    let ledger = InstalledSet::open(settings.installed_file());
    for (key, record) in ledger.list() {
        println!("{key:<40} {:<40} [{}]", record.filename, record.source);
    }

    Ok(())
}

fn lookup<'a>(catalog: &'a fontsync::Catalog, font: &str) -> Result<&'a CatalogEntry> {
    catalog
        .get(font)
        .ok_or_else(|| anyhow!("font {font} is not in the catalog, try `fontsync search`"))
}

fn prompt_source(entry: &CatalogEntry) -> Result<SourceRecord> {
    let options = entry
        .sources
        .iter()
        .map(|record| format!("{}  -> files: {}", record.repo_key, record.files.join(", ")))
        .collect::<Vec<_>>();
    let choice = Select::new("several sources offer this font, pick one", options).raw_prompt()?;

    Ok(entry.sources[choice.index].clone())
}
