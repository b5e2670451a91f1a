//! Defines relink's CLI through clap types.

mod auto_sync;
mod bind;
mod changed;
mod show;
mod sync;

use std::{
    borrow::Cow,
    env,
    io::{self, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use clap::Parser;
use termcolor::{BufferWriter, Color, ColorSpec, WriteColor};
use thiserror::Error;

use crate::{
    settings::SyncSettings,
    store::{AssetHandle, FsAssets},
    sync_controller::{SyncController, SyncOutcome, SyncReport},
};

pub use self::auto_sync::{AutoSyncCommand, Toggle};
pub use self::bind::BindCommand;
pub use self::changed::ChangedCommand;
pub use self::show::ShowCommand;
pub use self::sync::SyncCommand;

/// Command line options that relink accepts, defined using the clap crate.
#[derive(Debug, Parser)]
#[clap(name = "relink", version, about, author)]
pub struct Options {
    #[clap(flatten)]
    pub global: GlobalOptions,

    /// Subcommand to run in this invocation.
    #[clap(subcommand)]
    pub subcommand: Subcommand,
}

impl Options {
    pub fn run(self) -> anyhow::Result<()> {
        match self.subcommand {
            Subcommand::Sync(subcommand) => subcommand.run(self.global),
            Subcommand::Bind(subcommand) => subcommand.run(self.global),
            Subcommand::AutoSync(subcommand) => subcommand.run(self.global),
            Subcommand::Changed(subcommand) => subcommand.run(self.global),
            Subcommand::Show(subcommand) => subcommand.run(self.global),
        }
    }
}

#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Sets verbosity level. Can be specified multiple times.
    #[clap(long("verbose"), short, global(true), parse(from_occurrences))]
    pub verbosity: u8,

    /// Set color behavior. Valid values are auto, always, and never.
    #[clap(long("color"), global(true), default_value("auto"))]
    pub color: ColorChoice,

    /// Directory holding external assets and replicas as .model.json files,
    /// and optionally a relink.json. Defaults to the current directory.
    #[clap(long("assets"), global(true), default_value(""))]
    pub assets: PathBuf,
}

impl GlobalOptions {
    /// Builds a controller that reads external assets from, and stores
    /// replicas in, the assets directory.
    pub fn controller(&self) -> anyhow::Result<SyncController<FsAssets, FsAssets>> {
        let assets_dir = resolve_path(&self.assets).into_owned();
        let settings = SyncSettings::load_fuzzy(&assets_dir)?;

        log::debug!("Using assets in {}", assets_dir.display());

        let assets = FsAssets::new(assets_dir);
        Ok(SyncController::new(assets.clone(), assets, settings))
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl FromStr for ColorChoice {
    type Err = ColorChoiceParseError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        match source {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(ColorChoiceParseError {
                attempted: source.to_owned(),
            }),
        }
    }
}

impl From<ColorChoice> for termcolor::ColorChoice {
    fn from(value: ColorChoice) -> Self {
        match value {
            ColorChoice::Auto => termcolor::ColorChoice::Auto,
            ColorChoice::Always => termcolor::ColorChoice::Always,
            ColorChoice::Never => termcolor::ColorChoice::Never,
        }
    }
}

impl From<ColorChoice> for env_logger::WriteStyle {
    fn from(value: ColorChoice) -> Self {
        match value {
            ColorChoice::Auto => env_logger::WriteStyle::Auto,
            ColorChoice::Always => env_logger::WriteStyle::Always,
            ColorChoice::Never => env_logger::WriteStyle::Never,
        }
    }
}

#[derive(Debug, Error)]
#[error("Invalid color choice '{attempted}'. Valid values are: auto, always, never")]
pub struct ColorChoiceParseError {
    attempted: String,
}

#[derive(Debug, Parser)]
pub enum Subcommand {
    Sync(SyncCommand),
    Bind(BindCommand),
    AutoSync(AutoSyncCommand),
    Changed(ChangedCommand),
    Show(ShowCommand),
}

pub(super) fn resolve_path(path: &Path) -> Cow<'_, Path> {
    if path.is_absolute() {
        return Cow::Borrowed(path);
    }

    match env::current_dir() {
        Ok(current_dir) => Cow::Owned(current_dir.join(path)),
        Err(_) => Cow::Borrowed(path),
    }
}

/// Prints `<handle>: <message>` with the handle highlighted, red on failure.
pub(super) fn show_result(
    color: ColorChoice,
    handle: &AssetHandle,
    message: &str,
    failed: bool,
) -> io::Result<()> {
    let writer = BufferWriter::stdout(color.into());
    let mut buffer = writer.buffer();

    let highlight = if failed { Color::Red } else { Color::Green };
    buffer.set_color(ColorSpec::new().set_fg(Some(highlight)).set_bold(true))?;
    write!(&mut buffer, "{}", handle)?;

    buffer.set_color(&ColorSpec::new())?;
    writeln!(&mut buffer, ": {}", message)?;

    writer.print(&buffer)
}

/// One line describing what a cycle did.
pub(super) fn describe_outcome(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Unlinked => "not bound to an external asset".to_owned(),
        SyncOutcome::Bound => "bound, replica left as it was".to_owned(),
        SyncOutcome::PendingManual => "auto-sync is off, run `relink sync` to update".to_owned(),
        SyncOutcome::Synced(report) => describe_report(report),
    }
}

pub(super) fn describe_report(report: &SyncReport) -> String {
    if !report.changed() {
        return "already up to date".to_owned();
    }

    let patch_set = &report.patch_set;
    format!(
        "{} created, {} destroyed, {} renamed, {} moved, {} facets removed, {} facets updated",
        patch_set.created_nodes.len(),
        patch_set.destroyed_nodes.len(),
        patch_set.renamed_nodes.len(),
        patch_set.reparented_nodes.len(),
        patch_set.removed_facets.len(),
        patch_set.updated_facets.len(),
    )
}
