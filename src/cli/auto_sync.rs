use std::str::FromStr;

use anyhow::Context;
use clap::Parser;
use thiserror::Error;

use crate::store::AssetHandle;

use super::{describe_report, show_result, GlobalOptions};

/// Turns automatic syncing on or off for one replica.
#[derive(Debug, Parser)]
pub struct AutoSyncCommand {
    /// Handle of the replica.
    pub replica: String,

    /// Either on or off.
    pub state: Toggle,
}

impl AutoSyncCommand {
    pub fn run(self, global: GlobalOptions) -> anyhow::Result<()> {
        let mut controller = global.controller()?;
        let replica = AssetHandle::new(self.replica);
        let enabled = matches!(self.state, Toggle::On);

        let report = controller
            .set_auto_sync(&replica, enabled)
            .with_context(|| format!("Could not change auto-sync for {}", replica))?;

        let message = match report {
            Some(report) => format!("auto-sync on, synced: {}", describe_report(&report)),
            None => format!("auto-sync {}", if enabled { "on" } else { "off" }),
        };
        show_result(global.color, &replica, &message, false)?;

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

impl FromStr for Toggle {
    type Err = ToggleParseError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        match source {
            "on" => Ok(Toggle::On),
            "off" => Ok(Toggle::Off),
            _ => Err(ToggleParseError {
                attempted: source.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Error)]
#[error("Invalid state '{attempted}'. Valid values are: on, off")]
pub struct ToggleParseError {
    attempted: String,
}
