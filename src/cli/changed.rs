use anyhow::bail;
use clap::Parser;

use crate::{error::ErrorDisplay, store::AssetHandle};

use super::{describe_outcome, show_result, GlobalOptions};

/// Reports that an external asset changed, syncing every replica that follows
/// it and has auto-sync turned on.
#[derive(Debug, Parser)]
pub struct ChangedCommand {
    /// Handle of the external asset that changed.
    pub external: String,
}

impl ChangedCommand {
    pub fn run(self, global: GlobalOptions) -> anyhow::Result<()> {
        let mut controller = global.controller()?;
        let external = AssetHandle::new(self.external);

        let results = controller.external_changed(&external)?;

        if results.is_empty() {
            log::info!("No replicas follow {}", external);
            return Ok(());
        }

        let mut failures = 0;
        for (replica, result) in results {
            match result {
                Ok(outcome) => {
                    show_result(global.color, &replica, &describe_outcome(&outcome), false)?
                }
                Err(err) => {
                    failures += 1;
                    let message = format!("failed: {}", ErrorDisplay(err));
                    show_result(global.color, &replica, &message, true)?;
                }
            }
        }

        if failures > 0 {
            bail!("{} replica(s) could not be synced", failures);
        }

        Ok(())
    }
}
