use anyhow::Context;
use clap::Parser;

use crate::store::AssetHandle;

use super::{describe_outcome, show_result, GlobalOptions};

/// Brings a replica up to date with the external asset it is bound to.
#[derive(Debug, Parser)]
pub struct SyncCommand {
    /// Handle of the replica to sync, the file name without `.model.json`.
    pub replica: String,
}

impl SyncCommand {
    pub fn run(self, global: GlobalOptions) -> anyhow::Result<()> {
        let mut controller = global.controller()?;
        let replica = AssetHandle::new(self.replica);

        let outcome = controller
            .sync(&replica)
            .with_context(|| format!("Could not sync {}", replica))?;

        show_result(global.color, &replica, &describe_outcome(&outcome), false)?;

        Ok(())
    }
}
