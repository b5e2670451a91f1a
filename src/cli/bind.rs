use anyhow::Context;
use clap::Parser;

use crate::store::AssetHandle;

use super::{describe_outcome, show_result, GlobalOptions};

/// Binds a replica to an external asset, or unbinds it.
#[derive(Debug, Parser)]
pub struct BindCommand {
    /// Handle of the replica.
    pub replica: String,

    /// Handle of the external asset to follow. Omit this to unbind the
    /// replica while keeping its sync history.
    #[clap(long, short)]
    pub external: Option<String>,
}

impl BindCommand {
    pub fn run(self, global: GlobalOptions) -> anyhow::Result<()> {
        let mut controller = global.controller()?;
        let replica = AssetHandle::new(self.replica);
        let external = self.external.map(AssetHandle::new);

        let outcome = controller
            .bind(&replica, external)
            .with_context(|| format!("Could not bind {}", replica))?;

        show_result(global.color, &replica, &describe_outcome(&outcome), false)?;

        Ok(())
    }
}
