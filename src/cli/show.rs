use clap::Parser;

use crate::{
    link::PersistentLink,
    snapshot::NodeSnapshot,
    store::{AssetHandle, AssetProvider},
};

use super::GlobalOptions;

/// Prints the snapshot text of an asset.
#[derive(Debug, Parser)]
pub struct ShowCommand {
    /// Handle of the asset to show.
    pub handle: String,

    /// Print the snapshot recorded by the asset's link at its last sync
    /// instead of capturing the asset as it is now.
    #[clap(long)]
    pub history: bool,
}

impl ShowCommand {
    pub fn run(self, global: GlobalOptions) -> anyhow::Result<()> {
        let controller = global.controller()?;
        let registry = controller.registry();
        let handle = AssetHandle::new(self.handle);

        let tree = controller.provider().load(&handle)?;

        let text = if self.history {
            let (_, link) = PersistentLink::locate(&tree, registry.link_type())?;
            link.last_synced_snapshot
        } else {
            NodeSnapshot::capture(&tree, tree.root_id(), registry)?.to_text()
        };

        println!("{}", text);

        Ok(())
    }
}
