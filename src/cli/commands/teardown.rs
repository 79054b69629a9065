//! Standalone teardown command
//!
//! Recovers a cluster leaked by a crashed run. Safe to invoke repeatedly:
//! deleting an absent cluster succeeds.

use std::sync::Arc;

use anyhow::Result;

use crate::cluster::{ClusterProvider, KindClusterProvider};
use crate::config::config;
use crate::exec::ProcessCommandExecutor;

pub async fn teardown_command(cluster_name: Option<String>) -> Result<u8> {
    let cfg = config()?;
    let name = cluster_name.unwrap_or_else(|| cfg.cluster.name.clone());

    println!("🧹 Tearing down ephemeral cluster '{name}'");

    let provider = KindClusterProvider::new(
        Arc::new(ProcessCommandExecutor),
        cfg.timeouts.command(),
    );

    match provider.delete(&name).await {
        Ok(()) => {
            println!("✅ Cluster '{name}' is gone");
            Ok(0)
        }
        Err(e) => {
            println!("❌ {e}");
            Ok(1)
        }
    }
}
