//! Small one-shot maintenance jobs.

use tracing::{debug, info};

use crate::dispatch::HandlerDeps;
use crate::error::Result;

/// Execute one `reactivate_dormant_user` event.
pub async fn reactivate_dormant_user(deps: &HandlerDeps, user_id: i64) -> Result<()> {
    info!(user_id, "Reactivating dormant user");

    if deps.store.reactivate_dormant_user(user_id).await? {
        info!(user_id, "User reactivated");
    } else {
        debug!(user_id, "User was not dormant");
    }
    Ok(())
}

/// Execute one `sync_server_metadata` event.
pub async fn sync_server_metadata(deps: &HandlerDeps, tenant_id: i64) -> Result<()> {
    info!(tenant_id, "Syncing server metadata to push gateway");
    deps.push.sync_server_metadata(tenant_id).await?;
    Ok(())
}
