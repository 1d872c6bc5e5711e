//! Principal name to object id resolution.

use std::sync::Arc;
use tracing::{info, warn};

use graphxfer_common::{PrincipalName, ResolvedIdentity, Result};
use graphxfer_storage::IdentityLookup;

/// Resolves principal names through an [`IdentityLookup`].
///
/// Every call goes to the directory; nothing is cached.
pub struct IdentityResolver {
    lookup: Arc<dyn IdentityLookup>,
}

impl IdentityResolver {
    pub fn new(lookup: Arc<dyn IdentityLookup>) -> Self {
        Self { lookup }
    }

    /// Resolve a principal to its object id.
    ///
    /// Failures are logged here and returned unchanged; there is no retry.
    ///
    /// # Errors
    /// - `NotFound` if the principal does not exist
    /// - `Transport` / `Authentication` if the lookup call fails
    pub async fn resolve(&self, principal: &PrincipalName) -> Result<ResolvedIdentity> {
        match self.lookup.lookup_principal(principal).await {
            Ok(object_id) => {
                info!("Resolved UPN '{}' to object ID '{}'", principal, object_id);
                Ok(ResolvedIdentity {
                    principal: principal.clone(),
                    object_id,
                })
            }
            Err(e) => {
                warn!("Error resolving user ID for UPN '{}': {}", principal, e);
                Err(e)
            }
        }
    }
}
