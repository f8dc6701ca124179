use tracing::warn;

use crate::api::ApiError;

/// Allow a mutation only when the acting user owns the resource.
pub fn ensure_owner(owner_id: &str, user_id: &str) -> Result<(), ApiError> {
    if owner_id == user_id {
        Ok(())
    } else {
        warn!(owner_id = %owner_id, user_id = %user_id, "Ownership check failed");
        Err(ApiError::forbidden(
            "You do not have permission to modify this resource",
        ))
    }
}
