//! Single replay of a request after a successful refresh

use session_auth::Credential;
use tracing::debug;

use crate::error::{AuthFailure, Error, Result};
use crate::interceptor;
use crate::metrics;
use crate::request::{ApiResponse, PendingRequest};

/// Re-send `pending` with `credential`, marking it retried first.
///
/// The credential is the one the refresh episode handed back, not a fresh
/// store read, so a concurrent logout cannot swap it out from under the
/// replay. A request that was already replayed is refused.
pub async fn replay(
    client: &reqwest::Client,
    base_url: &str,
    pending: &mut PendingRequest,
    credential: &Credential,
) -> Result<ApiResponse> {
    if !pending.mark_retried() {
        return Err(Error::PermanentAuthFailure(AuthFailure::ExpiredAfterRetry));
    }

    debug!(request_id = %pending.id, "replaying with refreshed credential");
    let response = interceptor::dispatch(client, base_url, pending, Some(credential)).await?;
    metrics::record_replay(response.status.as_u16());
    Ok(response)
}
