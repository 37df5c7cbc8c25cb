//! Outgoing request construction
//!
//! Builds the HTTP request for an `ApiRequest` and attaches the bearer token.
//! The credential is read from the store at send time by the caller and passed
//! in whole, so the header always comes from one consistent snapshot.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use session_auth::{Credential, endpoint_url};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::request::{ApiRequest, ApiResponse, PendingRequest};

/// Correlates the original send and its replay in server logs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Attach `Authorization: Bearer <access token>`.
///
/// With no credential the header is left off and the request goes out
/// unauthenticated; the server decides what to do with it.
pub fn authorize(headers: &mut HeaderMap, credential: Option<&Credential>) -> Result<()> {
    headers.remove(AUTHORIZATION);
    let Some(credential) = credential else {
        return Ok(());
    };
    let mut value =
        HeaderValue::from_str(&format!("Bearer {}", credential.access_token.expose()))
            .map_err(|e| Error::InvalidRequest(format!("invalid token value: {e}")))?;
    value.set_sensitive(true);
    headers.insert(AUTHORIZATION, value);
    Ok(())
}

/// Send `pending` with the given credential and read the whole response.
///
/// Network failures become `Error::Transport`. Every HTTP status, including
/// 401, comes back as `Ok` for the classifier to look at.
#[instrument(skip_all, fields(request_id = %pending.id, retried = pending.retried))]
pub async fn dispatch(
    client: &reqwest::Client,
    base_url: &str,
    pending: &PendingRequest,
    credential: Option<&Credential>,
) -> Result<ApiResponse> {
    let ApiRequest {
        method,
        path,
        query,
        body,
    } = &pending.request;

    let mut headers = HeaderMap::new();
    authorize(&mut headers, credential)?;
    if let Ok(id) = HeaderValue::from_str(&pending.id) {
        headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), id);
    }

    let mut builder = client
        .request(method.clone(), endpoint_url(base_url, path))
        .headers(headers);
    if !query.is_empty() {
        builder = builder.query(query);
    }
    if let Some(body) = body {
        builder = builder.json(body);
    }

    let response = builder
        .send()
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| Error::Transport(format!("reading response body: {e}")))?;

    debug!(status = status.as_u16(), authenticated = credential.is_some(), "response received");
    Ok(ApiResponse { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attaches_bearer_header() {
        let mut headers = HeaderMap::new();
        let cred = Credential::new("T1", Some("R1".into()));
        authorize(&mut headers, Some(&cred)).unwrap();

        let value = headers.get(AUTHORIZATION).unwrap();
        assert_eq!(value, "Bearer T1");
        assert!(value.is_sensitive());
    }

    #[test]
    fn no_credential_sends_unauthenticated() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer stale"));
        authorize(&mut headers, None).unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn replaces_existing_authorization() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer T1"));
        authorize(&mut headers, Some(&Credential::new("T2", None))).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer T2");
        assert_eq!(headers.get_all(AUTHORIZATION).iter().count(), 1);
    }

    #[test]
    fn rejects_token_with_control_characters() {
        let mut headers = HeaderMap::new();
        let err = authorize(&mut headers, Some(&Credential::new("T1\nX-Evil: 1", None)))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)), "got: {err}");
    }
}
