use reqwest::header::RETRY_AFTER;
use url::Url;

use crate::HubSpotError;
use crate::error::classify;

pub const DEFAULT_BASE_URL: &str = "https://api.hubapi.com";

/// Authenticated HTTP client for the HubSpot API.
///
/// Owns one connection pool for its whole lifetime; clone the underlying
/// `reqwest::Client` via [`HubSpotClient::new_with_client`] to share it.
#[derive(Clone)]
pub struct HubSpotClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for HubSpotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubSpotClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HubSpotClient {
    /// Create a new client pointing at the given base URL with a private app token
    pub fn new(base_url: &str, token: &str) -> Self {
        Self::new_with_client(base_url, token, reqwest::Client::new())
    }

    pub fn new_with_client(base_url: &str, token: &str, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a GET request and deserialize the response
    pub async fn get<Q: serde::Serialize + ?Sized, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T, HubSpotError> {
        let url = format!("{}{path}", self.base_url);
        tracing::trace!(%url, "GET");
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        handle_response(resp).await
    }

    /// Send a POST request with a JSON body and deserialize the response
    pub async fn post<B: serde::Serialize + ?Sized, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HubSpotError> {
        let url = format!("{}{path}", self.base_url);
        tracing::trace!(%url, "POST");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        handle_response(resp).await
    }

    /// Send a POST request whose success response carries no body (204)
    pub async fn post_no_content<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), HubSpotError> {
        let url = format!("{}{path}", self.base_url);
        tracing::trace!(%url, "POST");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        handle_empty_response(resp).await
    }

    /// Send a PUT request with a JSON body and deserialize the response
    pub async fn put<B: serde::Serialize + ?Sized, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HubSpotError> {
        let url = format!("{}{path}", self.base_url);
        tracing::trace!(%url, "PUT");
        let resp = self
            .http
            .put(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        handle_response(resp).await
    }

    /// Absolute URL for `segments` under the base URL. Each segment is
    /// percent-encoded, so `/` inside one never starts a new path segment.
    pub fn url_for(&self, segments: &[&str]) -> Result<Url, HubSpotError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| HubSpotError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| HubSpotError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a DELETE request to the URL built from `segments`, expecting no
    /// response body
    pub async fn delete(&self, segments: &[&str]) -> Result<(), HubSpotError> {
        let url = self.url_for(segments)?;
        tracing::trace!(%url, "DELETE");
        let resp = self
            .http
            .delete(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        handle_empty_response(resp).await
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, HubSpotError> {
    if resp.status().is_success() {
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    } else {
        Err(error_from_response(resp).await)
    }
}

async fn handle_empty_response(resp: reqwest::Response) -> Result<(), HubSpotError> {
    if resp.status().is_success() {
        Ok(())
    } else {
        Err(error_from_response(resp).await)
    }
}

async fn error_from_response(resp: reqwest::Response) -> HubSpotError {
    let status = resp.status().as_u16();
    let retry_after = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let text = resp.text().await.unwrap_or_default();
    let err = classify(status, retry_after.as_deref(), &text);
    tracing::debug!(status, error = %err, "HubSpot request failed");
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = HubSpotClient::new("https://api.hubapi.com/", "pat");
        assert_eq!(client.base_url(), "https://api.hubapi.com");
    }

    #[test]
    fn test_debug_hides_token() {
        let client = HubSpotClient::new(DEFAULT_BASE_URL, "pat-secret");
        let debug = format!("{client:?}");
        assert!(debug.contains("api.hubapi.com"));
        assert!(!debug.contains("pat-secret"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        // port 9 (discard) on localhost is not expected to accept HTTP
        let client = HubSpotClient::new("http://127.0.0.1:9", "pat");
        let err = client
            .delete(&["crm", "v3", "objects", "contacts", "1"])
            .await
            .unwrap_err();
        assert!(matches!(err, HubSpotError::Transport(_)));
    }

    #[test]
    fn test_url_segments_are_encoded() {
        let client = HubSpotClient::new("https://api.hubapi.com/", "pat");
        let url = client
            .url_for(&["crm", "v3", "objects", "contacts", "42"])
            .unwrap();
        assert_eq!(url.as_str(), "https://api.hubapi.com/crm/v3/objects/contacts/42");

        let url = client
            .url_for(&["crm", "v3", "objects", "contacts", "../../../account-info/v3/details"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.hubapi.com/crm/v3/objects/contacts/..%2F..%2F..%2Faccount-info%2Fv3%2Fdetails"
        );
    }

    #[test]
    fn test_url_keeps_base_path() {
        let client = HubSpotClient::new("http://localhost:8080/hubspot", "pat");
        let url = client.url_for(&["crm", "v3", "objects", "deals", "7"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/hubspot/crm/v3/objects/deals/7");
    }

    #[test]
    fn test_unparseable_base_url() {
        let client = HubSpotClient::new("not a url", "pat");
        assert!(matches!(
            client.url_for(&["crm"]),
            Err(HubSpotError::InvalidUrl(_))
        ));
    }
}
