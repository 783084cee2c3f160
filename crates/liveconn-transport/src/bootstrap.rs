//! Area and user allocation over HTTP
//!
//! Before a session can authenticate it needs an area identifier and a user
//! identifier inside that area. Both are handed out by plain-text HTTP
//! endpoints:
//!
//! - `GET /area/new` returns a fresh area id
//! - `POST /join` with the area id as body returns a fresh user id
//! - `GET /area/{id}` returns the users currently in the area

use crate::TransportError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info};

/// Allocates areas and users
#[async_trait]
pub trait AreaBootstrap: Send + Sync {
    /// Create a new area and return its id
    async fn create_area(&self) -> Result<String, TransportError>;

    /// Join `area` as a new user and return the user id
    async fn join_area(&self, area: &str) -> Result<String, TransportError>;

    /// List the users of `area`, as the server formats them
    async fn list_users(&self, area: &str) -> Result<String, TransportError>;
}

/// [`AreaBootstrap`] talking to the Live Connections HTTP endpoints
#[derive(Debug, Clone)]
pub struct HttpBootstrap {
    /// Scheme and authority, e.g. `https://localhost:8080`
    base_url: String,
    client: reqwest::Client,
}

impl HttpBootstrap {
    /// Create a bootstrap client for `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a bootstrap client reusing an existing HTTP client
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/area/{id}` with `area` escaped as a single path segment
    fn area_endpoint(&self, area: &str) -> Result<reqwest::Url, TransportError> {
        let invalid = |what: String| {
            TransportError::Http(format!("Base URL {} {}", self.base_url, what))
        };

        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot have a path".to_string()))?
            .pop_if_empty()
            .push("area")
            .push(area);
        Ok(url)
    }

    async fn fetch_text(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<String, TransportError> {
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Http(format!("{} failed with status {}", what, status)));
        }

        let body = response.text().await?;
        Ok(body.trim().to_string())
    }
}

#[async_trait]
impl AreaBootstrap for HttpBootstrap {
    async fn create_area(&self) -> Result<String, TransportError> {
        let request = self.client.get(self.endpoint("/area/new"));
        let area = required(self.fetch_text(request, "create area").await?, "area name")?;

        info!("Created area {}", area);
        Ok(area)
    }

    async fn join_area(&self, area: &str) -> Result<String, TransportError> {
        let request = self
            .client
            .post(self.endpoint("/join"))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(area.to_string());
        let user = required(self.fetch_text(request, "join area").await?, "user name")?;

        info!("Joined area {} as {}", area, user);
        Ok(user)
    }

    async fn list_users(&self, area: &str) -> Result<String, TransportError> {
        let request = self.client.get(self.area_endpoint(area)?);
        let users = self.fetch_text(request, "list users").await?;

        debug!("Users in {}: {}", area, users);
        Ok(users)
    }
}

/// Reject empty identifiers
fn required(value: String, what: &str) -> Result<String, TransportError> {
    if value.is_empty() {
        return Err(TransportError::Bootstrap(format!("Empty {}", what)));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_building() {
        let bootstrap = HttpBootstrap::new("https://localhost:8080/");

        assert_eq!(bootstrap.base_url(), "https://localhost:8080");
        assert_eq!(bootstrap.endpoint("/area/new"), "https://localhost:8080/area/new");
        assert_eq!(bootstrap.endpoint("/join"), "https://localhost:8080/join");
    }

    #[test]
    fn test_area_endpoint_escapes_identifier() {
        let bootstrap = HttpBootstrap::new("https://localhost:8080/");

        let url = bootstrap.area_endpoint("abc").unwrap();
        assert_eq!(url.as_str(), "https://localhost:8080/area/abc");

        let url = bootstrap.area_endpoint("a b/c?d").unwrap();
        assert_eq!(url.as_str(), "https://localhost:8080/area/a%20b%2Fc%3Fd");
    }

    #[test]
    fn test_area_endpoint_invalid_base() {
        let bootstrap = HttpBootstrap::new("not a url");
        assert!(matches!(bootstrap.area_endpoint("abc"), Err(TransportError::Http(_))));
    }

    #[test]
    fn test_required_identifier() {
        assert_eq!(required("abc".to_string(), "area name").unwrap(), "abc");
        assert!(matches!(
            required(String::new(), "area name"),
            Err(TransportError::Bootstrap(msg)) if msg == "Empty area name"
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let bootstrap = HttpBootstrap::new("http://127.0.0.1:9");

        assert!(matches!(bootstrap.create_area().await, Err(TransportError::Http(_))));
    }
}
