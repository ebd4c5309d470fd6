//! Shopify Admin API GraphQL client for report data.
//!
//! A thin read-only client: raw GraphQL documents with typed serde
//! responses, sequential cursor pagination, and strict client-side
//! re-filtering of timestamps. All conversion into domain records
//! happens here so downstream stages never see API shapes.

use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;

use crate::config::ShopifyConfig;

mod orders;
mod products;

pub use orders::{fetch_sales_orders, fetch_unfulfilled_lines};
pub use products::{fetch_catalog_products, fetch_product_snapshots};

/// Errors from the Admin API client.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication/authorization failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The response omitted data the query guarantees.
    #[error("Missing data in response: {0}")]
    MissingData(String),
}

/// A GraphQL error returned by the Shopify Admin API.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Source locations in the query.
    #[serde(default)]
    pub locations: Vec<GraphQLErrorLocation>,
    /// Path to the error in the response.
    #[serde(default)]
    pub path: Vec<serde_json::Value>,
}

/// Source location of a GraphQL error.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLErrorLocation {
    pub line: i64,
    pub column: i64,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLError>>,
}

/// Shopify Admin API GraphQL client for report fetching.
#[derive(Clone)]
pub struct ReportsClient {
    client: reqwest::Client,
    endpoint: String,
    access_token: SecretString,
}

impl ReportsClient {
    /// Create a new client from the Shopify configuration.
    #[must_use]
    pub fn new(config: &ShopifyConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.graphql_endpoint(),
            access_token: config.access_token.clone(),
        }
    }

    /// Execute a GraphQL document and deserialize its `data` payload.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::RateLimited` on HTTP 429 (with the
    /// `Retry-After` value), `Unauthorized` on 401, `GraphQL` when the
    /// response carries errors, and `Http`/`Parse` for transport and
    /// decoding failures.
    pub(crate) async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, ShopifyError> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Shopify-Access-Token", self.access_token.expose_secret())
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        // Check for rate limiting
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(ShopifyError::RateLimited(retry_after));
        }

        // Check for unauthorized
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ShopifyError::Unauthorized(
                "Invalid or expired access token".to_string(),
            ));
        }

        let graphql_response: GraphQLResponse<T> = response.json().await?;

        if let Some(errors) = graphql_response.errors
            && !errors.is_empty()
        {
            return Err(ShopifyError::GraphQL(errors));
        }

        graphql_response
            .data
            .ok_or_else(|| ShopifyError::MissingData("no data in response".to_string()))
    }
}

impl std::fmt::Debug for ReportsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportsClient")
            .field("endpoint", &self.endpoint)
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Shared connection shapes
// =============================================================================

/// Generic GraphQL connection wrapper.
#[derive(Debug, Deserialize)]
pub(crate) struct Connection<T> {
    #[serde(rename = "pageInfo")]
    pub page_info: PageInfo,
    pub edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Edge<T> {
    pub node: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageInfo {
    #[serde(rename = "hasNextPage")]
    pub has_next_page: bool,
    #[serde(rename = "endCursor")]
    pub end_cursor: Option<String>,
}
