use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShopifyApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Shopify is throttling requests and the retry limit was reached. {0}")]
    Throttled(String),
    #[error("Invalid GraphQL query: {0}")]
    InvalidGraphQL(String),
    #[error("GraphQL query failed: {0}")]
    GraphQLError(String),
    #[error("Shopify rejected the request: {0}")]
    UserErrors(String),
    #[error("Shopify returned an empty response")]
    EmptyResponse,
}

impl ShopifyApiError {
    /// True for 401 and 403 responses, which almost always mean a bad or under-scoped access token.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::QueryError { status: 401 | 403, .. })
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Throttled(_) | Self::QueryError { status: 429, .. })
    }
}
