use std::sync::Arc;

use graphql_parser::parse_query;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, RETRY_AFTER},
    Client,
    Method,
    StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{
    config::ShopifyConfig,
    data_objects::{
        Connection,
        NewTrackingInfo,
        ShopifyFulfillment,
        ShopifyFulfillmentOrder,
        ShopifyOrder,
        UserError,
        FULFILLMENT_DEF,
        ORDER_DEF,
    },
    helpers::{backoff_delay, is_throttled, parse_retry_after, throttle_wait},
    ShopifyApiError,
};

#[derive(Clone)]
pub struct ShopifyApi {
    config: ShopifyConfig,
    base_url: String,
    client: Arc<Client>,
}

pub fn search_orders_query() -> String {
    format!(
        "query SearchOrders($query: String!, $first: Int!) {{ orders(first: $first, query: $query, sortKey: \
         CREATED_AT, reverse: true) {{ nodes {ORDER_DEF} }} }}"
    )
}

pub const FULFILLMENT_ORDERS_QUERY: &str =
    "query FulfillmentOrders($id: ID!) { order(id: $id) { fulfillmentOrders(first: 25) { nodes { id status } } } }";

pub fn create_fulfillment_mutation() -> String {
    format!(
        "mutation CreateFulfillment($fulfillment: FulfillmentV2Input!) {{ fulfillmentCreateV2(fulfillment: \
         $fulfillment) {{ fulfillment {FULFILLMENT_DEF} userErrors {{ field message }} }} }}"
    )
}

impl ShopifyApi {
    pub fn new(config: ShopifyConfig) -> Result<Self, ShopifyApiError> {
        if config.shop.is_empty() {
            return Err(ShopifyApiError::Initialization("No shop domain was configured".to_string()));
        }
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(config.admin_access_token.reveal().as_str())
            .map_err(|e| ShopifyApiError::Initialization(e.to_string()))?;
        headers.insert("X-Shopify-Access-Token", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ShopifyApiError::Initialization(e.to_string()))?;
        let base_url = format!("https://{}", config.shop);
        Ok(Self { config, base_url, client: Arc::new(client) })
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn config(&self) -> &ShopifyConfig {
        &self.config
    }

    /// Sends a request to the Admin API. 429 responses are retried up to `max_retries` times, waiting for the
    /// `Retry-After` period if Shopify supplies one.
    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<B>,
    ) -> Result<T, ShopifyApiError> {
        let url = self.url(path);
        let mut attempt = 0;
        loop {
            trace!("Sending REST query: {url}");
            let mut req = self.client.request(method.clone(), &url);
            if !params.is_empty() {
                req = req.query(params);
            }
            if let Some(body) = &body {
                req = req.json(body);
            }
            let response = req.send().await.map_err(|e| ShopifyApiError::RestRequestError(e.to_string()))?;
            let status = response.status();
            if status.is_success() {
                trace!("REST query successful. {status}");
                return response.json::<T>().await.map_err(|e| ShopifyApiError::JsonError(e.to_string()));
            }
            if status == StatusCode::TOO_MANY_REQUESTS && attempt < self.config.max_retries {
                let hint =
                    response.headers().get(RETRY_AFTER).and_then(|v| v.to_str().ok()).and_then(parse_retry_after);
                let delay = backoff_delay(attempt, hint);
                warn!("🛍️ Shopify rate limit hit. Retrying in {}ms", delay.as_millis());
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            let message = response.text().await.map_err(|e| ShopifyApiError::RestResponseError(e.to_string()))?;
            return Err(ShopifyApiError::QueryError { status: status.as_u16(), message });
        }
    }

    /// Runs a GraphQL query or mutation. Responses rejected with a `THROTTLED` error are retried after the time the
    /// cost extension says the bucket needs to refill, at most `max_retries` times.
    pub async fn graphql_query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Option<Value>,
    ) -> Result<T, ShopifyApiError> {
        let query = parse_query::<String>(query).map_err(|e| ShopifyApiError::InvalidGraphQL(e.to_string()))?;
        let mut body = serde_json::json!({
            "query": query.to_string(),
        });
        if let Some(vars) = variables {
            body["variables"] = vars;
        }
        trace!("Sending GraphQL query: {body}");
        let mut attempt = 0;
        let result = loop {
            let result = self.rest_query::<Value, &Value>(Method::POST, "/graphql.json", &[], Some(&body)).await?;
            if !is_throttled(&result) {
                break result;
            }
            if attempt >= self.config.max_retries {
                return Err(ShopifyApiError::Throttled(result["errors"].to_string()));
            }
            let delay = backoff_delay(attempt, throttle_wait(&result["extensions"]["cost"]));
            warn!("🛍️ GraphQL query throttled. Retrying in {}ms", delay.as_millis());
            tokio::time::sleep(delay).await;
            attempt += 1;
        };
        if let Some(errors) = result["errors"].as_array() {
            let e = errors.iter().map(|e| e.to_string()).collect::<Vec<String>>().join(", ");
            return Err(ShopifyApiError::GraphQLError(e));
        }
        let data = result["data"].clone();
        let costs = result["extensions"]["cost"].clone();
        trace!("GraphQL response: {data}");
        trace!("GraphQL costs: {costs}");
        if data.is_null() {
            return Err(ShopifyApiError::EmptyResponse);
        }
        let result = serde_json::from_value(data).map_err(|e| ShopifyApiError::JsonError(e.to_string()))?;
        Ok(result)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/admin/api/{}{path}", self.base_url, self.config.api_version)
    }

    /// Fetches the shop's name. Used as a cheap credentials check before a batch starts.
    pub async fn fetch_shop_name(&self) -> Result<String, ShopifyApiError> {
        #[derive(Deserialize)]
        struct Shop {
            name: String,
        }
        #[derive(Deserialize)]
        struct ShopResponse {
            shop: Shop,
        }
        let result = self.graphql_query::<ShopResponse>("{ shop { name } }", None).await?;
        debug!("🛍️ Connected to Shopify store {}", result.shop.name);
        Ok(result.shop.name)
    }

    /// Searches orders using Shopify's search syntax, most recent first.
    pub async fn search_orders(&self, query: &str, limit: u32) -> Result<Vec<ShopifyOrder>, ShopifyApiError> {
        #[derive(Deserialize)]
        struct OrdersResponse {
            orders: Connection<ShopifyOrder>,
        }
        let variables = serde_json::json!({ "query": query, "first": limit });
        debug!("🛍️ Searching orders with '{query}' (limit {limit})");
        let result = self.graphql_query::<OrdersResponse>(&search_orders_query(), Some(variables)).await?;
        debug!("🛍️ Search for '{query}' returned {} orders", result.orders.nodes.len());
        Ok(result.orders.nodes)
    }

    /// Fetches the fulfillment orders of the order with the given global id.
    pub async fn fetch_fulfillment_orders(
        &self,
        order_id: &str,
    ) -> Result<Vec<ShopifyFulfillmentOrder>, ShopifyApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct OrderFulfillmentOrders {
            fulfillment_orders: Connection<ShopifyFulfillmentOrder>,
        }
        #[derive(Deserialize)]
        struct OrderResponse {
            order: Option<OrderFulfillmentOrders>,
        }
        let variables = serde_json::json!({ "id": order_id });
        debug!("🛍️ Fetching fulfillment orders for {order_id}");
        let result = self.graphql_query::<OrderResponse>(FULFILLMENT_ORDERS_QUERY, Some(variables)).await?;
        let order = result.order.ok_or(ShopifyApiError::EmptyResponse)?;
        Ok(order.fulfillment_orders.nodes)
    }

    /// Creates a fulfillment for all remaining line items of the given fulfillment order, with tracking info.
    pub async fn create_fulfillment(
        &self,
        fulfillment_order_id: &str,
        tracking: &NewTrackingInfo,
        notify_customer: bool,
    ) -> Result<ShopifyFulfillment, ShopifyApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct FulfillmentCreatePayload {
            fulfillment: Option<ShopifyFulfillment>,
            #[serde(default)]
            user_errors: Vec<UserError>,
        }
        #[derive(Deserialize)]
        struct FulfillmentCreateResponse {
            #[serde(rename = "fulfillmentCreateV2")]
            payload: FulfillmentCreatePayload,
        }
        let variables = serde_json::json!({
            "fulfillment": {
                "lineItemsByFulfillmentOrder": [ { "fulfillmentOrderId": fulfillment_order_id } ],
                "trackingInfo": tracking,
                "notifyCustomer": notify_customer,
            }
        });
        debug!("🛍️ Creating fulfillment for {fulfillment_order_id}: {variables}");
        let result =
            self.graphql_query::<FulfillmentCreateResponse>(&create_fulfillment_mutation(), Some(variables)).await?;
        if !result.payload.user_errors.is_empty() {
            return Err(ShopifyApiError::UserErrors(UserError::describe(&result.payload.user_errors)));
        }
        let fulfillment = result.payload.fulfillment.ok_or(ShopifyApiError::EmptyResponse)?;
        info!(
            "🛍️ Created fulfillment {} for {fulfillment_order_id} with tracking {}",
            fulfillment.id.as_deref().unwrap_or("(no id)"),
            tracking.number
        );
        Ok(fulfillment)
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::{Duration, Instant},
    };

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
    };
    use tracksync_common::Secret;

    use super::*;

    const SHOP_RESPONSE: &str = r#"{"data": {"shop": {"name": "Gadget Den"}}}"#;
    // Enough points are available, so the cost-based wait is zero and only jitter applies
    const THROTTLED_RESPONSE: &str = r#"{
        "errors": [{"message": "Throttled", "extensions": {"code": "THROTTLED"}}],
        "extensions": {"cost": {"requestedQueryCost": 10, "throttleStatus": {"currentlyAvailable": 50, "restoreRate": 100.0}}}
    }"#;

    fn http_response(status: &str, extra_headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n{extra_headers}\r\n{body}",
            body.len()
        )
    }

    fn rate_limited(retry_after: &str) -> String {
        http_response("429 Too Many Requests", &format!("Retry-After: {retry_after}\r\n"), "Exceeded 2 calls per second")
    }

    fn ok(body: &str) -> String {
        http_response("200 OK", "", body)
    }

    async fn read_request(stream: &mut TcpStream) -> std::io::Result<()> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let body_len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    return Ok(());
                }
            }
        }
    }

    /// Serves the canned responses in order, repeating the last one, and counts the requests received.
    async fn serve(responses: Vec<String>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else { return };
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let response = responses[n.min(responses.len() - 1)].clone();
                tokio::spawn(async move {
                    if read_request(&mut stream).await.is_ok() {
                        let _ = stream.write_all(response.as_bytes()).await;
                        let _ = stream.shutdown().await;
                    }
                });
            }
        });
        (format!("http://{addr}"), hits)
    }

    fn local_api(base_url: &str, max_retries: u32) -> ShopifyApi {
        let mut config = ShopifyConfig::new("my-shop.myshopify.com", Secret::new("shpat_x".to_string()));
        config.max_retries = max_retries;
        config.request_timeout = Duration::from_secs(5);
        ShopifyApi::new(config).unwrap().with_base_url(base_url)
    }

    #[tokio::test]
    async fn rate_limited_requests_recover() {
        let (url, hits) = serve(vec![rate_limited("0"), ok(SHOP_RESPONSE)]).await;
        let name = local_api(&url, 3).fetch_shop_name().await.unwrap();
        assert_eq!(name, "Gadget Den");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rate_limit_gives_up_after_max_retries() {
        let (url, hits) = serve(vec![rate_limited("0")]).await;
        let start = Instant::now();
        let err = local_api(&url, 2).fetch_shop_name().await.unwrap_err();
        assert!(matches!(err, ShopifyApiError::QueryError { status: 429, .. }));
        assert!(err.is_rate_limited());
        // One initial attempt plus two retries, never more
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn retry_after_is_honoured() {
        let (url, hits) = serve(vec![rate_limited("1"), ok(SHOP_RESPONSE)]).await;
        let start = Instant::now();
        local_api(&url, 3).fetch_shop_name().await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn throttled_graphql_is_retried() {
        let (url, hits) = serve(vec![ok(THROTTLED_RESPONSE), ok(SHOP_RESPONSE)]).await;
        let name = local_api(&url, 3).fetch_shop_name().await.unwrap();
        assert_eq!(name, "Gadget Den");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn throttled_graphql_gives_up_after_max_retries() {
        let (url, hits) = serve(vec![ok(THROTTLED_RESPONSE)]).await;
        let err = local_api(&url, 3).fetch_shop_name().await.unwrap_err();
        assert!(matches!(err, ShopifyApiError::Throttled(_)));
        assert!(err.is_rate_limited());
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let (url, hits) =
            serve(vec![http_response("401 Unauthorized", "", r#"{"errors": "Invalid API key"}"#)]).await;
        let err = local_api(&url, 3).fetch_shop_name().await.unwrap_err();
        assert!(matches!(err, ShopifyApiError::QueryError { status: 401, .. }));
        assert!(err.is_auth_failure());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hung_requests_time_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            // Accept and hold the connection without ever answering
            let mut open = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                open.push(stream);
            }
        });
        let mut config = ShopifyConfig::new("my-shop.myshopify.com", Secret::new("shpat_x".to_string()));
        config.max_retries = 0;
        config.request_timeout = Duration::from_millis(200);
        let api = ShopifyApi::new(config).unwrap().with_base_url(&url);
        let start = Instant::now();
        let err = api.fetch_shop_name().await.unwrap_err();
        assert!(matches!(err, ShopifyApiError::RestRequestError(_)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn queries_are_valid_graphql() {
        assert!(parse_query::<String>(&search_orders_query()).is_ok());
        assert!(parse_query::<String>(FULFILLMENT_ORDERS_QUERY).is_ok());
        assert!(parse_query::<String>(&create_fulfillment_mutation()).is_ok());
        assert!(parse_query::<String>("{ shop { name } }").is_ok());
    }

    #[test]
    fn admin_urls() {
        let config = ShopifyConfig::new("https://my-shop.myshopify.com/", Secret::new("shpat_x".to_string()));
        let api = ShopifyApi::new(config).unwrap();
        assert_eq!(api.url("/graphql.json"), "https://my-shop.myshopify.com/admin/api/2024-04/graphql.json");
    }

    #[test]
    fn missing_shop_is_an_initialization_error() {
        let err = ShopifyApi::new(ShopifyConfig::default()).err().unwrap();
        assert!(matches!(err, ShopifyApiError::Initialization(_)));
    }

    #[test]
    fn tracking_info_serializes_for_the_mutation() {
        let tracking = NewTrackingInfo { number: "LP000111222CN".into(), company: "Other".into() };
        let value = serde_json::to_value(&tracking).unwrap();
        assert_eq!(value, serde_json::json!({"number": "LP000111222CN", "company": "Other"}));
    }
}
