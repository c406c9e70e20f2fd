use std::time::Duration;

use rand::Rng;
use serde_json::Value;

const BASE_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF: Duration = Duration::from_secs(10);
const MAX_JITTER_MS: u64 = 250;

/// Formats a value for Shopify's search syntax. Plain identifiers are passed through; anything else is quoted so
/// that spaces, colons and the like are not interpreted as search operators.
pub fn search_term(value: &str) -> String {
    let value = value.trim();
    let is_plain =
        !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if is_plain {
        value.to_string()
    } else {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    }
}

pub fn tag_query(tag: &str) -> String {
    format!("tag:{}", search_term(tag))
}

/// The delay before retry number `attempt` (zero-based). A server-supplied wait wins over exponential backoff, but
/// neither may exceed ten seconds.
pub fn backoff_delay(attempt: u32, server_hint: Option<Duration>) -> Duration {
    let delay = server_hint.unwrap_or_else(|| {
        let exp = BASE_BACKOFF_MS.saturating_mul(1u64 << attempt.min(16));
        Duration::from_millis(exp)
    });
    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=MAX_JITTER_MS));
    (delay + jitter).min(MAX_BACKOFF)
}

/// Converts a server-supplied wait in seconds into a delay no longer than [`MAX_BACKOFF`]. Negative and non-finite
/// values are rejected.
fn capped_wait(secs: f64) -> Option<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(secs.min(MAX_BACKOFF.as_secs_f64())))
}

/// Parses a `Retry-After` header value given in (possibly fractional) seconds.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<f64>().ok().and_then(capped_wait)
}

/// True if a GraphQL response was rejected because the query cost bucket is empty.
pub fn is_throttled(response: &Value) -> bool {
    response["errors"]
        .as_array()
        .map(|errors| errors.iter().any(|e| e["extensions"]["code"].as_str() == Some("THROTTLED")))
        .unwrap_or(false)
}

/// Estimates how long until the cost bucket holds enough points for the rejected query, from the `cost` extension.
pub fn throttle_wait(cost: &Value) -> Option<Duration> {
    let requested = cost["requestedQueryCost"].as_f64()?;
    let available = cost["throttleStatus"]["currentlyAvailable"].as_f64()?;
    let restore_rate = cost["throttleStatus"]["restoreRate"].as_f64().filter(|r| *r > 0.0)?;
    capped_wait(((requested - available) / restore_rate).max(0.0))
}
