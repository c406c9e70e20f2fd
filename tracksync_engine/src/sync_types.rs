use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CARRIER: &str = "Other";

//--------------------------------------  ExternalOrderRef   ---------------------------------------------------------
/// The supplier's order number for an order, e.g. an AliExpress order id. It is opaque; the only operations on it are
/// (trimmed) equality and substring checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalOrderRef(String);

impl ExternalOrderRef {
    pub fn new<S: AsRef<str>>(value: S) -> Self {
        Self(value.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for ExternalOrderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExternalOrderRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ExternalOrderRef {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

//--------------------------------------     TrackingInfo      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingInfo {
    pub tracking_number: String,
    pub carrier: String,
}

impl TrackingInfo {
    pub fn new<S: AsRef<str>>(tracking_number: S) -> Self {
        Self { tracking_number: tracking_number.as_ref().trim().to_string(), carrier: DEFAULT_CARRIER.to_string() }
    }

    /// Sets the carrier, unless `carrier` is missing or blank, in which case the current value is kept.
    pub fn with_carrier(mut self, carrier: Option<&str>) -> Self {
        if let Some(c) = carrier.map(str::trim).filter(|c| !c.is_empty()) {
            self.carrier = c.to_string();
        }
        self
    }
}

//--------------------------------------   CustomAttribute    ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomAttribute {
    pub key: String,
    pub value: String,
}

impl CustomAttribute {
    pub fn new<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

//-------------------------------------- FulfillmentOrderStatus ------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentOrderStatus {
    Open,
    InProgress,
    Scheduled,
    OnHold,
    Incomplete,
    Closed,
    Cancelled,
    Other(String),
}

impl FromStr for FulfillmentOrderStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Self::Open,
            "IN_PROGRESS" => Self::InProgress,
            "SCHEDULED" => Self::Scheduled,
            "ON_HOLD" => Self::OnHold,
            "INCOMPLETE" => Self::Incomplete,
            "CLOSED" => Self::Closed,
            "CANCELLED" => Self::Cancelled,
            _ => Self::Other(s.to_string()),
        };
        Ok(status)
    }
}

impl Display for FulfillmentOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Scheduled => "scheduled",
            Self::OnHold => "on_hold",
            Self::Incomplete => "incomplete",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
            Self::Other(s) => s.as_str(),
        };
        write!(f, "{s}")
    }
}

//--------------------------------------   FulfillmentOrder   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentOrder {
    pub id: String,
    pub status: FulfillmentOrderStatus,
}

impl FulfillmentOrder {
    pub fn new<S: Into<String>>(id: S, status: FulfillmentOrderStatus) -> Self {
        Self { id: id.into(), status }
    }

    pub fn is_open(&self) -> bool {
        self.status == FulfillmentOrderStatus::Open
    }
}

//--------------------------------------    PlatformOrder     ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformOrder {
    /// The id used in API calls (a GraphQL global id for Shopify)
    pub platform_id: String,
    /// Numeric id as shown in the admin URL. Informational only.
    pub legacy_id: String,
    /// The human-facing order code, e.g. "#1042"
    pub display_name: String,
    pub tags: Vec<String>,
    pub note: String,
    pub custom_attributes: Vec<CustomAttribute>,
    pub fulfillment_orders: Vec<FulfillmentOrder>,
    /// Tracking numbers already recorded on the order's fulfillments
    pub tracking_numbers: Vec<String>,
}

impl PlatformOrder {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.trim() == tag)
    }

    pub fn has_tracking_number(&self, tracking_number: &str) -> bool {
        let tracking_number = tracking_number.trim();
        self.tracking_numbers.iter().any(|t| t.trim().eq_ignore_ascii_case(tracking_number))
    }

    pub fn first_open_fulfillment_order(&self) -> Option<&FulfillmentOrder> {
        self.fulfillment_orders.iter().find(|fo| fo.is_open())
    }
}

//--------------------------------------      MatchTier       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Tag,
    TextSearch,
    DeepScan,
}

impl Display for MatchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tag => write!(f, "tag search"),
            Self::TextSearch => write!(f, "verified text search"),
            Self::DeepScan => write!(f, "deep scan of open orders"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOrder {
    pub order: PlatformOrder,
    pub tier: MatchTier,
}

//--------------------------------------       SyncRow        ---------------------------------------------------------
/// One row of the supplier sheet, reduced to the fields the engine needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncRow {
    /// Line number in the source file, for messages
    pub line: usize,
    pub external_id: ExternalOrderRef,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
}

impl SyncRow {
    pub fn new<S: AsRef<str>>(external_id: S, tracking_number: Option<&str>) -> Self {
        Self {
            line: 0,
            external_id: ExternalOrderRef::new(external_id),
            tracking_number: tracking_number.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
            carrier: None,
        }
    }
}

//--------------------------------------      RowOutcome      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeStatus {
    Success,
    /// Dry run: a match was found but nothing was changed
    Skipped,
    Failed,
}

impl Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::Skipped => write!(f, "Skipped"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowOutcome {
    pub timestamp: DateTime<Utc>,
    pub external_id: String,
    pub tracking_number: String,
    pub order_name: Option<String>,
    pub status: OutcomeStatus,
    pub message: String,
}

impl RowOutcome {
    pub fn new(row: &SyncRow, status: OutcomeStatus, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            external_id: row.external_id.to_string(),
            tracking_number: row.tracking_number.clone().unwrap_or_default(),
            order_name: None,
            status,
            message: message.into(),
        }
    }

    pub fn with_order_name(mut self, name: &str) -> Self {
        self.order_name = Some(name.to_string());
        self
    }

    pub fn order_name_or_na(&self) -> &str {
        self.order_name.as_deref().unwrap_or("N/A")
    }

    pub fn is_failure(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }
}

//--------------------------------------     SyncSummary      ---------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    pub outcomes: Vec<RowOutcome>,
    /// Rows that were skipped because their reference is already in the ledger
    pub already_processed: usize,
    /// True if the run was stopped before all rows were handled
    pub aborted: bool,
}

impl SyncSummary {
    /// Successful rows, including dry-run matches.
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_failure()).count()
    }

    pub fn fail_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }

    pub fn processed_count(&self) -> usize {
        self.outcomes.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn external_refs_are_trimmed() {
        let id = ExternalOrderRef::new("  8123456789 \t");
        assert_eq!(id.as_str(), "8123456789");
        assert_eq!(id, ExternalOrderRef::from("8123456789"));
        assert!(ExternalOrderRef::new("   ").is_empty());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"8123456789\"");
    }

    #[test]
    fn tracking_carrier_defaults_to_other() {
        let t = TrackingInfo::new(" LP000111222CN ");
        assert_eq!(t.tracking_number, "LP000111222CN");
        assert_eq!(t.carrier, "Other");
        assert_eq!(t.clone().with_carrier(Some("  ")).carrier, "Other");
        assert_eq!(t.with_carrier(Some("China Post")).carrier, "China Post");
    }

    #[test]
    fn fulfillment_order_statuses() {
        assert_eq!("OPEN".parse::<FulfillmentOrderStatus>().unwrap(), FulfillmentOrderStatus::Open);
        assert_eq!("in_progress".parse::<FulfillmentOrderStatus>().unwrap(), FulfillmentOrderStatus::InProgress);
        assert_eq!(
            "SOMETHING_NEW".parse::<FulfillmentOrderStatus>().unwrap(),
            FulfillmentOrderStatus::Other("SOMETHING_NEW".into())
        );
        assert_eq!(FulfillmentOrderStatus::OnHold.to_string(), "on_hold");
    }

    #[test]
    fn first_open_fulfillment_order_is_selected() {
        let order = PlatformOrder {
            fulfillment_orders: vec![
                FulfillmentOrder::new("fo-1", FulfillmentOrderStatus::Closed),
                FulfillmentOrder::new("fo-2", FulfillmentOrderStatus::Open),
                FulfillmentOrder::new("fo-3", FulfillmentOrderStatus::Open),
            ],
            tracking_numbers: vec!["lp000111222cn".into()],
            ..Default::default()
        };
        assert_eq!(order.first_open_fulfillment_order().map(|fo| fo.id.as_str()), Some("fo-2"));
        assert!(order.has_tracking_number("LP000111222CN"));
        assert!(!order.has_tracking_number("LP000111223CN"));
    }

    #[test]
    fn summary_counts() {
        let row = SyncRow::new("1", Some("T1"));
        let summary = SyncSummary {
            outcomes: vec![
                RowOutcome::new(&row, OutcomeStatus::Success, ""),
                RowOutcome::new(&row, OutcomeStatus::Skipped, ""),
                RowOutcome::new(&row, OutcomeStatus::Failed, ""),
            ],
            already_processed: 4,
            aborted: false,
        };
        assert_eq!(summary.success_count(), 2);
        assert_eq!(summary.fail_count(), 1);
        assert_eq!(summary.processed_count(), 3);
        assert_eq!(summary.outcomes[0].order_name_or_na(), "N/A");
    }
}
