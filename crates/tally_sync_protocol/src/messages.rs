//! Records API messages.
//!
//! | Operation            | Method | Path                  | Body / Query    | Response               |
//! |----------------------|--------|-----------------------|-----------------|------------------------|
//! | create               | POST   | `/v1/records`         | [`Record`]      | [`CreateRecordResponse`] |
//! | update               | PUT    | `/v1/records/{sync_id}` | [`Record`]    | [`UpdateRecordResponse`] |
//! | list changed / all   | GET    | `/v1/records`         | [`ListQuery`]   | [`RecordPage`]         |
//!
//! Creates carry the client-generated `id`; a server that already holds a
//! record with that `id` for the owner returns the existing `sync_id`
//! instead of creating a duplicate.

use crate::error::{ProtocolError, ProtocolResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tally_core::{Record, SyncId, SyncableRecord};

/// Default number of records per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 200;

/// Route paths, relative to the API base URL.
pub mod routes {
    /// Collection path for records.
    pub const RECORDS: &str = "v1/records";

    /// Path of a single record by server ID.
    #[must_use]
    pub fn record(sync_id: &str) -> String {
        format!("{RECORDS}/{sync_id}")
    }
}

/// Response to a create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRecordResponse {
    /// Server-assigned identifier.
    pub sync_id: SyncId,
    /// True if the server already held this client ID.
    #[serde(default)]
    pub deduplicated: bool,
}

/// Response to an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRecordResponse {
    /// Server identifier of the updated record.
    pub sync_id: SyncId,
}

/// Query for a records listing.
///
/// Serialized as URL query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    /// Only records changed strictly after this instant; `None` lists all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_since: Option<DateTime<Utc>>,
    /// Continuation token from the previous page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    /// Maximum records per page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl ListQuery {
    /// Lists every record.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Lists records changed after `since`.
    #[must_use]
    pub fn changed_since(since: DateTime<Utc>) -> Self {
        Self {
            changed_since: Some(since),
            ..Self::default()
        }
    }

    /// Sets the page size.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Continues from a page token.
    #[must_use]
    pub fn with_page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }
}

/// One page of a records listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPage {
    /// Records on this page. Tombstones included.
    #[serde(default)]
    pub records: Vec<Record>,
    /// Token for the next page; `None` on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl RecordPage {
    /// Returns true if no further page follows.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.next_page_token.is_none()
    }

    /// Checks that every listed record carries a server ID.
    pub fn validate(&self) -> ProtocolResult<()> {
        match self.records.iter().find(|r| r.sync_id().is_none()) {
            Some(record) => Err(ProtocolError::invalid(format!(
                "listed record {} has no sync_id",
                record.id()
            ))),
            None => Ok(()),
        }
    }
}

/// Error body returned by the server on non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiErrorBody {
    /// Returns the most descriptive text available.
    #[must_use]
    pub fn describe(&self) -> &str {
        self.message.as_deref().unwrap_or(&self.error)
    }
}

/// Encodes a message as JSON.
pub fn encode<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    Ok(serde_json::to_vec(message)?)
}

/// Decodes a JSON message.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> ProtocolResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{Category, CategoryKind};

    #[test]
    fn page_decodes_without_token() {
        let page: RecordPage = decode(br#"{"records": []}"#).unwrap();
        assert!(page.is_last());
        assert!(page.records.is_empty());
    }

    #[test]
    fn page_validation_requires_sync_id() {
        let category = Category::new("owner", "Rent", CategoryKind::Expense);
        let mut page = RecordPage {
            records: vec![category.into()],
            next_page_token: Some("p2".into()),
        };
        assert!(page.validate().is_err());

        page.records[0].meta_mut().sync_id = Some(SyncId::from("srv-1"));
        assert!(page.validate().is_ok());
        assert!(!page.is_last());
    }

    #[test]
    fn list_query_omits_unset_fields() {
        let json = serde_json::to_value(ListQuery::all()).unwrap();
        assert_eq!(json, serde_json::json!({}));

        let since = "2026-04-01T08:30:00Z".parse::<DateTime<Utc>>().unwrap();
        let json = serde_json::to_value(ListQuery::changed_since(since).with_limit(50)).unwrap();
        assert_eq!(json["changed_since"], "2026-04-01T08:30:00Z");
        assert_eq!(json["limit"], 50);
    }

    #[test]
    fn create_response_defaults_dedup_flag() {
        let response: CreateRecordResponse = decode(br#"{"sync_id": "srv-9"}"#).unwrap();
        assert_eq!(response.sync_id, SyncId::from("srv-9"));
        assert!(!response.deduplicated);
    }

    #[test]
    fn api_error_describe() {
        let body: ApiErrorBody = decode(br#"{"error": "unauthorized"}"#).unwrap();
        assert_eq!(body.describe(), "unauthorized");

        let body: ApiErrorBody =
            decode(br#"{"error": "conflict", "message": "stale version"}"#).unwrap();
        assert_eq!(body.describe(), "stale version");
    }

    #[test]
    fn malformed_body() {
        let result: ProtocolResult<RecordPage> = decode(b"not json");
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn record_route() {
        assert_eq!(routes::record("abc"), "v1/records/abc");
    }
}
