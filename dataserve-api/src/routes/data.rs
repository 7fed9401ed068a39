//! Data read endpoint.
//!
//! `GET /data` returns the caller's records, or every record when the caller
//! is an admin. The access decision and the cache-aside read happen in the
//! [`DataRouter`](crate::state::DataRouter).

use axum::{extract::State, routing::get, Json, Router};
use dataserve_core::{OwnerId, Record, RecordId};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::middleware::AuthExtractor;
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

/// One record as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataItem {
    pub id: RecordId,
    pub user_id: OwnerId,
    pub data: String,
}

impl From<&Record> for DataItem {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id(),
            user_id: record.owner_id(),
            data: record.payload().to_string(),
        }
    }
}

/// Body of a successful `GET /data`. `data` is `[]`, never `null`, when
/// there are no records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataResponse {
    pub data: Vec<DataItem>,
}

impl DataResponse {
    pub fn from_records(records: &[Record]) -> Self {
        Self {
            data: records.iter().map(DataItem::from).collect(),
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

pub async fn get_data(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
) -> ApiResult<Json<DataResponse>> {
    let ctx = state.request_context();
    let records = state.router.resolve_and_fetch(&ctx, auth.user_id).await?;

    tracing::debug!(user_id = auth.user_id, count = records.len(), "Serving records");

    Ok(Json(DataResponse::from_records(&records)))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Data routes. Authentication is layered on by [`super::create_router`].
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/data", get(get_data))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_response_serializes_as_array() -> Result<(), serde_json::Error> {
        let json = serde_json::to_string(&DataResponse::from_records(&[]))?;
        assert_eq!(json, r#"{"data":[]}"#);
        Ok(())
    }

    #[test]
    fn test_item_field_names() -> Result<(), serde_json::Error> {
        let records = vec![Record::new(1, 1, "some_data")];
        let json = serde_json::to_value(DataResponse::from_records(&records))?;
        assert_eq!(
            json,
            serde_json::json!({ "data": [{ "id": 1, "user_id": 1, "data": "some_data" }] })
        );
        Ok(())
    }

    #[test]
    fn test_order_is_preserved() {
        let records = vec![Record::new(3, 2, "c"), Record::new(1, 1, "a")];
        let ids: Vec<RecordId> = DataResponse::from_records(&records)
            .data
            .iter()
            .map(|item| item.id)
            .collect();
        assert_eq!(ids, vec![3, 1]);
    }
}
