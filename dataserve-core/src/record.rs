//! Record value type
//!
//! A record is built on every query, either from a database row or from a
//! cache entry, and discarded once the response is written. Both paths
//! produce the same `Record`; nothing downstream can tell them apart.

use serde::{Deserialize, Serialize};

/// Primary key of a row in the `data` table.
pub type RecordId = i64;

/// Identity that owns a record (`data.user_id`, `users.id`).
pub type OwnerId = i64;

/// One stored item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    id: RecordId,
    owner_id: OwnerId,
    payload: String,
}

impl Record {
    pub fn new(id: RecordId, owner_id: OwnerId, payload: impl Into<String>) -> Self {
        Self {
            id,
            owner_id,
            payload: payload.into(),
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

/// Serialized form of a record inside a cache entry.
///
/// Field names match the public JSON shape (`id`, `user_id`, `data`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRecord {
    pub id: RecordId,
    pub user_id: OwnerId,
    pub data: String,
}

impl From<CachedRecord> for Record {
    fn from(cached: CachedRecord) -> Self {
        Record::new(cached.id, cached.user_id, cached.data)
    }
}

impl From<&Record> for CachedRecord {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id,
            user_id: record.owner_id,
            data: record.payload.clone(),
        }
    }
}

/// Partition records by owner.
///
/// Owners appear in first-seen order and each group keeps the relative order
/// of its records as given.
pub fn group_by_owner(records: &[Record]) -> Vec<(OwnerId, Vec<Record>)> {
    let mut groups: Vec<(OwnerId, Vec<Record>)> = Vec::new();
    let mut index: std::collections::HashMap<OwnerId, usize> = std::collections::HashMap::new();

    for record in records {
        match index.get(&record.owner_id) {
            Some(&slot) => groups[slot].1.push(record.clone()),
            None => {
                index.insert(record.owner_id, groups.len());
                groups.push((record.owner_id, vec![record.clone()]));
            }
        }
    }

    groups
}
