//! Wire format of a cache entry: a JSON array of `{id, user_id, data}`.

use dataserve_core::{CacheError, CachedRecord, Record};

pub fn encode_entry(records: &[Record]) -> Result<Vec<u8>, CacheError> {
    let cached: Vec<CachedRecord> = records.iter().map(CachedRecord::from).collect();
    serde_json::to_vec(&cached).map_err(|e| CacheError::serialization(e.to_string()))
}

pub fn decode_entry(bytes: &[u8]) -> Result<Vec<Record>, CacheError> {
    let cached: Vec<CachedRecord> =
        serde_json::from_slice(bytes).map_err(|e| CacheError::serialization(e.to_string()))?;
    Ok(cached.into_iter().map(Record::from).collect())
}
