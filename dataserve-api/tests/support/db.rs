use dataserve_api::{ApiResult, DbClient, DbConfig};

/// Client for the database named by `DATASERVE_DB_*`.
pub fn test_db_client() -> ApiResult<DbClient> {
    let config = DbConfig::from_env();
    DbClient::from_config(&config)
}
