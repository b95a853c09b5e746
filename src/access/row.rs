use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::dao::{DaoResult, DataAccessError};
use crate::driver::Row;

/// Read column `name` of `row` as `T`.
pub fn column<T: DeserializeOwned>(row: &Row, name: &str) -> DaoResult<T> {
    let value = row.get(name).ok_or_else(|| DataAccessError::RowMapping {
        column: name.to_string(),
        message: "no such column in result".to_string(),
    })?;
    <T as Deserialize>::deserialize(value).map_err(|e| DataAccessError::RowMapping {
        column: name.to_string(),
        message: e.to_string(),
    })
}
