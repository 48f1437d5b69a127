use serde::{Deserialize, Serialize};

/// Tables of the `public` schema, read live from the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablesResponse {
    pub success: bool,
    pub tables: Vec<String>,
    pub total: usize,
}

impl TablesResponse {
    pub fn new(tables: Vec<String>) -> Self {
        Self {
            success: true,
            total: tables.len(),
            tables,
        }
    }
}
