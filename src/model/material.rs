use super::traits::Model;
use crate::constants;
use campus_learn::FromPgRow;
use serde::{Deserialize, Serialize};

/// Attachment metadata; the bytes travel separately.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, FromPgRow)]
pub struct Material {
    pub material_id: i64,
    pub title: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub time_created: i64,
}

impl Model for Material {
    fn table_name() -> &'static str {
        constants::MATERIAL_TABLE_NAME
    }
    fn id_column() -> &'static str {
        "material_id"
    }
}

/// A file received from a client, not yet validated or stored.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: &str, content_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            bytes,
        }
    }
}
