use super::traits::Model;
use crate::constants;
use campus_learn::FromPgRow;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, FromPgRow)]
pub struct Module {
    pub module_id: i64,
    pub name: String,
    pub tag: Option<String>,
    pub description: Option<String>,
}

impl Model for Module {
    fn table_name() -> &'static str {
        constants::MODULE_TABLE_NAME
    }
    fn id_column() -> &'static str {
        "module_id"
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct NewModule {
    pub name: String,
    pub tag: Option<String>,
    pub description: Option<String>,
}
