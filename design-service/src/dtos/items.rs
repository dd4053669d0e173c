use crate::models::Design;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wire form of a design: `_id` is exposed as `id`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DesignResponse {
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(
        rename = "updatedAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl From<Design> for DesignResponse {
    fn from(design: Design) -> Self {
        Self {
            id: design.id,
            user_id: design.user_id,
            created_at: design.created_at,
            updated_at: design.updated_at,
            fields: design.fields,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ItemQuery {
    pub id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
    pub id: String,
}
