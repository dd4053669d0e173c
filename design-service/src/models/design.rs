use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Keys owned by the server. Callers can never set them through the
/// design payload.
pub const RESERVED_FIELDS: [&str; 5] = ["id", "_id", "userId", "createdAt", "updatedAt"];

/// A stored PCB design.
///
/// Only the bookkeeping fields are typed; everything else the client sends
/// (`version`, `generator`, `layers`, `components`, ...) is kept verbatim in
/// `fields`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Design {
    #[serde(rename = "_id")]
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

/// The state a write was based on. A replace only lands if the stored
/// document still matches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub user_id: String,
    pub updated_at: Option<String>,
}

impl Design {
    pub fn new(user_id: String, fields: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            created_at: timestamp(),
            updated_at: None,
            fields: strip_reserved(fields),
        }
    }

    pub fn revision(&self) -> Revision {
        Revision {
            user_id: self.user_id.clone(),
            updated_at: self.updated_at.clone(),
        }
    }

    /// Shallow merge: top-level keys in `updates` overwrite, everything else
    /// stays. Server-owned keys in `updates` are ignored. Stamps `updatedAt`.
    pub fn merge(&mut self, updates: Map<String, Value>) {
        self.fields.extend(strip_reserved(updates));
        self.updated_at = Some(next_update_stamp(self.updated_at.as_deref()));
    }
}

/// JavaScript-style truthiness, used for required fields:
/// absent, `null`, `false`, `0` and `""` all count as missing.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn strip_reserved(mut fields: Map<String, Value>) -> Map<String, Value> {
    for key in RESERVED_FIELDS {
        fields.remove(key);
    }
    fields
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `updatedAt` doubles as the revision token, so each stamp must sort strictly
/// after the one it replaces, even for writes within the same millisecond.
fn next_update_stamp(previous: Option<&str>) -> String {
    let now = Utc::now().trunc_subsecs(3);
    let previous = previous
        .and_then(|p| DateTime::parse_from_rfc3339(p).ok())
        .map(|p| p.with_timezone(&Utc));

    let stamp = match previous {
        Some(previous) if previous >= now => previous + Duration::milliseconds(1),
        _ => now,
    };
    stamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
