use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalFields {
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub deadline: Option<String>,
    pub extra: Map<String, Value>,
}

impl GoalFields {
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewGoal {
    pub title: String,
    pub description: Option<String>,
    pub deadline: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Goal {
    pub id: String,
    pub user_id: Option<String>,
    pub created_at: Option<String>,
    pub fields: GoalFields,
}

impl Goal {
    pub fn to_document(&self) -> GoalDocument {
        GoalDocument::from_fields(
            &self.fields,
            self.user_id.as_deref(),
            self.created_at.as_deref(),
        )
    }
}

/// Keys the named goal fields own on the wire; never taken from `extra`.
const RESERVED_KEYS: [&str; 6] = [
    "userId",
    "title",
    "description",
    "completed",
    "createdAt",
    "deadline",
];

/// Blank or missing deadlines are stored as `null`.
pub fn normalize_deadline(deadline: Option<String>) -> Option<String> {
    deadline
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GoalDocument {
    pub fn from_fields(fields: &GoalFields, user_id: Option<&str>, created_at: Option<&str>) -> Self {
        let mut extra = fields.extra.clone();
        for key in RESERVED_KEYS {
            extra.remove(key);
        }

        Self {
            user_id: user_id.map(str::to_string),
            title: fields.title.clone(),
            description: fields.description.clone(),
            completed: fields.completed,
            created_at: created_at.map(str::to_string),
            deadline: normalize_deadline(fields.deadline.clone()),
            extra,
        }
    }

    pub fn into_goal(self, id: String) -> Goal {
        Goal {
            id,
            user_id: self.user_id,
            created_at: self.created_at,
            fields: GoalFields {
                title: self.title,
                description: self.description,
                completed: self.completed,
                deadline: normalize_deadline(self.deadline),
                extra: self.extra,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{GoalDocument, GoalFields, normalize_deadline};

    #[test]
    fn extra_cannot_override_named_fields() {
        let mut fields = GoalFields {
            title: "mine".to_string(),
            ..GoalFields::default()
        };
        fields.extra.insert("userId".to_string(), serde_json::json!("bob"));
        fields.extra.insert("createdAt".to_string(), serde_json::json!("1999-01-01T00:00:00Z"));
        fields.extra.insert("deadline".to_string(), serde_json::json!("2000-01-01"));
        fields.extra.insert("color".to_string(), serde_json::json!("teal"));

        let written = serde_json::to_value(GoalDocument::from_fields(
            &fields,
            Some("alice"),
            Some("2024-01-01T00:00:00Z"),
        ))
        .unwrap();

        assert_eq!(written["userId"], "alice");
        assert_eq!(written["createdAt"], "2024-01-01T00:00:00Z");
        assert!(written["deadline"].is_null());
        assert_eq!(written["color"], "teal");
    }

    #[test]
    fn blank_deadline_becomes_none() {
        assert_eq!(normalize_deadline(Some("  ".to_string())), None);
        assert_eq!(normalize_deadline(None), None);
        assert_eq!(
            normalize_deadline(Some("2024-06-30".to_string())),
            Some("2024-06-30".to_string())
        );
    }

    #[test]
    fn document_writes_null_deadline() {
        let doc = GoalDocument::from_fields(&GoalFields::titled("run"), Some("uid-1"), None);
        let value = serde_json::to_value(doc).unwrap();

        assert!(value["deadline"].is_null());
        assert_eq!(value["userId"], "uid-1");
        assert!(value.get("createdAt").is_none());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let doc: GoalDocument = serde_json::from_value(serde_json::json!({
            "title": "learn rust",
            "createdAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        let goal = doc.into_goal("g1".to_string());

        assert!(!goal.fields.completed);
        assert_eq!(goal.fields.deadline, None);
        assert_eq!(goal.created_at.as_deref(), Some("2024-01-01T00:00:00Z"));
    }
}
