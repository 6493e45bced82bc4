use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Profile record returned by the backend.
///
/// The session layer only cares that a profile exists; the fields are kept
/// as-is so the front end can show whatever the server sends.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct User(Map<String, Value>);

impl User {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn id(&self) -> Option<i64> {
        self.0.get("id").and_then(Value::as_i64)
    }

    /// First of `username`, `name`, `email` that is a non-empty string
    pub fn display_name(&self) -> Option<&str> {
        ["username", "name", "email"]
            .iter()
            .filter_map(|key| self.0.get(*key).and_then(Value::as_str))
            .find(|s| !s.is_empty())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_round_trips_unknown_fields() {
        let user: User = serde_json::from_str(r#"{"id":1,"name":"X","theme":"dark"}"#).unwrap();
        assert_eq!(user.id(), Some(1));
        assert_eq!(user.display_name(), Some("X"));
        assert_eq!(user.get("theme"), Some(&Value::String("dark".into())));
    }

    #[test]
    fn test_display_name_prefers_username() {
        let user: User =
            serde_json::from_str(r#"{"username":"trader","email":"t@example.com"}"#).unwrap();
        assert_eq!(user.display_name(), Some("trader"));

        let user: User = serde_json::from_str(r#"{"username":"","email":"t@example.com"}"#).unwrap();
        assert_eq!(user.display_name(), Some("t@example.com"));

        assert_eq!(User::default().display_name(), None);
    }
}
