use serde::{Deserialize, Serialize};

use crate::utils::format_phone;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PersonName {
    pub first: String,
    pub last: String,
}

/// Reference data for a registered user. Fetched on demand, never edited
/// locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    pub id: String,
    pub name: PersonName,
    pub email: String,
    #[serde(default)]
    pub mobile: String,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name.first, self.name.last)
    }

    pub fn display_name(&self) -> String {
        format!("{}, {}", self.name.last, self.name.first)
    }

    pub fn formatted_mobile(&self) -> String {
        format_phone(&self.mobile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user() {
        let json = r#"{
            "id": "ajY8pM2",
            "name": {"first": "Eva", "last": "Young"},
            "email": "eva.young@example.com",
            "mobile": "(543) 905-5629"
        }"#;
        let user: User = serde_json::from_str(json).expect("Failed to parse user test JSON");
        assert_eq!(user.id, "ajY8pM2");
        assert_eq!(user.full_name(), "Eva Young");
        assert_eq!(user.display_name(), "Young, Eva");
        assert_eq!(user.formatted_mobile(), "(543) 905-5629");
    }

    #[test]
    fn test_missing_mobile_defaults_to_empty() {
        let json = r#"{"id": "1", "name": {"first": "A", "last": "B"}, "email": "a@b.co"}"#;
        let user: User = serde_json::from_str(json).expect("Failed to parse user test JSON");
        assert!(user.mobile.is_empty());
    }
}
