//! Group records owned by the Grouping collaborator.

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::GroupId;

/// Lifecycle of a group.
///
/// The collaborators historically encode the status as `0` (seeking) and
/// `1` (complete); both encodings are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupStatus {
    /// Still accepting members.
    #[default]
    Seeking,

    /// Full; no longer accepting members.
    Complete,
}

impl GroupStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Seeking => "SEEKING",
            GroupStatus::Complete => "COMPLETE",
        }
    }
}

impl std::fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<'de> Deserialize<'de> for GroupStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawStatus {
            Code(u8),
            Name(String),
        }

        match RawStatus::deserialize(deserializer)? {
            RawStatus::Code(0) => Ok(GroupStatus::Seeking),
            RawStatus::Code(1) => Ok(GroupStatus::Complete),
            RawStatus::Code(other) => Err(serde::de::Error::custom(format!(
                "unknown group status code {other}"
            ))),
            RawStatus::Name(name) => match name.to_ascii_uppercase().as_str() {
                "SEEKING" => Ok(GroupStatus::Seeking),
                "COMPLETE" => Ok(GroupStatus::Complete),
                _ => Err(serde::de::Error::custom(format!(
                    "unknown group status {name:?}"
                ))),
            },
        }
    }
}

/// A persisted group.
///
/// Single-record bodies from the Grouping collaborator omit the id; it is
/// left blank on decode and filled in from the addressed URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    #[serde(default, alias = "grouping_id")]
    pub group_id: GroupId,
    pub no_of_pax: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: GroupStatus,
}

impl Group {
    /// Returns the create payload that would reproduce this group under a new id.
    pub fn to_new_group(&self) -> NewGroup {
        NewGroup {
            description: self.description.clone(),
            no_of_pax: self.no_of_pax,
            status: self.status,
        }
    }
}

/// Payload for creating a group; the collaborator assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    #[serde(default)]
    pub description: String,
    pub no_of_pax: u32,
    #[serde(default)]
    pub status: GroupStatus,
}

impl NewGroup {
    /// The group produced by merging two groups into one full group.
    pub fn merged(no_of_pax: u32) -> Self {
        Self {
            description: "Complete group!".to_string(),
            no_of_pax,
            status: GroupStatus::Complete,
        }
    }
}

/// Partial update of a group. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_of_pax: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<GroupStatus>,
}

impl GroupPatch {
    /// Sets the absolute pax count.
    pub fn pax(no_of_pax: u32) -> Self {
        Self {
            no_of_pax: Some(no_of_pax),
            ..Self::default()
        }
    }

    /// Applies the patch to a group in place.
    pub fn apply_to(&self, group: &mut Group) {
        if let Some(pax) = self.no_of_pax {
            group.no_of_pax = pax;
        }
        if let Some(description) = &self.description {
            group.description = description.clone();
        }
        if let Some(status) = self.status {
            group.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_accepts_legacy_codes() {
        let seeking: GroupStatus = serde_json::from_str("0").unwrap();
        let complete: GroupStatus = serde_json::from_str("1").unwrap();
        assert_eq!(seeking, GroupStatus::Seeking);
        assert_eq!(complete, GroupStatus::Complete);
        assert!(serde_json::from_str::<GroupStatus>("7").is_err());
    }

    #[test]
    fn status_accepts_names() {
        let status: GroupStatus = serde_json::from_str("\"COMPLETE\"").unwrap();
        assert_eq!(status, GroupStatus::Complete);
        assert_eq!(
            serde_json::to_string(&GroupStatus::Seeking).unwrap(),
            "\"SEEKING\""
        );
    }

    #[test]
    fn group_accepts_grouping_id_alias() {
        let json = r#"{"grouping_id": 2, "no_of_pax": 3, "description": "hikers", "status": 0}"#;
        let group: Group = serde_json::from_str(json).unwrap();
        assert_eq!(group.group_id, GroupId::from(2));
        assert_eq!(group.no_of_pax, 3);
        assert_eq!(group.status, GroupStatus::Seeking);
    }

    #[test]
    fn group_without_id_decodes_blank() {
        let json = r#"{"no_of_pax": 3, "description": "x", "status": 0}"#;
        let group: Group = serde_json::from_str(json).unwrap();
        assert!(group.group_id.is_blank());
        assert_eq!(group.no_of_pax, 3);
    }

    #[test]
    fn patch_omits_absent_fields() {
        let json = serde_json::to_value(GroupPatch::pax(8)).unwrap();
        assert_eq!(json, serde_json::json!({ "no_of_pax": 8 }));
    }

    #[test]
    fn patch_applies_present_fields_only() {
        let mut group = Group {
            group_id: GroupId::from(1),
            no_of_pax: 2,
            description: "before".to_string(),
            status: GroupStatus::Seeking,
        };
        GroupPatch::pax(5).apply_to(&mut group);
        assert_eq!(group.no_of_pax, 5);
        assert_eq!(group.description, "before");
    }

    #[test]
    fn merged_group_is_complete() {
        let merged = NewGroup::merged(10);
        assert_eq!(merged.no_of_pax, 10);
        assert_eq!(merged.status, GroupStatus::Complete);
    }
}
