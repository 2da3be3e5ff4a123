//! Writer-facing record entities.
//!
//! # Responsibility
//! - Define projects, characters, memories, notes, timelines and timeline
//!   events as stored and returned to the UI.
//! - Define create (`New*`) and partial update (`*Patch`) inputs and their
//!   validation.
//!
//! # Invariants
//! - Ids of string-keyed records are UUID v4 text and never reused.
//! - Timeline event ids are SQLite row ids.
//! - `importance` is within `1..=5`.
//! - Timeline event `date` is ISO-8601 (`YYYY-MM-DD`, optionally with time).
//! - Serialized field names are camelCase.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static ISO_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])([T ]\d{2}:\d{2}(:\d{2}(\.\d{1,9})?)?(Z|[+-]\d{2}:\d{2})?)?$",
    )
    .expect("valid iso date regex")
});

pub const MIN_IMPORTANCE: i64 = 1;
pub const MAX_IMPORTANCE: i64 = 5;
const DEFAULT_IMPORTANCE: i64 = 3;

/// Input validation failure reported back to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field is missing or blank.
    Required(&'static str),
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required(field) => write!(f, "{field} is required"),
            Self::Invalid { field, reason } => write!(f, "{field} {reason}"),
        }
    }
}

impl Error for ValidationError {}

/// Fails with `Required(field)` when `value` is blank.
pub fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Required(field))
    } else {
        Ok(())
    }
}

fn require_if_present(field: &'static str, value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        Some(value) => require(field, value),
        None => Ok(()),
    }
}

fn validate_date(value: &str) -> Result<(), ValidationError> {
    if ISO_DATE_RE.is_match(value.trim()) {
        Ok(())
    } else {
        Err(ValidationError::Invalid {
            field: "date",
            reason: "must be an ISO-8601 date (YYYY-MM-DD[THH:MM[:SS]])",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
}

impl NewProject {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("name", &self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl ProjectPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_if_present("name", self.name.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub description: Option<String>,
    pub traits: Option<String>,
    pub values: Option<String>,
    pub voice_patterns: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewCharacter {
    pub project_id: String,
    pub name: String,
    pub description: Option<String>,
    pub traits: Option<String>,
    pub values: Option<String>,
    pub voice_patterns: Option<String>,
}

impl NewCharacter {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("projectId", &self.project_id)?;
        require("name", &self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CharacterPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub traits: Option<String>,
    pub values: Option<String>,
    pub voice_patterns: Option<String>,
}

impl CharacterPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_if_present("name", self.name.as_deref())
    }
}

/// Kind of remembered fact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    #[default]
    Episodic,
    Semantic,
    Emotional,
}

impl MemoryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
            Self::Emotional => "emotional",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "episodic" => Some(Self::Episodic),
            "semantic" => Some(Self::Semantic),
            "emotional" => Some(Self::Emotional),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterMemory {
    pub id: String,
    pub character_id: String,
    pub content: String,
    pub memory_type: MemoryType,
    pub importance: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewCharacterMemory {
    pub character_id: String,
    pub content: String,
    pub memory_type: MemoryType,
    pub importance: i64,
}

impl Default for NewCharacterMemory {
    fn default() -> Self {
        Self {
            character_id: String::new(),
            content: String::new(),
            memory_type: MemoryType::default(),
            importance: DEFAULT_IMPORTANCE,
        }
    }
}

impl NewCharacterMemory {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("characterId", &self.character_id)?;
        require("content", &self.content)?;
        if !(MIN_IMPORTANCE..=MAX_IMPORTANCE).contains(&self.importance) {
            return Err(ValidationError::Invalid {
                field: "importance",
                reason: "must be between 1 and 5",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub content: String,
    /// Comma-separated tag list as entered.
    pub tags: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewNote {
    pub project_id: String,
    pub title: String,
    pub content: String,
    pub tags: Option<String>,
}

impl NewNote {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("projectId", &self.project_id)?;
        require("title", &self.title)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<String>,
}

impl NotePatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_if_present("title", self.title.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewTimeline {
    pub project_id: String,
    pub name: String,
    pub description: Option<String>,
}

impl NewTimeline {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("projectId", &self.project_id)?;
        require("name", &self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimelinePatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl TimelinePatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_if_present("name", self.name.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub id: i64,
    pub timeline_id: Option<String>,
    pub date: String,
    pub description: String,
    /// Comma-separated character names.
    pub characters_involved: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TimelineEvent {
    /// Splits `characters_involved` into trimmed, non-empty names.
    pub fn character_names(&self) -> Vec<&str> {
        self.characters_involved
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewTimelineEvent {
    pub timeline_id: Option<String>,
    pub date: String,
    pub description: String,
    pub characters_involved: String,
}

impl NewTimelineEvent {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("date", &self.date)?;
        validate_date(&self.date)?;
        require("description", &self.description)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimelineEventPatch {
    pub date: Option<String>,
    pub description: Option<String>,
    pub characters_involved: Option<String>,
}

impl TimelineEventPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(date) = self.date.as_deref() {
            require("date", date)?;
            validate_date(date)?;
        }
        require_if_present("description", self.description.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        MemoryType, NewCharacterMemory, NewNote, NewTimelineEvent, NotePatch, TimelineEvent,
        ValidationError,
    };

    #[test]
    fn missing_fields_report_first_required_field() {
        let note = NewNote {
            project_id: String::new(),
            title: "Draft".to_string(),
            ..NewNote::default()
        };
        assert_eq!(note.validate(), Err(ValidationError::Required("projectId")));
        assert_eq!(
            ValidationError::Required("projectId").to_string(),
            "projectId is required"
        );
    }

    #[test]
    fn blank_patch_field_is_rejected_but_absent_is_fine() {
        let blank = NotePatch {
            title: Some("   ".to_string()),
            ..NotePatch::default()
        };
        assert_eq!(blank.validate(), Err(ValidationError::Required("title")));
        assert_eq!(NotePatch::default().validate(), Ok(()));
    }

    #[test]
    fn timeline_event_dates_must_be_iso_8601() {
        for good in ["2025-04-15", "2025-04-15T10:30", "2025-04-15T10:30:00.000Z", "2025-04-15 08:00:00+02:00"] {
            let event = NewTimelineEvent {
                date: good.to_string(),
                description: "Battle of Proxima".to_string(),
                ..NewTimelineEvent::default()
            };
            assert_eq!(event.validate(), Ok(()), "{good}");
        }
        for bad in ["yesterday", "2025-13-01", "15/04/2025"] {
            let event = NewTimelineEvent {
                date: bad.to_string(),
                description: "Battle of Proxima".to_string(),
                ..NewTimelineEvent::default()
            };
            let error = event.validate().expect_err(bad);
            assert!(error.to_string().starts_with("date must be"), "{error}");
        }
    }

    #[test]
    fn memory_defaults_and_importance_range() {
        let parsed: NewCharacterMemory =
            serde_json::from_str(r#"{"characterId":"c1","content":"Lost my first ship"}"#)
                .expect("parse");
        assert_eq!(parsed.memory_type, MemoryType::Episodic);
        assert_eq!(parsed.importance, 3);
        assert_eq!(parsed.validate(), Ok(()));

        let out_of_range = NewCharacterMemory {
            importance: 9,
            ..parsed
        };
        assert_eq!(
            out_of_range.validate().expect_err("range").to_string(),
            "importance must be between 1 and 5"
        );
    }

    #[test]
    fn character_names_split_comma_list() {
        let event = TimelineEvent {
            id: 1,
            timeline_id: None,
            date: "2025-05-01".to_string(),
            description: "Council convenes".to_string(),
            characters_involved: "Captain Elara, Dr. Nova ,,Wizard Thorne".to_string(),
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(
            event.character_names(),
            vec!["Captain Elara", "Dr. Nova", "Wizard Thorne"]
        );
    }
}
