//! Record repository contracts.
//!
//! # Responsibility
//! - Define primary-key CRUD contracts per record family.
//! - Define the repository error shared by every implementation.
//!
//! # Invariants
//! - Create and update return the stored record as read back.
//! - Update/delete of a missing id is `NotFound`, not a silent no-op.
//! - Creating a child under a missing parent is `NotFound` for the parent.

use crate::db::DbError;
use crate::model::record::{
    Character, CharacterMemory, CharacterPatch, NewCharacter, NewCharacterMemory, NewNote,
    NewProject, NewTimeline, NewTimelineEvent, Note, NotePatch, Project, ProjectPatch, Timeline,
    TimelineEvent, TimelineEventPatch, TimelinePatch,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound { entity: &'static str, id: String },
    InvalidData(String),
    LockPoisoned,
}

impl RepoError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
            Self::LockPoisoned => write!(f, "record store lock poisoned"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub trait ProjectRepository {
    fn create_project(&self, input: &NewProject) -> RepoResult<Project>;
    fn get_project(&self, id: &str) -> RepoResult<Option<Project>>;
    /// Most recently updated first.
    fn list_projects(&self) -> RepoResult<Vec<Project>>;
    fn update_project(&self, id: &str, patch: &ProjectPatch) -> RepoResult<Project>;
    /// Cascades to the project's characters, notes and timelines.
    fn delete_project(&self, id: &str) -> RepoResult<()>;
}

pub trait CharacterRepository {
    fn create_character(&self, input: &NewCharacter) -> RepoResult<Character>;
    fn get_character(&self, id: &str) -> RepoResult<Option<Character>>;
    /// Sorted by name; `project_id` narrows to one project.
    fn list_characters(&self, project_id: Option<&str>) -> RepoResult<Vec<Character>>;
    fn update_character(&self, id: &str, patch: &CharacterPatch) -> RepoResult<Character>;
    fn delete_character(&self, id: &str) -> RepoResult<()>;
    fn create_memory(&self, input: &NewCharacterMemory) -> RepoResult<CharacterMemory>;
    /// Most important first, newest first within equal importance.
    fn list_memories(
        &self,
        character_id: &str,
        limit: Option<u32>,
    ) -> RepoResult<Vec<CharacterMemory>>;
    fn delete_memory(&self, id: &str) -> RepoResult<()>;
}

pub trait NoteRepository {
    fn create_note(&self, input: &NewNote) -> RepoResult<Note>;
    fn get_note(&self, id: &str) -> RepoResult<Option<Note>>;
    /// Newest first; `project_id` narrows to one project.
    fn list_notes(&self, project_id: Option<&str>) -> RepoResult<Vec<Note>>;
    fn update_note(&self, id: &str, patch: &NotePatch) -> RepoResult<Note>;
    fn delete_note(&self, id: &str) -> RepoResult<()>;
}

pub trait TimelineRepository {
    fn create_timeline(&self, input: &NewTimeline) -> RepoResult<Timeline>;
    fn get_timeline(&self, id: &str) -> RepoResult<Option<Timeline>>;
    fn list_timelines(&self, project_id: Option<&str>) -> RepoResult<Vec<Timeline>>;
    fn update_timeline(&self, id: &str, patch: &TimelinePatch) -> RepoResult<Timeline>;
    /// Cascades to the timeline's events.
    fn delete_timeline(&self, id: &str) -> RepoResult<()>;
    fn create_event(&self, input: &NewTimelineEvent) -> RepoResult<TimelineEvent>;
    fn get_event(&self, id: i64) -> RepoResult<Option<TimelineEvent>>;
    /// Chronological (`date ASC, id ASC`).
    fn list_events(&self, timeline_id: Option<&str>) -> RepoResult<Vec<TimelineEvent>>;
    fn update_event(&self, id: i64, patch: &TimelineEventPatch) -> RepoResult<TimelineEvent>;
    fn delete_event(&self, id: i64) -> RepoResult<()>;
}

/// Full data-access collaborator used by the dispatcher.
pub trait RecordStore:
    ProjectRepository + CharacterRepository + NoteRepository + TimelineRepository + Send + Sync
{
}

impl<T> RecordStore for T where
    T: ProjectRepository
        + CharacterRepository
        + NoteRepository
        + TimelineRepository
        + Send
        + Sync
{
}
