//! Typed command table.
//!
//! # Responsibility
//! - Map wire command names to `CommandName`.
//! - Deserialize each command's payload into its request shape and validate
//!   required fields before anything else runs.
//!
//! # Invariants
//! - Validation is pure: parsing a `Command` never touches a collaborator.
//! - The first missing field wins and is reported as `<field> is required`.
//! - A `null` or absent payload is treated as an empty object.

use crate::model::record::{
    require, CharacterPatch, NewCharacter, NewCharacterMemory, NewNote, NewProject, NewTimeline,
    NewTimelineEvent, NotePatch, ProjectPatch, TimelineEventPatch, TimelinePatch, ValidationError,
};
use crate::service::dialogue_service::ConversationStyle;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

macro_rules! command_names {
    ($($variant:ident => $wire:literal,)+) => {
        /// Every command the dispatcher accepts.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum CommandName {
            $($variant,)+
        }

        impl CommandName {
            pub const ALL: &'static [CommandName] = &[$(CommandName::$variant,)+];

            /// Wire name, e.g. `set-api-key`.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(CommandName::$variant => $wire,)+
                }
            }
        }

        impl FromStr for CommandName {
            type Err = CommandError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($wire => Ok(CommandName::$variant),)+
                    other => Err(CommandError::UnknownCommand(other.to_string())),
                }
            }
        }
    };
}

command_names! {
    GetAppInfo => "get-app-info",
    SetApiKey => "set-api-key",
    GetApiKey => "get-api-key",
    HasApiKey => "has-api-key",
    RemoveApiKey => "remove-api-key",
    ListProjects => "list-projects",
    GetProject => "get-project",
    CreateProject => "create-project",
    UpdateProject => "update-project",
    DeleteProject => "delete-project",
    ListCharacters => "list-characters",
    GetCharacter => "get-character",
    CreateCharacter => "create-character",
    UpdateCharacter => "update-character",
    DeleteCharacter => "delete-character",
    ListCharacterMemories => "list-character-memories",
    CreateCharacterMemory => "create-character-memory",
    DeleteCharacterMemory => "delete-character-memory",
    GetNotes => "get-notes",
    CreateNote => "create-note",
    UpdateNote => "update-note",
    DeleteNote => "delete-note",
    ListTimelines => "list-timelines",
    CreateTimeline => "create-timeline",
    UpdateTimeline => "update-timeline",
    DeleteTimeline => "delete-timeline",
    GetTimelineEvents => "get-timeline-events",
    CreateTimelineEvent => "create-timeline-event",
    UpdateTimelineEvent => "update-timeline-event",
    DeleteTimelineEvent => "delete-timeline-event",
    GenerateCharacterResponse => "generate-character-response",
}

impl Display for CommandName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejection before any handler runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    UnknownCommand(String),
    /// Payload is not an object or a field has the wrong JSON type.
    InvalidPayload {
        command: CommandName,
        message: String,
    },
    Validation(ValidationError),
}

impl Display for CommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownCommand(name) => write!(f, "unknown command: {name}"),
            Self::InvalidPayload { command, message } => {
                write!(f, "invalid payload for {command}: {message}")
            }
            Self::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CommandError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for CommandError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServiceRequest {
    service: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SetApiKeyRequest {
    service: String,
    key: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IdRequest {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventIdRequest {
    id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProjectScope {
    project_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TimelineScope {
    timeline_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CharacterScope {
    character_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpdateRequest<P: Default> {
    id: String,
    data: P,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpdateEventRequest {
    id: Option<i64>,
    data: TimelineEventPatch,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GenerateRequest {
    character_id: String,
    prompt: String,
    conversation_style: ConversationStyle,
}

/// A validated, ready-to-run command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    GetAppInfo,
    SetApiKey { service: String, key: String },
    GetApiKey { service: String },
    HasApiKey { service: String },
    RemoveApiKey { service: String },
    ListProjects,
    GetProject { id: String },
    CreateProject(NewProject),
    UpdateProject { id: String, patch: ProjectPatch },
    DeleteProject { id: String },
    ListCharacters { project_id: Option<String> },
    GetCharacter { id: String },
    CreateCharacter(NewCharacter),
    UpdateCharacter { id: String, patch: CharacterPatch },
    DeleteCharacter { id: String },
    ListCharacterMemories { character_id: String },
    CreateCharacterMemory(NewCharacterMemory),
    DeleteCharacterMemory { id: String },
    GetNotes { project_id: Option<String> },
    CreateNote(NewNote),
    UpdateNote { id: String, patch: NotePatch },
    DeleteNote { id: String },
    ListTimelines { project_id: Option<String> },
    CreateTimeline(NewTimeline),
    UpdateTimeline { id: String, patch: TimelinePatch },
    DeleteTimeline { id: String },
    GetTimelineEvents { timeline_id: Option<String> },
    CreateTimelineEvent(NewTimelineEvent),
    UpdateTimelineEvent { id: i64, patch: TimelineEventPatch },
    DeleteTimelineEvent { id: i64 },
    GenerateCharacterResponse {
        character_id: String,
        prompt: String,
        style: ConversationStyle,
    },
}

impl Command {
    /// Parses and validates `payload` for the command called `name`.
    pub fn parse(name: &str, payload: Value) -> Result<Self, CommandError> {
        Self::from_payload(name.parse()?, payload)
    }

    pub fn from_payload(name: CommandName, payload: Value) -> Result<Self, CommandError> {
        let payload = normalize_payload(name, payload)?;
        let command = match name {
            CommandName::GetAppInfo => Self::GetAppInfo,
            CommandName::SetApiKey => {
                let request: SetApiKeyRequest = decode(name, payload)?;
                require("service", &request.service)?;
                require("key", &request.key)?;
                Self::SetApiKey {
                    service: request.service,
                    key: request.key,
                }
            }
            CommandName::GetApiKey => Self::GetApiKey {
                service: service(name, payload)?,
            },
            CommandName::HasApiKey => Self::HasApiKey {
                service: service(name, payload)?,
            },
            CommandName::RemoveApiKey => Self::RemoveApiKey {
                service: service(name, payload)?,
            },
            CommandName::ListProjects => Self::ListProjects,
            CommandName::GetProject => Self::GetProject {
                id: id(name, payload)?,
            },
            CommandName::CreateProject => {
                let input: NewProject = decode(name, payload)?;
                input.validate()?;
                Self::CreateProject(input)
            }
            CommandName::UpdateProject => {
                let request: UpdateRequest<ProjectPatch> = decode(name, payload)?;
                require("id", &request.id)?;
                request.data.validate()?;
                Self::UpdateProject {
                    id: request.id,
                    patch: request.data,
                }
            }
            CommandName::DeleteProject => Self::DeleteProject {
                id: id(name, payload)?,
            },
            CommandName::ListCharacters => Self::ListCharacters {
                project_id: project_scope(name, payload)?,
            },
            CommandName::GetCharacter => Self::GetCharacter {
                id: id(name, payload)?,
            },
            CommandName::CreateCharacter => {
                let input: NewCharacter = decode(name, payload)?;
                input.validate()?;
                Self::CreateCharacter(input)
            }
            CommandName::UpdateCharacter => {
                let request: UpdateRequest<CharacterPatch> = decode(name, payload)?;
                require("id", &request.id)?;
                request.data.validate()?;
                Self::UpdateCharacter {
                    id: request.id,
                    patch: request.data,
                }
            }
            CommandName::DeleteCharacter => Self::DeleteCharacter {
                id: id(name, payload)?,
            },
            CommandName::ListCharacterMemories => {
                let request: CharacterScope = decode(name, payload)?;
                require("characterId", &request.character_id)?;
                Self::ListCharacterMemories {
                    character_id: request.character_id,
                }
            }
            CommandName::CreateCharacterMemory => {
                let input: NewCharacterMemory = decode(name, payload)?;
                input.validate()?;
                Self::CreateCharacterMemory(input)
            }
            CommandName::DeleteCharacterMemory => Self::DeleteCharacterMemory {
                id: id(name, payload)?,
            },
            CommandName::GetNotes => Self::GetNotes {
                project_id: project_scope(name, payload)?,
            },
            CommandName::CreateNote => {
                let input: NewNote = decode(name, payload)?;
                input.validate()?;
                Self::CreateNote(input)
            }
            CommandName::UpdateNote => {
                let request: UpdateRequest<NotePatch> = decode(name, payload)?;
                require("id", &request.id)?;
                request.data.validate()?;
                Self::UpdateNote {
                    id: request.id,
                    patch: request.data,
                }
            }
            CommandName::DeleteNote => Self::DeleteNote {
                id: id(name, payload)?,
            },
            CommandName::ListTimelines => Self::ListTimelines {
                project_id: project_scope(name, payload)?,
            },
            CommandName::CreateTimeline => {
                let input: NewTimeline = decode(name, payload)?;
                input.validate()?;
                Self::CreateTimeline(input)
            }
            CommandName::UpdateTimeline => {
                let request: UpdateRequest<TimelinePatch> = decode(name, payload)?;
                require("id", &request.id)?;
                request.data.validate()?;
                Self::UpdateTimeline {
                    id: request.id,
                    patch: request.data,
                }
            }
            CommandName::DeleteTimeline => Self::DeleteTimeline {
                id: id(name, payload)?,
            },
            CommandName::GetTimelineEvents => {
                let request: TimelineScope = decode(name, payload)?;
                Self::GetTimelineEvents {
                    timeline_id: non_blank(request.timeline_id),
                }
            }
            CommandName::CreateTimelineEvent => {
                let mut input: NewTimelineEvent = decode(name, payload)?;
                input.validate()?;
                input.timeline_id = non_blank(input.timeline_id);
                Self::CreateTimelineEvent(input)
            }
            CommandName::UpdateTimelineEvent => {
                let request: UpdateEventRequest = decode(name, payload)?;
                let id = request.id.ok_or(ValidationError::Required("id"))?;
                request.data.validate()?;
                Self::UpdateTimelineEvent {
                    id,
                    patch: request.data,
                }
            }
            CommandName::DeleteTimelineEvent => {
                let request: EventIdRequest = decode(name, payload)?;
                Self::DeleteTimelineEvent {
                    id: request.id.ok_or(ValidationError::Required("id"))?,
                }
            }
            CommandName::GenerateCharacterResponse => {
                let request: GenerateRequest = decode(name, payload)?;
                require("characterId", &request.character_id)?;
                require("prompt", &request.prompt)?;
                Self::GenerateCharacterResponse {
                    character_id: request.character_id,
                    prompt: request.prompt,
                    style: request.conversation_style,
                }
            }
        };
        Ok(command)
    }

    pub fn name(&self) -> CommandName {
        match self {
            Self::GetAppInfo => CommandName::GetAppInfo,
            Self::SetApiKey { .. } => CommandName::SetApiKey,
            Self::GetApiKey { .. } => CommandName::GetApiKey,
            Self::HasApiKey { .. } => CommandName::HasApiKey,
            Self::RemoveApiKey { .. } => CommandName::RemoveApiKey,
            Self::ListProjects => CommandName::ListProjects,
            Self::GetProject { .. } => CommandName::GetProject,
            Self::CreateProject(_) => CommandName::CreateProject,
            Self::UpdateProject { .. } => CommandName::UpdateProject,
            Self::DeleteProject { .. } => CommandName::DeleteProject,
            Self::ListCharacters { .. } => CommandName::ListCharacters,
            Self::GetCharacter { .. } => CommandName::GetCharacter,
            Self::CreateCharacter(_) => CommandName::CreateCharacter,
            Self::UpdateCharacter { .. } => CommandName::UpdateCharacter,
            Self::DeleteCharacter { .. } => CommandName::DeleteCharacter,
            Self::ListCharacterMemories { .. } => CommandName::ListCharacterMemories,
            Self::CreateCharacterMemory(_) => CommandName::CreateCharacterMemory,
            Self::DeleteCharacterMemory { .. } => CommandName::DeleteCharacterMemory,
            Self::GetNotes { .. } => CommandName::GetNotes,
            Self::CreateNote(_) => CommandName::CreateNote,
            Self::UpdateNote { .. } => CommandName::UpdateNote,
            Self::DeleteNote { .. } => CommandName::DeleteNote,
            Self::ListTimelines { .. } => CommandName::ListTimelines,
            Self::CreateTimeline(_) => CommandName::CreateTimeline,
            Self::UpdateTimeline { .. } => CommandName::UpdateTimeline,
            Self::DeleteTimeline { .. } => CommandName::DeleteTimeline,
            Self::GetTimelineEvents { .. } => CommandName::GetTimelineEvents,
            Self::CreateTimelineEvent(_) => CommandName::CreateTimelineEvent,
            Self::UpdateTimelineEvent { .. } => CommandName::UpdateTimelineEvent,
            Self::DeleteTimelineEvent { .. } => CommandName::DeleteTimelineEvent,
            Self::GenerateCharacterResponse { .. } => CommandName::GenerateCharacterResponse,
        }
    }
}

fn normalize_payload(name: CommandName, payload: Value) -> Result<Value, CommandError> {
    match payload {
        Value::Null => Ok(Value::Object(Map::new())),
        Value::Object(_) => Ok(payload),
        _ => Err(CommandError::InvalidPayload {
            command: name,
            message: "payload must be a JSON object".to_string(),
        }),
    }
}

fn decode<T: DeserializeOwned>(name: CommandName, payload: Value) -> Result<T, CommandError> {
    serde_json::from_value(payload).map_err(|err| CommandError::InvalidPayload {
        command: name,
        message: err.to_string(),
    })
}

fn service(name: CommandName, payload: Value) -> Result<String, CommandError> {
    let request: ServiceRequest = decode(name, payload)?;
    require("service", &request.service)?;
    Ok(request.service)
}

fn id(name: CommandName, payload: Value) -> Result<String, CommandError> {
    let request: IdRequest = decode(name, payload)?;
    require("id", &request.id)?;
    Ok(request.id)
}

fn project_scope(name: CommandName, payload: Value) -> Result<Option<String>, CommandError> {
    let request: ProjectScope = decode(name, payload)?;
    Ok(non_blank(request.project_id))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
