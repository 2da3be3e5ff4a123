//! Command dispatcher.
//!
//! # Responsibility
//! - Route validated commands to the vault, the record store and the
//!   dialogue service.
//! - Convert every collaborator failure into a failure envelope.
//!
//! # Invariants
//! - A command rejected during parsing never reaches a collaborator.
//! - Payloads, keys and generated text are never logged; command names,
//!   outcomes and durations are.
//! - `dispatch` never panics on caller input and never returns `Err`.

use crate::dispatch::command::{Command, CommandError, CommandName};
use crate::dispatch::envelope::Envelope;
use crate::logging::sanitize_message;
use crate::repo::record_repo::{RecordStore, RepoError};
use crate::service::dialogue_service::{DialogueProvider, DialogueService, MEMORY_CONTEXT_LIMIT};
use crate::vault::api_key_vault::{Vault, VaultError};
use crate::vault::credential_store::CredentialStore;
use log::{error, info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub const APP_NAME: &str = "ai-character-council";

/// Payload of `get-app-info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppInfo {
    pub version: String,
    pub name: String,
    pub platform: String,
}

impl AppInfo {
    /// Build metadata of this binary on the running OS.
    pub fn current() -> Self {
        Self {
            version: crate::core_version().to_string(),
            name: APP_NAME.to_string(),
            platform: std::env::consts::OS.to_string(),
        }
    }
}

/// Collaborator failure while running a command.
#[derive(Debug)]
pub enum DispatchError {
    Vault(VaultError),
    Repo(RepoError),
    Encode(serde_json::Error),
}

impl DispatchError {
    fn code(&self) -> &'static str {
        match self {
            Self::Vault(_) => "vault_failed",
            Self::Repo(RepoError::NotFound { .. }) => "not_found",
            Self::Repo(_) => "repo_failed",
            Self::Encode(_) => "encode_failed",
        }
    }
}

impl Display for DispatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vault(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Encode(err) => write!(f, "failed to encode response: {err}"),
        }
    }
}

impl Error for DispatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Vault(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Encode(err) => Some(err),
        }
    }
}

impl From<VaultError> for DispatchError {
    fn from(value: VaultError) -> Self {
        Self::Vault(value)
    }
}

impl From<RepoError> for DispatchError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

type HandlerResult = Result<Option<Value>, DispatchError>;

/// Fixed command table over injected collaborators.
pub struct Dispatcher<S: CredentialStore, R: RecordStore> {
    vault: Vault<S>,
    records: R,
    dialogue: DialogueService,
    app_info: AppInfo,
}

impl<S: CredentialStore, R: RecordStore> Dispatcher<S, R> {
    pub fn new(vault: Vault<S>, records: R) -> Self {
        Self {
            vault,
            records,
            dialogue: DialogueService::new(),
            app_info: AppInfo::current(),
        }
    }

    pub fn with_app_info(mut self, app_info: AppInfo) -> Self {
        self.app_info = app_info;
        self
    }

    pub fn vault(&self) -> &Vault<S> {
        &self.vault
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    /// Parses, validates and runs one named command.
    pub fn dispatch(&self, name: &str, payload: Value) -> Envelope<Value> {
        match Command::parse(name, payload) {
            Ok(command) => self.execute(command),
            Err(err) => {
                let command = match &err {
                    CommandError::UnknownCommand(name) => sanitize_message(name, 64),
                    CommandError::InvalidPayload { command, .. } => command.to_string(),
                    CommandError::Validation(_) => name.to_string(),
                };
                warn!(
                    "event=command module=dispatch status=rejected command={command} error_code={}",
                    rejection_code(&err)
                );
                Envelope::err(err.to_string())
            }
        }
    }

    /// Runs an already validated command.
    pub fn execute(&self, command: Command) -> Envelope<Value> {
        let name = command.name();
        let started_at = Instant::now();
        match self.handle(command) {
            Ok(data) => {
                info!(
                    "event=command module=dispatch status=ok command={name} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Envelope::Success { data }
            }
            Err(err) => {
                error!(
                    "event=command module=dispatch status=error command={name} duration_ms={} error_code={} error={}",
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err
                );
                Envelope::err(err.to_string())
            }
        }
    }

    fn handle(&self, command: Command) -> HandlerResult {
        match command {
            Command::GetAppInfo => data(&self.app_info),
            Command::SetApiKey { service, key } => {
                self.vault.store(&service, &key)?;
                Ok(None)
            }
            Command::GetApiKey { service } => {
                let key = self.vault.retrieve(&service)?;
                Ok(Some(json!({ "key": key })))
            }
            Command::HasApiKey { service } => {
                Ok(Some(json!({ "hasKey": self.vault.exists(&service) })))
            }
            Command::RemoveApiKey { service } => {
                self.vault.remove(&service)?;
                Ok(None)
            }

            Command::ListProjects => data(self.records.list_projects()?),
            Command::GetProject { id } => {
                let project = self.records.get_project(&id)?;
                data(project.ok_or_else(|| RepoError::not_found("project", &id))?)
            }
            Command::CreateProject(input) => data(self.records.create_project(&input)?),
            Command::UpdateProject { id, patch } => {
                data(self.records.update_project(&id, &patch)?)
            }
            Command::DeleteProject { id } => {
                self.records.delete_project(&id)?;
                Ok(None)
            }

            Command::ListCharacters { project_id } => {
                data(self.records.list_characters(project_id.as_deref())?)
            }
            Command::GetCharacter { id } => {
                let character = self.records.get_character(&id)?;
                data(character.ok_or_else(|| RepoError::not_found("character", &id))?)
            }
            Command::CreateCharacter(input) => data(self.records.create_character(&input)?),
            Command::UpdateCharacter { id, patch } => {
                data(self.records.update_character(&id, &patch)?)
            }
            Command::DeleteCharacter { id } => {
                self.records.delete_character(&id)?;
                Ok(None)
            }
            Command::ListCharacterMemories { character_id } => {
                data(self.records.list_memories(&character_id, None)?)
            }
            Command::CreateCharacterMemory(input) => data(self.records.create_memory(&input)?),
            Command::DeleteCharacterMemory { id } => {
                self.records.delete_memory(&id)?;
                Ok(None)
            }

            Command::GetNotes { project_id } => {
                data(self.records.list_notes(project_id.as_deref())?)
            }
            Command::CreateNote(input) => data(self.records.create_note(&input)?),
            Command::UpdateNote { id, patch } => data(self.records.update_note(&id, &patch)?),
            Command::DeleteNote { id } => {
                self.records.delete_note(&id)?;
                Ok(None)
            }

            Command::ListTimelines { project_id } => {
                data(self.records.list_timelines(project_id.as_deref())?)
            }
            Command::CreateTimeline(input) => data(self.records.create_timeline(&input)?),
            Command::UpdateTimeline { id, patch } => {
                data(self.records.update_timeline(&id, &patch)?)
            }
            Command::DeleteTimeline { id } => {
                self.records.delete_timeline(&id)?;
                Ok(None)
            }
            Command::GetTimelineEvents { timeline_id } => {
                data(self.records.list_events(timeline_id.as_deref())?)
            }
            Command::CreateTimelineEvent(input) => data(self.records.create_event(&input)?),
            Command::UpdateTimelineEvent { id, patch } => {
                data(self.records.update_event(id, &patch)?)
            }
            Command::DeleteTimelineEvent { id } => {
                self.records.delete_event(id)?;
                Ok(None)
            }

            Command::GenerateCharacterResponse {
                character_id,
                prompt,
                style,
            } => {
                let character = self
                    .records
                    .get_character(&character_id)?
                    .ok_or_else(|| RepoError::not_found("character", &character_id))?;
                let memories = self
                    .records
                    .list_memories(&character_id, Some(MEMORY_CONTEXT_LIMIT))?;
                let provider = DialogueProvider::select(|service| self.vault.exists(service));
                let response =
                    self.dialogue
                        .generate(&character, &prompt, &memories, style, provider);
                Ok(Some(json!({ "response": response, "provider": provider })))
            }
        }
    }
}

fn data<T: Serialize>(value: T) -> HandlerResult {
    Ok(Some(serde_json::to_value(value)?))
}

fn rejection_code(err: &CommandError) -> &'static str {
    match err {
        CommandError::UnknownCommand(_) => "unknown_command",
        CommandError::InvalidPayload { .. } => "invalid_payload",
        CommandError::Validation(_) => "validation_failed",
    }
}

/// Names of every dispatchable command, in table order.
pub fn command_names() -> impl Iterator<Item = &'static str> {
    CommandName::ALL.iter().map(|name| name.as_str())
}
