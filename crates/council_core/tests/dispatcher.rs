use council_core::model::record::{
    Character, CharacterMemory, CharacterPatch, NewCharacter, NewCharacterMemory, NewNote,
    NewProject, NewTimeline, NewTimelineEvent, Note, NotePatch, Project, ProjectPatch, Timeline,
    TimelineEvent, TimelineEventPatch, TimelinePatch,
};
use council_core::repo::record_repo::{
    CharacterRepository, NoteRepository, ProjectRepository, RepoResult, TimelineRepository,
};
use council_core::vault::cipher::SecretCipher;
use council_core::{
    CredentialStore, CredentialStoreError, Dispatcher, Envelope, MemoryCredentialStore,
    SqliteRecordStore, Vault,
};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static CIPHER: Lazy<SecretCipher> =
    Lazy::new(|| SecretCipher::derive("dispatcher-test-secret").unwrap());

/// Credential store that counts every call.
#[derive(Default)]
struct CountingStore {
    inner: MemoryCredentialStore,
    calls: AtomicUsize,
}

impl CredentialStore for CountingStore {
    fn get(&self, namespace: &str, account: &str) -> Result<Option<String>, CredentialStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get(namespace, account)
    }

    fn set(&self, namespace: &str, account: &str, secret: &str) -> Result<(), CredentialStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.set(namespace, account, secret)
    }

    fn delete(&self, namespace: &str, account: &str) -> Result<bool, CredentialStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(namespace, account)
    }
}

/// Record store that counts every call before delegating to SQLite.
struct SpyRecords {
    inner: SqliteRecordStore,
    calls: Arc<AtomicUsize>,
}

impl SpyRecords {
    fn hit(&self) -> &SqliteRecordStore {
        self.calls.fetch_add(1, Ordering::SeqCst);
        &self.inner
    }
}

impl ProjectRepository for SpyRecords {
    fn create_project(&self, input: &NewProject) -> RepoResult<Project> {
        self.hit().create_project(input)
    }
    fn get_project(&self, id: &str) -> RepoResult<Option<Project>> {
        self.hit().get_project(id)
    }
    fn list_projects(&self) -> RepoResult<Vec<Project>> {
        self.hit().list_projects()
    }
    fn update_project(&self, id: &str, patch: &ProjectPatch) -> RepoResult<Project> {
        self.hit().update_project(id, patch)
    }
    fn delete_project(&self, id: &str) -> RepoResult<()> {
        self.hit().delete_project(id)
    }
}

impl CharacterRepository for SpyRecords {
    fn create_character(&self, input: &NewCharacter) -> RepoResult<Character> {
        self.hit().create_character(input)
    }
    fn get_character(&self, id: &str) -> RepoResult<Option<Character>> {
        self.hit().get_character(id)
    }
    fn list_characters(&self, project_id: Option<&str>) -> RepoResult<Vec<Character>> {
        self.hit().list_characters(project_id)
    }
    fn update_character(&self, id: &str, patch: &CharacterPatch) -> RepoResult<Character> {
        self.hit().update_character(id, patch)
    }
    fn delete_character(&self, id: &str) -> RepoResult<()> {
        self.hit().delete_character(id)
    }
    fn create_memory(&self, input: &NewCharacterMemory) -> RepoResult<CharacterMemory> {
        self.hit().create_memory(input)
    }
    fn list_memories(
        &self,
        character_id: &str,
        limit: Option<u32>,
    ) -> RepoResult<Vec<CharacterMemory>> {
        self.hit().list_memories(character_id, limit)
    }
    fn delete_memory(&self, id: &str) -> RepoResult<()> {
        self.hit().delete_memory(id)
    }
}

impl NoteRepository for SpyRecords {
    fn create_note(&self, input: &NewNote) -> RepoResult<Note> {
        self.hit().create_note(input)
    }
    fn get_note(&self, id: &str) -> RepoResult<Option<Note>> {
        self.hit().get_note(id)
    }
    fn list_notes(&self, project_id: Option<&str>) -> RepoResult<Vec<Note>> {
        self.hit().list_notes(project_id)
    }
    fn update_note(&self, id: &str, patch: &NotePatch) -> RepoResult<Note> {
        self.hit().update_note(id, patch)
    }
    fn delete_note(&self, id: &str) -> RepoResult<()> {
        self.hit().delete_note(id)
    }
}

impl TimelineRepository for SpyRecords {
    fn create_timeline(&self, input: &NewTimeline) -> RepoResult<Timeline> {
        self.hit().create_timeline(input)
    }
    fn get_timeline(&self, id: &str) -> RepoResult<Option<Timeline>> {
        self.hit().get_timeline(id)
    }
    fn list_timelines(&self, project_id: Option<&str>) -> RepoResult<Vec<Timeline>> {
        self.hit().list_timelines(project_id)
    }
    fn update_timeline(&self, id: &str, patch: &TimelinePatch) -> RepoResult<Timeline> {
        self.hit().update_timeline(id, patch)
    }
    fn delete_timeline(&self, id: &str) -> RepoResult<()> {
        self.hit().delete_timeline(id)
    }
    fn create_event(&self, input: &NewTimelineEvent) -> RepoResult<TimelineEvent> {
        self.hit().create_event(input)
    }
    fn get_event(&self, id: i64) -> RepoResult<Option<TimelineEvent>> {
        self.hit().get_event(id)
    }
    fn list_events(&self, timeline_id: Option<&str>) -> RepoResult<Vec<TimelineEvent>> {
        self.hit().list_events(timeline_id)
    }
    fn update_event(&self, id: i64, patch: &TimelineEventPatch) -> RepoResult<TimelineEvent> {
        self.hit().update_event(id, patch)
    }
    fn delete_event(&self, id: i64) -> RepoResult<()> {
        self.hit().delete_event(id)
    }
}

struct Harness {
    dispatcher: Dispatcher<Arc<CountingStore>, SpyRecords>,
    vault_calls: Arc<CountingStore>,
    record_calls: Arc<AtomicUsize>,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(CountingStore::default());
        let record_calls = Arc::new(AtomicUsize::new(0));
        let records = SpyRecords {
            inner: SqliteRecordStore::open_in_memory().unwrap(),
            calls: Arc::clone(&record_calls),
        };
        let vault = Vault::with_cipher(Arc::clone(&store), CIPHER.clone());
        Self {
            dispatcher: Dispatcher::new(vault, records),
            vault_calls: store,
            record_calls,
        }
    }

    fn ok(&self, command: &str, payload: Value) -> Option<Value> {
        match self.dispatcher.dispatch(command, payload) {
            Envelope::Success { data } => data,
            Envelope::Failure { error } => panic!("{command} failed: {error}"),
        }
    }

    fn err(&self, command: &str, payload: Value) -> String {
        match self.dispatcher.dispatch(command, payload) {
            Envelope::Success { data } => panic!("{command} unexpectedly succeeded: {data:?}"),
            Envelope::Failure { error } => error,
        }
    }

    fn collaborator_calls(&self) -> usize {
        self.vault_calls.calls.load(Ordering::SeqCst) + self.record_calls.load(Ordering::SeqCst)
    }
}

#[test]
fn get_app_info_without_payload_reports_metadata() {
    let harness = Harness::new();
    let envelope = harness.dispatcher.dispatch("get-app-info", Value::Null);
    let wire = serde_json::to_value(&envelope).unwrap();

    assert_eq!(wire["success"], json!(true));
    for field in ["version", "name", "platform"] {
        assert!(
            wire["data"][field].as_str().is_some_and(|value| !value.is_empty()),
            "{field} missing in {wire}"
        );
    }
    assert_eq!(harness.collaborator_calls(), 0);
}

#[test]
fn validation_failures_never_reach_collaborators() {
    let harness = Harness::new();
    let cases = [
        ("set-api-key", json!({}), "service is required"),
        ("set-api-key", json!({"service": "openai"}), "key is required"),
        ("set-api-key", json!({"service": "openai", "key": ""}), "key is required"),
        ("get-api-key", Value::Null, "service is required"),
        ("has-api-key", json!({"service": "  "}), "service is required"),
        ("remove-api-key", json!({}), "service is required"),
        ("get-project", json!({}), "id is required"),
        ("create-project", json!({"description": "no name"}), "name is required"),
        ("create-character", json!({"name": "Elara"}), "projectId is required"),
        ("update-character", json!({"data": {"name": "Elara"}}), "id is required"),
        ("create-character-memory", json!({"characterId": "c1"}), "content is required"),
        ("list-character-memories", json!({}), "characterId is required"),
        ("create-note", json!({"projectId": "p1"}), "title is required"),
        ("create-timeline", json!({"projectId": "p1"}), "name is required"),
        ("create-timeline-event", json!({"description": "x"}), "date is required"),
        ("update-timeline-event", json!({"data": {}}), "id is required"),
        ("delete-timeline-event", json!({}), "id is required"),
        ("generate-character-response", json!({"prompt": "hi"}), "characterId is required"),
    ];

    for (command, payload, expected) in cases {
        assert_eq!(harness.err(command, payload), expected, "{command}");
    }
    assert_eq!(harness.collaborator_calls(), 0);
}

#[test]
fn api_key_commands_round_trip_through_the_vault() {
    let harness = Harness::new();

    let stored = harness.dispatcher.dispatch(
        "set-api-key",
        json!({"service": "openai", "key": "sk-abc123"}),
    );
    assert_eq!(
        serde_json::to_value(&stored).unwrap(),
        json!({"success": true})
    );
    assert_eq!(
        harness.ok("has-api-key", json!({"service": "openai"})),
        Some(json!({"hasKey": true}))
    );
    assert_eq!(
        harness.ok("get-api-key", json!({"service": "openai"})),
        Some(json!({"key": "sk-abc123"}))
    );

    harness.ok("remove-api-key", json!({"service": "openai"}));
    assert_eq!(
        harness.ok("has-api-key", json!({"service": "openai"})),
        Some(json!({"hasKey": false}))
    );
    assert_eq!(
        harness.ok("get-api-key", json!({"service": "openai"})),
        Some(json!({"key": null}))
    );
}

#[test]
fn collaborator_errors_become_failure_envelopes() {
    let harness = Harness::new();

    let invalid = harness.err("set-api-key", json!({"service": "open ai", "key": "sk"}));
    assert!(invalid.starts_with("invalid service"), "{invalid}");

    harness
        .dispatcher
        .vault()
        .store("anthropic", "sk-ant")
        .unwrap();
    let raw = serde_json::json!({"version": 1, "ciphertext": "AAAA.AAAA"}).to_string();
    harness
        .vault_calls
        .set(harness.dispatcher.vault().namespace(), "anthropic", &raw)
        .unwrap();
    let corrupt = harness.err("get-api-key", json!({"service": "anthropic"}));
    assert!(corrupt.contains("initialization vector not found"), "{corrupt}");
    assert_eq!(
        harness.ok("has-api-key", json!({"service": "anthropic"})),
        Some(json!({"hasKey": false}))
    );
}

#[test]
fn unknown_commands_and_malformed_payloads_are_rejected() {
    let harness = Harness::new();
    assert_eq!(
        harness.err("launch-missiles", json!({})),
        "unknown command: launch-missiles"
    );
    let malformed = harness.err("create-project", json!("Starfall"));
    assert!(
        malformed.starts_with("invalid payload for create-project"),
        "{malformed}"
    );
    assert_eq!(harness.collaborator_calls(), 0);
}

#[test]
fn record_commands_cover_project_lifecycle() {
    let harness = Harness::new();
    let project = harness
        .ok("create-project", json!({"name": "Starfall Chronicles"}))
        .unwrap();
    let project_id = project["id"].as_str().unwrap().to_string();

    let character = harness
        .ok(
            "create-character",
            json!({
                "projectId": project_id,
                "name": "Captain Elara",
                "traits": "Determined, Loyal",
                "voicePatterns": "Direct"
            }),
        )
        .unwrap();
    let character_id = character["id"].as_str().unwrap().to_string();
    assert_eq!(character["voicePatterns"], json!("Direct"));

    let updated = harness
        .ok(
            "update-character",
            json!({"id": character_id, "data": {"values": "Honor, Duty"}}),
        )
        .unwrap();
    assert_eq!(updated["values"], json!("Honor, Duty"));
    assert_eq!(updated["traits"], json!("Determined, Loyal"));

    let listed = harness
        .ok("list-characters", json!({"projectId": project_id}))
        .unwrap();
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    harness.ok(
        "create-note",
        json!({"projectId": project_id, "title": "Lore", "content": "Crystals", "tags": "lore"}),
    );
    let notes = harness.ok("get-notes", json!({"projectId": project_id})).unwrap();
    assert_eq!(notes[0]["tags"], json!("lore"));

    harness.ok("delete-project", json!({"id": project_id}));
    assert_eq!(
        harness.err("get-character", json!({"id": character_id})),
        format!("character not found: {character_id}")
    );
    assert_eq!(
        harness.err("delete-project", json!({"id": project_id})),
        format!("project not found: {project_id}")
    );
}

#[test]
fn timeline_event_commands_use_numeric_ids() {
    let harness = Harness::new();
    let event = harness
        .ok(
            "create-timeline-event",
            json!({"date": "2025-04-15", "description": "Battle of Proxima"}),
        )
        .unwrap();
    let id = event["id"].as_i64().unwrap();
    assert_eq!(event["charactersInvolved"], json!(""));

    let updated = harness
        .ok(
            "update-timeline-event",
            json!({"id": id, "data": {"charactersInvolved": "Captain Elara"}}),
        )
        .unwrap();
    assert_eq!(updated["charactersInvolved"], json!("Captain Elara"));

    let bad_date = harness.err(
        "update-timeline-event",
        json!({"id": id, "data": {"date": "someday"}}),
    );
    assert!(bad_date.starts_with("date must be"), "{bad_date}");

    harness.ok("delete-timeline-event", json!({"id": id}));
    assert_eq!(
        harness.ok("get-timeline-events", Value::Null),
        Some(json!([]))
    );
}

#[test]
fn generated_responses_follow_configured_provider() {
    let harness = Harness::new();
    let project = harness.ok("create-project", json!({"name": "Starfall"})).unwrap();
    let character = harness
        .ok(
            "create-character",
            json!({
                "projectId": project["id"],
                "name": "Captain Elara",
                "traits": "Determined, Loyal, Strategic",
                "values": "Honor"
            }),
        )
        .unwrap();
    harness.ok(
        "create-character-memory",
        json!({"characterId": character["id"], "content": "Lost my first ship", "importance": 5}),
    );

    let local = harness
        .ok(
            "generate-character-response",
            json!({"characterId": character["id"], "prompt": "abcd"}),
        )
        .unwrap();
    assert_eq!(local["provider"], json!("local"));
    assert_eq!(
        local["response"],
        json!("As Captain Elara, I would say that's an interesting question.")
    );

    harness.ok("set-api-key", json!({"service": "anthropic", "key": "sk-ant"}));
    let anthropic = harness
        .ok(
            "generate-character-response",
            json!({
                "characterId": character["id"],
                "prompt": "What is your goal?",
                "conversationStyle": "detailed"
            }),
        )
        .unwrap();
    assert_eq!(anthropic["provider"], json!("anthropic"));
    let text = anthropic["response"].as_str().unwrap();
    assert!(text.starts_with("My current mission"), "{text}");
    assert!(text.contains("I still remember: Lost my first ship."), "{text}");

    harness.ok("set-api-key", json!({"service": "openai", "key": "sk-abc"}));
    let openai = harness
        .ok(
            "generate-character-response",
            json!({"characterId": character["id"], "prompt": "How do you feel?"}),
        )
        .unwrap();
    assert_eq!(openai["provider"], json!("openai"));

    assert_eq!(
        harness.err(
            "generate-character-response",
            json!({"characterId": "ghost", "prompt": "hello"})
        ),
        "character not found: ghost"
    );
}
