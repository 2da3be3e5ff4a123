//! SQLite-backed record store.
//!
//! # Responsibility
//! - Implement every record repository over one migrated connection.
//! - Map missing rows and missing parents to `RepoError::NotFound`.
//!
//! # Invariants
//! - The connection is used by one caller at a time (mutex-guarded).
//! - Writes refresh `updated_at` in epoch milliseconds.
//! - Partial updates only touch fields present in the patch.

use crate::db::{open_db, open_db_in_memory};
use crate::model::record::{
    Character, CharacterMemory, CharacterPatch, MemoryType, NewCharacter, NewCharacterMemory,
    NewNote, NewProject, NewTimeline, NewTimelineEvent, Note, NotePatch, Project, ProjectPatch,
    Timeline, TimelineEvent, TimelineEventPatch, TimelinePatch,
};
use crate::repo::record_repo::{
    CharacterRepository, NoteRepository, ProjectRepository, RepoError, RepoResult,
    TimelineRepository,
};
use rusqlite::{params, Connection, Params, Row};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

const PROJECT_SELECT_SQL: &str =
    "SELECT id, name, description, created_at, updated_at FROM projects";
const CHARACTER_SELECT_SQL: &str = r#"SELECT
    id, project_id, name, description, traits, "values", voice_patterns, created_at, updated_at
FROM characters"#;
const MEMORY_SELECT_SQL: &str =
    "SELECT id, character_id, content, memory_type, importance, created_at FROM character_memories";
const NOTE_SELECT_SQL: &str =
    "SELECT id, project_id, title, content, tags, created_at, updated_at FROM notes";
const TIMELINE_SELECT_SQL: &str =
    "SELECT id, project_id, name, description, created_at, updated_at FROM timelines";
const EVENT_SELECT_SQL: &str = "SELECT
    id, timeline_id, date, description, characters_involved, created_at, updated_at
FROM timeline_events";

/// SQL expression for the current time in epoch milliseconds.
const NOW_MS_SQL: &str = "CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)";

/// Record store over a single SQLite connection.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Opens (and migrates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    pub fn open_in_memory() -> RepoResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps a connection that already went through `open_db*`.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> RepoResult<T>) -> RepoResult<T> {
        let conn = self.conn.lock().map_err(|_| RepoError::LockPoisoned)?;
        f(&conn)
    }
}

impl ProjectRepository for SqliteRecordStore {
    fn create_project(&self, input: &NewProject) -> RepoResult<Project> {
        self.with_conn(|conn| {
            let id = new_id();
            conn.execute(
                "INSERT INTO projects (id, name, description) VALUES (?1, ?2, ?3);",
                params![id, input.name.trim(), input.description],
            )?;
            read_back(select_project(conn, &id)?, "project")
        })
    }

    fn get_project(&self, id: &str) -> RepoResult<Option<Project>> {
        self.with_conn(|conn| select_project(conn, id))
    }

    fn list_projects(&self) -> RepoResult<Vec<Project>> {
        self.with_conn(|conn| {
            query_all(
                conn,
                &format!("{PROJECT_SELECT_SQL} ORDER BY updated_at DESC, id ASC;"),
                [],
                parse_project_row,
            )
        })
    }

    fn update_project(&self, id: &str, patch: &ProjectPatch) -> RepoResult<Project> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE projects
                     SET
                        name = COALESCE(?2, name),
                        description = COALESCE(?3, description),
                        updated_at = {NOW_MS_SQL}
                     WHERE id = ?1;"
                ),
                params![id, patch.name.as_deref().map(str::trim), patch.description],
            )?;
            ensure_changed(changed, "project", id)?;
            read_back(select_project(conn, id)?, "project")
        })
    }

    fn delete_project(&self, id: &str) -> RepoResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM projects WHERE id = ?1;", [id])?;
            ensure_changed(changed, "project", id)
        })
    }
}

impl CharacterRepository for SqliteRecordStore {
    fn create_character(&self, input: &NewCharacter) -> RepoResult<Character> {
        self.with_conn(|conn| {
            ensure_exists(conn, "projects", "project", &input.project_id)?;
            let id = new_id();
            conn.execute(
                r#"INSERT INTO characters (
                    id, project_id, name, description, traits, "values", voice_patterns
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);"#,
                params![
                    id,
                    input.project_id,
                    input.name.trim(),
                    input.description,
                    input.traits,
                    input.values,
                    input.voice_patterns,
                ],
            )?;
            read_back(select_character(conn, &id)?, "character")
        })
    }

    fn get_character(&self, id: &str) -> RepoResult<Option<Character>> {
        self.with_conn(|conn| select_character(conn, id))
    }

    fn list_characters(&self, project_id: Option<&str>) -> RepoResult<Vec<Character>> {
        self.with_conn(|conn| {
            query_all(
                conn,
                &format!(
                    "{CHARACTER_SELECT_SQL}
                     WHERE (?1 IS NULL OR project_id = ?1)
                     ORDER BY name COLLATE NOCASE ASC, id ASC;"
                ),
                params![project_id],
                parse_character_row,
            )
        })
    }

    fn update_character(&self, id: &str, patch: &CharacterPatch) -> RepoResult<Character> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                &format!(
                    r#"UPDATE characters
                     SET
                        name = COALESCE(?2, name),
                        description = COALESCE(?3, description),
                        traits = COALESCE(?4, traits),
                        "values" = COALESCE(?5, "values"),
                        voice_patterns = COALESCE(?6, voice_patterns),
                        updated_at = {NOW_MS_SQL}
                     WHERE id = ?1;"#
                ),
                params![
                    id,
                    patch.name.as_deref().map(str::trim),
                    patch.description,
                    patch.traits,
                    patch.values,
                    patch.voice_patterns,
                ],
            )?;
            ensure_changed(changed, "character", id)?;
            read_back(select_character(conn, id)?, "character")
        })
    }

    fn delete_character(&self, id: &str) -> RepoResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM characters WHERE id = ?1;", [id])?;
            ensure_changed(changed, "character", id)
        })
    }

    fn create_memory(&self, input: &NewCharacterMemory) -> RepoResult<CharacterMemory> {
        self.with_conn(|conn| {
            ensure_exists(conn, "characters", "character", &input.character_id)?;
            let id = new_id();
            conn.execute(
                "INSERT INTO character_memories (id, character_id, content, memory_type, importance)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    id,
                    input.character_id,
                    input.content.trim(),
                    input.memory_type.as_str(),
                    input.importance,
                ],
            )?;
            let memory = query_one(
                conn,
                &format!("{MEMORY_SELECT_SQL} WHERE id = ?1;"),
                [&id],
                parse_memory_row,
            )?;
            read_back(memory, "memory")
        })
    }

    fn list_memories(
        &self,
        character_id: &str,
        limit: Option<u32>,
    ) -> RepoResult<Vec<CharacterMemory>> {
        self.with_conn(|conn| {
            query_all(
                conn,
                &format!(
                    "{MEMORY_SELECT_SQL}
                     WHERE character_id = ?1
                     ORDER BY importance DESC, created_at DESC, id ASC
                     LIMIT ?2;"
                ),
                params![character_id, limit.map_or(-1, i64::from)],
                parse_memory_row,
            )
        })
    }

    fn delete_memory(&self, id: &str) -> RepoResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM character_memories WHERE id = ?1;", [id])?;
            ensure_changed(changed, "memory", id)
        })
    }
}

impl NoteRepository for SqliteRecordStore {
    fn create_note(&self, input: &NewNote) -> RepoResult<Note> {
        self.with_conn(|conn| {
            ensure_exists(conn, "projects", "project", &input.project_id)?;
            let id = new_id();
            conn.execute(
                "INSERT INTO notes (id, project_id, title, content, tags)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    id,
                    input.project_id,
                    input.title.trim(),
                    input.content,
                    input.tags,
                ],
            )?;
            read_back(select_note(conn, &id)?, "note")
        })
    }

    fn get_note(&self, id: &str) -> RepoResult<Option<Note>> {
        self.with_conn(|conn| select_note(conn, id))
    }

    fn list_notes(&self, project_id: Option<&str>) -> RepoResult<Vec<Note>> {
        self.with_conn(|conn| {
            query_all(
                conn,
                &format!(
                    "{NOTE_SELECT_SQL}
                     WHERE (?1 IS NULL OR project_id = ?1)
                     ORDER BY created_at DESC, id ASC;"
                ),
                params![project_id],
                parse_note_row,
            )
        })
    }

    fn update_note(&self, id: &str, patch: &NotePatch) -> RepoResult<Note> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE notes
                     SET
                        title = COALESCE(?2, title),
                        content = COALESCE(?3, content),
                        tags = COALESCE(?4, tags),
                        updated_at = {NOW_MS_SQL}
                     WHERE id = ?1;"
                ),
                params![
                    id,
                    patch.title.as_deref().map(str::trim),
                    patch.content,
                    patch.tags,
                ],
            )?;
            ensure_changed(changed, "note", id)?;
            read_back(select_note(conn, id)?, "note")
        })
    }

    fn delete_note(&self, id: &str) -> RepoResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM notes WHERE id = ?1;", [id])?;
            ensure_changed(changed, "note", id)
        })
    }
}

impl TimelineRepository for SqliteRecordStore {
    fn create_timeline(&self, input: &NewTimeline) -> RepoResult<Timeline> {
        self.with_conn(|conn| {
            ensure_exists(conn, "projects", "project", &input.project_id)?;
            let id = new_id();
            conn.execute(
                "INSERT INTO timelines (id, project_id, name, description) VALUES (?1, ?2, ?3, ?4);",
                params![id, input.project_id, input.name.trim(), input.description],
            )?;
            read_back(select_timeline(conn, &id)?, "timeline")
        })
    }

    fn get_timeline(&self, id: &str) -> RepoResult<Option<Timeline>> {
        self.with_conn(|conn| select_timeline(conn, id))
    }

    fn list_timelines(&self, project_id: Option<&str>) -> RepoResult<Vec<Timeline>> {
        self.with_conn(|conn| {
            query_all(
                conn,
                &format!(
                    "{TIMELINE_SELECT_SQL}
                     WHERE (?1 IS NULL OR project_id = ?1)
                     ORDER BY name COLLATE NOCASE ASC, id ASC;"
                ),
                params![project_id],
                parse_timeline_row,
            )
        })
    }

    fn update_timeline(&self, id: &str, patch: &TimelinePatch) -> RepoResult<Timeline> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE timelines
                     SET
                        name = COALESCE(?2, name),
                        description = COALESCE(?3, description),
                        updated_at = {NOW_MS_SQL}
                     WHERE id = ?1;"
                ),
                params![id, patch.name.as_deref().map(str::trim), patch.description],
            )?;
            ensure_changed(changed, "timeline", id)?;
            read_back(select_timeline(conn, id)?, "timeline")
        })
    }

    fn delete_timeline(&self, id: &str) -> RepoResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM timelines WHERE id = ?1;", [id])?;
            ensure_changed(changed, "timeline", id)
        })
    }

    fn create_event(&self, input: &NewTimelineEvent) -> RepoResult<TimelineEvent> {
        self.with_conn(|conn| {
            if let Some(timeline_id) = input.timeline_id.as_deref() {
                ensure_exists(conn, "timelines", "timeline", timeline_id)?;
            }
            conn.execute(
                "INSERT INTO timeline_events (timeline_id, date, description, characters_involved)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    input.timeline_id,
                    input.date.trim(),
                    input.description.trim(),
                    input.characters_involved,
                ],
            )?;
            let id = conn.last_insert_rowid();
            read_back(select_event(conn, id)?, "timeline event")
        })
    }

    fn get_event(&self, id: i64) -> RepoResult<Option<TimelineEvent>> {
        self.with_conn(|conn| select_event(conn, id))
    }

    fn list_events(&self, timeline_id: Option<&str>) -> RepoResult<Vec<TimelineEvent>> {
        self.with_conn(|conn| {
            query_all(
                conn,
                &format!(
                    "{EVENT_SELECT_SQL}
                     WHERE (?1 IS NULL OR timeline_id = ?1)
                     ORDER BY date ASC, id ASC;"
                ),
                params![timeline_id],
                parse_event_row,
            )
        })
    }

    fn update_event(&self, id: i64, patch: &TimelineEventPatch) -> RepoResult<TimelineEvent> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE timeline_events
                     SET
                        date = COALESCE(?2, date),
                        description = COALESCE(?3, description),
                        characters_involved = COALESCE(?4, characters_involved),
                        updated_at = {NOW_MS_SQL}
                     WHERE id = ?1;"
                ),
                params![
                    id,
                    patch.date.as_deref().map(str::trim),
                    patch.description.as_deref().map(str::trim),
                    patch.characters_involved,
                ],
            )?;
            ensure_changed(changed, "timeline event", id)?;
            read_back(select_event(conn, id)?, "timeline event")
        })
    }

    fn delete_event(&self, id: i64) -> RepoResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM timeline_events WHERE id = ?1;", [id])?;
            ensure_changed(changed, "timeline event", id)
        })
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn ensure_changed(changed: usize, entity: &'static str, id: impl ToString) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::not_found(entity, id));
    }
    Ok(())
}

/// `table` is always a compile-time constant, never caller input.
fn ensure_exists(
    conn: &Connection,
    table: &'static str,
    entity: &'static str,
    id: &str,
) -> RepoResult<()> {
    let found: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE id = ?1;"),
        [id],
        |row| row.get(0),
    )?;
    if found == 0 {
        return Err(RepoError::not_found(entity, id));
    }
    Ok(())
}

fn read_back<T>(record: Option<T>, entity: &'static str) -> RepoResult<T> {
    record.ok_or_else(|| RepoError::InvalidData(format!("{entity} missing after write")))
}

fn query_one<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    parse: fn(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    match rows.next()? {
        Some(row) => Ok(Some(parse(row)?)),
        None => Ok(None),
    }
}

fn query_all<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    parse: fn(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse(row)?);
    }
    Ok(items)
}

fn select_project(conn: &Connection, id: &str) -> RepoResult<Option<Project>> {
    query_one(
        conn,
        &format!("{PROJECT_SELECT_SQL} WHERE id = ?1;"),
        [id],
        parse_project_row,
    )
}

fn select_character(conn: &Connection, id: &str) -> RepoResult<Option<Character>> {
    query_one(
        conn,
        &format!("{CHARACTER_SELECT_SQL} WHERE id = ?1;"),
        [id],
        parse_character_row,
    )
}

fn select_note(conn: &Connection, id: &str) -> RepoResult<Option<Note>> {
    query_one(
        conn,
        &format!("{NOTE_SELECT_SQL} WHERE id = ?1;"),
        [id],
        parse_note_row,
    )
}

fn select_timeline(conn: &Connection, id: &str) -> RepoResult<Option<Timeline>> {
    query_one(
        conn,
        &format!("{TIMELINE_SELECT_SQL} WHERE id = ?1;"),
        [id],
        parse_timeline_row,
    )
}

fn select_event(conn: &Connection, id: i64) -> RepoResult<Option<TimelineEvent>> {
    query_one(
        conn,
        &format!("{EVENT_SELECT_SQL} WHERE id = ?1;"),
        [id],
        parse_event_row,
    )
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<Project> {
    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_character_row(row: &Row<'_>) -> RepoResult<Character> {
    Ok(Character {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        traits: row.get("traits")?,
        values: row.get("values")?,
        voice_patterns: row.get("voice_patterns")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_memory_row(row: &Row<'_>) -> RepoResult<CharacterMemory> {
    let type_text: String = row.get("memory_type")?;
    let memory_type = MemoryType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid memory type `{type_text}` in character_memories.memory_type"
        ))
    })?;
    Ok(CharacterMemory {
        id: row.get("id")?,
        character_id: row.get("character_id")?,
        content: row.get("content")?,
        memory_type,
        importance: row.get("importance")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    Ok(Note {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        title: row.get("title")?,
        content: row.get("content")?,
        tags: row.get("tags")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_timeline_row(row: &Row<'_>) -> RepoResult<Timeline> {
    Ok(Timeline {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_event_row(row: &Row<'_>) -> RepoResult<TimelineEvent> {
    Ok(TimelineEvent {
        id: row.get("id")?,
        timeline_id: row.get("timeline_id")?,
        date: row.get("date")?,
        description: row.get("description")?,
        characters_involved: row.get("characters_involved")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
