//! CRUD over the `notes` table.
//!
//! This is the persistence collaborator of the retrieval engine: the CLI
//! writes notes here first, then asks the engine to (re)index or purge them.

use super::{migrations, open_database};
use crate::error::QuillError;
use crate::model::{Note, NoteLookup};
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Prefix carried by every note id.
pub const NOTE_ID_PREFIX: &str = "qn-";

const NOTE_COLUMNS: &str = "note_id, title, content, created_at_us, updated_at_us";

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Thread-safe handle to the note database.
pub struct NoteStore {
    conn: Mutex<Connection>,
}

impl NoteStore {
    /// Open (or create) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = open_database(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a throwaway in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().context("open in-memory note database")?;
        migrations::migrate(&mut conn).context("apply note store migrations")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a new note with a freshly minted id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn create(&self, title: &str, content: &str) -> Result<Note> {
        let now = Utc::now();
        let conn = self.conn.lock();

        let mut id = mint_note_id(title, content, now);
        while note_exists(&conn, &id)? {
            id = mint_note_id(title, content, now);
        }

        conn.execute(
            "INSERT INTO notes (note_id, title, content, created_at_us, updated_at_us)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![id, title, content, now.timestamp_micros()],
        )
        .with_context(|| format!("insert note {id}"))?;

        tracing::debug!(note_id = %id, "created note");
        Ok(Note {
            id,
            title: title.to_string(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Fetch one note by exact id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get(&self, note_id: &str) -> Result<Option<Note>> {
        let conn = self.conn.lock();
        get_note(&conn, note_id)
    }

    /// All notes, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list(&self) -> Result<Vec<Note>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {NOTE_COLUMNS} FROM notes ORDER BY created_at_us, note_id"
            ))
            .context("prepare note listing")?;
        let rows = stmt
            .query_map([], note_from_row)
            .context("execute note listing")?;

        let mut notes = Vec::new();
        for row in rows {
            notes.push(row.context("read note row")??);
        }
        Ok(notes)
    }

    /// Replace the title and/or content of an existing note.
    ///
    /// Returns the updated note, or `None` if `note_id` does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn update(
        &self,
        note_id: &str,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<Option<Note>> {
        let conn = self.conn.lock();
        let Some(mut note) = get_note(&conn, note_id)? else {
            return Ok(None);
        };

        if let Some(title) = title {
            note.title = title.to_string();
        }
        if let Some(content) = content {
            note.content = content.to_string();
        }
        note.updated_at = Utc::now();

        conn.execute(
            "UPDATE notes SET title = ?1, content = ?2, updated_at_us = ?3 WHERE note_id = ?4",
            params![
                note.title,
                note.content,
                note.updated_at.timestamp_micros(),
                note_id
            ],
        )
        .with_context(|| format!("update note {note_id}"))?;

        tracing::debug!(note_id, "updated note");
        Ok(Some(note))
    }

    /// Delete a note. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete(&self, note_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let removed = conn
            .execute("DELETE FROM notes WHERE note_id = ?1", params![note_id])
            .with_context(|| format!("delete note {note_id}"))?;
        tracing::debug!(note_id, removed, "deleted note");
        Ok(removed > 0)
    }

    /// Resolve user input to a note id: exact match, then with the `qn-`
    /// prefix added, then the single id starting with the input.
    ///
    /// The input is matched literally; SQL wildcards carry no meaning.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::AmbiguousNoteId`] if the prefix matches more
    /// than one note, or an error if the lookup query fails.
    pub fn resolve_id(&self, input: &str) -> Result<Option<String>> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(None);
        }

        let conn = self.conn.lock();
        if note_exists(&conn, input)? {
            return Ok(Some(input.to_string()));
        }

        let prefixed = if input.starts_with(NOTE_ID_PREFIX) {
            input.to_string()
        } else {
            format!("{NOTE_ID_PREFIX}{input}")
        };
        if prefixed.len() == NOTE_ID_PREFIX.len() {
            return Ok(None);
        }
        if note_exists(&conn, &prefixed)? {
            return Ok(Some(prefixed));
        }

        resolve_prefix_match(&conn, input, &prefixed)
    }

    /// Number of stored notes.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))
            .context("count notes")?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

impl NoteLookup for NoteStore {
    fn note_title(&self, note_id: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT title FROM notes WHERE note_id = ?1",
            params![note_id],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("read title of note {note_id}"))
    }

    fn note_text(&self, note_id: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT content FROM notes WHERE note_id = ?1",
            params![note_id],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("read content of note {note_id}"))
    }
}

fn get_note(conn: &Connection, note_id: &str) -> Result<Option<Note>> {
    let row = conn
        .query_row(
            &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE note_id = ?1"),
            params![note_id],
            note_from_row,
        )
        .optional()
        .with_context(|| format!("read note {note_id}"))?;
    row.transpose()
}

/// Ids starting with `prefix`, compared as plain text. Two matches are enough
/// to reject the prefix.
fn resolve_prefix_match(conn: &Connection, input: &str, prefix: &str) -> Result<Option<String>> {
    let prefix_len = i64::try_from(prefix.chars().count()).unwrap_or(i64::MAX);
    let mut stmt = conn
        .prepare(
            "SELECT note_id FROM notes
             WHERE substr(note_id, 1, ?2) = ?1
             ORDER BY note_id
             LIMIT 2",
        )
        .context("prepare note id prefix lookup")?;

    let rows = stmt
        .query_map(params![prefix, prefix_len], |row| row.get::<_, String>(0))
        .with_context(|| format!("resolve note id prefix '{input}'"))?;
    let mut matches = Vec::new();
    for row in rows {
        matches.push(row?);
    }

    match matches.len() {
        0 => Ok(None),
        1 => Ok(matches.pop()),
        _ => Err(QuillError::AmbiguousNoteId {
            input: input.to_string(),
            matches,
        }
        .into()),
    }
}

fn note_exists(conn: &Connection, note_id: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM notes WHERE note_id = ?1)",
        params![note_id],
        |row| row.get(0),
    )
    .with_context(|| format!("check note {note_id}"))
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Result<Note>> {
    let id: String = row.get(0)?;
    let title: String = row.get(1)?;
    let content: String = row.get(2)?;
    let created_us: i64 = row.get(3)?;
    let updated_us: i64 = row.get(4)?;

    Ok(timestamp(created_us).and_then(|created_at| {
        Ok(Note {
            id,
            title,
            content,
            created_at,
            updated_at: timestamp(updated_us)?,
        })
    }))
}

fn timestamp(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| anyhow!("timestamp {micros}us is out of range"))
}

fn mint_note_id(title: &str, content: &str, now: DateTime<Utc>) -> String {
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut hasher = blake3::Hasher::new();
    hasher.update(title.as_bytes());
    hasher.update(&[0]);
    hasher.update(content.as_bytes());
    hasher.update(&now.timestamp_micros().to_le_bytes());
    hasher.update(&counter.to_le_bytes());
    let hex = hasher.finalize().to_hex();
    format!("{NOTE_ID_PREFIX}{}", &hex.as_str()[..8])
}
