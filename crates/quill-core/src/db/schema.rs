//! SQLite schema for the note store.
//!
//! `notes` holds the latest title/content of each note. Fragment and index
//! state is never persisted here; it is rebuilt from these rows.

/// Migration v1: the notes table.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS notes (
    note_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK (note_id LIKE 'qn-%')
);
";

/// Migration v2: stable listing order by creation time.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_notes_created
    ON notes(created_at_us, note_id);
";
