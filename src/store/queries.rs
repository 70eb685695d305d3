use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{OptionalExtension, Row, params};

use super::models::{NewCommand, SavedCommand};
use super::{Store, StoreError, StoreResult};

const COLUMNS: &str = "id, name, command_str, note, usage_count, created_at";

impl Store {
    // ── Commands ──

    pub fn insert_command(&self, command: &NewCommand) -> StoreResult<i64> {
        self.insert_command_at(command, Utc::now())
    }

    pub(crate) fn insert_command_at(
        &self,
        command: &NewCommand,
        created_at: DateTime<Utc>,
    ) -> StoreResult<i64> {
        validate(&command.name, &command.note)?;
        // Fixed-width timestamps keep `ORDER BY created_at` chronological.
        let created = created_at.to_rfc3339_opts(SecondsFormat::Micros, true);
        self.conn
            .execute(
                "INSERT INTO commands (name, command_str, note, usage_count, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                params![command.name, command.command_line, command.note, created],
            )
            .map_err(|e| name_conflict(e, &command.name))?;
        let id = self.conn.last_insert_rowid();
        tracing::info!(id, name = %command.name, "inserted command");
        Ok(id)
    }

    /// All commands, newest first.
    pub fn list_commands(&self) -> StoreResult<Vec<SavedCommand>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM commands ORDER BY created_at DESC, id DESC"
        ))?;
        let commands = stmt
            .query_map([], command_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(commands)
    }

    pub fn get_command(&self, id: i64) -> StoreResult<Option<SavedCommand>> {
        let command = self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM commands WHERE id = ?1"),
                params![id],
                command_from_row,
            )
            .optional()?;
        Ok(command)
    }

    pub fn get_command_by_name(&self, name: &str) -> StoreResult<Option<SavedCommand>> {
        let command = self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM commands WHERE name = ?1"),
                params![name],
                command_from_row,
            )
            .optional()?;
        Ok(command)
    }

    /// Persist name, command line and note. The usage counter is left alone so
    /// a stale copy cannot roll back increments made since it was read.
    pub fn update_command(&self, command: &SavedCommand) -> StoreResult<()> {
        validate(&command.name, &command.note)?;
        let changed = self
            .conn
            .execute(
                "UPDATE commands SET name = ?1, command_str = ?2, note = ?3 WHERE id = ?4",
                params![command.name, command.command_line, command.note, command.id],
            )
            .map_err(|e| name_conflict(e, &command.name))?;
        if changed == 0 {
            return Err(StoreError::NotFound(command.id));
        }
        tracing::info!(id = command.id, name = %command.name, "updated command");
        Ok(())
    }

    pub fn delete_command(&self, id: i64) -> StoreResult<()> {
        self.conn
            .execute("DELETE FROM commands WHERE id = ?1", params![id])?;
        tracing::info!(id, "deleted command");
        Ok(())
    }

    pub fn increment_usage(&self, id: i64) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE commands SET usage_count = usage_count + 1 WHERE id = ?1",
            params![id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

fn validate(name: &str, note: &str) -> StoreResult<()> {
    if name.trim().is_empty() {
        return Err(StoreError::Validation("name is required"));
    }
    if note.trim().is_empty() {
        return Err(StoreError::Validation("note is required"));
    }
    Ok(())
}

fn name_conflict(err: rusqlite::Error, name: &str) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            StoreError::DuplicateName(name.to_string())
        }
        other => StoreError::Io(other),
    }
}

fn command_from_row(row: &Row<'_>) -> rusqlite::Result<SavedCommand> {
    let created: String = row.get(5)?;
    let created_at = DateTime::parse_from_rfc3339(&created)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?
        .with_timezone(&Utc);
    Ok(SavedCommand {
        id: row.get(0)?,
        name: row.get(1)?,
        command_line: row.get(2)?,
        note: row.get(3)?,
        usage_count: row.get(4)?,
        created_at,
    })
}
