//! SQLite session repository implementation.
//!
//! Implements `SessionRepository` from `hourglass-core` using sqlx with split
//! read/write pools. Raw queries and private Row structs, like the other
//! SQLite repositories. The two racing mutations are single conditional
//! statements on the writer connection, checked through `rows_affected`.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use uuid::Uuid;

use hourglass_core::repository::{NewSession, SessionRepository, TurnAssignment, TurnResolution};
use hourglass_types::error::RepositoryError;
use hourglass_types::notify::ChannelKind;
use hourglass_types::session::{
    ContactPoints, FeedEntry, Participant, ParticipantStatus, Session, SessionFilter, SessionId,
    SessionStatus, VaultEntry, VaultVisibility,
};
use hourglass_types::turn::{Turn, TurnEvent, TurnId};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `SessionRepository`.
pub struct SqliteSessionRepository {
    pool: DatabasePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct SessionRow {
    id: String,
    host_id: String,
    title: String,
    genre: Option<String>,
    template_source: String,
    template_length: String,
    seed_text: Option<String>,
    template_text: Option<String>,
    response_window_minutes: i64,
    allow_fallback_cohost: bool,
    visibility: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            host_id: row.try_get("host_id")?,
            title: row.try_get("title")?,
            genre: row.try_get("genre")?,
            template_source: row.try_get("template_source")?,
            template_length: row.try_get("template_length")?,
            seed_text: row.try_get("seed_text")?,
            template_text: row.try_get("template_text")?,
            response_window_minutes: row.try_get("response_window_minutes")?,
            allow_fallback_cohost: row.try_get("allow_fallback_cohost")?,
            visibility: row.try_get("visibility")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_session(self) -> Result<Session, RepositoryError> {
        Ok(Session {
            id: SessionId::from_uuid(parse_uuid(&self.id, "session id")?),
            host_id: self.host_id,
            title: self.title,
            genre: self.genre,
            template_source: parse_enum(&self.template_source)?,
            template_length: parse_enum(&self.template_length)?,
            seed_text: self.seed_text,
            template_text: self.template_text,
            response_window_minutes: self.response_window_minutes,
            allow_fallback_cohost: self.allow_fallback_cohost,
            visibility: parse_enum(&self.visibility)?,
            status: parse_enum(&self.status)?,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct ParticipantRow {
    session_id: String,
    user_id: String,
    handle: String,
    role: String,
    status: String,
    contact: ContactPoints,
    joined_at: String,
}

impl ParticipantRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            session_id: row.try_get("session_id")?,
            user_id: row.try_get("user_id")?,
            handle: row.try_get("handle")?,
            role: row.try_get("role")?,
            status: row.try_get("status")?,
            contact: contact_from_row(row)?,
            joined_at: row.try_get("joined_at")?,
        })
    }

    fn into_participant(self) -> Result<Participant, RepositoryError> {
        Ok(Participant {
            session_id: SessionId::from_uuid(parse_uuid(&self.session_id, "session_id")?),
            user_id: self.user_id,
            handle: self.handle,
            role: parse_enum(&self.role)?,
            status: parse_enum(&self.status)?,
            contact: self.contact,
            joined_at: parse_datetime(&self.joined_at)?,
        })
    }
}

struct TurnRow {
    id: String,
    session_id: String,
    order_index: i64,
    status: String,
    prompt: String,
    part_of_speech: String,
    creative_nudge: Option<String>,
    placeholder: String,
    assigned_handle: Option<String>,
    channels: String,
    contact: ContactPoints,
    deadline: String,
    resolved_text: Option<String>,
    resolution_source: Option<String>,
    resolved_handle: Option<String>,
    resolved_at: Option<String>,
    created_at: String,
}

impl TurnRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            order_index: row.try_get("order_index")?,
            status: row.try_get("status")?,
            prompt: row.try_get("prompt")?,
            part_of_speech: row.try_get("part_of_speech")?,
            creative_nudge: row.try_get("creative_nudge")?,
            placeholder: row.try_get("placeholder")?,
            assigned_handle: row.try_get("assigned_handle")?,
            channels: row.try_get("channels")?,
            contact: contact_from_row(row)?,
            deadline: row.try_get("deadline")?,
            resolved_text: row.try_get("resolved_text")?,
            resolution_source: row.try_get("resolution_source")?,
            resolved_handle: row.try_get("resolved_handle")?,
            resolved_at: row.try_get("resolved_at")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_turn(self) -> Result<Turn, RepositoryError> {
        let channels: Vec<ChannelKind> = serde_json::from_str(&self.channels)
            .map_err(|e| RepositoryError::Query(format!("invalid channels: {e}")))?;
        Ok(Turn {
            id: TurnId::from_uuid(parse_uuid(&self.id, "turn id")?),
            session_id: SessionId::from_uuid(parse_uuid(&self.session_id, "session_id")?),
            order_index: self.order_index as u32,
            status: parse_enum(&self.status)?,
            prompt: self.prompt,
            part_of_speech: self.part_of_speech,
            creative_nudge: self.creative_nudge,
            placeholder: self.placeholder,
            assigned_handle: self.assigned_handle,
            channels,
            contact: self.contact,
            deadline: parse_datetime(&self.deadline)?,
            resolved_text: self.resolved_text,
            resolution_source: self
                .resolution_source
                .as_deref()
                .map(parse_enum)
                .transpose()?,
            resolved_handle: self.resolved_handle,
            resolved_at: self.resolved_at.as_deref().map(parse_datetime).transpose()?,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

struct TurnEventRow {
    id: String,
    turn_id: String,
    session_id: String,
    event_type: String,
    payload: String,
    created_at: String,
}

impl TurnEventRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            turn_id: row.try_get("turn_id")?,
            session_id: row.try_get("session_id")?,
            event_type: row.try_get("event_type")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_event(self) -> Result<TurnEvent, RepositoryError> {
        Ok(TurnEvent {
            id: parse_uuid(&self.id, "event id")?,
            turn_id: TurnId::from_uuid(parse_uuid(&self.turn_id, "turn_id")?),
            session_id: SessionId::from_uuid(parse_uuid(&self.session_id, "session_id")?),
            event_type: self.event_type,
            payload: serde_json::from_str(&self.payload)
                .map_err(|e| RepositoryError::Query(format!("invalid payload: {e}")))?,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

struct VaultEntryRow {
    id: String,
    session_id: String,
    title: String,
    story_text: String,
    visibility: String,
    created_at: String,
    published_at: Option<String>,
    published_by: Option<String>,
}

impl VaultEntryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            title: row.try_get("title")?,
            story_text: row.try_get("story_text")?,
            visibility: row.try_get("visibility")?,
            created_at: row.try_get("created_at")?,
            published_at: row.try_get("published_at")?,
            published_by: row.try_get("published_by")?,
        })
    }

    fn into_entry(self) -> Result<VaultEntry, RepositoryError> {
        Ok(VaultEntry {
            id: parse_uuid(&self.id, "vault entry id")?,
            session_id: SessionId::from_uuid(parse_uuid(&self.session_id, "session_id")?),
            title: self.title,
            story_text: self.story_text,
            visibility: parse_enum(&self.visibility)?,
            created_at: parse_datetime(&self.created_at)?,
            published_at: self.published_at.as_deref().map(parse_datetime).transpose()?,
            published_by: self.published_by,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn contact_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ContactPoints, sqlx::Error> {
    Ok(ContactPoints {
        email: row.try_get("contact_email")?,
        phone: row.try_get("contact_phone")?,
        chat_webhook: row.try_get("contact_chat_webhook")?,
    })
}

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid {what}: {e}")))
}

fn parse_enum<T>(s: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr<Err = String>,
{
    s.parse().map_err(RepositoryError::Query)
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

/// `?, ?, ?` for an `IN (...)` list of `n` values.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

const LIVE_STATUSES: &str = "('draft', 'active')";

impl SqliteSessionRepository {
    async fn session_exists(&self, id: &SessionId) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT 1 FROM sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.writer)
            .await
            .map_err(query_err)?;
        Ok(row.is_some())
    }

    async fn fetch_turn(
        &self,
        id: &TurnId,
        pool: &sqlx::SqlitePool,
    ) -> Result<Option<Turn>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM turns WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(pool)
            .await
            .map_err(query_err)?;
        match row {
            Some(row) => Ok(Some(TurnRow::from_row(&row).map_err(query_err)?.into_turn()?)),
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionRepository implementation
// ---------------------------------------------------------------------------

impl SessionRepository for SqliteSessionRepository {
    async fn create_session(&self, new: &NewSession) -> Result<(), RepositoryError> {
        let session = &new.session;
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        sqlx::query(
            r#"INSERT INTO sessions (id, host_id, title, genre, template_source, template_length,
                   seed_text, template_text, response_window_minutes, allow_fallback_cohost,
                   visibility, status, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(session.id.to_string())
        .bind(&session.host_id)
        .bind(&session.title)
        .bind(&session.genre)
        .bind(session.template_source.to_string())
        .bind(session.template_length.to_string())
        .bind(&session.seed_text)
        .bind(&session.template_text)
        .bind(session.response_window_minutes)
        .bind(session.allow_fallback_cohost)
        .bind(session.visibility.to_string())
        .bind(session.status.to_string())
        .bind(format_datetime(&session.created_at))
        .bind(format_datetime(&session.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.message().contains("UNIQUE") {
                    return RepositoryError::Conflict(format!(
                        "session {} already exists",
                        session.id
                    ));
                }
            }
            query_err(e)
        })?;

        for (position, participant) in new.participants.iter().enumerate() {
            insert_participant(&mut *tx, participant, position as i64).await?;
        }

        for turn in &new.turns {
            let channels = serde_json::to_string(&turn.channels)
                .map_err(|e| RepositoryError::Query(format!("invalid channels: {e}")))?;
            sqlx::query(
                r#"INSERT INTO turns (id, session_id, order_index, status, prompt, part_of_speech,
                       creative_nudge, placeholder, assigned_handle, channels, contact_email,
                       contact_phone, contact_chat_webhook, deadline, resolved_text,
                       resolution_source, resolved_handle, resolved_at, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(turn.id.to_string())
            .bind(turn.session_id.to_string())
            .bind(turn.order_index as i64)
            .bind(turn.status.to_string())
            .bind(&turn.prompt)
            .bind(&turn.part_of_speech)
            .bind(&turn.creative_nudge)
            .bind(&turn.placeholder)
            .bind(&turn.assigned_handle)
            .bind(channels)
            .bind(&turn.contact.email)
            .bind(&turn.contact.phone)
            .bind(&turn.contact.chat_webhook)
            .bind(format_datetime(&turn.deadline))
            .bind(&turn.resolved_text)
            .bind(turn.resolution_source.map(|s| s.to_string()))
            .bind(&turn.resolved_handle)
            .bind(turn.resolved_at.as_ref().map(format_datetime))
            .bind(format_datetime(&turn.created_at))
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        }

        for event in &new.events {
            insert_event(&mut *tx, event).await?;
        }

        tx.commit().await.map_err(query_err)?;
        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => Ok(Some(
                SessionRow::from_row(&row).map_err(query_err)?.into_session()?,
            )),
            None => Ok(None),
        }
    }

    async fn list_sessions(
        &self,
        filter: &SessionFilter,
        limit: u32,
    ) -> Result<Vec<Session>, RepositoryError> {
        let mut sql = String::from("SELECT * FROM sessions WHERE 1 = 1");
        if filter.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if filter.user_id.is_some() {
            sql.push_str(
                " AND id IN (SELECT session_id FROM participants WHERE user_id = ?)",
            );
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");

        let mut query = sqlx::query(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status.to_string());
        }
        if let Some(user_id) = &filter.user_id {
            query = query.bind(user_id);
        }
        let rows = query
            .bind(i64::from(limit))
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            sessions.push(SessionRow::from_row(row).map_err(query_err)?.into_session()?);
        }
        Ok(sessions)
    }

    async fn invite_participants(
        &self,
        session_id: &SessionId,
        participants: &[Participant],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        let exists = sqlx::query("SELECT 1 FROM sessions WHERE id = ?")
            .bind(session_id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_err)?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let next: i64 = sqlx::query(
            "SELECT COALESCE(MAX(position) + 1, 0) AS next FROM participants WHERE session_id = ?",
        )
        .bind(session_id.to_string())
        .fetch_one(&mut *tx)
        .await
        .map_err(query_err)?
        .try_get("next")
        .map_err(query_err)?;

        let mut position = next;
        for participant in participants {
            let reset = sqlx::query(
                "UPDATE participants SET status = ? WHERE session_id = ? AND user_id = ?",
            )
            .bind(ParticipantStatus::Invited.to_string())
            .bind(session_id.to_string())
            .bind(&participant.user_id)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
            if reset.rows_affected() == 0 {
                insert_participant(&mut *tx, participant, position).await?;
                position += 1;
            }
        }

        tx.commit().await.map_err(query_err)?;
        Ok(())
    }

    async fn set_participant_status(
        &self,
        session_id: &SessionId,
        user_id: &str,
        status: ParticipantStatus,
    ) -> Result<Option<Participant>, RepositoryError> {
        let row = sqlx::query(
            r#"UPDATE participants SET status = ?
               WHERE session_id = ? AND user_id = ?
               RETURNING *"#,
        )
        .bind(status.to_string())
        .bind(session_id.to_string())
        .bind(user_id)
        .fetch_optional(&self.pool.writer)
        .await
        .map_err(query_err)?;

        match row {
            Some(row) => Ok(Some(
                ParticipantRow::from_row(&row)
                    .map_err(query_err)?
                    .into_participant()?,
            )),
            None => Ok(None),
        }
    }

    async fn list_participants(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Participant>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM participants WHERE session_id = ? ORDER BY position")
            .bind(session_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut participants = Vec::with_capacity(rows.len());
        for row in &rows {
            participants.push(
                ParticipantRow::from_row(row)
                    .map_err(query_err)?
                    .into_participant()?,
            );
        }
        Ok(participants)
    }

    async fn transition_session(
        &self,
        id: &SessionId,
        from: &[SessionStatus],
        to: SessionStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        if from.is_empty() {
            return Ok(false);
        }
        let sql = format!(
            "UPDATE sessions SET status = ?, updated_at = ? WHERE id = ? AND status IN ({})",
            placeholders(from.len())
        );
        let mut query = sqlx::query(&sql)
            .bind(to.to_string())
            .bind(format_datetime(&at))
            .bind(id.to_string());
        for status in from {
            query = query.bind(status.to_string());
        }
        let result = query.execute(&self.pool.writer).await.map_err(query_err)?;

        if result.rows_affected() == 0 {
            if !self.session_exists(id).await? {
                return Err(RepositoryError::NotFound);
            }
            return Ok(false);
        }
        Ok(true)
    }

    async fn complete_session(
        &self,
        id: &SessionId,
        from: &[SessionStatus],
        entry: &VaultEntry,
    ) -> Result<bool, RepositoryError> {
        if from.is_empty() {
            return Ok(false);
        }
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        let sql = format!(
            r#"UPDATE sessions SET status = 'completed', updated_at = ?
               WHERE id = ? AND status IN ({})
                 AND NOT EXISTS (SELECT 1 FROM turns WHERE session_id = sessions.id AND status = 'pending')
                 AND NOT EXISTS (SELECT 1 FROM vault_entries WHERE session_id = sessions.id)"#,
            placeholders(from.len())
        );
        let mut query = sqlx::query(&sql)
            .bind(format_datetime(&entry.created_at))
            .bind(id.to_string());
        for status in from {
            query = query.bind(status.to_string());
        }
        let result = query.execute(&mut *tx).await.map_err(query_err)?;
        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(query_err)?;
            if !self.session_exists(id).await? {
                return Err(RepositoryError::NotFound);
            }
            return Ok(false);
        }

        sqlx::query(
            r#"INSERT INTO vault_entries (id, session_id, title, story_text, visibility, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entry.id.to_string())
        .bind(entry.session_id.to_string())
        .bind(&entry.title)
        .bind(&entry.story_text)
        .bind(entry.visibility.to_string())
        .bind(format_datetime(&entry.created_at))
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        tx.commit().await.map_err(query_err)?;
        Ok(true)
    }

    async fn get_vault_entry(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<VaultEntry>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM vault_entries WHERE session_id = ?")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => Ok(Some(
                VaultEntryRow::from_row(&row).map_err(query_err)?.into_entry()?,
            )),
            None => Ok(None),
        }
    }

    async fn publish_vault_entry(
        &self,
        session_id: &SessionId,
        visibility: VaultVisibility,
        published_by: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Option<VaultEntry>, RepositoryError> {
        let result = if visibility == VaultVisibility::Public {
            sqlx::query(
                r#"UPDATE vault_entries
                   SET visibility = ?, published_at = COALESCE(published_at, ?), published_by = ?
                   WHERE session_id = ?
                   RETURNING *"#,
            )
            .bind(visibility.to_string())
            .bind(format_datetime(&at))
            .bind(published_by)
            .bind(session_id.to_string())
            .fetch_optional(&self.pool.writer)
            .await
        } else {
            sqlx::query(
                r#"UPDATE vault_entries
                   SET visibility = ?, published_at = NULL, published_by = NULL
                   WHERE session_id = ?
                   RETURNING *"#,
            )
            .bind(visibility.to_string())
            .bind(session_id.to_string())
            .fetch_optional(&self.pool.writer)
            .await
        };

        match result.map_err(query_err)? {
            Some(row) => Ok(Some(
                VaultEntryRow::from_row(&row).map_err(query_err)?.into_entry()?,
            )),
            None => Ok(None),
        }
    }

    async fn list_published_entries(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<FeedEntry>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT vault_entries.*, sessions.title AS session_title, sessions.genre,
                      sessions.host_id
               FROM vault_entries
               JOIN sessions ON sessions.id = vault_entries.session_id
               WHERE vault_entries.visibility = 'public'
               ORDER BY COALESCE(vault_entries.published_at, vault_entries.created_at) DESC
               LIMIT ? OFFSET ?"#,
        )
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(FeedEntry {
                entry: VaultEntryRow::from_row(row).map_err(query_err)?.into_entry()?,
                session_title: row.try_get("session_title").map_err(query_err)?,
                genre: row.try_get("genre").map_err(query_err)?,
                host_id: row.try_get("host_id").map_err(query_err)?,
            });
        }
        Ok(entries)
    }

    async fn get_turn(&self, id: &TurnId) -> Result<Option<Turn>, RepositoryError> {
        self.fetch_turn(id, &self.pool.reader).await
    }

    async fn list_turns(&self, session_id: &SessionId) -> Result<Vec<Turn>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM turns WHERE session_id = ? ORDER BY order_index")
            .bind(session_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in &rows {
            turns.push(TurnRow::from_row(row).map_err(query_err)?.into_turn()?);
        }
        Ok(turns)
    }

    async fn list_pending_turns(&self) -> Result<Vec<Turn>, RepositoryError> {
        let sql = format!(
            r#"SELECT turns.* FROM turns
               JOIN sessions ON sessions.id = turns.session_id
               WHERE turns.status = 'pending' AND sessions.status IN {LIVE_STATUSES}
               ORDER BY turns.deadline"#
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in &rows {
            turns.push(TurnRow::from_row(row).map_err(query_err)?.into_turn()?);
        }
        Ok(turns)
    }

    async fn resolve_turn_if_pending(
        &self,
        id: &TurnId,
        resolution: &TurnResolution,
    ) -> Result<Option<Turn>, RepositoryError> {
        let sql = format!(
            r#"UPDATE turns
               SET status = ?, resolved_text = ?, resolution_source = ?, resolved_handle = ?,
                   resolved_at = ?
               WHERE id = ? AND status = 'pending'
                 AND EXISTS (SELECT 1 FROM sessions
                             WHERE sessions.id = turns.session_id AND sessions.status IN {LIVE_STATUSES})"#
        );
        let result = sqlx::query(&sql)
            .bind(resolution.source.resolved_status().to_string())
            .bind(&resolution.text)
            .bind(resolution.source.to_string())
            .bind(&resolution.handle)
            .bind(format_datetime(&resolution.resolved_at))
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        let turn = self.fetch_turn(id, &self.pool.writer).await?;
        match (result.rows_affected(), turn) {
            (_, None) => Err(RepositoryError::NotFound),
            (0, Some(_)) => Ok(None),
            (_, Some(turn)) => Ok(Some(turn)),
        }
    }

    async fn reassign_turns(
        &self,
        assignments: &[TurnAssignment],
    ) -> Result<Vec<Turn>, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        let mut changed = Vec::new();
        for assignment in assignments {
            let channels = serde_json::to_string(&assignment.channels)
                .map_err(|e| RepositoryError::Query(format!("invalid channels: {e}")))?;
            let row = sqlx::query(
                r#"UPDATE turns
                   SET assigned_handle = ?, channels = ?, contact_email = ?, contact_phone = ?,
                       contact_chat_webhook = ?
                   WHERE id = ? AND status = 'pending'
                   RETURNING *"#,
            )
            .bind(&assignment.handle)
            .bind(channels)
            .bind(&assignment.contact.email)
            .bind(&assignment.contact.phone)
            .bind(&assignment.contact.chat_webhook)
            .bind(assignment.turn_id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_err)?;
            if let Some(row) = row {
                changed.push(TurnRow::from_row(&row).map_err(query_err)?.into_turn()?);
            }
        }
        tx.commit().await.map_err(query_err)?;
        Ok(changed)
    }

    async fn append_turn_event(&self, event: &TurnEvent) -> Result<(), RepositoryError> {
        let mut conn = self.pool.writer.acquire().await.map_err(query_err)?;
        insert_event(&mut *conn, event).await
    }

    async fn list_turn_events(&self, turn_id: &TurnId) -> Result<Vec<TurnEvent>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM turn_events WHERE turn_id = ? ORDER BY rowid")
            .bind(turn_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut events = Vec::with_capacity(rows.len());
        for row in &rows {
            events.push(TurnEventRow::from_row(row).map_err(query_err)?.into_event()?);
        }
        Ok(events)
    }
}

async fn insert_participant(
    conn: &mut sqlx::SqliteConnection,
    participant: &Participant,
    position: i64,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"INSERT INTO participants (session_id, user_id, handle, role, status,
               contact_email, contact_phone, contact_chat_webhook, joined_at, position)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(participant.session_id.to_string())
    .bind(&participant.user_id)
    .bind(&participant.handle)
    .bind(participant.role.to_string())
    .bind(participant.status.to_string())
    .bind(&participant.contact.email)
    .bind(&participant.contact.phone)
    .bind(&participant.contact.chat_webhook)
    .bind(format_datetime(&participant.joined_at))
    .bind(position)
    .execute(conn)
    .await
    .map_err(query_err)?;
    Ok(())
}

async fn insert_event(
    conn: &mut sqlx::SqliteConnection,
    event: &TurnEvent,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"INSERT INTO turn_events (id, turn_id, session_id, event_type, payload, created_at)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(event.id.to_string())
    .bind(event.turn_id.to_string())
    .bind(event.session_id.to_string())
    .bind(&event.event_type)
    .bind(event.payload.to_string())
    .bind(format_datetime(&event.created_at))
    .execute(conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_foreign_key_violation() {
                return RepositoryError::NotFound;
            }
        }
        query_err(e)
    })?;
    Ok(())
}
