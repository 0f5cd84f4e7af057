use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::turn::Turn;

/// Unique identifier for a session, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new SessionId using UUID v7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A collaborative story session.
///
/// A session owns an ordered list of turns (one per blank in the template)
/// and a list of participants. Its status only ever moves forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub host_id: String,
    pub title: String,
    pub genre: Option<String>,
    pub template_source: TemplateSource,
    pub template_length: TemplateLength,
    pub seed_text: Option<String>,
    /// Story text containing `[[ID::slot]]` placeholders, one per turn.
    pub template_text: Option<String>,
    pub response_window_minutes: i64,
    /// When false, expired turns wait for a host override instead of an AI fill.
    pub allow_fallback_cohost: bool,
    pub visibility: VaultVisibility,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Session lifecycle states.
///
/// `draft -> active -> completed -> archived`, with `archived` also
/// reachable from `draft` and `active`. Never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Draft,
    Active,
    Completed,
    Archived,
}

impl SessionStatus {
    /// Completed and archived sessions accept no further turn resolutions.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Archived)
    }

    pub fn can_transition_to(self, to: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, to),
            (Draft, Active)
                | (Draft, Completed)
                | (Active, Completed)
                | (Draft, Archived)
                | (Active, Archived)
                | (Completed, Archived)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Draft => write!(f, "draft"),
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Archived => write!(f, "archived"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(SessionStatus::Draft),
            "active" => Ok(SessionStatus::Active),
            "completed" => Ok(SessionStatus::Completed),
            "archived" => Ok(SessionStatus::Archived),
            other => Err(format!("invalid session status: '{other}'")),
        }
    }
}

/// Where the story template comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSource {
    /// Generated from the built-in segment library.
    #[default]
    Ai,
    /// Host supplies the blanks (and optionally the template text).
    Custom,
    /// Generated, but themed by the host's seed text.
    Seed,
}

impl fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateSource::Ai => write!(f, "ai"),
            TemplateSource::Custom => write!(f, "custom"),
            TemplateSource::Seed => write!(f, "seed"),
        }
    }
}

impl FromStr for TemplateSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ai" => Ok(TemplateSource::Ai),
            "custom" => Ok(TemplateSource::Custom),
            "seed" => Ok(TemplateSource::Seed),
            other => Err(format!("invalid template source: '{other}'")),
        }
    }
}

/// Template length class. Longer classes add story segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TemplateLength {
    #[default]
    Quick,
    Classic,
    Epic,
}

impl fmt::Display for TemplateLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateLength::Quick => write!(f, "quick"),
            TemplateLength::Classic => write!(f, "classic"),
            TemplateLength::Epic => write!(f, "epic"),
        }
    }
}

impl FromStr for TemplateLength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quick" => Ok(TemplateLength::Quick),
            "classic" => Ok(TemplateLength::Classic),
            "epic" => Ok(TemplateLength::Epic),
            other => Err(format!("invalid template length: '{other}'")),
        }
    }
}

/// Who may read the finished story in the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VaultVisibility {
    #[default]
    InviteOnly,
    Public,
    Private,
}

impl fmt::Display for VaultVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultVisibility::InviteOnly => write!(f, "invite_only"),
            VaultVisibility::Public => write!(f, "public"),
            VaultVisibility::Private => write!(f, "private"),
        }
    }
}

impl FromStr for VaultVisibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "invite_only" => Ok(VaultVisibility::InviteOnly),
            "public" => Ok(VaultVisibility::Public),
            "private" => Ok(VaultVisibility::Private),
            other => Err(format!("invalid vault visibility: '{other}'")),
        }
    }
}

/// Contact points used to reach a participant outside the app.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPoints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_webhook: Option<String>,
}

impl ContactPoints {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.phone.is_none() && self.chat_webhook.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Host,
    Player,
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantRole::Host => write!(f, "host"),
            ParticipantRole::Player => write!(f, "player"),
        }
    }
}

impl FromStr for ParticipantRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "host" => Ok(ParticipantRole::Host),
            "player" => Ok(ParticipantRole::Player),
            other => Err(format!("invalid participant role: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Invited,
    Accepted,
    Declined,
    Left,
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantStatus::Invited => write!(f, "invited"),
            ParticipantStatus::Accepted => write!(f, "accepted"),
            ParticipantStatus::Declined => write!(f, "declined"),
            ParticipantStatus::Left => write!(f, "left"),
        }
    }
}

impl FromStr for ParticipantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "invited" => Ok(ParticipantStatus::Invited),
            "accepted" => Ok(ParticipantStatus::Accepted),
            "declined" => Ok(ParticipantStatus::Declined),
            "left" => Ok(ParticipantStatus::Left),
            other => Err(format!("invalid participant status: '{other}'")),
        }
    }
}

/// A member of a session (the host or an invited player).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub session_id: SessionId,
    pub user_id: String,
    pub handle: String,
    pub role: ParticipantRole,
    pub status: ParticipantStatus,
    #[serde(default)]
    pub contact: ContactPoints,
    pub joined_at: DateTime<Utc>,
}

/// Player invitation supplied when creating a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantInput {
    pub user_id: String,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub contact: ContactPoints,
}

/// A host-authored blank for `custom` sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlankSpec {
    /// Word-class tag, e.g. "adjective".
    pub slot: String,
    pub prompt: String,
    /// Placeholder token as it appears in the template text.
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub nudge: Option<String>,
    /// Overrides the session's response window for this turn only.
    #[serde(default)]
    pub response_window_minutes: Option<i64>,
}

/// Request to create a new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub host_id: String,
    #[serde(default)]
    pub host_handle: Option<String>,
    #[serde(default)]
    pub host_contact: ContactPoints,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub template_source: TemplateSource,
    #[serde(default)]
    pub template_length: TemplateLength,
    #[serde(default)]
    pub seed_text: Option<String>,
    #[serde(default)]
    pub template_text: Option<String>,
    #[serde(default)]
    pub blanks: Vec<BlankSpec>,
    #[serde(default = "default_response_window_minutes")]
    pub response_window_minutes: i64,
    #[serde(default = "default_allow_fallback_cohost")]
    pub allow_fallback_cohost: bool,
    #[serde(default)]
    pub visibility: VaultVisibility,
    #[serde(default)]
    pub participants: Vec<ParticipantInput>,
}

/// Longest accepted response window: 30 days.
pub const MAX_RESPONSE_WINDOW_MINUTES: i64 = 30 * 24 * 60;

pub fn default_response_window_minutes() -> i64 {
    5
}

fn default_allow_fallback_cohost() -> bool {
    true
}

impl CreateSessionRequest {
    /// Minimal request for a generated session hosted by `host_id`.
    pub fn new(host_id: impl Into<String>) -> Self {
        Self {
            host_id: host_id.into(),
            host_handle: None,
            host_contact: ContactPoints::default(),
            title: None,
            genre: None,
            template_source: TemplateSource::default(),
            template_length: TemplateLength::default(),
            seed_text: None,
            template_text: None,
            blanks: Vec::new(),
            response_window_minutes: default_response_window_minutes(),
            allow_fallback_cohost: default_allow_fallback_cohost(),
            visibility: VaultVisibility::default(),
            participants: Vec::new(),
        }
    }
}

/// Request to complete a session into a vault entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteSessionRequest {
    /// Final story text. Assembled from the resolved turns when absent.
    #[serde(default)]
    pub story_text: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub visibility: Option<VaultVisibility>,
}

/// The finished artifact of a completed session. Created exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultEntry {
    pub id: Uuid,
    pub session_id: SessionId,
    pub title: String,
    pub story_text: String,
    pub visibility: VaultVisibility,
    pub created_at: DateTime<Utc>,
    /// Set while the entry is public on the feed.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published_by: Option<String>,
}

/// A public vault entry as listed on the feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntry {
    #[serde(flatten)]
    pub entry: VaultEntry,
    pub session_title: String,
    pub genre: Option<String>,
    pub host_id: String,
}

/// Request to change who can read a session's vault entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishVaultRequest {
    #[serde(default = "default_publish_visibility")]
    pub visibility: VaultVisibility,
    #[serde(default)]
    pub published_by: Option<String>,
}

fn default_publish_visibility() -> VaultVisibility {
    VaultVisibility::Public
}

impl Default for PublishVaultRequest {
    fn default() -> Self {
        Self {
            visibility: default_publish_visibility(),
            published_by: None,
        }
    }
}

/// Page size bounds shared by the session list and the feed.
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Clamp a requested page size into `1..=MAX_PAGE_SIZE`.
pub fn page_size(requested: Option<u32>) -> u32 {
    requested.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

/// Filter for listing sessions, newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionFilter {
    #[serde(default)]
    pub status: Option<SessionStatus>,
    /// Only sessions this user takes part in.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// A session with its participants, without turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    #[serde(flatten)]
    pub session: Session,
    pub participants: Vec<Participant>,
}

/// A participant's answer to an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationAction {
    Accept,
    Decline,
    #[serde(alias = "left")]
    Leave,
}

impl InvitationAction {
    pub fn status(self) -> ParticipantStatus {
        match self {
            InvitationAction::Accept => ParticipantStatus::Accepted,
            InvitationAction::Decline => ParticipantStatus::Declined,
            InvitationAction::Leave => ParticipantStatus::Left,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteParticipantsRequest {
    pub participants: Vec<ParticipantInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondInvitationRequest {
    pub user_id: String,
    pub action: InvitationAction,
}

/// A session together with its turns and participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetail {
    pub session: Session,
    pub turns: Vec<Turn>,
    pub participants: Vec<Participant>,
}
