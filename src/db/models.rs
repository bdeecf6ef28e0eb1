use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::surveys::{Answers, SurveyQuestion};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: Option<String>,
    pub home_airport: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl User {
    pub fn new(email: String, password_hash: String, display_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            display_name,
            home_airport: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
            last_login: None,
            is_active: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl UserSession {
    pub fn new(user_id: Uuid, token: String, expires_in_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            token,
            expires_at: now + chrono::Duration::hours(expires_in_hours),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "trip_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Planning,
    Booked,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trip {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub destination: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget_per_person: Option<f64>,
    pub status: TripStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A trip as seen by one of its members.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TripSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub trip: Trip,
    pub role: MemberRole,
    pub member_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Member,
    Organizer,
    Owner,
}

impl MemberRole {
    /// Owners and organizers run the trip: details, invitations, surveys, votes.
    pub fn can_manage(self) -> bool {
        matches!(self, MemberRole::Owner | MemberRole::Organizer)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TripMember {
    pub trip_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MemberProfile {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invitation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Revoked,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invitation {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub email: String,
    pub invited_by: Uuid,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl Invitation {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PendingInvitation {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub invitation: Invitation,
    pub trip_name: String,
    pub invited_by_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "activity_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivityCategory {
    Sightseeing,
    Food,
    Nightlife,
    Outdoors,
    Culture,
    Event,
    Transport,
    Lodging,
    Other,
}

impl Default for ActivityCategory {
    fn default() -> Self {
        ActivityCategory::Other
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub created_by: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: ActivityCategory,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub cost_estimate: Option<f64>,
    pub url: Option<String>,
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "survey_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SurveyStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Survey {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub questions: Json<Vec<SurveyQuestion>>,
    pub status: SurveyStatus,
    pub closes_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Survey {
    pub fn accepts_responses_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SurveyStatus::Open && self.closes_at.map_or(true, |c| c > now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SurveyResponse {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub user_id: Uuid,
    pub answers: Json<Answers>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "voting_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VotingStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VotingSession {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: VotingStatus,
    pub closes_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl VotingSession {
    pub fn accepts_ballots_at(&self, now: DateTime<Utc>) -> bool {
        self.status == VotingStatus::Open && self.closes_at.map_or(true, |c| c > now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VotingOption {
    pub id: Uuid,
    pub session_id: Uuid,
    pub label: String,
    pub description: Option<String>,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vote {
    pub session_id: Uuid,
    pub option_id: Uuid,
    pub user_id: Uuid,
    pub cast_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    InvitationReceived,
    InvitationAccepted,
    InvitationExpired,
    MemberJoined,
    MemberRemoved,
    SurveyCreated,
    SurveyClosed,
    VoteCreated,
    VoteClosed,
    ActivityAdded,
    TripUpdated,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub trip_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub payload: Json<serde_json::Value>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
