use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Seniority band attached to a posting. Drives the minimum-years threshold
/// in the rule-based experience sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "experience_level", rename_all = "snake_case")]
pub enum ExperienceLevel {
    Entry,
    Mid,
    Senior,
    Executive,
}

impl ExperienceLevel {
    /// Minimum years of experience expected at this level.
    pub fn min_years(self) -> i32 {
        match self {
            ExperienceLevel::Entry => 0,
            ExperienceLevel::Mid => 3,
            ExperienceLevel::Senior => 5,
            ExperienceLevel::Executive => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExperienceLevel::Entry => "entry",
            ExperienceLevel::Mid => "mid",
            ExperienceLevel::Senior => "senior",
            ExperienceLevel::Executive => "executive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "location_type", rename_all = "snake_case")]
pub enum LocationType {
    Onsite,
    Remote,
    Hybrid,
}

impl LocationType {
    pub fn as_str(self) -> &'static str {
        match self {
            LocationType::Onsite => "onsite",
            LocationType::Remote => "remote",
            LocationType::Hybrid => "hybrid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "job_type", rename_all = "snake_case")]
pub enum JobType {
    FullTime,
    PartTime,
    Contract,
    Freelance,
    Internship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
pub enum JobStatus {
    Active,
    Expired,
    Filled,
    Closed,
}

/// A job posting. Written by the external ingestion pipeline; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    pub description: String,
    pub skills_required: Vec<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub experience_level: ExperienceLevel,
    pub location: Option<String>,
    pub location_type: LocationType,
    pub job_type: JobType,
    pub status: JobStatus,
    pub application_count: i32,
    pub posted_at: DateTime<Utc>,
}
