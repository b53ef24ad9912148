//! Match Scorer — pluggable, trait-based scorer that measures a candidate
//! profile against a job posting.
//!
//! Default: `LlmMatchScorer` (semantic via Claude) with a mandatory fallback
//! to `RuleBasedScorer` (pure-Rust, fast, deterministic, fully testable).
//! An AI failure of any kind is absorbed here and never reaches a caller.
//!
//! `AppState` holds an `Arc<dyn MatchScorer>`, swapped at startup via config.

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::llm_client::LlmClient;
use crate::matching::prompts::{MATCH_SCORE_PROMPT_TEMPLATE, MATCH_SCORE_SYSTEM};
use crate::models::job::{ExperienceLevel, JobRow, LocationType};
use crate::models::profile::ProfileRow;

// ────────────────────────────────────────────────────────────────────────────
// Output data models (shared across all scorer backends)
// ────────────────────────────────────────────────────────────────────────────

/// Per-dimension sub-scores, each in [0, 100]. `overall_fit` carries the
/// title/role bonus in the rule-based strategy; the AI strategy leaves it 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDetails {
    pub skills: i32,
    pub experience: i32,
    pub salary: i32,
    pub location: i32,
    #[serde(default)]
    pub overall_fit: i32,
}

/// Full match result returned to callers. `reasons` is never empty and keeps
/// evaluation order (skills → experience → salary → location → title).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub score: i32, // 0 – 100
    pub reasons: Vec<String>,
    pub details: MatchDetails,
    pub scorer_backend: String, // "ai" | "rules" — for transparency
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// The match scorer trait. Implement this to swap backends without touching
/// handler or selector code.
///
/// Infallible by contract: ordinary business conditions (AI outage, malformed
/// model output, missing profile fields) must produce a best-effort result,
/// never an error.
#[async_trait]
pub trait MatchScorer: Send + Sync {
    async fn score(&self, profile: &ProfileRow, job: &JobRow) -> MatchResult;
}

// ────────────────────────────────────────────────────────────────────────────
// RuleBasedScorer — deterministic weighted fallback
// ────────────────────────────────────────────────────────────────────────────

/// Pure-Rust weighted linear scorer. Fast, deterministic, no LLM call.
///
/// Weights: skills 0.4, experience 0.2, salary 0.2, location 0.1, title 0.1.
pub struct RuleBasedScorer;

#[async_trait]
impl MatchScorer for RuleBasedScorer {
    async fn score(&self, profile: &ProfileRow, job: &JobRow) -> MatchResult {
        compute_rule_based(profile, job)
    }
}

const WEIGHT_SKILLS: f64 = 0.4;
const WEIGHT_EXPERIENCE: f64 = 0.2;
const WEIGHT_SALARY: f64 = 0.2;
const WEIGHT_LOCATION: f64 = 0.1;
const WEIGHT_TITLE: f64 = 0.1;

/// Neutral salary sub-score when either side omits salary data.
const SALARY_UNKNOWN: i32 = 50;

pub fn compute_rule_based(profile: &ProfileRow, job: &JobRow) -> MatchResult {
    let mut reasons = Vec::new();

    // Skills (0.4): ratio of required skills covered by any profile skill,
    // case-folded substring containment in either direction.
    let (skills_score, matched_skills) = score_skills(&profile.skills, &job.skills_required);
    if !matched_skills.is_empty() {
        reasons.push(format!(
            "Matches {} of {} required skills: {}",
            matched_skills.len(),
            job.skills_required.len(),
            matched_skills.join(", ")
        ));
    }

    // Experience (0.2): full marks at or above the level's minimum years,
    // proportional below it.
    let experience_score = score_experience(profile.experience_years, job.experience_level);
    if experience_score == 100 {
        reasons.push(format!(
            "Meets the {} experience bar with {} years",
            job.experience_level.as_str(),
            profile.experience_years
        ));
    }

    // Salary (0.2): full marks when the candidate's minimum fits under the
    // job's maximum; proportional (clamped) when it does not.
    let salary_score = score_salary(profile.salary_min, job.salary_max);
    if salary_score == 100 {
        reasons.push("Salary expectation is within the offered range".to_string());
    }

    // Location (0.1): direct match beats remote compatibility.
    let location_score = score_location(profile.location.as_deref(), job);
    match location_score {
        100 => reasons.push("Location matches the job posting".to_string()),
        80 => reasons.push("Remote role compatible with your location".to_string()),
        _ => {}
    }

    // Title/role bonus (0.1): any preferred role appearing in the job title.
    let title_score = score_title(&profile.preferred_roles, &job.title);
    if title_score == 100 {
        reasons.push(format!("Job title matches your preferred roles: {}", job.title));
    }

    let weighted = WEIGHT_SKILLS * f64::from(skills_score)
        + WEIGHT_EXPERIENCE * f64::from(experience_score)
        + WEIGHT_SALARY * f64::from(salary_score)
        + WEIGHT_LOCATION * f64::from(location_score)
        + WEIGHT_TITLE * f64::from(title_score);
    let score = (weighted.round() as i32).clamp(0, 100);

    if reasons.is_empty() {
        reasons.push("Limited overlap with this role based on your current profile".to_string());
    }

    MatchResult {
        score,
        reasons,
        details: MatchDetails {
            skills: skills_score,
            experience: experience_score,
            salary: salary_score,
            location: location_score,
            overall_fit: title_score,
        },
        scorer_backend: "rules".to_string(),
    }
}

/// Returns the skills sub-score and the required skills that were covered.
fn score_skills(profile_skills: &[String], required: &[String]) -> (i32, Vec<String>) {
    if required.is_empty() {
        return (0, Vec::new());
    }

    let profile_folded: Vec<String> = profile_skills.iter().map(|s| s.to_lowercase()).collect();

    let matched: Vec<String> = required
        .iter()
        .filter(|req| {
            let req_folded = req.to_lowercase();
            profile_folded
                .iter()
                .any(|skill| skill.contains(&req_folded) || req_folded.contains(skill.as_str()))
        })
        .cloned()
        .collect();

    let ratio = matched.len() as f64 / required.len() as f64;
    ((ratio * 100.0).round() as i32, matched)
}

fn score_experience(years: i32, level: ExperienceLevel) -> i32 {
    let threshold = level.min_years();
    if years >= threshold {
        100
    } else {
        // threshold > 0 here: entry level (threshold 0) always takes the
        // branch above for any non-negative years.
        ((f64::from(years.max(0)) / f64::from(threshold)) * 100.0).round() as i32
    }
}

fn score_salary(profile_min: Option<i64>, job_max: Option<i64>) -> i32 {
    match (profile_min, job_max) {
        (Some(pmin), Some(jmax)) => {
            if pmin <= jmax {
                100
            } else {
                // pmin > jmax >= 0, so pmin > 0 and the division is safe.
                (((jmax as f64 / pmin as f64) * 100.0).round() as i32).clamp(0, 100)
            }
        }
        _ => SALARY_UNKNOWN,
    }
}

fn score_location(profile_location: Option<&str>, job: &JobRow) -> i32 {
    let direct_match = match (profile_location, job.location.as_deref()) {
        (Some(p), Some(j)) if !p.is_empty() && !j.is_empty() => {
            let p = p.to_lowercase();
            let j = j.to_lowercase();
            p == j || p.contains(&j) || j.contains(&p)
        }
        _ => false,
    };

    if direct_match {
        100
    } else if job.location_type == LocationType::Remote {
        80
    } else {
        0
    }
}

fn score_title(preferred_roles: &[String], title: &str) -> i32 {
    let title_folded = title.to_lowercase();
    let hit = preferred_roles
        .iter()
        .any(|role| !role.is_empty() && title_folded.contains(&role.to_lowercase()));
    if hit {
        100
    } else {
        0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LlmMatchScorer — AI-backed primary strategy
// ────────────────────────────────────────────────────────────────────────────

/// Caps the job description text sent to the model, to bound external-call
/// cost and latency.
const JOB_DESCRIPTION_CHAR_LIMIT: usize = 1000;

/// Raw payload the model is instructed to return.
#[derive(Debug, Deserialize)]
struct AiScorePayload {
    score: f64,
    #[serde(default)]
    reasons: Vec<String>,
    #[serde(default)]
    details: AiDetails,
}

#[derive(Debug, Default, Deserialize)]
struct AiDetails {
    #[serde(default)]
    skills: f64,
    #[serde(default)]
    experience: f64,
    #[serde(default)]
    salary: f64,
    #[serde(default)]
    location: f64,
}

/// Semantic scorer via Claude. Every failure path — transport, API error,
/// empty content, malformed JSON — falls back to the rule-based scorer for
/// that (profile, job) pair. This fallback is mandatory, never optional.
pub struct LlmMatchScorer {
    llm: LlmClient,
}

impl LlmMatchScorer {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl MatchScorer for LlmMatchScorer {
    async fn score(&self, profile: &ProfileRow, job: &JobRow) -> MatchResult {
        let prompt = build_score_prompt(profile, job);

        match self
            .llm
            .call_json::<AiScorePayload>(&prompt, MATCH_SCORE_SYSTEM)
            .await
        {
            Ok(payload) => sanitize_ai_result(payload),
            Err(e) => {
                warn!(job_id = %job.id, "AI scoring unavailable, using rule-based fallback: {e}");
                compute_rule_based(profile, job)
            }
        }
    }
}

/// Builds the structured natural-language description of profile and job.
fn build_score_prompt(profile: &ProfileRow, job: &JobRow) -> String {
    let description: String = job.description.chars().take(JOB_DESCRIPTION_CHAR_LIMIT).collect();

    let profile_block = format!(
        "Headline: {}\nSummary: {}\nSkills: {}\nYears of experience: {}\nPreferred roles: {}\nLocation: {}\nMinimum salary: {}",
        profile.headline.as_deref().unwrap_or("n/a"),
        profile.summary.as_deref().unwrap_or("n/a"),
        profile.skills.join(", "),
        profile.experience_years,
        profile.preferred_roles.join(", "),
        profile.location.as_deref().unwrap_or("n/a"),
        profile
            .salary_min
            .map(|s| s.to_string())
            .unwrap_or_else(|| "n/a".to_string()),
    );

    let job_block = format!(
        "Title: {}\nCompany: {}\nRequired skills: {}\nExperience level: {}\nLocation: {} ({})\nMaximum salary: {}\nDescription: {}",
        job.title,
        job.company,
        job.skills_required.join(", "),
        job.experience_level.as_str(),
        job.location.as_deref().unwrap_or("n/a"),
        job.location_type.as_str(),
        job.salary_max
            .map(|s| s.to_string())
            .unwrap_or_else(|| "n/a".to_string()),
        description,
    );

    MATCH_SCORE_PROMPT_TEMPLATE
        .replace("{profile_block}", &profile_block)
        .replace("{job_block}", &job_block)
}

/// Clamps and rounds a raw model payload into a well-formed `MatchResult`.
fn sanitize_ai_result(payload: AiScorePayload) -> MatchResult {
    let clamp = |v: f64| (v.round() as i32).clamp(0, 100);

    let mut reasons: Vec<String> = payload
        .reasons
        .into_iter()
        .filter(|r| !r.trim().is_empty())
        .collect();
    if reasons.is_empty() {
        reasons.push("Scored by AI matching with no specific highlights".to_string());
    }

    MatchResult {
        score: clamp(payload.score),
        reasons,
        details: MatchDetails {
            skills: clamp(payload.details.skills),
            experience: clamp(payload.details.experience),
            salary: clamp(payload.details.salary),
            location: clamp(payload.details.location),
            overall_fit: 0,
        },
        scorer_backend: "ai".to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Batch scoring
// ────────────────────────────────────────────────────────────────────────────

/// Jobs scored concurrently per group; a fixed pause between groups keeps the
/// external API under its rate limit.
pub const SCORE_GROUP_SIZE: usize = 5;
pub const SCORE_GROUP_PAUSE_MS: u64 = 1000;

/// Scores a list of jobs for one profile in fixed-size groups. Failures are
/// isolated per job by the infallible `MatchScorer` contract: an AI outage on
/// one job degrades that job to the rule-based result, never the whole batch.
pub async fn score_batch(
    scorer: &dyn MatchScorer,
    profile: &ProfileRow,
    jobs: &[JobRow],
) -> Vec<(Uuid, MatchResult)> {
    let mut results = Vec::with_capacity(jobs.len());

    for (group_idx, group) in jobs.chunks(SCORE_GROUP_SIZE).enumerate() {
        if group_idx > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(SCORE_GROUP_PAUSE_MS)).await;
        }

        let scored = join_all(
            group
                .iter()
                .map(|job| async move { (job.id, scorer.score(profile, job).await) }),
        )
        .await;

        results.extend(scored);
    }

    results
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::{ExperienceLevel, JobStatus, JobType};
    use chrono::Utc;

    fn make_profile(
        skills: Vec<&str>,
        years: i32,
        salary_min: Option<i64>,
        location: Option<&str>,
        preferred_roles: Vec<&str>,
    ) -> ProfileRow {
        ProfileRow {
            user_id: Uuid::new_v4(),
            headline: None,
            summary: None,
            skills: skills.into_iter().map(String::from).collect(),
            experience_years: years,
            preferred_roles: preferred_roles.into_iter().map(String::from).collect(),
            location: location.map(String::from),
            salary_min,
            salary_max: None,
            salary_currency: None,
            updated_at: Utc::now(),
        }
    }

    fn make_job(
        title: &str,
        skills_required: Vec<&str>,
        experience_level: ExperienceLevel,
        salary_max: Option<i64>,
        location: Option<&str>,
        location_type: LocationType,
    ) -> JobRow {
        JobRow {
            id: Uuid::new_v4(),
            title: title.to_string(),
            company: "Acme".to_string(),
            description: "A role".to_string(),
            skills_required: skills_required.into_iter().map(String::from).collect(),
            salary_min: None,
            salary_max,
            experience_level,
            location: location.map(String::from),
            location_type,
            job_type: JobType::FullTime,
            status: JobStatus::Active,
            application_count: 0,
            posted_at: Utc::now(),
        }
    }

    #[test]
    fn test_reference_scenario_scores_78() {
        // Worked example: 1 of 2 skills (50), 4y vs mid (100), 80k ≤ 90k (100),
        // remote without a direct location match (80), title hit (100).
        let profile = make_profile(
            vec!["JavaScript", "React"],
            4,
            Some(80_000),
            Some("Remote"),
            vec!["Frontend Engineer"],
        );
        let job = make_job(
            "Frontend Engineer",
            vec!["React", "TypeScript"],
            ExperienceLevel::Mid,
            Some(90_000),
            None,
            LocationType::Remote,
        );

        let result = compute_rule_based(&profile, &job);
        assert_eq!(result.details.skills, 50);
        assert_eq!(result.details.experience, 100);
        assert_eq!(result.details.salary, 100);
        assert_eq!(result.details.location, 80);
        assert_eq!(result.details.overall_fit, 100);
        assert_eq!(result.score, 78);
        assert_eq!(result.scorer_backend, "rules");
    }

    #[test]
    fn test_rule_based_is_pure() {
        let profile = make_profile(vec!["Rust"], 6, Some(100_000), Some("Berlin"), vec![]);
        let job = make_job(
            "Backend Engineer",
            vec!["Rust", "Postgres"],
            ExperienceLevel::Senior,
            Some(120_000),
            Some("Berlin"),
            LocationType::Hybrid,
        );

        let a = compute_rule_based(&profile, &job);
        let b = compute_rule_based(&profile, &job);
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_skill_overlap_scores_zero_skills() {
        let profile = make_profile(vec!["Painting", "Sculpting"], 2, None, None, vec![]);
        let job = make_job(
            "Data Engineer",
            vec!["Spark", "Airflow"],
            ExperienceLevel::Mid,
            None,
            None,
            LocationType::Onsite,
        );

        let result = compute_rule_based(&profile, &job);
        assert_eq!(result.details.skills, 0);
    }

    #[test]
    fn test_skill_substring_matches_both_directions() {
        // "React" covers the requirement "React Native" and vice versa.
        let (score, matched) = score_skills(
            &["React".to_string()],
            &["React Native".to_string(), "Go".to_string()],
        );
        assert_eq!(score, 50);
        assert_eq!(matched, vec!["React Native".to_string()]);

        let (score, _) = score_skills(
            &["React Native".to_string()],
            &["React".to_string()],
        );
        assert_eq!(score, 100);
    }

    #[test]
    fn test_preferred_role_equal_to_title_scores_full_bonus() {
        let profile = make_profile(vec![], 0, None, None, vec!["Frontend Engineer"]);
        let job = make_job(
            "Frontend Engineer",
            vec![],
            ExperienceLevel::Entry,
            None,
            None,
            LocationType::Onsite,
        );

        let result = compute_rule_based(&profile, &job);
        assert_eq!(result.details.overall_fit, 100);
    }

    #[test]
    fn test_experience_below_threshold_is_proportional() {
        assert_eq!(score_experience(4, ExperienceLevel::Senior), 80);
        assert_eq!(score_experience(0, ExperienceLevel::Entry), 100);
        assert_eq!(score_experience(2, ExperienceLevel::Executive), 25);
    }

    #[test]
    fn test_salary_above_job_max_is_proportional_and_clamped() {
        assert_eq!(score_salary(Some(100_000), Some(50_000)), 50);
        assert_eq!(score_salary(Some(80_000), Some(90_000)), 100);
        // Missing data on either side is neutral, not a penalty.
        assert_eq!(score_salary(None, Some(90_000)), 50);
        assert_eq!(score_salary(Some(80_000), None), 50);
    }

    #[test]
    fn test_location_direct_match_beats_remote() {
        let profile = make_profile(vec![], 0, None, Some("Berlin, Germany"), vec![]);
        let job = make_job(
            "Engineer",
            vec![],
            ExperienceLevel::Entry,
            None,
            Some("berlin"),
            LocationType::Remote,
        );
        let result = compute_rule_based(&profile, &job);
        assert_eq!(result.details.location, 100);
    }

    #[test]
    fn test_empty_profile_still_in_range_with_fallback_reason() {
        let profile = make_profile(vec![], 0, None, None, vec![]);
        let job = make_job(
            "Engineer",
            vec!["Rust"],
            ExperienceLevel::Senior,
            Some(90_000),
            Some("Berlin"),
            LocationType::Onsite,
        );

        let result = compute_rule_based(&profile, &job);
        assert!((0..=100).contains(&result.score));
        assert!(!result.reasons.is_empty());
    }

    #[test]
    fn test_reasons_follow_evaluation_order() {
        let profile = make_profile(
            vec!["Rust"],
            10,
            Some(50_000),
            Some("Berlin"),
            vec!["Backend"],
        );
        let job = make_job(
            "Backend Engineer",
            vec!["Rust"],
            ExperienceLevel::Senior,
            Some(90_000),
            Some("Berlin"),
            LocationType::Onsite,
        );

        let result = compute_rule_based(&profile, &job);
        assert_eq!(result.reasons.len(), 5);
        assert!(result.reasons[0].contains("required skills"));
        assert!(result.reasons[1].contains("experience"));
        assert!(result.reasons[2].contains("Salary"));
        assert!(result.reasons[3].contains("Location"));
        assert!(result.reasons[4].contains("title"));
    }

    #[test]
    fn test_sanitize_ai_result_clamps_out_of_range_values() {
        let payload = AiScorePayload {
            score: 140.0,
            reasons: vec![],
            details: AiDetails {
                skills: -5.0,
                experience: 101.0,
                salary: 99.6,
                location: 80.0,
            },
        };

        let result = sanitize_ai_result(payload);
        assert_eq!(result.score, 100);
        assert_eq!(result.details.skills, 0);
        assert_eq!(result.details.experience, 100);
        assert_eq!(result.details.salary, 100);
        assert_eq!(result.details.location, 80);
        assert_eq!(result.scorer_backend, "ai");
        assert!(!result.reasons.is_empty());
    }

    #[test]
    fn test_prompt_truncates_long_descriptions() {
        let profile = make_profile(vec!["Rust"], 3, None, None, vec![]);
        let mut job = make_job(
            "Engineer",
            vec!["Rust"],
            ExperienceLevel::Mid,
            None,
            None,
            LocationType::Remote,
        );
        job.description = "x".repeat(5000);

        let prompt = build_score_prompt(&profile, &job);
        assert!(prompt.contains(&"x".repeat(JOB_DESCRIPTION_CHAR_LIMIT)));
        assert!(!prompt.contains(&"x".repeat(JOB_DESCRIPTION_CHAR_LIMIT + 1)));
    }

    // start_paused: the inter-group sleep auto-advances instead of stalling the test.
    #[tokio::test(start_paused = true)]
    async fn test_score_batch_scores_every_job_in_order() {
        let profile = make_profile(vec!["Rust"], 5, None, None, vec![]);
        let jobs: Vec<JobRow> = (0..7)
            .map(|_| {
                make_job(
                    "Engineer",
                    vec!["Rust"],
                    ExperienceLevel::Mid,
                    None,
                    None,
                    LocationType::Remote,
                )
            })
            .collect();

        let results = score_batch(&RuleBasedScorer, &profile, &jobs).await;

        assert_eq!(results.len(), 7);
        for ((job_id, result), job) in results.iter().zip(jobs.iter()) {
            assert_eq!(*job_id, job.id);
            assert!((0..=100).contains(&result.score));
        }
    }
}
