// All LLM prompt constants for the Matching module.

/// System prompt for match scoring — enforces JSON-only output.
pub const MATCH_SCORE_SYSTEM: &str =
    "You are an expert recruiter evaluating how well a candidate fits a job posting. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Match scoring prompt template.
/// Replace `{profile_block}` and `{job_block}` before sending.
pub const MATCH_SCORE_PROMPT_TEMPLATE: &str = r#"Evaluate the fit between the candidate profile and the job posting below.

Return a JSON object with this EXACT schema (no extra fields):
{
  "score": 78,
  "reasons": [
    "Short, human-readable reason, most relevant first"
  ],
  "details": {
    "skills": 50,
    "experience": 100,
    "salary": 100,
    "location": 80
  }
}

Rules:
- "score" is an integer 0-100 for overall fit.
- Every value in "details" is an integer 0-100 for that single dimension.
- "reasons" holds 2-5 short strings, ordered most relevant first.
- Judge skills semantically: equivalent technologies count as a match.
- Consider seniority, salary expectations, and location/remote compatibility.

CANDIDATE PROFILE:
{profile_block}

JOB POSTING:
{job_block}"#;
