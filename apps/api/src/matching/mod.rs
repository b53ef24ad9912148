// Matching core: AI-backed scoring with a deterministic fallback, plus the
// persisted per-(user, job) match cache the listing and auto-apply paths read.
// All LLM calls go through llm_client — no direct Anthropic calls here.

pub mod cache;
pub mod handlers;
pub mod prompts;
pub mod scorer;
