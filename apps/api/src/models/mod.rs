pub mod application;
pub mod job;
pub mod matching;
pub mod preferences;
pub mod profile;
