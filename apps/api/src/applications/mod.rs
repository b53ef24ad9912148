// Applications: direct apply and the quota-bounded auto-apply selector.
// Duplicate prevention rests on the (user_id, job_id) unique constraint.

pub mod handlers;
pub mod selector;
