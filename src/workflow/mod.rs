pub mod batch_planner;
pub mod quota;
pub mod remapper;
pub mod session_restorer;

pub use batch_planner::plan_next_batch;
pub use quota::{count_for, counts_from_artifacts, TopicCounts};
pub use remapper::{remap, remap_strict};
pub use session_restorer::{restore, resume_cursor, RestoredSession};
