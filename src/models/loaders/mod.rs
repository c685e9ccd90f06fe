pub mod session_file;
pub mod topic_index;

pub use session_file::{load_session_file, save_session_file};
pub use topic_index::{load_topic_index, save_topic_index};
