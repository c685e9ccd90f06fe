pub mod artifact;
pub mod loaders;
pub mod schedule;
pub mod settings;
pub mod topic;

pub use artifact::{Artifact, RawArtifact, OPTION_ARITY};
pub use loaders::{load_session_file, load_topic_index, save_session_file, save_topic_index};
pub use schedule::{BatchPlan, BatchRequest, Phase, TopicQuota};
pub use settings::{GenerationStrategy, OutputLanguage};
pub use topic::{Topic, TopicEntry, TopicRegistry};
