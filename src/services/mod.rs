pub mod document_extractor;
pub mod llm_service;
pub mod question_generator;
pub mod response_parser;
pub mod topic_detector;

pub use document_extractor::{DocumentExtractor, ExtractedDocument};
pub use llm_service::LlmService;
pub use question_generator::{GenerationRequest, LlmQuestionGenerator, QuestionGenerator};
pub use topic_detector::{scan_index, TopicDetector};
