pub mod error;
pub mod insight;
pub mod sse;
pub mod traits;
pub mod types;

pub use error::DashError;
pub use insight::{
    build_messages, ChartType, InsightRequest, PromptPair, INSIGHT_MODEL, INSIGHT_TEMPERATURE,
};
pub use sse::{parse_data_line, RelayFrame, SseLineDecoder, DATA_PREFIX, DONE_SENTINEL};
pub use traits::{ChatChunk, ChatMessage, ChatRole, ChunkStream, LlmProvider, LlmRequest};
pub use types::{
    DashboardSummary, Project, ProjectStatus, RiskIdentification, RiskLevel, SessionClaims, User,
    UserProfile,
};
