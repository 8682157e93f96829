pub mod providers;

pub use providers::build_provider;
pub use providers::mock::{ScriptedProvider, Step};
pub use providers::openai::OpenAiCompatProvider;
