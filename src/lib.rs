pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod research;
pub mod search;
pub mod utils;
pub mod workflow;

// Re-export commonly used types
pub use config::Config;
pub use error::{ResearchError, ResearchResult};
pub use research::{Answer, ResearchOptions, ResearchOrchestrator};
pub use workflow::launch;
