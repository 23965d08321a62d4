pub mod conversation;
pub mod executor;
pub mod intent;
pub mod llm;
pub mod plan;
pub mod services;
pub mod synthesis;
