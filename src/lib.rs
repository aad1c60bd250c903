pub mod app;
pub mod cache;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod gazetteer;
pub mod graph;
pub mod ingest;
pub mod intent;
pub mod knowledge;
pub mod metrics;
pub mod respond;
pub mod search;
pub mod server;
pub mod text;
pub mod watch;

pub use app::AppContext;
pub use chat::{Answer, Assistant};
pub use config::Config;
pub use error::{AssistError, Result};
pub use knowledge::KnowledgeStore;
