//! Skin photo and symptom triage backend: heuristic image cues, keyword
//! scoring over free text, and optional hosted models, composed into a
//! single non-diagnostic explanation.

pub mod caption;
pub mod classify;
pub mod compose;
pub mod config;
pub mod error;
pub mod explain;
pub mod imaging;
pub mod inference;
pub mod keywords;
pub mod routes;

pub use config::Config;
pub use error::AppError;
pub use routes::{router, AppState};
