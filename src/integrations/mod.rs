//! External integrations module.
//!
//! Provides clients for:
//! - Google Gemini (structured sentiment reports)

pub mod gemini;

pub use gemini::GeminiClient;
