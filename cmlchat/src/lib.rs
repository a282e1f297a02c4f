
//! Chat front-end: a language model picks a lab template, the provisioning workflow builds it.

pub mod intent;
pub mod gemini;
pub mod frontend;
pub mod server;

pub use frontend::ChatFrontEnd;
pub use gemini::{GeminiClient, GeminiClientConfig};
