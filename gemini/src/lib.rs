//! Gemini `generateContent` client backing the vault's metadata lookups and
//! description rewrites.

mod client;
mod wire;

pub use client::GeminiClient;
pub use client::lookup_prompt;
pub use client::polish_prompt;
