//! AI text generation: provider clients behind one fallback policy.

pub mod classify;
pub mod error;
pub mod fallback;
pub mod gemini;
pub mod mistral;
pub mod provider;


pub use error::FallbackError;
pub use fallback::{Completion, FallbackCaller};
pub use provider::{CallRequest, ProviderKind};
