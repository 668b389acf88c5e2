pub mod client;
pub mod prompts;
pub mod recovery;
pub mod types;

pub use client::*;
pub use prompts::{build_identity_prompt, build_metrics_prompt};
pub use recovery::*;
pub use types::*;
