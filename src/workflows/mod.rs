//! Workflow Engine Module
//!
//! Routing is a two-level hierarchy of supervisors. Each level runs the same
//! loop:
//!
//! ```text
//! Routing ──classify──▶ Delegating(child) ──reply──▶ Routing
//!    │
//!    └── FINISH | worker replied | hop ceiling | error ──▶ Terminated
//! ```
//!
//! The entry supervisor stops as soon as a worker has answered, and always
//! appends a final answer, falling back to a fixed apology when no worker
//! reply exists or something failed. Nested supervisors hand errors to their
//! parent instead.
//!
//! # Usage
//!
//! ```ignore
//! let top = registry.top_supervisor();
//! let mut state = ConversationState::new(42, "Book Dr. Wilson tomorrow", String::new());
//! top.execute(&mut state).await?;
//! println!("{}", state.messages.last().unwrap().content);
//! ```

pub mod engine;

pub use engine::{
    extract_final_answer, GraphPolicy, Route, SupervisorGraph, Termination, DEFAULT_APOLOGY,
};
