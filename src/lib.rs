//! # medroute
//!
//! A multi-agent concierge that answers doctor-appointment and lab-test
//! questions for a patient. Each turn is routed through a two-level
//! hierarchy of supervisors down to tool-calling workers that read and
//! update a local slot database, and a short summary of the conversation is
//! kept per patient between turns.
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use medroute::{ConciergeService, ExecuteRequest, MedrouteConfig};
//!
//! #[tokio::main]
//! async fn main() -> medroute::Result<()> {
//!     let config = MedrouteConfig::load("medroute.toml")?;
//!     let service = ConciergeService::from_config(&config).await?;
//!
//!     let response = service
//!         .execute(ExecuteRequest {
//!             patient_id: 1000082,
//!             message: "Is Dr. Sarah Wilson available on 18-12-2024?".to_string(),
//!         })
//!         .await?;
//!     println!("{}", response.final_answer().unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! ### Custom wiring
//!
//! ```rust,ignore
//! use medroute::{AgentRegistry, SlotStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(SlotStore::new_local("./data/medroute.db").await?);
//! let tools = Arc::new(medroute::tools::domain_registry(store));
//! let registry = AgentRegistry::new(llm, tools).with_classifier(my_classifier);
//! let top = registry.top_supervisor();
//! ```
//!
//! ## Modules
//!
//! - [`agents`] - Supervisors, workers and the per-turn service
//! - [`db`] - Doctor appointment and lab test slot storage
//! - [`llm`] - LLM client and tool-calling loop
//! - [`memory`] - Long-term patient memory
//! - [`tools`] - Slot tools exposed to workers
//! - [`workflows`] - Supervisor state machine
//! - [`types`] - Common types and error handling

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// Agent hierarchy and turn orchestration.
pub mod agents;
/// Command-line interface.
pub mod cli;
/// Slot database.
pub mod db;
/// LLM provider clients and abstractions.
pub mod llm;
/// Long-term patient memory.
pub mod memory;
/// Slot tools for doctor and lab workers.
pub mod tools;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;
/// Supervisor state machine.
pub mod workflows;

// Re-export commonly used types
pub use agents::{AgentRegistry, ConciergeService};
pub use db::SlotStore;
pub use llm::{LLMClient, LLMResponse, Provider};
pub use tools::registry::ToolRegistry;
pub use types::{AppError, ExecuteRequest, ExecuteResponse, Result};
pub use utils::MedrouteConfig;
pub use workflows::{GraphPolicy, SupervisorGraph};
