//! Agents of the routing hierarchy.
//!
//! ```text
//! top supervisor
//! ├── doctor supervisor ── doctor info worker | doctor booking worker
//! └── lab supervisor ───── lab booking worker | lab info worker
//! ```
//!
//! Supervisors are [`SupervisorGraph`](crate::workflows::SupervisorGraph)s; the
//! leaves are [`ToolWorker`]s. Both implement [`Agent`], so a supervisor can
//! delegate to either kind.

/// Per-turn service: memory in, routing, memory out.
pub mod orchestrator;
pub mod prompts;
pub mod registry;
/// Route classification for supervisors.
pub mod router;
/// Tool-calling leaf workers.
pub mod worker;

use crate::types::{ConversationState, Producer, Result};
use async_trait::async_trait;

pub use orchestrator::ConciergeService;
pub use registry::AgentRegistry;
pub use router::{LLMRouteClassifier, RouteClassifier, RoutingRequest, FINISH};
pub use worker::{ToolWorker, NO_ANSWER_REPLY};

/// Base trait for every node a supervisor can delegate to.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Route label the parent supervisor uses for this agent
    fn name(&self) -> &str;

    /// One-line capability summary shown to the parent's routing call
    fn description(&self) -> &str;

    /// Identity recorded on the messages this agent appends
    fn producer(&self) -> Producer;

    /// Handle one delegation, appending to the conversation log.
    async fn execute(&self, state: &mut ConversationState) -> Result<()>;
}
