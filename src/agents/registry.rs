//! Agent Registry
//!
//! Builds the fixed routing hierarchy from shared dependencies. Every agent
//! is constructed fresh from the same LLM client, tool registry and route
//! classifier, so tests can swap any of them for a scripted double.

use crate::agents::{prompts, Agent, LLMRouteClassifier, RouteClassifier, ToolWorker};
use crate::llm::{LLMClient, ToolCallingConfig, ToolCoordinator};
use crate::tools::{self, registry::ToolRegistry};
use crate::types::Producer;
use crate::utils::toml_config::OrchestrationConfig;
use crate::workflows::{GraphPolicy, SupervisorGraph};
use std::sync::Arc;

/// Route label of the doctor team supervisor.
pub const DOCTOR_AGENT: &str = "doctor_agent";
/// Route label of the lab team supervisor.
pub const LAB_AGENT: &str = "lab_agent";
/// Route label of the doctor availability worker.
pub const INFORMATION_NODE: &str = "information_node";
/// Route label of the doctor booking worker.
pub const BOOKING_NODE: &str = "booking_node";
/// Route label of the lab booking worker.
pub const LAB_BOOKING_NODE: &str = "lab_booking_node";
/// Route label of the lab availability worker.
pub const LAB_INFO_NODE: &str = "lab_availability_and_info_node";

/// Factory for the supervisor hierarchy and its workers.
pub struct AgentRegistry {
    /// Shared LLM client for every worker
    llm: Arc<dyn LLMClient>,
    /// Tool registry shared across workers
    tool_registry: Arc<ToolRegistry>,
    /// Classifier used by every supervisor
    classifier: Arc<dyn RouteClassifier>,
    /// Hop ceiling, finish hint and apology text
    settings: OrchestrationConfig,
}

impl AgentRegistry {
    /// Create a registry whose supervisors classify with `llm`.
    pub fn new(llm: Arc<dyn LLMClient>, tool_registry: Arc<ToolRegistry>) -> Self {
        Self {
            classifier: Arc::new(LLMRouteClassifier::new(llm.clone())),
            llm,
            tool_registry,
            settings: OrchestrationConfig::default(),
        }
    }

    /// Create a registry from the `[orchestration]` section.
    pub fn from_config(
        settings: &OrchestrationConfig,
        llm: Arc<dyn LLMClient>,
        tool_registry: Arc<ToolRegistry>,
    ) -> Self {
        Self::new(llm, tool_registry).with_settings(settings.clone())
    }

    /// Replace the orchestration settings.
    pub fn with_settings(mut self, settings: OrchestrationConfig) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the route classifier for every supervisor.
    pub fn with_classifier(mut self, classifier: Arc<dyn RouteClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    fn coordinator(&self) -> Arc<ToolCoordinator> {
        Arc::new(ToolCoordinator::new(
            self.llm.clone(),
            self.tool_registry.clone(),
            ToolCallingConfig {
                max_iterations: self.settings.max_tool_iterations,
            },
        ))
    }

    /// Worker answering doctor availability questions.
    pub fn doctor_info_worker(&self) -> ToolWorker {
        ToolWorker::new(
            INFORMATION_NODE,
            "Looks up doctor and specialization availability",
            Producer::DoctorInfoWorker,
            prompts::DOCTOR_INFO_PROMPT,
            vec![
                tools::CHECK_AVAILABILITY_BY_DOCTOR,
                tools::CHECK_AVAILABILITY_BY_SPECIALIZATION,
            ],
            self.coordinator(),
        )
    }

    /// Worker that books, cancels and reschedules appointments.
    pub fn doctor_booking_worker(&self) -> ToolWorker {
        ToolWorker::new(
            BOOKING_NODE,
            "Books, cancels and reschedules doctor appointments",
            Producer::DoctorBookingWorker,
            prompts::DOCTOR_BOOKING_PROMPT,
            vec![
                tools::SET_APPOINTMENT,
                tools::CANCEL_APPOINTMENT,
                tools::RESCHEDULE_APPOINTMENT,
            ],
            self.coordinator(),
        )
    }

    /// Worker that reserves lab slots.
    pub fn lab_booking_worker(&self) -> ToolWorker {
        ToolWorker::new(
            LAB_BOOKING_NODE,
            "Reserves lab test slots",
            Producer::LabBookingWorker,
            prompts::LAB_BOOKING_PROMPT,
            vec![tools::CREATE_LAB_BOOKING_REQUEST],
            self.coordinator(),
        )
    }

    /// Worker listing lab slots and prerequisites.
    pub fn lab_info_worker(&self) -> ToolWorker {
        ToolWorker::new(
            LAB_INFO_NODE,
            "Lists open lab slots and test prerequisites",
            Producer::LabInfoWorker,
            prompts::LAB_INFO_PROMPT,
            vec![
                tools::CHECK_LAB_AVAILABILITY,
                tools::VALIDATE_TEST_PREREQUISITES,
            ],
            self.coordinator(),
        )
    }

    fn domain_policy(&self) -> GraphPolicy {
        GraphPolicy::domain_level(
            self.settings.max_hops,
            self.settings.finish_hint_after,
            self.settings.apology_message.clone(),
        )
    }

    /// Supervisor of the doctor workers.
    pub fn doctor_supervisor(&self) -> SupervisorGraph {
        SupervisorGraph::new(
            DOCTOR_AGENT,
            "Doctor availability, fees and appointment changes",
            Producer::DoctorSupervisor,
            prompts::DOCTOR_SUPERVISOR_PROMPT,
            vec![
                Arc::new(self.doctor_info_worker()) as Arc<dyn Agent>,
                Arc::new(self.doctor_booking_worker()),
            ],
            self.classifier.clone(),
            self.domain_policy(),
        )
    }

    /// Supervisor of the lab workers.
    pub fn lab_supervisor(&self) -> SupervisorGraph {
        SupervisorGraph::new(
            LAB_AGENT,
            "Lab test availability, prerequisites and bookings",
            Producer::LabSupervisor,
            prompts::LAB_SUPERVISOR_PROMPT,
            vec![
                Arc::new(self.lab_booking_worker()) as Arc<dyn Agent>,
                Arc::new(self.lab_info_worker()),
            ],
            self.classifier.clone(),
            self.domain_policy(),
        )
    }

    /// Entry point of a turn.
    pub fn top_supervisor(&self) -> SupervisorGraph {
        SupervisorGraph::new(
            "top_supervisor",
            "Routes a patient turn to the doctor or lab team",
            Producer::TopSupervisor,
            prompts::TOP_SUPERVISOR_PROMPT,
            vec![
                Arc::new(self.doctor_supervisor()) as Arc<dyn Agent>,
                Arc::new(self.lab_supervisor()),
            ],
            self.classifier.clone(),
            GraphPolicy::top_level(
                self.settings.max_hops,
                self.settings.finish_hint_after,
                self.settings.apology_message.clone(),
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SlotStore;
    use crate::llm::{ConversationMessage, LLMResponse, StructuredSchema};
    use crate::types::{Result, ToolDefinition};
    use async_trait::async_trait;
    use serde_json::Value;

    struct Unused;

    #[async_trait]
    impl LLMClient for Unused {
        async fn generate_with_history(&self, _: &[ConversationMessage]) -> Result<String> {
            Ok(String::new())
        }
        async fn generate_with_tools_and_history(
            &self,
            _: &[ConversationMessage],
            _: &[ToolDefinition],
        ) -> Result<LLMResponse> {
            unreachable!()
        }
        async fn generate_structured(
            &self,
            _: &[ConversationMessage],
            _: &StructuredSchema,
        ) -> Result<Value> {
            unreachable!()
        }
        fn model_name(&self) -> &str {
            "unused"
        }
    }

    async fn registry() -> (AgentRegistry, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SlotStore::new_local(dir.path().join("slots.db")).await.unwrap();
        let tools = Arc::new(tools::domain_registry(Arc::new(store)));
        (AgentRegistry::new(Arc::new(Unused), tools), dir)
    }

    #[tokio::test]
    async fn test_top_supervisor_routes_to_domains() {
        let (registry, _dir) = registry().await;
        let top = registry.top_supervisor();

        assert_eq!(top.route_options(), vec![DOCTOR_AGENT, LAB_AGENT, "FINISH"]);
        assert!(top.policy().emit_final_answer);
        assert!(top.policy().finish_when_worker_replied);
    }

    #[tokio::test]
    async fn test_domain_supervisors_route_to_workers() {
        let (registry, _dir) = registry().await;

        let doctor = registry.doctor_supervisor();
        assert_eq!(doctor.route_options(), vec![INFORMATION_NODE, BOOKING_NODE, "FINISH"]);
        assert!(!doctor.policy().emit_final_answer);

        let lab = registry.lab_supervisor();
        assert_eq!(lab.route_options(), vec![LAB_BOOKING_NODE, LAB_INFO_NODE, "FINISH"]);
    }

    #[tokio::test]
    async fn test_worker_tool_sets_are_disjoint() {
        let (registry, _dir) = registry().await;
        let booking = registry.doctor_booking_worker();
        let info = registry.doctor_info_worker();

        assert!(booking.allowed_tools().contains(&tools::SET_APPOINTMENT));
        assert!(!info.allowed_tools().contains(&tools::SET_APPOINTMENT));
        assert_eq!(registry.lab_booking_worker().allowed_tools().len(), 1);
    }
}
