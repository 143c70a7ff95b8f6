use crate::{
    agents::{Agent, AgentRegistry},
    db::SlotStore,
    memory::{
        format_memory_context, ConversationSummarizer, LLMSummarizer, LocalJsonStore,
        MemoryManager,
    },
    tools,
    types::{AppError, ConversationState, ExecuteRequest, ExecuteResponse, MemoryBundle, Result},
    utils::MedrouteConfig,
};
use std::sync::Arc;

/// Handles one patient turn end to end.
///
/// Memory is loaded before routing and summarized afterwards. Memory failures
/// are logged and never fail the turn; the routing hierarchy always leaves a
/// final answer in the log.
pub struct ConciergeService {
    top: Arc<dyn Agent>,
    memory: Arc<MemoryManager>,
    summarizer: Arc<dyn ConversationSummarizer>,
}

impl ConciergeService {
    /// Service over an existing hierarchy, memory manager and summarizer.
    pub fn new(
        top: Arc<dyn Agent>,
        memory: Arc<MemoryManager>,
        summarizer: Arc<dyn ConversationSummarizer>,
    ) -> Self {
        Self {
            top,
            memory,
            summarizer,
        }
    }

    /// Wire the full stack from configuration: slot database, tools, LLM
    /// client, agent hierarchy and memory.
    pub async fn from_config(config: &MedrouteConfig) -> Result<Self> {
        let store = Arc::new(SlotStore::new_local(&config.database.path).await?);
        let tools = Arc::new(tools::domain_registry(store));

        let provider = config.provider()?;
        tracing::info!(provider = provider.name(), model = provider.model(), "using LLM provider");
        let llm = provider.create_client(&config.llm.client_options())?;

        let registry = AgentRegistry::from_config(&config.orchestration, llm.clone(), tools);

        let memory = MemoryManager::new(Arc::new(LocalJsonStore::new(&config.memory.root)))
            .with_files(&config.memory.memory_file, &config.memory.profiles_file)
            .with_history_window(config.memory.history_window);

        Ok(Self::new(
            Arc::new(registry.top_supervisor()),
            Arc::new(memory),
            Arc::new(LLMSummarizer::new(llm)),
        ))
    }

    /// Memory manager used by the service.
    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    /// Handle one patient message. Only an empty message is rejected.
    pub async fn execute(&self, request: ExecuteRequest) -> Result<ExecuteResponse> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(AppError::InvalidInput("message must not be empty".to_string()));
        }
        let patient_id = request.patient_id;

        let bundle = match self.memory.load_bundle(patient_id).await {
            Ok(bundle) => bundle,
            Err(e) => {
                tracing::warn!(patient_id, error = %e, "failed to load memory, continuing without it");
                MemoryBundle::default()
            }
        };
        if !bundle.is_empty() {
            tracing::debug!(patient_id, verified = bundle.is_verified(), "memory loaded");
        }

        let mut state = ConversationState::new(patient_id, message, format_memory_context(&bundle));
        self.top.execute(&mut state).await?;

        tracing::info!(
            patient_id,
            steps_taken = state.steps_taken,
            messages = state.messages.len(),
            "turn complete"
        );

        if let Err(e) = self
            .memory
            .summarize_and_store(patient_id, &state.messages, self.summarizer.as_ref())
            .await
        {
            tracing::warn!(patient_id, error = %e, "failed to update memory");
        }

        Ok(ExecuteResponse {
            messages: state.messages,
        })
    }
}
