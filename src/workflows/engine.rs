//! Supervisor graph
//!
//! A supervisor is a small state machine: route, delegate, route again, until
//! the classifier picks `FINISH` or a guard ends the loop.

use crate::agents::{prompts, Agent, RouteClassifier, RoutingRequest, FINISH};
use crate::types::{AppError, ChatEntry, ConversationState, Producer, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Reply used whenever a turn cannot produce a grounded answer.
pub const DEFAULT_APOLOGY: &str = "We're not able to assist you now with your query, please contact +94773531234. Have a great day!";

/// Limits and termination behaviour for one supervisor.
#[derive(Debug, Clone)]
pub struct GraphPolicy {
    /// Routing calls allowed per turn, counted across every supervisor
    pub max_hops: u32,
    /// Step count from which routing prompts push for `FINISH`
    pub finish_hint_after: u32,
    /// Stop as soon as any worker has replied, without asking the classifier
    pub finish_when_worker_replied: bool,
    /// Append a `FinalAnswer` entry and absorb errors on termination
    pub emit_final_answer: bool,
    /// Patient-facing text used when no worker reply is available
    pub apology: String,
}

impl GraphPolicy {
    /// Policy for the entry supervisor of a turn.
    pub fn top_level(max_hops: u32, finish_hint_after: u32, apology: impl Into<String>) -> Self {
        Self {
            max_hops,
            finish_hint_after,
            finish_when_worker_replied: true,
            emit_final_answer: true,
            apology: apology.into(),
        }
    }

    /// Policy for a supervisor nested under another one.
    pub fn domain_level(max_hops: u32, finish_hint_after: u32, apology: impl Into<String>) -> Self {
        Self {
            max_hops,
            finish_hint_after,
            finish_when_worker_replied: false,
            emit_final_answer: false,
            apology: apology.into(),
        }
    }
}

impl Default for GraphPolicy {
    fn default() -> Self {
        Self::top_level(20, 10, DEFAULT_APOLOGY)
    }
}

/// Why a supervisor stopped.
#[derive(Debug)]
pub enum Termination {
    /// The classifier chose `FINISH`
    Finished,
    /// A worker already answered this turn
    WorkerReplied,
    /// The turn ran out of routing steps
    Ceiling,
    /// Routing or delegation failed
    Failed(AppError),
}

impl Termination {
    fn label(&self) -> &'static str {
        match self {
            Termination::Finished => "finished",
            Termination::WorkerReplied => "worker_replied",
            Termination::Ceiling => "ceiling",
            Termination::Failed(_) => "failed",
        }
    }
}

enum GraphState {
    Routing,
    Delegating(usize),
    Terminated(Termination),
}

/// A parsed route label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// End this supervisor's loop
    Finish,
    /// Hand the turn to the worker at this index
    Delegate(usize),
}

/// Supervisor that delegates to child agents chosen by a [`RouteClassifier`].
pub struct SupervisorGraph {
    name: String,
    description: String,
    producer: Producer,
    system_prompt: String,
    workers: Vec<Arc<dyn Agent>>,
    classifier: Arc<dyn RouteClassifier>,
    policy: GraphPolicy,
}

impl SupervisorGraph {
    /// Supervisor delegating to `workers` under `policy`.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        producer: Producer,
        system_prompt: impl Into<String>,
        workers: Vec<Arc<dyn Agent>>,
        classifier: Arc<dyn RouteClassifier>,
        policy: GraphPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            producer,
            system_prompt: system_prompt.into(),
            workers,
            classifier,
            policy,
        }
    }

    /// Termination and output policy.
    pub fn policy(&self) -> &GraphPolicy {
        &self.policy
    }

    /// Labels this supervisor accepts, `FINISH` last.
    pub fn route_options(&self) -> Vec<String> {
        self.workers
            .iter()
            .map(|w| w.name().to_string())
            .chain(std::iter::once(FINISH.to_string()))
            .collect()
    }

    /// Parse a classifier label. Only exact child names and `FINISH` are
    /// accepted; surrounding whitespace is ignored.
    pub fn parse_route(&self, label: &str) -> Result<Route> {
        let label = label.trim();
        if label == FINISH {
            return Ok(Route::Finish);
        }
        self.workers
            .iter()
            .position(|w| w.name() == label)
            .map(Route::Delegate)
            .ok_or_else(|| {
                AppError::MalformedDecision(format!(
                    "{} cannot route to '{}'",
                    self.producer, label
                ))
            })
    }

    async fn route(&self, state: &mut ConversationState) -> GraphState {
        if state.steps_taken >= self.policy.max_hops {
            tracing::warn!(
                supervisor = %self.producer,
                steps_taken = state.steps_taken,
                max_hops = self.policy.max_hops,
                "routing ceiling reached"
            );
            return GraphState::Terminated(Termination::Ceiling);
        }

        if self.policy.finish_when_worker_replied && state.has_worker_reply() {
            tracing::info!(supervisor = %self.producer, "worker already replied, finishing");
            return GraphState::Terminated(Termination::WorkerReplied);
        }

        let request = RoutingRequest {
            supervisor: self.producer,
            options: self.route_options(),
            messages: prompts::routing_messages(
                &self.system_prompt,
                state,
                self.policy.max_hops,
                self.policy.finish_hint_after,
            ),
            steps_taken: state.steps_taken,
        };

        let decision = match self.classifier.classify(&request).await {
            Ok(decision) => decision,
            Err(e) => return GraphState::Terminated(Termination::Failed(e)),
        };
        state.steps_taken += 1;

        let route = match self.parse_route(&decision.next) {
            Ok(route) => route,
            Err(e) => return GraphState::Terminated(Termination::Failed(e)),
        };

        let label = decision.next.trim().to_string();
        tracing::info!(
            supervisor = %self.producer,
            hop = state.steps_taken,
            route = %label,
            "routing decision"
        );

        state.push(
            self.producer,
            format!(
                "Supervisor routed to {}. Reasoning: {} Instructions: {}",
                label, decision.reasoning, decision.instructions
            ),
        );
        state.next = Some(label);
        state.current_reasoning = decision.reasoning;
        state.current_instructions = decision.instructions;

        match route {
            Route::Finish => GraphState::Terminated(Termination::Finished),
            Route::Delegate(index) => GraphState::Delegating(index),
        }
    }

    async fn delegate(&self, index: usize, state: &mut ConversationState) -> GraphState {
        let worker = &self.workers[index];
        let started = Instant::now();

        match worker.execute(state).await {
            Ok(()) => {
                tracing::debug!(
                    supervisor = %self.producer,
                    agent = worker.name(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "delegation complete"
                );
                GraphState::Routing
            }
            Err(e) => GraphState::Terminated(Termination::Failed(e)),
        }
    }

    fn conclude(&self, termination: Termination, state: &mut ConversationState) -> Result<()> {
        match &termination {
            Termination::Failed(e) => tracing::error!(
                supervisor = %self.producer,
                patient_id = state.patient_id,
                error = %e,
                "supervisor failed"
            ),
            other => tracing::info!(
                supervisor = %self.producer,
                steps_taken = state.steps_taken,
                reason = other.label(),
                "supervisor done"
            ),
        }

        if !self.policy.emit_final_answer {
            return match termination {
                Termination::Failed(e) => Err(e),
                _ => Ok(()),
            };
        }

        let answer = match termination {
            Termination::Failed(_) => self.policy.apology.clone(),
            _ => extract_final_answer(&state.messages, &self.policy.apology),
        };
        state.push(Producer::FinalAnswer, answer);
        Ok(())
    }
}

#[async_trait]
impl Agent for SupervisorGraph {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn producer(&self) -> Producer {
        self.producer
    }

    async fn execute(&self, state: &mut ConversationState) -> Result<()> {
        let mut step = GraphState::Routing;
        let termination = loop {
            step = match step {
                GraphState::Routing => self.route(state).await,
                GraphState::Delegating(index) => self.delegate(index, state).await,
                GraphState::Terminated(termination) => break termination,
            };
        };
        self.conclude(termination, state)
    }
}

/// Text to hand back to the patient: the latest worker reply, else the
/// latest final answer, else the apology. Routing summaries never qualify.
pub fn extract_final_answer(messages: &[ChatEntry], apology: &str) -> String {
    let latest = |pred: fn(&Producer) -> bool| {
        messages
            .iter()
            .rev()
            .find(|m| pred(&m.producer) && !m.content.trim().is_empty())
            .map(|m| m.content.clone())
    };

    latest(Producer::is_worker)
        .or_else(|| latest(|p| *p == Producer::FinalAnswer))
        .unwrap_or_else(|| apology.to_string())
}
