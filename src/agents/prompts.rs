//! Prompt text and message assembly for supervisors and workers.

use crate::llm::ConversationMessage;
use crate::types::{ConversationState, Producer};

/// System prompt of the top supervisor.
pub const TOP_SUPERVISOR_PROMPT: &str = "You are the top-level supervisor of a medical assistant. \
You never answer the patient yourself; you route each turn to the right team.\n\
- doctor_agent: doctor availability, fees, booking, cancelling or rescheduling appointments.\n\
- lab_agent: lab test availability, prices, preparation requirements and lab bookings.\n\
- FINISH: the patient's request has been answered or nothing further can be done.\n\
If a specialist has already answered the current request, choose FINISH.";

/// System prompt of the doctor supervisor.
pub const DOCTOR_SUPERVISOR_PROMPT: &str = "You supervise the doctor appointment team. \
You never answer the patient yourself; you route each turn to one worker.\n\
- information_node: availability of a doctor or a specialization on a date, and fees.\n\
- booking_node: booking, cancelling or rescheduling a concrete appointment.\n\
If the request mixes information and an action, prefer booking_node. \
Choose FINISH once the request is answered or an outcome has been confirmed.";

/// System prompt of the lab supervisor.
pub const LAB_SUPERVISOR_PROMPT: &str = "You supervise the lab test team. \
You never answer the patient yourself; you route each turn to one worker.\n\
- lab_booking_node: reserving a lab test slot.\n\
- lab_availability_and_info_node: open lab slots, prices and test prerequisites.\n\
Choose FINISH once the request is answered or an outcome has been confirmed.";

/// System prompt of the doctor availability worker.
pub const DOCTOR_INFO_PROMPT: &str = "You are the information specialist for doctor appointments. \
Use the tools to look up real availability; never invent times, doctors or fees. \
If a tool reports no availability, say so plainly. Ask only for details that are missing. \
Lab questions are handled by another team.";

/// System prompt of the doctor booking worker.
pub const DOCTOR_BOOKING_PROMPT: &str = "You are the booking specialist for doctor appointments. \
Book, cancel or reschedule using the tools and report exactly what the tool returned. \
Never claim a booking, cancellation or fee the tools did not confirm. \
Dates use DD-MM-YYYY and slots use DD-MM-YYYY HH:MM.";

/// System prompt of the lab booking worker.
pub const LAB_BOOKING_PROMPT: &str = "You are the lab booking specialist. \
Reserve lab test slots with the tool and relay the booking reference and amount it returns. \
If the slot is unavailable, say so; do not invent alternatives. \
Slots use DD-MM-YYYY HH:MM.";

/// System prompt of the lab availability worker.
pub const LAB_INFO_PROMPT: &str = "You are the lab information specialist. \
Use the tools to list open lab slots and test preparation requirements. \
Only state prices, times and prerequisites that the tools returned.";

/// Messages for one routing call.
pub fn routing_messages(
    system_prompt: &str,
    state: &ConversationState,
    max_hops: u32,
    finish_hint_after: u32,
) -> Vec<ConversationMessage> {
    let mut status = format!(
        "Patient identification number is {}. Steps completed: {}. Maximum allowed: {}.",
        state.patient_id, state.steps_taken, max_hops
    );
    if state.steps_taken >= finish_hint_after {
        status.push_str(" You have used many steps; route to FINISH now.");
    }

    let mut messages = vec![
        ConversationMessage::system(system_prompt),
        ConversationMessage::system(status),
    ];
    if !state.memory_context.is_empty() {
        messages.push(ConversationMessage::system(format!(
            "Persistent memory context:\n{}",
            state.memory_context
        )));
    }
    messages.extend(conversation_messages(state));
    messages
}

/// Messages for one worker turn.
pub fn worker_messages(system_prompt: &str, state: &ConversationState) -> Vec<ConversationMessage> {
    let mut system = format!(
        "{}\n\nThe patient's identification number is {}; it is already known, do not ask for it.",
        system_prompt, state.patient_id
    );
    if !state.current_reasoning.is_empty() {
        system.push_str(&format!("\n\nSupervisor reasoning:\n{}", state.current_reasoning));
    }
    if !state.current_instructions.is_empty() {
        system.push_str(&format!("\n\nAction plan:\n{}", state.current_instructions));
    }
    if !state.memory_context.is_empty() {
        system.push_str(&format!("\n\nLong-term memory:\n{}", state.memory_context));
    }

    let mut messages = vec![ConversationMessage::system(system)];
    messages.extend(conversation_messages(state));
    messages
}

/// The conversation log as model messages. Agent output is tagged with its
/// producer so the model can tell routing notes from worker replies.
pub fn conversation_messages(state: &ConversationState) -> Vec<ConversationMessage> {
    state
        .messages
        .iter()
        .map(|entry| match entry.producer {
            Producer::User => ConversationMessage::user(&entry.content),
            producer => ConversationMessage::assistant(
                format!("[{}] {}", producer, entry.content),
                Vec::new(),
            ),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessageRole;

    #[test]
    fn test_routing_messages_carry_step_budget() {
        let mut state = ConversationState::new(42, "hello", String::new());
        state.steps_taken = 3;

        let messages = routing_messages("route", &state, 20, 10);
        assert_eq!(messages[0].content, "route");
        assert!(messages[1].content.contains("Steps completed: 3. Maximum allowed: 20."));
        assert!(!messages[1].content.contains("FINISH"));
        assert_eq!(messages.last().map(|m| m.role), Some(MessageRole::User));
    }

    #[test]
    fn test_routing_messages_hint_finish_past_threshold() {
        let mut state = ConversationState::new(42, "hello", "Prior summary: x".to_string());
        state.steps_taken = 10;

        let messages = routing_messages("route", &state, 20, 10);
        assert!(messages[1].content.contains("route to FINISH now"));
        assert!(messages[2].content.contains("Prior summary: x"));
    }

    #[test]
    fn test_worker_messages_include_instructions() {
        let mut state = ConversationState::new(7, "book dr wilson", String::new());
        state.current_instructions = "Book 18-12-2024 10:00".to_string();
        state.push(Producer::DoctorSupervisor, "Supervisor routed to booking_node.");

        let messages = worker_messages(DOCTOR_BOOKING_PROMPT, &state);
        assert!(messages[0].content.contains("Action plan:\nBook 18-12-2024 10:00"));
        assert!(messages[0].content.contains("identification number is 7"));
        assert_eq!(messages[2].role, MessageRole::Assistant);
        assert!(messages[2].content.starts_with("[doctor_supervisor] "));
    }
}
