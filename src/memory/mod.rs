//! Long-term patient memory.
//!
//! This module provides utilities for:
//! - Loading the stored summary, slots and profile for a patient ([`MemoryManager`])
//! - Formatting that memory into the context string injected into every prompt
//! - Rendering the tail of a conversation as a role-tagged transcript
//! - Merging a fresh summary into the stored record
//!
//! Records live in a single JSON document keyed by patient id; profiles live
//! in a second, read-only document. Both are read and written through a
//! [`BlobStore`].

/// Loading and storing per-patient records.
pub mod manager;
/// JSON document storage.
pub mod store;
/// Transcript summarization.
pub mod summarizer;

use crate::types::{ChatEntry, MemoryBundle, MemoryRecord, MemoryUpdate};
use chrono::{DateTime, Utc};

pub use manager::MemoryManager;
pub use store::{BlobStore, LocalJsonStore};
pub use summarizer::{ConversationSummarizer, LLMSummarizer};

/// Default number of recent messages handed to the summarizer.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Formats a memory bundle into the context string shared by every prompt.
///
/// Returns an empty string when nothing is known about the patient.
pub fn format_memory_context(bundle: &MemoryBundle) -> String {
    let mut lines = Vec::new();

    if !bundle.summary.is_empty() {
        lines.push(format!("Prior summary: {}", bundle.summary));
    }
    for (key, value) in &bundle.slots {
        lines.push(format!("{}: {}", key, value));
    }
    if let Some(doctor) = bundle.profile.preferred_doctor.as_deref().filter(|d| !d.is_empty()) {
        lines.push(format!("Preferred doctor on file: {}", doctor));
    }
    if let Some(insurance) = bundle.profile.insurance_id.as_deref().filter(|i| !i.is_empty()) {
        lines.push(format!("Insurance policy: {}", insurance));
    }

    lines.join("\n")
}

/// Renders the last `window` messages as `ROLE: content` lines.
pub fn render_transcript(messages: &[ChatEntry], window: usize) -> String {
    let start = messages.len().saturating_sub(window);
    messages[start..]
        .iter()
        .map(|m| format!("{}: {}", m.producer.as_str().to_uppercase(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Applies a summarizer update to the previously stored record.
///
/// Slots are merged key by key with new values winning; keys absent from the
/// update are kept. The summary is replaced outright.
pub fn merge_record(
    existing: Option<&MemoryRecord>,
    update: MemoryUpdate,
    now: DateTime<Utc>,
) -> MemoryRecord {
    let mut slots = existing.map(|r| r.slots.clone()).unwrap_or_default();
    slots.extend(update.slots);

    MemoryRecord {
        summary: update.summary,
        slots,
        last_updated: now,
    }
}
