use crate::memory::store::BlobStore;
use crate::memory::summarizer::ConversationSummarizer;
use crate::memory::{merge_record, render_transcript, DEFAULT_HISTORY_WINDOW};
use crate::types::{AppError, ChatEntry, MemoryBundle, MemoryRecord, PatientProfile, Result};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Default name of the per-patient memory document.
pub const MEMORY_FILENAME: &str = "conversation_memory.json";
/// Default name of the patient profile document.
pub const PROFILES_FILENAME: &str = "patient_profiles.json";

/// Loads and updates per-patient memory in the blob store.
///
/// Updates for one patient run one at a time, and every read-merge-write of
/// the shared memory document happens under a single async lock.
pub struct MemoryManager {
    blobs: Arc<dyn BlobStore>,
    memory_file: String,
    profiles_file: String,
    history_window: usize,
    document_lock: tokio::sync::Mutex<()>,
    patient_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl MemoryManager {
    /// Manager over `blobs` with the default document names and history window.
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            blobs,
            memory_file: MEMORY_FILENAME.to_string(),
            profiles_file: PROFILES_FILENAME.to_string(),
            history_window: DEFAULT_HISTORY_WINDOW,
            document_lock: tokio::sync::Mutex::new(()),
            patient_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Use other document names.
    pub fn with_files(mut self, memory_file: impl Into<String>, profiles_file: impl Into<String>) -> Self {
        self.memory_file = memory_file.into();
        self.profiles_file = profiles_file.into();
        self
    }

    /// Messages handed to the summarizer, at least one.
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window.max(1);
        self
    }

    /// Stored record for a patient, if any.
    pub async fn record(&self, patient_id: i64) -> Result<Option<MemoryRecord>> {
        let document = self.read_document(&self.memory_file).await?;
        match document.get(&patient_id.to_string()) {
            Some(value) => decode_record(patient_id, value.clone()).map(Some),
            None => Ok(None),
        }
    }

    /// Summary, slots and profile for a patient. Unknown patients get an
    /// empty bundle rather than an error.
    pub async fn load_bundle(&self, patient_id: i64) -> Result<MemoryBundle> {
        let record = self.record(patient_id).await?;

        let profiles = self.read_document(&self.profiles_file).await?;
        let profile = match profiles.get(&patient_id.to_string()) {
            Some(value) => serde_json::from_value::<PatientProfile>(value.clone()).map_err(|e| {
                AppError::Persistence(format!("Invalid profile for patient {}: {}", patient_id, e))
            })?,
            None => PatientProfile::default(),
        };

        Ok(match record {
            Some(record) => MemoryBundle {
                summary: record.summary,
                slots: record.slots,
                profile,
                last_updated: Some(record.last_updated),
            },
            None => MemoryBundle {
                profile,
                ..Default::default()
            },
        })
    }

    /// Summarize the tail of `messages` and merge it into the patient's record.
    ///
    /// If summarization fails the stored document is not touched.
    pub async fn summarize_and_store(
        &self,
        patient_id: i64,
        messages: &[ChatEntry],
        summarizer: &dyn ConversationSummarizer,
    ) -> Result<MemoryRecord> {
        let lease = self.patient_lock(patient_id);
        let _patient_guard = lease.lock.lock().await;

        let transcript = render_transcript(messages, self.history_window);
        let update = summarizer.summarize(&transcript).await?;
        debug!(patient_id, slots = update.slots.len(), "memory summary produced");

        let _document_guard = self.document_lock.lock().await;
        let mut document = self.read_document(&self.memory_file).await?;
        let key = patient_id.to_string();

        let existing = match document.get(&key) {
            Some(value) => Some(decode_record(patient_id, value.clone())?),
            None => None,
        };
        let merged = merge_record(existing.as_ref(), update, Utc::now());

        let encoded = serde_json::to_value(&merged)
            .map_err(|e| AppError::Internal(format!("Failed to encode memory record: {}", e)))?;
        document.insert(key, encoded);
        self.blobs
            .write_json(&self.memory_file, &Value::Object(document))
            .await?;

        info!(patient_id, "memory record updated");
        Ok(merged)
    }

    fn patient_lock(&self, patient_id: i64) -> PatientLockLease<'_> {
        let lock = self
            .patient_locks
            .lock()
            .entry(patient_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        PatientLockLease {
            locks: &self.patient_locks,
            patient_id,
            lock,
        }
    }

    async fn read_document(&self, name: &str) -> Result<Map<String, Value>> {
        match self.blobs.read_json(name).await? {
            None => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map),
            Some(_) => Err(AppError::Persistence(format!(
                "{} is not a JSON object",
                name
            ))),
        }
    }
}

/// Shared handle on one patient's update lock. The map entry is removed when
/// the last lease for the patient is dropped.
struct PatientLockLease<'a> {
    locks: &'a Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
    patient_id: i64,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for PatientLockLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        // One reference is ours and one is the map's.
        let same = locks
            .get(&self.patient_id)
            .is_some_and(|entry| Arc::ptr_eq(entry, &self.lock));
        if same && Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.patient_id);
        }
    }
}

fn decode_record(patient_id: i64, value: Value) -> Result<MemoryRecord> {
    serde_json::from_value(value).map_err(|e| {
        AppError::Persistence(format!(
            "Invalid memory record for patient {}: {}",
            patient_id, e
        ))
    })
}
