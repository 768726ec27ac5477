use chrono::Utc;
use convo_config::StoreConfig;
use convo_core::{
    validate_conversation_id, ConvoError, HistoryEntry, Interaction, Message, Result, Transcript,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::build_backend;
use crate::prompt::render_prompt;
use crate::storage::StorageBackend;

/// Transcript-level operations over a [`StorageBackend`].
///
/// Appends to the same conversation are serialized within one store
/// instance. Writers in other processes are not coordinated.
pub struct ConversationStore {
    backend: Arc<dyn StorageBackend>,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Build the configured backend and wrap it in a store.
    pub async fn from_config(config: &StoreConfig) -> Result<Self> {
        let backend = build_backend(&config.storage).await?;
        Ok(Self::new(backend))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Generate a fresh conversation identifier. Nothing is stored.
    pub fn new_conversation_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Load a transcript, or an empty unsaved one if the key has never been written.
    pub async fn load(&self, conversation_id: &str) -> Result<Transcript> {
        validate_conversation_id(conversation_id)?;

        match self.backend.read(conversation_id).await {
            Ok(bytes) => {
                let transcript: Transcript = serde_json::from_slice(&bytes)?;
                debug!(
                    "Loaded conversation {} with {} messages",
                    conversation_id,
                    transcript.len()
                );
                Ok(transcript)
            }
            Err(ConvoError::NotFound(_)) => {
                debug!("No stored transcript for {}, starting empty", conversation_id);
                Ok(Transcript::new(conversation_id))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn exists(&self, conversation_id: &str) -> Result<bool> {
        validate_conversation_id(conversation_id)?;
        self.backend.exists(conversation_id).await
    }

    /// Merge supplied history, append the question/answer pair and persist.
    ///
    /// Returns the transcript as written. When the interaction carries an
    /// idempotency key that is already recorded, nothing is written and the
    /// stored transcript is returned unchanged.
    pub async fn append_interaction(
        &self,
        conversation_id: &str,
        interaction: Interaction,
    ) -> Result<Transcript> {
        validate_conversation_id(conversation_id)?;

        let lock = self.key_lock(conversation_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.append_locked(conversation_id, interaction).await
        };
        self.release_key_lock(conversation_id, lock).await;
        result
    }

    async fn append_locked(
        &self,
        conversation_id: &str,
        interaction: Interaction,
    ) -> Result<Transcript> {
        let Interaction {
            question,
            answer,
            history,
            idempotency_key,
        } = interaction;

        let mut transcript = self.load(conversation_id).await?;
        let is_new = transcript.updated_at.is_none() && transcript.is_empty();

        if let Some(key) = idempotency_key.as_deref() {
            if transcript.has_interaction(key) {
                warn!(
                    "Interaction {} already recorded in conversation {}, skipping",
                    key, conversation_id
                );
                return Ok(transcript);
            }
        }

        let merged = merge_history(&mut transcript, &history);
        transcript.push(Message::user(question).with_interaction_id(idempotency_key.clone()));
        transcript.push(Message::assistant(answer).with_interaction_id(idempotency_key));
        transcript.updated_at = Some(Utc::now());

        let bytes = serde_json::to_vec_pretty(&transcript)?;
        self.backend.write(conversation_id, &bytes).await?;

        if is_new {
            info!(
                "Created conversation {} on {} storage",
                conversation_id,
                self.backend.name()
            );
        }
        info!(
            "Saved interaction to conversation {} ({} history merged, {} messages)",
            conversation_id,
            merged,
            transcript.len()
        );
        Ok(transcript)
    }

    /// Render the transcript as `Human:`/`Assistant:` prompt lines.
    pub async fn render_as_prompt(&self, conversation_id: &str) -> Result<String> {
        let transcript = self.load(conversation_id).await?;
        Ok(render_prompt(&transcript.messages))
    }

    /// All stored messages, in order.
    pub async fn history(&self, conversation_id: &str) -> Result<Vec<Message>> {
        Ok(self.load(conversation_id).await?.messages)
    }

    async fn key_lock(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().await;
        locks.entry(conversation_id.to_string()).or_default().clone()
    }

    async fn release_key_lock(&self, conversation_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.key_locks.lock().await;
        // Only the map and this caller hold it: nobody is waiting.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(conversation_id);
        }
    }
}

/// Append each entry whose `(role, content)` is not already in the transcript.
///
/// Entries added earlier in the same pass count as present, so repeats
/// inside `history` collapse too. Returns how many were appended.
fn merge_history(transcript: &mut Transcript, history: &[HistoryEntry]) -> usize {
    let mut appended = 0;
    for entry in history {
        if !transcript.contains(&entry.role, &entry.content) {
            transcript.push(Message::new(entry.role.clone(), entry.content.clone()));
            appended += 1;
        }
    }
    appended
}
