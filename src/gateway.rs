//! Gateway: wires providers, memory, and agents into the inbound pipeline.
//!
//! One `Gateway` lives for the process. Webhook handlers normalize the raw
//! payload with the channel adapters and feed each resulting message through
//! the pipeline in `gateway::pipeline`.

pub mod context;
pub mod dispatch;
pub mod intents;
pub mod navigator;
pub mod pipeline;
pub mod templates;

#[cfg(test)]
mod tests;

use serde_json::Value;
use siembra_agents::AgentBank;
use siembra_channels::{meta, transcribe::Transcriber, twilio};
use siembra_core::{
    config::Config,
    error::SiembraError,
    message::ProviderTag,
    traits::OutboundAdapter,
};
use siembra_memory::Store;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// The central gateway handling every inbound turn.
pub struct Gateway {
    config: Config,
    store: Store,
    transcriber: Transcriber,
    adapters: Vec<Arc<dyn OutboundAdapter>>,
    agents: AgentBank,
    /// Per-student advisory locks serializing enrollment mutations.
    student_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Gateway {
    pub fn new(
        config: Config,
        store: Store,
        transcriber: Transcriber,
        adapters: Vec<Arc<dyn OutboundAdapter>>,
        agents: AgentBank,
    ) -> Self {
        Self {
            config,
            store,
            transcriber,
            adapters,
            agents,
            student_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Handle one external-provider (form-encoded) webhook delivery.
    pub async fn handle_twilio_webhook(
        &self,
        form: &HashMap<String, String>,
    ) -> Result<(), SiembraError> {
        let messages = twilio::extract_form(form)?;
        info!("twilio webhook: {} message(s)", messages.len());
        for message in messages {
            self.handle_message(message).await;
        }
        Ok(())
    }

    /// Handle one platform-provider (JSON) webhook delivery.
    pub async fn handle_meta_webhook(&self, value: &Value) -> Result<(), SiembraError> {
        let messages = meta::extract_value(value)?;
        info!("meta webhook: {} message(s)", messages.len());
        for message in messages {
            self.handle_message(message).await;
        }
        Ok(())
    }

    /// The adapter serving the given provider, if configured.
    fn adapter_for(&self, tag: ProviderTag) -> Option<&Arc<dyn OutboundAdapter>> {
        self.adapters.iter().find(|a| a.tag() == tag)
    }

    /// Advisory lock for one phone. Serializes enrollment mutations for the
    /// same student across concurrent webhook workers in this process.
    async fn lock_for(&self, phone: &str) -> Arc<Mutex<()>> {
        let mut locks = self.student_locks.lock().await;
        locks
            .entry(phone.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop a phone's lock entry once the map holds the only reference, so
    /// the map does not grow by one entry per student for the process
    /// lifetime. Callers release their guard and clone first.
    async fn evict_lock(&self, phone: &str) {
        let mut locks = self.student_locks.lock().await;
        if let Some(lock) = locks.get(phone) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(phone);
            }
        }
    }
}
