//! Outbound dispatch: marker handling, the provider call, and the final
//! log row.
//!
//! Replies always leave on the provider that received the inbound. A failed
//! send still produces an outbound row with `delivery_state = error`; the
//! student sees nothing and a reconciliation pass can resend later.

use siembra_core::{
    error::SiembraError,
    markers,
    message::{DeliveryState, InboundMessage, OutboundPayload, Response},
    traits::OutboundAdapter,
};
use siembra_memory::Store;
use tracing::{info, warn};

pub async fn send(
    store: &Store,
    adapter: &dyn OutboundAdapter,
    inbound: &InboundMessage,
    response: &Response,
) -> Result<(), SiembraError> {
    // The log keeps the sentinel; only the student-visible text loses it.
    let visible = markers::strip_sentinels(&response.text);
    let (mut visible, media_url) = markers::extract_video_block(&visible);

    let media_url = match media_url {
        Some(url) if markers::is_loopback_url(&url) => {
            visible.push_str("\n\n");
            visible.push_str(crate::gateway::templates::LOOPBACK_ADVISORY);
            None
        }
        other => other,
    };

    let payload = OutboundPayload {
        phone: inbound.phone.clone(),
        text: visible,
        media_url,
        reply_to: Some(inbound.provider_message_id.clone()),
    };

    let (state, provider_id) = match adapter.send(&payload).await {
        Ok(outcome) if outcome.success => {
            info!(
                "sent reply to {} via {}",
                inbound.phone,
                adapter.name()
            );
            (DeliveryState::Sent, outcome.provider_message_id)
        }
        Ok(outcome) => {
            warn!(
                "{} did not accept reply to {}: {}",
                adapter.name(),
                inbound.phone,
                outcome.raw_response
            );
            (DeliveryState::Error, outcome.provider_message_id)
        }
        Err(e) => {
            warn!("send to {} failed: {e}", inbound.phone);
            (DeliveryState::Error, None)
        }
    };

    store
        .record_outbound(
            &inbound.phone,
            &response.text,
            inbound.provider.as_str(),
            provider_id.as_deref(),
            state,
            response.agent_label.as_deref(),
        )
        .await?;

    Ok(())
}
