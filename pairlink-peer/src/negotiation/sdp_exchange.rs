use crate::error::NegotiationError;
use crate::transport::{GatheringState, PeerTransport};
use pairlink_core::{SdpType, SignalingMessage};
use std::time::Duration;
use tracing::debug;

/// Offer/answer creation that waits for ICE gathering to finish before a
/// description is handed out, so every published SDP already carries all of
/// its candidates and no candidate exchange is needed afterwards.
///
/// None of the operations retry; failures go back to the caller.
#[derive(Debug, Clone)]
pub struct NonTrickleSdpExchange {
    gathering_timeout: Duration,
}

impl NonTrickleSdpExchange {
    pub fn new(gathering_timeout: Duration) -> Self {
        Self { gathering_timeout }
    }

    pub async fn create_offer(
        &self,
        transport: &dyn PeerTransport,
    ) -> Result<SignalingMessage, NegotiationError> {
        let offer = transport.create_offer().await?;
        transport.set_local_description(offer).await?;
        self.finalized_local_description(transport, SdpType::Offer)
            .await
    }

    pub async fn create_answer(
        &self,
        transport: &dyn PeerTransport,
        remote_offer: &SignalingMessage,
    ) -> Result<SignalingMessage, NegotiationError> {
        expect_type(remote_offer, SdpType::Offer)?;
        transport
            .set_remote_description(remote_offer.clone())
            .await?;

        let answer = transport.create_answer().await?;
        transport.set_local_description(answer).await?;
        self.finalized_local_description(transport, SdpType::Answer)
            .await
    }

    pub async fn apply_remote_answer(
        &self,
        transport: &dyn PeerTransport,
        remote_answer: &SignalingMessage,
    ) -> Result<(), NegotiationError> {
        expect_type(remote_answer, SdpType::Answer)?;
        transport
            .set_remote_description(remote_answer.clone())
            .await?;
        Ok(())
    }

    async fn finalized_local_description(
        &self,
        transport: &dyn PeerTransport,
        expected: SdpType,
    ) -> Result<SignalingMessage, NegotiationError> {
        let connection = transport.connection_id();

        if transport.gathering_state() != GatheringState::Complete {
            debug!(%connection, "waiting for ICE gathering to complete");
            tokio::time::timeout(self.gathering_timeout, transport.gathering_complete())
                .await
                .map_err(|_| NegotiationError::GatheringTimeout(self.gathering_timeout))?;
        }

        // A description read before completion would be missing candidates.
        if transport.gathering_state() != GatheringState::Complete {
            return Err(NegotiationError::IncompleteGathering);
        }

        let local = transport
            .local_description()
            .await
            .ok_or(NegotiationError::MissingLocalDescription)?;
        expect_type(&local, expected)?;

        debug!(%connection, kind = %expected, bytes = local.sdp.len(), "local description finalized");
        Ok(local)
    }
}

fn expect_type(desc: &SignalingMessage, expected: SdpType) -> Result<(), NegotiationError> {
    if desc.kind != expected {
        return Err(NegotiationError::UnexpectedType {
            expected,
            actual: desc.kind,
        });
    }
    Ok(())
}
