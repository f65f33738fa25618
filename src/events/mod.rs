use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the checkout flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CheckoutStarted {
        user_id: Uuid,
        session_id: String,
    },
    CheckoutCompleted {
        order_id: Uuid,
        provider_reference: String,
    },
    OrderCreated(Uuid),
    CouponRedeemed {
        coupon_id: Uuid,
        code: String,
    },
    CartCleared {
        user_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event; a full or closed channel is logged, never fatal.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(err) = self.send(event).await {
            warn!("Event delivery failed: {}", err);
        }
    }
}

/// Consumes events from the channel and logs them. Downstream consumers
/// (notifications, analytics) subscribe here.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::CheckoutStarted {
                user_id,
                session_id,
            } => {
                info!(%user_id, %session_id, "checkout started");
            }
            Event::CheckoutCompleted {
                order_id,
                provider_reference,
            } => {
                info!(%order_id, %provider_reference, "checkout completed");
            }
            Event::OrderCreated(order_id) => {
                info!(%order_id, "order created");
            }
            Event::CouponRedeemed { coupon_id, code } => {
                info!(%coupon_id, code, "coupon redeemed");
            }
            Event::CartCleared { user_id } => {
                info!(%user_id, "cart cleared");
            }
        }
    }
}
