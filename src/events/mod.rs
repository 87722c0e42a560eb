//! In-process domain events.
//!
//! Services publish on a bounded channel; [`process_events`] turns the events
//! people care about into notifications. Delivery is best effort: a full or
//! closed channel is logged and never fails the originating request.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::entities::ledger_transaction::LedgerEntityType;
use crate::entities::notification::NotificationKind;
use crate::entities::order::OrderStatus;
use crate::services::notifications::{NewNotification, NotificationService};

/// Sending half handed to services
#[derive(Clone, Debug)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Channel pair with the given capacity
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Send and log on failure
    pub async fn publish(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            error!(event = name, error = %e, "Dropping event");
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        customer_name: String,
        total: Decimal,
    },
    OrderStatusChanged {
        order_id: Uuid,
        order_number: String,
        from: OrderStatus,
        to: OrderStatus,
    },
    PaymentRecorded {
        order_id: Uuid,
        order_number: String,
        amount: Decimal,
    },
    LowStock {
        item_id: Uuid,
        name: String,
        quantity: Decimal,
        reorder_level: Decimal,
        unit: String,
    },
    ProductionCompleted {
        schedule_id: Uuid,
        product_name: String,
        quantity: Decimal,
    },
    LedgerRecalculated {
        entity_type: LedgerEntityType,
        entity_id: Uuid,
        balance: Decimal,
        rows: usize,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::OrderCreated { .. } => "order_created",
            Event::OrderStatusChanged { .. } => "order_status_changed",
            Event::PaymentRecorded { .. } => "payment_recorded",
            Event::LowStock { .. } => "low_stock",
            Event::ProductionCompleted { .. } => "production_completed",
            Event::LedgerRecalculated { .. } => "ledger_recalculated",
        }
    }

    /// The notification this event should raise, if any
    pub fn to_notification(&self) -> Option<NewNotification> {
        match self {
            Event::OrderCreated {
                order_number,
                customer_name,
                total,
                ..
            } => Some(NewNotification {
                title: format!("New order {}", order_number),
                message: format!("{} placed an order worth {}", customer_name, total),
                kind: NotificationKind::Order,
            }),
            Event::OrderStatusChanged {
                order_number, to, ..
            } if *to == OrderStatus::Cancelled => Some(NewNotification {
                title: format!("Order {} cancelled", order_number),
                message: format!("Order {} was cancelled", order_number),
                kind: NotificationKind::Warning,
            }),
            Event::OrderStatusChanged {
                order_number, to, ..
            } if *to == OrderStatus::Ready => Some(NewNotification {
                title: format!("Order {} ready", order_number),
                message: format!("Order {} is ready for pickup or delivery", order_number),
                kind: NotificationKind::Order,
            }),
            Event::LowStock {
                name,
                quantity,
                reorder_level,
                unit,
                ..
            } => Some(NewNotification {
                title: format!("Low stock: {}", name),
                message: format!(
                    "{} is down to {} {} (reorder level {})",
                    name, quantity, unit, reorder_level
                ),
                kind: NotificationKind::Inventory,
            }),
            Event::ProductionCompleted {
                product_name,
                quantity,
                ..
            } => Some(NewNotification {
                title: "Production completed".to_string(),
                message: format!("{} x {} finished", quantity, product_name),
                kind: NotificationKind::Production,
            }),
            Event::OrderStatusChanged { .. }
            | Event::PaymentRecorded { .. }
            | Event::LedgerRecalculated { .. } => None,
        }
    }
}

/// Consume events until every sender is dropped
pub async fn process_events(mut rx: mpsc::Receiver<Event>, notifications: Arc<NotificationService>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        debug!(event = event.name(), "Received event");
        metrics::counter!("bakery_events_processed", 1, "event" => event.name());

        if let Some(new) = event.to_notification() {
            if let Err(e) = notifications.push(new).await {
                error!(event = event.name(), error = %e, "Failed to store notification");
            }
        }
    }

    info!("Event processing loop stopped");
}
