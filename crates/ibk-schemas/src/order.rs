use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Contract;

/// Outbound order parameters. Not validated here: the broker owns that.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDefinition {
    pub action: String,
    pub total_quantity: Decimal,
    pub order_type: String,
    pub limit_price: Option<Decimal>,
    pub aux_price: Option<Decimal>,
    pub tif: String,
    pub account: String,
    pub order_ref: String,
    pub transmit: bool,
}

/// Broker-side order state attached to an open-order message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderState {
    pub status: String,
    pub commission: Option<Decimal>,
    pub warning_text: String,
}

/// An order definition as announced by the broker (`openOrder`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub order_id: i32,
    pub contract: Contract,
    pub order: OrderDefinition,
    pub state: OrderState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatusKind {
    ApiPending,
    ApiCancelled,
    PreSubmitted,
    PendingCancel,
    Cancelled,
    Submitted,
    Filled,
    Inactive,
    PendingSubmit,
    Unknown,
}

impl OrderStatusKind {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "ApiPending" => Self::ApiPending,
            "ApiCancelled" => Self::ApiCancelled,
            "PreSubmitted" => Self::PreSubmitted,
            "PendingCancel" => Self::PendingCancel,
            "Cancelled" => Self::Cancelled,
            "Submitted" => Self::Submitted,
            "Filled" => Self::Filled,
            "Inactive" => Self::Inactive,
            "PendingSubmit" => Self::PendingSubmit,
            _ => Self::Unknown,
        }
    }

    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::PreSubmitted | Self::PendingCancel | Self::Submitted | Self::PendingSubmit
        )
    }
}

/// One `orderStatus` message. Equality is over every field: the cache uses
/// it to drop exact repeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatus {
    pub order_id: i32,
    pub status: OrderStatusKind,
    pub filled: Decimal,
    pub remaining: Decimal,
    pub avg_fill_price: Option<Decimal>,
    pub perm_id: i64,
    pub parent_id: i32,
    pub last_fill_price: Option<Decimal>,
    pub client_id: i32,
    pub why_held: String,
    pub mkt_cap_price: Option<Decimal>,
}

impl OrderStatus {
    pub fn new(order_id: i32, status: OrderStatusKind) -> Self {
        Self {
            order_id,
            status,
            filled: Decimal::ZERO,
            remaining: Decimal::ZERO,
            avg_fill_price: None,
            perm_id: 0,
            parent_id: 0,
            last_fill_price: None,
            client_id: 0,
            why_held: String::new(),
            mkt_cap_price: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.status, OrderStatusKind::ApiCancelled | OrderStatusKind::Cancelled)
    }

    pub fn is_inactive(&self) -> bool {
        self.status == OrderStatusKind::Inactive
    }

    pub fn is_filled(&self) -> bool {
        self.status == OrderStatusKind::Filled
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}
