//! A canned broker.
//!
//! Answers the requests a smoke run needs with plausible, deterministic
//! replies. Anything else gets no reply.

use ibk_schemas::{
    ContractDetails, OpenOrder, OrderState, OrderStatus, OrderStatusKind, PriceIncrement,
};
use ibk_session::{InboundMessage, OutboundRequest};
use rust_decimal::Decimal;

pub const NEXT_VALID_ID: i32 = 1000;
/// 2023-11-14T22:13:20Z
pub const BROKER_EPOCH: i64 = 1_700_000_000;

pub fn canned_broker(request: &OutboundRequest) -> Vec<InboundMessage> {
    match request {
        OutboundRequest::ReqIds => vec![InboundMessage::NextValidId(NEXT_VALID_ID)],
        OutboundRequest::ReqCurrentTime => vec![InboundMessage::CurrentTime(BROKER_EPOCH)],
        OutboundRequest::ReqContractDetails { req_id, contract } => vec![
            InboundMessage::ContractDetails {
                req_id: *req_id,
                details: ContractDetails {
                    contract: contract.clone(),
                    min_tick: Some(Decimal::new(1, 2)),
                    market_rule_ids: "26".into(),
                    ..ContractDetails::default()
                },
            },
            InboundMessage::ContractDetailsEnd(*req_id),
        ],
        OutboundRequest::ReqMarketRule { market_rule_id } => vec![InboundMessage::MarketRule {
            market_rule_id: *market_rule_id,
            increments: vec![PriceIncrement {
                low_edge: Decimal::ZERO,
                increment: Decimal::new(1, 2),
            }],
        }],
        OutboundRequest::PlaceOrder {
            order_id,
            contract,
            order,
        } => vec![
            InboundMessage::OpenOrder(OpenOrder {
                order_id: *order_id,
                contract: contract.clone(),
                order: order.clone(),
                state: OrderState {
                    status: "Submitted".into(),
                    ..OrderState::default()
                },
            }),
            InboundMessage::OrderStatus(OrderStatus {
                remaining: order.total_quantity,
                ..OrderStatus::new(*order_id, OrderStatusKind::Submitted)
            }),
        ],
        OutboundRequest::CancelOrder { order_id } => vec![InboundMessage::OrderStatus(
            OrderStatus::new(*order_id, OrderStatusKind::Cancelled),
        )],
        OutboundRequest::ReqAllOpenOrders => vec![InboundMessage::OpenOrderEnd],
        _ => Vec::new(),
    }
}
