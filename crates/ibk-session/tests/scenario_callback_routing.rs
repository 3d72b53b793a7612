//! Inbound callbacks reach the cache and the owning subscription. The
//! transport is a stub that reports "connected" and records what is sent;
//! callbacks are invoked directly, without the reader thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ibk_config::SessionConfig;
use ibk_events::Category;
use ibk_requests::RequestError;
use ibk_schemas::{
    CommissionReport, Contract, Execution, OpenOrder, OrderDefinition, OrderState, OrderStatus,
    OrderStatusKind, Position, TickAttrib, TickType,
};
use ibk_session::{
    Endpoint, ExecutionFilter, InboundMessage, OutboundRequest, Session, Transport,
};
use parking_lot::Mutex;
use rust_decimal_macros::dec;

#[derive(Default)]
struct StubTransport {
    online: AtomicBool,
    sent: Mutex<Vec<OutboundRequest>>,
}

impl StubTransport {
    fn online() -> Arc<Self> {
        let t = Self::default();
        t.online.store(true, Ordering::SeqCst);
        Arc::new(t)
    }

    fn sent(&self) -> Vec<OutboundRequest> {
        self.sent.lock().clone()
    }
}

impl Transport for StubTransport {
    fn is_connected(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn connect(&self, _endpoint: &Endpoint) -> anyhow::Result<()> {
        self.online.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) -> anyhow::Result<()> {
        self.online.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn send(&self, request: OutboundRequest) -> anyhow::Result<()> {
        self.sent.lock().push(request);
        Ok(())
    }

    fn wait_for_signal(&self, timeout: Duration) -> bool {
        std::thread::sleep(timeout);
        false
    }

    fn process_messages(&self) -> anyhow::Result<Vec<InboundMessage>> {
        Ok(Vec::new())
    }
}

fn session() -> (Arc<StubTransport>, Session) {
    let transport = StubTransport::online();
    let session = Session::new(transport.clone(), &SessionConfig::default());
    (transport, session)
}

fn msft() -> Contract {
    Contract {
        conid: 272093,
        ..Contract::stock("MSFT", "SMART", "USD")
    }
}

fn open_order(order_id: i32) -> OpenOrder {
    OpenOrder {
        order_id,
        contract: msft(),
        order: OrderDefinition {
            action: "SELL".into(),
            total_quantity: dec!(5),
            order_type: "MKT".into(),
            ..OrderDefinition::default()
        },
        state: OrderState::default(),
    }
}

#[test]
fn ticks_update_cache_and_stream_snapshots() {
    let (_t, session) = session();
    let mut ticks = session.market_data(msft(), "", false);
    ticks.start().unwrap();
    let id = ticks.key().and_then(|k| k.id).unwrap();

    let cb = session.callbacks();
    cb.on_tick_price(id, TickType::Ask.code(), 410.25, TickAttrib::default());
    cb.on_tick_size(id, TickType::BidSize.code(), dec!(7));

    let _ = ticks.try_next().unwrap().unwrap();
    let tick = ticks.try_next().unwrap().unwrap();
    assert_eq!(tick.price(TickType::Ask), Some(dec!(410.25)));
    assert_eq!(tick.size(TickType::BidSize), Some(dec!(7)));
    assert_eq!(session.cache().tick(id), Some(tick));

    cb.on_tick_snapshot_end(id);
    assert!(ticks.try_next().is_none());
    assert!(ticks.is_finished());
}

#[test]
fn repeated_order_status_is_dropped_and_fill_ends_the_stream() {
    let (_t, session) = session();
    let mut order = session.place_order(msft(), open_order(0).order);
    order.start().unwrap();
    let order_id = order.key().and_then(|k| k.id).unwrap();
    let mut all_statuses = session.order_statuses();
    all_statuses.start().unwrap();

    let cb = session.callbacks();
    cb.on_open_order(open_order(order_id));
    let submitted = OrderStatus::new(order_id, OrderStatusKind::Submitted);
    cb.on_order_status(submitted.clone());
    cb.on_order_status(submitted.clone());
    cb.on_order_status(OrderStatus {
        filled: dec!(5),
        ..OrderStatus::new(order_id, OrderStatusKind::Filled)
    });

    assert_eq!(order.try_next(), Some(Ok(submitted)));
    assert!(order.try_next().unwrap().unwrap().is_filled());
    assert!(order.try_next().is_none());
    assert!(order.is_finished());

    let mut seen = 0;
    while let Some(Ok(_)) = all_statuses.try_next() {
        seen += 1;
    }
    assert_eq!(seen, 2);
    assert_eq!(session.cache().order(order_id).unwrap().statuses().len(), 2);
}

#[test]
fn status_for_an_unseen_order_is_still_routed() {
    let (_t, session) = session();
    let mut all_statuses = session.order_statuses();
    all_statuses.start().unwrap();

    session
        .callbacks()
        .on_order_status(OrderStatus::new(4242, OrderStatusKind::PreSubmitted));
    let status = all_statuses.try_next().unwrap().unwrap();
    assert_eq!(status.order_id, 4242);
}

#[test]
fn executions_and_commissions_join_on_exec_id() {
    let (t, session) = session();
    let mut executions = session.executions(ExecutionFilter::default());
    executions.start().unwrap();
    let req_id = executions.key().and_then(|k| k.id).unwrap();
    let mut info = session.execution_info();
    info.start().unwrap();
    assert!(t
        .sent()
        .iter()
        .any(|r| matches!(r, OutboundRequest::ReqExecutions { req_id: id, .. } if *id == req_id)));

    let execution = Execution {
        order_id: 9,
        exec_id: "0001f4e8.6563a1b2.01.01".into(),
        shares: dec!(5),
        price: dec!(411),
        ..Execution::default()
    };
    let cb = session.callbacks();
    cb.on_exec_details(req_id, msft(), execution.clone());
    cb.on_exec_details_end(req_id);

    let report = executions.try_next().unwrap().unwrap();
    assert_eq!(report.execution, execution);
    assert!(report.commission.is_none());
    assert!(executions.try_next().is_none());
    assert!(executions.is_finished());

    let commission = CommissionReport {
        exec_id: execution.exec_id.clone(),
        commission: Some(dec!(1.02)),
        currency: "USD".into(),
        ..CommissionReport::default()
    };
    cb.on_commission_report(commission.clone());
    cb.on_commission_report(commission.clone());

    let first = info.try_next().unwrap().unwrap();
    assert!(first.commission.is_none());
    let joined = info.try_next().unwrap().unwrap();
    assert_eq!(joined.commission, Some(commission));
    assert!(info.try_next().is_none());
}

#[test]
fn positions_stream_and_cache() {
    let (t, session) = session();
    let mut positions = session.positions();
    positions.start().unwrap();
    assert_eq!(t.sent(), vec![OutboundRequest::ReqPositions]);

    let position = Position {
        account: "DU123".into(),
        contract: msft(),
        position: dec!(-5),
        avg_cost: dec!(402.1),
    };
    session.callbacks().on_position(position.clone());
    assert_eq!(positions.try_next(), Some(Ok(position.clone())));
    assert_eq!(session.cache().position("DU123", &msft()), Ok(Some(position)));

    drop(positions);
    assert_eq!(t.sent().last(), Some(&OutboundRequest::CancelPositions));
}

#[test]
fn pnl_treats_unset_values_as_absent() {
    let (_t, session) = session();
    let mut pnl = session.account_pnl("DU123", "");
    pnl.start().unwrap();
    let req_id = pnl.key().and_then(|k| k.id).unwrap();

    session
        .callbacks()
        .on_pnl(req_id, 12.5, f64::MAX, -3.0);
    let value = pnl.try_next().unwrap().unwrap();
    assert_eq!(value.daily_pnl, Some(dec!(12.5)));
    assert_eq!(value.unrealized_pnl, None);
    assert_eq!(value.realized_pnl, Some(dec!(-3)));
}

#[test]
fn depth_for_an_inactive_request_is_ignored() {
    let (_t, session) = session();
    session
        .callbacks()
        .on_market_depth(77, 0, 0, 1, 100.0, dec!(1), String::new());
    assert_eq!(session.cache().order_book(&msft()), Ok(None));
}

#[test]
fn next_valid_id_reseeds_the_generator() {
    let (_t, session) = session();
    session.callbacks().on_next_valid_id(500);
    assert_eq!(session.requests().ids().next_id(), 500);

    session.callbacks().on_next_valid_id(10);
    assert!(session.requests().ids().peek() > 500);
}

#[test]
fn error_for_a_request_id_fails_that_request() {
    let (_t, session) = session();
    let mut details = session.contract_details(msft());
    details.start().unwrap();
    let req_id = details.key().and_then(|k| k.id).unwrap();

    let c = session
        .callbacks()
        .on_error(req_id, 200, "No security definition has been found for the request");
    assert_eq!(c.category, Category::RequestError);
    assert!(matches!(
        details.try_next(),
        Some(Err(RequestError::Broker(_)))
    ));
    assert!(details.is_finished());
}

#[test]
fn dispatch_routes_wire_messages() {
    let (_t, session) = session();
    let mut time = session.current_time();
    time.start().unwrap();

    session.callbacks().dispatch(InboundMessage::CurrentTime(1_700_000_000));
    let at = time.try_next().unwrap().unwrap();
    assert_eq!(at.timestamp(), 1_700_000_000);
    assert!(time.try_next().is_none());
    assert!(time.is_finished());
}

#[tokio::test]
async fn subscriptions_are_streams() {
    use futures_util::StreamExt;
    use ibk_schemas::PriceIncrement;

    let (t, session) = session();
    let mut rule = session.market_rule(26);
    rule.start().unwrap();
    assert_eq!(t.sent(), vec![OutboundRequest::ReqMarketRule { market_rule_id: 26 }]);

    session.callbacks().on_market_rule(
        26,
        vec![
            PriceIncrement {
                low_edge: dec!(0),
                increment: dec!(0.0001),
            },
            PriceIncrement {
                low_edge: dec!(1),
                increment: dec!(0.01),
            },
        ],
    );

    let value = rule.next().await.unwrap().unwrap();
    assert_eq!(value.increment_at(dec!(0.5)), Some(dec!(0.0001)));
    assert_eq!(value.increment_at(dec!(25)), Some(dec!(0.01)));
    assert!(rule.next().await.is_none());
}
