//! Request/response correlation through a running session: replies, broker
//! errors and cancels each reach the subscription that owns them.

use std::time::Duration;

use chrono::DateTime;
use ibk_requests::{BrokerFailure, RequestError};
use ibk_schemas::{
    AccountTag, Contract, DepthSide, OrderDefinition, OrderStatusKind, TickAttrib, TickType,
};
use ibk_session::{HistoricalQuery, InboundMessage, OutboundRequest, SessionEvent};
use ibk_testkit::script::{canned_broker, BROKER_EPOCH, NEXT_VALID_ID};
use ibk_testkit::{fast_config, next_within, wait_until, PaperTransport, SessionHarness};
use rust_decimal_macros::dec;

const WAIT: Duration = Duration::from_secs(5);

fn connected(transport: PaperTransport) -> SessionHarness {
    let h = SessionHarness::start(transport, &fast_config()).unwrap();
    h.connect(WAIT).unwrap();
    assert!(wait_until(WAIT, || h.session.requests().ids().peek() >= NEXT_VALID_ID));
    h
}

fn aapl() -> Contract {
    Contract {
        conid: 265598,
        ..Contract::stock("AAPL", "SMART", "USD")
    }
}

fn limit_buy() -> OrderDefinition {
    OrderDefinition {
        action: "BUY".into(),
        total_quantity: dec!(10),
        order_type: "LMT".into(),
        limit_price: Some(dec!(150.25)),
        tif: "DAY".into(),
        transmit: true,
        ..OrderDefinition::default()
    }
}

#[test]
fn current_time_is_a_single_value_then_ends() {
    let h = connected(PaperTransport::with_reactor(canned_broker));

    let mut sub = h.session.current_time();
    let expected = DateTime::from_timestamp(BROKER_EPOCH, 0).unwrap();
    assert_eq!(next_within(&mut sub, WAIT), Some(Ok(expected)));
    assert_eq!(next_within(&mut sub, WAIT), None);
    assert!(sub.is_finished());
}

#[test]
fn placed_order_streams_until_cancelled() {
    let h = connected(PaperTransport::with_reactor(canned_broker));

    let mut order = h.session.place_order(aapl(), limit_buy());
    order.start().unwrap();
    let order_id = order.key().and_then(|k| k.id).unwrap();
    assert_eq!(order_id, NEXT_VALID_ID);

    let submitted = next_within(&mut order, WAIT).unwrap().unwrap();
    assert_eq!(submitted.status, OrderStatusKind::Submitted);
    assert_eq!(submitted.remaining, dec!(10));

    let mut cancel = h.session.cancel_order(order_id);
    assert_eq!(next_within(&mut cancel, WAIT), Some(Ok(true)));
    assert_eq!(next_within(&mut cancel, WAIT), None);

    let cancelled = next_within(&mut order, WAIT).unwrap().unwrap();
    assert!(cancelled.is_cancelled());
    assert_eq!(next_within(&mut order, WAIT), None);

    let cached = h.session.cache().order(order_id).unwrap();
    assert_eq!(cached.statuses().len(), 2);

    let mut open = h.session.open_orders();
    let listed = next_within(&mut open, WAIT).unwrap().unwrap();
    assert!(listed.contains_key(&order_id));
}

#[test]
fn cancel_of_an_order_past_cancelling_still_succeeds() {
    let h = connected(PaperTransport::with_reactor(|req| match req {
        OutboundRequest::CancelOrder { order_id } => vec![InboundMessage::Error {
            id: *order_id,
            code: 10148,
            message: "OrderId 77 that needs to be cancelled cannot be cancelled, state: Filled."
                .into(),
        }],
        other => canned_broker(other),
    }));

    let mut cancel = h.session.cancel_order(77);
    assert_eq!(next_within(&mut cancel, WAIT), Some(Ok(true)));
    assert_eq!(next_within(&mut cancel, WAIT), None);
}

#[test]
fn cancel_of_an_unknown_order_fails() {
    let h = connected(PaperTransport::with_reactor(|req| match req {
        OutboundRequest::CancelOrder { order_id } => vec![InboundMessage::Error {
            id: *order_id,
            code: 10147,
            message: "OrderId 78 that needs to be cancelled is not found.".into(),
        }],
        other => canned_broker(other),
    }));

    let mut cancel = h.session.cancel_order(78);
    match next_within(&mut cancel, WAIT) {
        Some(Err(RequestError::Broker(BrokerFailure::Terminal { id, code, .. }))) => {
            assert_eq!((id, code), (78, 10147));
        }
        other => panic!("expected terminal failure, got {other:?}"),
    }
    assert!(cancel.is_finished());
}

#[test]
fn historical_permission_error_fails_the_request() {
    let h = connected(PaperTransport::with_reactor(|req| match req {
        OutboundRequest::ReqHistoricalData { req_id, .. } => vec![InboundMessage::Error {
            id: *req_id,
            code: 162,
            message: "Historical Market Data Service error message:No market data permissions for NYSE STK"
                .into(),
        }],
        other => canned_broker(other),
    }));
    let mut rx = h.session.subscribe_events();

    let mut bars = h.session.historical_data(HistoricalQuery {
        contract: aapl(),
        end_date_time: String::new(),
        duration: "1 D".into(),
        bar_size: "1 min".into(),
        what_to_show: "TRADES".into(),
        use_rth: true,
    });
    match next_within(&mut bars, WAIT) {
        Some(Err(RequestError::Broker(BrokerFailure::NoPermissions { message, .. }))) => {
            assert!(message.starts_with("No market data permissions for"));
        }
        other => panic!("expected permission failure, got {other:?}"),
    }

    let mut logged = false;
    while let Ok(event) = rx.try_recv() {
        logged |= matches!(event, SessionEvent::Log(record) if record.code == 162);
    }
    assert!(logged);
}

#[test]
fn market_data_merges_ticks_and_cancels_on_drop() {
    let h = connected(PaperTransport::with_reactor(canned_broker));

    let mut ticks = h.session.market_data(aapl(), "", false);
    ticks.start().unwrap();
    let ticker_id = ticks.key().and_then(|k| k.id).unwrap();

    h.transport.push_all(vec![
        InboundMessage::TickPrice {
            ticker_id,
            field: TickType::Bid.code(),
            price: 101.5,
            attrib: TickAttrib::default(),
        },
        InboundMessage::TickSize {
            ticker_id,
            field: TickType::BidSize.code(),
            size: dec!(200),
        },
    ]);

    let first = next_within(&mut ticks, WAIT).unwrap().unwrap();
    assert_eq!(first.price(TickType::Bid), Some(dec!(101.5)));
    let merged = next_within(&mut ticks, WAIT).unwrap().unwrap();
    assert_eq!(merged.price(TickType::Bid), Some(dec!(101.5)));
    assert_eq!(merged.size(TickType::BidSize), Some(dec!(200)));

    drop(ticks);
    assert_eq!(
        h.transport
            .sent_matching(|r| matches!(r, OutboundRequest::CancelMarketData { .. })),
        vec![OutboundRequest::CancelMarketData { ticker_id }]
    );
}

#[test]
fn market_depth_streams_book_snapshots() {
    let h = connected(PaperTransport::with_reactor(canned_broker));

    assert!(h
        .session
        .market_depth(Contract::stock("AAPL", "SMART", "USD"), 5, false)
        .is_err());

    let mut book = h.session.market_depth(aapl(), 5, false).unwrap();
    book.start().unwrap();
    let ticker_id = book.key().and_then(|k| k.id).unwrap();

    let row = |operation| InboundMessage::MarketDepth {
        ticker_id,
        position: 0,
        operation,
        side: 1,
        price: 150.0,
        size: dec!(300),
        market_maker: String::new(),
    };
    h.transport.push(row(0));
    let snapshot = next_within(&mut book, WAIT).unwrap().unwrap();
    assert_eq!(snapshot.len(), 1);
    let level = snapshot.values().next().unwrap();
    assert_eq!((level.side, level.price), (DepthSide::Buy, dec!(150)));

    h.transport.push(row(2));
    let snapshot = next_within(&mut book, WAIT).unwrap().unwrap();
    assert!(snapshot.is_empty());

    drop(book);
    assert_eq!(
        h.transport
            .sent_matching(|r| matches!(r, OutboundRequest::CancelMarketDepth { .. }))
            .len(),
        1
    );
}

#[test]
fn account_summary_is_delivered_at_end_marker() {
    let h = connected(PaperTransport::with_reactor(canned_broker));

    let mut summary = h.session.account_summary("All", "NetLiquidation,TotalCashValue");
    summary.start().unwrap();
    let req_id = summary.key().and_then(|k| k.id).unwrap();

    let row = |tag: &str, value: &str| InboundMessage::AccountSummary {
        req_id,
        account: "DU123".into(),
        tag: tag.into(),
        value: value.into(),
        currency: "USD".into(),
    };
    h.transport.push_all(vec![
        row("NetLiquidation", "100000.50"),
        row("TotalCashValue", "25000"),
        InboundMessage::AccountSummaryEnd(req_id),
    ]);

    let summary_value = next_within(&mut summary, WAIT).unwrap().unwrap();
    assert_eq!(summary_value.account, "DU123");
    assert_eq!(summary_value.amount(AccountTag::NetLiquidation), Some(dec!(100000.50)));
    assert_eq!(summary_value.amount(AccountTag::TotalCashValue), Some(dec!(25000)));
    assert_eq!(next_within(&mut summary, WAIT), None);
}

#[test]
fn contract_details_then_market_rule() {
    let h = connected(PaperTransport::with_reactor(canned_broker));

    let mut details = h.session.contract_details(aapl());
    let first = next_within(&mut details, WAIT).unwrap().unwrap();
    assert_eq!(first.contract.conid, 265598);
    assert_eq!(next_within(&mut details, WAIT), None);

    let rule_id: i32 = first.market_rule_ids.parse().unwrap();
    let mut rule = h.session.market_rule(rule_id);
    let rule = next_within(&mut rule, WAIT).unwrap().unwrap();
    assert_eq!(rule.increment_at(dec!(10)), Some(dec!(0.01)));
}
