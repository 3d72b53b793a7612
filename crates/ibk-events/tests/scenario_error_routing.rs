use std::sync::Arc;

use ibk_events::{Category, ErrorHooks, ErrorRouter};
use ibk_requests::{
    BrokerFailure, IdGenerator, RequestError, RequestKey, RequestRepository, RequestType,
};
use ibk_schemas::{LogRecord, Severity};
use parking_lot::Mutex;

#[derive(Default)]
struct Hooks {
    logs: Mutex<Vec<LogRecord>>,
    session_errors: Mutex<Vec<i32>>,
    fatal: Mutex<Vec<i32>>,
}

impl ErrorHooks for Hooks {
    fn on_log(&self, record: &LogRecord) {
        self.logs.lock().push(record.clone());
    }

    fn on_session_error(&self, record: &LogRecord) {
        self.session_errors.lock().push(record.code);
    }

    fn on_fatal_error(&self, record: &LogRecord) {
        self.fatal.lock().push(record.code);
    }
}

fn setup() -> (RequestRepository, Arc<Hooks>, ErrorRouter) {
    let repo = RequestRepository::new(|| true, Arc::new(IdGenerator::default()));
    let hooks = Arc::new(Hooks::default());
    let router = ErrorRouter::new(repo.clone(), hooks.clone());
    (repo, hooks, router)
}

fn cancel_request(repo: &RequestRepository, order_id: i32) -> ibk_requests::Subscription<bool> {
    let mut sub = repo
        .builder::<bool>()
        .request_type(RequestType::ReqOrderCancel)
        .register_fixed(order_id, || Ok(()))
        .subscribe();
    sub.start().expect("cancel request starts");
    sub
}

#[test]
fn cancel_not_found_fails_only_the_cancel_request() {
    let (repo, hooks, router) = setup();
    let mut cancel = cancel_request(&repo, 12);

    let c = router.handle(12, 10147, "OrderId 12 that needs to be cancelled is not found.");
    assert_eq!(c.category, Category::Custom);

    match cancel.try_next() {
        Some(Err(RequestError::Broker(BrokerFailure::Terminal { id, code, .. }))) => {
            assert_eq!((id, code), (12, 10147));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(repo.is_empty());
    assert_eq!(hooks.logs.lock().len(), 1);
    assert!(hooks.session_errors.lock().is_empty());
}

#[test]
fn cancel_not_cancellable_completes_with_true() {
    let (repo, _hooks, router) = setup();
    let mut cancel = cancel_request(&repo, 12);

    router.handle(12, 10148, "OrderId 12 that needs to be cancelled can not be cancelled");

    assert_eq!(cancel.try_next(), Some(Ok(true)));
    assert_eq!(cancel.try_next(), None);
    assert!(cancel.is_finished());
    assert!(!repo.contains(RequestKey::new(RequestType::ReqOrderCancel, 12)));
}

#[test]
fn critical_code_invokes_fatal_hook() {
    let (_repo, hooks, router) = setup();
    router.handle(-1, 503, "The TWS is out of date and must be upgraded.");

    assert_eq!(*hooks.fatal.lock(), vec![503]);
    assert_eq!(hooks.logs.lock()[0].severity, Severity::Critical);
}

#[test]
fn info_code_is_logged_only() {
    let (repo, hooks, router) = setup();
    let mut cancel = cancel_request(&repo, 4);

    router.handle(-1, 2104, "Market data farm connection is OK:usfarm");

    assert_eq!(hooks.logs.lock()[0].severity, Severity::Info);
    assert_eq!(cancel.try_next(), None);
    assert!(!cancel.is_finished());
    assert!(hooks.fatal.lock().is_empty());
}

#[test]
fn historical_no_permissions_reaches_the_pending_request() {
    let (repo, _hooks, router) = setup();
    let mut bars = repo
        .builder::<u32>()
        .request_type(RequestType::ReqHistoricalData)
        .id(8)
        .register_with_id(|_| Ok(()))
        .subscribe();
    bars.start().unwrap();

    router.handle(
        8,
        162,
        "Historical Market Data Service error message:No market data permissions for XYZ",
    );

    assert_eq!(
        bars.try_next(),
        Some(Err(RequestError::Broker(BrokerFailure::NoPermissions {
            id: 8,
            message: "No market data permissions for XYZ".into(),
        })))
    );
}

#[test]
fn unknown_code_without_request_is_a_session_error() {
    let (_repo, hooks, router) = setup();
    router.handle(-1, 1100, "Connectivity between IB and TWS has been lost.");
    assert_eq!(*hooks.session_errors.lock(), vec![1100]);
}

#[test]
fn unknown_code_for_missing_request_is_dropped_quietly() {
    let (repo, hooks, router) = setup();
    let c = router.handle(77, 321, "Error validating request");
    assert_eq!(c.category, Category::RequestError);
    assert!(repo.is_empty());
    assert!(hooks.session_errors.lock().is_empty());
    assert_eq!(hooks.logs.lock().len(), 1);
}

#[test]
fn classification_serializes_for_operators() {
    let (_repo, _hooks, router) = setup();
    let c = router.handle(12, 10147, "not found");
    let json = serde_json::to_value(&c).unwrap();
    assert_eq!(json["category"], "custom");
    assert_eq!(json["action"]["action"], "fail_request");
    assert_eq!(json["action"]["failure"]["kind"], "terminal");
    assert_eq!(json["record"]["code"], 10147);
}
