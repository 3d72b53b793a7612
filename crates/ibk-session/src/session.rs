use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ibk_cache::{CacheError, CachedOrder, EntityCache, OrderBook};
use ibk_config::SessionConfig;
use ibk_connection::{
    ConnectionError, ConnectionHandle, ConnectionMonitor, ConnectionStatus, MonitorConfig,
    WaitTimeout,
};
use ibk_events::ErrorRouter;
use ibk_requests::{IdGenerator, RequestBuilder, RequestRepository, RequestType, Subscription};
use ibk_schemas::{
    AccountSummary, Bar, Contract, ContractDetails, DepthExchange, ExecutionReport, MarketRule,
    OrderDefinition, OrderStatus, Pnl, PortfolioLine, Position, Tick,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::driver::{SessionDriver, SessionHooks};
use crate::{
    Callbacks, Endpoint, ExecutionFilter, OutboundRequest, ReaderConfig, ReaderLoop,
    SessionEvent, Transport,
};

const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalQuery {
    pub contract: Contract,
    /// Broker timestamp format; empty means "now".
    pub end_date_time: String,
    pub duration: String,
    pub bar_size: String,
    pub what_to_show: String,
    pub use_rth: bool,
}

/// One broker session: connection lifecycle, reader, request correlation,
/// cache and error routing, wired together around a [`Transport`].
pub struct Session {
    transport: Arc<dyn Transport>,
    monitor: ConnectionMonitor,
    reader: ReaderLoop,
    callbacks: Arc<Callbacks>,
    events: broadcast::Sender<SessionEvent>,
    closed: AtomicBool,
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>, config: &SessionConfig) -> Self {
        let cache = Arc::new(EntityCache::new());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let driver = Arc::new(SessionDriver {
            transport: Arc::clone(&transport),
            endpoint: Endpoint::from(config),
            cache: Arc::clone(&cache),
            events: events.clone(),
        });
        let monitor = ConnectionMonitor::new(
            driver,
            MonitorConfig {
                connection_delay: config.connection_delay(),
                poll_interval: config.poll_interval(),
                start_timeout: config.start_timeout(),
                close_grace: config.close_grace(),
            },
        );
        let connection = monitor.handle();

        let probe = Arc::clone(&transport);
        let repo = RequestRepository::new(
            move || probe.is_connected(),
            Arc::new(IdGenerator::new(config.first_request_id)),
        );
        let hooks = Arc::new(SessionHooks {
            connection: connection.clone(),
            events: events.clone(),
        });
        let router = ErrorRouter::new(repo.clone(), hooks);

        let callbacks = Arc::new(Callbacks {
            repo,
            cache,
            router,
            connection,
        });
        let reader = ReaderLoop::new(
            Arc::clone(&transport),
            Arc::clone(&callbacks),
            ReaderConfig {
                idle: config.reader_idle(),
                stop_grace: config.reader_stop_grace(),
            },
        );

        Self {
            transport,
            monitor,
            reader,
            callbacks,
            events,
            closed: AtomicBool::new(false),
        }
    }

    /// Start the connection monitor and the reader. The session is
    /// `Disconnected` afterwards; call [`Session::connect`].
    pub fn start(&self) -> Result<(), ConnectionError> {
        self.monitor.start()?;
        self.reader.start()?;
        info!("session started");
        Ok(())
    }

    /// Disconnect, stop both threads, end every live subscription with
    /// `SessionClosed` (no outbound cancels) and drop cached state.
    /// Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.monitor.close();
        self.reader.close();
        self.callbacks.repo.close();
        self.callbacks.cache.clear();
        info!("session closed");
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn connection(&self) -> ConnectionHandle {
        self.monitor.handle()
    }

    pub fn cache(&self) -> &EntityCache {
        &self.callbacks.cache
    }

    pub fn requests(&self) -> &RequestRepository {
        &self.callbacks.repo
    }

    /// Entry point for transports that invoke callbacks directly instead of
    /// queueing messages for the reader.
    pub fn callbacks(&self) -> &Arc<Callbacks> {
        &self.callbacks
    }

    pub fn events(&self) -> BroadcastStream<SessionEvent> {
        BroadcastStream::new(self.events.subscribe())
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // -----------------------------------------------------------------------
    // Connection commands
    // -----------------------------------------------------------------------

    pub fn status(&self) -> ConnectionStatus {
        self.monitor.status()
    }

    pub fn connect(&self) {
        self.monitor.handle().connect();
    }

    pub fn reconnect(&self) {
        self.monitor.handle().reconnect();
    }

    pub fn confirm_connection(&self) {
        self.monitor.handle().confirm_connection();
    }

    pub fn disconnect(&self) -> Result<(), ConnectionError> {
        self.monitor.handle().disconnect()
    }

    pub fn wait_for_status(
        &self,
        expected: ConnectionStatus,
        timeout: Option<Duration>,
    ) -> Result<(), WaitTimeout> {
        self.monitor.handle().wait_for_status(expected, timeout)
    }

    // -----------------------------------------------------------------------
    // Subscribe helpers
    // -----------------------------------------------------------------------

    fn request<T: Send + 'static>(&self, ty: RequestType) -> RequestBuilder<T> {
        self.callbacks.repo.builder::<T>().request_type(ty)
    }

    fn sender(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    pub fn current_time(&self) -> Subscription<DateTime<Utc>> {
        let t = self.sender();
        self.request(RequestType::ReqCurrentTime)
            .register(move || t.send(OutboundRequest::ReqCurrentTime))
            .subscribe()
    }

    /// Streams a snapshot of the merged tick after every update.
    pub fn market_data(&self, contract: Contract, generic_ticks: &str, snapshot: bool) -> Subscription<Tick> {
        let (t, c) = (self.sender(), self.sender());
        let generic_ticks = generic_ticks.to_string();
        self.request(RequestType::ReqMarketData)
            .register_with_id(move |ticker_id| {
                t.send(OutboundRequest::ReqMarketData {
                    ticker_id,
                    contract: contract.clone(),
                    generic_ticks: generic_ticks.clone(),
                    snapshot,
                })
            })
            .unregister_with_id(move |ticker_id| c.send(OutboundRequest::CancelMarketData { ticker_id }))
            .subscribe()
    }

    /// The book is cached per contract id, so the contract must carry one.
    pub fn market_depth(
        &self,
        contract: Contract,
        rows: i32,
        smart_depth: bool,
    ) -> Result<Subscription<OrderBook>, CacheError> {
        if contract.conid == 0 {
            return Err(CacheError::MissingContractId);
        }
        let conid = contract.conid;
        let (t, c) = (self.sender(), self.sender());
        Ok(self
            .request(RequestType::EventMarketDataLvl2)
            .user_data(conid)
            .register_with_id(move |ticker_id| {
                t.send(OutboundRequest::ReqMarketDepth {
                    ticker_id,
                    contract: contract.clone(),
                    rows,
                    smart_depth,
                })
            })
            .unregister_with_id(move |ticker_id| {
                c.send(OutboundRequest::CancelMarketDepth {
                    ticker_id,
                    smart_depth,
                })
            })
            .subscribe())
    }

    pub fn market_depth_exchanges(&self) -> Subscription<Vec<DepthExchange>> {
        let t = self.sender();
        self.request(RequestType::ReqMarketDepthExchanges)
            .register(move || t.send(OutboundRequest::ReqMarketDepthExchanges))
            .subscribe()
    }

    /// One summary, delivered when the broker marks the end of the rows.
    pub fn account_summary(&self, group: &str, tags: &str) -> Subscription<AccountSummary> {
        let (t, c) = (self.sender(), self.sender());
        let (group, tags) = (group.to_string(), tags.to_string());
        self.request(RequestType::ReqAccountSummary)
            .register_with_id(move |req_id| {
                t.send(OutboundRequest::ReqAccountSummary {
                    req_id,
                    group: group.clone(),
                    tags: tags.clone(),
                })
            })
            .unregister_with_id(move |req_id| c.send(OutboundRequest::CancelAccountSummary { req_id }))
            .subscribe()
    }

    pub fn positions(&self) -> Subscription<Position> {
        let (t, c) = (self.sender(), self.sender());
        self.request(RequestType::EventPosition)
            .register(move || t.send(OutboundRequest::ReqPositions))
            .unregister(move || c.send(OutboundRequest::CancelPositions))
            .subscribe()
    }

    pub fn portfolio(&self, account: &str) -> Subscription<PortfolioLine> {
        let (t, c) = (self.sender(), self.sender());
        let (a, b) = (account.to_string(), account.to_string());
        self.request(RequestType::EventPortfolio)
            .register(move || {
                t.send(OutboundRequest::ReqAccountUpdates {
                    subscribe: true,
                    account: a.clone(),
                })
            })
            .unregister(move || {
                c.send(OutboundRequest::ReqAccountUpdates {
                    subscribe: false,
                    account: b.clone(),
                })
            })
            .subscribe()
    }

    /// Listens to every order status the session sees. Sends nothing.
    pub fn order_statuses(&self) -> Subscription<OrderStatus> {
        self.request(RequestType::EventOrderStatus)
            .register(|| Ok(()))
            .subscribe()
    }

    /// Listens to every execution report, first bare and again once its
    /// commission arrives. Sends nothing.
    pub fn execution_info(&self) -> Subscription<ExecutionReport> {
        self.request(RequestType::EventExecutionInfo)
            .register(|| Ok(()))
            .subscribe()
    }

    /// Places an order under an id drawn from the session's id source (see
    /// [`Subscription::key`]). The stream ends on the first filled,
    /// cancelled or inactive status. Dropping it does not cancel the order.
    pub fn place_order(&self, contract: Contract, order: OrderDefinition) -> Subscription<OrderStatus> {
        let t = self.sender();
        self.request(RequestType::ReqOrderPlace)
            .register_with_id(move |order_id| {
                t.send(OutboundRequest::PlaceOrder {
                    order_id,
                    contract: contract.clone(),
                    order: order.clone(),
                })
            })
            .subscribe()
    }

    /// Yields `true` once the order is cancelled, or once the broker reports
    /// it can no longer be cancelled.
    pub fn cancel_order(&self, order_id: i32) -> Subscription<bool> {
        let t = self.sender();
        self.request(RequestType::ReqOrderCancel)
            .register_fixed(order_id, move || t.send(OutboundRequest::CancelOrder { order_id }))
            .subscribe()
    }

    pub fn open_orders(&self) -> Subscription<HashMap<i32, Arc<CachedOrder>>> {
        let t = self.sender();
        self.request(RequestType::ReqOrderList)
            .register(move || t.send(OutboundRequest::ReqAllOpenOrders))
            .subscribe()
    }

    pub fn executions(&self, filter: ExecutionFilter) -> Subscription<ExecutionReport> {
        let t = self.sender();
        self.request(RequestType::ReqExecutions)
            .register_with_id(move |req_id| {
                t.send(OutboundRequest::ReqExecutions {
                    req_id,
                    filter: filter.clone(),
                })
            })
            .subscribe()
    }

    pub fn contract_details(&self, contract: Contract) -> Subscription<ContractDetails> {
        let t = self.sender();
        self.request(RequestType::ReqContractDetail)
            .register_with_id(move |req_id| {
                t.send(OutboundRequest::ReqContractDetails {
                    req_id,
                    contract: contract.clone(),
                })
            })
            .subscribe()
    }

    pub fn historical_data(&self, query: HistoricalQuery) -> Subscription<Bar> {
        let (t, c) = (self.sender(), self.sender());
        self.request(RequestType::ReqHistoricalData)
            .register_with_id(move |req_id| {
                let q = query.clone();
                t.send(OutboundRequest::ReqHistoricalData {
                    req_id,
                    contract: q.contract,
                    end_date_time: q.end_date_time,
                    duration: q.duration,
                    bar_size: q.bar_size,
                    what_to_show: q.what_to_show,
                    use_rth: q.use_rth,
                })
            })
            .unregister_with_id(move |req_id| c.send(OutboundRequest::CancelHistoricalData { req_id }))
            .subscribe()
    }

    pub fn account_pnl(&self, account: &str, model_code: &str) -> Subscription<Pnl> {
        let (t, c) = (self.sender(), self.sender());
        let (account, model_code) = (account.to_string(), model_code.to_string());
        self.request(RequestType::EventAccountPnl)
            .register_with_id(move |req_id| {
                t.send(OutboundRequest::ReqPnl {
                    req_id,
                    account: account.clone(),
                    model_code: model_code.clone(),
                })
            })
            .unregister_with_id(move |req_id| c.send(OutboundRequest::CancelPnl { req_id }))
            .subscribe()
    }

    pub fn contract_pnl(&self, account: &str, model_code: &str, conid: i32) -> Subscription<Pnl> {
        let (t, c) = (self.sender(), self.sender());
        let (account, model_code) = (account.to_string(), model_code.to_string());
        self.request(RequestType::EventContractPnl)
            .register_with_id(move |req_id| {
                t.send(OutboundRequest::ReqPnlSingle {
                    req_id,
                    account: account.clone(),
                    model_code: model_code.clone(),
                    conid,
                })
            })
            .unregister_with_id(move |req_id| c.send(OutboundRequest::CancelPnlSingle { req_id }))
            .subscribe()
    }

    pub fn market_rule(&self, market_rule_id: i32) -> Subscription<MarketRule> {
        let t = self.sender();
        self.request(RequestType::ReqMarketRule)
            .register_fixed(market_rule_id, move || {
                t.send(OutboundRequest::ReqMarketRule { market_rule_id })
            })
            .subscribe()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
