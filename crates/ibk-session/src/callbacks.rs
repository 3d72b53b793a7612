//! Inbound callback surface.
//!
//! Every broker message lands here, on whichever thread the transport pumps
//! from. Each callback updates the cache (where there is state to keep) and
//! routes the result into the matching request.

use std::sync::Arc;

use chrono::DateTime;
use ibk_cache::EntityCache;
use ibk_connection::{ConnectionHandle, ConnectionStatus};
use ibk_events::{Classification, ErrorRouter};
use ibk_requests::{RequestKey, RequestRepository, RequestType};
use ibk_schemas::{
    decimal_from_wire, Bar, CommissionReport, Contract, ContractDetails, DepthExchange,
    DepthOperation, Execution, MarketDepth, MarketRule, OpenOrder, OrderStatus, Pnl,
    PortfolioLine, Position, PriceIncrement, Tick, TickAttrib,
};
use rust_decimal::Decimal;
use tracing::{debug, error, info, trace, warn};

use crate::InboundMessage;

pub struct Callbacks {
    pub(crate) repo: RequestRepository,
    pub(crate) cache: Arc<EntityCache>,
    pub(crate) router: ErrorRouter,
    pub(crate) connection: ConnectionHandle,
}

impl Callbacks {
    pub fn dispatch(&self, message: InboundMessage) {
        match message {
            InboundMessage::ConnectAck => self.on_connect_ack(),
            InboundMessage::ConnectionClosed => self.on_connection_closed(),
            InboundMessage::NextValidId(id) => self.on_next_valid_id(id),
            InboundMessage::Error { id, code, message } => {
                self.on_error(id, code, &message);
            }
            InboundMessage::CurrentTime(epoch) => self.on_current_time(epoch),
            InboundMessage::TickPrice {
                ticker_id,
                field,
                price,
                attrib,
            } => self.on_tick_price(ticker_id, field, price, attrib),
            InboundMessage::TickSize {
                ticker_id,
                field,
                size,
            } => self.on_tick_size(ticker_id, field, size),
            InboundMessage::TickString {
                ticker_id,
                field,
                value,
            } => self.on_tick_string(ticker_id, field, value),
            InboundMessage::TickGeneric {
                ticker_id,
                field,
                value,
            } => self.on_tick_generic(ticker_id, field, value),
            InboundMessage::TickSnapshotEnd(ticker_id) => self.on_tick_snapshot_end(ticker_id),
            InboundMessage::MarketDepth {
                ticker_id,
                position,
                operation,
                side,
                price,
                size,
                market_maker,
            } => self.on_market_depth(ticker_id, position, operation, side, price, size, market_maker),
            InboundMessage::MarketDepthExchanges(list) => self.on_market_depth_exchanges(list),
            InboundMessage::Position(position) => self.on_position(position),
            InboundMessage::PositionEnd => self.on_position_end(),
            InboundMessage::Portfolio(line) => self.on_portfolio(line),
            InboundMessage::AccountDownloadEnd(account) => self.on_account_download_end(&account),
            InboundMessage::AccountSummary {
                req_id,
                account,
                tag,
                value,
                currency,
            } => self.on_account_summary(req_id, &account, &tag, &value, &currency),
            InboundMessage::AccountSummaryEnd(req_id) => self.on_account_summary_end(req_id),
            InboundMessage::OpenOrder(open) => self.on_open_order(open),
            InboundMessage::OrderStatus(status) => self.on_order_status(status),
            InboundMessage::OpenOrderEnd => self.on_open_order_end(),
            InboundMessage::ExecDetails {
                req_id,
                contract,
                execution,
            } => self.on_exec_details(req_id, contract, execution),
            InboundMessage::ExecDetailsEnd(req_id) => self.on_exec_details_end(req_id),
            InboundMessage::CommissionReport(report) => self.on_commission_report(report),
            InboundMessage::ContractDetails { req_id, details } => {
                self.on_contract_details(req_id, details)
            }
            InboundMessage::ContractDetailsEnd(req_id) => self.on_contract_details_end(req_id),
            InboundMessage::HistoricalData { req_id, bar } => self.on_historical_data(req_id, bar),
            InboundMessage::HistoricalDataEnd(req_id) => self.on_historical_data_end(req_id),
            InboundMessage::Pnl {
                req_id,
                daily_pnl,
                unrealized_pnl,
                realized_pnl,
            } => self.on_pnl(req_id, daily_pnl, unrealized_pnl, realized_pnl),
            InboundMessage::PnlSingle {
                req_id,
                position,
                daily_pnl,
                unrealized_pnl,
                realized_pnl,
                value,
            } => self.on_pnl_single(req_id, position, daily_pnl, unrealized_pnl, realized_pnl, value),
            InboundMessage::MarketRule {
                market_rule_id,
                increments,
            } => self.on_market_rule(market_rule_id, increments),
        }
    }

    // -----------------------------------------------------------------------
    // Connection
    // -----------------------------------------------------------------------

    pub fn on_connect_ack(&self) {
        info!("connection acknowledged by broker");
        self.connection.confirm_connection();
    }

    /// The broker dropped us. Retrying is the caller's decision, so the
    /// session only moves itself to `Disconnected`.
    pub fn on_connection_closed(&self) {
        warn!("connection closed by broker");
        match self.connection.status() {
            ConnectionStatus::Disconnected | ConnectionStatus::Disconnecting => {}
            _ => {
                if let Err(err) = self.connection.disconnect() {
                    error!(error = %err, "cannot disconnect after connection loss");
                }
            }
        }
    }

    pub fn on_next_valid_id(&self, id: i32) {
        debug!(id, "next valid id");
        self.repo.ids().set_next(id);
    }

    pub fn on_error(&self, id: i32, code: i32, message: &str) -> Classification {
        self.router.handle(id, code, message)
    }

    pub fn on_current_time(&self, epoch_seconds: i64) {
        let key = RequestKey::typed(RequestType::ReqCurrentTime);
        match DateTime::from_timestamp(epoch_seconds, 0) {
            Some(time) => self.repo.deliver_next_and_complete(key, time, true),
            None => warn!(epoch_seconds, "current time out of range"),
        }
    }

    // -----------------------------------------------------------------------
    // Market data
    // -----------------------------------------------------------------------

    fn publish_tick(&self, ticker_id: i32, tick: Tick) {
        self.repo.deliver_next(
            RequestKey::new(RequestType::ReqMarketData, ticker_id),
            tick,
            false,
        );
    }

    pub fn on_tick_price(&self, ticker_id: i32, field: i32, price: f64, attrib: TickAttrib) {
        let Some(price) = decimal_from_wire("price", price) else {
            return;
        };
        let tick = self.cache.update_tick(ticker_id, |t| {
            t.set_price(ticker_id, field, price, attrib);
        });
        self.publish_tick(ticker_id, tick);
    }

    pub fn on_tick_size(&self, ticker_id: i32, field: i32, size: Decimal) {
        let tick = self.cache.update_tick(ticker_id, |t| {
            t.set_size(ticker_id, field, size);
        });
        self.publish_tick(ticker_id, tick);
    }

    pub fn on_tick_string(&self, ticker_id: i32, field: i32, value: String) {
        let tick = self.cache.update_tick(ticker_id, |t| {
            t.set_text(ticker_id, field, value);
        });
        self.publish_tick(ticker_id, tick);
    }

    pub fn on_tick_generic(&self, ticker_id: i32, field: i32, value: f64) {
        let Some(value) = decimal_from_wire("generic", value) else {
            return;
        };
        let tick = self.cache.update_tick(ticker_id, |t| {
            t.set_generic(ticker_id, field, value);
        });
        self.publish_tick(ticker_id, tick);
    }

    pub fn on_tick_snapshot_end(&self, ticker_id: i32) {
        self.repo
            .deliver_completion(RequestKey::new(RequestType::ReqMarketData, ticker_id), false);
    }

    /// Depth rows are keyed by contract, which the request carries as user
    /// data. Each update delivers a snapshot of the whole book.
    #[allow(clippy::too_many_arguments)]
    pub fn on_market_depth(
        &self,
        ticker_id: i32,
        position: i32,
        operation: i32,
        side: i32,
        price: f64,
        size: Decimal,
        market_maker: String,
    ) {
        let key = RequestKey::new(RequestType::EventMarketDataLvl2, ticker_id);
        if !self.repo.contains(key) {
            trace!(ticker_id, "market depth for inactive request");
            return;
        }
        let Some(conid) = self.repo.user_data::<i32>(key) else {
            return;
        };
        let operation = match DepthOperation::from_wire(operation) {
            Ok(operation) => operation,
            Err(err) => {
                error!(ticker_id, error = %err, "market depth dropped");
                return;
            }
        };
        let Some(price) = decimal_from_wire("price", price) else {
            error!(ticker_id, position, "market depth without price dropped");
            return;
        };
        let depth = match MarketDepth::from_wire(position, side, price, size, market_maker) {
            Ok(depth) => depth,
            Err(err) => {
                error!(ticker_id, error = %err, "market depth dropped");
                return;
            }
        };

        self.cache.add_market_depth(*conid, depth, operation);
        if let Ok(Some(book)) = self.cache.order_book(&Contract::with_conid(*conid)) {
            self.repo.deliver_next(key, book, false);
        }
    }

    pub fn on_market_depth_exchanges(&self, exchanges: Vec<DepthExchange>) {
        self.repo.deliver_next_and_complete(
            RequestKey::typed(RequestType::ReqMarketDepthExchanges),
            exchanges,
            true,
        );
    }

    // -----------------------------------------------------------------------
    // Account
    // -----------------------------------------------------------------------

    pub fn on_position(&self, position: Position) {
        self.cache.update_position(position.clone());
        self.repo
            .deliver_next(RequestKey::typed(RequestType::EventPosition), position, false);
    }

    pub fn on_position_end(&self) {
        debug!("position snapshot delivered");
    }

    pub fn on_portfolio(&self, line: PortfolioLine) {
        self.cache.update_portfolio(line.clone());
        self.repo
            .deliver_next(RequestKey::typed(RequestType::EventPortfolio), line, false);
    }

    pub fn on_account_download_end(&self, account: &str) {
        debug!(account, "account download finished");
    }

    pub fn on_account_summary(
        &self,
        req_id: i32,
        account: &str,
        tag: &str,
        value: &str,
        currency: &str,
    ) {
        if let Err(err) = self
            .cache
            .update_account_summary(req_id, account, tag, value, currency)
        {
            debug!(req_id, error = %err, "account summary row ignored");
        }
    }

    pub fn on_account_summary_end(&self, req_id: i32) {
        let key = RequestKey::new(RequestType::ReqAccountSummary, req_id);
        match self.cache.pop_account_summary(req_id) {
            Some(summary) => self.repo.deliver_next_and_complete(key, summary, true),
            None => self.repo.deliver_completion(key, true),
        }
    }

    pub fn on_pnl(&self, req_id: i32, daily_pnl: f64, unrealized_pnl: f64, realized_pnl: f64) {
        let pnl = Pnl {
            position: None,
            daily_pnl: decimal_from_wire("daily_pnl", daily_pnl),
            unrealized_pnl: decimal_from_wire("unrealized_pnl", unrealized_pnl),
            realized_pnl: decimal_from_wire("realized_pnl", realized_pnl),
            value: None,
        };
        self.repo
            .deliver_next(RequestKey::new(RequestType::EventAccountPnl, req_id), pnl, false);
    }

    pub fn on_pnl_single(
        &self,
        req_id: i32,
        position: Decimal,
        daily_pnl: f64,
        unrealized_pnl: f64,
        realized_pnl: f64,
        value: f64,
    ) {
        let pnl = Pnl {
            position: Some(position),
            daily_pnl: decimal_from_wire("daily_pnl", daily_pnl),
            unrealized_pnl: decimal_from_wire("unrealized_pnl", unrealized_pnl),
            realized_pnl: decimal_from_wire("realized_pnl", realized_pnl),
            value: decimal_from_wire("value", value),
        };
        self.repo
            .deliver_next(RequestKey::new(RequestType::EventContractPnl, req_id), pnl, false);
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    pub fn on_open_order(&self, open: OpenOrder) {
        self.cache.add_order(open);
    }

    /// Exact repeats are dropped. A status for an order the cache has not
    /// seen yet is still routed: it is real, only early.
    pub fn on_order_status(&self, status: OrderStatus) {
        let order_id = status.order_id;
        if let Ok(false) = self.cache.add_status(status.clone()) {
            trace!(order_id, "repeated order status dropped");
            return;
        }

        self.repo.deliver_next(
            RequestKey::typed(RequestType::EventOrderStatus),
            status.clone(),
            false,
        );

        let cancelled = status.is_cancelled();
        let place = RequestKey::new(RequestType::ReqOrderPlace, order_id);
        if cancelled || status.is_filled() || status.is_inactive() {
            self.repo.deliver_next_and_complete(place, status, false);
        } else {
            self.repo.deliver_next(place, status, false);
        }

        if cancelled {
            self.repo.deliver_next_and_complete(
                RequestKey::new(RequestType::ReqOrderCancel, order_id),
                true,
                false,
            );
        }
    }

    pub fn on_open_order_end(&self) {
        // Also sent unsolicited after connect.
        self.repo.deliver_next_and_complete(
            RequestKey::typed(RequestType::ReqOrderList),
            self.cache.orders(),
            false,
        );
    }

    pub fn on_exec_details(&self, req_id: i32, contract: Contract, execution: Execution) {
        let exec_id = execution.exec_id.clone();
        self.cache.add_execution_report(contract, execution);
        let Some(report) = self.cache.execution_report(&exec_id) else {
            return;
        };
        if req_id >= 0 {
            self.repo.deliver_next(
                RequestKey::new(RequestType::ReqExecutions, req_id),
                report.clone(),
                false,
            );
        }
        self.repo.deliver_next(
            RequestKey::typed(RequestType::EventExecutionInfo),
            report,
            false,
        );
    }

    pub fn on_exec_details_end(&self, req_id: i32) {
        self.repo
            .deliver_completion(RequestKey::new(RequestType::ReqExecutions, req_id), false);
    }

    pub fn on_commission_report(&self, commission: CommissionReport) {
        if let Some(report) = self.cache.update_execution_report(commission) {
            self.repo.deliver_next(
                RequestKey::typed(RequestType::EventExecutionInfo),
                report,
                false,
            );
        }
    }

    // -----------------------------------------------------------------------
    // Reference / historical data
    // -----------------------------------------------------------------------

    pub fn on_contract_details(&self, req_id: i32, details: ContractDetails) {
        self.repo.deliver_next(
            RequestKey::new(RequestType::ReqContractDetail, req_id),
            details,
            true,
        );
    }

    pub fn on_contract_details_end(&self, req_id: i32) {
        self.repo
            .deliver_completion(RequestKey::new(RequestType::ReqContractDetail, req_id), true);
    }

    pub fn on_historical_data(&self, req_id: i32, bar: Bar) {
        self.repo
            .deliver_next(RequestKey::new(RequestType::ReqHistoricalData, req_id), bar, true);
    }

    pub fn on_historical_data_end(&self, req_id: i32) {
        self.repo
            .deliver_completion(RequestKey::new(RequestType::ReqHistoricalData, req_id), true);
    }

    pub fn on_market_rule(&self, market_rule_id: i32, increments: Vec<PriceIncrement>) {
        let rule = MarketRule {
            market_rule_id,
            increments,
        };
        self.repo.deliver_next_and_complete(
            RequestKey::new(RequestType::ReqMarketRule, market_rule_id),
            rule,
            false,
        );
    }
}
