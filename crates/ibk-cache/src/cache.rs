use std::collections::HashMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ibk_schemas::{
    AccountSummary, CommissionReport, Contract, DepthKey, DepthOperation, Execution,
    ExecutionReport, MarketDepth, OpenOrder, OrderStatus, PortfolioLine, Position, SummaryError,
    Tick,
};
use thiserror::Error;
use tracing::{debug, error, trace, warn};

use crate::CachedOrder;

pub type OrderBook = HashMap<DepthKey, MarketDepth>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionKey {
    pub account: String,
    pub conid: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("status update for not (yet?) existing order {0}")]
    UnknownOrder(i32),
    #[error("contract id is missing")]
    MissingContractId,
    #[error(transparent)]
    Summary(#[from] SummaryError),
}

fn require_conid(conid: i32) -> Result<(), CacheError> {
    if conid == 0 {
        return Err(CacheError::MissingContractId);
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct EntityCache {
    orders: DashMap<i32, Arc<CachedOrder>>,
    positions: DashMap<PositionKey, Position>,
    portfolio: DashMap<i32, PortfolioLine>,
    ticks: DashMap<i32, Tick>,
    account_summaries: DashMap<i32, AccountSummary>,
    exec_reports: DashMap<String, ExecutionReport>,
    order_books: DashMap<i32, OrderBook>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    /// Returns `true` on first registration. A re-sent definition replaces
    /// the record but inherits its status history.
    pub fn add_order(&self, open: OpenOrder) -> bool {
        let order_id = open.order_id;
        let fresh = Arc::new(CachedOrder::new(open));
        match self.orders.entry(order_id) {
            Entry::Occupied(mut slot) => {
                debug!(order_id, "order has already been added");
                fresh.absorb(slot.get());
                slot.insert(fresh);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(fresh);
                true
            }
        }
    }

    /// `Ok(false)` when the status is an exact repeat.
    pub fn add_status(&self, status: OrderStatus) -> Result<bool, CacheError> {
        let order_id = status.order_id;
        // Hold the shard guard so a concurrent re-registration cannot drop
        // this status between lookup and append.
        match self.orders.get(&order_id) {
            Some(order) => Ok(order.add_status(status)),
            None => {
                error!(order_id, ?status, "status update for not (yet?) existing order");
                Err(CacheError::UnknownOrder(order_id))
            }
        }
    }

    pub fn order(&self, order_id: i32) -> Option<Arc<CachedOrder>> {
        self.orders.get(&order_id).map(|o| Arc::clone(o.value()))
    }

    pub fn orders(&self) -> HashMap<i32, Arc<CachedOrder>> {
        self.orders
            .iter()
            .map(|e| (*e.key(), Arc::clone(e.value())))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Positions / portfolio
    // -----------------------------------------------------------------------

    pub fn update_position(&self, position: Position) {
        let key = PositionKey {
            account: position.account.clone(),
            conid: position.contract.conid,
        };
        self.positions.insert(key, position);
    }

    pub fn position(&self, account: &str, contract: &Contract) -> Result<Option<Position>, CacheError> {
        require_conid(contract.conid)?;
        let key = PositionKey {
            account: account.to_string(),
            conid: contract.conid,
        };
        Ok(self.positions.get(&key).map(|p| p.clone()))
    }

    pub fn positions(&self) -> Vec<Position> {
        self.positions.iter().map(|e| e.value().clone()).collect()
    }

    pub fn update_portfolio(&self, line: PortfolioLine) {
        self.portfolio.insert(line.contract.conid, line);
    }

    pub fn portfolio_line(&self, contract: &Contract) -> Result<Option<PortfolioLine>, CacheError> {
        require_conid(contract.conid)?;
        Ok(self.portfolio.get(&contract.conid).map(|p| p.clone()))
    }

    pub fn portfolio(&self) -> Vec<PortfolioLine> {
        self.portfolio.iter().map(|e| e.value().clone()).collect()
    }

    // -----------------------------------------------------------------------
    // Ticks
    // -----------------------------------------------------------------------

    /// Get-or-create the tick, stamp it, apply `update`, and return a
    /// snapshot of the result.
    pub fn update_tick(&self, ticker_id: i32, update: impl FnOnce(&mut Tick)) -> Tick {
        let mut tick = self.ticks.entry(ticker_id).or_default();
        tick.refresh_update_time();
        update(&mut tick);
        tick.clone()
    }

    pub fn tick(&self, ticker_id: i32) -> Option<Tick> {
        self.ticks.get(&ticker_id).map(|t| t.clone())
    }

    pub fn remove_tick(&self, ticker_id: i32) -> Option<Tick> {
        self.ticks.remove(&ticker_id).map(|(_, t)| t)
    }

    // -----------------------------------------------------------------------
    // Account summaries
    // -----------------------------------------------------------------------

    /// Apply one summary row. A protocol error is logged and returned; the
    /// summary keeps whatever it already had.
    pub fn update_account_summary(
        &self,
        request_id: i32,
        account: &str,
        tag: &str,
        value: &str,
        currency: &str,
    ) -> Result<bool, CacheError> {
        let mut summary = self.account_summaries.entry(request_id).or_default();
        summary.update(account, tag, value, currency).map_err(|err| {
            error!(request_id, tag, error = %err, "cannot update account summary");
            CacheError::from(err)
        })
    }

    pub fn account_summary(&self, request_id: i32) -> Option<AccountSummary> {
        self.account_summaries.get(&request_id).map(|s| s.clone())
    }

    pub fn pop_account_summary(&self, request_id: i32) -> Option<AccountSummary> {
        self.account_summaries.remove(&request_id).map(|(_, s)| s)
    }

    // -----------------------------------------------------------------------
    // Executions
    // -----------------------------------------------------------------------

    pub fn add_execution_report(&self, contract: Contract, execution: Execution) {
        let exec_id = execution.exec_id.clone();
        let previous = self
            .exec_reports
            .insert(exec_id.clone(), ExecutionReport::new(contract, execution));
        if previous.is_some() {
            warn!(exec_id, "execution info is overwritten");
        }
    }

    /// Attach a commission to its execution. Returns the enriched report, or
    /// `None` when no execution is known for it.
    pub fn update_execution_report(&self, commission: CommissionReport) -> Option<ExecutionReport> {
        let Some(mut report) = self.exec_reports.get_mut(&commission.exec_id) else {
            warn!(exec_id = %commission.exec_id, "commission report without execution report");
            return None;
        };
        if report.commission.is_some() {
            warn!(exec_id = %commission.exec_id, "duplicate commission report ignored");
        } else {
            report.commission = Some(commission);
        }
        Some(report.clone())
    }

    pub fn execution_report(&self, exec_id: &str) -> Option<ExecutionReport> {
        self.exec_reports.get(exec_id).map(|r| r.clone())
    }

    pub fn execution_reports(&self) -> Vec<ExecutionReport> {
        self.exec_reports.iter().map(|e| e.value().clone()).collect()
    }

    // -----------------------------------------------------------------------
    // Order books
    // -----------------------------------------------------------------------

    pub fn add_market_depth(&self, conid: i32, depth: MarketDepth, operation: DepthOperation) {
        let mut book = self.order_books.entry(conid).or_default();
        match operation {
            DepthOperation::Insert => {
                trace!(conid, ?depth, "market depth is added");
                book.insert(depth.key(), depth);
            }
            DepthOperation::Update => {
                trace!(conid, ?depth, "market depth is updated");
                book.insert(depth.key(), depth);
            }
            DepthOperation::Remove => {
                trace!(conid, ?depth, "market depth is removed");
                book.remove(&depth.key());
            }
        }
    }

    pub fn order_book(&self, contract: &Contract) -> Result<Option<OrderBook>, CacheError> {
        require_conid(contract.conid)?;
        Ok(self.order_books.get(&contract.conid).map(|b| b.clone()))
    }

    // -----------------------------------------------------------------------

    /// Session reset. Families are cleared one after another, account
    /// summaries included: a summary request does not outlive the session.
    pub fn clear(&self) {
        self.orders.clear();
        self.positions.clear();
        self.portfolio.clear();
        self.ticks.clear();
        self.account_summaries.clear();
        self.exec_reports.clear();
        self.order_books.clear();
        debug!("cache is cleared");
    }
}
