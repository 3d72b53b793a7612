use ibk_schemas::{Contract, OpenOrder, OrderDefinition, OrderState, OrderStatus};
use parking_lot::Mutex;

/// An order definition plus its append-only status history.
///
/// The history keeps arrival order and never holds two equal statuses.
#[derive(Debug)]
pub struct CachedOrder {
    pub order_id: i32,
    pub contract: Contract,
    pub order: OrderDefinition,
    pub state: OrderState,
    statuses: Mutex<Vec<OrderStatus>>,
}

impl CachedOrder {
    pub fn new(open: OpenOrder) -> Self {
        Self {
            order_id: open.order_id,
            contract: open.contract,
            order: open.order,
            state: open.state,
            statuses: Mutex::new(Vec::new()),
        }
    }

    /// Returns `false` if an equal status is already recorded.
    pub fn add_status(&self, status: OrderStatus) -> bool {
        let mut statuses = self.statuses.lock();
        if statuses.contains(&status) {
            return false;
        }
        statuses.push(status);
        true
    }

    /// Prepend `prior`'s history to ours.
    pub(crate) fn absorb(&self, prior: &CachedOrder) {
        let inherited = prior.statuses.lock().clone();
        let mut statuses = self.statuses.lock();
        let own = std::mem::replace(&mut *statuses, inherited);
        statuses.extend(own);
    }

    pub fn statuses(&self) -> Vec<OrderStatus> {
        self.statuses.lock().clone()
    }

    pub fn last_status(&self) -> Option<OrderStatus> {
        self.statuses.lock().last().cloned()
    }

    pub fn status_count(&self) -> usize {
        self.statuses.lock().len()
    }
}
