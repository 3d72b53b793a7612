//! Live request table.
//!
//! # Invariants
//!
//! - At most one live entry per key under wildcard equality. A second
//!   activation of an equal key is refused before anything is registered.
//! - An entry is removed exactly once: by its subscription's disposal, by a
//!   terminal delivery (error / completion), or by [`RequestRepository::close`].
//! - Deliveries for one key reach the subscription in call order (unbounded
//!   per-key channel, no reordering).

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, trace, warn};

use crate::{IdGenerator, RequestBuilder, RequestError, RequestKey};

/// Answers "is the session connected right now?" for activation and
/// cancellation decisions.
pub trait ConnectionProbe: Send + Sync {
    fn is_connected(&self) -> bool;
}

impl<F> ConnectionProbe for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_connected(&self) -> bool {
        self()
    }
}

pub(crate) type Action = Arc<dyn Fn(Option<i32>) -> anyhow::Result<()> + Send + Sync>;
pub(crate) type UserData = Arc<dyn Any + Send + Sync>;

pub(crate) enum Signal {
    Next(Box<dyn Any + Send>),
    Error(RequestError),
    Complete,
}

/// Everything a builder collected; independent of the item type.
#[derive(Clone, Default)]
pub(crate) struct RequestPlan {
    pub ty: Option<crate::RequestType>,
    pub register: Option<Action>,
    pub unregister: Option<Action>,
    pub user_data: Option<UserData>,
    pub with_id: bool,
    pub id: Option<i32>,
}

pub(crate) struct Request {
    key: RequestKey,
    sink: UnboundedSender<Signal>,
    unregister: Option<Action>,
    user_data: Option<UserData>,
    disposed: AtomicBool,
}

impl Request {
    fn send(&self, signal: Signal) {
        if self.sink.send(signal).is_err() {
            trace!(request = %self.key, "subscriber already gone");
        }
    }
}

/// Keeps a live entry alive; dropping it disposes the request.
pub(crate) struct Registration {
    repo: RequestRepository,
    request: Arc<Request>,
}

impl Registration {
    pub(crate) fn key(&self) -> RequestKey {
        self.request.key
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.repo.dispose(&self.request);
    }
}

struct Inner {
    requests: DashMap<RequestKey, Arc<Request>>,
    probe: Box<dyn ConnectionProbe>,
    ids: Arc<IdGenerator>,
}

/// Constructed once per session and shared by handle.
#[derive(Clone)]
pub struct RequestRepository {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RequestRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRepository")
            .field("live", &self.keys())
            .finish()
    }
}

impl RequestRepository {
    pub fn new(probe: impl ConnectionProbe + 'static, ids: Arc<IdGenerator>) -> Self {
        Self {
            inner: Arc::new(Inner {
                requests: DashMap::new(),
                probe: Box::new(probe),
                ids,
            }),
        }
    }

    pub fn builder<T: Send + 'static>(&self) -> RequestBuilder<T> {
        RequestBuilder::new(self.clone())
    }

    pub fn ids(&self) -> &Arc<IdGenerator> {
        &self.inner.ids
    }

    pub fn len(&self) -> usize {
        self.inner.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.requests.is_empty()
    }

    pub fn contains(&self, key: RequestKey) -> bool {
        self.inner.requests.contains_key(&key)
    }

    pub fn keys(&self) -> Vec<RequestKey> {
        self.inner.requests.iter().map(|e| *e.key()).collect()
    }

    // -----------------------------------------------------------------------
    // Activation / disposal
    // -----------------------------------------------------------------------

    pub(crate) fn activate(
        &self,
        plan: &RequestPlan,
    ) -> Result<(UnboundedReceiver<Signal>, Registration), RequestError> {
        let register = plan.register.clone().ok_or(RequestError::MissingRegister)?;
        let ty = plan.ty.ok_or(RequestError::MissingType)?;
        if !self.inner.probe.is_connected() {
            debug!(request = %ty, "refusing request: not connected");
            return Err(RequestError::NotConnected);
        }

        let id = if plan.with_id && plan.id.is_none() {
            Some(self.inner.ids.next_id())
        } else {
            plan.id
        };
        let key = RequestKey { ty: Some(ty), id };

        let (sink, rx) = mpsc::unbounded_channel();
        let request = Arc::new(Request {
            key,
            sink,
            unregister: plan.unregister.clone(),
            user_data: plan.user_data.clone(),
            disposed: AtomicBool::new(false),
        });

        let duplicated = match self.inner.requests.entry(key) {
            Entry::Occupied(_) => true,
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&request));
                false
            }
        };
        if duplicated {
            error!(request = %key, "duplicated request");
            error!("this means the same thing is subscribed twice on the same session");
            error!(live = ?self.keys(), "existing requests");
            return Err(RequestError::Duplicated(key));
        }

        if let Err(err) = register(id) {
            request.disposed.store(true, Ordering::SeqCst);
            self.remove(&request);
            error!(request = %key, error = %err, "register action failed");
            return Err(RequestError::Register {
                key,
                message: err.to_string(),
            });
        }
        info!(request = %key, "registered");

        let registration = Registration {
            repo: self.clone(),
            request,
        };
        Ok((rx, registration))
    }

    fn remove(&self, request: &Arc<Request>) -> bool {
        self.inner
            .requests
            .remove_if(&request.key, |_, live| Arc::ptr_eq(live, request))
            .is_some()
    }

    /// Remove the entry once, then best-effort cancel at the broker.
    fn dispose(&self, request: &Arc<Request>) {
        if request.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.remove(request) {
            debug!(request = %request.key, "request already removed");
        }

        if !self.inner.probe.is_connected() {
            debug!(request = %request.key, "no connection at unregister");
            return;
        }
        let Some(unregister) = &request.unregister else {
            return;
        };
        debug!(request = %request.key, "unregister");
        if let Err(err) = unregister(request.key.id) {
            warn!(request = %request.key, error = %err, "unregister action failed");
        }
    }

    /// Process-level teardown: every live subscription ends with
    /// [`RequestError::SessionClosed`], no unregister is sent.
    pub fn close(&self) {
        let live: Vec<Arc<Request>> = self
            .inner
            .requests
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();
        for request in &live {
            if !request.disposed.swap(true, Ordering::SeqCst) {
                request.send(Signal::Error(RequestError::SessionClosed));
            }
        }
        self.inner.requests.clear();
        debug!(closed = live.len(), "request repository closed");
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    fn lookup(&self, key: RequestKey, should_exist: bool) -> Option<Arc<Request>> {
        let found = self.inner.requests.get(&key).map(|e| Arc::clone(e.value()));
        if found.is_none() {
            if should_exist {
                error!(request = %key, "cannot find request");
            } else {
                trace!(request = %key, "cannot find request");
            }
        }
        found
    }

    pub fn deliver_next<V: Send + 'static>(&self, key: RequestKey, value: V, should_exist: bool) {
        if let Some(request) = self.lookup(key, should_exist) {
            request.send(Signal::Next(Box::new(value)));
        }
    }

    /// Terminates the matching request. Use [`RequestKey::any`] for codes
    /// that are scoped by id alone.
    pub fn deliver_error(&self, key: RequestKey, err: RequestError, should_exist: bool) {
        if let Some(request) = self.lookup(key, should_exist) {
            request.send(Signal::Error(err));
            self.dispose(&request);
        }
    }

    pub fn deliver_completion(&self, key: RequestKey, should_exist: bool) {
        if let Some(request) = self.lookup(key, should_exist) {
            request.send(Signal::Complete);
            self.dispose(&request);
        }
    }

    pub fn deliver_next_and_complete<V: Send + 'static>(
        &self,
        key: RequestKey,
        value: V,
        should_exist: bool,
    ) {
        if let Some(request) = self.lookup(key, should_exist) {
            request.send(Signal::Next(Box::new(value)));
            request.send(Signal::Complete);
            self.dispose(&request);
        }
    }

    /// Data attached at subscribe time, if the request is live and the type
    /// matches.
    pub fn user_data<U: Any + Send + Sync>(&self, key: RequestKey) -> Option<Arc<U>> {
        let data = self.lookup(key, true)?.user_data.clone()?;
        match data.downcast::<U>() {
            Ok(data) => Some(data),
            Err(_) => {
                warn!(request = %key, "user data has a different type");
                None
            }
        }
    }
}
