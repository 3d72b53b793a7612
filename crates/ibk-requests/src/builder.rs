use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::repository::{Action, RequestPlan};
use crate::{RequestRepository, RequestType, Subscription};

/// Assembles one subscription. Nothing happens until the returned
/// [`Subscription`] is polled (or explicitly started).
///
/// Cloning the builder and subscribing again produces an independent
/// subscription (with a fresh id when the id is generated).
pub struct RequestBuilder<T> {
    repo: RequestRepository,
    plan: RequestPlan,
    _item: PhantomData<fn() -> T>,
}

impl<T> Clone for RequestBuilder<T> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            plan: self.plan.clone(),
            _item: PhantomData,
        }
    }
}

impl<T: Send + 'static> RequestBuilder<T> {
    pub(crate) fn new(repo: RequestRepository) -> Self {
        Self {
            repo,
            plan: RequestPlan::default(),
            _item: PhantomData,
        }
    }

    pub fn request_type(mut self, ty: RequestType) -> Self {
        self.plan.ty = Some(ty);
        self
    }

    /// Outbound call taking the resolved id. Requests an id.
    pub fn register_with_id<F>(mut self, f: F) -> Self
    where
        F: Fn(i32) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.plan.register = Some(with_id(f));
        self.plan.with_id = true;
        self
    }

    /// Outbound call for requests that carry no id.
    pub fn register<F>(mut self, f: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.plan.register = Some(without_id(f));
        self
    }

    /// Outbound call for a request whose id the caller already owns (an
    /// order id, for instance).
    pub fn register_fixed<F>(mut self, id: i32, f: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.plan.id = Some(id);
        self.plan.register = Some(without_id(f));
        self
    }

    /// Cancellation taking the request id. Requests an id.
    pub fn unregister_with_id<F>(mut self, f: F) -> Self
    where
        F: Fn(i32) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.plan.unregister = Some(with_id(f));
        self.plan.with_id = true;
        self
    }

    pub fn unregister<F>(mut self, f: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.plan.unregister = Some(without_id(f));
        self
    }

    pub fn id(mut self, id: i32) -> Self {
        self.plan.id = Some(id);
        self.plan.with_id = true;
        self
    }

    pub fn user_data<U: Any + Send + Sync>(mut self, data: U) -> Self {
        self.plan.user_data = Some(Arc::new(data));
        self
    }

    pub fn subscribe(&self) -> Subscription<T> {
        Subscription::new(self.repo.clone(), self.plan.clone())
    }
}

fn with_id<F>(f: F) -> Action
where
    F: Fn(i32) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(move |id: Option<i32>| match id {
        Some(id) => f(id),
        None => Err(anyhow::anyhow!("request id was not resolved")),
    })
}

fn without_id<F>(f: F) -> Action
where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(move |_: Option<i32>| f())
}
