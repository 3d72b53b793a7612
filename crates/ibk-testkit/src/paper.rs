//! In-memory transport.
//!
//! Records every outbound request, queues inbound messages for the reader
//! loop, and lets a test script the broker's reaction to each request.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::bail;
use ibk_session::{Endpoint, InboundMessage, OutboundRequest, Transport};
use parking_lot::{Condvar, Mutex};
use tracing::trace;

pub type Reactor = Box<dyn Fn(&OutboundRequest) -> Vec<InboundMessage> + Send + Sync>;

pub struct PaperTransport {
    connected: AtomicBool,
    auto_ack: AtomicBool,
    refuse_connect: AtomicBool,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    last_endpoint: Mutex<Option<Endpoint>>,
    sent: Mutex<Vec<OutboundRequest>>,
    inbox: Mutex<VecDeque<InboundMessage>>,
    arrived: Condvar,
    reactor: Mutex<Option<Reactor>>,
}

impl Default for PaperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperTransport {
    /// Acknowledges every connect; no scripted reactions.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            auto_ack: AtomicBool::new(true),
            refuse_connect: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            last_endpoint: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            inbox: Mutex::new(VecDeque::new()),
            arrived: Condvar::new(),
            reactor: Mutex::new(None),
        }
    }

    pub fn with_reactor(
        reactor: impl Fn(&OutboundRequest) -> Vec<InboundMessage> + Send + Sync + 'static,
    ) -> Self {
        let transport = Self::new();
        transport.set_reactor(reactor);
        transport
    }

    pub fn set_reactor(
        &self,
        reactor: impl Fn(&OutboundRequest) -> Vec<InboundMessage> + Send + Sync + 'static,
    ) {
        *self.reactor.lock() = Some(Box::new(reactor));
    }

    /// Whether a successful connect queues a `ConnectAck`.
    pub fn set_auto_ack(&self, on: bool) {
        self.auto_ack.store(on, Ordering::SeqCst);
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse_connect.store(refuse, Ordering::SeqCst);
    }

    /// Queue a message as if the broker had sent it.
    pub fn push(&self, message: InboundMessage) {
        self.push_all(vec![message]);
    }

    pub fn push_all(&self, messages: Vec<InboundMessage>) {
        if messages.is_empty() {
            return;
        }
        let mut inbox = self.inbox.lock();
        inbox.extend(messages);
        self.arrived.notify_all();
    }

    /// Simulates the broker dropping the socket.
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutboundRequest> {
        self.sent.lock().clone()
    }

    pub fn sent_matching(&self, pred: impl Fn(&OutboundRequest) -> bool) -> Vec<OutboundRequest> {
        self.sent.lock().iter().filter(|r| pred(r)).cloned().collect()
    }

    pub fn connect_calls(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn last_endpoint(&self) -> Option<Endpoint> {
        self.last_endpoint.lock().clone()
    }
}

impl Transport for PaperTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connect(&self, endpoint: &Endpoint) -> anyhow::Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.last_endpoint.lock() = Some(endpoint.clone());
        if self.refuse_connect.load(Ordering::SeqCst) {
            bail!("connection refused by {}:{}", endpoint.host, endpoint.port);
        }
        self.connected.store(true, Ordering::SeqCst);
        if self.auto_ack.load(Ordering::SeqCst) {
            self.push(InboundMessage::ConnectAck);
        }
        Ok(())
    }

    fn disconnect(&self) -> anyhow::Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        self.inbox.lock().clear();
        Ok(())
    }

    fn send(&self, request: OutboundRequest) -> anyhow::Result<()> {
        if !self.is_connected() {
            bail!("not connected");
        }
        trace!(?request, "paper transport send");
        self.sent.lock().push(request.clone());

        let replies = match &*self.reactor.lock() {
            Some(reactor) => reactor(&request),
            None => Vec::new(),
        };
        self.push_all(replies);
        Ok(())
    }

    fn wait_for_signal(&self, timeout: Duration) -> bool {
        let mut inbox = self.inbox.lock();
        if inbox.is_empty() {
            let _ = self.arrived.wait_for(&mut inbox, timeout);
        }
        !inbox.is_empty()
    }

    fn process_messages(&self) -> anyhow::Result<Vec<InboundMessage>> {
        Ok(self.inbox.lock().drain(..).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint {
            host: "127.0.0.1".into(),
            port: 4002,
            client_id: 0,
        }
    }

    #[test]
    fn connect_queues_ack_and_send_requires_connection() {
        let t = PaperTransport::new();
        assert!(t.send(OutboundRequest::ReqIds).is_err());

        t.connect(&endpoint()).unwrap();
        assert!(t.wait_for_signal(Duration::from_millis(1)));
        assert_eq!(t.process_messages().unwrap(), vec![InboundMessage::ConnectAck]);

        t.send(OutboundRequest::ReqIds).unwrap();
        assert_eq!(t.sent(), vec![OutboundRequest::ReqIds]);
    }

    #[test]
    fn reactor_replies_are_queued() {
        let t = PaperTransport::with_reactor(|req| match req {
            OutboundRequest::ReqIds => vec![InboundMessage::NextValidId(42)],
            _ => vec![],
        });
        t.set_auto_ack(false);
        t.connect(&endpoint()).unwrap();
        t.send(OutboundRequest::ReqIds).unwrap();
        assert_eq!(t.process_messages().unwrap(), vec![InboundMessage::NextValidId(42)]);
    }

    #[test]
    fn refused_connect_stays_disconnected() {
        let t = PaperTransport::new();
        t.refuse_connections(true);
        assert!(t.connect(&endpoint()).is_err());
        assert!(!t.is_connected());
        assert_eq!(t.connect_calls(), 1);
    }

    #[test]
    fn wait_times_out_on_empty_inbox() {
        let t = PaperTransport::new();
        assert!(!t.wait_for_signal(Duration::from_millis(5)));
    }
}
