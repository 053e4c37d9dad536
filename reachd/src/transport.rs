//! Push-channel transport to the planning peer.
//!
//! One connection per session. Inbound frames fan out through a broadcast
//! channel per event name, so every live [`Subscription`] sees every payload;
//! dropping a subscription is how a trial unsubscribes. Outbound frames are
//! fire-and-forget: when the peer is gone they are dropped, never queued for
//! a reconnect.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use reachgrid::protocol::{events, Envelope};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, error, info, warn};

const HUB_CAPACITY: usize = 64;
const MAX_LINE_BYTES: usize = 1 << 20;

/// Broadcast fan-out keyed by event name.
#[derive(Debug)]
pub struct EventHub {
    capacity: usize,
    channels: Mutex<HashMap<String, broadcast::Sender<Value>>>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn sender(&self, event: &str) -> broadcast::Sender<Value> {
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        channels
            .entry(event.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    pub fn subscribe(&self, event: &str) -> Subscription {
        Subscription {
            event: event.to_string(),
            rx: self.sender(event).subscribe(),
        }
    }

    /// Deliver `data` to every current subscriber. Returns how many received it;
    /// with no subscribers the payload is simply dropped.
    pub fn publish(&self, event: &str, data: Value) -> usize {
        self.sender(event).send(data).unwrap_or(0)
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        let channels = self
            .channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        channels.get(event).map_or(0, |tx| tx.receiver_count())
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(HUB_CAPACITY)
    }
}

/// A lazy, unbounded sequence of payloads for one event name.
#[derive(Debug)]
pub struct Subscription {
    event: String,
    rx: broadcast::Receiver<Value>,
}

impl Subscription {
    /// Next payload; `None` once the hub is gone.
    pub async fn next(&mut self) -> Option<Value> {
        loop {
            match self.rx.recv().await {
                Ok(v) => return Some(v),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("`{}` subscriber lagged; skipped {} payloads", self.event, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Handle to the session's push channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Transport {
    hub: Arc<EventHub>,
    outbound: mpsc::UnboundedSender<Envelope>,
}

impl Transport {
    /// Connect to `addr` and start pumping frames.
    ///
    /// A failed connect is logged and yields a dead channel: emits are dropped
    /// and subscriptions never fire.
    pub async fn connect(addr: &str) -> (Self, JoinHandle<()>) {
        Self::connect_with_hub(Arc::new(EventHub::default()), addr).await
    }

    /// [`Transport::connect`] publishing into an existing hub, so lifecycle
    /// events can be observed from the first frame.
    pub async fn connect_with_hub(hub: Arc<EventHub>, addr: &str) -> (Self, JoinHandle<()>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let transport = Self {
            hub: Arc::clone(&hub),
            outbound,
        };

        let pump = match TcpStream::connect(addr).await {
            Ok(stream) => {
                info!("Connected to server at {}", addr);
                hub.publish(events::CONNECT, Value::Null);
                tokio::spawn(pump(stream, hub, rx))
            }
            Err(e) => {
                error!("Could not reach peer at {}: {}", addr, e);
                drop(rx);
                tokio::spawn(async {})
            }
        };
        (transport, pump)
    }

    /// Transport wired to an in-process peer instead of a socket.
    pub fn in_memory() -> (Self, Peer) {
        let hub = Arc::new(EventHub::default());
        let (outbound, rx) = mpsc::unbounded_channel();
        let transport = Self {
            hub: Arc::clone(&hub),
            outbound,
        };
        (transport, Peer { hub, outbound: rx })
    }

    pub fn emit<T: Serialize>(&self, event: &str, payload: &T) {
        let data = match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                warn!("Dropping `{}`: payload does not serialize: {}", event, e);
                return;
            }
        };
        if self.outbound.send(Envelope::new(event, data)).is_err() {
            debug!("Peer unreachable; dropped `{}`", event);
        }
    }

    pub fn subscribe(&self, event: &str) -> Subscription {
        self.hub.subscribe(event)
    }
}

async fn pump(
    stream: TcpStream,
    hub: Arc<EventHub>,
    mut outbound: mpsc::UnboundedReceiver<Envelope>,
) {
    let (mut sink, mut lines) =
        Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_BYTES)).split();

    loop {
        tokio::select! {
            line = lines.next() => match line {
                Some(Ok(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Envelope>(&line) {
                        Ok(env) => {
                            let delivered = hub.publish(&env.event, env.data);
                            debug!("`{}` delivered to {} subscribers", env.event, delivered);
                        }
                        Err(e) => warn!("Skipping undecodable frame: {}", e),
                    }
                }
                Some(Err(e)) => {
                    error!("Transport read error: {}", e);
                    break;
                }
                None => break,
            },
            frame = outbound.recv() => match frame {
                Some(env) => {
                    let line = match serde_json::to_string(&env) {
                        Ok(line) => line,
                        Err(e) => {
                            warn!("Dropping `{}`: {}", env.event, e);
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(line).await {
                        error!("Transport write error: {}", e);
                        break;
                    }
                }
                // Every Transport handle is gone; the session is over.
                None => break,
            },
        }
    }

    info!("Disconnected from server");
    hub.publish(events::DISCONNECT, Value::Null);
}

/// The far end of an in-memory [`Transport`].
#[derive(Debug)]
pub struct Peer {
    hub: Arc<EventHub>,
    outbound: mpsc::UnboundedReceiver<Envelope>,
}

impl Peer {
    pub fn push<T: Serialize>(&self, event: &str, payload: &T) -> usize {
        match serde_json::to_value(payload) {
            Ok(v) => self.hub.publish(event, v),
            Err(_) => 0,
        }
    }

    pub fn push_raw(&self, event: &str, data: Value) -> usize {
        self.hub.publish(event, data)
    }

    /// Next frame the client emitted.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.outbound.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.outbound.try_recv().ok()
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        self.hub.subscriber_count(event)
    }
}
