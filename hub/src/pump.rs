//! Per-connection tasks.
//!
//! Every registered client gets two tasks: the outbound pump, the only consumer
//! of its queue and the only code that closes the socket, and the inbound pump,
//! which reads frames solely to notice that the peer went away.
use crate::client::{ClientKey, ClientQueue};
use crate::error::Error;
use crate::message::Envelope;
use crate::Hub;
use axum::extract::ws::Message as Frame;
use futures::{Sink, SinkExt, Stream, StreamExt};
use log::*;
use std::error::Error as StdError;
use std::fmt::Display;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Liveness probing. Disabled by default: a silent but open connection is kept
/// until a read or write fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct Heartbeat {
    pub interval: Option<Duration>,
}

impl Heartbeat {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval: Some(interval),
        }
    }

    /// How long the inbound side may stay silent before the peer is presumed
    /// dead. Two missed pongs.
    fn idle_timeout(&self) -> Option<Duration> {
        self.interval.map(|interval| interval * 2)
    }
}

pub struct Pumps {
    pub outbound: JoinHandle<()>,
    pub inbound: JoinHandle<()>,
}

/// Splits a socket and starts both pumps for an already submitted client.
pub fn spawn<S, E>(hub: Hub, queue: ClientQueue, socket: S, heartbeat: Heartbeat) -> Pumps
where
    S: Stream<Item = Result<Frame, E>> + Sink<Frame, Error = E> + Send + 'static,
    E: StdError + Send + Sync + 'static,
{
    let key = queue.key();
    let (sink, stream) = socket.split();

    let outbound = tokio::spawn(outbound(hub.clone(), queue, sink, heartbeat));
    let inbound = tokio::spawn(inbound(hub, key, stream, heartbeat));

    Pumps { outbound, inbound }
}

enum Outbound {
    Envelope(Option<std::sync::Arc<Envelope>>),
    Ping,
}

/// Drains the client's queue into the socket until the hub closes the queue,
/// then sends a close frame and releases the socket.
///
/// After a write failure the pump asks the hub to unregister the client and
/// keeps draining without writing, so the queue is still closed by the hub.
pub async fn outbound<S>(hub: Hub, mut queue: ClientQueue, mut sink: S, heartbeat: Heartbeat)
where
    S: Sink<Frame> + Unpin,
    S::Error: StdError + Send + Sync + 'static,
{
    let key = queue.key();
    let mut ticker = heartbeat.interval.map(|period| {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    let mut failed = false;

    loop {
        let next = match ticker.as_mut() {
            Some(ticker) => tokio::select! {
                envelope = queue.recv() => Outbound::Envelope(envelope),
                _ = ticker.tick() => Outbound::Ping,
            },
            None => Outbound::Envelope(queue.recv().await),
        };

        let result = match next {
            Outbound::Envelope(Some(_)) | Outbound::Ping if failed => continue,
            Outbound::Envelope(Some(envelope)) => write_envelope(&mut sink, &envelope).await,
            Outbound::Ping => sink
                .send(Frame::Ping(Default::default()))
                .await
                .map_err(Error::transport),
            Outbound::Envelope(None) => break,
        };

        if let Err(e) = result {
            warn!("Write to client {key} failed: {e}");
            failed = true;
            request_unregister(&hub, key).await;
        }
    }

    if !failed {
        if let Err(e) = sink.send(Frame::Close(None)).await {
            debug!("Close frame to client {key} not delivered: {e}");
        }
    }
    if let Err(e) = sink.close().await {
        debug!("Closing socket of client {key} failed: {e}");
    }

    queue.mark_closed();
    debug!("Outbound pump for client {key} finished");
}

async fn write_envelope<S>(sink: &mut S, envelope: &Envelope) -> Result<(), Error>
where
    S: Sink<Frame> + Unpin,
    S::Error: StdError + Send + Sync + 'static,
{
    let json = serde_json::to_string(envelope)?;
    trace!("Writing '{}' frame", envelope.event);

    sink.send(Frame::Text(json.into()))
        .await
        .map_err(Error::transport)
}

/// Reads and discards frames until the peer closes, errors, or (with a
/// heartbeat) stays silent too long, then asks the hub to unregister.
pub async fn inbound<St, E>(hub: Hub, key: ClientKey, mut stream: St, heartbeat: Heartbeat)
where
    St: Stream<Item = Result<Frame, E>> + Unpin,
    E: Display,
{
    let idle_timeout = heartbeat.idle_timeout();

    loop {
        let frame = match idle_timeout {
            Some(limit) => match time::timeout(limit, stream.next()).await {
                Ok(frame) => frame,
                Err(_) => {
                    info!("Client {key} silent for {limit:?}, dropping");
                    break;
                }
            },
            None => stream.next().await,
        };

        match frame {
            Some(Ok(Frame::Close(_))) | None => {
                debug!("Client {key} closed the connection");
                break;
            }
            Some(Ok(_)) => trace!("Discarding inbound frame from client {key}"),
            Some(Err(e)) => {
                debug!("Read from client {key} failed: {e}");
                break;
            }
        }
    }

    request_unregister(&hub, key).await;
}

async fn request_unregister(hub: &Hub, key: ClientKey) {
    if let Err(e) = hub.unregister(key).await {
        debug!("Could not unregister client {key}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Client, ClientState, Identity};
    use crate::message::CONNECTED_EVENT;
    use futures::channel::mpsc;
    use std::io;
    use std::num::NonZeroUsize;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    fn new_client(user_id: i64) -> (Client, ClientQueue) {
        let identity = Identity {
            user_id,
            username: format!("user-{user_id}"),
            role: "operator".to_string(),
        };
        Client::new(identity, NonZeroUsize::new(8).unwrap())
    }

    fn hub() -> Hub {
        Hub::spawn(NonZeroUsize::new(16).unwrap())
    }

    fn text(frame: Frame) -> serde_json::Value {
        match frame {
            Frame::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    async fn eventually(condition: impl Fn() -> bool) {
        timeout(WAIT, async {
            while !condition() {
                time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("condition never became true");
    }

    #[tokio::test]
    async fn test_outbound_writes_json_then_closes_after_unregister() {
        let hub = hub();
        let (client, queue) = new_client(1);
        let key = client.key();
        let mut state = queue.subscribe();
        hub.register(client).await.unwrap();

        let (sink, mut written) = mpsc::channel(8);
        let pump = tokio::spawn(outbound(hub.clone(), queue, sink, Heartbeat::default()));

        hub.broadcast(Envelope::new("new_data").with_field("id", 3))
            .await
            .unwrap();

        let welcome = text(timeout(WAIT, written.next()).await.unwrap().unwrap());
        assert_eq!(welcome["event"], CONNECTED_EVENT);
        let data = text(timeout(WAIT, written.next()).await.unwrap().unwrap());
        assert_eq!(data["event"], "new_data");
        assert_eq!(data["data"]["id"], 3);

        hub.unregister(key).await.unwrap();

        let close = timeout(WAIT, written.next()).await.unwrap().unwrap();
        assert!(matches!(close, Frame::Close(None)));
        timeout(WAIT, pump).await.unwrap().unwrap();
        assert_eq!(*state.borrow_and_update(), ClientState::Closed);
    }

    #[tokio::test]
    async fn test_outbound_write_failure_unregisters_client() {
        let hub = hub();
        let (client, queue) = new_client(2);
        hub.register(client).await.unwrap();

        let (sink, written) = mpsc::channel::<Frame>(8);
        drop(written);
        let pump = tokio::spawn(outbound(hub.clone(), queue, sink, Heartbeat::default()));

        timeout(WAIT, pump).await.unwrap().unwrap();
        assert!(!hub.is_user_connected(2));
    }

    #[tokio::test]
    async fn test_inbound_close_frame_unregisters_client() {
        let hub = hub();
        let (client, _queue) = new_client(3);
        let key = client.key();
        hub.register(client).await.unwrap();
        eventually(|| hub.is_user_connected(3)).await;

        let (frames, stream) = mpsc::unbounded::<Result<Frame, io::Error>>();
        frames
            .unbounded_send(Ok(Frame::Text("ignored".into())))
            .unwrap();
        frames.unbounded_send(Ok(Frame::Close(None))).unwrap();

        timeout(WAIT, inbound(hub.clone(), key, stream, Heartbeat::default()))
            .await
            .unwrap();
        eventually(|| !hub.is_user_connected(3)).await;
    }

    #[tokio::test]
    async fn test_inbound_read_error_unregisters_client() {
        let hub = hub();
        let (client, _queue) = new_client(4);
        let key = client.key();
        hub.register(client).await.unwrap();
        eventually(|| hub.is_user_connected(4)).await;

        let (frames, stream) = mpsc::unbounded::<Result<Frame, io::Error>>();
        frames
            .unbounded_send(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")))
            .unwrap();

        timeout(WAIT, inbound(hub.clone(), key, stream, Heartbeat::default()))
            .await
            .unwrap();
        eventually(|| !hub.is_user_connected(4)).await;
    }

    #[tokio::test]
    async fn test_inbound_drops_silent_peer_when_heartbeat_enabled() {
        let hub = hub();
        let (client, _queue) = new_client(5);
        let key = client.key();
        hub.register(client).await.unwrap();
        eventually(|| hub.is_user_connected(5)).await;

        // The sender stays alive but never writes.
        let (_frames, stream) = mpsc::unbounded::<Result<Frame, io::Error>>();
        let heartbeat = Heartbeat::every(Duration::from_millis(10));

        timeout(WAIT, inbound(hub.clone(), key, stream, heartbeat))
            .await
            .unwrap();
        eventually(|| !hub.is_user_connected(5)).await;
    }

    #[tokio::test]
    async fn test_outbound_sends_pings_when_heartbeat_enabled() {
        let hub = hub();
        let (client, queue) = new_client(6);
        hub.register(client).await.unwrap();

        let (sink, mut written) = mpsc::channel(8);
        let heartbeat = Heartbeat::every(Duration::from_millis(10));
        tokio::spawn(outbound(hub.clone(), queue, sink, heartbeat));

        let welcome = timeout(WAIT, written.next()).await.unwrap().unwrap();
        assert!(matches!(welcome, Frame::Text(_)));
        let ping = timeout(WAIT, written.next()).await.unwrap().unwrap();
        assert!(matches!(ping, Frame::Ping(_)));
    }
}
