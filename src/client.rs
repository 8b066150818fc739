//! Main [`SensorLink`] client implementation.
//!
//! The client is a handle to a background driver task. The driver owns the
//! transport, the session state and the poll cursor; poll ticks, incoming
//! messages and client requests are all handled in that one task, so a reply
//! is always interpreted against the query that was pending when it arrived.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::commands::CommandDispatcher;
use crate::error::{Error, Result};
use crate::event::{Direction, Event, EventDispatcher, EventFilter, Subscription};
use crate::poll::Poller;
use crate::protocol::{Interpretation, interpret};
use crate::session::{ModeRequest, Session};
use crate::transport::websocket::WebSocketConfig;
use crate::transport::{Inbound, Transport, WebSocketTransport};
use crate::types::{Connection, Reading, Snapshot};

/// Default device address.
pub const DEFAULT_URL: &str = "ws://192.168.0.157:81";

/// Default poll interval. Must exceed one request/reply round trip.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default event channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

const REQUEST_CAPACITY: usize = 32;
const INBOUND_CAPACITY: usize = 64;

/// Configuration for the client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Device WebSocket URL used by [`SensorLink::connect`].
    pub url: String,
    /// WebSocket transport settings.
    pub websocket: WebSocketConfig,
    /// Interval between poll queries.
    pub poll_interval: Duration,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
    /// Restart the poll cycle at the first query on every connect.
    pub reset_cursor_on_connect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

impl ClientConfig {
    /// Creates a new client configuration with default settings.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            websocket: WebSocketConfig::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            reset_cursor_on_connect: true,
        }
    }

    /// Sets the WebSocket transport settings.
    #[must_use]
    pub const fn websocket(mut self, websocket: WebSocketConfig) -> Self {
        self.websocket = websocket;
        self
    }

    /// Sets the poll interval.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the event channel capacity.
    #[must_use]
    pub const fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Sets whether the poll cycle restarts on connect.
    #[must_use]
    pub const fn reset_cursor_on_connect(mut self, reset: bool) -> Self {
        self.reset_cursor_on_connect = reset;
        self
    }
}

type Reply = oneshot::Sender<Result<()>>;

/// Requests from the client handle to the driver.
enum Request {
    Connect { url: String, reply: Reply },
    Disconnect { reply: Reply },
    Mode { request: ModeRequest, reply: Reply },
}

/// Client for communicating with a sensor node.
///
/// Must be created inside a Tokio runtime.
pub struct SensorLink {
    requests: mpsc::Sender<Request>,
    dispatcher: EventDispatcher,
    snapshot: watch::Receiver<Snapshot>,
    url: String,
    driver_task: Option<JoinHandle<()>>,
}

impl SensorLink {
    /// Creates a new client for the node at `url` with default settings.
    ///
    /// The client is not yet connected.
    #[must_use]
    pub fn websocket(url: impl Into<String>) -> Self {
        Self::with_config(ClientConfig::new(url))
    }

    /// Creates a new WebSocket client with custom configuration.
    #[must_use]
    pub fn with_config(config: ClientConfig) -> Self {
        let transport = WebSocketTransport::new(config.websocket.clone());
        Self::with_transport(config, transport)
    }

    /// Creates a new client over any transport.
    #[must_use]
    pub fn with_transport<T: Transport + 'static>(config: ClientConfig, transport: T) -> Self {
        let dispatcher = EventDispatcher::new(config.event_capacity.max(1));
        let (requests, request_rx) = mpsc::channel(REQUEST_CAPACITY);
        let (snapshot_tx, snapshot) = watch::channel(Snapshot::default());
        let url = config.url.clone();

        let driver = Driver {
            commands: CommandDispatcher::new(transport, dispatcher.clone()),
            dispatcher: dispatcher.clone(),
            session: Session::new(),
            poller: Poller::new(),
            inbound: None,
            snapshot: snapshot_tx,
            config,
        };
        let driver_task = tokio::spawn(driver.run(request_rx));

        Self {
            requests,
            dispatcher,
            snapshot,
            url,
            driver_task: Some(driver_task),
        }
    }

    /// Connects to the configured device address.
    ///
    /// On success the node is put into automatic mode with the lamp off and
    /// polling starts.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or the initial commands fail, or
    /// [`Error::Rejected`] if already connected.
    pub async fn connect(&self) -> Result<()> {
        self.connect_to(self.url.clone()).await
    }

    /// Connects to a specific device address.
    pub async fn connect_to(&self, url: impl Into<String>) -> Result<()> {
        let url = url.into();
        self.request(|reply| Request::Connect { url, reply }).await
    }

    /// Disconnects from the device. Does nothing if not connected.
    pub async fn disconnect(&self) -> Result<()> {
        self.request(|reply| Request::Disconnect { reply }).await
    }

    /// Turns automatic mode on or off.
    ///
    /// Turning it on also switches the lamp off.
    pub async fn set_automatic(&self, on: bool) -> Result<()> {
        self.mode(ModeRequest::SetAutomatic(on)).await
    }

    /// Switches the lamp on or off. Only allowed with automatic mode off.
    pub async fn set_lamp(&self, on: bool) -> Result<()> {
        self.mode(ModeRequest::SetLamp(on)).await
    }

    /// Returns the current state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        *self.snapshot.borrow()
    }

    /// Returns a receiver notified on every state change.
    #[must_use]
    pub fn watch_snapshot(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.clone()
    }

    /// Returns true if connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.snapshot.borrow().connection.is_connected()
    }

    /// Subscribes to events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.dispatcher.subscribe()
    }

    /// Waits for the next event matching `filter`.
    pub async fn wait_for(&self, filter: EventFilter, timeout: Duration) -> Option<Event> {
        self.dispatcher.wait_for(filter, timeout).await
    }

    /// Disconnects and stops the driver task.
    pub async fn shutdown(mut self) {
        let task = self.driver_task.take();
        // Closing the request channel ends the driver loop
        drop(self);
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    async fn mode(&self, request: ModeRequest) -> Result<()> {
        self.request(|reply| Request::Mode { request, reply }).await
    }

    async fn request(&self, make: impl FnOnce(Reply) -> Request) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(make(reply))
            .await
            .map_err(|_| Error::ChannelSend)?;
        response.await.map_err(|_| Error::ChannelClosed)?
    }
}

impl Drop for SensorLink {
    fn drop(&mut self) {
        if let Some(task) = self.driver_task.take() {
            task.abort();
        }
    }
}

/// Single owner of all protocol state.
struct Driver<T> {
    commands: CommandDispatcher<T>,
    dispatcher: EventDispatcher,
    session: Session,
    poller: Poller,
    inbound: Option<mpsc::Receiver<Inbound>>,
    snapshot: watch::Sender<Snapshot>,
    config: ClientConfig,
}

impl<T: Transport> Driver<T> {
    async fn run(mut self, mut requests: mpsc::Receiver<Request>) {
        let period = self.config.poll_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Queued replies go first so they are read against the query
            // they answer, before an overdue tick replaces it.
            tokio::select! {
                biased;

                inbound = next_inbound(&mut self.inbound) => self.on_inbound(inbound).await,
                request = requests.recv() => match request {
                    Some(request) => self.handle_request(request).await,
                    None => break,
                },
                _ = ticker.tick() => self.on_tick().await,
            }
        }

        tracing::debug!("client dropped, stopping driver");
        if let Err(e) = self.commands.transport_mut().disconnect().await {
            tracing::warn!("disconnect failed: {}", e);
        }
    }

    async fn handle_request(&mut self, request: Request) {
        match request {
            Request::Connect { url, reply } => {
                let result = self.connect(url).await;
                let _ = reply.send(result);
            }
            Request::Disconnect { reply } => {
                if self.session.connection().is_connected() {
                    tracing::info!("disconnecting");
                    self.drop_connection().await;
                }
                let _ = reply.send(Ok(()));
            }
            Request::Mode { request, reply } => {
                let result = self.commands.execute(&mut self.session, request).await;
                if result.as_ref().is_err_and(Error::is_fatal) {
                    self.drop_connection().await;
                }
                self.publish();
                let _ = reply.send(result);
            }
        }
    }

    async fn connect(&mut self, url: String) -> Result<()> {
        self.session.plan(ModeRequest::Connect)?;

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        self.commands.transport_mut().connect(url, inbound_tx).await?;
        self.inbound = Some(inbound_rx);

        if self.config.reset_cursor_on_connect {
            self.poller.reset();
        } else {
            self.poller.clear_pending();
        }

        if let Err(e) = self
            .commands
            .execute(&mut self.session, ModeRequest::Connect)
            .await
        {
            tracing::warn!("initializing connection failed: {}", e);
            self.inbound = None;
            if let Err(e) = self.commands.transport_mut().disconnect().await {
                tracing::debug!("disconnect failed: {}", e);
            }
            return Err(e);
        }

        self.publish();
        self.dispatcher
            .dispatch(Event::ConnectionChanged(Connection::Connected));
        Ok(())
    }

    /// Tears down the transport and reports the disconnect once.
    async fn drop_connection(&mut self) {
        self.inbound = None;
        if let Err(e) = self.commands.transport_mut().disconnect().await {
            tracing::debug!("disconnect failed: {}", e);
        }
        self.poller.clear_pending();

        let was_connected = self.session.connection().is_connected();
        self.session.disconnected();
        self.publish();
        if was_connected {
            self.dispatcher
                .dispatch(Event::ConnectionChanged(Connection::Disconnected));
        }
    }

    async fn on_tick(&mut self) {
        let Some(query) = self.poller.tick(self.session.connection()) else {
            return;
        };

        if let Err(e) = self.commands.send_query(query).await {
            tracing::warn!("poll query {} failed: {}", query, e);
            if e.is_fatal() {
                self.drop_connection().await;
            }
        }
        self.publish();
    }

    async fn on_inbound(&mut self, inbound: Option<Inbound>) {
        match inbound {
            Some(Inbound::Message(text)) => self.on_message(text),
            Some(Inbound::Closed { reason }) => {
                tracing::warn!("connection lost: {}", reason);
                self.drop_connection().await;
            }
            None => {
                tracing::warn!("receive loop ended");
                self.drop_connection().await;
            }
        }
    }

    fn on_message(&mut self, text: String) {
        let interpretation = interpret(&text, self.poller.pending());
        if interpretation.consumes_pending() {
            self.poller.take_pending();
        }

        match interpretation {
            Interpretation::GasStatus(gas_alarm) => {
                if gas_alarm {
                    tracing::warn!("gas leak reported");
                }
                self.session.record(Reading::GasAlarm(gas_alarm));
                self.dispatcher.dispatch(Event::StatusMessage { gas_alarm });
            }
            Interpretation::Reading(reading) => {
                self.session.record(reading);
                self.dispatcher.dispatch(Event::ReadingUpdated(reading));
            }
            Interpretation::OutOfRange { query, value } => {
                tracing::debug!("discarding out-of-range answer {} to {}", value, query);
            }
            Interpretation::Unsolicited(value) => {
                tracing::debug!("discarding {}: no query pending", value);
            }
            Interpretation::Unrecognized => {
                tracing::trace!("unrecognized message {:?}", text);
            }
        }

        self.publish();
        self.dispatcher.dispatch(Event::RawLog {
            text,
            direction: Direction::Received,
        });
    }

    fn publish(&self) {
        self.snapshot.send_replace(Snapshot {
            connection: self.session.connection(),
            automatic: self.session.automatic(),
            lamp: self.session.lamp(),
            pending: self.poller.pending(),
            readings: *self.session.readings(),
        });
    }
}

/// Receives from the inbound channel, or waits forever without one.
async fn next_inbound(inbound: &mut Option<mpsc::Receiver<Inbound>>) -> Option<Inbound> {
    match inbound {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::Rejection;
    use crate::protocol::Query;
    use crate::types::{AutomaticMode, LampState};

    #[derive(Default)]
    struct DeviceState {
        sent: Vec<String>,
        inbound: Option<mpsc::Sender<Inbound>>,
        fail_connect: bool,
        fail_send: bool,
        slow_send: Option<(&'static str, Duration)>,
        in_flight: bool,
    }

    /// Handle to the fake node behind a [`MockTransport`].
    #[derive(Clone, Default)]
    struct MockDevice {
        state: Arc<Mutex<DeviceState>>,
    }

    impl MockDevice {
        fn transport(&self) -> MockTransport {
            MockTransport {
                device: self.clone(),
                connected: false,
            }
        }

        fn sent(&self) -> Vec<String> {
            self.state.lock().unwrap().sent.clone()
        }

        fn clear_sent(&self) {
            self.state.lock().unwrap().sent.clear();
        }

        fn fail_connect(&self) {
            self.state.lock().unwrap().fail_connect = true;
        }

        fn fail_send(&self) {
            self.state.lock().unwrap().fail_send = true;
        }

        /// Makes writes of `text` take `delay` before completing.
        fn slow_send(&self, text: &'static str, delay: Duration) {
            self.state.lock().unwrap().slow_send = Some((text, delay));
        }

        /// Waits until a slow write is in progress.
        async fn wait_in_flight(&self) {
            while !self.state.lock().unwrap().in_flight {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }

        async fn push(&self, inbound: Inbound) {
            let tx = self.state.lock().unwrap().inbound.clone();
            tx.expect("not connected").send(inbound).await.unwrap();
        }

        async fn reply(&self, text: &str) {
            self.push(Inbound::Message(text.to_owned())).await;
        }

        /// Waits until the client has sent `count` messages.
        async fn wait_sent(&self, count: usize) {
            while self.sent().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
    }

    struct MockTransport {
        device: MockDevice,
        connected: bool,
    }

    impl Transport for MockTransport {
        fn connect(
            &mut self,
            url: String,
            inbound: mpsc::Sender<Inbound>,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async move {
                let mut state = self.device.state.lock().unwrap();
                if state.fail_connect {
                    return Err(Error::Connect {
                        url,
                        reason: "unreachable".into(),
                    });
                }
                state.inbound = Some(inbound);
                self.connected = true;
                Ok(())
            })
        }

        fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async move {
                self.device.state.lock().unwrap().inbound = None;
                self.connected = false;
                Ok(())
            })
        }

        fn send(&mut self, text: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async move {
                if !self.connected {
                    return Err(Error::NotConnected);
                }
                let delay = {
                    let mut state = self.device.state.lock().unwrap();
                    let delay = state
                        .slow_send
                        .filter(|(slow, _)| *slow == text)
                        .map(|(_, delay)| delay);
                    state.in_flight = delay.is_some();
                    delay
                };
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                let mut state = self.device.state.lock().unwrap();
                state.in_flight = false;
                if state.fail_send {
                    return Err(Error::Send {
                        message: text,
                        reason: "broken pipe".into(),
                    });
                }
                state.sent.push(text);
                Ok(())
            })
        }
    }

    /// Client that never polls on its own within a test.
    fn quiet_client(device: &MockDevice) -> SensorLink {
        let config = ClientConfig::new("ws://node").poll_interval(Duration::from_secs(3600));
        SensorLink::with_transport(config, device.transport())
    }

    fn polling_client(device: &MockDevice) -> SensorLink {
        let config = ClientConfig::new("ws://node").poll_interval(Duration::from_millis(500));
        SensorLink::with_transport(config, device.transport())
    }

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);
        assert!(config.reset_cursor_on_connect);
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::new("ws://10.0.0.2:81")
            .poll_interval(Duration::from_secs(1))
            .event_capacity(8)
            .reset_cursor_on_connect(false);
        assert_eq!(config.url, "ws://10.0.0.2:81");
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.event_capacity, 8);
        assert!(!config.reset_cursor_on_connect);
    }

    #[tokio::test]
    async fn test_connect_sends_init_sequence() {
        let device = MockDevice::default();
        let client = quiet_client(&device);
        let mut events = client.subscribe();

        client.connect().await.unwrap();

        assert_eq!(device.sent(), vec!["RELE_off", "AUTOMATICO_on"]);
        assert_eq!(
            events.recv().await,
            Some(Event::ConnectionChanged(Connection::Connected))
        );

        let snapshot = client.snapshot();
        assert_eq!(snapshot.connection, Connection::Connected);
        assert_eq!(snapshot.automatic, AutomaticMode::On);
        assert_eq!(snapshot.lamp, LampState::Off);
    }

    #[tokio::test]
    async fn test_connect_twice_rejected() {
        let device = MockDevice::default();
        let client = quiet_client(&device);
        client.connect().await.unwrap();

        let result = client.connect().await;
        assert!(matches!(
            result,
            Err(Error::Rejected(Rejection::AlreadyConnected))
        ));
        assert_eq!(device.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_connect_failure_stays_disconnected() {
        let device = MockDevice::default();
        device.fail_connect();
        let client = quiet_client(&device);

        let result = client.connect().await;

        assert!(matches!(result, Err(Error::Connect { .. })));
        assert!(!client.is_connected());
        assert!(device.sent().is_empty());
    }

    #[tokio::test]
    async fn test_commands_rejected_while_disconnected() {
        let device = MockDevice::default();
        let client = quiet_client(&device);

        assert!(matches!(
            client.set_automatic(false).await,
            Err(Error::Rejected(Rejection::NotConnected))
        ));
        assert!(matches!(
            client.set_lamp(true).await,
            Err(Error::Rejected(Rejection::NotConnected))
        ));
        assert!(device.sent().is_empty());
    }

    #[tokio::test]
    async fn test_lamp_requires_manual_mode() {
        let device = MockDevice::default();
        let client = quiet_client(&device);
        client.connect().await.unwrap();
        device.clear_sent();

        assert!(matches!(
            client.set_lamp(true).await,
            Err(Error::Rejected(Rejection::AutomaticModeActive))
        ));
        assert!(device.sent().is_empty());
        assert_eq!(client.snapshot().lamp, LampState::Off);

        client.set_automatic(false).await.unwrap();
        client.set_lamp(true).await.unwrap();
        assert_eq!(client.snapshot().lamp, LampState::On);
        client.set_lamp(false).await.unwrap();
        assert_eq!(client.snapshot().lamp, LampState::Off);

        assert_eq!(device.sent(), vec!["AUTOMATICO_off", "RELE_on", "RELE_off"]);
    }

    #[tokio::test]
    async fn test_automatic_on_turns_lamp_off() {
        let device = MockDevice::default();
        let client = quiet_client(&device);
        client.connect().await.unwrap();
        client.set_automatic(false).await.unwrap();
        client.set_lamp(true).await.unwrap();
        device.clear_sent();

        client.set_automatic(true).await.unwrap();

        assert_eq!(device.sent(), vec!["RELE_off", "AUTOMATICO_on"]);
        let snapshot = client.snapshot();
        assert_eq!(snapshot.automatic, AutomaticMode::On);
        assert_eq!(snapshot.lamp, LampState::Off);
    }

    #[tokio::test]
    async fn test_reconnect_forces_automatic_mode() {
        let device = MockDevice::default();
        let client = quiet_client(&device);
        client.connect().await.unwrap();
        client.set_automatic(false).await.unwrap();
        client.set_lamp(true).await.unwrap();

        client.disconnect().await.unwrap();
        assert_eq!(client.snapshot().connection, Connection::Disconnected);

        client.connect().await.unwrap();
        let snapshot = client.snapshot();
        assert_eq!(snapshot.automatic, AutomaticMode::On);
        assert_eq!(snapshot.lamp, LampState::Off);
    }

    #[tokio::test]
    async fn test_send_failure_disconnects() {
        let device = MockDevice::default();
        let client = quiet_client(&device);
        client.connect().await.unwrap();
        let mut events = client.subscribe();
        device.fail_send();

        let result = client.set_automatic(false).await;

        assert!(matches!(result, Err(Error::Send { .. })));
        assert_eq!(
            events.recv().await,
            Some(Event::ConnectionChanged(Connection::Disconnected))
        );
        let snapshot = client.snapshot();
        assert_eq!(snapshot.connection, Connection::Disconnected);
        assert_eq!(snapshot.automatic, AutomaticMode::On);
    }

    #[tokio::test]
    async fn test_remote_close_disconnects() {
        let device = MockDevice::default();
        let client = quiet_client(&device);
        client.connect().await.unwrap();
        let mut events = client.subscribe();

        device
            .push(Inbound::Closed {
                reason: "reset".into(),
            })
            .await;

        assert_eq!(
            events.recv().await,
            Some(Event::ConnectionChanged(Connection::Disconnected))
        );
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_gas_status_without_pending_query() {
        let device = MockDevice::default();
        let client = quiet_client(&device);
        client.connect().await.unwrap();
        let mut events = client.subscribe();

        device.reply("Vazando gas!").await;
        assert_eq!(
            events.recv().await,
            Some(Event::StatusMessage { gas_alarm: true })
        );
        assert_eq!(
            events.recv().await,
            Some(Event::RawLog {
                text: "Vazando gas!".into(),
                direction: Direction::Received,
            })
        );
        assert_eq!(client.snapshot().readings.gas_alarm, Some(true));

        device.reply("Gas ok!").await;
        assert_eq!(
            events.recv().await,
            Some(Event::StatusMessage { gas_alarm: false })
        );
    }

    #[tokio::test]
    async fn test_unrecognized_message_only_logged() {
        let device = MockDevice::default();
        let client = quiet_client(&device);
        client.connect().await.unwrap();
        let mut events = client.subscribe();

        device.reply("hello").await;
        device.reply("42").await;

        // Both are echoed verbatim, nothing else is emitted
        for text in ["hello", "42"] {
            assert_eq!(
                events.recv().await,
                Some(Event::RawLog {
                    text: text.into(),
                    direction: Direction::Received,
                })
            );
        }
        assert_eq!(client.snapshot().readings, crate::types::Readings::new());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_cycle_round_trip() {
        let device = MockDevice::default();
        let client = polling_client(&device);
        client.connect().await.unwrap();
        let mut events = client.subscribe();

        let script = [
            ("TEMPERATURA", "27", Reading::Temperature(27)),
            ("UMIDADE", "55", Reading::Humidity(55)),
            ("PIR", "1", Reading::Presence(true)),
            ("RELE", "0", Reading::RelayStatus(false)),
        ];

        for (i, (query, answer, reading)) in script.into_iter().enumerate() {
            device.wait_sent(3 + i).await;
            assert_eq!(device.sent().last().map(String::as_str), Some(query));
            assert_eq!(
                events.recv().await,
                Some(Event::RawLog {
                    text: query.into(),
                    direction: Direction::Sent,
                })
            );

            device.reply(answer).await;
            assert_eq!(events.recv().await, Some(Event::ReadingUpdated(reading)));
            assert_eq!(
                events.recv().await,
                Some(Event::RawLog {
                    text: answer.into(),
                    direction: Direction::Received,
                })
            );
        }

        let readings = client.snapshot().readings;
        assert_eq!(readings.temperature, Some(27));
        assert_eq!(readings.humidity, Some(55));
        assert_eq!(readings.presence, Some(true));
        assert_eq!(readings.relay_status, Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_reply_dropped() {
        let device = MockDevice::default();
        let client = polling_client(&device);
        client.connect().await.unwrap();

        device.wait_sent(3).await;
        let mut events = client.subscribe();
        device.reply("20").await;
        assert_eq!(
            events.recv().await,
            Some(Event::ReadingUpdated(Reading::Temperature(20)))
        );

        device.wait_sent(4).await;
        device.reply("150").await;

        let expected = [
            Event::RawLog {
                text: "20".into(),
                direction: Direction::Received,
            },
            Event::RawLog {
                text: "UMIDADE".into(),
                direction: Direction::Sent,
            },
            Event::RawLog {
                text: "150".into(),
                direction: Direction::Received,
            },
        ];
        for event in expected {
            assert_eq!(events.recv().await, Some(event));
        }
        let snapshot = client.snapshot();
        assert_eq!(snapshot.readings.humidity, None);
        assert_eq!(snapshot.readings.temperature, Some(20));
        assert_eq!(snapshot.pending, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_polling_while_disconnected() {
        let device = MockDevice::default();
        let client = polling_client(&device);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(device.sent().is_empty());

        client.connect().await.unwrap();
        device.wait_sent(3).await;
        assert_eq!(device.sent()[2], "TEMPERATURA");
        assert_eq!(client.snapshot().pending, Some(Query::Temperature));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cursor_resets_on_reconnect() {
        let device = MockDevice::default();
        let client = polling_client(&device);
        client.connect().await.unwrap();
        device.wait_sent(4).await;
        assert_eq!(device.sent()[3], "UMIDADE");

        client.disconnect().await.unwrap();
        device.clear_sent();
        client.connect().await.unwrap();
        device.wait_sent(3).await;

        assert_eq!(device.sent()[2], "TEMPERATURA");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cursor_resumes_when_reset_disabled() {
        let device = MockDevice::default();
        let config = ClientConfig::new("ws://node")
            .poll_interval(Duration::from_millis(500))
            .reset_cursor_on_connect(false);
        let client = SensorLink::with_transport(config, device.transport());
        client.connect().await.unwrap();
        device.wait_sent(3).await;
        assert_eq!(device.sent()[2], "TEMPERATURA");

        client.disconnect().await.unwrap();
        assert_eq!(client.snapshot().pending, None);
        device.clear_sent();
        client.connect().await.unwrap();
        device.wait_sent(3).await;

        assert_eq!(device.sent()[2], "UMIDADE");
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_send_failure_disconnects() {
        let device = MockDevice::default();
        let client = polling_client(&device);
        client.connect().await.unwrap();
        let mut events = client.subscribe();
        device.fail_send();

        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(
            events.recv().await,
            Some(Event::ConnectionChanged(Connection::Disconnected))
        );
        let snapshot = client.snapshot();
        assert_eq!(snapshot.connection, Connection::Disconnected);
        assert_eq!(snapshot.pending, None);

        // Ticks keep firing but nothing more is sent or reported
        let later = tokio::time::timeout(Duration::from_secs(3), events.recv()).await;
        assert!(later.is_err());
        assert_eq!(device.sent(), vec!["RELE_off", "AUTOMATICO_on"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_read_before_overdue_tick() {
        let device = MockDevice::default();
        let client = polling_client(&device);
        let mut events = client.subscribe();
        client.connect().await.unwrap();
        device.wait_sent(3).await;
        assert_eq!(device.sent()[2], "TEMPERATURA");

        // The next tick comes due while this write is still in progress
        device.slow_send("AUTOMATICO_off", Duration::from_millis(600));
        let (result, ()) = tokio::join!(client.set_automatic(false), async {
            device.wait_in_flight().await;
            device.reply("27").await;
        });
        result.unwrap();

        loop {
            if let Some(Event::RawLog {
                text,
                direction: Direction::Received,
            }) = events.recv().await
            {
                assert_eq!(text, "27");
                break;
            }
        }

        let readings = client.snapshot().readings;
        assert_eq!(readings.temperature, Some(27));
        assert_eq!(readings.humidity, None);
    }

    #[tokio::test]
    async fn test_shutdown_disconnects_transport() {
        let device = MockDevice::default();
        let client = quiet_client(&device);
        client.connect().await.unwrap();

        client.shutdown().await;

        assert!(device.state.lock().unwrap().inbound.is_none());
    }
}
