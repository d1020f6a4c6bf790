//! MQTT publisher backed by rumqttc

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, Transport};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::{Publisher, CONNECT_TIMEOUT_MS, RECONNECT_BACKOFF_MS, SHUTDOWN_TIMEOUT_MS};
use crate::config::BrokerConfig;
use crate::record::Record;
use crate::{CadenceError, Result};

/// Capacity of the client request queue
const REQUEST_QUEUE_CAPACITY: usize = 64;

/// Broker link as last reported by the event loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    /// No connection attempt has finished yet
    Connecting,
    Up,
    Down,
}

/// Publishes records over a single long-lived MQTT connection.
///
/// Publishing never waits on a dead broker: while the link is down, or the
/// request queue is full, the record fails with a delivery error at once.
pub struct MqttPublisher {
    client: AsyncClient,
    qos: QoS,
    retain: bool,
    link: watch::Receiver<Link>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl MqttPublisher {
    /// Open the broker connection.
    ///
    /// The event loop runs on a spawned task until [`Publisher::close`], so
    /// this must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the broker settings are invalid
    pub fn connect(config: &BrokerConfig) -> Result<Self> {
        let qos = qos_level(config.qos)?;
        let options = mqtt_options(config);

        info!(
            host = %config.host,
            port = config.port,
            tls = config.use_tls(),
            client_id = %config.client_id,
            "Connecting to MQTT broker"
        );

        let (client, event_loop) = AsyncClient::new(options, REQUEST_QUEUE_CAPACITY);
        let shutdown = CancellationToken::new();
        let (link_tx, link) = watch::channel(Link::Connecting);
        let handle = tokio::spawn(drive_event_loop(event_loop, link_tx, shutdown.clone()));

        Ok(Self {
            client,
            qos,
            retain: config.retain,
            link,
            event_loop: Mutex::new(Some(handle)),
            shutdown,
        })
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&self, record: &Record) -> Result<()> {
        match self.settled_link().await {
            Link::Up => {}
            Link::Connecting => {
                return Err(CadenceError::delivery(&record.topic, "broker connection pending"));
            }
            Link::Down => {
                return Err(CadenceError::delivery(&record.topic, "not connected to broker"));
            }
        }

        self.client
            .try_publish(
                record.topic.as_str(),
                self.qos,
                self.retain,
                record.payload.to_vec(),
            )
            .map_err(|e| CadenceError::delivery(&record.topic, e))
    }

    async fn close(&self) -> Result<()> {
        let Some(handle) = self.event_loop.lock().await.take() else {
            return Ok(());
        };

        let connected = *self.link.borrow() == Link::Up;
        if connected {
            if let Err(e) = self.client.disconnect().await {
                warn!(error = %e, "Failed to request broker disconnect");
                self.shutdown.cancel();
            }
        } else {
            // Nothing to disconnect from; stop retrying
            self.shutdown.cancel();
        }

        let timeout = Duration::from_millis(SHUTDOWN_TIMEOUT_MS);
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => {
                debug!("MQTT event loop stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(CadenceError::Other(format!("MQTT event loop failed: {e}"))),
            Err(_) => {
                warn!("MQTT disconnect timed out, abandoning event loop");
                self.shutdown.cancel();
                Ok(())
            }
        }
    }
}

impl MqttPublisher {
    /// Link state, waiting a bounded time for the first connection attempt
    async fn settled_link(&self) -> Link {
        let mut link = self.link.clone();
        let timeout = Duration::from_millis(CONNECT_TIMEOUT_MS);
        let settled = tokio::time::timeout(timeout, link.wait_for(|l| *l != Link::Connecting))
            .await
            .map(|state| state.map(|l| *l));

        match settled {
            Ok(Ok(state)) => state,
            // Event loop gone without ever settling
            Ok(Err(_)) => Link::Down,
            Err(_) => Link::Connecting,
        }
    }
}

/// Build client options from the broker configuration
fn mqtt_options(config: &BrokerConfig) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

    if let Some(username) = &config.username {
        options.set_credentials(username, config.password.clone().unwrap_or_default());
    }

    if config.use_tls() {
        options.set_transport(Transport::tls_with_default_config());
    }

    options
}

/// Map a numeric QoS level
fn qos_level(level: u8) -> Result<QoS> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(CadenceError::Config(format!(
            "Invalid QoS {other}: expected 0, 1 or 2"
        ))),
    }
}

/// Poll the connection until disconnect or shutdown.
///
/// Polling after an error makes rumqttc reconnect, so transport failures
/// are logged and retried after a back-off. The link stays down until the
/// broker acknowledges a new connection.
async fn drive_event_loop(
    mut event_loop: EventLoop,
    link: watch::Sender<Link>,
    shutdown: CancellationToken,
) {
    let backoff = Duration::from_millis(RECONNECT_BACKOFF_MS);

    loop {
        let event = tokio::select! {
            () = shutdown.cancelled() => break,
            event = event_loop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!(code = ?ack.code, "Connected to MQTT broker");
                link.send_replace(Link::Up);
            }
            Ok(Event::Incoming(Packet::PubAck(ack))) => {
                trace!(pkid = ack.pkid, "Publish acknowledged");
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                info!("Disconnected from MQTT broker");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                if link.send_replace(Link::Down) == Link::Down {
                    debug!(error = %e, "MQTT reconnect failed");
                } else {
                    error!(error = %e, "MQTT connection error, reconnecting");
                }
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(backoff) => {}
                }
            }
        }
    }

    link.send_replace(Link::Down);
}
