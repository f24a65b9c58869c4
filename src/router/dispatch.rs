//! Event dispatch
//!
//! [`EventRouter::dispatch`] maps one inbound event to registry and
//! subscription mutations and returns the outbound messages it produces.
//! [`EventRouter::deliver`] resolves each message's target to connections
//! and queues it on them.
//!
//! ```text
//! connect_user     ─► SessionRegistry::register_field ─► registered / error
//! connect_admin    ─► MonitorSet::add
//! request_listen   ─► SubscriptionTable::subscribe    ─► listen_confirm
//! stop_listen      ─► SubscriptionTable::unsubscribe  ─► listen_stopped
//! audio_chunk      ─► room(user_id)
//! location_update  ─► room(user_id)
//! panic            ─► IncidentNotifier::persist       ─► incident_ack
//! auto_dispatch    ─► IncidentNotifier::persist       ─► incident_ack
//! send_rescue/help/safe ─► logged only
//! ```

use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

use super::config::RelayConfig;
use super::state::RelayState;
use crate::incident::{AlertType, IncidentError, IncidentNotifier, IncidentRecord};
use crate::protocol::{
    AlertPayload, AudioChunkPayload, Delivery, IdentityPayload, InboundEvent, LocationPayload,
    OutboundMessage, SignalKind, SignalPayload, Target,
};
use crate::registry::{ClientHandle, ClientIdentity, Registration, RegistryError, SendOutcome};

/// Routes inbound events for every connection of one relay
pub struct EventRouter<N: IncidentNotifier> {
    state: RelayState,
    notifier: N,
    config: RelayConfig,
}

impl<N: IncidentNotifier> EventRouter<N> {
    /// Create a router over `state` with default configuration
    pub fn new(state: RelayState, notifier: N) -> Self {
        Self::with_config(state, notifier, RelayConfig::default())
    }

    /// Create a router with custom configuration
    pub fn with_config(state: RelayState, notifier: N, config: RelayConfig) -> Self {
        Self {
            state,
            notifier,
            config,
        }
    }

    /// Shared relay state
    pub fn state(&self) -> &RelayState {
        &self.state
    }

    /// Incident notifier
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Router configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Dispatch `event` and deliver what it produces
    ///
    /// Returns the number of messages queued.
    pub async fn handle(&self, caller: &Arc<ClientHandle>, event: InboundEvent) -> usize {
        let deliveries = self.dispatch(caller, event).await;
        self.deliver(caller, deliveries).await
    }

    /// Apply `event` from `caller` and return the resulting deliveries
    pub async fn dispatch(&self, caller: &Arc<ClientHandle>, event: InboundEvent) -> Vec<Delivery> {
        self.state.stats.event_received();

        match event {
            InboundEvent::RegisterField(p) => self.register_field(caller, p).await,
            InboundEvent::RegisterMonitor => self.register_monitor(caller).await,
            InboundEvent::AudioChunk(p) => self.audio_chunk(caller, p),
            InboundEvent::LocationUpdate(p) => self.location_update(caller, p),
            InboundEvent::Subscribe(p) => self.subscribe(caller, p).await,
            InboundEvent::Unsubscribe(p) => self.unsubscribe(caller, p).await,
            InboundEvent::Panic(p) => self.alert(caller, AlertType::Panic, p).await,
            InboundEvent::AutoDispatch(p) => self.alert(caller, AlertType::AutoDispatch, p).await,
            InboundEvent::Signal(kind, p) => self.signal(caller, kind, p),
        }
    }

    /// Purge every reference to `caller` after its connection closed
    ///
    /// Safe to call any number of times.
    pub async fn disconnect(&self, caller: &ClientHandle) {
        let first = caller.mark_closed();

        let identities = self.state.sessions.unregister(caller).await;
        let rooms = self.state.rooms.remove_handle_everywhere(caller).await;
        let was_monitor = self.state.monitors.remove(caller).await;

        for identity in &identities {
            info!(user_id = %identity, session_id = %caller.id(), "Field client disconnected");
        }
        if was_monitor {
            info!(session_id = %caller.id(), rooms_left = rooms.len(), "Monitor disconnected");
        }
        if first {
            debug!(
                session_id = %caller.id(),
                identities = identities.len(),
                rooms = rooms.len(),
                dropped_frames = caller.drop_count(),
                "Connection cleaned up"
            );
        }
    }

    /// Queue deliveries on their recipients
    ///
    /// Returns the number of messages queued.
    pub async fn deliver(&self, caller: &Arc<ClientHandle>, deliveries: Vec<Delivery>) -> usize {
        let mut queued = 0;
        for delivery in deliveries {
            queued += self.deliver_to(Some(caller), delivery).await;
        }
        queued
    }

    /// Send `message` to the connection registered for `identity`
    ///
    /// Returns `false` if the identity is unknown or the message could not
    /// be queued.
    pub async fn send_to_field(&self, identity: &ClientIdentity, message: OutboundMessage) -> bool {
        let delivery = Delivery {
            target: Target::Field(identity.clone()),
            message,
        };
        self.deliver_to(None, delivery).await > 0
    }

    async fn deliver_to(&self, caller: Option<&Arc<ClientHandle>>, delivery: Delivery) -> usize {
        let recipients: Vec<Arc<ClientHandle>> = match &delivery.target {
            Target::Caller => caller.cloned().into_iter().collect(),
            Target::Room(room) => self.state.rooms.members_of(room).await,
            Target::Field(identity) => self
                .state
                .sessions
                .lookup(identity)
                .await
                .into_iter()
                .collect(),
        };

        if recipients.is_empty() {
            trace!(event = delivery.message.name(), dest = ?delivery.target, "No recipients");
            return 0;
        }

        let frame = match delivery.message.encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to encode outbound message");
                return 0;
            }
        };

        let mut queued = 0u64;
        let mut dropped = 0u64;
        for recipient in &recipients {
            match recipient.send(Arc::clone(&frame)) {
                SendOutcome::Queued => queued += 1,
                SendOutcome::Dropped => {
                    dropped += 1;
                    warn!(
                        session_id = %recipient.id(),
                        event = delivery.message.name(),
                        total_drops = recipient.drop_count(),
                        "Outbound queue full, message dropped"
                    );
                }
                SendOutcome::Closed => {
                    dropped += 1;
                    debug!(session_id = %recipient.id(), "Recipient already closed");
                }
            }
        }

        trace!(
            event = delivery.message.name(),
            dest = ?delivery.target,
            recipients = recipients.len(),
            queued,
            "Delivered"
        );

        self.state.stats.forwarded(queued);
        if dropped > 0 {
            self.state.stats.dropped(dropped);
        }

        queued as usize
    }

    async fn register_field(&self, caller: &Arc<ClientHandle>, p: IdentityPayload) -> Vec<Delivery> {
        let Some(identity) = p.identity() else {
            self.malformed(caller, "connect_user", "missing user_id");
            return vec![Delivery::caller(OutboundMessage::error("No user_id provided"))];
        };

        match self.state.sessions.register_field(&identity, caller).await {
            Ok(registration) => {
                let replaced = matches!(registration, Registration::Replaced(_));
                info!(
                    user_id = %identity,
                    session_id = %caller.id(),
                    replaced,
                    "Field client registered"
                );
                vec![Delivery::caller(OutboundMessage::Registered { user_id: identity })]
            }
            Err(e @ RegistryError::IdentityInUse(_)) => {
                warn!(user_id = %identity, session_id = %caller.id(), "Registration rejected: identity in use");
                vec![Delivery::caller(OutboundMessage::error(e.to_string()))]
            }
            Err(RegistryError::HandleClosed(_)) => {
                debug!(session_id = %caller.id(), "Registration from closed connection ignored");
                Vec::new()
            }
        }
    }

    async fn register_monitor(&self, caller: &Arc<ClientHandle>) -> Vec<Delivery> {
        if self.state.monitors.add(caller).await {
            info!(session_id = %caller.id(), "Monitor connected");
        }
        Vec::new()
    }

    fn audio_chunk(&self, caller: &Arc<ClientHandle>, p: AudioChunkPayload) -> Vec<Delivery> {
        let (Some(identity), Some(chunk)) = (p.identity(), p.chunk().cloned()) else {
            self.malformed(caller, "audio_chunk", "missing user_id or chunk");
            return Vec::new();
        };

        vec![Delivery::room(
            identity.clone(),
            OutboundMessage::AudioChunk {
                user_id: identity,
                chunk,
            },
        )]
    }

    fn location_update(&self, caller: &Arc<ClientHandle>, p: LocationPayload) -> Vec<Delivery> {
        let (Some(identity), Some(lat), Some(lon)) = (p.identity(), p.lat, p.lon) else {
            self.malformed(caller, "location_update", "missing user_id, lat or lon");
            return Vec::new();
        };

        vec![Delivery::room(
            identity.clone(),
            OutboundMessage::LocationUpdate {
                user_id: identity,
                lat,
                lon,
            },
        )]
    }

    async fn subscribe(&self, caller: &Arc<ClientHandle>, p: IdentityPayload) -> Vec<Delivery> {
        let Some(target) = p.identity() else {
            self.malformed(caller, "request_listen", "missing user_id");
            return vec![Delivery::caller(OutboundMessage::error(
                "No user_id provided for listen request",
            ))];
        };

        match self.state.rooms.subscribe(caller, &target).await {
            Ok(room) => {
                info!(session_id = %caller.id(), room = %room, "Monitor joined listening room");
                vec![Delivery::caller(OutboundMessage::ListenConfirm { room })]
            }
            Err(e) => {
                debug!(session_id = %caller.id(), error = %e, "Subscribe from closed connection ignored");
                Vec::new()
            }
        }
    }

    async fn unsubscribe(&self, caller: &Arc<ClientHandle>, p: IdentityPayload) -> Vec<Delivery> {
        let Some(target) = p.identity() else {
            self.malformed(caller, "stop_listen", "missing user_id");
            return vec![Delivery::caller(OutboundMessage::error(
                "No user_id provided for stop request",
            ))];
        };

        let was_member = self.state.rooms.unsubscribe(caller, &target).await;
        debug!(session_id = %caller.id(), room = %target, was_member, "Monitor left listening room");

        vec![Delivery::caller(OutboundMessage::ListenStopped { room: target })]
    }

    async fn alert(
        &self,
        caller: &Arc<ClientHandle>,
        alert_type: AlertType,
        p: AlertPayload,
    ) -> Vec<Delivery> {
        let Some(identity) = p.identity() else {
            self.malformed(caller, &alert_type.to_string(), "missing user_id");
            return vec![Delivery::caller(OutboundMessage::error(
                "No user_id provided for alert",
            ))];
        };

        let level = p.level().unwrap_or(self.config.default_severity.as_str());
        let record = IncidentRecord::new(identity.clone(), alert_type, level.to_string());

        let ack = match self.record_incident(&record).await {
            Ok(()) => {
                self.state.stats.incident_recorded();
                info!(
                    user_id = %identity,
                    alert_type = %alert_type,
                    severity = %record.severity_level,
                    "Incident recorded"
                );
                OutboundMessage::IncidentAck {
                    user_id: identity,
                    alert_type,
                    ok: true,
                    message: None,
                }
            }
            Err(e) => {
                self.state.stats.incident_failed();
                error!(
                    user_id = %identity,
                    alert_type = %alert_type,
                    error = %e,
                    "Failed to record incident"
                );
                OutboundMessage::IncidentAck {
                    user_id: identity,
                    alert_type,
                    ok: false,
                    message: Some(e.to_string()),
                }
            }
        };

        vec![Delivery::caller(ack)]
    }

    async fn record_incident(&self, record: &IncidentRecord) -> Result<(), IncidentError> {
        let timeout = self.config.notifier_timeout;
        match tokio::time::timeout(timeout, self.notifier.persist(record)).await {
            Ok(result) => result,
            Err(_) => Err(IncidentError::Timeout(timeout)),
        }
    }

    // Rescue/help/safe are accepted and logged; no routing policy yet.
    fn signal(&self, caller: &Arc<ClientHandle>, kind: SignalKind, p: SignalPayload) -> Vec<Delivery> {
        self.state.stats.signal_observed();
        info!(
            event = kind.as_str(),
            session_id = %caller.id(),
            user_id = ?p.user_id,
            payload = ?p.extra,
            "Received safety signal"
        );
        Vec::new()
    }

    fn malformed(&self, caller: &ClientHandle, event: &str, reason: &str) {
        self.state.stats.malformed_event();
        warn!(session_id = %caller.id(), event, reason, "Invalid event data received");
    }
}
