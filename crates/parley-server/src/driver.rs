//! Server driver.
//!
//! Sans-IO coordinator for the relay: owns every connection's [`Session`],
//! the [`IdentityRegistry`] and the [`InactivityMonitor`]. The runtime feeds
//! it [`ServerEvent`]s one at a time and executes the [`ServerAction`]s it
//! returns. Because all three pieces of state are mutated from one
//! `process_event` call, a claim is a single check-and-set and a forced
//! disconnect can never interleave with a voluntary one.

use std::collections::HashMap;

use parley_core::{
    IdentityRegistry, InactivityMonitor, Session, SessionState, env::Environment, format_line,
    inactivity::DEFAULT_IDLE_TIMEOUT,
};
use parley_proto::{Frame, LineEvent, MAX_MESSAGE_LEN, Payload};

use crate::driver_error::DriverError;

/// Driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Inactivity timeout for named sessions
    pub idle_timeout: std::time::Duration,
    /// Maximum concurrent connections
    pub max_connections: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { idle_timeout: DEFAULT_IDLE_TIMEOUT, max_connections: 10_000 }
    }
}

/// Events that the server driver processes.
///
/// These are produced by the external runtime (simulation or production).
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A new connection was accepted
    ConnectionAccepted {
        /// Unique connection ID assigned by the runtime
        session_id: u64,
    },

    /// A frame was received from a connection
    FrameReceived {
        /// Connection that sent the frame
        session_id: u64,
        /// The received frame
        frame: Frame,
    },

    /// A connection was closed (by peer or error)
    ConnectionClosed {
        /// Connection that was closed
        session_id: u64,
        /// Reason for closure
        reason: String,
    },

    /// An inactivity deadline may have passed
    Tick,

    /// The operator asked the relay to stop
    Shutdown,
}

/// Actions that the server driver produces.
///
/// These are executed by runtime-specific code (production or simulation).
#[derive(Debug, Clone)]
pub enum ServerAction<I> {
    /// Send a frame to a specific session
    SendToSession {
        /// Target session ID
        session_id: u64,
        /// Frame to send
        frame: Frame,
    },

    /// Send a frame to every live session
    Broadcast {
        /// Frame to broadcast
        frame: Frame,
        /// Optional session to exclude from broadcast
        exclude_session: Option<u64>,
    },

    /// Close a connection
    CloseConnection {
        /// Session to close
        session_id: u64,
        /// Reason for closure
        reason: String,
    },

    /// Log a message (for debugging/monitoring)
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
        /// When the event occurred
        timestamp: I,
    },
}

/// Log levels for server actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

/// Action-based server driver.
pub struct ServerDriver<E: Environment> {
    /// Live sessions (session_id → Session)
    sessions: HashMap<u64, Session>,
    /// Name ownership
    identities: IdentityRegistry,
    /// Per-name inactivity deadlines
    monitor: InactivityMonitor<E::Instant>,
    /// Environment (time, RNG)
    env: E,
    /// Driver configuration
    config: DriverConfig,
    /// Set once `Shutdown` has been processed
    shutting_down: bool,
}

impl<E: Environment> ServerDriver<E> {
    /// Create a new server driver.
    ///
    /// # Errors
    ///
    /// - `DriverError::Config` if the idle timeout or connection limit is zero
    pub fn new(env: E, config: DriverConfig) -> Result<Self, DriverError> {
        if config.max_connections == 0 {
            return Err(DriverError::Config("max_connections must be at least 1".to_string()));
        }

        let monitor = InactivityMonitor::new(config.idle_timeout)
            .map_err(|e| DriverError::Config(e.to_string()))?;

        Ok(Self {
            sessions: HashMap::new(),
            identities: IdentityRegistry::new(),
            monitor,
            env,
            config,
            shutting_down: false,
        })
    }

    /// Process a server event and return actions to execute.
    ///
    /// This is the main entry point for the server driver.
    pub fn process_event(
        &mut self,
        event: ServerEvent,
    ) -> Result<Vec<ServerAction<E::Instant>>, DriverError> {
        match event {
            ServerEvent::ConnectionAccepted { session_id } => {
                self.handle_connection_accepted(session_id)
            },
            ServerEvent::FrameReceived { session_id, frame } => {
                self.handle_frame_received(session_id, &frame)
            },
            ServerEvent::ConnectionClosed { session_id, reason } => {
                self.end_session(session_id, &reason)
            },
            ServerEvent::Tick => self.handle_tick(),
            ServerEvent::Shutdown => self.handle_shutdown(),
        }
    }

    fn handle_connection_accepted(
        &mut self,
        session_id: u64,
    ) -> Result<Vec<ServerAction<E::Instant>>, DriverError> {
        if self.shutting_down {
            return Ok(vec![ServerAction::CloseConnection {
                session_id,
                reason: "server shutting down".to_string(),
            }]);
        }

        if self.sessions.len() >= self.config.max_connections {
            return Ok(vec![
                ServerAction::CloseConnection {
                    session_id,
                    reason: "max connections exceeded".to_string(),
                },
                self.log(LogLevel::Warn, format!("connection {session_id} rejected: at capacity")),
            ]);
        }

        if self.sessions.contains_key(&session_id) {
            return Err(DriverError::SessionAlreadyExists(session_id));
        }

        self.sessions.insert(session_id, Session::new(session_id));

        Ok(vec![self.log(LogLevel::Debug, format!("connection {session_id} accepted"))])
    }

    fn handle_frame_received(
        &mut self,
        session_id: u64,
        frame: &Frame,
    ) -> Result<Vec<ServerAction<E::Instant>>, DriverError> {
        if !self.sessions.contains_key(&session_id) {
            return Err(DriverError::SessionNotFound(session_id));
        }

        let payload = match Payload::from_frame(frame) {
            Ok(payload) => payload,
            Err(e) => {
                return Ok(vec![self.log(
                    LogLevel::Warn,
                    format!("dropping malformed frame from {session_id}: {e}"),
                )]);
            },
        };

        match payload {
            Payload::ClaimName(name) => self.handle_claim(session_id, name),
            Payload::SendMessage(text) => self.handle_message(session_id, text),
            Payload::Goodbye => {
                let mut actions = self.end_session(session_id, "client goodbye")?;
                actions.push(ServerAction::CloseConnection {
                    session_id,
                    reason: "client goodbye".to_string(),
                });
                Ok(actions)
            },
            Payload::ClaimAccepted
            | Payload::NameUnavailable
            | Payload::Line(_)
            | Payload::ServerShuttingDown => Ok(vec![self.log(
                LogLevel::Warn,
                format!("dropping relay-only {:?} frame from {session_id}", payload.opcode()),
            )]),
        }
    }

    fn handle_claim(
        &mut self,
        session_id: u64,
        name: String,
    ) -> Result<Vec<ServerAction<E::Instant>>, DriverError> {
        let session =
            self.sessions.get(&session_id).ok_or(DriverError::SessionNotFound(session_id))?;

        if let Err(e) = session.check_claim(&name) {
            let mut actions = Vec::new();
            if e.is_reportable() {
                actions.push(self.send(session_id, Payload::NameUnavailable)?);
            }
            actions.push(self.log(LogLevel::Debug, format!("claim from {session_id} ignored: {e}")));
            return Ok(actions);
        }

        if let Err(e) = self.identities.claim(&name, session_id) {
            return Ok(vec![
                self.send(session_id, Payload::NameUnavailable)?,
                self.log(LogLevel::Debug, format!("claim from {session_id} refused: {e}")),
            ]);
        }

        if let Some(session) = self.sessions.get_mut(&session_id) {
            if let Err(e) = session.complete_claim(&name) {
                self.identities.release(&name, session_id);
                return Err(e.into());
            }
        }

        let line = LineEvent::join(self.env.wall_clock_millis(), name.as_str());
        let message = format_line(&line);

        let actions = vec![
            self.send(session_id, Payload::ClaimAccepted)?,
            ServerAction::Broadcast {
                frame: Payload::Line(line).into_frame()?,
                exclude_session: Some(session_id),
            },
            self.log(LogLevel::Info, message),
        ];

        self.monitor.touch(&name, self.env.now());

        Ok(actions)
    }

    fn handle_message(
        &mut self,
        session_id: u64,
        text: String,
    ) -> Result<Vec<ServerAction<E::Instant>>, DriverError> {
        let session =
            self.sessions.get(&session_id).ok_or(DriverError::SessionNotFound(session_id))?;

        let Some(from) = session.sender().map(str::to_string) else {
            return Ok(vec![
                self.log(LogLevel::Debug, format!("dropping message from anonymous {session_id}")),
            ]);
        };

        if text.len() > MAX_MESSAGE_LEN {
            return Ok(vec![self.log(
                LogLevel::Debug,
                format!("dropping {} byte message from {from} (max {MAX_MESSAGE_LEN})", text.len()),
            )]);
        }

        let line = LineEvent::message(self.env.wall_clock_millis(), from.as_str(), text);
        let message = format_line(&line);

        let actions = vec![
            ServerAction::Broadcast {
                frame: Payload::Line(line).into_frame()?,
                exclude_session: Some(session_id),
            },
            self.log(LogLevel::Info, message),
        ];

        self.monitor.touch(&from, self.env.now());

        Ok(actions)
    }

    /// Single cleanup path for voluntary disconnects, goodbyes and idle
    /// expiry.
    ///
    /// Removing the session from the map makes every later call for the same
    /// ID a no-op, and the registry only releases a name still owned by this
    /// session, so a Quit line is broadcast at most once per claim.
    fn end_session(
        &mut self,
        session_id: u64,
        reason: &str,
    ) -> Result<Vec<ServerAction<E::Instant>>, DriverError> {
        let Some(mut session) = self.sessions.remove(&session_id) else {
            return Ok(Vec::new());
        };

        let mut actions = Vec::new();

        if let Some(name) = session.terminate() {
            if self.identities.release(&name, session_id) {
                self.monitor.cancel(&name);

                let line = LineEvent::quit(self.env.wall_clock_millis(), name.as_str());
                let message = format_line(&line);

                actions.push(ServerAction::Broadcast {
                    frame: Payload::Line(line).into_frame()?,
                    exclude_session: Some(session_id),
                });
                actions.push(self.log(LogLevel::Info, message));
            }
        }

        actions.push(self.log(LogLevel::Debug, format!("connection {session_id} closed: {reason}")));

        Ok(actions)
    }

    fn handle_tick(&mut self) -> Result<Vec<ServerAction<E::Instant>>, DriverError> {
        let now = self.env.now();
        let mut actions = Vec::new();

        for expiry in self.monitor.expire(now) {
            // Names released between scheduling and expiry have no owner
            let Some(owner) = self.identities.lookup(&expiry.name) else {
                continue;
            };

            let reason = format!("idle timeout after {:?}", self.monitor.timeout());
            actions.extend(self.end_session(owner, &reason)?);
            actions.push(ServerAction::CloseConnection { session_id: owner, reason });
        }

        Ok(actions)
    }

    fn handle_shutdown(&mut self) -> Result<Vec<ServerAction<E::Instant>>, DriverError> {
        if self.shutting_down {
            return Ok(Vec::new());
        }
        self.shutting_down = true;

        Ok(vec![
            ServerAction::Broadcast {
                frame: Payload::ServerShuttingDown.into_frame()?,
                exclude_session: None,
            },
            self.log(
                LogLevel::Info,
                format!("shutting down, notifying {} connections", self.sessions.len()),
            ),
        ])
    }

    fn send(
        &self,
        session_id: u64,
        payload: Payload,
    ) -> Result<ServerAction<E::Instant>, DriverError> {
        Ok(ServerAction::SendToSession { session_id, frame: payload.into_frame()? })
    }

    fn log(&self, level: LogLevel, message: String) -> ServerAction<E::Instant> {
        ServerAction::Log { level, message, timestamp: self.env.now() }
    }

    /// IDs of every live session, in no particular order.
    pub fn session_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.sessions.keys().copied()
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of claimed names.
    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    /// Every claimed name, in no particular order.
    pub fn claimed_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.identities.names()
    }

    /// Name claimed by a session, if any.
    pub fn identity_of(&self, session_id: u64) -> Option<&str> {
        self.sessions.get(&session_id).and_then(Session::identity)
    }

    /// Session that owns a name, if any.
    pub fn owner_of(&self, name: &str) -> Option<u64> {
        self.identities.lookup(name)
    }

    /// State of a live session.
    pub fn session_state(&self, session_id: u64) -> Option<SessionState> {
        self.sessions.get(&session_id).map(Session::state)
    }

    /// Inactivity deadline for a name, if it is being monitored.
    pub fn deadline_of(&self, name: &str) -> Option<E::Instant> {
        self.monitor.deadline(name)
    }

    /// Earliest pending inactivity deadline.
    pub fn next_deadline(&self) -> Option<E::Instant> {
        self.monitor.next_deadline()
    }

    /// Whether `Shutdown` has been processed.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Driver configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }
}
