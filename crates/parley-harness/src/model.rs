//! Reference model of the relay's observable behaviour.
//!
//! Ordered maps, linear scans, no generations. The model-based tests drive it
//! in lockstep with a real `ServerDriver` and require identical outcomes for
//! every operation.

use std::{collections::BTreeMap, time::Duration};

/// Names the generated operations choose from. Small on purpose so claims
/// collide often.
pub const NAMES: [&str; 4] = ["alice", "bob", "carol", "dave"];

/// One step applied to both the model and the driver.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Open a new connection
    Connect,
    /// Client at `client` (modulo live connections) claims `NAMES[name % len]`
    Claim {
        /// Client selector
        client: u8,
        /// Name selector
        name: u8,
    },
    /// Client sends a chat message
    Say {
        /// Client selector
        client: u8,
    },
    /// Client hangs up
    Disconnect {
        /// Client selector
        client: u8,
    },
    /// Move the clock forward without checking deadlines
    Advance {
        /// Milliseconds to advance
        millis: u16,
    },
    /// Check inactivity deadlines
    Tick,
}

/// What an operation is expected to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing visible happened
    Nothing,
    /// Connection opened with this ID
    Connected(u64),
    /// Claim succeeded; everyone else sees a Join
    Accepted(String),
    /// Claim answered with NameUnavailable
    Refused,
    /// Message relayed from this name
    Relayed(String),
    /// Named client left; everyone else sees a Quit
    Quit(String),
    /// These names timed out, in expiry order
    Expired(Vec<String>),
}

/// Reference relay.
#[derive(Debug, Clone)]
pub struct ModelRelay {
    timeout: Duration,
    now: Duration,
    next_id: u64,
    /// Live sessions and their names
    sessions: BTreeMap<u64, Option<String>>,
    /// Last activity per claimed name
    last_active: BTreeMap<String, Duration>,
}

impl ModelRelay {
    /// Model relay with the given inactivity timeout. Connection IDs start at 1.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            now: Duration::ZERO,
            next_id: 1,
            sessions: BTreeMap::new(),
            last_active: BTreeMap::new(),
        }
    }

    /// Live connection IDs in ascending order.
    pub fn session_ids(&self) -> Vec<u64> {
        self.sessions.keys().copied().collect()
    }

    /// Name held by a connection.
    pub fn name_of(&self, session_id: u64) -> Option<&str> {
        self.sessions.get(&session_id).and_then(Option::as_deref)
    }

    /// Resolve a client selector to a live connection.
    pub fn pick(&self, client: u8) -> Option<u64> {
        let ids = self.session_ids();
        if ids.is_empty() {
            return None;
        }
        Some(ids[usize::from(client) % ids.len()])
    }

    /// Apply one operation.
    pub fn apply(&mut self, op: &Operation) -> Outcome {
        match *op {
            Operation::Connect => {
                let id = self.next_id;
                self.next_id += 1;
                self.sessions.insert(id, None);
                Outcome::Connected(id)
            },
            Operation::Claim { client, name } => {
                let Some(id) = self.pick(client) else { return Outcome::Nothing };
                let name = NAMES[usize::from(name) % NAMES.len()].to_string();

                let already_named = self.name_of(id).is_some();
                let taken = self.sessions.values().any(|n| n.as_deref() == Some(name.as_str()));
                if already_named || taken {
                    return Outcome::Refused;
                }

                self.sessions.insert(id, Some(name.clone()));
                self.last_active.insert(name.clone(), self.now);
                Outcome::Accepted(name)
            },
            Operation::Say { client } => {
                let Some(id) = self.pick(client) else { return Outcome::Nothing };
                match self.name_of(id).map(str::to_string) {
                    Some(name) => {
                        self.last_active.insert(name.clone(), self.now);
                        Outcome::Relayed(name)
                    },
                    None => Outcome::Nothing,
                }
            },
            Operation::Disconnect { client } => {
                let Some(id) = self.pick(client) else { return Outcome::Nothing };
                match self.sessions.remove(&id).flatten() {
                    Some(name) => {
                        self.last_active.remove(&name);
                        Outcome::Quit(name)
                    },
                    None => Outcome::Nothing,
                }
            },
            Operation::Advance { millis } => {
                self.now += Duration::from_millis(u64::from(millis));
                Outcome::Nothing
            },
            Operation::Tick => {
                let mut expired: Vec<(Duration, String)> = self
                    .last_active
                    .iter()
                    .filter(|(_, last)| **last + self.timeout <= self.now)
                    .map(|(name, last)| (*last, name.clone()))
                    .collect();
                expired.sort();

                if expired.is_empty() {
                    return Outcome::Nothing;
                }

                for (_, name) in &expired {
                    self.last_active.remove(name);
                    self.sessions.retain(|_, n| n.as_deref() != Some(name.as_str()));
                }

                Outcome::Expired(expired.into_iter().map(|(_, name)| name).collect())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_refuses_duplicate_names() {
        let mut model = ModelRelay::new(Duration::from_secs(60));
        model.apply(&Operation::Connect);
        model.apply(&Operation::Connect);

        assert_eq!(
            model.apply(&Operation::Claim { client: 0, name: 0 }),
            Outcome::Accepted("alice".to_string())
        );
        assert_eq!(model.apply(&Operation::Claim { client: 1, name: 0 }), Outcome::Refused);
        assert_eq!(model.apply(&Operation::Claim { client: 0, name: 1 }), Outcome::Refused);
    }

    #[test]
    fn model_expires_idle_names() {
        let mut model = ModelRelay::new(Duration::from_secs(2));
        model.apply(&Operation::Connect);
        model.apply(&Operation::Claim { client: 0, name: 2 });

        model.apply(&Operation::Advance { millis: 1999 });
        assert_eq!(model.apply(&Operation::Tick), Outcome::Nothing);

        model.apply(&Operation::Advance { millis: 1 });
        assert_eq!(model.apply(&Operation::Tick), Outcome::Expired(vec!["carol".to_string()]));
        assert!(model.session_ids().is_empty());
    }
}
