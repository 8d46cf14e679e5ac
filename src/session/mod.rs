//! Per-user paper-trading sessions, the service's only mutable state.

pub mod ledger;

pub use ledger::{LedgerEntry, Portfolio, Session, TradeError, RECENT_ENTRIES};

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{Amount, Side, TimePoint};

pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

#[derive(Debug)]
struct Slot {
    session: Session,
    last_active: Instant,
    /// Store-wide activity counter; orders sessions for eviction.
    touched: u64,
}

#[derive(Debug, Default)]
struct Sessions {
    slots: HashMap<Uuid, Slot>,
    clock: u64,
}

impl Sessions {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Isolated sessions keyed by id.
///
/// Sessions idle for longer than the TTL are dropped, and the least recently
/// active one makes room once the store is full. Creating a session or
/// trading in it counts as activity.
#[derive(Debug)]
pub struct SessionStore {
    starting_cash: Amount,
    idle_ttl: Duration,
    max_sessions: usize,
    sessions: RwLock<Sessions>,
}

impl SessionStore {
    pub fn new(starting_cash: Amount) -> Self {
        Self {
            starting_cash,
            idle_ttl: DEFAULT_IDLE_TTL,
            max_sessions: DEFAULT_MAX_SESSIONS,
            sessions: RwLock::new(Sessions::default()),
        }
    }

    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = ttl;
        self
    }

    /// At least one session is always kept.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max.max(1);
        self
    }

    pub fn starting_cash(&self) -> Amount {
        self.starting_cash
    }

    pub async fn create(&self) -> Session {
        let session = Session::new(Uuid::new_v4(), self.starting_cash);
        let mut sessions = self.sessions.write().await;
        self.evict(&mut sessions);

        let touched = sessions.tick();
        sessions.slots.insert(
            session.id(),
            Slot {
                session: session.clone(),
                last_active: Instant::now(),
                touched,
            },
        );
        info!(session_id = %session.id(), "session created");
        session
    }

    /// Copy of the session's current state.
    pub async fn get(&self, id: Uuid) -> Option<Session> {
        let sessions = self.sessions.read().await;
        let slot = sessions.slots.get(&id)?;
        (slot.last_active.elapsed() < self.idle_ttl).then(|| slot.session.clone())
    }

    /// Run an order against one session.
    ///
    /// `None` when the session does not exist or has expired.
    pub async fn execute(
        &self,
        id: Uuid,
        side: Side,
        amount: Amount,
        price: Option<f64>,
        at: TimePoint,
    ) -> Option<Result<LedgerEntry, TradeError>> {
        let mut sessions = self.sessions.write().await;
        let touched = sessions.tick();
        let idle_ttl = self.idle_ttl;
        let slot = sessions.slots.get_mut(&id)?;
        if slot.last_active.elapsed() >= idle_ttl {
            return None;
        }
        slot.last_active = Instant::now();
        slot.touched = touched;
        Some(slot.session.execute(side, amount, price, at))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.slots.is_empty()
    }

    /// Drop expired sessions, then the least recently active ones until a
    /// new session fits.
    fn evict(&self, sessions: &mut Sessions) {
        let before = sessions.slots.len();
        sessions
            .slots
            .retain(|_, slot| slot.last_active.elapsed() < self.idle_ttl);

        while sessions.slots.len() >= self.max_sessions {
            let Some(oldest) = sessions
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.touched)
                .map(|(id, _)| *id)
            else {
                break;
            };
            sessions.slots.remove(&oldest);
        }

        let evicted = before - sessions.slots.len();
        if evicted > 0 {
            debug!(evicted, remaining = sessions.slots.len(), "evicted sessions");
        }
    }
}
