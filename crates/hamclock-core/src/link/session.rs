use core::sync::atomic::{AtomicU32, Ordering};

/// Socket-side state of one peer session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Connecting = 1,
    Open = 2,
    Failed = 3,
    /// The peer or the network ended an open session.
    Closed = 4,
}

impl SessionState {
    const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Connecting,
            2 => Self::Open,
            3 => Self::Failed,
            4 => Self::Closed,
            _ => Self::Idle,
        }
    }
}

const STATE_BITS: u32 = 8;
const ATTEMPT_MASK: u32 = u32::MAX >> STATE_BITS;

const fn pack(attempt: u32, state: SessionState) -> u32 {
    ((attempt & ATTEMPT_MASK) << STATE_BITS) | state as u32
}

const fn unpack(word: u32) -> (u32, SessionState) {
    (word >> STATE_BITS, SessionState::from_raw(word as u8))
}

/// Session state tagged with the id of the connect attempt that owns it.
///
/// The scheduler starts and abandons attempts; a socket task may only move
/// the state of the attempt it was handed. A late result from an abandoned
/// attempt therefore cannot mark a newer one as open or failed.
#[derive(Debug)]
pub struct SessionCell {
    word: AtomicU32,
}

impl SessionCell {
    pub const fn new() -> Self {
        Self {
            word: AtomicU32::new(pack(0, SessionState::Idle)),
        }
    }

    pub fn load(&self) -> (u32, SessionState) {
        unpack(self.word.load(Ordering::Acquire))
    }

    pub fn state(&self) -> SessionState {
        self.load().1
    }

    pub fn is_current(&self, attempt: u32) -> bool {
        self.load().0 == attempt & ATTEMPT_MASK
    }

    /// Starts a new attempt in `Connecting` and returns its id.
    pub fn begin(&self) -> u32 {
        self.bump(SessionState::Connecting)
    }

    /// Abandons whatever attempt is current.
    pub fn reset(&self) {
        self.bump(SessionState::Idle);
    }

    /// Moves `attempt` from `from` to `to`; false if the attempt is stale or
    /// the state moved meanwhile.
    pub fn advance(&self, attempt: u32, from: SessionState, to: SessionState) -> bool {
        self.word
            .compare_exchange(
                pack(attempt, from),
                pack(attempt, to),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn bump(&self, state: SessionState) -> u32 {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            let attempt = ((current >> STATE_BITS).wrapping_add(1)) & ATTEMPT_MASK;
            match self.word.compare_exchange_weak(
                current,
                pack(attempt, state),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return attempt,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for SessionCell {
    fn default() -> Self {
        Self::new()
    }
}
