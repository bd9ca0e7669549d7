use log::{debug, info};

/// Playback authority assigned by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// No HELLO received yet
    Unknown,
    /// This client drives playback and announces state changes
    Master,
    /// This client mirrors broadcast state
    Guest,
}

impl std::fmt::Display for Authority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Authority::Unknown => write!(f, "unknown"),
            Authority::Master => write!(f, "master"),
            Authority::Guest => write!(f, "guest"),
        }
    }
}

/// Session role as assigned by the server's HELLO, plus the guest-only
/// opt-out from following remote state.
///
/// A repeated HELLO overwrites the role; the server is trusted not to flip
/// roles mid-session, and if it does anyway the engine follows along.
pub struct SessionRole {
    authority: Authority,
    listen_following: bool,
}

impl SessionRole {
    pub fn new() -> Self {
        Self {
            authority: Authority::Unknown,
            listen_following: true,
        }
    }

    /// Apply a HELLO's authority string. Anything other than "master" makes
    /// this client a guest; guests start out following remote state.
    pub fn on_hello(&mut self, authority: &str) {
        self.authority = if authority == "master" {
            Authority::Master
        } else {
            Authority::Guest
        };
        if self.authority == Authority::Guest {
            self.listen_following = true;
        }
        info!("session role assigned: {}", self.authority);
    }

    /// Toggle whether a guest applies broadcast state. No-op for masters.
    pub fn toggle_listen(&mut self) {
        if self.authority == Authority::Guest {
            self.listen_following = !self.listen_following;
            debug!("guest listen-following set to {}", self.listen_following);
        }
    }

    pub fn authority(&self) -> Authority {
        self.authority
    }

    pub fn is_master(&self) -> bool {
        self.authority == Authority::Master
    }

    /// Whether broadcast STATE should be applied locally. Only a guest that
    /// opted out ignores it; masters and unassigned clients apply.
    pub fn follows_remote_state(&self) -> bool {
        !(self.authority == Authority::Guest && !self.listen_following)
    }
}

impl Default for SessionRole {
    fn default() -> Self {
        Self::new()
    }
}
