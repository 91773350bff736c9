//! The deployable services and their per-service defaults.

use std::fmt;

/// One independently deployable HTTP service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Auth,
    User,
    Media,
    Match,
    Communication,
    Notification,
    Search,
}

impl Service {
    pub const ALL: [Service; 7] = [
        Service::Auth,
        Service::User,
        Service::Media,
        Service::Match,
        Service::Communication,
        Service::Notification,
        Service::Search,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::User => "user",
            Self::Media => "media",
            Self::Match => "match",
            Self::Communication => "communication",
            Self::Notification => "notification",
            Self::Search => "search",
        }
    }

    /// Port used when `PORT` is unset.
    pub fn default_port(self) -> u16 {
        match self {
            Self::Auth => 3000,
            Self::User => 3001,
            Self::Media => 3002,
            Self::Match => 3003,
            Self::Communication => 3004,
            Self::Notification => 3005,
            Self::Search => 3008,
        }
    }

    /// Whether the fixed-window limiter is on when `RATE_LIMIT_ENABLED` is unset.
    pub fn rate_limited_by_default(self) -> bool {
        matches!(self, Self::Auth | Self::Communication)
    }

    /// Whether handlers of this service publish domain events that must be
    /// turned into notifications.
    pub fn publishes_events(self) -> bool {
        matches!(self, Self::Match | Self::Communication)
    }

    /// Whether the service accepts WebSocket connections.
    pub fn serves_websockets(self) -> bool {
        self == Self::Communication
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn ports_are_unique() {
        let ports: HashSet<u16> = Service::ALL.iter().map(|s| s.default_port()).collect();
        assert_eq!(ports.len(), Service::ALL.len());
    }

    #[test]
    fn seeded_ports_are_kept() {
        assert_eq!(Service::Auth.default_port(), 3000);
        assert_eq!(Service::User.default_port(), 3001);
        assert_eq!(Service::Communication.default_port(), 3004);
        assert_eq!(Service::Search.default_port(), 3008);
    }

    #[test]
    fn communication_is_rate_limited_by_default() {
        assert!(Service::Communication.rate_limited_by_default());
        assert!(!Service::Search.rate_limited_by_default());
    }
}
