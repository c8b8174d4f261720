use std::collections::HashSet;

use parking_lot::RwLock;

use crate::traits::liveness::LivenessProbe;

/// Set of client tokens with a live connection.
///
/// Front ends call [`connect`](Self::connect) when a client attaches and
/// [`disconnect`](Self::disconnect) when it goes away; supervisors observe the
/// change on their next tick.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    tokens: RwLock<HashSet<String>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, token: impl Into<String>) {
        let token = token.into();
        log::debug!("Client {} connected", token);
        self.tokens.write().insert(token);
    }

    /// Returns `false` if `token` was not connected.
    pub fn disconnect(&self, token: &str) -> bool {
        let removed = self.tokens.write().remove(token);
        if removed {
            log::debug!("Client {} disconnected", token);
        }
        removed
    }

    pub fn connected_count(&self) -> usize {
        self.tokens.read().len()
    }
}

impl LivenessProbe for ConnectionRegistry {
    fn is_connected(&self, token: &str) -> bool {
        self.tokens.read().contains(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_connections() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.is_connected("a"));

        registry.connect("a");
        registry.connect("b");
        assert!(registry.is_connected("a"));
        assert_eq!(registry.connected_count(), 2);

        assert!(registry.disconnect("a"));
        assert!(!registry.disconnect("a"));
        assert!(!registry.is_connected("a"));
        assert!(registry.is_connected("b"));
    }
}
