//! Presence: which channel currently speaks for each user.
//!
//! One mutex guards both directions of the mapping so they never disagree.
//! The newest registration for a user wins; the superseded channel is
//! forgotten, so its later disconnect finds nothing to remove and emits no
//! offline transition.

use std::collections::HashMap;

use kaab_core::events::{PresenceChange, PresenceStatus};
use kaab_core::{ChannelId, UserId};
use parking_lot::Mutex;
use tracing::debug;

#[derive(Default)]
struct Maps {
    by_user: HashMap<UserId, ChannelId>,
    by_channel: HashMap<ChannelId, UserId>,
}

/// Live user-to-channel mapping.
#[derive(Default)]
pub struct ConnectionRegistry {
    maps: Mutex<Maps>,
}

impl ConnectionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `channel` the authoritative channel of `user`.
    ///
    /// Any previous channel of `user` is superseded without being closed. If
    /// `channel` was bound to another user, that binding is dropped. Always
    /// reports `user` as online.
    pub fn register(&self, user: &UserId, channel: &ChannelId) -> PresenceChange {
        let mut maps = self.maps.lock();

        if let Some(previous_user) = maps.by_channel.insert(channel.clone(), user.clone()) {
            if &previous_user != user && maps.by_user.get(&previous_user) == Some(channel) {
                let _ = maps.by_user.remove(&previous_user);
            }
        }
        if let Some(superseded) = maps.by_user.insert(user.clone(), channel.clone()) {
            if &superseded != channel {
                let _ = maps.by_channel.remove(&superseded);
                debug!(user_id = %user, superseded = %superseded, channel_id = %channel, "channel superseded");
            }
        }
        drop(maps);

        metrics::counter!("presence_changes_total", "status" => "online").increment(1);
        PresenceChange {
            user_id: user.clone(),
            status: PresenceStatus::Online,
        }
    }

    /// Forget `channel`. Reports the user offline only if `channel` was still
    /// that user's authoritative channel.
    pub fn unregister(&self, channel: &ChannelId) -> Option<PresenceChange> {
        let mut maps = self.maps.lock();
        let user = maps.by_channel.remove(channel)?;
        if maps.by_user.get(&user) != Some(channel) {
            return None;
        }
        let _ = maps.by_user.remove(&user);
        drop(maps);

        metrics::counter!("presence_changes_total", "status" => "offline").increment(1);
        Some(PresenceChange {
            user_id: user,
            status: PresenceStatus::Offline,
        })
    }

    /// Current channel of `user`.
    pub fn lookup(&self, user: &UserId) -> Option<ChannelId> {
        self.maps.lock().by_user.get(user).cloned()
    }

    /// Number of users online.
    pub fn online_count(&self) -> usize {
        self.maps.lock().by_user.len()
    }

    /// Users currently online, unordered.
    pub fn online_users(&self) -> Vec<UserId> {
        self.maps.lock().by_user.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (UserId, ChannelId, ChannelId) {
        (
            UserId::from_raw("u1"),
            ChannelId::from_raw("conn_a"),
            ChannelId::from_raw("conn_b"),
        )
    }

    #[test]
    fn register_then_lookup() {
        let reg = ConnectionRegistry::new();
        let (u, c1, _) = ids();
        let change = reg.register(&u, &c1);
        assert_eq!(change.status, PresenceStatus::Online);
        assert_eq!(reg.lookup(&u), Some(c1));
        assert_eq!(reg.online_count(), 1);
    }

    #[test]
    fn last_registration_wins_and_stale_unregister_is_noop() {
        let reg = ConnectionRegistry::new();
        let (u, c1, c2) = ids();
        let _ = reg.register(&u, &c1);
        let _ = reg.register(&u, &c2);
        assert_eq!(reg.lookup(&u), Some(c2.clone()));

        assert!(reg.unregister(&c1).is_none());
        assert_eq!(reg.lookup(&u), Some(c2));
        assert_eq!(reg.online_count(), 1);
    }

    #[test]
    fn unregister_current_channel_goes_offline_once() {
        let reg = ConnectionRegistry::new();
        let (u, c1, _) = ids();
        let _ = reg.register(&u, &c1);

        let change = reg.unregister(&c1).unwrap();
        assert_eq!(change.user_id, u);
        assert_eq!(change.status, PresenceStatus::Offline);
        assert!(reg.lookup(&u).is_none());
        assert!(reg.unregister(&c1).is_none());
    }

    #[test]
    fn unregister_unknown_channel_is_noop() {
        let reg = ConnectionRegistry::new();
        assert!(reg.unregister(&ChannelId::from_raw("conn_x")).is_none());
    }

    #[test]
    fn register_same_pair_twice_is_idempotent() {
        let reg = ConnectionRegistry::new();
        let (u, c1, _) = ids();
        let _ = reg.register(&u, &c1);
        let _ = reg.register(&u, &c1);
        assert_eq!(reg.online_count(), 1);
        assert!(reg.unregister(&c1).is_some());
        assert_eq!(reg.online_count(), 0);
    }

    #[test]
    fn rebinding_a_channel_releases_the_previous_user() {
        let reg = ConnectionRegistry::new();
        let (u1, c1, _) = ids();
        let u2 = UserId::from_raw("u2");
        let _ = reg.register(&u1, &c1);
        let _ = reg.register(&u2, &c1);

        assert!(reg.lookup(&u1).is_none());
        assert_eq!(reg.lookup(&u2), Some(c1.clone()));
        assert_eq!(reg.unregister(&c1).unwrap().user_id, u2);
    }

    #[test]
    fn supersede_then_reconnect_cycle() {
        let reg = ConnectionRegistry::new();
        let (u, c1, c2) = ids();
        let _ = reg.register(&u, &c1);
        let _ = reg.register(&u, &c2);
        assert!(reg.unregister(&c1).is_none());
        assert!(reg.unregister(&c2).is_some());
        assert!(reg.online_users().is_empty());
    }
}
