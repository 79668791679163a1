//! Delivery and read state computation for outgoing messages.
//!
//! Pure functions over the room and presence facts gathered by the caller.

use std::collections::{BTreeSet, HashSet};

use crate::domain::entities::Room;

/// Recipient sets of a message at send time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientState {
    pub to: BTreeSet<i64>,
    pub delivered_to: BTreeSet<i64>,
    pub read_by: BTreeSet<i64>,
}

impl RecipientState {
    /// Members whose unread counter must grow: recipients not viewing the room.
    pub fn unread_targets(&self) -> Vec<i64> {
        self.to.difference(&self.read_by).copied().collect()
    }
}

/// Compute `to`, `delivered_to` and `read_by` for a message sent by `from`.
///
/// - `to` is every member except the sender
/// - `read_by` is the recipients currently viewing the room
/// - `delivered_to` is the online recipients plus `read_by`, so
///   `read_by ⊆ delivered_to ⊆ to` always holds
pub fn recipient_state(room: &Room, from: i64, online: &HashSet<i64>, viewing: &HashSet<i64>) -> RecipientState {
    let to: BTreeSet<i64> = room.members.iter().map(|m| m.user_id).filter(|id| *id != from).collect();

    let read_by: BTreeSet<i64> = to.iter().copied().filter(|id| viewing.contains(id)).collect();

    let delivered_to: BTreeSet<i64> = to
        .iter()
        .copied()
        .filter(|id| online.contains(id) || read_by.contains(id))
        .collect();

    RecipientState {
        to,
        delivered_to,
        read_by,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{NewRoom, RoomReference};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn room(members: &[i64]) -> Room {
        NewRoom {
            id: 1,
            reference: RoomReference::Group,
            member_ids: members.to_vec(),
            created_at: Utc::now(),
        }
        .into_room()
    }

    fn set(ids: &[i64]) -> HashSet<i64> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_sender_is_never_a_recipient() {
        let state = recipient_state(&room(&[1, 2, 3]), 1, &set(&[1, 2, 3]), &set(&[1]));
        assert_eq!(state.to, BTreeSet::from([2, 3]));
        assert_eq!(state.delivered_to, BTreeSet::from([2, 3]));
        assert!(state.read_by.is_empty());
    }

    #[test]
    fn test_offline_recipient_is_only_addressed() {
        let state = recipient_state(&room(&[1, 2]), 1, &HashSet::new(), &HashSet::new());
        assert_eq!(state.to, BTreeSet::from([2]));
        assert!(state.delivered_to.is_empty());
        assert_eq!(state.unread_targets(), vec![2]);
    }

    #[test]
    fn test_viewer_is_read_and_delivered_without_unread() {
        // Viewing implies a live connection even if presence lags behind.
        let state = recipient_state(&room(&[1, 2, 3]), 1, &set(&[3]), &set(&[2]));
        assert_eq!(state.read_by, BTreeSet::from([2]));
        assert_eq!(state.delivered_to, BTreeSet::from([2, 3]));
        assert_eq!(state.unread_targets(), vec![3]);
    }

    #[test]
    fn test_non_members_are_ignored() {
        let state = recipient_state(&room(&[1, 2]), 1, &set(&[9]), &set(&[9]));
        assert!(state.delivered_to.is_subset(&state.to));
        assert!(state.read_by.is_subset(&state.delivered_to));
        assert!(state.read_by.is_empty());
    }
}
