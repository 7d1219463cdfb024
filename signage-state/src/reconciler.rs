//! Deciding whether incoming playlist state replaces what a display holds
//!
//! Every candidate, whether pushed, polled or read back from the cache, goes
//! through [`reconcile`]. The comparison is structural: two playlists built
//! from separate payloads are equal when their id and every positional item
//! match, so a heartbeat-style resend of unchanged state is a no-op.

use signage_model::{Playlist, PlaylistPayload, StaleDataError};

/// Playlist state held by a display
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HeldPlaylist {
    /// Nothing has been received yet
    #[default]
    Uninitialized,
    /// The server says no playlist is assigned
    Empty,
    Assigned(Playlist),
}

impl HeldPlaylist {
    pub fn playlist(&self) -> Option<&Playlist> {
        match self {
            HeldPlaylist::Assigned(playlist) => Some(playlist),
            _ => None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(self, HeldPlaylist::Uninitialized)
    }
}

impl From<Option<Playlist>> for HeldPlaylist {
    fn from(playlist: Option<Playlist>) -> Self {
        match playlist {
            Some(playlist) => HeldPlaylist::Assigned(playlist),
            None => HeldPlaylist::Empty,
        }
    }
}

/// Outcome of reconciling one candidate
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub apply: bool,
    /// The candidate after normalization; `None` means "no playlist assigned"
    pub normalized: Option<Playlist>,
    /// Repairs normalization had to make
    pub repairs: Vec<StaleDataError>,
}

/// Decide whether `candidate` should replace `held`.
///
/// A `None` candidate is the explicit "no playlist assigned" state and is
/// always applied. Otherwise the candidate is applied when `force` is set,
/// when nothing is held yet, or when it differs structurally from `held`.
pub fn reconcile(held: &HeldPlaylist, candidate: Option<PlaylistPayload>, force: bool) -> Decision {
    let Some(candidate) = candidate else {
        return Decision {
            apply: true,
            normalized: None,
            repairs: Vec::new(),
        };
    };

    let (normalized, repairs) = candidate.normalize();
    let apply = force
        || match held {
            HeldPlaylist::Assigned(current) => !current.same_structure(&normalized),
            HeldPlaylist::Uninitialized | HeldPlaylist::Empty => true,
        };

    Decision {
        apply,
        normalized: Some(normalized),
        repairs,
    }
}

/// How far a polled playlist has drifted from the held one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drift {
    Unchanged,
    /// Same playlist and item count; item content changed
    InPlace,
    /// A different playlist with the same item count, or a change between
    /// "none assigned" and an empty playlist
    Replace,
    /// The item count changed, whatever the playlist
    Hard,
}

/// Classify the difference between `held` and a normalized candidate.
///
/// "None assigned" counts as zero items, so gaining or losing the only
/// playlist is count drift too. Nothing held yet is never drift.
pub fn classify_drift(held: &HeldPlaylist, candidate: Option<&Playlist>) -> Drift {
    let held_len = match held {
        HeldPlaylist::Uninitialized => return Drift::Replace,
        HeldPlaylist::Empty => 0,
        HeldPlaylist::Assigned(current) => current.len(),
    };
    if held_len != candidate.map_or(0, Playlist::len) {
        return Drift::Hard;
    }

    match (held, candidate) {
        (HeldPlaylist::Assigned(current), Some(candidate)) => {
            if current.id != candidate.id {
                Drift::Replace
            } else if current.same_structure(candidate) {
                Drift::Unchanged
            } else {
                Drift::InPlace
            }
        }
        (HeldPlaylist::Empty, None) => Drift::Unchanged,
        _ => Drift::Replace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use signage_model::{ContentRef, PlaylistItem, Transition, TransitionKind};

    fn item(id: &str, duration: u32) -> PlaylistItem {
        PlaylistItem::new(id, ContentRef::image(format!("c-{id}"), format!("{id}.png")), duration)
    }

    fn playlist(id: &str, items: Vec<PlaylistItem>) -> Playlist {
        let items = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| item.with_position(i as u32))
            .collect();
        Playlist::new(id, items)
    }

    fn three() -> Playlist {
        playlist("p1", vec![item("a", 5), item("b", 5), item("c", 5)])
    }

    fn payload(p: &Playlist) -> Option<PlaylistPayload> {
        Some(PlaylistPayload::from(p))
    }

    #[test]
    fn test_none_always_applies() {
        for held in [
            HeldPlaylist::Uninitialized,
            HeldPlaylist::Empty,
            HeldPlaylist::Assigned(three()),
        ] {
            let decision = reconcile(&held, None, false);
            assert!(decision.apply);
            assert_eq!(decision.normalized, None);
        }
    }

    #[test]
    fn test_first_candidate_applies() {
        let decision = reconcile(&HeldPlaylist::Uninitialized, payload(&three()), false);
        assert!(decision.apply);
        assert_eq!(decision.normalized, Some(three()));
    }

    #[test]
    fn test_identical_structure_from_distinct_instances_is_ignored() {
        let held = HeldPlaylist::Assigned(three());
        let rebuilt = three();
        let decision = reconcile(&held, payload(&rebuilt), false);
        assert!(!decision.apply);
    }

    #[test]
    fn test_force_applies_identical() {
        let held = HeldPlaylist::Assigned(three());
        assert!(reconcile(&held, payload(&three()), true).apply);
    }

    #[rstest]
    #[case::duration(|p: &mut Playlist| p.items[1].duration = 9)]
    #[case::item_id(|p: &mut Playlist| p.items[1].id = "z".into())]
    #[case::content(|p: &mut Playlist| p.items[2].content = ContentRef::image("c-new", "n.png"))]
    #[case::order(|p: &mut Playlist| p.items.swap(0, 1))]
    #[case::transition_kind(|p: &mut Playlist| p.items[0].transition.kind = TransitionKind::Zoom)]
    #[case::transition_duration(|p: &mut Playlist| p.items[0].transition = Transition::new(TransitionKind::Fade, 2.0))]
    #[case::playlist_id(|p: &mut Playlist| p.id = "p2".into())]
    #[case::count(|p: &mut Playlist| { p.items.pop(); })]
    fn test_structural_change_applies(#[case] change: fn(&mut Playlist)) {
        let held = HeldPlaylist::Assigned(three());
        let mut candidate = three();
        change(&mut candidate);
        assert!(reconcile(&held, payload(&candidate), false).apply);
    }

    #[test]
    fn test_style_change_is_not_structural() {
        let held = HeldPlaylist::Assigned(three());
        let mut candidate = three();
        candidate.items[0].style.background_color = Some("#123456".into());
        assert!(!reconcile(&held, payload(&candidate), false).apply);
    }

    #[test]
    fn test_missing_items_normalized_and_reported() {
        let candidate = PlaylistPayload {
            id: "p1".into(),
            name: None,
            items: None,
        };
        let decision = reconcile(&HeldPlaylist::Assigned(three()), Some(candidate), false);
        assert!(decision.apply);
        assert_eq!(decision.normalized.map(|p| p.len()), Some(0));
        assert_eq!(decision.repairs.len(), 1);
    }

    #[test]
    fn test_drift_classification() {
        let held = HeldPlaylist::Assigned(three());

        assert_eq!(classify_drift(&held, Some(&three())), Drift::Unchanged);

        let mut patched = three();
        patched.items[1].duration = 12;
        assert_eq!(classify_drift(&held, Some(&patched)), Drift::InPlace);

        let mut other = three();
        other.id = "p2".into();
        assert_eq!(classify_drift(&held, Some(&other)), Drift::Replace);

        assert_eq!(classify_drift(&HeldPlaylist::Uninitialized, Some(&three())), Drift::Replace);
        assert_eq!(classify_drift(&HeldPlaylist::Uninitialized, None), Drift::Replace);
        assert_eq!(classify_drift(&HeldPlaylist::Empty, None), Drift::Unchanged);

        let empty = playlist("p0", vec![]);
        assert_eq!(classify_drift(&HeldPlaylist::Empty, Some(&empty)), Drift::Replace);
    }

    #[test]
    fn test_count_drift_is_hard_even_when_prefix_matches() {
        let held = HeldPlaylist::Assigned(three());
        let shorter = playlist("p1", vec![item("a", 5), item("b", 5)]);
        assert_eq!(classify_drift(&held, Some(&shorter)), Drift::Hard);
    }

    #[rstest]
    #[case::new_id(HeldPlaylist::Assigned(three()), Some(playlist("p2", vec![item("x", 5), item("y", 5)])))]
    #[case::unassigned(HeldPlaylist::Assigned(three()), None)]
    #[case::newly_assigned(HeldPlaylist::Empty, Some(three()))]
    fn test_count_drift_is_hard_whatever_the_id(
        #[case] held: HeldPlaylist,
        #[case] candidate: Option<Playlist>,
    ) {
        assert_eq!(classify_drift(&held, candidate.as_ref()), Drift::Hard);
    }
}
