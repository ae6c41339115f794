//! The aggregated list of reactions shown beneath a message tile.

use std::cmp::Ordering;

use indexmap::IndexMap;

use super::entry::{AnnotationInfo, PendingAnnotation};

/// One reaction key on a message, merging its confirmed and pending state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionViewModel {
    key: String,
    confirmed: Option<AnnotationInfo>,
    pending: Option<PendingAnnotation>,
}

impl ReactionViewModel {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The number of reactions to display, including ones still being sent
    /// and excluding ones whose redaction is being sent.
    pub fn count(&self) -> i64 {
        let confirmed = self.confirmed.as_ref().map_or(0, |a| i64::from(a.count));
        let pending = self.pending.as_ref().map_or(0, |p| i64::from(p.count));
        confirmed + pending
    }

    /// Whether some local change to this reaction hasn't been confirmed yet.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn have_reacted(&self) -> bool {
        let me = self.confirmed.as_ref().is_some_and(|a| a.me);
        // A queued change always wins over the confirmed state.
        match &self.pending {
            Some(pending) => pending.will_annotate(),
            None => me,
        }
    }

    /// Whether the reaction button should be highlighted as the user's own.
    pub fn is_active(&self) -> bool {
        self.have_reacted() && !self.pending.as_ref().is_some_and(|p| p.redaction_entry.is_some())
    }

    fn first_timestamp(&self) -> u64 {
        self.confirmed.as_ref()
            .and_then(|a| a.first_timestamp)
            .map_or(u64::MAX, |ts| u64::from(ts.get()))
    }

    fn display_order(&self, other: &Self) -> Ordering {
        other.count().cmp(&self.count())
            .then_with(|| self.first_timestamp().cmp(&other.first_timestamp()))
            .then_with(|| self.key.cmp(&other.key))
    }
}

/// The reactions of one message.
///
/// Owned exclusively by its tile. [`ReactionsViewModel::update`] is idempotent,
/// so it's safe to call whenever the entry reports an annotation change.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReactionsViewModel {
    reactions: IndexMap<String, ReactionViewModel>,
}

impl ReactionsViewModel {
    /// Merges the given confirmed and pending annotations into this list.
    ///
    /// Returns `true` if anything visible changed.
    pub fn update(
        &mut self,
        confirmed: Option<&IndexMap<String, AnnotationInfo>>,
        pending: Option<&IndexMap<String, PendingAnnotation>>,
    ) -> bool {
        let mut reactions = IndexMap::new();
        for (key, annotation) in confirmed.into_iter().flatten() {
            reactions.insert(key.clone(), ReactionViewModel {
                key: key.clone(),
                confirmed: Some(annotation.clone()),
                pending: None,
            });
        }
        for (key, pending_annotation) in pending.into_iter().flatten() {
            reactions.entry(key.clone())
                .or_insert_with(|| ReactionViewModel {
                    key: key.clone(),
                    confirmed: None,
                    pending: None,
                })
                .pending = Some(pending_annotation.clone());
        }
        if reactions == self.reactions {
            return false;
        }
        self.reactions = reactions;
        true
    }

    /// The reactions to display, most popular first.
    pub fn reactions(&self) -> Vec<&ReactionViewModel> {
        let mut visible: Vec<_> = self.reactions.values()
            .filter(|r| r.count() > 0)
            .collect();
        visible.sort_by(|a, b| a.display_order(b));
        visible
    }

    pub fn get(&self, key: &str) -> Option<&ReactionViewModel> {
        self.reactions.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.reactions().is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::entry::test_entries::annotation;

    fn pending(count: i32) -> PendingAnnotation {
        PendingAnnotation { count, annotation_entry: None, redaction_entry: None }
    }

    #[test]
    fn update_is_idempotent() {
        let confirmed = IndexMap::from([("👍".to_owned(), annotation(2, false, 10))]);
        let mut reactions = ReactionsViewModel::default();
        assert!(reactions.update(Some(&confirmed), None));
        assert!(!reactions.update(Some(&confirmed), None));
    }

    #[test]
    fn orders_by_count_then_first_timestamp() {
        let confirmed = IndexMap::from([
            ("a".to_owned(), annotation(1, false, 30)),
            ("b".to_owned(), annotation(3, false, 50)),
            ("c".to_owned(), annotation(1, false, 20)),
        ]);
        let pending_map = IndexMap::from([("d".to_owned(), pending(1))]);
        let mut reactions = ReactionsViewModel::default();
        reactions.update(Some(&confirmed), Some(&pending_map));
        let keys: Vec<_> = reactions.reactions().iter().map(|r| r.key()).collect();
        assert_eq!(keys, ["b", "c", "a", "d"]);
    }

    #[test]
    fn pending_redaction_hides_last_reaction() {
        let confirmed = IndexMap::from([("👍".to_owned(), annotation(1, true, 10))]);
        let pending_map = IndexMap::from([("👍".to_owned(), pending(-1))]);
        let mut reactions = ReactionsViewModel::default();
        reactions.update(Some(&confirmed), Some(&pending_map));
        assert!(reactions.is_empty());
        let reaction = reactions.get("👍").unwrap();
        assert!(reaction.is_pending());
        assert!(!reaction.have_reacted());
    }

    #[test]
    fn pending_reaction_adds_to_confirmed_count() {
        let confirmed = IndexMap::from([("🎉".to_owned(), annotation(2, false, 10))]);
        let pending_map = IndexMap::from([("🎉".to_owned(), pending(1))]);
        let mut reactions = ReactionsViewModel::default();
        reactions.update(Some(&confirmed), Some(&pending_map));
        let reaction = reactions.get("🎉").unwrap();
        assert_eq!(reaction.count(), 3);
        assert!(reaction.have_reacted());
        assert!(reaction.is_active());
    }
}
