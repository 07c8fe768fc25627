//! The ratings data a replica serves.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use causeway_types::{
    Item, ItemDetails, ItemId, QueryParams, Rating, RatingDistribution, RequestId,
    UpdateLogEntry, UserId, VectorClock,
};

use crate::catalog::Catalog;

/// A rating plus the log entry that wrote it. Seed ratings have no writer.
#[derive(Debug, Clone)]
struct StoredRating {
    rating: Rating,
    writer: Option<(VectorClock, RequestId)>,
}

impl StoredRating {
    fn seeded(rating: Rating) -> Self {
        Self {
            rating,
            writer: None,
        }
    }

    fn written_by(entry: &UpdateLogEntry) -> Self {
        Self {
            rating: entry.request.params.rating,
            writer: Some((entry.clock.clone(), entry.request_id())),
        }
    }

    /// True when `entry` comes after this rating's writer in application
    /// order. Any entry supersedes a seed rating.
    fn is_superseded_by(&self, entry: &UpdateLogEntry) -> bool {
        match &self.writer {
            None => true,
            Some((clock, id)) => {
                let order = clock
                    .cmp_lexicographic(&entry.clock)
                    .then_with(|| id.cmp(&entry.request_id()));
                order == Ordering::Less
            }
        }
    }
}

/// Items, per-user ratings, and the ids of every mutation applied so far.
///
/// Mutations enter only through [`ReplicaStore::apply_mutation`], which the
/// replica calls from its stabilization loop. Each `(item, user)` rating is
/// last-writer-wins over the application order of log entries, so replicas
/// that apply the same set of entries hold the same ratings whatever order
/// the entries arrived in.
#[derive(Debug, Clone, Default)]
pub struct ReplicaStore {
    items: HashMap<ItemId, Item>,
    ratings: HashMap<ItemId, HashMap<UserId, StoredRating>>,
    executed: HashSet<RequestId>,
}

impl ReplicaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded from a loaded catalog.
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut store = Self::new();
        store.load(
            catalog.items.iter().cloned(),
            catalog.ratings.iter().copied(),
        );
        store
    }

    /// Seeds item metadata and initial ratings.
    ///
    /// Seed ratings are not mutations: they carry no request id and are not
    /// recorded as executed.
    pub fn load(
        &mut self,
        items: impl IntoIterator<Item = Item>,
        ratings: impl IntoIterator<Item = (UserId, ItemId, Rating)>,
    ) {
        for item in items {
            self.items.insert(item.id, item);
        }
        for (user, item, rating) in ratings {
            self.ratings
                .entry(item)
                .or_default()
                .insert(user, StoredRating::seeded(rating));
        }
    }

    /// Applies `entry` unless its request id was already applied.
    ///
    /// The carried rating is written only if `entry` sorts after the writer
    /// of the current rating. Returns whether the entry was newly executed.
    pub fn apply_mutation(&mut self, entry: &UpdateLogEntry) -> bool {
        if !self.executed.insert(entry.request_id()) {
            return false;
        }
        let params = entry.request.params;
        match self.ratings.entry(params.item).or_default().entry(params.user) {
            Entry::Vacant(slot) => {
                slot.insert(StoredRating::written_by(entry));
            }
            Entry::Occupied(mut slot) => {
                if slot.get().is_superseded_by(entry) {
                    slot.insert(StoredRating::written_by(entry));
                } else {
                    tracing::trace!(
                        request = %entry.request_id(),
                        item = %params.item,
                        user = %params.user,
                        "rating already written by a later entry"
                    );
                }
            }
        }
        true
    }

    pub fn has_executed(&self, id: RequestId) -> bool {
        self.executed.contains(&id)
    }

    /// Number of mutations applied.
    pub fn executed_count(&self) -> usize {
        self.executed.len()
    }

    pub fn has_rating(&self, item: ItemId, user: UserId) -> bool {
        self.rating(item, user).is_some()
    }

    pub fn rating(&self, item: ItemId, user: UserId) -> Option<Rating> {
        self.ratings
            .get(&item)
            .and_then(|by_user| by_user.get(&user))
            .map(|stored| stored.rating)
    }

    /// Metadata, rating distribution and the asking user's own rating.
    pub fn query(&self, params: &QueryParams) -> ItemDetails {
        let by_user = self.ratings.get(&params.item);

        ItemDetails {
            item: self.items.get(&params.item).cloned(),
            distribution: by_user
                .map(|ratings| {
                    RatingDistribution::from_ratings(ratings.values().map(|stored| stored.rating))
                })
                .unwrap_or_default(),
            user_rating: params.user.and_then(|user| {
                by_user
                    .and_then(|ratings| ratings.get(&user))
                    .map(|stored| stored.rating)
            }),
        }
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}
