use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use meetopia_types::models::{Match, MatchRequest};

/// How long a queued request, or an unclaimed match, is kept.
pub const MATCH_TTL: Duration = Duration::seconds(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Paired with someone from the queue just now.
    Paired(Match),
    /// Picked up a match made for this user while they were waiting.
    Claimed(Match),
    Waiting,
}

#[derive(Default)]
struct MatchQueue {
    /// Oldest request at the front.
    waiting: VecDeque<MatchRequest>,
    /// Matches made while the user was waiting, keyed by that user.
    ready: HashMap<Uuid, (Match, DateTime<Utc>)>,
}

impl MatchQueue {
    fn prune(&mut self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let before = self.waiting.len() + self.ready.len();
        self.waiting.retain(|req| now - req.requested_at < ttl);
        self.ready.retain(|_, (_, made_at)| now - *made_at < ttl);
        before - (self.waiting.len() + self.ready.len())
    }

    /// Queue index of the best partner for `interests`: most shared
    /// interests first, then longest waiting.
    fn best_candidate(&self, user_id: Uuid, interests: &HashSet<String>) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (idx, req) in self.waiting.iter().enumerate() {
            if req.user_id == user_id {
                continue;
            }
            let shared = req
                .interests
                .iter()
                .filter(|i| interests.contains(*i))
                .count();
            if best.is_none_or(|(_, top)| shared > top) {
                best = Some((idx, shared));
            }
        }
        best.map(|(idx, _)| idx)
    }
}

/// In-memory random-chat queue. Pairs users, preferring shared interests.
#[derive(Clone)]
pub struct Matchmaker {
    inner: Arc<Mutex<MatchQueue>>,
    ttl: Duration,
}

impl Default for Matchmaker {
    fn default() -> Self {
        Self::new(MATCH_TTL)
    }
}

impl Matchmaker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MatchQueue::default())),
            ttl,
        }
    }

    /// Ask for a partner. `interests` must already be normalized.
    ///
    /// A match made for this user while they waited is returned first. A user
    /// already in the queue just has their interests refreshed.
    pub fn request(&self, user_id: Uuid, interests: Vec<String>, now: DateTime<Utc>) -> MatchOutcome {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        queue.prune(now, self.ttl);

        if let Some((found, _)) = queue.ready.remove(&user_id) {
            return MatchOutcome::Claimed(found);
        }

        if let Some(existing) = queue.waiting.iter_mut().find(|req| req.user_id == user_id) {
            existing.interests = interests;
            existing.requested_at = now;
            return MatchOutcome::Waiting;
        }

        let wanted: HashSet<String> = interests.iter().cloned().collect();
        let Some(idx) = queue.best_candidate(user_id, &wanted) else {
            debug!("{} queued for matching", user_id);
            queue.waiting.push_back(MatchRequest {
                user_id,
                interests,
                requested_at: now,
            });
            return MatchOutcome::Waiting;
        };

        let Some(partner) = queue.waiting.remove(idx) else {
            return MatchOutcome::Waiting;
        };

        let mut common: Vec<String> = partner
            .interests
            .iter()
            .filter(|i| wanted.contains(*i))
            .cloned()
            .collect();
        common.sort();

        let found = Match {
            room_id: Uuid::new_v4().to_string(),
            user_ids: [partner.user_id, user_id],
            common_interests: common,
        };
        info!(
            "Matched {} with {} in room {} ({} shared interests)",
            partner.user_id,
            user_id,
            found.room_id,
            found.common_interests.len()
        );

        queue.ready.insert(partner.user_id, (found.clone(), now));
        MatchOutcome::Paired(found)
    }

    /// Hand out a pending match without going through the queue. Used once
    /// the waiting side was told over its socket.
    pub fn take_ready(&self, user_id: Uuid) -> Option<Match> {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        queue.ready.remove(&user_id).map(|(found, _)| found)
    }

    /// Leave the queue, dropping any unclaimed match too.
    /// Returns false if the user had neither.
    pub fn cancel(&self, user_id: Uuid) -> bool {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let before = queue.waiting.len();
        queue.waiting.retain(|req| req.user_id != user_id);
        let dropped_ready = queue.ready.remove(&user_id).is_some();
        queue.waiting.len() != before || dropped_ready
    }

    /// Drop stale requests and unclaimed matches. Returns how many were dropped.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        queue.prune(now, self.ttl)
    }

    pub fn waiting_count(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).waiting.len()
    }
}
