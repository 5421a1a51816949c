//! Per-report vote bookkeeping for the current session.

use crate::models::UserVoteStatus;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteKind {
    /// "I see this too"
    Sighting,
    /// "This has been fixed"
    Resolved,
}

impl VoteKind {
    pub fn endpoint(&self) -> &'static str {
        match self {
            VoteKind::Sighting => "sightings",
            VoteKind::Resolved => "resolved",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportActionState {
    /// A vote request for this report is in flight.
    pub loading: bool,
    pub sighting_voted: bool,
    pub resolved_voted: bool,
}

impl ReportActionState {
    pub fn has_voted(&self, kind: VoteKind) -> bool {
        match kind {
            VoteKind::Sighting => self.sighting_voted,
            VoteKind::Resolved => self.resolved_voted,
        }
    }

    fn mark_voted(&mut self, kind: VoteKind) {
        match kind {
            VoteKind::Sighting => self.sighting_voted = true,
            VoteKind::Resolved => self.resolved_voted = true,
        }
    }
}

/// Tracks which votes this user has cast, so each goes out at most once.
#[derive(Debug, Default)]
pub struct VoteTracker {
    states: HashMap<String, ReportActionState>,
}

impl VoteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, report_id: &str) -> ReportActionState {
        self.states.get(report_id).copied().unwrap_or_default()
    }

    /// Claims the right to send `kind` for `report_id`.
    ///
    /// Returns `false` while another vote on the report is in flight or when
    /// this vote already succeeded; the caller must not send anything then.
    pub fn try_begin(&mut self, report_id: &str, kind: VoteKind) -> bool {
        let state = self.states.entry(report_id.to_string()).or_default();
        if state.loading || state.has_voted(kind) {
            return false;
        }
        state.loading = true;
        true
    }

    /// Releases the in-flight flag. A successful vote is remembered for the session.
    pub fn finish(&mut self, report_id: &str, kind: VoteKind, succeeded: bool) {
        let state = self.states.entry(report_id.to_string()).or_default();
        state.loading = false;
        if succeeded {
            state.mark_voted(kind);
        }
    }

    /// Merges what the backend knows about this user's earlier votes.
    /// Local knowledge of a vote is never cleared by it.
    pub fn apply_user_status(&mut self, report_id: &str, status: UserVoteStatus) {
        let state = self.states.entry(report_id.to_string()).or_default();
        state.sighting_voted |= status.has_sighting_click;
        state.resolved_voted |= status.has_resolved_click;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_resolved_vote_is_a_no_op() {
        let mut tracker = VoteTracker::new();

        assert!(tracker.try_begin("7", VoteKind::Resolved));
        tracker.finish("7", VoteKind::Resolved, true);

        assert!(!tracker.try_begin("7", VoteKind::Resolved));
        assert!(tracker.state("7").resolved_voted);
        assert!(!tracker.state("7").loading);
    }

    #[test]
    fn in_flight_vote_blocks_duplicates() {
        let mut tracker = VoteTracker::new();

        assert!(tracker.try_begin("7", VoteKind::Sighting));
        assert!(!tracker.try_begin("7", VoteKind::Sighting));
        assert!(!tracker.try_begin("7", VoteKind::Resolved));
        assert!(tracker.try_begin("8", VoteKind::Sighting));
    }

    #[test]
    fn failed_vote_can_be_retried() {
        let mut tracker = VoteTracker::new();

        assert!(tracker.try_begin("7", VoteKind::Sighting));
        tracker.finish("7", VoteKind::Sighting, false);

        assert_eq!(tracker.state("7"), ReportActionState::default());
        assert!(tracker.try_begin("7", VoteKind::Sighting));
    }

    #[test]
    fn backend_status_marks_earlier_votes() {
        let mut tracker = VoteTracker::new();
        tracker.apply_user_status(
            "12",
            UserVoteStatus {
                has_sighting_click: true,
                has_resolved_click: false,
            },
        );

        assert!(!tracker.try_begin("12", VoteKind::Sighting));
        assert!(tracker.try_begin("12", VoteKind::Resolved));
        tracker.finish("12", VoteKind::Resolved, true);

        tracker.apply_user_status("12", UserVoteStatus::default());
        assert!(tracker.state("12").resolved_voted);
    }
}
