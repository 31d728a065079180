//! Finds the group a track belongs to

use crate::model::{Group, TrackId};

#[derive(Debug, PartialEq, Eq)]
pub enum GroupMatch<'a> {
    NotGrouped,
    /// The track belongs to this group but is not its head
    Member(&'a Group),
    Head(&'a Group),
}

/// First group containing `track`, scanning in storage order.
pub fn find_group<'a>(
    groups: impl IntoIterator<Item = &'a Group>,
    track: &TrackId,
) -> Option<&'a Group> {
    groups.into_iter().find(|group| group.contains(track))
}

/// Only the first containing group is considered: a track that heads a later
/// group but sits inside an earlier one is a plain member.
pub fn match_track<'a>(groups: impl IntoIterator<Item = &'a Group>, track: &TrackId) -> GroupMatch<'a> {
    match find_group(groups, track) {
        None => GroupMatch::NotGrouped,
        Some(group) if group.head() == Some(track) => GroupMatch::Head(group),
        Some(group) => GroupMatch::Member(group),
    }
}
