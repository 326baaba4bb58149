use std::cmp::Reverse;

use chrono::{DateTime, Utc};

use super::domain::{Announcement, IdentityId, NewAnnouncement};
use super::forms::AnnouncementDraft;
use super::repository::Ledger;
use super::service::HostelServiceError;
use super::views::{matches_search, AnnouncementFilter, AnnouncementView};

pub(crate) fn post(
    ledger: &mut dyn Ledger,
    author: IdentityId,
    draft: AnnouncementDraft,
    now: DateTime<Utc>,
) -> Result<Announcement, HostelServiceError> {
    let announcement = ledger.insert_announcement(NewAnnouncement {
        title: draft.title,
        content: draft.content,
        date_posted: now,
        posted_by: author,
    })?;
    Ok(announcement)
}

/// Every posting, newest first. Equal timestamps fall back to insertion order, newest first.
pub(crate) fn newest_first(ledger: &dyn Ledger) -> Result<Vec<Announcement>, HostelServiceError> {
    let mut announcements = ledger.announcements()?;
    announcements.sort_by_key(|announcement| {
        (
            Reverse(announcement.date_posted),
            Reverse(announcement.id),
        )
    });
    Ok(announcements)
}

pub(crate) fn views(
    ledger: &dyn Ledger,
    filter: &AnnouncementFilter,
    limit: Option<usize>,
) -> Result<Vec<AnnouncementView>, HostelServiceError> {
    let mut views = Vec::new();
    for announcement in newest_first(ledger)? {
        if !matches_search(
            filter.search.as_deref(),
            &[announcement.title.as_str(), announcement.content.as_str()],
        ) {
            continue;
        }
        if limit.is_some_and(|limit| views.len() >= limit) {
            break;
        }

        let posted_by = ledger
            .identity(announcement.posted_by)?
            .map(|identity| identity.username)
            .unwrap_or_default();
        views.push(AnnouncementView {
            id: announcement.id,
            title: announcement.title,
            content: announcement.content,
            date_posted: announcement.date_posted,
            posted_by,
        });
    }
    Ok(views)
}
