//! Side panel model: the list of clipped pages and the actions on it.
//!
//! The panel never caches records between fetches; every refresh goes to the
//! store. A failed delete or clear leaves the current view in place.

use crate::db::SnapshotStorage;
use crate::domain::{Snapshot, SnapshotId};
use crate::error::StoreError;
use crate::relay::{CaptureEvent, CaptureInbox};
use chrono::Local;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const INIT_ERROR_HEADLINE: &str = "Error initializing database";
pub const LOAD_ERROR_HEADLINE: &str = "Error loading clipped pages";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardMetadata {
    pub word_count: u32,
    pub reading_time: u32,
}

/// One rendered list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotCard {
    pub id: SnapshotId,
    pub title: String,
    pub url: String,
    pub favicon: Option<String>,
    pub captured: String,
    /// Present only for records that carry a word count.
    pub metadata: Option<CardMetadata>,
    pub content: String,
}

impl From<Snapshot> for SnapshotCard {
    fn from(snapshot: Snapshot) -> Self {
        let captured = snapshot
            .captured_at()
            .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| snapshot.timestamp.clone());

        // A zero count renders like a missing one.
        let metadata = snapshot
            .word_count
            .filter(|n| *n > 0)
            .map(|word_count| CardMetadata {
                word_count,
                reading_time: snapshot.reading_time.unwrap_or(0),
            });

        Self {
            id: snapshot.id,
            title: snapshot.title,
            url: snapshot.url,
            favicon: snapshot.favicon.filter(|f| !f.is_empty()),
            captured,
            metadata,
            content: snapshot.content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelView {
    /// Nothing clipped yet.
    Empty,
    /// Newest first.
    List(Vec<SnapshotCard>),
    Error { headline: String, detail: String },
}

/// Newest first by parsed timestamp; unparseable timestamps sort last, ties by id descending.
pub fn sort_newest_first(snapshots: &mut [Snapshot]) {
    snapshots.sort_by(|a, b| match (a.captured_at(), b.captured_at()) {
        (Some(ta), Some(tb)) => tb.cmp(&ta).then_with(|| b.id.cmp(&a.id)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.id.cmp(&a.id),
    });
}

pub struct Panel {
    storage: Arc<dyn SnapshotStorage>,
    view: PanelView,
}

impl Panel {
    pub fn new(storage: Arc<dyn SnapshotStorage>) -> Self {
        Self {
            storage,
            view: PanelView::Empty,
        }
    }

    pub fn view(&self) -> &PanelView {
        &self.view
    }

    /// Initialize storage and load the list.
    pub async fn open(&mut self) -> &PanelView {
        if let Err(err) = self.storage.initialize().await {
            error!(error = %err, "Panel could not open the snapshot store");
            self.view = PanelView::Error {
                headline: INIT_ERROR_HEADLINE.to_string(),
                detail: err.to_string(),
            };
            return &self.view;
        }
        self.refresh().await
    }

    pub async fn refresh(&mut self) -> &PanelView {
        self.view = match self.storage.get_all_snapshots().await {
            Ok(mut snapshots) if !snapshots.is_empty() => {
                sort_newest_first(&mut snapshots);
                PanelView::List(snapshots.into_iter().map(SnapshotCard::from).collect())
            }
            Ok(_) => PanelView::Empty,
            Err(err) => PanelView::Error {
                headline: LOAD_ERROR_HEADLINE.to_string(),
                detail: err.to_string(),
            },
        };
        &self.view
    }

    /// Delete one entry. On failure the current view is kept and the error returned.
    pub async fn delete(&mut self, id: SnapshotId) -> Result<(), StoreError> {
        if let Err(err) = self.storage.delete_snapshot(id).await {
            warn!(id = %id, error = %err, "Delete failed, keeping current list");
            return Err(err);
        }
        self.refresh().await;
        Ok(())
    }

    pub async fn clear_all(&mut self) -> Result<(), StoreError> {
        if let Err(err) = self.storage.clear_all_snapshots().await {
            warn!(error = %err, "Clear failed, keeping current list");
            return Err(err);
        }
        self.refresh().await;
        Ok(())
    }

    /// Persist a relayed capture and refresh the list.
    pub async fn ingest(&mut self, event: CaptureEvent) -> Result<SnapshotId, StoreError> {
        let id = self.storage.add_snapshot(event.page).await?;
        info!(id = %id, event_id = %event.event_id, "Clipped page stored");
        self.refresh().await;
        Ok(id)
    }

    /// Drain `inbox` until every relay handle is gone. Returns the number of stored captures.
    pub async fn run(&mut self, mut inbox: CaptureInbox) -> usize {
        let mut stored = 0;
        while let Some(event) = inbox.recv().await {
            let event_id = event.event_id;
            match self.ingest(event).await {
                Ok(_) => stored += 1,
                Err(err) => error!(event_id = %event_id, error = %err, "Error adding new clip"),
            }
        }
        stored
    }
}
