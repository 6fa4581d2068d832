//! Content events that keep the snapshot cache consistent with the
//! directory.
//!
//! The builder posts one event per write it performs. Each event maps to
//! a regeneration or an invalidation.

use pagesnap_core::{ContentType, Hostname, LeafId, RootId, RootKind, StoreId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::service::{RegenerationReport, SnapshotService};

/// A change to content, settings or domains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ContentEvent {
    Published {
        content_type: ContentType,
        content_id: LeafId,
    },
    SeoEdited {
        content_type: ContentType,
        content_id: LeafId,
    },
    DocumentEdited {
        content_type: ContentType,
        content_id: LeafId,
    },
    /// Root settings changed (global header/footer, site name, ...).
    SettingsEdited { root_kind: RootKind, root_id: RootId },
    DomainConnected { domain: Hostname },
    DomainDisconnected { domain: Hostname },
    RegenerateStore { store_id: StoreId },
}

impl ContentEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Published { .. } => "published",
            Self::SeoEdited { .. } => "seo_edited",
            Self::DocumentEdited { .. } => "document_edited",
            Self::SettingsEdited { .. } => "settings_edited",
            Self::DomainConnected { .. } => "domain_connected",
            Self::DomainDisconnected { .. } => "domain_disconnected",
            Self::RegenerateStore { .. } => "regenerate_store",
        }
    }
}

/// What applying an event did.
#[derive(Debug, Clone, Serialize)]
pub struct EventOutcome {
    pub event: &'static str,
    #[serde(flatten)]
    pub report: RegenerationReport,
    /// Snapshots removed outright (domain disconnects).
    pub deleted: u64,
}

/// Apply an event to the cache.
///
/// Settings edits only invalidate: the next crawler request regenerates
/// each leaf lazily.
///
/// # Errors
///
/// Returns an error if the directory or the durable store is unreachable.
pub async fn apply(service: &SnapshotService, event: &ContentEvent) -> Result<EventOutcome> {
    let mut outcome = EventOutcome {
        event: event.name(),
        report: RegenerationReport::default(),
        deleted: 0,
    };

    match event {
        ContentEvent::Published {
            content_type,
            content_id,
        }
        | ContentEvent::SeoEdited {
            content_type,
            content_id,
        }
        | ContentEvent::DocumentEdited {
            content_type,
            content_id,
        } => {
            outcome.report = service.regenerate_leaf(*content_type, *content_id).await?;
        }
        ContentEvent::SettingsEdited { root_kind, root_id } => {
            outcome.report.invalidated = service.invalidate_root(*root_kind, *root_id).await?;
        }
        ContentEvent::DomainConnected { domain } => {
            outcome.report = service.regenerate_domain(domain).await?;
        }
        ContentEvent::DomainDisconnected { domain } => {
            outcome.deleted = service.forget_domain(domain).await?;
        }
        ContentEvent::RegenerateStore { store_id } => {
            outcome.report = service.regenerate_store(*store_id).await?;
        }
    }

    info!(
        event = outcome.event,
        succeeded = outcome.report.succeeded.len(),
        failed = outcome.report.failed.len(),
        invalidated = outcome.report.invalidated,
        deleted = outcome.deleted,
        "Content event applied"
    );
    Ok(outcome)
}
