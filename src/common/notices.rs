use serde::Serialize;

use crate::common::types::Intent;

/// Typed notices surfaced to the UI layer. Nothing here is thrown as an
/// uncaught fault; the local view degrades to "temporarily stale" instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Notice {
    /// The outbound call for an intent was rejected by the transport and
    /// its optimistic delta has been rolled back.
    #[serde(rename_all = "camelCase")]
    CommandFailed { intent: Intent, cause: String },
    /// An optimistic delta was neither confirmed nor superseded within the
    /// configured expiry and has been proactively rolled back.
    #[serde(rename_all = "camelCase")]
    CommandOutcomeUnknown { intent: Intent },
    /// A canonical update implied an impossible local state. The canonical
    /// value was still applied; this is diagnostics only.
    #[serde(rename_all = "camelCase")]
    ReconciliationAnomaly { detail: String },
    /// The push channel dropped; a reconnect is underway.
    ChannelLost,
    /// A full resnapshot completed after a reconnect.
    Resynced,
}
