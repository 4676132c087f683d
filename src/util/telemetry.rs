//! Tracing setup for cook sessions.

use tracing_subscriber::EnvFilter;

/// Install a default fmt subscriber filtered by `RUST_LOG`, falling back to
/// `info`. Does nothing if the host already installed a subscriber.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Span covering one scheduler session, tagged with its id.
#[must_use]
pub fn session_span(session_id: uuid::Uuid) -> tracing::Span {
    tracing::info_span!("cook_session", %session_id)
}
