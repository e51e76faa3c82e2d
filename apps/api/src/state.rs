use crate::config::Config;
use crate::drafts::DraftService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Versioning core, backed by whichever store the config selected.
    pub drafts: DraftService,
    pub config: Config,
}
