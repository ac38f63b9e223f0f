//! On-demand analysis history.

use std::sync::{Mutex, MutexGuard};

use doclens_analysis_contract::{
    AnalysisFailure, HistoryEntry, classify_failure_response, parse_history_response,
};
use doclens_auth::{AuthClient, AuthError};
use doclens_core::{ApiRequest, endpoints};
use tracing::{debug, warn};

/// Loads and holds the user's past analyses for the current run only.
///
/// Independent of [`crate::UploadController`]: loads may interleave freely
/// with an in-flight analysis.
pub struct HistoryController {
    auth: AuthClient,
    entries: Mutex<Vec<HistoryEntry>>,
}

impl HistoryController {
    /// Creates an empty history view.
    pub fn new(auth: AuthClient) -> Self {
        Self {
            auth,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Fetches the history and replaces the held entries.
    ///
    /// # Errors
    /// Returns the [`AnalysisFailure`] describing why the list could not be
    /// loaded; previously held entries are kept in that case.
    pub async fn load(&self) -> Result<Vec<HistoryEntry>, AnalysisFailure> {
        let response = self
            .auth
            .send_authorized(ApiRequest::get(endpoints::ANALYSIS_HISTORY))
            .await
            .map_err(|error| match error {
                AuthError::Transport(_) => AnalysisFailure::Connection,
                AuthError::NotAuthenticated => AnalysisFailure::Unauthorized,
                _ => AnalysisFailure::Generic,
            })?;

        if !response.is_success() {
            let failure = classify_failure_response(response.status, response.detail().as_deref());
            warn!(status = response.status, "history load failed");
            return Err(failure);
        }

        let entries = parse_history_response(&response.body).map_err(|error| {
            warn!(%error, "history payload malformed");
            AnalysisFailure::Generic
        })?;
        debug!(count = entries.len(), "history loaded");

        *self.held() = entries.clone();
        Ok(entries)
    }

    /// Entries from the last successful load.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.held().clone()
    }

    fn held(&self) -> MutexGuard<'_, Vec<HistoryEntry>> {
        // The list is only ever replaced wholesale.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for history loading.

    use std::sync::Arc;

    use async_trait::async_trait;
    use doclens_auth::{MemoryTokenStore, SessionStore};
    use doclens_core::{ApiResponse, BackendTransport, TransportError};
    use serde_json::json;

    use super::*;

    struct HistoryTransport;

    #[async_trait]
    impl BackendTransport for HistoryTransport {
        async fn send(&self, _request: ApiRequest) -> Result<ApiResponse, TransportError> {
            Ok(ApiResponse::json(
                200,
                &json!({
                    "analyses": [{ "id": "a-7", "file_name": "notice.pdf" }]
                }),
            ))
        }
    }

    #[tokio::test]
    async fn load_survives_poisoned_entries_lock() {
        let tokens = Arc::new(MemoryTokenStore::with_token("tok"));
        let store = Arc::new(SessionStore::new(tokens));
        assert!(store.restore());
        let history = HistoryController::new(AuthClient::new(Arc::new(HistoryTransport), store));

        let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _held = history.entries.lock();
            panic!("poison the entries lock");
        }));
        assert!(poisoned.is_err());
        assert!(history.entries.is_poisoned());

        let loaded = history.load().await.expect("history should load");

        assert_eq!(loaded.len(), 1);
        assert_eq!(history.entries(), loaded);
    }
}
