//! Domain methods for the billing API client.

use crate::ApiClient;
use orgbill_core::models::OrgSubscription;
use orgbill_core::AppError;
use tokio_util::sync::CancellationToken;

impl ApiClient {
    /// Fetch the billing subscription for one organization.
    ///
    /// An absent or empty slug fails with [`AppError::MissingParameter`]
    /// before any request is issued. Otherwise exactly one GET goes to the
    /// slug-addressed endpoint; the response body passes through one-to-one
    /// into [`OrgSubscription`]. Idempotent and safe to retry.
    pub async fn get_org_subscription(
        &self,
        org_slug: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<OrgSubscription, AppError> {
        if org_slug.trim().is_empty() {
            return Err(AppError::MissingParameter("org_slug"));
        }

        let path = format!(
            "/organizations/{}/billing/subscription",
            urlencoding::encode(org_slug)
        );
        self.get_with_cancel(&path, cancel).await
    }
}
