use super::types::{Passkey, Settings, UserInfo};
use super::{ApiClient, ApiResult};

impl ApiClient {
    pub async fn settings(&self) -> ApiResult<Settings> {
        self.get("/account/settings/get").await
    }

    pub async fn update_settings(&self, settings: &Settings) -> ApiResult<()> {
        self.post_empty("/account/settings/update", settings).await
    }

    /// Uuid of the account the session token belongs to. The backend
    /// answers with the bare uuid as plain text.
    pub async fn account_uuid(&self) -> ApiResult<String> {
        self.get_text("/account/general/uuid").await
    }

    pub async fn account_info(&self, uuid: &str) -> ApiResult<UserInfo> {
        self.get(&format!("/account/general/info/{uuid}")).await
    }

    /// Convenience for [`account_uuid`](Self::account_uuid) followed by
    /// [`account_info`](Self::account_info).
    pub async fn current_account(&self) -> ApiResult<UserInfo> {
        let uuid = self.account_uuid().await?;
        self.account_info(&uuid).await
    }

    pub async fn passkeys(&self) -> ApiResult<Vec<Passkey>> {
        self.get("/auth/passkey/list").await
    }
}
