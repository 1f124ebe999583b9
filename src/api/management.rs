use super::types::{BasicInfo, Group, OAuthClientInfo, OAuthPolicy, OAuthScope, User};
use super::{ApiClient, ApiResult};

impl ApiClient {
    pub async fn users(&self) -> ApiResult<Vec<User>> {
        self.get("/management/user/list").await
    }

    pub async fn groups(&self) -> ApiResult<Vec<Group>> {
        self.get("/management/group/list").await
    }

    pub async fn oauth_clients(&self) -> ApiResult<Vec<OAuthClientInfo>> {
        self.get("/management/oauth_client/list").await
    }

    /// Groups selectable when granting a client access.
    pub async fn oauth_client_groups(&self) -> ApiResult<Vec<BasicInfo>> {
        self.get("/management/oauth_client/group_list").await
    }

    /// Users selectable when granting a client access.
    pub async fn oauth_client_users(&self) -> ApiResult<Vec<BasicInfo>> {
        self.get("/management/oauth_client/user_list").await
    }

    pub async fn oauth_scope_names(&self) -> ApiResult<Vec<String>> {
        self.get("/management/oauth_client/list_scopes").await
    }

    pub async fn oauth_scopes(&self) -> ApiResult<Vec<OAuthScope>> {
        self.get("/management/oauth_scope/list").await
    }

    /// Policies selectable when editing a scope.
    pub async fn oauth_policy_infos(&self) -> ApiResult<Vec<BasicInfo>> {
        self.get("/management/oauth_scope/policy_list").await
    }

    pub async fn oauth_policies(&self) -> ApiResult<Vec<OAuthPolicy>> {
        self.get("/management/oauth_policy/list").await
    }
}
