//! Live cells for every resource the backend publishes updates for.
//!
//! Each cell is tied to the [`Topic`] the backend emits when that resource
//! changes. A failed request counts as "no update" and keeps the last value.

use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::api::types::{
    Apod, ApodInfo, BasicInfo, Group, OAuthClientInfo, OAuthPolicy, OAuthScope, Passkey,
    Settings, User,
};
use crate::api::{ApiClient, ApiResult};
use crate::updater::{Topic, TopicRegistry, Updater};

pub struct Stores {
    pub users: Updater<Vec<User>>,
    pub oauth_client_users: Updater<Vec<BasicInfo>>,
    pub groups: Updater<Vec<Group>>,
    pub oauth_client_groups: Updater<Vec<BasicInfo>>,
    pub oauth_scopes: Updater<Vec<OAuthScope>>,
    pub oauth_scope_names: Updater<Vec<String>>,
    pub oauth_policies: Updater<Vec<OAuthPolicy>>,
    pub oauth_policy_infos: Updater<Vec<BasicInfo>>,
    pub oauth_clients: Updater<Vec<OAuthClientInfo>>,
    pub passkeys: Updater<Vec<Passkey>>,
    pub settings: Updater<Settings>,
    pub apods: Updater<Vec<ApodInfo>>,
    /// Full-size media for the date set with [`Stores::set_apod_date`].
    /// Picking a new date aborts the previous download.
    pub apod_image: Updater<Apod>,
    apod_date: Arc<Mutex<Option<String>>>,
}

impl Stores {
    pub fn new(api: Arc<ApiClient>, registry: Arc<TopicRegistry>) -> Self {
        let apod_date: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

        let apod_image = {
            let api = Arc::clone(&api);
            let date = Arc::clone(&apod_date);
            Updater::aborting(Arc::clone(&registry), Topic::Apod, move || {
                let api = Arc::clone(&api);
                let date = date.lock().unwrap().clone();
                async move { api.apod_image(&date?).await.ok() }
            })
        };

        Self {
            users: cell(&api, &registry, Topic::User, |api| async move { api.users().await }),
            oauth_client_users: cell(&api, &registry, Topic::User, |api| async move {
                api.oauth_client_users().await
            }),
            groups: cell(&api, &registry, Topic::Group, |api| async move { api.groups().await }),
            oauth_client_groups: cell(&api, &registry, Topic::Group, |api| async move {
                api.oauth_client_groups().await
            }),
            oauth_scopes: cell(&api, &registry, Topic::OAuthScope, |api| async move {
                api.oauth_scopes().await
            }),
            oauth_scope_names: cell(&api, &registry, Topic::OAuthScope, |api| async move {
                api.oauth_scope_names().await
            }),
            oauth_policies: cell(&api, &registry, Topic::OAuthPolicy, |api| async move {
                api.oauth_policies().await
            }),
            oauth_policy_infos: cell(&api, &registry, Topic::OAuthPolicy, |api| async move {
                api.oauth_policy_infos().await
            }),
            oauth_clients: cell(&api, &registry, Topic::OAuthClient, |api| async move {
                api.oauth_clients().await
            }),
            passkeys: cell(&api, &registry, Topic::Passkey, |api| async move {
                api.passkeys().await
            }),
            settings: cell(&api, &registry, Topic::Settings, |api| async move {
                api.settings().await
            }),
            apods: cell(&api, &registry, Topic::Apod, |api| async move { api.apods().await }),
            apod_image,
            apod_date,
        }
    }

    /// Select the media date (RFC 3339) and fetch its image.
    pub async fn set_apod_date(&self, date: impl Into<String>) {
        *self.apod_date.lock().unwrap() = Some(date.into());
        self.apod_image.update().await;
    }

    pub fn apod_date(&self) -> Option<String> {
        self.apod_date.lock().unwrap().clone()
    }
}

fn cell<T, F, Fut>(
    api: &Arc<ApiClient>,
    registry: &Arc<TopicRegistry>,
    topic: Topic,
    fetch: F,
) -> Updater<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(Arc<ApiClient>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
{
    let api = Arc::clone(api);
    Updater::new(Arc::clone(registry), topic, move || {
        let request = fetch(Arc::clone(&api));
        async move { request.await.ok() }
    })
}
