use axum::extract::FromRef;

use crate::{
    config::Config,
    services::{article::ArticleService, auth::AuthService, proxy::FileProxy},
    storage::Stores,
    utils::jwt::TokenCodec,
};

#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub articles: ArticleService,
    pub proxy: FileProxy,
    pub config: Config,
}

impl AppState {
    /// Wires the services to `stores` using the settings in `config`.
    pub fn new(stores: Stores, config: Config) -> Self {
        let codec = TokenCodec::new(&config.jwt_secret);
        Self {
            auth: AuthService::new(stores.users.clone(), codec, config.jwt_expiration),
            articles: ArticleService::new(stores.articles, stores.users),
            proxy: FileProxy::new(config.proxy_dir.clone(), config.proxy_allowlist.clone()),
            config,
        }
    }
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl FromRef<AppState> for ArticleService {
    fn from_ref(state: &AppState) -> Self {
        state.articles.clone()
    }
}

impl FromRef<AppState> for FileProxy {
    fn from_ref(state: &AppState) -> Self {
        state.proxy.clone()
    }
}
