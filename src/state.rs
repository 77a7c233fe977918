//! Shared application state handed to every handler.

use crate::services::{
    admin::AdminAuth, catalog::CatalogStore, object_store::ObjectStore, presign::UrlSigner,
    probe::MediaProbe, render::Templates, translation::Translator,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogStore,
    pub objects: ObjectStore,
    pub signer: UrlSigner,
    pub translator: Arc<dyn Translator>,
    pub probe: Arc<dyn MediaProbe>,
    pub templates: Arc<Templates>,
    pub admin: Arc<AdminAuth>,
    /// Public origin used in watch links and QR codes, without trailing slash.
    pub base_url: String,
}

impl AppState {
    pub fn watch_url(&self, group_id: &str) -> String {
        format!("{}/watch/{}", self.base_url, group_id)
    }
}
