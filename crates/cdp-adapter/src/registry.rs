//! Page targets known to the adapter, with their protocol sessions.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::commands::PageInfo;
use crate::ids::{PageId, SessionId};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TargetContext {
    pub session_id: Option<SessionId>,
    pub target_id: Option<String>,
    pub cdp_session: Option<String>,
    pub recent_url: Option<String>,
    pub title: Option<String>,
}

#[derive(Default)]
pub struct Registry {
    pages: DashMap<PageId, TargetContext>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_page(
        &self,
        page: PageId,
        session: SessionId,
        target_id: Option<String>,
        cdp_session: Option<String>,
    ) {
        let ctx = TargetContext {
            session_id: Some(session),
            target_id,
            cdp_session,
            ..TargetContext::default()
        };
        self.pages.insert(page, ctx);
    }

    pub fn remove_page(&self, page: &PageId) -> Option<TargetContext> {
        self.pages.remove(page).map(|(_, ctx)| ctx)
    }

    pub fn get(&self, page: &PageId) -> Option<TargetContext> {
        self.pages.get(page).map(|entry| entry.value().clone())
    }

    pub fn iter(&self) -> Vec<(PageId, TargetContext)> {
        self.pages
            .iter()
            .map(|kv| (*kv.key(), kv.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn set_target_info(&self, page: &PageId, url: Option<String>, title: Option<String>) {
        if let Some(mut entry) = self.pages.get_mut(page) {
            if let Some(url) = url.filter(|u| !u.is_empty()) {
                entry.recent_url = Some(url);
            }
            if let Some(title) = title {
                entry.title = Some(title);
            }
        }
    }

    pub fn set_cdp_session(&self, page: &PageId, session: String) {
        if let Some(mut entry) = self.pages.get_mut(page) {
            entry.cdp_session = Some(session);
        }
    }

    pub fn get_cdp_session(&self, page: &PageId) -> Option<String> {
        self.pages
            .get(page)
            .and_then(|entry| entry.cdp_session.clone())
    }

    pub fn target_id(&self, page: &PageId) -> Option<String> {
        self.pages.get(page).and_then(|entry| entry.target_id.clone())
    }

    /// Snapshot of every tracked page, for tab matching.
    pub fn pages(&self) -> Vec<PageInfo> {
        self.pages
            .iter()
            .map(|kv| PageInfo {
                page: *kv.key(),
                target_id: kv.target_id.clone(),
                url: kv.recent_url.clone(),
                title: kv.title.clone(),
                attached: kv.cdp_session.is_some(),
            })
            .collect()
    }
}
