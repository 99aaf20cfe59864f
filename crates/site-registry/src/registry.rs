use std::collections::HashSet;
use std::sync::Arc;

use promptcast_core_types::SiteId;
use tracing::{debug, info};

use crate::catalog::builtin_sites;
use crate::errors::SiteError;
use crate::model::SiteConfig;
use crate::prefs::{Preferences, PreferencesStore};

/// Read-only catalog plus a preferences store.
///
/// Every accessor hands out owned copies with the user's enable flags and ordering applied; the
/// catalog itself is never mutated after construction.
pub struct SiteRegistry {
    catalog: Vec<SiteConfig>,
    store: Arc<dyn PreferencesStore>,
}

impl SiteRegistry {
    pub fn new(catalog: Vec<SiteConfig>, store: Arc<dyn PreferencesStore>) -> Result<Self, SiteError> {
        let mut seen = HashSet::new();
        for site in &catalog {
            site.validate()?;
            if !seen.insert(site.id.clone()) {
                return Err(SiteError::DuplicateSite(site.id.clone()));
            }
        }
        Ok(Self { catalog, store })
    }

    /// Built-in catalog with `extra` entries appended; an extra entry with a built-in id
    /// replaces that entry in place.
    pub fn with_builtin(
        extra: Vec<SiteConfig>,
        store: Arc<dyn PreferencesStore>,
    ) -> Result<Self, SiteError> {
        let mut catalog = builtin_sites();
        for site in extra {
            match catalog.iter_mut().find(|existing| existing.id == site.id) {
                Some(slot) => *slot = site,
                None => catalog.push(site),
            }
        }
        Self::new(catalog, store)
    }

    /// All sites, preference-merged, in the persisted order.
    pub fn all_sites(&self) -> Result<Vec<SiteConfig>, SiteError> {
        let prefs = self.store.load()?;
        Ok(self.ordered(&prefs))
    }

    pub fn get(&self, id: &SiteId) -> Result<SiteConfig, SiteError> {
        let prefs = self.store.load()?;
        let site = self.lookup(id)?;
        Ok(apply_prefs(site, &prefs))
    }

    pub fn is_enabled(&self, id: &SiteId) -> Result<bool, SiteError> {
        Ok(self.get(id)?.enabled)
    }

    pub fn set_enabled(&self, id: &SiteId, enabled: bool) -> Result<(), SiteError> {
        let site = self.lookup(id)?;
        if enabled && site.input_selectors.is_empty() {
            return Err(SiteError::NoInputSelectors(id.clone()));
        }
        let mut prefs = self.store.load()?;
        prefs.enabled.insert(id.clone(), enabled);
        self.store.save(&prefs)?;
        info!(target: "sites", site = %id, enabled, "updated site preference");
        Ok(())
    }

    pub fn order(&self) -> Result<Vec<SiteId>, SiteError> {
        Ok(self.all_sites()?.into_iter().map(|site| site.id).collect())
    }

    /// Persist a new ordering. Ids left out keep their relative catalog order after the listed
    /// ones.
    pub fn set_order(&self, ids: &[SiteId]) -> Result<(), SiteError> {
        let mut seen = HashSet::new();
        let mut order = Vec::with_capacity(ids.len());
        for id in ids {
            self.lookup(id)?;
            if seen.insert(id.clone()) {
                order.push(id.clone());
            }
        }
        let mut prefs = self.store.load()?;
        prefs.order = order;
        self.store.save(&prefs)
    }

    /// Enabled sites in display order, optionally restricted to `subset`.
    pub fn eligible_sites(&self, subset: Option<&[SiteId]>) -> Result<Vec<SiteConfig>, SiteError> {
        if let Some(ids) = subset {
            for id in ids {
                self.lookup(id)?;
            }
        }
        let sites = self
            .all_sites()?
            .into_iter()
            .filter(|site| site.enabled)
            .filter(|site| subset.map_or(true, |ids| ids.contains(&site.id)))
            .collect::<Vec<_>>();
        debug!(target: "sites", count = sites.len(), "resolved eligible sites");
        Ok(sites)
    }

    fn lookup(&self, id: &SiteId) -> Result<&SiteConfig, SiteError> {
        self.catalog
            .iter()
            .find(|site| &site.id == id)
            .ok_or_else(|| SiteError::UnknownSite(id.clone()))
    }

    fn ordered(&self, prefs: &Preferences) -> Vec<SiteConfig> {
        let mut out = Vec::with_capacity(self.catalog.len());
        let mut placed = HashSet::new();
        for id in &prefs.order {
            if let Ok(site) = self.lookup(id) {
                if placed.insert(site.id.clone()) {
                    out.push(apply_prefs(site, prefs));
                }
            }
        }
        for site in &self.catalog {
            if !placed.contains(&site.id) {
                out.push(apply_prefs(site, prefs));
            }
        }
        out
    }
}

fn apply_prefs(site: &SiteConfig, prefs: &Preferences) -> SiteConfig {
    let mut copy = site.clone();
    if let Some(enabled) = prefs.enabled.get(&site.id) {
        copy.enabled = *enabled && !copy.input_selectors.is_empty();
    }
    copy
}
