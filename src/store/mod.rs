//! Character persistence: the store trait, the shared access policy and the repository that
//! combines the hosted store with the local cache.

pub mod local;
pub mod remote;

pub use local::LocalStore;
pub use remote::RemoteStore;

use log::{info, warn};
use std::future::Future;

use crate::character::CharacterSheet;
use crate::error::{Error, Result};
use crate::record::RosterEntry;
use crate::session::{Identity, Profile};

pub trait CharacterStore {
    fn fetch_by_owner(
        &self,
        identity: &Identity,
        owner_id: &str,
    ) -> impl Future<Output = Result<Option<CharacterSheet>>> + Send;

    fn upsert(
        &self,
        identity: &Identity,
        sheet: CharacterSheet,
    ) -> impl Future<Output = Result<CharacterSheet>> + Send;

    fn list_all(&self, identity: &Identity) -> impl Future<Output = Result<Vec<RosterEntry>>> + Send;

    fn ensure_profile(&self, identity: &Identity) -> impl Future<Output = Result<Profile>> + Send;
}

pub fn authorize_fetch(identity: &Identity, owner_id: &str) -> Result<()> {
    if identity.user_id() == owner_id || identity.is_master() {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}

pub fn authorize_list(identity: &Identity) -> Result<()> {
    if identity.is_master() {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}

// Fills in the owner for a new sheet and stops players from writing someone else's.
pub fn prepare_upsert(identity: &Identity, mut sheet: CharacterSheet) -> Result<CharacterSheet> {
    match sheet.user_id.as_deref() {
        None | Some("") => sheet.user_id = Some(identity.user_id().to_string()),
        Some(owner) if owner != identity.user_id() && !identity.is_master() => {
            return Err(Error::Forbidden);
        }
        Some(_) => {}
    }
    Ok(sheet)
}

/// Profile to create for a signed-in user who has none yet.
pub fn default_profile(identity: &Identity) -> Result<Profile> {
    if let Some(profile) = &identity.profile {
        if profile.id != identity.user_id() {
            return Err(Error::ProfileMismatch);
        }
        return Ok(profile.clone());
    }
    Ok(Profile {
        id: identity.user_id().to_string(),
        email: identity.email().map(str::to_string),
        role: identity.role(),
        created_at: None,
    })
}

/// Hosted store with an optional local cache. Successful remote results are written through to
/// the cache; the cache answers only when the hosted service cannot be reached.
#[derive(Debug, Clone)]
pub struct Repository {
    remote: RemoteStore,
    cache: Option<LocalStore>,
}

impl Repository {
    pub fn new(remote: RemoteStore, cache: Option<LocalStore>) -> Self {
        Repository { remote, cache }
    }

    pub fn remote(&self) -> &RemoteStore {
        &self.remote
    }

    fn offline_cache(&self, error: &Error) -> Option<&LocalStore> {
        if error.is_unreachable() {
            self.cache.as_ref()
        } else {
            None
        }
    }

    async fn remember(&self, sheet: &CharacterSheet) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.cache_sheet(sheet).await {
                warn!("Failed to cache character: {}", e);
            }
        }
    }
}

impl CharacterStore for Repository {
    async fn fetch_by_owner(&self, identity: &Identity, owner_id: &str) -> Result<Option<CharacterSheet>> {
        match self.remote.fetch_by_owner(identity, owner_id).await {
            Ok(Some(sheet)) => {
                self.remember(&sheet).await;
                Ok(Some(sheet))
            }
            Ok(None) => Ok(None),
            Err(e) => match self.offline_cache(&e) {
                Some(cache) => {
                    warn!("Backend unreachable, reading cached character: {}", e);
                    cache.fetch_by_owner(identity, owner_id).await
                }
                None => Err(e),
            },
        }
    }

    async fn upsert(&self, identity: &Identity, sheet: CharacterSheet) -> Result<CharacterSheet> {
        match self.remote.upsert(identity, sheet.clone()).await {
            Ok(saved) => {
                self.remember(&saved).await;
                Ok(saved)
            }
            Err(e) => match self.offline_cache(&e) {
                Some(cache) => {
                    warn!("Backend unreachable, saving character locally: {}", e);
                    cache.upsert(identity, sheet).await
                }
                None => Err(e),
            },
        }
    }

    async fn list_all(&self, identity: &Identity) -> Result<Vec<RosterEntry>> {
        match self.remote.list_all(identity).await {
            Ok(entries) => {
                for entry in &entries {
                    self.remember(&entry.sheet).await;
                }
                info!("Roster loaded with {} characters", entries.len());
                Ok(entries)
            }
            Err(e) => match self.offline_cache(&e) {
                Some(cache) => {
                    warn!("Backend unreachable, listing cached characters: {}", e);
                    cache.list_all(identity).await
                }
                None => Err(e),
            },
        }
    }

    async fn ensure_profile(&self, identity: &Identity) -> Result<Profile> {
        match self.remote.ensure_profile(identity).await {
            Ok(profile) => {
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.cache_profile(&profile).await {
                        warn!("Failed to cache profile: {}", e);
                    }
                }
                Ok(profile)
            }
            Err(e) => match self.offline_cache(&e) {
                Some(cache) => cache.ensure_profile(identity).await,
                None => Err(e),
            },
        }
    }
}
