// Hosted store. Requests go out with the user's token; the privileged routes are used when
// row-level security refuses or hides rows and a service key is configured.
use log::{debug, warn};

use super::{CharacterStore, authorize_fetch, authorize_list, default_profile, prepare_upsert};
use crate::backend::{BackendClient, Credential};
use crate::character::CharacterSheet;
use crate::error::{Error, Result};
use crate::record::{self, RosterEntry};
use crate::session::{Identity, Profile};

#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: BackendClient,
}

impl RemoteStore {
    pub fn new(client: BackendClient) -> Self {
        RemoteStore { client }
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    fn can_fall_back(&self, error: &Error) -> bool {
        self.client.has_service_key() && !error.is_unreachable() && !error.requires_sign_in()
    }
}

impl CharacterStore for RemoteStore {
    async fn fetch_by_owner(&self, identity: &Identity, owner_id: &str) -> Result<Option<CharacterSheet>> {
        authorize_fetch(identity, owner_id)?;
        let row = match self
            .client
            .latest_character(Credential::User(identity.token()), owner_id)
            .await
        {
            // A master reading someone else's sheet may see nothing through row-level security.
            Ok(None) if owner_id != identity.user_id() && self.client.has_service_key() => {
                self.client
                    .character_by_user(Some(identity.token()), owner_id)
                    .await?
            }
            Ok(row) => row,
            Err(e) if self.can_fall_back(&e) => {
                warn!("Character fetch failed, using privileged route: {}", e);
                self.client
                    .character_by_user(Some(identity.token()), owner_id)
                    .await?
            }
            Err(e) => return Err(e),
        };
        row.map(record::from_row).transpose()
    }

    async fn upsert(&self, identity: &Identity, sheet: CharacterSheet) -> Result<CharacterSheet> {
        let sheet = prepare_upsert(identity, sheet)?;
        let row = record::to_row(&sheet)?;
        let saved = match self
            .client
            .upsert_character(Credential::User(identity.token()), &row)
            .await
        {
            Ok(saved) => saved,
            // Ownership was checked above, so writing past the table policy is safe here.
            Err(e @ Error::Backend { status: 401 | 403, .. }) if self.can_fall_back(&e) => {
                warn!("Character upsert rejected, retrying privileged: {}", e);
                self.client.upsert_character(Credential::Service, &row).await?
            }
            Err(e) => return Err(e),
        };
        debug!("Saved character {:?}", saved.get("id"));
        record::from_row(saved)
    }

    async fn list_all(&self, identity: &Identity) -> Result<Vec<RosterEntry>> {
        authorize_list(identity)?;
        let rows = match self
            .client
            .list_characters(Credential::User(identity.token()))
            .await
        {
            Ok(rows) if !rows.is_empty() || !self.client.has_service_key() => rows,
            Ok(_) => self.client.admin_characters(Some(identity.token())).await?,
            Err(e) if self.can_fall_back(&e) => {
                warn!("Roster listing failed, using privileged route: {}", e);
                self.client.admin_characters(Some(identity.token())).await?
            }
            Err(e) => return Err(e),
        };
        rows.into_iter().map(record::roster_entry).collect()
    }

    async fn ensure_profile(&self, identity: &Identity) -> Result<Profile> {
        let credential = Credential::User(identity.token());
        if let Some(profile) = self.client.fetch_profile(credential, identity.user_id()).await? {
            return Ok(profile);
        }
        let profile = default_profile(identity)?;
        debug!("Creating {} profile for {}", profile.role, profile.id);
        self.client.insert_profile(credential, &profile).await
    }
}
