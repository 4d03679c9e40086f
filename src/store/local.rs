// SQLite cache of character rows, keyed by owner. Rows are stored in the same flat JSON shape
// the hosted table uses, so both stores share the record mapping.
use log::debug;
use serde_json::Value;
use std::path::Path;
use tokio_rusqlite::{Connection, OptionalExtension, params};

use super::{CharacterStore, authorize_fetch, authorize_list, default_profile, prepare_upsert};
use crate::character::CharacterSheet;
use crate::error::Result;
use crate::record::{self, RosterEntry};
use crate::session::{Identity, Profile, Role};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS characters (
    owner_id   TEXT PRIMARY KEY,
    id         TEXT NOT NULL,
    row        TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS profiles (
    id         TEXT PRIMARY KEY,
    email      TEXT,
    role       TEXT NOT NULL,
    created_at TEXT
);
";

#[derive(Clone)]
pub struct LocalStore {
    conn: Connection,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore").finish_non_exhaustive()
    }
}

impl LocalStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path.as_ref()).await?;
        Self::with_connection(conn).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(LocalStore { conn })
    }

    pub async fn cache_row(&self, owner_id: &str, row: &Value) -> Result<()> {
        let owner_id = owner_id.to_string();
        let id = row
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let updated_at = row
            .get("updated_at")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(record::now_stamp);
        let text = serde_json::to_string(row)?;
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO characters (owner_id, id, row, updated_at) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(owner_id) DO UPDATE SET id = ?2, row = ?3, updated_at = ?4",
                    params![owner_id, id, text, updated_at],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn cache_sheet(&self, sheet: &CharacterSheet) -> Result<()> {
        let Some(owner_id) = sheet.user_id.as_deref() else {
            return Ok(());
        };
        let stamp = sheet.updated_at.clone().unwrap_or_else(record::now_stamp);
        let row = record::to_row_stamped(sheet, &stamp)?;
        self.cache_row(owner_id, &row).await
    }

    pub async fn cache_profile(&self, profile: &Profile) -> Result<()> {
        let profile = profile.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO profiles (id, email, role, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![profile.id, profile.email, profile.role.to_string(), profile.created_at],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn row_for(&self, owner_id: &str) -> Result<Option<Value>> {
        let owner_id = owner_id.to_string();
        let text = self
            .conn
            .call(move |conn| {
                let text = conn
                    .query_row(
                        "SELECT row FROM characters WHERE owner_id = ?1",
                        params![owner_id],
                        |r| r.get::<_, String>(0),
                    )
                    .optional()?;
                Ok(text)
            })
            .await?;
        text.map(|text| serde_json::from_str(&text).map_err(Into::into))
            .transpose()
    }

    async fn profile_for(&self, user_id: &str) -> Result<Option<Profile>> {
        let user_id = user_id.to_string();
        let profile = self
            .conn
            .call(move |conn| {
                let profile = conn
                    .query_row(
                        "SELECT id, email, role, created_at FROM profiles WHERE id = ?1",
                        params![user_id],
                        |r| {
                            Ok(Profile {
                                id: r.get(0)?,
                                email: r.get(1)?,
                                role: Role::parse(&r.get::<_, String>(2)?),
                                created_at: r.get(3)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(profile)
            })
            .await?;
        Ok(profile)
    }

    pub async fn row_count(&self) -> Result<usize> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM characters", [], |r| r.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

impl CharacterStore for LocalStore {
    async fn fetch_by_owner(&self, identity: &Identity, owner_id: &str) -> Result<Option<CharacterSheet>> {
        authorize_fetch(identity, owner_id)?;
        self.row_for(owner_id).await?.map(record::from_row).transpose()
    }

    async fn upsert(&self, identity: &Identity, sheet: CharacterSheet) -> Result<CharacterSheet> {
        let mut sheet = prepare_upsert(identity, sheet)?;
        if sheet.id.is_none() {
            sheet.id = Some(uuid::Uuid::new_v4().to_string());
        }
        let row = record::to_row(&sheet)?;
        let owner_id = sheet.user_id.clone().unwrap_or_default();
        self.cache_row(&owner_id, &row).await?;
        debug!("Cached character for {}", owner_id);
        record::from_row(row)
    }

    async fn list_all(&self, identity: &Identity) -> Result<Vec<RosterEntry>> {
        authorize_list(identity)?;
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT c.row, p.id, p.email, p.role FROM characters c
                     LEFT JOIN profiles p ON p.id = c.owner_id
                     ORDER BY c.updated_at DESC",
                )?;
                let rows = stmt
                    .query_map([], |r| {
                        Ok((
                            r.get::<_, String>(0)?,
                            r.get::<_, Option<String>>(1)?,
                            r.get::<_, Option<String>>(2)?,
                            r.get::<_, Option<String>>(3)?,
                        ))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(text, profile_id, email, role)| {
                let mut row: Value = serde_json::from_str(&text)?;
                if let (Some(id), Value::Object(map)) = (profile_id, &mut row) {
                    map.insert(
                        "profiles".to_string(),
                        serde_json::json!({ "id": id, "email": email, "role": role }),
                    );
                }
                record::roster_entry(row)
            })
            .collect()
    }

    async fn ensure_profile(&self, identity: &Identity) -> Result<Profile> {
        if let Some(profile) = self.profile_for(identity.user_id()).await? {
            return Ok(profile);
        }
        let profile = default_profile(identity)?;
        self.cache_profile(&profile).await?;
        Ok(profile)
    }
}
