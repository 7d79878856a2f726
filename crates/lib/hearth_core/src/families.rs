//! Family records.
//!
//! A family is created for the first user of a fresh system and by admins.
//! Membership is the `familyId` field on user documents.

use chrono::Utc;
use tracing::info;

use crate::auth::AuthError;
use crate::auth::users::USERS;
use crate::models::family::{Family, FamilyRecord, FamilySummary};
use crate::store::{DocumentStore, Filter, StoreError};

pub const FAMILIES: &str = "families";

/// Create a family.
pub async fn create_family(
    store: &dyn DocumentStore,
    name: &str,
    created_by: Option<&str>,
) -> Result<Family, AuthError> {
    let record = FamilyRecord {
        name: name.to_string(),
        created_by: created_by.map(str::to_string),
        created_at: Utc::now(),
    };
    let id = store
        .add(FAMILIES, serde_json::to_value(&record).map_err(StoreError::from)?)
        .await?;
    info!(family_id = %id, name, "family created");
    Ok(record.into_family(id))
}

/// Fetch a family by id.
pub async fn get_family(
    store: &dyn DocumentStore,
    family_id: &str,
) -> Result<Option<Family>, AuthError> {
    let Some(data) = store.get(FAMILIES, family_id).await? else {
        return Ok(None);
    };
    let record: FamilyRecord = serde_json::from_value(data)
        .map_err(|e| StoreError::Corrupt(format!("{FAMILIES}/{family_id}: {e}")))?;
    Ok(Some(record.into_family(family_id.to_string())))
}

/// All families with their member counts, oldest first.
pub async fn list_families(store: &dyn DocumentStore) -> Result<Vec<FamilySummary>, AuthError> {
    let docs = store.find(FAMILIES, &Filter::all(), None).await?;
    let mut families = Vec::with_capacity(docs.len());
    for doc in docs {
        let record: FamilyRecord = serde_json::from_value(doc.data)
            .map_err(|e| StoreError::Corrupt(format!("{FAMILIES}/{}: {e}", doc.id)))?;
        let member_count = store
            .count(USERS, &Filter::all().eq("familyId", doc.id.as_str()))
            .await?;
        families.push(FamilySummary {
            id: doc.id,
            name: record.name,
            member_count,
        });
    }
    Ok(families)
}
