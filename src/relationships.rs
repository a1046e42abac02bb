//! Non-hierarchical account relationships.
//!
//! Typed directional links between accounts in the same tenant (vendor,
//! customer, partner, and so on). These live outside the parent/child tree
//! and carry no cascade behavior; merges repoint them and deletes remove
//! them.

use chrono::Utc;

use crate::db::{DbRelationship, StewardDb};
use crate::error::StewardError;
use crate::types::NewRelationship;

/// Create a relationship between two existing accounts of one tenant.
pub fn create_relationship(
    db: &StewardDb,
    tenant_id: &str,
    payload: NewRelationship,
) -> Result<DbRelationship, StewardError> {
    if payload.from_id == payload.to_id {
        return Err(StewardError::ValidationFailed(vec![
            "cannot relate an account to itself".to_string(),
        ]));
    }
    for endpoint in [&payload.from_id, &payload.to_id] {
        if db.get_account(tenant_id, endpoint)?.is_none() {
            return Err(StewardError::AccountNotFound(endpoint.clone()));
        }
    }

    let relationship = DbRelationship {
        id: uuid::Uuid::new_v4().to_string(),
        tenant_id: tenant_id.to_string(),
        from_id: payload.from_id,
        to_id: payload.to_id,
        relationship_type: payload.relationship_type,
        description: payload.description,
        created_at: Utc::now().to_rfc3339(),
    };
    db.insert_relationship(&relationship)?;
    log::info!(
        "Created {} relationship {} -> {} for tenant {tenant_id}",
        relationship.relationship_type.as_str(),
        relationship.from_id,
        relationship.to_id
    );
    Ok(relationship)
}

/// All relationships touching one account, either direction.
pub fn get_relationships(
    db: &StewardDb,
    tenant_id: &str,
    account_id: &str,
) -> Result<Vec<DbRelationship>, StewardError> {
    if db.get_account(tenant_id, account_id)?.is_none() {
        return Err(StewardError::AccountNotFound(account_id.to_string()));
    }
    Ok(db.get_relationships_for_account(tenant_id, account_id)?)
}

pub fn delete_relationship(
    db: &StewardDb,
    tenant_id: &str,
    id: &str,
) -> Result<(), StewardError> {
    if db.get_relationship(tenant_id, id)?.is_none() {
        return Err(StewardError::RelationshipNotFound(id.to_string()));
    }
    db.delete_relationship(tenant_id, id)?;
    log::info!("Deleted relationship {id} for tenant {tenant_id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::{seed_account, test_db};
    use crate::types::RelationshipType;

    fn payload(from: &str, to: &str) -> NewRelationship {
        NewRelationship {
            from_id: from.to_string(),
            to_id: to.to_string(),
            relationship_type: RelationshipType::Vendor,
            description: Some("sole supplier".to_string()),
        }
    }

    #[test]
    fn test_create_and_list() {
        let db = test_db();
        seed_account(&db, "t1", "a", "Acme");
        seed_account(&db, "t1", "b", "Globex");

        let created = create_relationship(&db, "t1", payload("a", "b")).unwrap();
        assert_eq!(created.relationship_type, RelationshipType::Vendor);

        let from_side = get_relationships(&db, "t1", "a").unwrap();
        let to_side = get_relationships(&db, "t1", "b").unwrap();
        assert_eq!(from_side.len(), 1);
        assert_eq!(to_side.len(), 1);
        assert_eq!(from_side[0].id, created.id);
    }

    #[test]
    fn test_endpoints_must_exist_in_the_tenant() {
        let db = test_db();
        seed_account(&db, "t1", "a", "Acme");
        seed_account(&db, "t2", "elsewhere", "Other Tenant");

        let err = create_relationship(&db, "t1", payload("a", "ghost")).unwrap_err();
        assert_eq!(err.code(), "ACCOUNT_NOT_FOUND");
        // Same tenant only; an id that exists elsewhere is still missing here.
        let err = create_relationship(&db, "t1", payload("a", "elsewhere")).unwrap_err();
        assert_eq!(err.code(), "ACCOUNT_NOT_FOUND");
    }

    #[test]
    fn test_self_relationships_are_rejected() {
        let db = test_db();
        seed_account(&db, "t1", "a", "Acme");
        let err = create_relationship(&db, "t1", payload("a", "a")).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_FAILED");
    }

    #[test]
    fn test_delete_requires_an_existing_row() {
        let db = test_db();
        seed_account(&db, "t1", "a", "Acme");
        seed_account(&db, "t1", "b", "Globex");
        let created = create_relationship(&db, "t1", payload("a", "b")).unwrap();

        delete_relationship(&db, "t1", &created.id).unwrap();
        assert!(get_relationships(&db, "t1", "a").unwrap().is_empty());

        let err = delete_relationship(&db, "t1", &created.id).unwrap_err();
        assert_eq!(err.code(), "RELATIONSHIP_NOT_FOUND");
    }
}
