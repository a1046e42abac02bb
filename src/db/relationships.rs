use rusqlite::{params, OptionalExtension};

use super::*;
use crate::types::RelationshipType;

impl StewardDb {
    // =========================================================================
    // Account relationships
    // =========================================================================

    pub fn insert_relationship(&self, rel: &DbRelationship) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO account_relationships (
                id, tenant_id, from_id, to_id, relationship_type, description, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                rel.id,
                rel.tenant_id,
                rel.from_id,
                rel.to_id,
                rel.relationship_type.as_str(),
                rel.description,
                rel.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_relationship(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<DbRelationship>, DbError> {
        let rel = self
            .conn
            .query_row(
                "SELECT id, tenant_id, from_id, to_id, relationship_type, description, created_at
                 FROM account_relationships WHERE tenant_id = ?1 AND id = ?2",
                params![tenant_id, id],
                map_relationship_row,
            )
            .optional()?;
        Ok(rel)
    }

    /// Edges touching `account_id` on either endpoint.
    pub fn get_relationships_for_account(
        &self,
        tenant_id: &str,
        account_id: &str,
    ) -> Result<Vec<DbRelationship>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tenant_id, from_id, to_id, relationship_type, description, created_at
             FROM account_relationships
             WHERE tenant_id = ?1 AND (from_id = ?2 OR to_id = ?2)
             ORDER BY created_at, id",
        )?;
        let rels = stmt
            .query_map(params![tenant_id, account_id], map_relationship_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rels)
    }

    pub fn get_relationships_for_tenant(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<DbRelationship>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tenant_id, from_id, to_id, relationship_type, description, created_at
             FROM account_relationships WHERE tenant_id = ?1 ORDER BY created_at, id",
        )?;
        let rels = stmt
            .query_map(params![tenant_id], map_relationship_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rels)
    }

    /// Rewrite every edge endpoint pointing at `old_id` to point at `new_id`.
    /// Returns the number of edges touched. Edges that become self-loops are
    /// left in place for a later cleanup pass.
    pub fn repoint_relationships(
        &self,
        tenant_id: &str,
        old_id: &str,
        new_id: &str,
    ) -> Result<usize, DbError> {
        let from = self.conn.execute(
            "UPDATE account_relationships SET from_id = ?3
             WHERE tenant_id = ?1 AND from_id = ?2",
            params![tenant_id, old_id, new_id],
        )?;
        let to = self.conn.execute(
            "UPDATE account_relationships SET to_id = ?3
             WHERE tenant_id = ?1 AND to_id = ?2",
            params![tenant_id, old_id, new_id],
        )?;
        Ok(from + to)
    }

    pub fn delete_relationship(&self, tenant_id: &str, id: &str) -> Result<usize, DbError> {
        let n = self.conn.execute(
            "DELETE FROM account_relationships WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, id],
        )?;
        Ok(n)
    }

    /// Drop every edge touching `account_id`. Used when the account itself
    /// is deleted so no dangling endpoints remain.
    pub fn delete_relationships_for_account(
        &self,
        tenant_id: &str,
        account_id: &str,
    ) -> Result<usize, DbError> {
        let n = self.conn.execute(
            "DELETE FROM account_relationships
             WHERE tenant_id = ?1 AND (from_id = ?2 OR to_id = ?2)",
            params![tenant_id, account_id],
        )?;
        Ok(n)
    }
}

fn map_relationship_row(row: &rusqlite::Row) -> rusqlite::Result<DbRelationship> {
    let relationship_type: String = row.get(4)?;
    Ok(DbRelationship {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        from_id: row.get(2)?,
        to_id: row.get(3)?,
        relationship_type: RelationshipType::from_str_lossy(&relationship_type),
        description: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;

    fn make_rel(tenant: &str, id: &str, from: &str, to: &str) -> DbRelationship {
        DbRelationship {
            id: id.to_string(),
            tenant_id: tenant.to_string(),
            from_id: from.to_string(),
            to_id: to.to_string(),
            relationship_type: RelationshipType::Partner,
            description: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_insert_and_get_round_trip() {
        let db = test_db();
        db.insert_relationship(&make_rel("t1", "r1", "a1", "a2")).unwrap();
        let rel = db.get_relationship("t1", "r1").unwrap().unwrap();
        assert_eq!(rel.from_id, "a1");
        assert_eq!(rel.to_id, "a2");
        assert_eq!(rel.relationship_type, RelationshipType::Partner);
        assert!(db.get_relationship("t2", "r1").unwrap().is_none());
    }

    #[test]
    fn test_account_scan_covers_both_directions() {
        let db = test_db();
        db.insert_relationship(&make_rel("t1", "r1", "a1", "a2")).unwrap();
        db.insert_relationship(&make_rel("t1", "r2", "a3", "a1")).unwrap();
        db.insert_relationship(&make_rel("t1", "r3", "a2", "a3")).unwrap();

        let rels = db.get_relationships_for_account("t1", "a1").unwrap();
        let ids: Vec<&str> = rels.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"r1"));
        assert!(ids.contains(&"r2"));
    }

    #[test]
    fn test_repoint_rewrites_both_endpoints() {
        let db = test_db();
        db.insert_relationship(&make_rel("t1", "r1", "old", "a2")).unwrap();
        db.insert_relationship(&make_rel("t1", "r2", "a3", "old")).unwrap();
        db.insert_relationship(&make_rel("t2", "r3", "old", "a4")).unwrap();

        let touched = db.repoint_relationships("t1", "old", "new").unwrap();
        assert_eq!(touched, 2);

        let r1 = db.get_relationship("t1", "r1").unwrap().unwrap();
        assert_eq!(r1.from_id, "new");
        let r2 = db.get_relationship("t1", "r2").unwrap().unwrap();
        assert_eq!(r2.to_id, "new");

        // Other tenants are untouched.
        let r3 = db.get_relationship("t2", "r3").unwrap().unwrap();
        assert_eq!(r3.from_id, "old");
    }

    #[test]
    fn test_delete_for_account_removes_both_directions() {
        let db = test_db();
        db.insert_relationship(&make_rel("t1", "r1", "a1", "a2")).unwrap();
        db.insert_relationship(&make_rel("t1", "r2", "a3", "a1")).unwrap();
        db.insert_relationship(&make_rel("t1", "r3", "a2", "a3")).unwrap();

        let n = db.delete_relationships_for_account("t1", "a1").unwrap();
        assert_eq!(n, 2);
        assert!(db.get_relationship("t1", "r3").unwrap().is_some());
    }
}
