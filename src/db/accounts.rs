use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::*;
use crate::helpers::escape_like;
use crate::types::EntityType;

impl StewardDb {
    // =========================================================================
    // Accounts
    // =========================================================================

    /// Insert or fully replace an account row. `created_at` is preserved on
    /// conflict; everything else takes the incoming value.
    pub fn upsert_account(&self, account: &DbAccount) -> Result<(), DbError> {
        let tags = serde_json::to_string(&account.tags).unwrap_or_else(|_| "[]".to_string());
        self.conn.execute(
            "INSERT INTO accounts (
                id, tenant_id, name, website, phone, industry, entity_type,
                account_number, email, annual_revenue, employee_count, address,
                city, country, description, tags, custom_fields, parent_id,
                hierarchy_level, hierarchy_path, created_at, updated_at, updated_by
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                       ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)
             ON CONFLICT(id) DO UPDATE SET
                tenant_id = excluded.tenant_id,
                name = excluded.name,
                website = excluded.website,
                phone = excluded.phone,
                industry = excluded.industry,
                entity_type = excluded.entity_type,
                account_number = excluded.account_number,
                email = excluded.email,
                annual_revenue = excluded.annual_revenue,
                employee_count = excluded.employee_count,
                address = excluded.address,
                city = excluded.city,
                country = excluded.country,
                description = excluded.description,
                tags = excluded.tags,
                custom_fields = excluded.custom_fields,
                parent_id = excluded.parent_id,
                hierarchy_level = excluded.hierarchy_level,
                hierarchy_path = excluded.hierarchy_path,
                updated_at = excluded.updated_at,
                updated_by = excluded.updated_by",
            params![
                account.id,
                account.tenant_id,
                account.name,
                account.website,
                account.phone,
                account.industry,
                account.entity_type.as_str(),
                account.account_number,
                account.email,
                account.annual_revenue,
                account.employee_count,
                account.address,
                account.city,
                account.country,
                account.description,
                tags,
                account.custom_fields,
                account.parent_id,
                account.hierarchy_level,
                account.hierarchy_path,
                account.created_at,
                account.updated_at,
                account.updated_by,
            ],
        )?;
        Ok(())
    }

    pub fn get_account(&self, tenant_id: &str, id: &str) -> Result<Option<DbAccount>, DbError> {
        let account = self
            .conn
            .query_row(
                "SELECT id, tenant_id, name, website, phone, industry, entity_type,
                        account_number, email, annual_revenue, employee_count, address,
                        city, country, description, tags, custom_fields, parent_id,
                        hierarchy_level, hierarchy_path, created_at, updated_at, updated_by
                 FROM accounts WHERE tenant_id = ?1 AND id = ?2",
                params![tenant_id, id],
                map_account_row,
            )
            .optional()?;
        Ok(account)
    }

    /// Lookup by id alone, ignoring tenant. Used by merge to distinguish a
    /// cross-tenant secondary from a genuinely missing one.
    pub fn get_account_any_tenant(&self, id: &str) -> Result<Option<DbAccount>, DbError> {
        let account = self
            .conn
            .query_row(
                "SELECT id, tenant_id, name, website, phone, industry, entity_type,
                        account_number, email, annual_revenue, employee_count, address,
                        city, country, description, tags, custom_fields, parent_id,
                        hierarchy_level, hierarchy_path, created_at, updated_at, updated_by
                 FROM accounts WHERE id = ?1",
                params![id],
                map_account_row,
            )
            .optional()?;
        Ok(account)
    }

    pub fn get_account_by_name(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> Result<Option<DbAccount>, DbError> {
        let account = self
            .conn
            .query_row(
                "SELECT id, tenant_id, name, website, phone, industry, entity_type,
                        account_number, email, annual_revenue, employee_count, address,
                        city, country, description, tags, custom_fields, parent_id,
                        hierarchy_level, hierarchy_path, created_at, updated_at, updated_by
                 FROM accounts WHERE tenant_id = ?1 AND LOWER(name) = LOWER(?2) LIMIT 1",
                params![tenant_id, name],
                map_account_row,
            )
            .optional()?;
        Ok(account)
    }

    pub fn get_accounts_for_tenant(&self, tenant_id: &str) -> Result<Vec<DbAccount>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tenant_id, name, website, phone, industry, entity_type,
                    account_number, email, annual_revenue, employee_count, address,
                    city, country, description, tags, custom_fields, parent_id,
                    hierarchy_level, hierarchy_path, created_at, updated_at, updated_by
             FROM accounts WHERE tenant_id = ?1 ORDER BY name COLLATE NOCASE",
        )?;
        let accounts = stmt
            .query_map(params![tenant_id], map_account_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    pub fn count_accounts(&self, tenant_id: &str) -> Result<i64, DbError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE tenant_id = ?1",
            params![tenant_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // =========================================================================
    // Duplicate candidate queries
    // =========================================================================

    /// Accounts sharing an exact identity field with the probe: name or
    /// website case-insensitively, phone on the stored string as-is. NULL
    /// probe fields never match, and `exclude_id` drops the probe itself.
    pub fn find_exact_matches(
        &self,
        tenant_id: &str,
        exclude_id: Option<&str>,
        name: Option<&str>,
        website: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<DbAccount>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tenant_id, name, website, phone, industry, entity_type,
                    account_number, email, annual_revenue, employee_count, address,
                    city, country, description, tags, custom_fields, parent_id,
                    hierarchy_level, hierarchy_path, created_at, updated_at, updated_by
             FROM accounts
             WHERE tenant_id = ?1
               AND (?2 IS NULL OR id != ?2)
               AND ((?3 IS NOT NULL AND LOWER(name) = LOWER(?3))
                 OR (?4 IS NOT NULL AND website IS NOT NULL AND LOWER(website) = LOWER(?4))
                 OR (?5 IS NOT NULL AND phone IS NOT NULL AND phone = ?5))
             ORDER BY id",
        )?;
        let accounts = stmt
            .query_map(
                params![tenant_id, exclude_id, name, website, phone],
                map_account_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    /// Accounts whose name contains `fragment`, case-insensitively.
    pub fn find_by_name_containing(
        &self,
        tenant_id: &str,
        fragment: &str,
        exclude_id: Option<&str>,
    ) -> Result<Vec<DbAccount>, DbError> {
        let pattern = format!("%{}%", escape_like(&fragment.to_lowercase()));
        let mut stmt = self.conn.prepare(
            "SELECT id, tenant_id, name, website, phone, industry, entity_type,
                    account_number, email, annual_revenue, employee_count, address,
                    city, country, description, tags, custom_fields, parent_id,
                    hierarchy_level, hierarchy_path, created_at, updated_at, updated_by
             FROM accounts
             WHERE tenant_id = ?1
               AND (?2 IS NULL OR id != ?2)
               AND LOWER(name) LIKE ?3 ESCAPE '\\'
             ORDER BY id",
        )?;
        let accounts = stmt
            .query_map(params![tenant_id, exclude_id, pattern], map_account_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    // =========================================================================
    // Hierarchy queries
    // =========================================================================

    pub fn get_root_accounts(&self, tenant_id: &str) -> Result<Vec<DbAccount>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tenant_id, name, website, phone, industry, entity_type,
                    account_number, email, annual_revenue, employee_count, address,
                    city, country, description, tags, custom_fields, parent_id,
                    hierarchy_level, hierarchy_path, created_at, updated_at, updated_by
             FROM accounts WHERE tenant_id = ?1 AND parent_id IS NULL
             ORDER BY name COLLATE NOCASE",
        )?;
        let accounts = stmt
            .query_map(params![tenant_id], map_account_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    pub fn get_child_accounts(
        &self,
        tenant_id: &str,
        parent_id: &str,
    ) -> Result<Vec<DbAccount>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tenant_id, name, website, phone, industry, entity_type,
                    account_number, email, annual_revenue, employee_count, address,
                    city, country, description, tags, custom_fields, parent_id,
                    hierarchy_level, hierarchy_path, created_at, updated_at, updated_by
             FROM accounts WHERE tenant_id = ?1 AND parent_id = ?2
             ORDER BY name COLLATE NOCASE",
        )?;
        let accounts = stmt
            .query_map(params![tenant_id, parent_id], map_account_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    pub fn count_children(&self, tenant_id: &str, id: &str) -> Result<i64, DbError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE tenant_id = ?1 AND parent_id = ?2",
            params![tenant_id, id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Accounts at hierarchy level `max_level` or shallower. Level filters
    /// are inclusive-below: "level 2" means the top three tiers.
    pub fn get_accounts_up_to_level(
        &self,
        tenant_id: &str,
        max_level: i64,
    ) -> Result<Vec<DbAccount>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tenant_id, name, website, phone, industry, entity_type,
                    account_number, email, annual_revenue, employee_count, address,
                    city, country, description, tags, custom_fields, parent_id,
                    hierarchy_level, hierarchy_path, created_at, updated_at, updated_by
             FROM accounts WHERE tenant_id = ?1 AND hierarchy_level <= ?2
             ORDER BY hierarchy_level, name COLLATE NOCASE",
        )?;
        let accounts = stmt
            .query_map(params![tenant_id, max_level], map_account_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    /// Rewrite the three hierarchy columns for one row. Callers are expected
    /// to have validated the move; this is plumbing for the cascade.
    pub fn update_hierarchy_fields(
        &self,
        tenant_id: &str,
        id: &str,
        parent_id: Option<&str>,
        level: i64,
        path: &str,
    ) -> Result<usize, DbError> {
        let n = self.conn.execute(
            "UPDATE accounts
             SET parent_id = ?3, hierarchy_level = ?4, hierarchy_path = ?5, updated_at = ?6
             WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, id, parent_id, level, path, Utc::now().to_rfc3339()],
        )?;
        Ok(n)
    }

    // =========================================================================
    // Field updates and deletion
    // =========================================================================

    /// Write one scalar column. `column` must come from a compile-time
    /// whitelist match, never from caller input.
    pub(crate) fn update_account_column(
        &self,
        tenant_id: &str,
        id: &str,
        column: &'static str,
        value: rusqlite::types::Value,
    ) -> Result<usize, DbError> {
        let sql = format!(
            "UPDATE accounts SET {column} = ?1, updated_at = ?2 WHERE tenant_id = ?3 AND id = ?4"
        );
        let n = self
            .conn
            .execute(&sql, params![value, Utc::now().to_rfc3339(), tenant_id, id])?;
        Ok(n)
    }

    pub fn delete_account(&self, tenant_id: &str, id: &str) -> Result<usize, DbError> {
        let n = self.conn.execute(
            "DELETE FROM accounts WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, id],
        )?;
        Ok(n)
    }
}

fn map_account_row(row: &rusqlite::Row) -> rusqlite::Result<DbAccount> {
    let entity_type: String = row.get(6)?;
    let tags_json: Option<String> = row.get(15)?;
    Ok(DbAccount {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        name: row.get(2)?,
        website: row.get(3)?,
        phone: row.get(4)?,
        industry: row.get(5)?,
        entity_type: EntityType::from_str_lossy(&entity_type),
        account_number: row.get(7)?,
        email: row.get(8)?,
        annual_revenue: row.get(9)?,
        employee_count: row.get(10)?,
        address: row.get(11)?,
        city: row.get(12)?,
        country: row.get(13)?,
        description: row.get(14)?,
        tags: tags_json
            .as_deref()
            .and_then(|t| serde_json::from_str(t).ok())
            .unwrap_or_default(),
        custom_fields: row.get(16)?,
        parent_id: row.get(17)?,
        hierarchy_level: row.get(18)?,
        hierarchy_path: row.get(19)?,
        created_at: row.get(20)?,
        updated_at: row.get(21)?,
        updated_by: row.get(22)?,
    })
}
