//! Hierarchy management: parent links, levels, and materialized paths.
//!
//! Mutations load the tenant's accounts once into an arena ([`TenantTree`]),
//! apply the change in memory, cascade recomputed level/path values through
//! the touched subtree, and persist every touched row inside the caller's
//! transaction. Ancestor walks are bounded by the configured depth limit, so
//! a walk that runs out of budget is reported as excessive depth even when
//! no cycle exists.

use std::collections::{HashMap, HashSet};

use crate::config::EngineConfig;
use crate::db::{DbAccount, DbError, StewardDb};
use crate::error::StewardError;

/// Flat arena over one tenant's accounts: rows plus id and parent/child
/// index maps. Built from a single bulk fetch so traversals never go back
/// to the database per node.
pub(crate) struct TenantTree {
    nodes: Vec<DbAccount>,
    by_id: HashMap<String, usize>,
    children: HashMap<String, Vec<usize>>,
}

impl TenantTree {
    pub(crate) fn load(db: &StewardDb, tenant_id: &str) -> Result<Self, DbError> {
        Ok(Self::from_accounts(db.get_accounts_for_tenant(tenant_id)?))
    }

    pub(crate) fn from_accounts(nodes: Vec<DbAccount>) -> Self {
        let mut by_id = HashMap::with_capacity(nodes.len());
        let mut children: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, node) in nodes.iter().enumerate() {
            by_id.insert(node.id.clone(), idx);
            if let Some(parent_id) = &node.parent_id {
                children.entry(parent_id.clone()).or_default().push(idx);
            }
        }
        TenantTree {
            nodes,
            by_id,
            children,
        }
    }

    pub(crate) fn get(&self, id: &str) -> Option<&DbAccount> {
        self.by_id.get(id).map(|&idx| &self.nodes[idx])
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub(crate) fn accounts(&self) -> &[DbAccount] {
        &self.nodes
    }

    pub(crate) fn node(&self, idx: usize) -> &DbAccount {
        &self.nodes[idx]
    }

    pub(crate) fn children_of(&self, id: &str) -> &[usize] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Move `id` under a new parent in the index: fix up both child lists
    /// and the node's parent pointer. Level/path are the caller's job.
    fn relink(&mut self, id: &str, new_parent: Option<String>) {
        let Some(idx) = self.index_of(id) else { return };
        if let Some(old_parent) = self.nodes[idx].parent_id.clone() {
            if let Some(siblings) = self.children.get_mut(&old_parent) {
                siblings.retain(|&i| i != idx);
            }
        }
        if let Some(parent_id) = &new_parent {
            self.children.entry(parent_id.clone()).or_default().push(idx);
        }
        self.nodes[idx].parent_id = new_parent;
    }

    fn set_level_path(&mut self, id: &str, level: i64, path: String) {
        if let Some(idx) = self.index_of(id) {
            self.nodes[idx].hierarchy_level = level;
            self.nodes[idx].hierarchy_path = path;
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Bounded ascent check for a proposed reparenting. Rejects self-parenting
/// outright, then walks up from the proposed parent at most
/// `max_hierarchy_depth` steps: finding the moving account means a cycle,
/// and running out of budget before reaching a root reads as too deep.
pub(crate) fn validate_move(
    tree: &TenantTree,
    cfg: &EngineConfig,
    id: &str,
    proposed_parent: &str,
) -> Result<(), StewardError> {
    if id == proposed_parent {
        return Err(StewardError::CircularHierarchy(format!(
            "account {id} cannot be its own parent"
        )));
    }
    let mut current = Some(proposed_parent);
    let mut steps = 0usize;
    while let Some(ancestor_id) = current {
        if ancestor_id == id {
            return Err(StewardError::CircularHierarchy(format!(
                "attaching {id} under {proposed_parent} would make it its own ancestor"
            )));
        }
        if steps >= cfg.max_hierarchy_depth {
            return Err(StewardError::HierarchyTooDeep(format!(
                "ancestor walk from {proposed_parent} exceeded {} steps",
                cfg.max_hierarchy_depth
            )));
        }
        steps += 1;
        current = tree.get(ancestor_id).and_then(|n| n.parent_id.as_deref());
    }
    Ok(())
}

// =============================================================================
// Mutations
// =============================================================================

/// Attach `id` under `new_parent` (or detach to root for `None`), recompute
/// level/path for the account and its whole subtree, and persist the touched
/// rows. Non-transactional core: callers supply the transaction.
pub(crate) fn apply_parent(
    db: &StewardDb,
    cfg: &EngineConfig,
    tree: &mut TenantTree,
    id: &str,
    new_parent: Option<&str>,
) -> Result<(), StewardError> {
    match new_parent {
        Some(parent_id) => {
            validate_move(tree, cfg, id, parent_id)?;
            let (new_level, new_path) = {
                let parent = tree
                    .get(parent_id)
                    .ok_or_else(|| StewardError::ParentNotFound(parent_id.to_string()))?;
                (
                    parent.hierarchy_level + 1,
                    format!("{}/{}", parent.hierarchy_path, id),
                )
            };
            if new_level > cfg.max_hierarchy_depth as i64 {
                return Err(StewardError::HierarchyTooDeep(format!(
                    "account {id} would land at level {new_level}, above the limit of {}",
                    cfg.max_hierarchy_depth
                )));
            }
            tree.relink(id, Some(parent_id.to_string()));
            tree.set_level_path(id, new_level, new_path);
        }
        None => {
            tree.relink(id, None);
            tree.set_level_path(id, 0, id.to_string());
        }
    }
    let touched = cascade_from(tree, id);
    persist_nodes(db, tree, &touched)
}

/// Pre-order subtree walk from `root_id`, inclusive. A visited guard keeps
/// corrupt parent pointers from looping the walk.
fn subtree_indexes(tree: &TenantTree, root_id: &str) -> Vec<usize> {
    let Some(root_idx) = tree.index_of(root_id) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut visited: HashSet<usize> = HashSet::from([root_idx]);
    let mut stack = vec![root_idx];
    while let Some(idx) = stack.pop() {
        out.push(idx);
        let id = tree.nodes[idx].id.clone();
        let kids = tree.children_of(&id).to_vec();
        for &child in kids.iter().rev() {
            if visited.insert(child) {
                stack.push(child);
            }
        }
    }
    out
}

/// Recompute level/path for every descendant of `root_id` from its parent's
/// already-updated values. Returns the touched indexes, root first.
fn cascade_from(tree: &mut TenantTree, root_id: &str) -> Vec<usize> {
    let order = subtree_indexes(tree, root_id);
    for &idx in order.iter().skip(1) {
        let Some(parent_id) = tree.nodes[idx].parent_id.clone() else {
            continue;
        };
        let Some(parent_idx) = tree.index_of(&parent_id) else {
            continue;
        };
        let parent_level = tree.nodes[parent_idx].hierarchy_level;
        let parent_path = tree.nodes[parent_idx].hierarchy_path.clone();
        let child_id = tree.nodes[idx].id.clone();
        tree.nodes[idx].hierarchy_level = parent_level + 1;
        tree.nodes[idx].hierarchy_path = format!("{parent_path}/{child_id}");
    }
    order
}

fn persist_nodes(db: &StewardDb, tree: &TenantTree, indexes: &[usize]) -> Result<(), StewardError> {
    for &idx in indexes {
        let node = &tree.nodes[idx];
        db.update_hierarchy_fields(
            &node.tenant_id,
            &node.id,
            node.parent_id.as_deref(),
            node.hierarchy_level,
            &node.hierarchy_path,
        )?;
    }
    Ok(())
}

fn cloned_node(tree: &TenantTree, id: &str) -> Result<DbAccount, StewardError> {
    tree.get(id)
        .cloned()
        .ok_or_else(|| StewardError::AccountNotFound(id.to_string()))
}

/// Place `id` under `parent_id`, detaching from any current parent first.
/// Validates the move, recomputes level/path for the whole moved subtree,
/// and commits atomically. Returns the updated account.
pub fn set_parent(
    db: &StewardDb,
    cfg: &EngineConfig,
    tenant_id: &str,
    id: &str,
    parent_id: &str,
) -> Result<DbAccount, StewardError> {
    db.with_transaction(|db| {
        let mut tree = TenantTree::load(db, tenant_id)?;
        if !tree.contains(id) {
            return Err(StewardError::AccountNotFound(id.to_string()));
        }
        apply_parent(db, cfg, &mut tree, id, Some(parent_id))?;
        log::info!("Moved account {id} under {parent_id} in tenant {tenant_id}");
        cloned_node(&tree, id)
    })
}

/// Same transition as [`set_parent`]; reads better at call sites moving an
/// already-parented account.
pub fn change_parent(
    db: &StewardDb,
    cfg: &EngineConfig,
    tenant_id: &str,
    id: &str,
    new_parent_id: &str,
) -> Result<DbAccount, StewardError> {
    set_parent(db, cfg, tenant_id, id, new_parent_id)
}

/// Detach `id` from its parent, making it a root, and recompute its subtree.
pub fn remove_from_hierarchy(
    db: &StewardDb,
    cfg: &EngineConfig,
    tenant_id: &str,
    id: &str,
) -> Result<DbAccount, StewardError> {
    db.with_transaction(|db| {
        let mut tree = TenantTree::load(db, tenant_id)?;
        if !tree.contains(id) {
            return Err(StewardError::AccountNotFound(id.to_string()));
        }
        apply_parent(db, cfg, &mut tree, id, None)?;
        log::info!("Detached account {id} from its parent in tenant {tenant_id}");
        cloned_node(&tree, id)
    })
}

// =============================================================================
// Derived queries
// =============================================================================

/// Ancestor chain of `id`, ordered root first. Stops early at a dangling or
/// cyclic parent pointer rather than erroring; the integrity sweep owns
/// reporting those.
pub fn get_ancestors(
    db: &StewardDb,
    tenant_id: &str,
    id: &str,
) -> Result<Vec<DbAccount>, StewardError> {
    let tree = TenantTree::load(db, tenant_id)?;
    let node = tree
        .get(id)
        .ok_or_else(|| StewardError::AccountNotFound(id.to_string()))?;
    let mut chain: Vec<DbAccount> = Vec::new();
    let mut seen: HashSet<String> = HashSet::from([id.to_string()]);
    let mut current = node.parent_id.clone();
    while let Some(ancestor_id) = current {
        if !seen.insert(ancestor_id.clone()) {
            break;
        }
        let Some(ancestor) = tree.get(&ancestor_id) else {
            break;
        };
        chain.push(ancestor.clone());
        current = ancestor.parent_id.clone();
    }
    chain.reverse();
    Ok(chain)
}

/// Every account below `id`, pre-order (each parent before its children).
pub fn get_descendants(
    db: &StewardDb,
    tenant_id: &str,
    id: &str,
) -> Result<Vec<DbAccount>, StewardError> {
    let tree = TenantTree::load(db, tenant_id)?;
    if !tree.contains(id) {
        return Err(StewardError::AccountNotFound(id.to_string()));
    }
    let order = subtree_indexes(&tree, id);
    Ok(order[1..].iter().map(|&idx| tree.node(idx).clone()).collect())
}

/// Accounts sharing `id`'s parent; for a root, the tenant's other roots.
pub fn get_siblings(
    db: &StewardDb,
    tenant_id: &str,
    id: &str,
) -> Result<Vec<DbAccount>, StewardError> {
    let tree = TenantTree::load(db, tenant_id)?;
    let node = tree
        .get(id)
        .ok_or_else(|| StewardError::AccountNotFound(id.to_string()))?;
    let siblings = match &node.parent_id {
        Some(parent_id) => tree
            .children_of(parent_id)
            .iter()
            .map(|&idx| tree.node(idx))
            .filter(|n| n.id != id)
            .cloned()
            .collect(),
        None => tree
            .accounts()
            .iter()
            .filter(|n| n.parent_id.is_none() && n.id != id)
            .cloned()
            .collect(),
    };
    Ok(siblings)
}

/// Number of levels in the subtree rooted at `id`; a childless account has
/// depth 1.
pub fn get_hierarchy_depth(
    db: &StewardDb,
    tenant_id: &str,
    id: &str,
) -> Result<usize, StewardError> {
    let tree = TenantTree::load(db, tenant_id)?;
    let Some(root_idx) = tree.index_of(id) else {
        return Err(StewardError::AccountNotFound(id.to_string()));
    };
    let mut max_depth = 0usize;
    let mut visited: HashSet<usize> = HashSet::from([root_idx]);
    let mut stack = vec![(root_idx, 1usize)];
    while let Some((idx, depth)) = stack.pop() {
        max_depth = max_depth.max(depth);
        let node_id = tree.node(idx).id.clone();
        for &child in tree.children_of(&node_id).to_vec().iter() {
            if visited.insert(child) {
                stack.push((child, depth + 1));
            }
        }
    }
    Ok(max_depth)
}

/// Size of the subtree rooted at `id`, including the root itself.
pub fn get_account_count(
    db: &StewardDb,
    tenant_id: &str,
    id: &str,
) -> Result<usize, StewardError> {
    let tree = TenantTree::load(db, tenant_id)?;
    if !tree.contains(id) {
        return Err(StewardError::AccountNotFound(id.to_string()));
    }
    Ok(subtree_indexes(&tree, id).len())
}

/// Accounts at `level` or shallower; the level filter is inclusive-below,
/// not exact-level.
pub fn get_accounts_at_level(
    db: &StewardDb,
    tenant_id: &str,
    level: i64,
) -> Result<Vec<DbAccount>, StewardError> {
    Ok(db.get_accounts_up_to_level(tenant_id, level)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::{seed_account, test_db};

    fn cfg() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn test_set_parent_computes_level_and_path() {
        let db = test_db();
        seed_account(&db, "t1", "root", "Root");
        seed_account(&db, "t1", "child", "Child");

        let updated = set_parent(&db, &cfg(), "t1", "child", "root").unwrap();
        assert_eq!(updated.parent_id.as_deref(), Some("root"));
        assert_eq!(updated.hierarchy_level, 1);
        assert_eq!(updated.hierarchy_path, "root/child");

        let stored = db.get_account("t1", "child").unwrap().unwrap();
        assert_eq!(stored.hierarchy_path, "root/child");
    }

    #[test]
    fn test_reparent_cascades_to_grandchildren() {
        let db = test_db();
        seed_account(&db, "t1", "r1", "Root One");
        seed_account(&db, "t1", "r2", "Root Two");
        seed_account(&db, "t1", "c", "Child");
        seed_account(&db, "t1", "g", "Grandchild");
        set_parent(&db, &cfg(), "t1", "c", "r1").unwrap();
        set_parent(&db, &cfg(), "t1", "g", "c").unwrap();

        // Move the whole r1 branch under r2.
        change_parent(&db, &cfg(), "t1", "r1", "r2").unwrap();

        let c = db.get_account("t1", "c").unwrap().unwrap();
        assert_eq!(c.hierarchy_level, 2);
        assert_eq!(c.hierarchy_path, "r2/r1/c");
        let g = db.get_account("t1", "g").unwrap().unwrap();
        assert_eq!(g.hierarchy_level, 3);
        assert_eq!(g.hierarchy_path, "r2/r1/c/g");
    }

    #[test]
    fn test_remove_from_hierarchy_promotes_subtree_root() {
        let db = test_db();
        seed_account(&db, "t1", "r", "Root");
        seed_account(&db, "t1", "c", "Child");
        seed_account(&db, "t1", "g", "Grandchild");
        set_parent(&db, &cfg(), "t1", "c", "r").unwrap();
        set_parent(&db, &cfg(), "t1", "g", "c").unwrap();

        let detached = remove_from_hierarchy(&db, &cfg(), "t1", "c").unwrap();
        assert_eq!(detached.parent_id, None);
        assert_eq!(detached.hierarchy_level, 0);
        assert_eq!(detached.hierarchy_path, "c");

        let g = db.get_account("t1", "g").unwrap().unwrap();
        assert_eq!(g.hierarchy_level, 1);
        assert_eq!(g.hierarchy_path, "c/g");

        assert!(db.get_child_accounts("t1", "r").unwrap().is_empty());
    }

    #[test]
    fn test_self_parenting_is_circular() {
        let db = test_db();
        seed_account(&db, "t1", "a", "A");
        let err = set_parent(&db, &cfg(), "t1", "a", "a").unwrap_err();
        assert_eq!(err.code(), "CIRCULAR_HIERARCHY");
    }

    #[test]
    fn test_cycle_via_child_is_rejected() {
        let db = test_db();
        seed_account(&db, "t1", "a", "A");
        seed_account(&db, "t1", "b", "B");
        set_parent(&db, &cfg(), "t1", "b", "a").unwrap();

        let err = set_parent(&db, &cfg(), "t1", "a", "b").unwrap_err();
        assert_eq!(err.code(), "CIRCULAR_HIERARCHY");
    }

    #[test]
    fn test_cycle_via_grandchild_is_rejected() {
        let db = test_db();
        for id in ["a", "b", "c"] {
            seed_account(&db, "t1", id, id);
        }
        set_parent(&db, &cfg(), "t1", "b", "a").unwrap();
        set_parent(&db, &cfg(), "t1", "c", "b").unwrap();

        let err = set_parent(&db, &cfg(), "t1", "a", "c").unwrap_err();
        assert_eq!(err.code(), "CIRCULAR_HIERARCHY");
    }

    #[test]
    fn test_eleventh_link_in_a_chain_is_too_deep() {
        let db = test_db();
        for i in 0..=11 {
            seed_account(&db, "t1", &format!("a{i}"), &format!("A{i}"));
        }
        // Ten links succeed: a10 lands exactly at the level limit.
        for i in 1..=10 {
            let child = format!("a{i}");
            let parent = format!("a{}", i - 1);
            set_parent(&db, &cfg(), "t1", &child, &parent).unwrap();
        }
        let a10 = db.get_account("t1", "a10").unwrap().unwrap();
        assert_eq!(a10.hierarchy_level, 10);

        let err = set_parent(&db, &cfg(), "t1", "a11", "a10").unwrap_err();
        assert_eq!(err.code(), "HIERARCHY_TOO_DEEP");
        // And the failed call left a11 untouched.
        let a11 = db.get_account("t1", "a11").unwrap().unwrap();
        assert_eq!(a11.parent_id, None);
        assert_eq!(a11.hierarchy_level, 0);
    }

    #[test]
    fn test_depth_limit_comes_from_config() {
        let db = test_db();
        let shallow = EngineConfig {
            max_hierarchy_depth: 2,
            ..EngineConfig::default()
        };
        for id in ["a", "b", "c", "d"] {
            seed_account(&db, "t1", id, id);
        }
        set_parent(&db, &shallow, "t1", "b", "a").unwrap();
        set_parent(&db, &shallow, "t1", "c", "b").unwrap();
        let err = set_parent(&db, &shallow, "t1", "d", "c").unwrap_err();
        assert_eq!(err.code(), "HIERARCHY_TOO_DEEP");
    }

    #[test]
    fn test_missing_parent_and_missing_account() {
        let db = test_db();
        seed_account(&db, "t1", "a", "A");
        let err = set_parent(&db, &cfg(), "t1", "a", "ghost").unwrap_err();
        assert_eq!(err.code(), "PARENT_NOT_FOUND");

        let err = set_parent(&db, &cfg(), "t1", "ghost", "a").unwrap_err();
        assert_eq!(err.code(), "ACCOUNT_NOT_FOUND");
    }

    #[test]
    fn test_parent_in_another_tenant_is_invisible() {
        let db = test_db();
        seed_account(&db, "t1", "a", "A");
        seed_account(&db, "t2", "p", "P");
        let err = set_parent(&db, &cfg(), "t1", "a", "p").unwrap_err();
        assert_eq!(err.code(), "PARENT_NOT_FOUND");
    }

    #[test]
    fn test_ancestors_are_root_first() {
        let db = test_db();
        for i in 0..4 {
            seed_account(&db, "t1", &format!("a{i}"), &format!("A{i}"));
        }
        for i in 1..4 {
            set_parent(&db, &cfg(), "t1", &format!("a{i}"), &format!("a{}", i - 1)).unwrap();
        }
        let ancestors = get_ancestors(&db, "t1", "a3").unwrap();
        let ids: Vec<&str> = ancestors.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a0", "a1", "a2"]);

        assert!(get_ancestors(&db, "t1", "a0").unwrap().is_empty());
    }

    #[test]
    fn test_descendants_are_preorder() {
        let db = test_db();
        seed_account(&db, "t1", "r", "Root");
        seed_account(&db, "t1", "c1", "Child A");
        seed_account(&db, "t1", "c2", "Child B");
        seed_account(&db, "t1", "g1", "Grand");
        set_parent(&db, &cfg(), "t1", "c1", "r").unwrap();
        set_parent(&db, &cfg(), "t1", "c2", "r").unwrap();
        set_parent(&db, &cfg(), "t1", "g1", "c1").unwrap();

        let descendants = get_descendants(&db, "t1", "r").unwrap();
        let ids: Vec<&str> = descendants.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "g1", "c2"]);
    }

    #[test]
    fn test_siblings_for_parented_and_root_accounts() {
        let db = test_db();
        seed_account(&db, "t1", "r1", "Root One");
        seed_account(&db, "t1", "r2", "Root Two");
        seed_account(&db, "t1", "c1", "Child A");
        seed_account(&db, "t1", "c2", "Child B");
        set_parent(&db, &cfg(), "t1", "c1", "r1").unwrap();
        set_parent(&db, &cfg(), "t1", "c2", "r1").unwrap();

        let sibs = get_siblings(&db, "t1", "c1").unwrap();
        assert_eq!(sibs.len(), 1);
        assert_eq!(sibs[0].id, "c2");

        let root_sibs = get_siblings(&db, "t1", "r1").unwrap();
        assert_eq!(root_sibs.len(), 1);
        assert_eq!(root_sibs[0].id, "r2");
    }

    #[test]
    fn test_depth_and_count() {
        let db = test_db();
        seed_account(&db, "t1", "solo", "Solo");
        assert_eq!(get_hierarchy_depth(&db, "t1", "solo").unwrap(), 1);
        assert_eq!(get_account_count(&db, "t1", "solo").unwrap(), 1);

        seed_account(&db, "t1", "r", "Root");
        seed_account(&db, "t1", "c1", "Child A");
        seed_account(&db, "t1", "c2", "Child B");
        seed_account(&db, "t1", "g", "Grand");
        set_parent(&db, &cfg(), "t1", "c1", "r").unwrap();
        set_parent(&db, &cfg(), "t1", "c2", "r").unwrap();
        set_parent(&db, &cfg(), "t1", "g", "c1").unwrap();

        assert_eq!(get_hierarchy_depth(&db, "t1", "r").unwrap(), 3);
        assert_eq!(get_account_count(&db, "t1", "r").unwrap(), 4);
        assert_eq!(get_hierarchy_depth(&db, "t1", "c1").unwrap(), 2);
        assert_eq!(get_account_count(&db, "t1", "c1").unwrap(), 2);
    }

    #[test]
    fn test_level_query_includes_shallower_accounts() {
        let db = test_db();
        for i in 0..3 {
            seed_account(&db, "t1", &format!("a{i}"), &format!("A{i}"));
        }
        set_parent(&db, &cfg(), "t1", "a1", "a0").unwrap();
        set_parent(&db, &cfg(), "t1", "a2", "a1").unwrap();

        let upto = get_accounts_at_level(&db, "t1", 1).unwrap();
        let ids: Vec<&str> = upto.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a0", "a1"]);
    }
}
