//! Hierarchy rules shared by organizations and control domains.
//!
//! Every function works on a snapshot of one tenant's nodes of one kind and
//! never touches storage. Callers persist whatever the functions return.

use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

use super::error::TaxonomyError;
use crate::models::{Domain, Organization, OrganizationType};

/// Deepest level a node may sit at. Roots are level 1.
pub const MAX_LEVEL: i32 = 3;

pub const DEFAULT_PATH_SEPARATOR: &str = " > ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomyKind {
    Organization,
    Domain,
}

impl TaxonomyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonomyKind::Organization => "organization",
            TaxonomyKind::Domain => "domain",
        }
    }
}

/// A node of a hierarchical taxonomy.
pub trait TaxonomyNode: Clone {
    const KIND: TaxonomyKind;

    fn id(&self) -> Uuid;
    fn name(&self) -> &str;
    fn parent_id(&self) -> Option<Uuid>;
    fn level(&self) -> i32;
    fn path(&self) -> &str;
    fn set_placement(&mut self, level: i32, path: String);

    /// Kind-specific parent rules. `None` means the node is a root.
    fn check_parent_type(&self, _parent: Option<&Self>) -> Result<(), TaxonomyError> {
        Ok(())
    }
}

impl TaxonomyNode for Organization {
    const KIND: TaxonomyKind = TaxonomyKind::Organization;

    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn parent_id(&self) -> Option<Uuid> {
        self.parent_id
    }

    fn level(&self) -> i32 {
        self.level
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn set_placement(&mut self, level: i32, path: String) {
        self.level = level;
        self.path = path;
    }

    fn check_parent_type(&self, parent: Option<&Self>) -> Result<(), TaxonomyError> {
        match parent {
            None if self.org_type != OrganizationType::Company => Err(
                TaxonomyError::ParentRequired(self.org_type.as_str().to_string()),
            ),
            None => Ok(()),
            Some(parent) if !self.org_type.accepts_parent(parent.org_type) => {
                Err(TaxonomyError::IncompatibleParentType {
                    child: self.org_type.as_str().to_string(),
                    parent: parent.org_type.as_str().to_string(),
                })
            }
            Some(_) => Ok(()),
        }
    }
}

impl TaxonomyNode for Domain {
    const KIND: TaxonomyKind = TaxonomyKind::Domain;

    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn parent_id(&self) -> Option<Uuid> {
        self.parent_id
    }

    fn level(&self) -> i32 {
        self.level
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn set_placement(&mut self, level: i32, path: String) {
        self.level = level;
        self.path = path;
    }
}

/// Derived placement of one node, produced by [`propagate_path_rename`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathUpdate {
    pub id: Uuid,
    pub level: i32,
    pub path: String,
}

/// Id-keyed view over a snapshot with a parent -> children adjacency.
pub struct Taxonomy<'a, N: TaxonomyNode> {
    nodes: HashMap<Uuid, &'a N>,
    children: HashMap<Uuid, Vec<Uuid>>,
}

impl<'a, N: TaxonomyNode> Taxonomy<'a, N> {
    pub fn new(all: &'a [N]) -> Self {
        let mut nodes = HashMap::with_capacity(all.len());
        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for node in all {
            nodes.insert(node.id(), node);
            if let Some(parent_id) = node.parent_id() {
                children.entry(parent_id).or_default().push(node.id());
            }
        }
        Self { nodes, children }
    }

    pub fn get(&self, id: Uuid) -> Option<&'a N> {
        self.nodes.get(&id).copied()
    }

    pub fn children_of(&self, id: Uuid) -> &[Uuid] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ancestors of `id`, nearest first. Stops on a repeated id so corrupt
    /// snapshots cannot loop.
    pub fn ancestor_ids(&self, id: Uuid) -> Vec<Uuid> {
        let mut ancestors = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = self.get(id).and_then(|n| n.parent_id());
        while let Some(parent_id) = current {
            if !seen.insert(parent_id) {
                break;
            }
            ancestors.push(parent_id);
            current = self.get(parent_id).and_then(|n| n.parent_id());
        }
        ancestors
    }

    /// Transitive descendants of `id` in breadth-first order, excluding `id`.
    pub fn descendant_ids(&self, id: Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            for child in self.children_of(current) {
                if seen.insert(*child) {
                    out.push(*child);
                    queue.push_back(*child);
                }
            }
        }
        out
    }

    /// Number of levels below `id`. A leaf has height 0.
    pub fn subtree_height(&self, id: Uuid) -> i32 {
        let mut height = 0;
        let mut seen = HashSet::from([id]);
        let mut queue = VecDeque::from([(id, 0)]);
        while let Some((current, depth)) = queue.pop_front() {
            height = height.max(depth);
            for child in self.children_of(current) {
                if seen.insert(*child) {
                    queue.push_back((*child, depth + 1));
                }
            }
        }
        height
    }
}

/// Level of a node placed under `parent`.
pub fn compute_level<N: TaxonomyNode>(parent: Option<&N>) -> Result<i32, TaxonomyError> {
    let level = parent.map_or(1, |p| p.level() + 1);
    if level > MAX_LEVEL {
        return Err(TaxonomyError::DepthExceeded { max: MAX_LEVEL });
    }
    Ok(level)
}

/// Breadcrumb of a node placed under `parent`.
pub fn compute_path<N: TaxonomyNode>(parent: Option<&N>, own_name: &str, separator: &str) -> String {
    join_path(parent.map(|p| p.path()), own_name, separator)
}

fn join_path(parent_path: Option<&str>, own_name: &str, separator: &str) -> String {
    match parent_path {
        Some(parent_path) if !parent_path.is_empty() => {
            format!("{}{}{}", parent_path, separator, own_name)
        }
        _ => own_name.to_string(),
    }
}

/// Check that `entity` may hang under `candidate_parent_id`.
///
/// `all` is the tenant snapshot; it may or may not contain `entity` itself.
pub fn validate_parent_assignment<N: TaxonomyNode>(
    entity: &N,
    candidate_parent_id: Option<Uuid>,
    all: &[N],
) -> Result<(), TaxonomyError> {
    let Some(parent_id) = candidate_parent_id else {
        return entity.check_parent_type(None);
    };

    if parent_id == entity.id() {
        return Err(TaxonomyError::SelfParent);
    }

    let index = Taxonomy::new(all);
    let parent = index
        .get(parent_id)
        .ok_or(TaxonomyError::ParentNotFound(parent_id))?;

    if index.ancestor_ids(parent_id).contains(&entity.id()) {
        return Err(TaxonomyError::CycleDetected);
    }

    if parent.level() >= MAX_LEVEL
        || parent.level() + 1 + index.subtree_height(entity.id()) > MAX_LEVEL
    {
        return Err(TaxonomyError::DepthExceeded { max: MAX_LEVEL });
    }

    entity.check_parent_type(Some(parent))
}

/// Check that the existing children of `entity` still accept it as a parent,
/// e.g. after its type changed.
pub fn validate_child_types<N: TaxonomyNode>(entity: &N, all: &[N]) -> Result<(), TaxonomyError> {
    let index = Taxonomy::new(all);
    for child_id in index.children_of(entity.id()) {
        if let Some(child) = index.get(*child_id) {
            child.check_parent_type(Some(entity))?;
        }
    }
    Ok(())
}

/// Recompute level and path for `entity` and every transitive descendant.
///
/// `entity` carries its new name and parent; `all` is the stored snapshot.
/// The first update is for `entity`, followed by descendants breadth-first.
pub fn propagate_path_rename<N: TaxonomyNode>(
    entity: &N,
    all: &[N],
    separator: &str,
) -> Result<Vec<PathUpdate>, TaxonomyError> {
    let index = Taxonomy::new(all);
    let parent = match entity.parent_id() {
        Some(parent_id) => Some(
            index
                .get(parent_id)
                .ok_or(TaxonomyError::ParentNotFound(parent_id))?,
        ),
        None => None,
    };

    let level = compute_level(parent)?;
    let path = compute_path(parent, entity.name(), separator);
    let mut updates = vec![PathUpdate {
        id: entity.id(),
        level,
        path: path.clone(),
    }];

    let mut seen = HashSet::from([entity.id()]);
    let mut queue = VecDeque::from([(entity.id(), level, path)]);
    while let Some((current, current_level, current_path)) = queue.pop_front() {
        for child_id in index.children_of(current) {
            if !seen.insert(*child_id) {
                continue;
            }
            let Some(child) = index.get(*child_id) else {
                continue;
            };
            let child_level = current_level + 1;
            if child_level > MAX_LEVEL {
                return Err(TaxonomyError::DepthExceeded { max: MAX_LEVEL });
            }
            let child_path = join_path(Some(&current_path), child.name(), separator);
            updates.push(PathUpdate {
                id: *child_id,
                level: child_level,
                path: child_path.clone(),
            });
            queue.push_back((*child_id, child_level, child_path));
        }
    }

    Ok(updates)
}

/// Validate and derive placement for a created or edited node.
///
/// Sets `entity`'s own level and path and returns the updates for its
/// descendants.
pub fn place<N: TaxonomyNode>(
    entity: &mut N,
    all: &[N],
    separator: &str,
) -> Result<Vec<PathUpdate>, TaxonomyError> {
    validate_parent_assignment(entity, entity.parent_id(), all)?;
    validate_child_types(entity, all)?;

    let mut updates = propagate_path_rename(entity, all, separator)?;
    let own = updates.remove(0);
    entity.set_placement(own.level, own.path);
    Ok(updates)
}

/// True when `entity` has neither children nor dependent resources.
pub fn can_delete<N: TaxonomyNode>(
    entity: &N,
    all: &[N],
    dependent_counts: &HashMap<Uuid, i64>,
) -> bool {
    ensure_deletable(entity, all, dependent_counts).is_ok()
}

pub fn ensure_deletable<N: TaxonomyNode>(
    entity: &N,
    all: &[N],
    dependent_counts: &HashMap<Uuid, i64>,
) -> Result<(), TaxonomyError> {
    let children = all
        .iter()
        .filter(|n| n.parent_id() == Some(entity.id()))
        .count();
    let resources = dependent_counts.get(&entity.id()).copied().unwrap_or(0);
    if children > 0 || resources > 0 {
        return Err(TaxonomyError::HasDependents {
            children,
            resources,
        });
    }
    Ok(())
}

/// Nested rendering of a taxonomy.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode<N> {
    #[serde(flatten)]
    pub node: N,
    pub children: Vec<TreeNode<N>>,
}

/// Build a forest from a flat list, keeping input order among siblings.
/// Nodes whose parent is not in the list are treated as roots.
pub fn build_tree<N: TaxonomyNode>(nodes: Vec<N>) -> Vec<TreeNode<N>> {
    let ids: HashSet<Uuid> = nodes.iter().map(|n| n.id()).collect();
    let mut children_map: HashMap<Uuid, Vec<N>> = HashMap::new();
    let mut roots: Vec<N> = Vec::new();

    for node in nodes {
        match node.parent_id() {
            Some(parent_id) if ids.contains(&parent_id) && parent_id != node.id() => {
                children_map.entry(parent_id).or_default().push(node)
            }
            _ => roots.push(node),
        }
    }

    fn build_subtree<N: TaxonomyNode>(
        node: N,
        children_map: &mut HashMap<Uuid, Vec<N>>,
    ) -> TreeNode<N> {
        let children = children_map
            .remove(&node.id())
            .unwrap_or_default()
            .into_iter()
            .map(|child| build_subtree(child, children_map))
            .collect();
        TreeNode { node, children }
    }

    roots
        .into_iter()
        .map(|node| build_subtree(node, &mut children_map))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const SEP: &str = DEFAULT_PATH_SEPARATOR;

    fn domain(name: &str, parent: Option<&Domain>) -> Domain {
        let mut d = Domain::new(
            Uuid::nil(),
            name.to_string(),
            format!("{} controls", name),
            parent.map(|p| p.id),
            Utc::now(),
        );
        let level = compute_level(parent).unwrap();
        let path = compute_path(parent, name, SEP);
        d.set_placement(level, path);
        d
    }

    fn org(name: &str, org_type: OrganizationType, parent: Option<&Organization>) -> Organization {
        let mut o = Organization::new(
            Uuid::nil(),
            name.to_string(),
            org_type,
            None,
            parent.map(|p| p.id),
            Utc::now(),
        );
        o.set_placement(
            compute_level(parent).unwrap(),
            compute_path(parent, name, SEP),
        );
        o
    }

    /// A -> B -> C chain.
    fn chain() -> (Domain, Domain, Domain) {
        let a = domain("A", None);
        let b = domain("B", Some(&a));
        let c = domain("C", Some(&b));
        (a, b, c)
    }

    #[test]
    fn root_and_child_placement() {
        let acme = org("Acme", OrganizationType::Company, None);
        let security = org("Security", OrganizationType::Department, Some(&acme));
        assert_eq!(acme.level, 1);
        assert_eq!(acme.path, "Acme");
        assert_eq!(security.level, 2);
        assert_eq!(security.path, "Acme > Security");
    }

    #[test]
    fn child_of_level_three_node_is_too_deep() {
        let (a, b, c) = chain();
        assert_eq!(c.level, 3);
        assert_eq!(
            compute_level(Some(&c)),
            Err(TaxonomyError::DepthExceeded { max: MAX_LEVEL })
        );

        let all = vec![a, b, c.clone()];
        let d = Domain::new(Uuid::nil(), "D".into(), "too deep".into(), Some(c.id), Utc::now());
        assert_eq!(
            validate_parent_assignment(&d, Some(c.id), &all),
            Err(TaxonomyError::DepthExceeded { max: MAX_LEVEL })
        );
    }

    #[test]
    fn reparenting_root_under_its_descendant_is_a_cycle() {
        let (a, b, c) = chain();
        let all = vec![a.clone(), b, c.clone()];
        assert_eq!(
            validate_parent_assignment(&a, Some(c.id), &all),
            Err(TaxonomyError::CycleDetected)
        );
    }

    #[test]
    fn self_parent_is_rejected() {
        let (a, b, c) = chain();
        let all = vec![a, b.clone(), c];
        assert_eq!(
            validate_parent_assignment(&b, Some(b.id), &all),
            Err(TaxonomyError::SelfParent)
        );
    }

    #[test]
    fn every_descendant_is_rejected_as_parent() {
        let (a, b, c) = chain();
        let all = vec![a.clone(), b.clone(), c.clone()];
        for candidate in [b.id, c.id] {
            assert_eq!(
                validate_parent_assignment(&a, Some(candidate), &all),
                Err(TaxonomyError::CycleDetected)
            );
        }
    }

    #[test]
    fn unknown_parent_is_reported() {
        let (a, _, _) = chain();
        let missing = Uuid::new_v4();
        assert_eq!(
            validate_parent_assignment(&a, Some(missing), &[a.clone()]),
            Err(TaxonomyError::ParentNotFound(missing))
        );
    }

    #[test]
    fn moving_a_subtree_checks_its_height() {
        // X -> Y is a two-level subtree; P -> Q puts Q at level 2.
        let x = domain("X", None);
        let y = domain("Y", Some(&x));
        let p = domain("P", None);
        let q = domain("Q", Some(&p));
        let all = vec![x.clone(), y, p.clone(), q.clone()];

        assert_eq!(
            validate_parent_assignment(&x, Some(q.id), &all),
            Err(TaxonomyError::DepthExceeded { max: MAX_LEVEL })
        );
        assert_eq!(validate_parent_assignment(&x, Some(p.id), &all), Ok(()));
    }

    #[test]
    fn organization_parent_rules() {
        use OrganizationType::*;
        let acme = org("Acme", Company, None);
        let security = org("Security", Department, Some(&acme));
        let all = vec![acme.clone(), security.clone()];

        let mut nested_dept = org("Ops", Department, None);
        nested_dept.parent_id = Some(security.id);
        assert_eq!(
            validate_parent_assignment(&nested_dept, Some(security.id), &all),
            Err(TaxonomyError::IncompatibleParentType {
                child: "department".into(),
                parent: "department".into(),
            })
        );

        let other = org("Globex", Company, None);
        assert!(matches!(
            validate_parent_assignment(&other, Some(acme.id), &all),
            Err(TaxonomyError::IncompatibleParentType { .. })
        ));

        let orphan = Organization::new(Uuid::nil(), "SOC".into(), Unit, None, None, Utc::now());
        assert_eq!(
            validate_parent_assignment(&orphan, None, &all),
            Err(TaxonomyError::ParentRequired("unit".into()))
        );

        let unit = Organization::new(Uuid::nil(), "SOC".into(), Unit, None, Some(security.id), Utc::now());
        assert_eq!(validate_parent_assignment(&unit, Some(security.id), &all), Ok(()));
        let division = Organization::new(Uuid::nil(), "EMEA".into(), Division, None, Some(acme.id), Utc::now());
        assert_eq!(validate_parent_assignment(&division, Some(acme.id), &all), Ok(()));
    }

    #[test]
    fn retyping_a_parent_checks_its_children() {
        use OrganizationType::*;
        let acme = org("Acme", Company, None);
        let security = org("Security", Department, Some(&acme));
        let soc = org("SOC", Unit, Some(&security));
        let all = vec![acme, security.clone(), soc];

        let mut retyped = security;
        retyped.org_type = Unit;
        assert!(matches!(
            validate_child_types(&retyped, &all),
            Err(TaxonomyError::IncompatibleParentType { .. })
        ));
    }

    #[test]
    fn rename_rewrites_every_descendant_path() {
        let (a, b, c) = chain();
        let all = vec![a.clone(), b.clone(), c.clone()];

        let mut renamed = a.clone();
        renamed.name = "Alpha".to_string();
        let updates = propagate_path_rename(&renamed, &all, SEP).unwrap();

        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].path, "Alpha");
        assert_eq!(updates[1], PathUpdate { id: b.id, level: 2, path: "Alpha > B".into() });
        assert_eq!(updates[2], PathUpdate { id: c.id, level: 3, path: "Alpha > B > C".into() });
    }

    #[test]
    fn reparent_emits_one_update_per_moved_node() {
        // R1 -> M -> {L1, L2}; move M under R2.
        let r1 = domain("R1", None);
        let r2 = domain("R2", None);
        let m = domain("M", Some(&r1));
        let l1 = domain("L1", Some(&m));
        let l2 = domain("L2", Some(&m));
        let all = vec![r1, r2.clone(), m.clone(), l1, l2];

        let mut moved = m.clone();
        moved.parent_id = Some(r2.id);
        let updates = place(&mut moved, &all, SEP).unwrap();

        assert_eq!(updates.len(), 2);
        assert_eq!(moved.path, "R2 > M");
        assert_eq!(moved.level, 2);
        for update in &updates {
            assert_eq!(update.level, 3);
            assert!(update.path.starts_with("R2 > M > "));
        }
    }

    #[test]
    fn detaching_makes_a_root() {
        let (a, b, c) = chain();
        let all = vec![a, b.clone(), c];
        let mut detached = b;
        detached.parent_id = None;
        let updates = place(&mut detached, &all, SEP).unwrap();
        assert_eq!(detached.level, 1);
        assert_eq!(detached.path, "B");
        assert_eq!(updates[0].path, "B > C");
        assert_eq!(updates[0].level, 2);
    }

    #[test]
    fn custom_separator_is_used() {
        let (a, b, c) = chain();
        let updates = propagate_path_rename(&a, &[a.clone(), b, c], "/").unwrap();
        assert_eq!(updates[1].path, "A/B");
        assert_eq!(updates[2].path, "A/B/C");
    }

    #[test]
    fn corrupt_cycle_in_snapshot_terminates() {
        let mut x = domain("X", None);
        let mut y = domain("Y", None);
        x.parent_id = Some(y.id);
        y.parent_id = Some(x.id);
        let all = vec![x.clone(), y.clone()];
        let index = Taxonomy::new(&all);
        assert_eq!(index.ancestor_ids(x.id), vec![y.id]);
        assert_eq!(index.descendant_ids(x.id), vec![y.id]);
    }

    #[test]
    fn delete_guard_truth_table() {
        let (a, b, c) = chain();
        let all = vec![a.clone(), b.clone(), c.clone()];
        let mut counts = HashMap::new();

        assert!(!can_delete(&a, &all, &counts));
        assert!(can_delete(&c, &all, &counts));

        counts.insert(c.id, 2);
        assert!(!can_delete(&c, &all, &counts));
        assert_eq!(
            ensure_deletable(&c, &all, &counts),
            Err(TaxonomyError::HasDependents { children: 0, resources: 2 })
        );
        assert_eq!(
            ensure_deletable(&b, &all, &counts),
            Err(TaxonomyError::HasDependents { children: 1, resources: 0 })
        );
    }

    #[test]
    fn tree_nests_children_under_parents() {
        let (a, b, c) = chain();
        let lone = domain("Z", None);
        let tree = build_tree(vec![a.clone(), b.clone(), c.clone(), lone.clone()]);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].node.id, a.id);
        assert_eq!(tree[0].children[0].node.id, b.id);
        assert_eq!(tree[0].children[0].children[0].node.id, c.id);
        assert!(tree[1].children.is_empty());

        let json = serde_json::to_value(&tree[0]).unwrap();
        assert_eq!(json["name"], "A");
        assert_eq!(json["children"][0]["path"], "A > B");
    }
}
