use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// An operation a subject may perform on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
}

impl Action {
    pub const ALL: [Action; 2] = [Action::Read, Action::Write];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's standing within a group.
///
/// Variants are declared lowest first so that the derived `Ord` is the precedence order:
/// `Owner > Admin > Member`. Owner and Admin imply the same actions; Owner still sorts
/// above Admin so it is the one reported when a user holds both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Admin,
    Owner,
}

impl Role {
    /// Highest precedence first.
    pub const ALL: [Role; 3] = [Role::Owner, Role::Admin, Role::Member];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }

    /// Actions this role implies on the group's own identity.
    pub fn actions(&self) -> &'static [Action] {
        match self {
            Role::Owner | Role::Admin => &[Action::Read, Action::Write],
            Role::Member => &[Action::Read],
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        self.actions().contains(&action)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `subject` may perform `action` on `resource`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GrantTuple {
    pub subject: String,
    pub resource: String,
    pub action: Action,
}

impl GrantTuple {
    pub fn new(subject: impl Into<String>, resource: impl Into<String>, action: Action) -> Self {
        Self {
            subject: subject.into(),
            resource: resource.into(),
            action,
        }
    }
}

/// `user` holds `role` in `group`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MembershipTuple {
    pub user: String,
    pub group: String,
    pub role: Role,
}

impl MembershipTuple {
    pub fn new(user: impl Into<String>, group: impl Into<String>, role: Role) -> Self {
        Self {
            user: user.into(),
            group: group.into(),
            role,
        }
    }
}

/// Either kind of persisted policy fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tuple {
    Grant(GrantTuple),
    Membership(MembershipTuple),
}

impl From<GrantTuple> for Tuple {
    fn from(value: GrantTuple) -> Self {
        Tuple::Grant(value)
    }
}

impl From<MembershipTuple> for Tuple {
    fn from(value: MembershipTuple) -> Self {
        Tuple::Membership(value)
    }
}

/// Selects tuples for deletion. `None` fields match anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TuplePattern {
    Grant {
        subject: Option<String>,
        resource: Option<String>,
        action: Option<Action>,
    },
    Membership {
        user: Option<String>,
        group: Option<String>,
        role: Option<Role>,
    },
}

impl TuplePattern {
    /// Pattern matching exactly one tuple.
    pub fn exact(tuple: &Tuple) -> Self {
        match tuple {
            Tuple::Grant(g) => TuplePattern::Grant {
                subject: Some(g.subject.clone()),
                resource: Some(g.resource.clone()),
                action: Some(g.action),
            },
            Tuple::Membership(m) => TuplePattern::Membership {
                user: Some(m.user.clone()),
                group: Some(m.group.clone()),
                role: Some(m.role),
            },
        }
    }

    /// Every grant whose resource is `resource`, whatever the subject or action.
    pub fn grants_on(resource: impl Into<String>) -> Self {
        TuplePattern::Grant {
            subject: None,
            resource: Some(resource.into()),
            action: None,
        }
    }

    /// A pattern with no field set would match the whole collection.
    pub fn is_unbounded(&self) -> bool {
        match self {
            TuplePattern::Grant {
                subject,
                resource,
                action,
            } => subject.is_none() && resource.is_none() && action.is_none(),
            TuplePattern::Membership { user, group, role } => {
                user.is_none() && group.is_none() && role.is_none()
            }
        }
    }

    pub fn matches(&self, tuple: &Tuple) -> bool {
        fn field<T: PartialEq>(want: &Option<T>, have: &T) -> bool {
            want.as_ref().map_or(true, |w| w == have)
        }

        match (self, tuple) {
            (
                TuplePattern::Grant {
                    subject,
                    resource,
                    action,
                },
                Tuple::Grant(g),
            ) => field(subject, &g.subject) && field(resource, &g.resource) && field(action, &g.action),
            (TuplePattern::Membership { user, group, role }, Tuple::Membership(m)) => {
                field(user, &m.user) && field(group, &m.group) && field(role, &m.role)
            }
            _ => false,
        }
    }
}

/// In-memory mirror of every persisted tuple, indexed for the decision algorithm.
///
/// Empty inner collections are pruned on removal, so a group is "known" exactly as long
/// as at least one membership names it.
#[derive(Debug, Clone, Default)]
pub struct TupleIndex {
    /// (resource, action) -> subjects holding that grant
    grants_by_resource: HashMap<(String, Action), BTreeSet<String>>,
    /// group -> user -> roles
    members_by_group: HashMap<String, HashMap<String, BTreeSet<Role>>>,
    /// user -> group -> roles
    groups_by_user: HashMap<String, HashMap<String, BTreeSet<Role>>>,
}

impl TupleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tuples(tuples: impl IntoIterator<Item = Tuple>) -> Self {
        let mut idx = Self::new();
        for tuple in tuples {
            idx.insert(&tuple);
        }
        idx
    }

    /// Returns `false` if the tuple was already present.
    pub fn insert(&mut self, tuple: &Tuple) -> bool {
        match tuple {
            Tuple::Grant(g) => self.insert_grant(g),
            Tuple::Membership(m) => self.insert_membership(m),
        }
    }

    pub fn contains(&self, tuple: &Tuple) -> bool {
        match tuple {
            Tuple::Grant(g) => self.has_grant(&g.subject, &g.resource, g.action),
            Tuple::Membership(m) => self
                .roles_of(&m.user, &m.group)
                .is_some_and(|roles| roles.contains(&m.role)),
        }
    }

    /// Returns `false` if the tuple was not present.
    pub fn remove(&mut self, tuple: &Tuple) -> bool {
        match tuple {
            Tuple::Grant(g) => self.remove_grant(g),
            Tuple::Membership(m) => self.remove_membership(m),
        }
    }

    pub fn insert_grant(&mut self, grant: &GrantTuple) -> bool {
        self.grants_by_resource
            .entry((grant.resource.clone(), grant.action))
            .or_default()
            .insert(grant.subject.clone())
    }

    pub fn remove_grant(&mut self, grant: &GrantTuple) -> bool {
        let key = (grant.resource.clone(), grant.action);
        let Some(subjects) = self.grants_by_resource.get_mut(&key) else {
            return false;
        };
        let removed = subjects.remove(&grant.subject);
        if subjects.is_empty() {
            self.grants_by_resource.remove(&key);
        }
        removed
    }

    pub fn has_grant(&self, subject: &str, resource: &str, action: Action) -> bool {
        self.grants_by_resource
            .get(&(resource.to_string(), action))
            .is_some_and(|subjects| subjects.contains(subject))
    }

    /// Subjects (users or groups) granted `action` on `resource`.
    pub fn grantees(&self, resource: &str, action: Action) -> impl Iterator<Item = &str> {
        self.grants_by_resource
            .get(&(resource.to_string(), action))
            .into_iter()
            .flat_map(|subjects| subjects.iter().map(String::as_str))
    }

    /// All grants on `resource`, ordered by action then subject.
    pub fn grants_for_resource(&self, resource: &str) -> Vec<GrantTuple> {
        Action::ALL
            .iter()
            .flat_map(|&action| {
                self.grantees(resource, action)
                    .map(move |subject| GrantTuple::new(subject, resource, action))
            })
            .collect()
    }

    /// Drop every grant on `resource`. Returns how many were removed.
    pub fn remove_resource(&mut self, resource: &str) -> usize {
        Action::ALL
            .iter()
            .filter_map(|&action| self.grants_by_resource.remove(&(resource.to_string(), action)))
            .map(|subjects| subjects.len())
            .sum()
    }

    pub fn insert_membership(&mut self, membership: &MembershipTuple) -> bool {
        let inserted = self
            .members_by_group
            .entry(membership.group.clone())
            .or_default()
            .entry(membership.user.clone())
            .or_default()
            .insert(membership.role);

        self.groups_by_user
            .entry(membership.user.clone())
            .or_default()
            .entry(membership.group.clone())
            .or_default()
            .insert(membership.role);

        inserted
    }

    pub fn remove_membership(&mut self, membership: &MembershipTuple) -> bool {
        let removed = prune(
            &mut self.members_by_group,
            &membership.group,
            &membership.user,
            membership.role,
        );
        prune(
            &mut self.groups_by_user,
            &membership.user,
            &membership.group,
            membership.role,
        );
        removed
    }

    pub fn is_group(&self, id: &str) -> bool {
        self.members_by_group.contains_key(id)
    }

    /// Every role `user` holds in `group`, if any.
    pub fn roles_of(&self, user: &str, group: &str) -> Option<&BTreeSet<Role>> {
        self.groups_by_user.get(user)?.get(group)
    }

    /// The highest-precedence role `user` holds in `group`.
    pub fn highest_role(&self, user: &str, group: &str) -> Option<Role> {
        self.roles_of(user, group)?.iter().next_back().copied()
    }

    pub fn is_member(&self, user: &str, group: &str) -> bool {
        self.roles_of(user, group).is_some_and(|roles| !roles.is_empty())
    }

    /// group -> highest role, for every group `user` belongs to.
    pub fn groups_for_user(&self, user: &str) -> HashMap<String, Role> {
        collapse(self.groups_by_user.get(user))
    }

    /// user -> highest role, for every member of `group`.
    pub fn members_of(&self, group: &str) -> HashMap<String, Role> {
        collapse(self.members_by_group.get(group))
    }

    pub fn grant_count(&self) -> usize {
        self.grants_by_resource.values().map(|v| v.len()).sum()
    }

    pub fn membership_count(&self) -> usize {
        self.members_by_group
            .values()
            .flat_map(|users| users.values())
            .map(|roles| roles.len())
            .sum()
    }
}

fn prune(
    map: &mut HashMap<String, HashMap<String, BTreeSet<Role>>>,
    outer: &str,
    inner: &str,
    role: Role,
) -> bool {
    let Some(by_inner) = map.get_mut(outer) else {
        return false;
    };
    let Some(roles) = by_inner.get_mut(inner) else {
        return false;
    };
    let removed = roles.remove(&role);
    if roles.is_empty() {
        by_inner.remove(inner);
    }
    if by_inner.is_empty() {
        map.remove(outer);
    }
    removed
}

fn collapse(entries: Option<&HashMap<String, BTreeSet<Role>>>) -> HashMap<String, Role> {
    entries
        .into_iter()
        .flatten()
        .filter_map(|(key, roles)| roles.iter().next_back().map(|role| (key.clone(), *role)))
        .collect()
}
