use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::authz::admins::AdminRegistry;
use crate::authz::errors::AuthzError;
use crate::authz::store::{StoreError, TupleStore};
use crate::authz::types::{Action, GrantTuple, MembershipTuple, Role, Tuple, TupleIndex, TuplePattern};

/// Why a check came out the way it did. The first matching step wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Subject is a system administrator.
    SystemAdmin,
    /// Resource is a group and the subject's highest role there implies the action.
    GroupRole(Role),
    /// Resource is a group the subject belongs to, but only as a role that does not
    /// imply the action. Members may read their group, never write it.
    GroupRoleDenied(Role),
    /// Subject holds the grant itself.
    DirectGrant,
    /// The grant belongs to a group the subject is a member of.
    InheritedGrant { group: String },
    Denied,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Decision::Denied | Decision::GroupRoleDenied(_))
    }
}

/// Decides `(subject, resource, action)` checks and applies policy mutations.
///
/// Checks run against an in-memory mirror of the tuple store under a read lock, so they
/// never block each other. Mutations are serialized: each one writes the store first and
/// only then touches the mirror, inside a single short write lock. Dropping a mutation's
/// future does not abandon a write that has already started.
pub struct AuthorizationEngine {
    store: Arc<dyn TupleStore>,
    tuples: Arc<RwLock<TupleIndex>>,
    admins: AdminRegistry,
    write_gate: Arc<Mutex<()>>,
}

impl AuthorizationEngine {
    /// Load every persisted tuple and seed the system administrators.
    pub async fn init(
        store: Arc<dyn TupleStore>,
        initial_admins_csv: &str,
    ) -> Result<Self, AuthzError> {
        let loaded = store.load_all().await?;
        let tuples = TupleIndex::from_tuples(loaded);

        info!(
            grants = tuples.grant_count(),
            memberships = tuples.membership_count(),
            "Loaded permission tuples"
        );

        let engine = Self {
            store,
            tuples: Arc::new(RwLock::new(tuples)),
            admins: AdminRegistry::new(),
            write_gate: Arc::new(Mutex::new(())),
        };
        engine.reload(initial_admins_csv);
        Ok(engine)
    }

    /// Replace the system administrators with the comma-separated `admins_csv`.
    pub fn reload(&self, admins_csv: &str) -> usize {
        let count = self.admins.reload(admins_csv);
        info!(admins = count, "Reloaded system administrators");
        count
    }

    pub fn is_system_admin(&self, subject: &str) -> bool {
        self.admins.contains(subject)
    }

    pub fn system_admins(&self) -> Arc<HashSet<String>> {
        self.admins.snapshot()
    }

    // ---------- queries ----------

    pub fn explain(&self, subject: &str, resource: &str, action: Action) -> Decision {
        if self.admins.contains(subject) {
            return Decision::SystemAdmin;
        }
        decide(&self.read(), subject, resource, action)
    }

    pub fn is_authorized(&self, subject: &str, resource: &str, action: Action) -> bool {
        let decision = self.explain(subject, resource, action);
        trace!(subject, resource, %action, ?decision, "Authorization check");
        decision.is_allowed()
    }

    /// Like [`is_authorized`](Self::is_authorized), but a denial is an
    /// [`AuthzError::Unauthorized`] the caller can propagate with `?`.
    pub fn authorize(&self, subject: &str, resource: &str, action: Action) -> Result<(), AuthzError> {
        if self.is_authorized(subject, resource, action) {
            Ok(())
        } else {
            Err(AuthzError::Unauthorized {
                subject: subject.to_string(),
                resource: resource.to_string(),
                action,
            })
        }
    }

    pub fn role_of(&self, user: &str, group: &str) -> Option<Role> {
        self.read().highest_role(user, group)
    }

    /// group -> highest role held, for every group `user` belongs to.
    pub fn get_groups_and_roles_for_user(&self, user: &str) -> HashMap<String, Role> {
        self.read().groups_for_user(user)
    }

    /// member -> highest role held, for every member of `group`.
    pub fn members_of_group(&self, group: &str) -> HashMap<String, Role> {
        self.read().members_of(group)
    }

    pub fn grants_for_resource(&self, resource: &str) -> Vec<GrantTuple> {
        self.read().grants_for_resource(resource)
    }

    pub fn is_group(&self, id: &str) -> bool {
        self.read().is_group(id)
    }

    // ---------- mutations ----------

    /// Returns `false` if the grant already existed.
    pub async fn add_permission(
        &self,
        subject: &str,
        resource: &str,
        action: Action,
    ) -> Result<bool, AuthzError> {
        self.insert(GrantTuple::new(subject, resource, action).into()).await
    }

    /// Returns `false` if there was no such grant.
    pub async fn remove_permission(
        &self,
        subject: &str,
        resource: &str,
        action: Action,
    ) -> Result<bool, AuthzError> {
        self.remove(GrantTuple::new(subject, resource, action).into()).await
    }

    /// Other roles `user` already holds in `group` are kept.
    pub async fn add_user_group_role(
        &self,
        user: &str,
        group: &str,
        role: Role,
    ) -> Result<bool, AuthzError> {
        self.insert(MembershipTuple::new(user, group, role).into()).await
    }

    /// Removes exactly this role; any other role for the pair stays.
    pub async fn remove_user_group_role(
        &self,
        user: &str,
        group: &str,
        role: Role,
    ) -> Result<bool, AuthzError> {
        self.remove(MembershipTuple::new(user, group, role).into()).await
    }

    /// Drop every grant on `resource`, whoever holds it. Memberships are untouched,
    /// even when `resource` is a group.
    pub async fn remove_resource(&self, resource: &str) -> Result<bool, AuthzError> {
        self.commit(Change::RemoveResource(resource.to_string())).await
    }

    async fn insert(&self, tuple: Tuple) -> Result<bool, AuthzError> {
        self.commit(Change::Insert(tuple)).await
    }

    async fn remove(&self, tuple: Tuple) -> Result<bool, AuthzError> {
        self.commit(Change::Remove(tuple)).await
    }

    /// Apply `change` on its own task while holding the writer gate. The task runs to
    /// completion even if the caller stops polling, so the durable write and the mirror
    /// update always happen together.
    async fn commit(&self, change: Change) -> Result<bool, AuthzError> {
        let gate = Arc::clone(&self.write_gate).lock_owned().await;
        let store = Arc::clone(&self.store);
        let tuples = Arc::clone(&self.tuples);

        let task = tokio::spawn(async move {
            let _gate = gate;
            change.apply(store.as_ref(), &tuples).await
        });

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(StoreError::Interrupted(e.to_string()).into()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, TupleIndex> {
        read(&self.tuples)
    }
}

/// A single mutation: durable write first, then the mirror.
#[derive(Debug)]
enum Change {
    Insert(Tuple),
    Remove(Tuple),
    RemoveResource(String),
}

impl Change {
    async fn apply(
        self,
        store: &dyn TupleStore,
        tuples: &RwLock<TupleIndex>,
    ) -> Result<bool, AuthzError> {
        match self {
            Change::Insert(tuple) => {
                let exists = read(tuples).contains(&tuple);
                if exists {
                    return Ok(false);
                }

                store
                    .insert(&tuple)
                    .await
                    .inspect_err(|e| warn!(?tuple, error = %e, "Failed to persist tuple"))?;
                write(tuples).insert(&tuple);

                debug!(?tuple, "Added tuple");
                Ok(true)
            }
            Change::Remove(tuple) => {
                let exists = read(tuples).contains(&tuple);
                if !exists {
                    return Ok(false);
                }

                store
                    .delete(&TuplePattern::exact(&tuple))
                    .await
                    .inspect_err(|e| warn!(?tuple, error = %e, "Failed to delete tuple"))?;
                write(tuples).remove(&tuple);

                debug!(?tuple, "Removed tuple");
                Ok(true)
            }
            Change::RemoveResource(resource) => {
                let present = read(tuples).grants_for_resource(&resource).len();
                if present == 0 {
                    return Ok(false);
                }

                let deleted = store
                    .delete(&TuplePattern::grants_on(&resource))
                    .await
                    .inspect_err(|e| {
                        warn!(%resource, error = %e, "Failed to remove resource grants")
                    })?;
                let removed = write(tuples).remove_resource(&resource);

                debug!(%resource, removed, deleted, "Removed resource grants");
                Ok(removed > 0)
            }
        }
    }
}

fn read(tuples: &RwLock<TupleIndex>) -> RwLockReadGuard<'_, TupleIndex> {
    tuples.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(tuples: &RwLock<TupleIndex>) -> RwLockWriteGuard<'_, TupleIndex> {
    tuples.write().unwrap_or_else(PoisonError::into_inner)
}

/// Steps 2 to 5 of the check; the admin bypass happens before the lock is taken.
fn decide(tuples: &TupleIndex, subject: &str, resource: &str, action: Action) -> Decision {
    // The group's own identity is role-sensitive
    if tuples.is_group(resource) {
        if let Some(role) = tuples.highest_role(subject, resource) {
            return if role.allows(action) {
                Decision::GroupRole(role)
            } else {
                Decision::GroupRoleDenied(role)
            };
        }
    }

    if tuples.has_grant(subject, resource, action) {
        return Decision::DirectGrant;
    }

    // Grants held by a group reach every member, whatever their role
    let inherited = tuples
        .grantees(resource, action)
        .find(|grantee| tuples.is_member(subject, grantee));
    if let Some(group) = inherited {
        return Decision::InheritedGrant {
            group: group.to_string(),
        };
    }

    Decision::Denied
}
