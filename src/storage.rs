use crate::authz::engine::AuthorizationEngine;
use crate::authz::store::{StoreError, TupleStore};
use crate::authz::types::{Action, GrantTuple, MembershipTuple, Role, Tuple, TuplePattern};
use crate::entities;
use crate::errors::PermissionsError;
use crate::settings::Database as DbCfg;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;

/// Connect to the configured database and bring the schema up to date.
pub async fn init(cfg: &DbCfg) -> Result<DatabaseConnection, PermissionsError> {
    let db = Database::connect(&cfg.url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

/// Connect, migrate and load the whole policy into a ready engine.
pub async fn open_engine(
    cfg: &DbCfg,
    initial_admins_csv: &str,
) -> Result<AuthorizationEngine, PermissionsError> {
    let db = init(cfg).await?;
    let store = Arc::new(DbTupleStore::new(db));
    Ok(AuthorizationEngine::init(store, initial_admins_csv).await?)
}

/// Relational tuple store: one row per grant in `grant_tuples`, one per membership in
/// `membership_tuples`.
#[derive(Debug, Clone)]
pub struct DbTupleStore {
    db: DatabaseConnection,
}

impl DbTupleStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn load_grants(&self) -> Result<Vec<Tuple>, StoreError> {
        use entities::grant_tuple::{Column, Entity};

        Entity::find()
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|row| -> Result<Tuple, StoreError> {
                let action = Action::parse(&row.action).ok_or_else(|| {
                    StoreError::Corrupt(format!(
                        "grant {} has unknown action `{}`",
                        row.id, row.action
                    ))
                })?;
                Ok(GrantTuple::new(row.subject, row.resource, action).into())
            })
            .collect()
    }

    async fn load_memberships(&self) -> Result<Vec<Tuple>, StoreError> {
        use entities::membership_tuple::{Column, Entity};

        Entity::find()
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|row| -> Result<Tuple, StoreError> {
                let role = Role::parse(&row.role).ok_or_else(|| {
                    StoreError::Corrupt(format!(
                        "membership {} has unknown role `{}`",
                        row.id, row.role
                    ))
                })?;
                Ok(MembershipTuple::new(row.user_id, row.group_id, role).into())
            })
            .collect()
    }

    async fn insert_grant(&self, grant: &GrantTuple) -> Result<(), StoreError> {
        use entities::grant_tuple::{ActiveModel, Column, Entity};

        let row = ActiveModel {
            subject: Set(grant.subject.clone()),
            resource: Set(grant.resource.clone()),
            action: Set(grant.action.as_str().to_string()),
            created_at: Set(Utc::now().timestamp()),
            ..Default::default()
        };

        Entity::insert(row)
            .on_conflict(
                OnConflict::columns([Column::Subject, Column::Resource, Column::Action])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(())
    }

    async fn insert_membership(&self, membership: &MembershipTuple) -> Result<(), StoreError> {
        use entities::membership_tuple::{ActiveModel, Column, Entity};

        let row = ActiveModel {
            user_id: Set(membership.user.clone()),
            group_id: Set(membership.group.clone()),
            role: Set(membership.role.as_str().to_string()),
            created_at: Set(Utc::now().timestamp()),
            ..Default::default()
        };

        Entity::insert(row)
            .on_conflict(
                OnConflict::columns([Column::UserId, Column::GroupId, Column::Role])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl TupleStore for DbTupleStore {
    async fn load_all(&self) -> Result<Vec<Tuple>, StoreError> {
        let mut tuples = self.load_grants().await?;
        tuples.extend(self.load_memberships().await?);
        Ok(tuples)
    }

    async fn insert(&self, tuple: &Tuple) -> Result<(), StoreError> {
        match tuple {
            Tuple::Grant(g) => self.insert_grant(g).await,
            Tuple::Membership(m) => self.insert_membership(m).await,
        }
    }

    async fn delete(&self, pattern: &TuplePattern) -> Result<u64, StoreError> {
        if pattern.is_unbounded() {
            return Err(StoreError::UnboundedDelete);
        }

        let result = match pattern {
            TuplePattern::Grant {
                subject,
                resource,
                action,
            } => {
                use entities::grant_tuple::{Column, Entity};

                let mut query = Entity::delete_many();
                if let Some(subject) = subject {
                    query = query.filter(Column::Subject.eq(subject.as_str()));
                }
                if let Some(resource) = resource {
                    query = query.filter(Column::Resource.eq(resource.as_str()));
                }
                if let Some(action) = action {
                    query = query.filter(Column::Action.eq(action.as_str()));
                }
                query.exec(&self.db).await?
            }
            TuplePattern::Membership { user, group, role } => {
                use entities::membership_tuple::{Column, Entity};

                let mut query = Entity::delete_many();
                if let Some(user) = user {
                    query = query.filter(Column::UserId.eq(user.as_str()));
                }
                if let Some(group) = group {
                    query = query.filter(Column::GroupId.eq(group.as_str()));
                }
                if let Some(role) = role {
                    query = query.filter(Column::Role.eq(role.as_str()));
                }
                query.exec(&self.db).await?
            }
        };

        Ok(result.rows_affected)
    }
}
