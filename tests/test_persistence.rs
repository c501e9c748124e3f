// Integration tests for write-through: every mutation must survive a restart, and a
// restarted engine must decide exactly as the one that made the changes.

mod helpers;

use helpers::{PolicyBuilder, TestDb};
use permissions::authz::{Action, Role, TupleStore};
use permissions::entities;
use sea_orm::{EntityTrait, PaginatorTrait};

#[tokio::test]
async fn test_mutations_survive_restart() {
    let test_db = TestDb::new().await;
    let engine = test_db.engine("").await;
    PolicyBuilder::new()
        .member("alice", "team", Role::Owner)
        .member("bob", "team", Role::Member)
        .grant("team", "world-1", Action::Write)
        .grant("carol", "model-1", Action::Read)
        .apply(&engine)
        .await;

    let restarted = test_db.engine("").await;

    assert_eq!(restarted.role_of("alice", "team"), Some(Role::Owner));
    assert_eq!(restarted.role_of("bob", "team"), Some(Role::Member));
    assert!(restarted.is_authorized("bob", "world-1", Action::Write));
    assert!(restarted.is_authorized("carol", "model-1", Action::Read));
    assert!(!restarted.is_authorized("bob", "team", Action::Write));
}

#[tokio::test]
async fn test_duplicate_grant_writes_one_row() {
    let test_db = TestDb::new().await;
    let engine = test_db.engine("").await;

    assert!(engine.add_permission("a", "r", Action::Read).await.unwrap());
    assert!(!engine.add_permission("a", "r", Action::Read).await.unwrap());

    let rows = entities::GrantTuple::find()
        .count(test_db.connection())
        .await
        .expect("Failed to count grants");
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_role_removal_is_persisted_per_role() {
    let test_db = TestDb::new().await;
    let engine = test_db.engine("").await;
    PolicyBuilder::new()
        .member("u", "g", Role::Admin)
        .member("u", "g", Role::Member)
        .apply(&engine)
        .await;

    assert!(engine
        .remove_user_group_role("u", "g", Role::Admin)
        .await
        .unwrap());

    let rows = entities::MembershipTuple::find()
        .all(test_db.connection())
        .await
        .expect("Failed to load memberships");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].role, "member");

    let restarted = test_db.engine("").await;
    assert_eq!(restarted.role_of("u", "g"), Some(Role::Member));
}

#[tokio::test]
async fn test_cascade_is_persisted_and_keeps_memberships() {
    let test_db = TestDb::new().await;
    let engine = test_db.engine("").await;
    PolicyBuilder::new()
        .member("u", "team", Role::Member)
        .grant("auditor", "team", Action::Read)
        .grant("team", "world-1", Action::Read)
        .apply(&engine)
        .await;

    assert!(engine.remove_resource("team").await.unwrap());

    let tuples = test_db
        .store()
        .load_all()
        .await
        .expect("Failed to load tuples");
    assert_eq!(tuples.len(), 2);

    let restarted = test_db.engine("").await;
    assert!(!restarted.is_authorized("auditor", "team", Action::Read));
    assert!(restarted.is_authorized("u", "world-1", Action::Read));
    assert_eq!(restarted.role_of("u", "team"), Some(Role::Member));
}

#[tokio::test]
async fn test_admins_are_not_persisted() {
    let test_db = TestDb::new().await;
    let engine = test_db.engine("root").await;
    engine.reload("someone-else");

    let restarted = test_db.engine("").await;
    assert!(!restarted.is_system_admin("root"));
    assert!(!restarted.is_system_admin("someone-else"));
}
