use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Direct (subject, resource, action) grants
        manager
            .create_table(
                Table::create()
                    .table(GrantTuples::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GrantTuples::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string(GrantTuples::Subject))
                    .col(string(GrantTuples::Resource))
                    .col(string(GrantTuples::Action))
                    .col(big_integer(GrantTuples::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_grant_tuples_unique")
                    .table(GrantTuples::Table)
                    .col(GrantTuples::Subject)
                    .col(GrantTuples::Resource)
                    .col(GrantTuples::Action)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Cascade deletes filter on resource alone
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_grant_tuples_resource")
                    .table(GrantTuples::Table)
                    .col(GrantTuples::Resource)
                    .to_owned(),
            )
            .await?;

        // (user, group, role) memberships
        manager
            .create_table(
                Table::create()
                    .table(MembershipTuples::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MembershipTuples::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string(MembershipTuples::UserId))
                    .col(string(MembershipTuples::GroupId))
                    .col(string(MembershipTuples::Role))
                    .col(big_integer(MembershipTuples::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_membership_tuples_unique")
                    .table(MembershipTuples::Table)
                    .col(MembershipTuples::UserId)
                    .col(MembershipTuples::GroupId)
                    .col(MembershipTuples::Role)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MembershipTuples::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GrantTuples::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum GrantTuples {
    Table,
    Id,
    Subject,
    Resource,
    Action,
    CreatedAt,
}

#[derive(DeriveIden)]
enum MembershipTuples {
    Table,
    Id,
    UserId,
    GroupId,
    Role,
    CreatedAt,
}
