use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create issues table
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("issues"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("fingerprint"))
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("title")).string().not_null())
                    .col(ColumnDef::new(Alias::new("culprit")).string().null())
                    .col(ColumnDef::new(Alias::new("level")).string().not_null())
                    .col(ColumnDef::new(Alias::new("platform")).string().null())
                    .col(
                        ColumnDef::new(Alias::new("first_seen"))
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("last_seen")).string().not_null())
                    .col(
                        ColumnDef::new(Alias::new("count"))
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Alias::new("user_count"))
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Alias::new("status")).string().not_null())
                    .col(ColumnDef::new(Alias::new("metadata")).json().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_issues_fingerprint_unique")
                    .table(Alias::new("issues"))
                    .col(Alias::new("fingerprint"))
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_issues_last_seen")
                    .table(Alias::new("issues"))
                    .col((Alias::new("last_seen"), IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_issues_status")
                    .table(Alias::new("issues"))
                    .col(Alias::new("status"))
                    .to_owned(),
            )
            .await?;

        // Create events table
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("events"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alias::new("issue_id")).string().not_null())
                    .col(ColumnDef::new(Alias::new("timestamp")).string().not_null())
                    .col(
                        ColumnDef::new(Alias::new("received_at"))
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("level")).string().null())
                    .col(ColumnDef::new(Alias::new("platform")).string().null())
                    .col(ColumnDef::new(Alias::new("environment")).string().null())
                    .col(ColumnDef::new(Alias::new("release")).string().null())
                    .col(
                        ColumnDef::new(Alias::new("transaction_name"))
                            .string()
                            .null(),
                    )
                    .col(ColumnDef::new(Alias::new("user_id")).string().null())
                    .col(ColumnDef::new(Alias::new("user_email")).string().null())
                    .col(ColumnDef::new(Alias::new("user_ip")).string().null())
                    .col(ColumnDef::new(Alias::new("tags")).json().null())
                    .col(ColumnDef::new(Alias::new("data")).json().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_events_issue_id")
                            .from(Alias::new("events"), Alias::new("issue_id"))
                            .to(Alias::new("issues"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_events_issue_id")
                    .table(Alias::new("events"))
                    .col(Alias::new("issue_id"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_events_timestamp")
                    .table(Alias::new("events"))
                    .col((Alias::new("timestamp"), IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_events_environment")
                    .table(Alias::new("events"))
                    .col(Alias::new("environment"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_events_release")
                    .table(Alias::new("events"))
                    .col(Alias::new("release"))
                    .to_owned(),
            )
            .await?;

        // Create issue_stats table (hourly buckets)
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("issue_stats"))
                    .if_not_exists()
                    .col(ColumnDef::new(Alias::new("issue_id")).string().not_null())
                    .col(
                        ColumnDef::new(Alias::new("bucket_start"))
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("count"))
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .primary_key(
                        Index::create()
                            .col(Alias::new("issue_id"))
                            .col(Alias::new("bucket_start")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_issue_stats_issue_id")
                            .from(Alias::new("issue_stats"), Alias::new("issue_id"))
                            .to(Alias::new("issues"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_issue_stats_bucket_start")
                    .table(Alias::new("issue_stats"))
                    .col(Alias::new("bucket_start"))
                    .to_owned(),
            )
            .await?;

        // Create issue_users table (unique users per issue)
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("issue_users"))
                    .if_not_exists()
                    .col(ColumnDef::new(Alias::new("issue_id")).string().not_null())
                    .col(ColumnDef::new(Alias::new("user_hash")).string().not_null())
                    .col(
                        ColumnDef::new(Alias::new("first_seen"))
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("last_seen")).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(Alias::new("issue_id"))
                            .col(Alias::new("user_hash")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_issue_users_issue_id")
                            .from(Alias::new("issue_users"), Alias::new("issue_id"))
                            .to(Alias::new("issues"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in ["issue_users", "issue_stats", "events", "issues"] {
            manager
                .drop_table(Table::drop().table(Alias::new(table)).to_owned())
                .await?;
        }

        Ok(())
    }
}
