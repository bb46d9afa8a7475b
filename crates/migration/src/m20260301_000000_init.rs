//! Initial schema migration - creates all tables from scratch.
//!
//! - `groups`: bookkeeping groups owned by a user
//! - `members`: group members
//! - `transactions`: the append-only ledger
//! - `loans`: the loan book
//! - `meetings`: meeting minutes

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Groups {
    Table,
    Id,
    UserId,
    Name,
    CreatedAt,
}

#[derive(Iden)]
enum Members {
    Table,
    Id,
    GroupId,
    Name,
    NameNorm,
    Mobile,
    Email,
    Address,
    Designation,
    JoiningDate,
    CreatedAt,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    GroupId,
    MemberId,
    Kind,
    Date,
    AmountMinor,
    SavingType,
    Source,
    Category,
    LoanId,
    LoanType,
    PrincipalMinor,
    InterestMinor,
    Description,
    CreatedAt,
    RecordedBy,
}

#[derive(Iden)]
enum Loans {
    Table,
    Id,
    GroupId,
    MemberId,
    LoanType,
    PrincipalMinor,
    OutstandingMinor,
    TotalRepaidMinor,
    InterestRateBps,
    TermMonths,
    Status,
    Date,
    Description,
    CreatedAt,
    RecordedBy,
}

#[derive(Iden)]
enum Meetings {
    Table,
    Id,
    GroupId,
    Date,
    Agenda,
    Notes,
    Attendees,
    CreatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Groups
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Groups::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Groups::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Groups::UserId).string().not_null())
                    .col(ColumnDef::new(Groups::Name).string().not_null())
                    .col(ColumnDef::new(Groups::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-groups-user_id-name-unique")
                    .table(Groups::Table)
                    .col(Groups::UserId)
                    .col(Groups::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Members
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Members::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Members::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Members::GroupId).string().not_null())
                    .col(ColumnDef::new(Members::Name).string().not_null())
                    .col(ColumnDef::new(Members::NameNorm).string().not_null())
                    .col(ColumnDef::new(Members::Mobile).string().not_null())
                    .col(ColumnDef::new(Members::Email).string())
                    .col(ColumnDef::new(Members::Address).string())
                    .col(ColumnDef::new(Members::Designation).string().not_null())
                    .col(ColumnDef::new(Members::JoiningDate).date().not_null())
                    .col(ColumnDef::new(Members::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-members-group_id")
                            .from(Members::Table, Members::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-members-group_id-name_norm")
                    .table(Members::Table)
                    .col(Members::GroupId)
                    .col(Members::NameNorm)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::GroupId).string().not_null())
                    .col(ColumnDef::new(Transactions::MemberId).string())
                    .col(ColumnDef::new(Transactions::Kind).string().not_null())
                    .col(ColumnDef::new(Transactions::Date).date().not_null())
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::SavingType).string())
                    .col(ColumnDef::new(Transactions::Source).string())
                    .col(ColumnDef::new(Transactions::Category).string())
                    .col(ColumnDef::new(Transactions::LoanId).string())
                    .col(ColumnDef::new(Transactions::LoanType).string())
                    .col(ColumnDef::new(Transactions::PrincipalMinor).big_integer())
                    .col(ColumnDef::new(Transactions::InterestMinor).big_integer())
                    .col(
                        ColumnDef::new(Transactions::Description)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::RecordedBy).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-group_id")
                            .from(Transactions::Table, Transactions::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-group_id-created_at")
                    .table(Transactions::Table)
                    .col(Transactions::GroupId)
                    .col(Transactions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-group_id-member_id")
                    .table(Transactions::Table)
                    .col(Transactions::GroupId)
                    .col(Transactions::MemberId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-loan_id")
                    .table(Transactions::Table)
                    .col(Transactions::LoanId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Loans
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Loans::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Loans::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Loans::GroupId).string().not_null())
                    .col(ColumnDef::new(Loans::MemberId).string().not_null())
                    .col(ColumnDef::new(Loans::LoanType).string().not_null())
                    .col(
                        ColumnDef::new(Loans::PrincipalMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Loans::OutstandingMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Loans::TotalRepaidMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Loans::InterestRateBps).integer())
                    .col(ColumnDef::new(Loans::TermMonths).integer())
                    .col(ColumnDef::new(Loans::Status).string().not_null())
                    .col(ColumnDef::new(Loans::Date).date().not_null())
                    .col(ColumnDef::new(Loans::Description).string().not_null())
                    .col(ColumnDef::new(Loans::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Loans::RecordedBy).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-loans-group_id")
                            .from(Loans::Table, Loans::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-loans-group_id-status")
                    .table(Loans::Table)
                    .col(Loans::GroupId)
                    .col(Loans::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-loans-group_id-member_id")
                    .table(Loans::Table)
                    .col(Loans::GroupId)
                    .col(Loans::MemberId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Meetings
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Meetings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Meetings::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Meetings::GroupId).string().not_null())
                    .col(ColumnDef::new(Meetings::Date).date().not_null())
                    .col(ColumnDef::new(Meetings::Agenda).string().not_null())
                    .col(ColumnDef::new(Meetings::Notes).string())
                    .col(ColumnDef::new(Meetings::Attendees).string().not_null())
                    .col(ColumnDef::new(Meetings::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-meetings-group_id")
                            .from(Meetings::Table, Meetings::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-meetings-group_id-date")
                    .table(Meetings::Table)
                    .col(Meetings::GroupId)
                    .col(Meetings::Date)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Meetings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Loans::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Members::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Groups::Table).to_owned())
            .await
    }
}
