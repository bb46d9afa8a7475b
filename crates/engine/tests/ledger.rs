use sea_orm::Database;

use engine::{
    DisburseCmd, Engine, EngineError, EntryDetail, EntryDraft, ExpenseCmd, GeneralSavingCmd,
    GroupCtx, LoanBookFilter, LoanStatus, LoanType, MeetingCmd, MemberCmd, Money, RepaymentCmd,
    SavingCmd, SheetRow, TransactionKind, TransactionListFilter, read_sheet,
};
use migration::MigratorTrait;

async fn engine_with_group() -> (Engine, GroupCtx) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();
    let group = engine.create_group("asha", "Bachat Gat").await.unwrap();
    let ctx = GroupCtx::new("asha", group.id);
    (engine, ctx)
}

fn rs(rupees: i64) -> Money {
    Money::new(rupees * 100)
}

async fn add_member(engine: &Engine, ctx: &GroupCtx, name: &str) -> String {
    engine
        .add_member(ctx, MemberCmd::new(name, "9876543210"))
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn balances_derive_from_ledger() {
    let (engine, ctx) = engine_with_group().await;
    let member = add_member(&engine, &ctx, "Lakshmi Devi").await;

    engine
        .record_saving(&ctx, SavingCmd::new(&member, rs(400)).saving_type("Monthly"))
        .await
        .unwrap();
    engine
        .record_saving(&ctx, SavingCmd::new(&member, rs(100)).saving_type("Fine"))
        .await
        .unwrap();
    engine
        .record_general_saving(&ctx, GeneralSavingCmd::new(rs(100)).source("Donation"))
        .await
        .unwrap();
    // A repayment on a bank loan held outside the group's books goes to
    // the overdraft balance.
    engine
        .record_entry(
            &ctx,
            EntryDraft {
                kind: Some(TransactionKind::BankLoanRepayment),
                member_id: Some(member.clone()),
                principal: Some(rs(1000)),
                interest: Some(rs(100)),
                allow_unlinked: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let sheet = engine.balance_sheet(&ctx).await.unwrap();
    assert_eq!(sheet.savings, rs(600));
    assert_eq!(sheet.overdraft, rs(1100));
    assert_eq!(sheet.combined(), rs(1700));
}

#[tokio::test]
async fn expenses_reduce_savings_and_default_category() {
    let (engine, ctx) = engine_with_group().await;
    let member = add_member(&engine, &ctx, "Lakshmi Devi").await;

    engine
        .record_saving(&ctx, SavingCmd::new(&member, rs(500)).saving_type("Monthly"))
        .await
        .unwrap();
    let expense = engine
        .record_expense(&ctx, ExpenseCmd::new(rs(200)))
        .await
        .unwrap();

    match &expense.detail {
        EntryDetail::Expense { category } => assert_eq!(category.as_deref(), Some("Other")),
        other => panic!("unexpected detail: {other:?}"),
    }
    let sheet = engine.balance_sheet(&ctx).await.unwrap();
    assert_eq!(sheet.savings, rs(300));
}

#[tokio::test]
async fn loan_lifecycle_partial_then_full_repayment() {
    let (engine, ctx) = engine_with_group().await;
    let member = add_member(&engine, &ctx, "Lakshmi Devi").await;

    let loan = engine
        .disburse_loan(&ctx, DisburseCmd::new(&member, LoanType::Book, rs(10_000)))
        .await
        .unwrap();
    assert_eq!(loan.outstanding_minor, rs(10_000).paise());
    assert_eq!(loan.status, LoanStatus::Active);

    let loan = engine
        .apply_repayment(&ctx, RepaymentCmd::new(&loan.id, rs(4000), rs(500)))
        .await
        .unwrap();
    assert_eq!(loan.outstanding_minor, rs(6000).paise());
    assert_eq!(loan.total_repaid_minor, rs(4500).paise());
    assert_eq!(loan.status, LoanStatus::Active);

    let loan = engine
        .apply_repayment(&ctx, RepaymentCmd::new(&loan.id, rs(6000), rs(300)))
        .await
        .unwrap();
    assert_eq!(loan.outstanding_minor, 0);
    assert_eq!(loan.total_repaid_minor, rs(10_800).paise());
    assert_eq!(loan.status, LoanStatus::Closed);
}

#[tokio::test]
async fn over_repayment_floors_outstanding_at_zero() {
    let (engine, ctx) = engine_with_group().await;
    let member = add_member(&engine, &ctx, "Lakshmi Devi").await;

    let loan = engine
        .disburse_loan(&ctx, DisburseCmd::new(&member, LoanType::Book, rs(1000)))
        .await
        .unwrap();
    let loan = engine
        .apply_repayment(&ctx, RepaymentCmd::new(&loan.id, rs(1500), Money::ZERO))
        .await
        .unwrap();
    assert_eq!(loan.outstanding_minor, 0);
    assert_eq!(loan.status, LoanStatus::Closed);
    assert_eq!(loan.total_repaid_minor, rs(1500).paise());
}

#[tokio::test]
async fn disbursal_entries_are_protected_from_edits() {
    let (engine, ctx) = engine_with_group().await;
    let member = add_member(&engine, &ctx, "Lakshmi Devi").await;
    engine
        .disburse_loan(&ctx, DisburseCmd::new(&member, LoanType::Book, rs(1000)))
        .await
        .unwrap();

    let (entries, _) = engine
        .list_transactions(&ctx, &TransactionListFilter::default(), 10, None)
        .await
        .unwrap();
    let disbursal = entries
        .iter()
        .find(|e| e.detail.kind() == TransactionKind::LoanDisbursed)
        .unwrap();

    let err = engine.delete_transaction(&ctx, &disbursal.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    let err = engine
        .update_transaction(&ctx, &disbursal.id, EntryDraft::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn outstanding_loans_show_in_balance_sheet() {
    let (engine, ctx) = engine_with_group().await;
    let member = add_member(&engine, &ctx, "Lakshmi Devi").await;

    engine
        .disburse_loan(&ctx, DisburseCmd::new(&member, LoanType::Book, rs(2000)))
        .await
        .unwrap();
    engine
        .disburse_loan(&ctx, DisburseCmd::new(&member, LoanType::Bank, rs(3000)))
        .await
        .unwrap();

    let sheet = engine.balance_sheet(&ctx).await.unwrap();
    assert_eq!(sheet.outstanding_loans, rs(5000));
    // Disbursals pay out of savings.
    assert_eq!(sheet.savings, rs(-5000));
}

#[tokio::test]
async fn update_transaction_renormalizes_and_keeps_created_at() {
    let (engine, ctx) = engine_with_group().await;
    let member = add_member(&engine, &ctx, "Lakshmi Devi").await;

    let entry = engine
        .record_saving(&ctx, SavingCmd::new(&member, rs(500)).saving_type("Monthly"))
        .await
        .unwrap();
    let updated = engine
        .update_transaction(
            &ctx,
            &entry.id,
            EntryDraft {
                member_id: Some(member.clone()),
                amount: Some(rs(700)),
                saving_type: Some("Monthly".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.amount, rs(700));
    assert_eq!(updated.detail.kind(), TransactionKind::Saving);
    assert_eq!(updated.created_at, entry.created_at);

    let sheet = engine.balance_sheet(&ctx).await.unwrap();
    assert_eq!(sheet.savings, rs(700));
}

#[tokio::test]
async fn list_transactions_paginates_with_cursor() {
    let (engine, ctx) = engine_with_group().await;
    let member = add_member(&engine, &ctx, "Lakshmi Devi").await;

    for amount in [100, 200, 300] {
        engine
            .record_saving(&ctx, SavingCmd::new(&member, rs(amount)).saving_type("Monthly"))
            .await
            .unwrap();
    }

    let filter = TransactionListFilter::default();
    let (page_one, cursor) = engine.list_transactions(&ctx, &filter, 2, None).await.unwrap();
    assert_eq!(page_one.len(), 2);
    let cursor = cursor.expect("a second page");

    let (page_two, cursor) = engine
        .list_transactions(&ctx, &filter, 2, Some(&cursor))
        .await
        .unwrap();
    assert_eq!(page_two.len(), 1);
    assert!(cursor.is_none());

    let mut seen: Vec<&str> = page_one.iter().chain(&page_two).map(|e| e.id.as_str()).collect();
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), 3);
}

#[tokio::test]
async fn list_transactions_filters_by_kind_and_member() {
    let (engine, ctx) = engine_with_group().await;
    let lakshmi = add_member(&engine, &ctx, "Lakshmi Devi").await;
    let radha = add_member(&engine, &ctx, "Radha Patil").await;

    engine
        .record_saving(&ctx, SavingCmd::new(&lakshmi, rs(100)).saving_type("Monthly"))
        .await
        .unwrap();
    engine
        .record_saving(&ctx, SavingCmd::new(&radha, rs(200)).saving_type("Monthly"))
        .await
        .unwrap();
    engine.record_expense(&ctx, ExpenseCmd::new(rs(50))).await.unwrap();

    let filter = TransactionListFilter {
        kinds: Some(vec![TransactionKind::Expense]),
        ..Default::default()
    };
    let (entries, _) = engine.list_transactions(&ctx, &filter, 10, None).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].detail.kind(), TransactionKind::Expense);

    let filter = TransactionListFilter {
        member_id: Some(radha.clone()),
        ..Default::default()
    };
    let (entries, _) = engine.list_transactions(&ctx, &filter, 10, None).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].member_id.as_deref(), Some(radha.as_str()));

    let err = engine
        .list_transactions(
            &ctx,
            &TransactionListFilter {
                from: chrono::NaiveDate::from_ymd_opt(2024, 6, 1),
                to: chrono::NaiveDate::from_ymd_opt(2024, 5, 1),
                ..Default::default()
            },
            10,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn member_mobiles_are_normalized() {
    let (engine, ctx) = engine_with_group().await;
    let member = engine
        .add_member(&ctx, MemberCmd::new("Lakshmi Devi", "098765 43210"))
        .await
        .unwrap();
    assert_eq!(member.mobile, "+919876543210");
    assert_eq!(member.designation, "member");
}

#[tokio::test]
async fn deleting_a_member_removes_their_records() {
    let (engine, ctx) = engine_with_group().await;
    let member = add_member(&engine, &ctx, "Lakshmi Devi").await;

    engine
        .record_saving(&ctx, SavingCmd::new(&member, rs(500)).saving_type("Monthly"))
        .await
        .unwrap();
    engine
        .disburse_loan(&ctx, DisburseCmd::new(&member, LoanType::Book, rs(1000)))
        .await
        .unwrap();

    engine.delete_member(&ctx, &member).await.unwrap();

    assert!(engine.list_members(&ctx).await.unwrap().is_empty());
    assert!(engine.list_loans(&ctx, true).await.unwrap().is_empty());
    let (entries, _) = engine
        .list_transactions(&ctx, &TransactionListFilter::default(), 10, None)
        .await
        .unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn duplicate_group_name_per_owner_is_rejected() {
    let (engine, _ctx) = engine_with_group().await;
    let err = engine.create_group("asha", "Bachat Gat").await.unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
    // Same name under another owner is fine.
    engine.create_group("meera", "Bachat Gat").await.unwrap();
}

#[tokio::test]
async fn import_skips_unknown_members_but_commits_the_rest() {
    let (engine, ctx) = engine_with_group().await;
    add_member(&engine, &ctx, "Lakshmi Devi").await;

    let rows = vec![
        SheetRow {
            entry_type: "Saving".to_string(),
            member_name: "Lakshmi Devi".to_string(),
            date: "5/3/2024".to_string(),
            amount: "500".to_string(),
            ..Default::default()
        },
        SheetRow {
            entry_type: "Saving".to_string(),
            member_name: "Ghost".to_string(),
            amount: "200".to_string(),
            ..Default::default()
        },
    ];
    let summary = engine.import_rows(&ctx, rows).await.unwrap();

    assert_eq!(summary.total_rows, 2);
    assert_eq!(summary.imported_rows, 1);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].row, 2);
    assert!(summary.failure.is_none());

    let sheet = engine.balance_sheet(&ctx).await.unwrap();
    assert_eq!(sheet.savings, rs(500));
}

#[tokio::test]
async fn import_repayments_match_and_close_open_loans() {
    let (engine, ctx) = engine_with_group().await;
    let member = add_member(&engine, &ctx, "Lakshmi Devi").await;
    let loan = engine
        .disburse_loan(&ctx, DisburseCmd::new(&member, LoanType::Book, rs(1000)))
        .await
        .unwrap();

    let rows = vec![SheetRow {
        entry_type: "Loan Repayment".to_string(),
        member_name: "Lakshmi Devi".to_string(),
        loan_type: "Book Loan".to_string(),
        principal: "1000".to_string(),
        interest: "100".to_string(),
        ..Default::default()
    }];
    let summary = engine.import_rows(&ctx, rows).await.unwrap();
    assert_eq!(summary.imported_rows, 1);
    assert!(summary.warnings.is_empty());

    let loan = engine.loan(&ctx, &loan.id).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Closed);
    assert_eq!(loan.total_repaid_minor, rs(1100).paise());
}

#[tokio::test]
async fn import_unmatched_repayment_is_kept_with_warning() {
    let (engine, ctx) = engine_with_group().await;
    add_member(&engine, &ctx, "Lakshmi Devi").await;

    let rows = vec![SheetRow {
        entry_type: "Loan Repayment".to_string(),
        member_name: "Lakshmi Devi".to_string(),
        principal: "400".to_string(),
        interest: "50".to_string(),
        ..Default::default()
    }];
    let summary = engine.import_rows(&ctx, rows).await.unwrap();

    assert_eq!(summary.imported_rows, 1);
    assert_eq!(summary.warnings.len(), 1);
    // The cash still lands in savings even without a matched loan.
    let sheet = engine.balance_sheet(&ctx).await.unwrap();
    assert_eq!(sheet.savings, rs(450));
}

#[tokio::test]
async fn import_disbursal_seeds_loans_for_later_rows() {
    let (engine, ctx) = engine_with_group().await;
    add_member(&engine, &ctx, "Lakshmi Devi").await;

    let csv = "\
Type,Member Name,Date,Amount,Loan Type,Principal Repaid,Interest Repaid,Description
Loan Disbursed,Lakshmi Devi,5/3/2024,2000,Book Loan,,,seed capital
Loan Repayment,Lakshmi Devi,5/4/2024,,Book Loan,500,25,
";
    let rows = read_sheet(csv.as_bytes()).unwrap();
    let summary = engine.import_rows(&ctx, rows).await.unwrap();
    assert_eq!(summary.imported_rows, 2);
    assert!(summary.warnings.is_empty());

    let loans = engine.list_loans(&ctx, true).await.unwrap();
    assert_eq!(loans.len(), 1);
    assert_eq!(loans[0].outstanding_minor, rs(1500).paise());
    assert_eq!(loans[0].total_repaid_minor, rs(525).paise());
    assert_eq!(loans[0].status, LoanStatus::Active);
}

#[tokio::test]
async fn import_rejects_negative_cells_without_loan_side_effects() {
    let (engine, ctx) = engine_with_group().await;
    let member = add_member(&engine, &ctx, "Lakshmi Devi").await;
    let loan = engine
        .disburse_loan(&ctx, DisburseCmd::new(&member, LoanType::Book, rs(1000)))
        .await
        .unwrap();

    // The negative row is skipped and must not inflate the simulated
    // outstanding figure the second row repays against.
    let rows = vec![
        SheetRow {
            entry_type: "Loan Repayment".to_string(),
            member_name: "Lakshmi Devi".to_string(),
            loan_type: "Book Loan".to_string(),
            principal: "-100".to_string(),
            ..Default::default()
        },
        SheetRow {
            entry_type: "Loan Repayment".to_string(),
            member_name: "Lakshmi Devi".to_string(),
            loan_type: "Book Loan".to_string(),
            principal: "1000".to_string(),
            ..Default::default()
        },
    ];
    let summary = engine.import_rows(&ctx, rows).await.unwrap();
    assert_eq!(summary.imported_rows, 1);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].row, 1);

    let loan = engine.loan(&ctx, &loan.id).await.unwrap();
    assert_eq!(loan.outstanding_minor, 0);
    assert_eq!(loan.status, LoanStatus::Closed);
    assert_eq!(loan.total_repaid_minor, rs(1000).paise());
}

#[tokio::test]
async fn rerunning_an_import_never_corrupts_loan_balances() {
    let (engine, ctx) = engine_with_group().await;
    add_member(&engine, &ctx, "Lakshmi Devi").await;

    let csv = "\
Type,Member Name,Date,Amount,Loan Type,Principal Repaid,Interest Repaid,Description
Loan Disbursed,Lakshmi Devi,5/3/2024,2000,Book Loan,,,seed capital
Loan Repayment,Lakshmi Devi,5/4/2024,,Book Loan,2000,100,
";
    let rows = read_sheet(csv.as_bytes()).unwrap();
    engine.import_rows(&ctx, rows.clone()).await.unwrap();
    let summary = engine.import_rows(&ctx, rows).await.unwrap();
    assert_eq!(summary.imported_rows, 2);
    assert!(summary.warnings.is_empty());

    // Each run disburses its own loan and closes it with its own
    // repayment; re-running duplicates rows but never drives a balance
    // negative or reopens a closed loan.
    let loans = engine.list_loans(&ctx, true).await.unwrap();
    assert_eq!(loans.len(), 2);
    for loan in &loans {
        assert_eq!(loan.status, LoanStatus::Closed);
        assert_eq!(loan.outstanding_minor, 0);
        assert_eq!(loan.total_repaid_minor, rs(2100).paise());
    }
    assert_eq!(engine.outstanding_total(&ctx).await.unwrap(), Money::ZERO);

    let (entries, _) = engine
        .list_transactions(&ctx, &TransactionListFilter::default(), 10, None)
        .await
        .unwrap();
    assert_eq!(entries.len(), 4);
}

#[tokio::test]
async fn backup_round_trips_into_an_empty_group() {
    let (engine, ctx) = engine_with_group().await;
    let member = add_member(&engine, &ctx, "Lakshmi Devi").await;
    engine
        .record_saving(&ctx, SavingCmd::new(&member, rs(500)).saving_type("Monthly"))
        .await
        .unwrap();
    let loan = engine
        .disburse_loan(&ctx, DisburseCmd::new(&member, LoanType::Book, rs(1000)))
        .await
        .unwrap();
    engine
        .apply_repayment(&ctx, RepaymentCmd::new(&loan.id, rs(200), rs(20)))
        .await
        .unwrap();

    let bundle = engine.export_backup(&ctx).await.unwrap();
    assert_eq!(bundle.members.len(), 1);
    assert_eq!(bundle.transactions.len(), 3);
    assert_eq!(bundle.loans.len(), 1);

    let other = engine.create_group("asha", "Second Gat").await.unwrap();
    let other_ctx = GroupCtx::new("asha", other.id);

    let preview = engine.restore_preview(&other_ctx, &bundle).await.unwrap();
    assert_eq!(preview.members.new, 1);
    assert_eq!(preview.transactions.new, 3);
    assert_eq!(preview.members.existing, 0);

    let report = engine.restore_merge(&other_ctx, bundle.clone()).await.unwrap();
    assert_eq!(report.members.new, 1);
    assert_eq!(report.loans.new, 1);

    let original = engine.balance_sheet(&ctx).await.unwrap();
    let restored = engine.balance_sheet(&other_ctx).await.unwrap();
    assert_eq!(original, restored);

    // Merging the same bundle again only overwrites.
    let report = engine.restore_merge(&other_ctx, bundle).await.unwrap();
    assert_eq!(report.members.new, 0);
    assert_eq!(report.members.existing, 1);
    assert_eq!(report.transactions.existing, 3);
}

#[tokio::test]
async fn transactions_csv_lists_repayment_split() {
    let (engine, ctx) = engine_with_group().await;
    let member = add_member(&engine, &ctx, "Lakshmi Devi").await;
    let loan = engine
        .disburse_loan(&ctx, DisburseCmd::new(&member, LoanType::Book, rs(1000)))
        .await
        .unwrap();
    let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
    engine
        .apply_repayment(&ctx, RepaymentCmd::new(&loan.id, rs(400), rs(50)).date(date))
        .await
        .unwrap();

    let mut out = Vec::new();
    engine.write_transactions_csv(&ctx, &mut out).await.unwrap();
    let csv = String::from_utf8(out).unwrap();

    assert!(csv.starts_with("ID,Date,Date (Local),Type"));
    assert!(csv.contains("Lakshmi Devi"));
    assert!(csv.contains("Loan Repayment"));
    assert!(csv.contains("2024-03-05"));
    assert!(csv.contains("05/03/2024"));
    assert!(csv.contains("400.00"));
    assert!(csv.contains("50.00"));
}

#[tokio::test]
async fn snapshots_follow_mutations() {
    let (engine, ctx) = engine_with_group().await;
    let member = add_member(&engine, &ctx, "Lakshmi Devi").await;

    let mut rx = engine.subscribe(&ctx).await.unwrap();
    let before = rx.borrow_and_update().revision;

    engine
        .record_saving(&ctx, SavingCmd::new(&member, rs(500)).saving_type("Monthly"))
        .await
        .unwrap();

    rx.changed().await.unwrap();
    let snapshot = rx.borrow_and_update().clone();
    assert!(snapshot.revision > before);
    assert_eq!(snapshot.balances.savings, rs(500));
    assert_eq!(snapshot.members, 1);
    assert_eq!(snapshot.transactions, 1);
}

#[tokio::test]
async fn meetings_record_attendance_of_members_only() {
    let (engine, ctx) = engine_with_group().await;
    let member = add_member(&engine, &ctx, "Lakshmi Devi").await;
    let date = chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

    let err = engine
        .add_meeting(
            &ctx,
            MeetingCmd::new(date, "Monthly review").attendees(vec!["ghost".to_string()]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let meeting = engine
        .add_meeting(
            &ctx,
            MeetingCmd::new(date, "Monthly review")
                .notes("collections on track")
                .attendees(vec![member.clone()]),
        )
        .await
        .unwrap();
    assert_eq!(meeting.attendees, vec![member.clone()]);

    let updated = engine
        .update_meeting(
            &ctx,
            &meeting.id,
            MeetingCmd::new(date, "Monthly review and loans").attendees(vec![member.clone()]),
        )
        .await
        .unwrap();
    assert_eq!(updated.agenda, "Monthly review and loans");
    assert_eq!(updated.created_at, meeting.created_at);

    assert_eq!(engine.list_meetings(&ctx).await.unwrap().len(), 1);
    engine.delete_meeting(&ctx, &meeting.id).await.unwrap();
    assert!(engine.list_meetings(&ctx).await.unwrap().is_empty());
}

#[tokio::test]
async fn reports_aggregate_by_member_and_loan_category() {
    let (engine, ctx) = engine_with_group().await;
    let lakshmi = add_member(&engine, &ctx, "Lakshmi Devi").await;
    let radha = add_member(&engine, &ctx, "Radha Patil").await;

    engine
        .record_saving(&ctx, SavingCmd::new(&lakshmi, rs(300)).saving_type("Monthly"))
        .await
        .unwrap();
    engine
        .record_saving(&ctx, SavingCmd::new(&radha, rs(200)).saving_type("Monthly"))
        .await
        .unwrap();
    let loan = engine
        .disburse_loan(&ctx, DisburseCmd::new(&lakshmi, LoanType::Book, rs(1000)))
        .await
        .unwrap();
    engine
        .apply_repayment(&ctx, RepaymentCmd::new(&loan.id, rs(100), rs(10)))
        .await
        .unwrap();
    engine
        .disburse_loan(&ctx, DisburseCmd::new(&radha, LoanType::Bank, rs(2000)))
        .await
        .unwrap();

    let totals = engine.group_totals(&ctx, None).await.unwrap();
    assert_eq!(totals.savings, rs(500));
    assert_eq!(totals.loans_disbursed, rs(3000));
    assert_eq!(totals.loans_repaid, rs(110));

    let lakshmi_totals = engine.group_totals(&ctx, Some(&lakshmi)).await.unwrap();
    assert_eq!(lakshmi_totals.savings, rs(300));
    assert_eq!(lakshmi_totals.loans_disbursed, rs(1000));

    let by_member = engine.savings_by_member(&ctx).await.unwrap();
    assert_eq!(by_member.len(), 2);
    assert_eq!(by_member[0].name, "Lakshmi Devi");
    assert_eq!(by_member[0].total, rs(300));
    assert_eq!(by_member[1].name, "Radha Patil");

    let book = engine
        .loan_book(&ctx, LoanBookFilter::Book, true)
        .await
        .unwrap();
    assert_eq!(book.loans.len(), 1);
    assert_eq!(book.book.outstanding, rs(900));
    assert_eq!(book.book.total_repaid, rs(110));
    assert_eq!(book.bank.count, 0);

    let all = engine.loan_book(&ctx, LoanBookFilter::All, true).await.unwrap();
    assert_eq!(all.loans.len(), 2);
    assert_eq!(all.bank.outstanding, rs(2000));
}

#[tokio::test]
async fn group_deletion_reports_removed_rows() {
    let (engine, ctx) = engine_with_group().await;
    let member = add_member(&engine, &ctx, "Lakshmi Devi").await;
    engine
        .record_saving(&ctx, SavingCmd::new(&member, rs(100)).saving_type("Monthly"))
        .await
        .unwrap();
    engine
        .disburse_loan(&ctx, DisburseCmd::new(&member, LoanType::Book, rs(1000)))
        .await
        .unwrap();

    let report = engine.delete_group(&ctx).await.unwrap();
    assert_eq!(report.members, 1);
    assert_eq!(report.transactions, 2);
    assert_eq!(report.loans, 1);

    let err = engine.balance_sheet(&ctx).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn foreign_group_context_is_not_found() {
    let (engine, ctx) = engine_with_group().await;
    let intruder = GroupCtx::new("meera", ctx.group_id.clone());
    let err = engine.balance_sheet(&intruder).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}
