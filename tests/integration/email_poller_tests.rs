//! Integration tests for the email poll cycle.

use std::sync::Arc;

use task_harvester::models::ledger::Ledger;
use task_harvester::models::task::TaskSource;
use task_harvester::persistence::ledger_repo::LedgerRepo;
use task_harvester::persistence::task_repo::TaskRepo;
use task_harvester::poller::{EmailPoller, Poller};
use task_harvester::AppError;

use super::test_helpers::{test_db, test_pipeline, Reply, ScriptedInference, StubMail};

const SENDER: &str = "boss@example.com";

#[tokio::test]
async fn email_becomes_task_owned_by_bare_sender_address() {
    let db = test_db().await;
    let mail = StubMail::new();
    mail.deliver(
        "m1",
        "The Boss <boss@example.com>",
        "Dinner",
        "Book a table for Friday",
    );
    let model = ScriptedInference::new(Reply::task("Book table"));
    let mut poller = EmailPoller::new(mail.clone(), test_pipeline(&db, model.clone(), None), SENDER);

    let report = poller.poll_once().await.expect("cycle");
    assert_eq!(report.created, 1);

    let tasks = TaskRepo::new(Arc::clone(&db)).list_all().await.expect("list");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].owner.as_deref(), Some("boss@example.com"));
    assert_eq!(tasks[0].source, Some(TaskSource::Email));

    let call = &model.calls()[0];
    assert_eq!(call.user_message, "Message: Book a table for Friday");
    assert!(call.system_prompt.contains("The email subject is: Dinner"));
    assert!(call
        .system_prompt
        .contains("The email body is: Book a table for Friday"));
}

#[tokio::test]
async fn processed_ids_are_skipped_without_fetching() {
    let db = test_db().await;
    let mail = StubMail::new();
    mail.deliver("m1", SENDER, "One", "first");
    mail.deliver("m2", SENDER, "Two", "second");
    let model = ScriptedInference::new(Reply::none());
    let mut poller = EmailPoller::new(mail.clone(), test_pipeline(&db, model.clone(), None), SENDER);

    poller.poll_once().await.expect("first cycle");
    assert_eq!(mail.fetches(), 2);

    let report = poller.poll_once().await.expect("second cycle");
    assert_eq!(report.skipped, 2);
    assert_eq!(mail.fetches(), 2);
    assert_eq!(model.calls().len(), 2);
}

#[tokio::test]
async fn no_task_email_is_marked() {
    let db = test_db().await;
    let mail = StubMail::new();
    mail.deliver("m1", SENDER, "FYI", "newsletter");
    let model = ScriptedInference::new(Reply::Text("{}".into()));
    let mut poller = EmailPoller::new(mail.clone(), test_pipeline(&db, model.clone(), None), SENDER);

    let report = poller.poll_once().await.expect("cycle");

    assert_eq!(report.no_task, 1);
    assert!(LedgerRepo::new(Arc::clone(&db))
        .is_processed(Ledger::Email, "m1")
        .await
        .expect("query"));
    assert!(TaskRepo::new(Arc::clone(&db)).list_all().await.expect("list").is_empty());
}

#[tokio::test]
async fn malformed_email_reply_is_retried_next_cycle() {
    let db = test_db().await;
    let mail = StubMail::new();
    mail.deliver("m1", SENDER, "Ask", "can you file my expenses");
    let model = ScriptedInference::new(Reply::prose());
    let mut poller = EmailPoller::new(mail.clone(), test_pipeline(&db, model.clone(), None), SENDER);
    let ledger = LedgerRepo::new(Arc::clone(&db));

    let report = poller.poll_once().await.expect("cycle");
    assert_eq!(report.malformed, 1);
    assert!(!ledger.is_processed(Ledger::Email, "m1").await.expect("query"));

    model.reply("can you file my expenses", Reply::task("File expenses"));
    let report = poller.poll_once().await.expect("cycle");
    assert_eq!(report.created, 1);
    assert!(ledger.is_processed(Ledger::Email, "m1").await.expect("query"));
}

#[tokio::test]
async fn fetch_failure_aborts_cycle_after_earlier_messages_commit() {
    let db = test_db().await;
    let mail = StubMail::new();
    mail.deliver("m1", SENDER, "One", "first");
    mail.deliver("m2", SENDER, "Two", "second");
    mail.deliver("m3", SENDER, "Three", "third");
    mail.break_message("m2");
    let model = ScriptedInference::new(Reply::task("Do it"));
    let mut poller = EmailPoller::new(mail.clone(), test_pipeline(&db, model.clone(), None), SENDER);
    let ledger = LedgerRepo::new(Arc::clone(&db));

    let err = poller.poll_once().await.expect_err("cycle must fail");
    assert!(matches!(err, AppError::Email(_)));
    assert!(ledger.is_processed(Ledger::Email, "m1").await.expect("query"));
    assert!(!ledger.is_processed(Ledger::Email, "m3").await.expect("query"));
    assert_eq!(model.texts(), vec!["first"]);

    mail.repair_message("m2");
    let report = poller.poll_once().await.expect("recovered cycle");
    assert_eq!(report.skipped, 1);
    assert_eq!(report.created, 2);
    assert_eq!(ledger.count(Ledger::Email).await.expect("count"), 3);
}

#[tokio::test]
async fn refused_message_is_skipped_and_later_ones_still_processed() {
    let db = test_db().await;
    let mail = StubMail::new();
    mail.deliver("m1", SENDER, "Gone", "deleted upstream");
    mail.deliver("m2", SENDER, "Dinner", "book dinner");
    mail.refuse_message("m1");
    let model = ScriptedInference::new(Reply::task("Book dinner"));
    let mut poller = EmailPoller::new(mail.clone(), test_pipeline(&db, model.clone(), None), SENDER);
    let ledger = LedgerRepo::new(Arc::clone(&db));

    let report = poller.poll_once().await.expect("cycle continues past refusal");
    assert_eq!(report.rejected, 1);
    assert_eq!(report.created, 1);
    assert!(!ledger.is_processed(Ledger::Email, "m1").await.expect("query"));
    assert!(ledger.is_processed(Ledger::Email, "m2").await.expect("query"));

    // Unmarked, so it is tried again next cycle.
    let report = poller.poll_once().await.expect("second cycle");
    assert_eq!(report.rejected, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(mail.fetches(), 3);
}

#[tokio::test]
async fn model_rejection_skips_only_that_email() {
    let db = test_db().await;
    let mail = StubMail::new();
    mail.deliver("m1", SENDER, "Logs", "enormous attachment text");
    mail.deliver("m2", SENDER, "Ask", "file my expenses");
    let model = ScriptedInference::new(Reply::task("File expenses"));
    model.reply("enormous attachment text", Reply::Reject);
    let mut poller = EmailPoller::new(mail.clone(), test_pipeline(&db, model.clone(), None), SENDER);

    let report = poller.poll_once().await.expect("cycle");

    assert_eq!(report.rejected, 1);
    assert_eq!(report.created, 1);
    assert_eq!(model.texts(), vec!["enormous attachment text", "file my expenses"]);
    let ledger = LedgerRepo::new(Arc::clone(&db));
    assert_eq!(ledger.count(Ledger::Email).await.expect("count"), 1);
}

#[tokio::test]
async fn missing_from_header_falls_back_to_placeholder_owner() {
    let db = test_db().await;
    let mail = StubMail::new();
    mail.deliver("m1", "Unknown Sender", "No Subject", "ping me");
    let model = ScriptedInference::new(Reply::task("Ping"));
    let mut poller = EmailPoller::new(mail.clone(), test_pipeline(&db, model.clone(), None), SENDER);

    poller.poll_once().await.expect("cycle");

    let tasks = TaskRepo::new(Arc::clone(&db)).list_all().await.expect("list");
    assert_eq!(tasks[0].owner.as_deref(), Some("Unknown Sender"));
}
