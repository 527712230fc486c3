//! Label reconciliation tests
//!
//! Verify that classification labels stay mutually exclusive on a message and
//! that unresolvable categories degrade to the fallback label.

mod common;

use common::{create_test_message, FakeMailbox, MockGmailClient};
use inbox_triage::error::TriageError;
use inbox_triage::label_manager::{LabelManager, ReconcileOutcome};
use inbox_triage::models::FALLBACK_LABEL;

fn mailbox_with_message(applied: &[&str]) -> FakeMailbox {
    let mailbox = FakeMailbox::with_classification_labels();
    let mut message = create_test_message("m1", "boss@example.com", "Status?");
    for name in applied {
        message.label_ids.push(mailbox.label_id(name));
    }
    mailbox.add_message(message);
    mailbox
}

#[tokio::test]
async fn test_reconcile_applies_label_to_unlabeled_message() {
    let mailbox = mailbox_with_message(&[]);
    let manager = LabelManager::new(&mailbox);

    let outcome = manager.reconcile("m1", "ATTN").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Applied("ATTN".to_string()));
    assert_eq!(mailbox.classification_labels_on("m1"), vec!["ATTN"]);
    // Nothing to remove, so only the add call is made
    assert_eq!(mailbox.modify_calls_for("m1"), 1);
}

#[tokio::test]
async fn test_reconcile_replaces_previous_classification() {
    let mailbox = mailbox_with_message(&["MARKETING"]);
    let manager = LabelManager::new(&mailbox);

    manager.reconcile("m1", "TAKE-A-LOOK").await.unwrap();

    assert_eq!(mailbox.classification_labels_on("m1"), vec!["TAKE-A-LOOK"]);
    let labels = mailbox.message_label_ids("m1");
    assert!(labels.contains(&"INBOX".to_string()));
    assert!(labels.contains(&"UNREAD".to_string()));
}

#[tokio::test]
async fn test_reconcile_collapses_multiple_classification_labels() {
    let mailbox = mailbox_with_message(&["ATTN", "FK-U", "HMMMM"]);
    let manager = LabelManager::new(&mailbox);

    manager.reconcile("m1", "MARKETING").await.unwrap();

    assert_eq!(mailbox.classification_labels_on("m1"), vec!["MARKETING"]);

    // All stale labels go in a single removal call
    let calls = mailbox.modify_calls();
    assert_eq!(calls.len(), 2);
    let (_, add, remove) = &calls[0];
    assert!(add.is_empty());
    assert_eq!(remove.len(), 3);
}

#[tokio::test]
async fn test_reconcile_same_label_again_keeps_one() {
    let mailbox = mailbox_with_message(&["ATTN"]);
    let manager = LabelManager::new(&mailbox);

    manager.reconcile("m1", "ATTN").await.unwrap();
    manager.reconcile("m1", "attn").await.unwrap();

    assert_eq!(mailbox.classification_labels_on("m1"), vec!["ATTN"]);
}

#[tokio::test]
async fn test_exclusivity_holds_for_every_category() {
    for category in inbox_triage::CLASSIFICATION_LABELS {
        let mailbox = mailbox_with_message(&["ATTN", "FK-U", "MARKETING", "TAKE-A-LOOK", "HMMMM"]);
        let manager = LabelManager::new(&mailbox);

        manager.reconcile("m1", category).await.unwrap();

        assert_eq!(
            mailbox.classification_labels_on("m1"),
            vec![category.to_string()],
            "category {}",
            category
        );
    }
}

#[tokio::test]
async fn test_unknown_category_falls_back() {
    let mailbox = mailbox_with_message(&["ATTN"]);
    let manager = LabelManager::new(&mailbox);

    let outcome = manager.reconcile("m1", "NEWSLETTER").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Fallback(FALLBACK_LABEL.to_string()));
    assert_eq!(mailbox.classification_labels_on("m1"), vec![FALLBACK_LABEL]);
}

#[tokio::test]
async fn test_non_classification_account_label_falls_back() {
    let mailbox = mailbox_with_message(&[]);
    mailbox.add_label("Label_99", "Receipts");
    let manager = LabelManager::new(&mailbox);

    let outcome = manager.reconcile("m1", "Receipts").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Fallback(FALLBACK_LABEL.to_string()));
    assert!(!mailbox.message_label_ids("m1").contains(&"Label_99".to_string()));
}

#[tokio::test]
async fn test_missing_target_label_falls_back() {
    let mailbox = FakeMailbox::new();
    mailbox.add_label("L_h", "HMMMM");
    mailbox.add_message(create_test_message("m1", "a@example.com", "Hi"));
    let manager = LabelManager::new(&mailbox);

    let outcome = manager.reconcile("m1", "ATTN").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Fallback(FALLBACK_LABEL.to_string()));
    assert_eq!(mailbox.classification_labels_on("m1"), vec![FALLBACK_LABEL]);
}

#[tokio::test]
async fn test_missing_fallback_leaves_message_unlabeled() {
    let mailbox = FakeMailbox::new();
    mailbox.add_label("L_a", "ATTN");
    let mut message = create_test_message("m1", "a@example.com", "Hi");
    message.label_ids.push("L_a".to_string());
    mailbox.add_message(message);
    let manager = LabelManager::new(&mailbox);

    let outcome = manager.reconcile("m1", "MARKETING").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Unlabeled);
    assert!(mailbox.classification_labels_on("m1").is_empty());
}

#[tokio::test]
async fn test_label_map_is_fetched_fresh_each_call() {
    let mailbox = FakeMailbox::new();
    mailbox.add_label("L_h", "HMMMM");
    mailbox.add_message(create_test_message("m1", "a@example.com", "Hi"));
    let manager = LabelManager::new(&mailbox);

    let first = manager.reconcile("m1", "ATTN").await.unwrap();
    assert_eq!(first, ReconcileOutcome::Fallback(FALLBACK_LABEL.to_string()));

    // Label created by someone else between two reconciliations
    mailbox.add_label("L_a", "ATTN");
    let second = manager.reconcile("m1", "ATTN").await.unwrap();

    assert_eq!(second, ReconcileOutcome::Applied("ATTN".to_string()));
    assert_eq!(mailbox.classification_labels_on("m1"), vec!["ATTN"]);
}

#[tokio::test]
async fn test_mutation_failure_is_propagated() {
    let mailbox = mailbox_with_message(&["ATTN"]);
    mailbox.fail_modifications();
    let manager = LabelManager::new(&mailbox);

    let result = manager.reconcile("m1", "MARKETING").await;

    assert!(matches!(result, Err(TriageError::ServerError { status: 500, .. })));
}

#[tokio::test]
async fn test_message_fetch_failure_is_propagated() {
    let mut mock = MockGmailClient::new();
    mock.expect_list_labels()
        .returning(|| Ok(common::classification_label_infos()));
    mock.expect_get_message()
        .returning(|id| Err(TriageError::MessageNotFound(id.to_string())));
    mock.expect_modify_labels().times(0);

    let manager = LabelManager::new(&mock);
    let result = manager.reconcile("gone", "ATTN").await;

    assert!(matches!(result, Err(TriageError::MessageNotFound(id)) if id == "gone"));
}

#[tokio::test]
async fn test_ensure_labels_creates_all_on_empty_account() {
    let mailbox = FakeMailbox::new();
    let manager = LabelManager::new(&mailbox);

    let map = manager.ensure_labels().await.unwrap();

    assert_eq!(map.len(), 5);
    assert_eq!(
        mailbox.created_labels(),
        vec!["ATTN", "FK-U", "MARKETING", "TAKE-A-LOOK", "HMMMM"]
    );
}

#[tokio::test]
async fn test_ensure_labels_is_idempotent() {
    let mailbox = FakeMailbox::with_classification_labels();
    let manager = LabelManager::new(&mailbox);

    let map = manager.ensure_labels().await.unwrap();

    assert_eq!(map["ATTN"], "Label_1");
    assert!(mailbox.created_labels().is_empty());
}
