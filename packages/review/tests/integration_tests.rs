// ABOUTME: Integration tests for the review workflow
// ABOUTME: Submission conflicts, vote ledger semantics, promotion outcomes, deadlines and concurrency

use std::sync::Arc;
use std::time::Instant;

use hellafresh_core::Deadline;
use hellafresh_review::{
    PromotionPolicy, ReviewError, ReviewService, SubmissionRequest, VoteValue,
};
use hellafresh_storage::{connect, connect_in_memory, PoolSettings};
use hellafresh_terms::{ConflictCheck, HistoryEvent, TermStatus};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

async fn create_service() -> ReviewService {
    let pool = connect_in_memory().await.unwrap();
    ReviewService::new(pool, PromotionPolicy::default(), 1).unwrap()
}

fn request(text: &str) -> SubmissionRequest {
    SubmissionRequest {
        text: text.to_string(),
        definition: format!("what {} means", text),
        submitted_by: "submitter".to_string(),
        ..Default::default()
    }
}

async fn submit(service: &ReviewService, text: &str) -> String {
    service
        .submit(request(text), Deadline::none())
        .await
        .unwrap()
        .term
        .id
}

async fn vote(service: &ReviewService, term_id: &str, voter: &str, value: VoteValue) {
    service
        .cast_vote(term_id, voter, value, Deadline::none())
        .await
        .unwrap();
}

async fn approve_by(service: &ReviewService, term_id: &str, voters: &[&str]) {
    for voter in voters {
        vote(service, term_id, voter, VoteValue::Approve).await;
    }
}

#[tokio::test]
async fn test_two_approvals_one_rejection_promotes() {
    let service = create_service().await;
    let term_id = submit(&service, "rizz").await;

    vote(&service, &term_id, "u1", VoteValue::Approve).await;
    vote(&service, &term_id, "u2", VoteValue::Approve).await;
    let receipt = service
        .cast_vote(&term_id, "u3", VoteValue::Reject, Deadline::none())
        .await
        .unwrap();

    assert_eq!(receipt.tally.approve_count, 2);
    assert_eq!(receipt.tally.reject_count, 1);
    assert_eq!(receipt.tally.total_voters, 3);
    assert_eq!(receipt.status, TermStatus::Canonical);

    let transition = receipt.transition.unwrap();
    assert_eq!(transition.from, TermStatus::Pending);
    assert_eq!(transition.to, TermStatus::Canonical);

    let term = service.terms().get_term(&term_id).await.unwrap();
    assert_eq!(term.status, TermStatus::Canonical);
    assert!(term.resolved_at.is_some());
}

#[tokio::test]
async fn test_one_approval_two_rejections_rejects() {
    let service = create_service().await;
    let term_id = submit(&service, "skibidi").await;

    vote(&service, &term_id, "u1", VoteValue::Approve).await;
    vote(&service, &term_id, "u2", VoteValue::Reject).await;
    let receipt = service
        .cast_vote(&term_id, "u3", VoteValue::Reject, Deadline::none())
        .await
        .unwrap();

    assert_eq!(receipt.status, TermStatus::Rejected);

    let history = service.terms().history(&term_id).await.unwrap();
    assert_eq!(history.last().unwrap().event, HistoryEvent::Rejected);
}

#[tokio::test]
async fn test_below_min_votes_stays_pending() {
    let service = create_service().await;
    let term_id = submit(&service, "gyat").await;

    vote(&service, &term_id, "u1", VoteValue::Approve).await;
    let receipt = service
        .cast_vote(&term_id, "u2", VoteValue::Approve, Deadline::none())
        .await
        .unwrap();

    assert_eq!(receipt.status, TermStatus::Pending);
    assert!(receipt.transition.is_none());
}

#[tokio::test]
async fn test_revote_replaces_instead_of_adding() {
    let service = create_service().await;
    let term_id = submit(&service, "delulu").await;

    vote(&service, &term_id, "u1", VoteValue::Approve).await;
    let receipt = service
        .cast_vote(&term_id, "u1", VoteValue::Reject, Deadline::none())
        .await
        .unwrap();

    assert_eq!(receipt.tally.total_voters, 1);
    assert_eq!(receipt.tally.approve_count, 0);
    assert_eq!(receipt.tally.reject_count, 1);

    let votes = service.ledger().votes(&term_id).await.unwrap();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].value, VoteValue::Reject);
}

#[tokio::test]
async fn test_vote_on_resolved_term_is_refused() {
    let service = create_service().await;
    let term_id = submit(&service, "periodt").await;
    approve_by(&service, &term_id, &["u1", "u2", "u3"]).await;

    let err = service
        .cast_vote(&term_id, "u4", VoteValue::Reject, Deadline::none())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReviewError::TermNotPending {
            status: TermStatus::Canonical
        }
    ));

    // Resolved status never changes and the late vote left no row
    let term = service.terms().get_term(&term_id).await.unwrap();
    assert_eq!(term.status, TermStatus::Canonical);
    assert_eq!(service.ledger().tally(&term_id).await.unwrap().total_voters, 3);
}

#[tokio::test]
async fn test_vote_on_unknown_term_is_not_found() {
    let service = create_service().await;

    let err = service
        .cast_vote("term-missing", "u1", VoteValue::Approve, Deadline::none())
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::NotFound(id) if id == "term-missing"));
}

#[tokio::test]
async fn test_blank_voter_is_refused() {
    let service = create_service().await;
    let term_id = submit(&service, "bet").await;

    let err = service
        .cast_vote(&term_id, "   ", VoteValue::Approve, Deadline::none())
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::Validation(_)));
}

#[tokio::test]
async fn test_submission_validation() {
    let service = create_service().await;

    let err = service
        .submit(request("   "), Deadline::none())
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::Validation(_)));

    let mut missing_definition = request("sheesh");
    missing_definition.definition = String::new();
    let err = service
        .submit(missing_definition, Deadline::none())
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::Validation(_)));
}

#[tokio::test]
async fn test_submission_conflicting_with_canonical() {
    let service = create_service().await;
    let canonical_id = submit(&service, "yeet").await;
    approve_by(&service, &canonical_id, &["u1", "u2", "u3"]).await;

    let err = service
        .submit(request("Yeet"), Deadline::none())
        .await
        .unwrap_err();
    match err {
        ReviewError::Conflict(ConflictCheck::Conflict { canonical_ref }) => {
            assert_eq!(canonical_ref, canonical_id)
        }
        other => panic!("Expected canonical conflict, got {:?}", other),
    }

    let (pending, total) = service.pending_queue(None, None).await.unwrap();
    assert!(pending.is_empty());
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_duplicate_pending_lists_existing_ids() {
    let service = create_service().await;
    let first = submit(&service, "mid").await;

    let err = service
        .submit(request("MID"), Deadline::none())
        .await
        .unwrap_err();
    match err {
        ReviewError::Conflict(ConflictCheck::DuplicatePending { existing_ids }) => {
            assert_eq!(existing_ids, vec![first])
        }
        other => panic!("Expected duplicate pending, got {:?}", other),
    }
}

#[tokio::test]
async fn test_variant_of_canonical_merges_on_approval() {
    let service = create_service().await;
    let canonical_id = submit(&service, "yeet").await;
    approve_by(&service, &canonical_id, &["u1", "u2", "u3"]).await;

    let mut variant_request = request("Yeet");
    variant_request.definition = "to throw something hard".to_string();
    variant_request.as_variant = true;
    let submission = service
        .submit(variant_request, Deadline::none())
        .await
        .unwrap();

    assert_eq!(
        submission.check,
        ConflictCheck::Conflict {
            canonical_ref: canonical_id.clone()
        }
    );
    assert_eq!(submission.term.status, TermStatus::Pending);
    assert_eq!(submission.term.canonical_ref, Some(canonical_id.clone()));

    let variant_id = submission.term.id;
    approve_by(&service, &variant_id, &["u4", "u5"]).await;
    let receipt = service
        .cast_vote(&variant_id, "u6", VoteValue::Approve, Deadline::none())
        .await
        .unwrap();

    assert_eq!(receipt.status, TermStatus::Merged);
    assert_eq!(
        receipt.transition.unwrap().canonical_ref,
        Some(canonical_id.clone())
    );

    // The canonical entry is untouched apart from the new sense
    let canonical = service.term_detail(&canonical_id).await.unwrap();
    assert_eq!(canonical.term.status, TermStatus::Canonical);
    assert_eq!(canonical.senses.len(), 1);
    assert_eq!(canonical.senses[0].source_term_id, variant_id);
    assert_eq!(canonical.senses[0].definition, "to throw something hard");

    let variant = service.term_detail(&variant_id).await.unwrap();
    let events: Vec<HistoryEvent> = variant.history.iter().map(|h| h.event).collect();
    assert_eq!(
        events,
        vec![
            HistoryEvent::Submitted,
            HistoryEvent::FlaggedVariant,
            HistoryEvent::Merged
        ]
    );
    assert_eq!(
        variant.history.last().unwrap().related_term_id,
        Some(canonical_id)
    );
}

#[tokio::test]
async fn test_pending_twin_is_merged_once_the_other_is_promoted() {
    let service = create_service().await;
    let first = submit(&service, "drip").await;

    let mut twin = request("Drip");
    twin.as_variant = true;
    let second = service.submit(twin, Deadline::none()).await.unwrap().term.id;

    approve_by(&service, &first, &["u1", "u2", "u3"]).await;
    approve_by(&service, &second, &["u1", "u2", "u3"]).await;

    let first = service.terms().get_term(&first).await.unwrap();
    let second = service.terms().get_term(&second).await.unwrap();
    assert_eq!(first.status, TermStatus::Canonical);
    assert_eq!(second.status, TermStatus::Merged);
    assert_eq!(second.canonical_ref, Some(first.id));
}

#[tokio::test]
async fn test_near_duplicate_refused_unless_variant() {
    let service = create_service().await;
    let existing = submit(&service, "slay").await;

    let err = service
        .submit(request("sley"), Deadline::none())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReviewError::Conflict(ConflictCheck::NearDuplicate { .. })
    ));

    let mut variant = request("sley");
    variant.as_variant = true;
    let submission = service.submit(variant, Deadline::none()).await.unwrap();
    match submission.check {
        ConflictCheck::NearDuplicate { matches } => assert_eq!(matches[0].term_id, existing),
        other => panic!("Expected near duplicate, got {:?}", other),
    }
    assert!(submission.term.canonical_ref.is_none());
}

#[tokio::test]
async fn test_term_detail_tally_only_while_pending() {
    let service = create_service().await;
    let term_id = submit(&service, "goated").await;
    vote(&service, &term_id, "u1", VoteValue::Approve).await;

    let detail = service.term_detail(&term_id).await.unwrap();
    assert_eq!(detail.tally.unwrap().approve_count, 1);

    approve_by(&service, &term_id, &["u2", "u3"]).await;
    let detail = service.term_detail(&term_id).await.unwrap();
    assert_eq!(detail.term.status, TermStatus::Canonical);
    assert!(detail.tally.is_none());
}

#[tokio::test]
async fn test_expired_deadline_persists_nothing() {
    let service = create_service().await;

    let err = service
        .submit(request("ate"), Deadline::at(Instant::now()))
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::DeadlineExceeded));
    assert_eq!(service.pending_queue(None, None).await.unwrap().1, 0);

    let term_id = submit(&service, "ate").await;
    let err = service
        .cast_vote(&term_id, "u1", VoteValue::Approve, Deadline::at(Instant::now()))
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::DeadlineExceeded));
    assert_eq!(service.ledger().tally(&term_id).await.unwrap().total_voters, 0);
}

#[tokio::test]
async fn test_pending_queue_pagination() {
    let service = create_service().await;
    let mut ids = Vec::new();
    for text in ["aura", "fanum tax", "mewing", "sigma"] {
        ids.push(submit(&service, text).await);
    }

    let (page, total) = service.pending_queue(Some(2), Some(2)).await.unwrap();
    assert_eq!(total, 4);
    assert_eq!(
        page.into_iter().map(|t| t.id).collect::<Vec<_>>(),
        ids[2..].to_vec()
    );
}

#[tokio::test]
async fn test_invalid_policy_is_refused() {
    let pool = connect_in_memory().await.unwrap();
    let policy = PromotionPolicy {
        approve_ratio: 1.5,
        ..Default::default()
    };

    let result = ReviewService::new(pool, policy, 1);
    assert!(matches!(result, Err(ReviewError::InvalidPolicy(_))));
}

async fn file_pool(dir: &TempDir) -> sqlx::SqlitePool {
    connect(&dir.path().join("review.db"), &PoolSettings::default())
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_votes_promote_exactly_once() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(
        ReviewService::new(file_pool(&dir).await, PromotionPolicy::default(), 1).unwrap(),
    );
    let term_id = submit(&service, "no cap").await;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = service.clone();
            let term_id = term_id.clone();
            tokio::spawn(async move {
                service
                    .cast_vote(&term_id, &format!("voter-{}", i), VoteValue::Approve, Deadline::none())
                    .await
            })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let promotions = results
        .iter()
        .filter(|r| matches!(r, Ok(receipt) if receipt.transition.is_some()))
        .count();
    assert_eq!(promotions, 1);

    for result in &results {
        match result {
            Ok(_) => {}
            Err(ReviewError::TermNotPending { status }) => {
                assert_eq!(*status, TermStatus::Canonical)
            }
            Err(other) => panic!("Unexpected error: {:?}", other),
        }
    }

    let history = service.terms().history(&term_id).await.unwrap();
    let promoted = history
        .iter()
        .filter(|h| h.event == HistoryEvent::Promoted)
        .count();
    assert_eq!(promoted, 1);
    assert_eq!(service.ledger().tally(&term_id).await.unwrap().total_voters, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_independent_services_share_one_outcome() {
    // Two services over one database do not share term locks; the database
    // write lock and the status compare-and-swap still allow one resolution.
    let dir = TempDir::new().unwrap();
    let pool = file_pool(&dir).await;
    let left = Arc::new(ReviewService::new(pool.clone(), PromotionPolicy::default(), 1).unwrap());
    let right = Arc::new(ReviewService::new(pool, PromotionPolicy::default(), 1).unwrap());

    let term_id = submit(&left, "bussin").await;

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let service = if i % 2 == 0 { left.clone() } else { right.clone() };
            let term_id = term_id.clone();
            tokio::spawn(async move {
                service
                    .cast_vote(&term_id, &format!("voter-{}", i), VoteValue::Approve, Deadline::none())
                    .await
            })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let promotions = results
        .iter()
        .filter(|r| matches!(r, Ok(receipt) if receipt.transition.is_some()))
        .count();
    assert_eq!(promotions, 1);

    let term = left.terms().get_term(&term_id).await.unwrap();
    assert_eq!(term.status, TermStatus::Canonical);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_submissions_admit_one() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(
        ReviewService::new(file_pool(&dir).await, PromotionPolicy::default(), 1).unwrap(),
    );

    for (round, text) in ["yeet", "drip", "bussin", "rizz", "slay"].into_iter().enumerate() {
        let text = text.to_string();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = service.clone();
                let text = text.clone();
                tokio::spawn(async move { service.submit(request(&text), Deadline::none()).await })
            })
            .collect();

        let results: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let accepted: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(accepted.len(), 1, "round {}", round);
        assert!(accepted[0].check.is_clear());

        for result in &results {
            match result {
                Ok(_) => {}
                Err(ReviewError::Conflict(ConflictCheck::DuplicatePending { existing_ids })) => {
                    assert_eq!(existing_ids, &vec![accepted[0].term.id.clone()])
                }
                Err(other) => panic!("Unexpected error: {:?}", other),
            }
        }
    }

    let (pending, total) = service.pending_queue(Some(100), Some(0)).await.unwrap();
    assert_eq!(pending.len(), 5);
    assert_eq!(total, 5);
}
