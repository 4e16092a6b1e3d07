//! Integration tests for the enroll/verify flow.
//!
//! These tests exercise the full engine against the actual `AeadCodec`,
//! `Storage`, and `AuditLog` types with temporary file-based databases.
//!
//! Run with: cargo test --test `verification_flow`

use std::path::PathBuf;

use tempfile::TempDir;

use facesecure_core::audit::{AuditLog, FailureReason};
use facesecure_core::config::Settings;
use facesecure_core::crypto::AeadCodec;
use facesecure_core::engine::VerificationEngine;
use facesecure_core::error::CoreError;
use facesecure_core::store::Storage;

const DIM: usize = 512;
const THRESHOLD: f32 = 0.70;

/// Create a test engine with temporary storage.
fn create_test_engine(temp_dir: &TempDir) -> (VerificationEngine, AuditLog) {
    let db_path = temp_dir.path().join("facesecure.redb");
    let storage = Storage::open(&db_path).expect("Failed to create storage");
    let settings = Settings::for_tests(PathBuf::from(&db_path));
    let keys = settings.key_pair().expect("Fresh test keys must decode");
    let codec = AeadCodec::new(&keys, DIM).expect("Failed to create codec");
    let audit = AuditLog::new(storage.clone());
    (
        VerificationEngine::new(codec, storage, audit.clone(), THRESHOLD),
        audit,
    )
}

fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    for x in &mut v {
        *x /= norm;
    }
    v
}

/// Unit vector along axis `axis`.
fn basis(axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[axis] = 1.0;
    v
}

/// Ten synthetic unit vectors clustered around `v0`: each adds a small
/// perturbation on a different axis, then renormalizes.
fn clustered_vectors(v0: &[f32]) -> Vec<Vec<f32>> {
    (0..10)
        .map(|k| {
            let mut v = v0.to_vec();
            v[k + 1] += 0.05;
            normalize(v)
        })
        .collect()
}

#[test]
fn enroll_then_verify_matching_query() {
    let temp_dir = TempDir::new().unwrap();
    let (engine, audit) = create_test_engine(&temp_dir);

    let v0 = basis(0);
    let id = engine.enroll("alice", &clustered_vectors(&v0)).unwrap();
    assert_eq!(id, 1);

    let outcome = engine.verify(&v0, None, "198.51.100.4").unwrap();
    assert!(outcome.verified);
    assert_eq!(outcome.matched_username.as_deref(), Some("alice"));
    assert!(outcome.similarity > 0.99);
    assert_eq!(outcome.threshold, THRESHOLD);
    assert_eq!(outcome.skipped_records, 0);

    // Verified outcomes never audit
    assert_eq!(audit.latest_seq().unwrap(), None);
}

#[test]
fn unrelated_query_rejected_with_one_audit_entry() {
    let temp_dir = TempDir::new().unwrap();
    let (engine, audit) = create_test_engine(&temp_dir);

    let v0 = basis(0);
    engine.enroll("alice", &clustered_vectors(&v0)).unwrap();

    // Orthogonal unit vector: cosine near zero, mapped similarity ~0.5
    let outcome = engine.verify(&basis(400), None, "198.51.100.4").unwrap();
    assert!(!outcome.verified);
    assert_eq!(outcome.matched_username, None);
    assert!(outcome.similarity < THRESHOLD);
    assert_eq!(outcome.reason, Some(FailureReason::BelowThreshold));

    // Exactly one audit entry, with the expected shape
    assert_eq!(audit.latest_seq().unwrap(), Some(1));
    let entry = audit.entry(1).unwrap().unwrap();
    assert_eq!(entry.claimed_username, None);
    assert_eq!(entry.observed_best_username.as_deref(), Some("alice"));
    assert_eq!(entry.similarity_score, outcome.similarity);
    assert_eq!(entry.reason, FailureReason::BelowThreshold);
    assert_eq!(entry.source_address, "198.51.100.4");
}

#[test]
fn one_to_one_verification_targets_only_the_claimed_identity() {
    let temp_dir = TempDir::new().unwrap();
    let (engine, _) = create_test_engine(&temp_dir);

    engine.enroll("alice", &[basis(0)]).unwrap();
    engine.enroll("bob", &[basis(1)]).unwrap();

    // The query matches bob, but the claim is alice
    let outcome = engine.verify(&basis(1), Some("alice"), "::1").unwrap();
    assert!(!outcome.verified);
    assert_eq!(outcome.reason, Some(FailureReason::BelowThreshold));

    let outcome = engine.verify(&basis(1), Some("bob"), "::1").unwrap();
    assert!(outcome.verified);
    assert_eq!(outcome.matched_username.as_deref(), Some("bob"));
}

#[test]
fn failed_enrollment_leaves_no_partial_identity() {
    let temp_dir = TempDir::new().unwrap();
    let (engine, _) = create_test_engine(&temp_dir);

    // Third vector has the wrong dimension; enrollment must fail whole
    let vectors = vec![basis(0), basis(1), vec![1.0, 0.0]];
    let err = engine.enroll("alice", &vectors).unwrap_err();
    assert!(matches!(err, CoreError::DimensionMismatch { .. }));

    let err = engine.verify(&basis(0), Some("alice"), "::1").unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
    assert!(engine.list_identities().unwrap().is_empty());
}

#[test]
fn tie_break_is_stable_across_calls() {
    let temp_dir = TempDir::new().unwrap();
    let (engine, _) = create_test_engine(&temp_dir);

    // Identical templates; enrollment order decides the winner, and
    // "walter" enrolled first despite sorting after "amy" by name
    engine.enroll("walter", &[basis(0)]).unwrap();
    engine.enroll("amy", &[basis(0)]).unwrap();

    for _ in 0..10 {
        let outcome = engine.verify(&basis(0), None, "::1").unwrap();
        assert_eq!(outcome.matched_username.as_deref(), Some("walter"));
    }
}

#[test]
fn removal_is_immediate_and_total() {
    let temp_dir = TempDir::new().unwrap();
    let (engine, _) = create_test_engine(&temp_dir);

    engine.enroll("alice", &clustered_vectors(&basis(0))).unwrap();
    assert!(engine.remove_identity("alice").unwrap());

    let err = engine.verify(&basis(0), None, "::1").unwrap_err();
    assert!(matches!(err, CoreError::NoEnrolledIdentities));
}

#[test]
fn store_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("facesecure.redb");
    let settings = Settings::for_tests(db_path.clone());
    let keys = settings.key_pair().unwrap();

    {
        let storage = Storage::open(&db_path).unwrap();
        let codec = AeadCodec::new(&keys, DIM).unwrap();
        let audit = AuditLog::new(storage.clone());
        let engine = VerificationEngine::new(codec, storage, audit, THRESHOLD);
        engine.enroll("alice", &clustered_vectors(&basis(0))).unwrap();
    }

    // Same key material, fresh process
    let storage = Storage::open(&db_path).unwrap();
    let codec = AeadCodec::new(&keys, DIM).unwrap();
    let audit = AuditLog::new(storage.clone());
    let engine = VerificationEngine::new(codec, storage, audit, THRESHOLD);

    let outcome = engine.verify(&basis(0), Some("alice"), "::1").unwrap();
    assert!(outcome.verified);
    assert!(outcome.similarity > 0.99);
}

#[test]
fn audit_log_accumulates_newest_first() {
    let temp_dir = TempDir::new().unwrap();
    let (engine, audit) = create_test_engine(&temp_dir);

    engine.enroll("alice", &[basis(0)]).unwrap();
    for axis in [100, 200, 300] {
        let outcome = engine.verify(&basis(axis), None, "::1").unwrap();
        assert!(!outcome.verified);
    }

    let recent = audit.recent(2).unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].seq, 3);
    assert_eq!(recent[1].seq, 2);
    assert!(recent.iter().all(|e| e.reason == FailureReason::BelowThreshold));
}
