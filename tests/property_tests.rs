//! Property-based tests for chronicle's pure, input-shape-sensitive pieces:
//! hashing, chunk id derivation, redaction, and the small enum parsers.
//!
//! Run with: cargo test --test property_tests

use proptest::prelude::*;

use chronicle::chunk::{ChunkConfig, Chunker};
use chronicle::ingest::hash::{canonical_sha256, sha256_hex};
use chronicle::ingest::redact::Redactor;
use chronicle::jobs::pattern;
use chronicle::store::queries::{insert_message, upsert_conversation};
use chronicle::store::Storage;
use chronicle::types::{Conversation, GizmoType, Job, JobProgress, JobStatus, JobType, Message, Role};

// ============================================================================
// HASHING
// ============================================================================

mod hash_tests {
    use super::*;

    proptest! {
        /// Invariant: sha256_hex never panics and always yields 64 lowercase hex chars.
        #[test]
        fn sha256_hex_is_well_formed(bytes in proptest::collection::vec(any::<u8>(), 0..500)) {
            let hex = sha256_hex(&bytes);
            prop_assert_eq!(hex.len(), 64);
            prop_assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }

        /// Invariant: hashing is a pure function of its bytes.
        #[test]
        fn sha256_hex_is_deterministic(bytes in proptest::collection::vec(any::<u8>(), 0..500)) {
            prop_assert_eq!(sha256_hex(&bytes), sha256_hex(&bytes));
        }

        /// Invariant: key order and insignificant whitespace don't affect the
        /// canonical hash of an object.
        #[test]
        fn canonical_hash_ignores_key_order(a in 0i64..1000, b in 0i64..1000) {
            let obj_a: serde_json::Value = serde_json::json!({"a": a, "b": b});
            let obj_b: serde_json::Value = serde_json::json!({"b": b, "a": a});
            prop_assert_eq!(canonical_sha256(&obj_a), canonical_sha256(&obj_b));
        }
    }
}

// ============================================================================
// ENUM ROUND-TRIPS
// ============================================================================

mod enum_tests {
    use super::*;

    proptest! {
        #[test]
        fn role_roundtrips(role in prop_oneof![
            Just(Role::User), Just(Role::Assistant), Just(Role::System),
            Just(Role::Tool), Just(Role::Unknown),
        ]) {
            let parsed: Role = role.as_str().parse().unwrap();
            prop_assert_eq!(parsed, role);
        }

        /// Invariant: any string parses to a Role (unknown author fields fold
        /// to Unknown rather than erroring).
        #[test]
        fn role_parse_never_panics(s in ".*") {
            let _: Role = s.parse().unwrap();
        }

        #[test]
        fn job_type_roundtrips(jt in prop_oneof![Just(JobType::Conversation), Just(JobType::Project)]) {
            let parsed: JobType = jt.as_str().parse().unwrap();
            prop_assert_eq!(parsed, jt);
        }

        #[test]
        fn job_status_roundtrips(st in prop_oneof![
            Just(JobStatus::Pending), Just(JobStatus::Running),
            Just(JobStatus::Done), Just(JobStatus::Failed),
        ]) {
            let parsed: JobStatus = st.as_str().parse().unwrap();
            prop_assert_eq!(parsed, st);
        }

        #[test]
        fn gizmo_type_roundtrips(gt in prop_oneof![Just(GizmoType::Snorlax), Just(GizmoType::Gpt)]) {
            let parsed: GizmoType = gt.as_str().parse().unwrap();
            prop_assert_eq!(parsed, gt);
        }

        /// Invariant: only the two known job statuses' terminal flag differs.
        #[test]
        fn only_done_and_failed_are_terminal(st in prop_oneof![
            Just(JobStatus::Pending), Just(JobStatus::Running),
            Just(JobStatus::Done), Just(JobStatus::Failed),
        ]) {
            prop_assert_eq!(st.is_terminal(), matches!(st, JobStatus::Done | JobStatus::Failed));
        }
    }
}

// ============================================================================
// PATTERN VALIDATION
// ============================================================================

mod pattern_tests {
    use super::*;

    proptest! {
        /// Invariant: pattern validity is always scoped correctly even for
        /// arbitrary, likely-invalid pattern strings.
        #[test]
        fn never_panics_and_rejects_unknown(pattern in "[a-z_]{0,20}") {
            let _ = pattern::is_valid(JobType::Conversation, &pattern);
            let _ = pattern::is_valid(JobType::Project, &pattern);
        }

        /// Invariant: every pattern in CONVERSATION_PATTERNS validates for
        /// Conversation jobs and (unless also listed) is rejected for Project.
        #[test]
        fn known_conversation_patterns_validate(idx in 0usize..pattern::CONVERSATION_PATTERNS.len()) {
            let p = pattern::CONVERSATION_PATTERNS[idx];
            prop_assert!(pattern::is_valid(JobType::Conversation, p));
        }

        #[test]
        fn known_project_patterns_validate(idx in 0usize..pattern::PROJECT_PATTERNS.len()) {
            let p = pattern::PROJECT_PATTERNS[idx];
            prop_assert!(pattern::is_valid(JobType::Project, p));
        }
    }
}

// ============================================================================
// REDACTION
// ============================================================================

mod redact_tests {
    use super::*;

    proptest! {
        /// Invariant: redaction never panics on arbitrary text.
        #[test]
        fn never_panics(s in "\\PC{0,500}") {
            let mut r = Redactor::new();
            let _ = r.redact(&s);
        }

        /// Invariant: text with no digits or '@' can't match any of the PII
        /// patterns, so it passes through unchanged.
        #[test]
        fn plain_text_is_untouched(s in "[a-zA-Z ]{0,200}") {
            let mut r = Redactor::new();
            prop_assert_eq!(r.redact(&s), s);
        }
    }
}

// ============================================================================
// CHUNKING
// ============================================================================

mod chunk_tests {
    use super::*;

    fn seed_conversation(storage: &Storage, conversation_id: &str, message_count: usize, content_len: usize) {
        storage
            .with_transaction(|tx| {
                upsert_conversation(
                    tx,
                    &Conversation {
                        id: conversation_id.to_string(),
                        title: "t".to_string(),
                        created_at: 0,
                        updated_at: 0,
                        message_count: message_count as i64,
                        default_model_slug: None,
                        gizmo_id: None,
                        raw_hash: "h".to_string(),
                        meta: serde_json::json!({}),
                    },
                )?;
                for i in 0..message_count {
                    insert_message(
                        tx,
                        &Message {
                            id: format!("m{i}"),
                            conversation_id: conversation_id.to_string(),
                            role: if i % 2 == 0 { Role::User } else { Role::Assistant },
                            content_type: "text".to_string(),
                            content_text: "x".repeat(content_len),
                            created_at: i as i64,
                            turn_index: i as i64,
                            parent_id: None,
                            text_hash: sha256_hex(format!("m{i}").as_bytes()),
                        },
                    )?;
                }
                Ok(())
            })
            .unwrap();
    }

    proptest! {
        /// Invariant: chunking never panics across a range of message counts,
        /// lengths and window configurations.
        #[test]
        fn never_panics(
            message_count in 0usize..30,
            content_len in 1usize..600,
            target_size in 100i64..3000,
            overlap in 0i64..500,
        ) {
            let storage = Storage::open_in_memory().unwrap();
            seed_conversation(&storage, "c1", message_count, content_len);
            let _ = Chunker::chunk(&storage, "c1", ChunkConfig { target_size, overlap });
        }

        /// Invariant: re-chunking with the same configuration reproduces the
        /// same chunk ids (idempotence of the content-derived identity).
        #[test]
        fn rechunking_is_idempotent(message_count in 1usize..20, content_len in 50usize..400) {
            let storage = Storage::open_in_memory().unwrap();
            seed_conversation(&storage, "c1", message_count, content_len);
            let config = ChunkConfig::default();
            let first = Chunker::chunk(&storage, "c1", config).unwrap();
            let second = Chunker::chunk(&storage, "c1", config).unwrap();
            prop_assert_eq!(first.len(), second.len());
            for (a, b) in first.iter().zip(second.iter()) {
                prop_assert_eq!(&a.id, &b.id);
            }
        }

        /// Invariant: every chunk's end_turn is >= its start_turn, and both
        /// fall within the conversation's actual turn range.
        #[test]
        fn chunk_turns_stay_in_range(message_count in 1usize..20, content_len in 50usize..400) {
            let storage = Storage::open_in_memory().unwrap();
            seed_conversation(&storage, "c1", message_count, content_len);
            let chunks = Chunker::chunk(&storage, "c1", ChunkConfig::default()).unwrap();
            for chunk in &chunks {
                prop_assert!(chunk.start_turn <= chunk.end_turn);
                prop_assert!(chunk.start_turn >= 0);
                prop_assert!(chunk.end_turn < message_count as i64);
            }
        }
    }
}

// ============================================================================
// JOB SERIALIZATION
// ============================================================================

mod job_tests {
    use super::*;

    proptest! {
        /// Invariant: a Job round-trips through JSON regardless of which
        /// optional fields are populated.
        #[test]
        fn job_json_roundtrips(
            has_progress in any::<bool>(),
            has_result in any::<bool>(),
            has_error in any::<bool>(),
        ) {
            let job = Job {
                id: "j1".to_string(),
                job_type: JobType::Conversation,
                target_id: "t1".to_string(),
                target_name: "t1".to_string(),
                pattern: "summarize".to_string(),
                status: JobStatus::Running,
                progress: has_progress.then(|| JobProgress { current: 1, total: 10, message: "m".to_string() }),
                result_path: has_result.then(|| "generated/x.txt".to_string()),
                error: has_error.then(|| "boom".to_string()),
                created_at: 0,
                started_at: None,
                finished_at: None,
                last_heartbeat_at: None,
            };
            let json = serde_json::to_string(&job).unwrap();
            let parsed: Job = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(parsed, job);
        }
    }
}
