use std::collections::HashMap;
use std::sync::Arc;

use mnemo_kv::MemoryStore;

use crate::error::MemoryError;
use crate::host::{Host, HostConfig};
use crate::keys::{conv_msg_key, conv_msg_prefix, conv_revert_key};
use crate::types::{
    CompressPolicy, CompressResult, Compressor, EntityInput, EntityUpdate, Message,
    RecallQuery, RelationInput, Role, SegmentInput, now_nano,
};

// ---------------------------------------------------------------------------
// Mock compressor
// ---------------------------------------------------------------------------

/// Test separator: ASCII Unit Separator (0x1F) allows natural colon-namespaced
/// labels like "person:小明" without colliding with the label convention.
const TEST_SEP: char = '\x1F';

/// Compressor mock that inspects raw message content for keywords and
/// fabricates entities/relations/segments accordingly, so tests can assert
/// on deterministic extraction without a real LLM.
struct FakeCompressor;

#[async_trait::async_trait]
impl Compressor for FakeCompressor {
    async fn compress_messages(&self, messages: &[Message]) -> Result<CompressResult, MemoryError> {
        let combined = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(" | ");

        Ok(CompressResult {
            segments: vec![SegmentInput {
                summary: format!("compressed: {combined}"),
                keywords: vec![
                    "test".into(),
                    "dinosaurs".into(),
                    "cooking".into(),
                    "family".into(),
                    "topic_a".into(),
                    "topic_b".into(),
                ],
                labels: vec!["person:小明".into(), "person:user1".into()],
            }],
            summary: combined,
        })
    }

    async fn extract_entities(&self, messages: &[Message]) -> Result<EntityUpdate, MemoryError> {
        let combined = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(" | ");

        let mut entities = Vec::new();
        let mut relations = Vec::new();

        if combined.contains("小明") {
            entities.push(EntityInput { label: "person:小明".into(), attrs: HashMap::new() });
        }
        if combined.contains("小红") {
            entities.push(EntityInput { label: "person:小红".into(), attrs: HashMap::new() });
        }
        if combined.contains("兄妹") {
            relations.push(RelationInput {
                from: "person:小明".into(),
                to: "person:小红".into(),
                rel_type: "sibling".into(),
            });
        }
        if combined.contains("Alice") {
            entities.push(EntityInput {
                label: "person:Alice".into(),
                attrs: HashMap::from([("role".into(), serde_json::json!("engineer"))]),
            });
        }
        if combined.contains("妈妈") {
            entities.push(EntityInput { label: "person:妈妈".into(), attrs: HashMap::new() });
            relations.push(RelationInput {
                from: "person:妈妈".into(),
                to: "person:小明".into(),
                rel_type: "parent".into(),
            });
        }
        if combined.contains("爸爸") {
            entities.push(EntityInput { label: "person:爸爸".into(), attrs: HashMap::new() });
        }
        if combined.contains("user1") {
            entities.push(EntityInput { label: "person:user1".into(), attrs: HashMap::new() });
        }
        if combined.contains("sushi") {
            entities.push(EntityInput {
                label: "person:小明".into(),
                attrs: HashMap::from([("favorite_food".into(), serde_json::json!("sushi"))]),
            });
        }

        if entities.is_empty() {
            entities.push(EntityInput {
                label: "person:test".into(),
                attrs: HashMap::from([("compressed".into(), serde_json::json!(true))]),
            });
        }

        Ok(EntityUpdate { entities, relations })
    }

    async fn compact_segments(&self, summaries: &[String]) -> Result<CompressResult, MemoryError> {
        Ok(CompressResult {
            segments: vec![SegmentInput {
                summary: summaries.join(" + "),
                keywords: vec![],
                labels: vec![],
            }],
            summary: summaries.join(" + "),
        })
    }
}

/// Compressor mock that always fails, for testing error propagation.
struct FailingCompressor;

#[async_trait::async_trait]
impl Compressor for FailingCompressor {
    async fn compress_messages(&self, _msgs: &[Message]) -> Result<CompressResult, MemoryError> {
        Err(MemoryError::General("mock failure".into()))
    }
    async fn extract_entities(&self, _msgs: &[Message]) -> Result<EntityUpdate, MemoryError> {
        Err(MemoryError::General("mock failure".into()))
    }
    async fn compact_segments(&self, _summaries: &[String]) -> Result<CompressResult, MemoryError> {
        Err(MemoryError::General("mock failure".into()))
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn new_test_store() -> Arc<dyn mnemo_kv::KVStore> {
    Arc::new(MemoryStore::new())
}

fn new_test_host() -> Host {
    Host::new(HostConfig {
        store: new_test_store(),
        vec: None,
        embedder: None,
        compressor: None,
        compress_policy: CompressPolicy::disabled(),
        separator: TEST_SEP,
    })
    .unwrap()
}

fn new_test_host_with_compressor() -> Host {
    Host::new(HostConfig {
        store: new_test_store(),
        vec: None,
        embedder: None,
        compressor: Some(Arc::new(FakeCompressor)),
        compress_policy: CompressPolicy { max_chars: 100, max_messages: 5 },
        separator: TEST_SEP,
    })
    .unwrap()
}

fn new_test_host_with_failing_compressor() -> Host {
    Host::new(HostConfig {
        store: new_test_store(),
        vec: None,
        embedder: None,
        compressor: Some(Arc::new(FailingCompressor)),
        compress_policy: CompressPolicy { max_chars: 100, max_messages: 5 },
        separator: TEST_SEP,
    })
    .unwrap()
}

fn user_msg(content: &str) -> Message {
    Message { role: Role::User, content: content.into(), ..Default::default() }
}

fn model_msg(content: &str) -> Message {
    Message { role: Role::Model, content: content.into(), ..Default::default() }
}

// ===========================================================================
// TH: Host Management
// ===========================================================================

#[test]
fn th1_host_new_success() {
    let _h = new_test_host();
}

#[test]
fn th2_open_returns_memory_with_correct_id() {
    let h = new_test_host();
    let m = h.open("cat_girl");
    assert_eq!(m.id(), "cat_girl");
}

#[test]
fn th3_open_same_id_twice_operates_on_same_data() {
    let h = new_test_host();
    let m1 = h.open("cat_girl");
    let m2 = h.open("cat_girl");
    assert_eq!(m1.id(), m2.id());
}

#[test]
fn th4_list_returns_all_persona_ids() {
    let h = new_test_host();
    h.open("b_robot");
    h.open("a_cat");
    h.open("c_dog");
    let ids = h.list();
    assert_eq!(ids, vec!["a_cat", "b_robot", "c_dog"]);
}

#[tokio::test]
async fn th5_delete_clears_data() {
    let h = new_test_host();
    let m = h.open("cat_girl");
    let conv = m.open_conversation("dev1", &[]);
    conv.append(user_msg("hello")).await.unwrap();

    assert!(conv.count().unwrap() > 0);
    h.delete("cat_girl").unwrap();

    let m2 = h.open("cat_girl");
    let conv2 = m2.open_conversation("dev1", &[]);
    assert_eq!(conv2.count().unwrap(), 0);
}

#[test]
fn th6_delete_nonexistent_no_error() {
    let h = new_test_host();
    h.delete("ghost").unwrap();
}

#[tokio::test]
async fn th7_delete_prefix_isolation() {
    // Deleting persona "a" must not touch persona "a:b".
    let h = new_test_host();
    let ma = h.open("a");
    let mab = h.open("a:b");

    ma.open_conversation("c1", &[]).append(user_msg("a msg")).await.unwrap();
    mab.open_conversation("c1", &[]).append(user_msg("ab msg")).await.unwrap();

    h.delete("a").unwrap();

    let ma2 = h.open("a");
    assert_eq!(ma2.open_conversation("c1", &[]).count().unwrap(), 0);

    let mab2 = h.open("a:b");
    assert_eq!(mab2.open_conversation("c1", &[]).count().unwrap(), 1);
}

#[test]
fn th8_embed_pinning_accepts_matching_descriptor() {
    let store = new_test_store();
    Host::new(HostConfig {
        store: Arc::clone(&store),
        vec: None,
        embedder: Some(Arc::new(mnemo_embed::MockEmbedder::with_model(8, "m"))),
        compressor: None,
        compress_policy: CompressPolicy::disabled(),
        separator: TEST_SEP,
    })
    .unwrap();

    // Reopening with the identical model/dim descriptor must succeed.
    Host::new(HostConfig {
        store,
        vec: None,
        embedder: Some(Arc::new(mnemo_embed::MockEmbedder::with_model(8, "m"))),
        compressor: None,
        compress_policy: CompressPolicy::disabled(),
        separator: TEST_SEP,
    })
    .unwrap();
}

#[test]
fn th9_embed_pinning_rejects_dim_mismatch() {
    let store = new_test_store();
    Host::new(HostConfig {
        store: Arc::clone(&store),
        vec: None,
        embedder: Some(Arc::new(mnemo_embed::MockEmbedder::with_model(8, "m"))),
        compressor: None,
        compress_policy: CompressPolicy::disabled(),
        separator: TEST_SEP,
    })
    .unwrap();

    let result = Host::new(HostConfig {
        store,
        vec: None,
        embedder: Some(Arc::new(mnemo_embed::MockEmbedder::with_model(4, "m"))),
        compressor: None,
        compress_policy: CompressPolicy::disabled(),
        separator: TEST_SEP,
    });
    assert!(matches!(result, Err(MemoryError::EmbedDimensionMismatch { .. })));
}

#[test]
fn th10_embed_pinning_rejects_model_mismatch() {
    let store = new_test_store();
    Host::new(HostConfig {
        store: Arc::clone(&store),
        vec: None,
        embedder: Some(Arc::new(mnemo_embed::MockEmbedder::with_model(8, "m"))),
        compressor: None,
        compress_policy: CompressPolicy::disabled(),
        separator: TEST_SEP,
    })
    .unwrap();

    let result = Host::new(HostConfig {
        store,
        vec: None,
        embedder: Some(Arc::new(mnemo_embed::MockEmbedder::with_model(8, "different"))),
        compressor: None,
        compress_policy: CompressPolicy::disabled(),
        separator: TEST_SEP,
    });
    assert!(matches!(result, Err(MemoryError::EmbedDimensionMismatch { .. })));
}

// ===========================================================================
// TK: Keys Encoding
// ===========================================================================

#[test]
fn tk1_conv_msg_key_format() {
    let key = conv_msg_key("cat_girl", "dev1", 1700000000000000000);
    assert_eq!(key, "mem:cat_girl:conv:dev1:msg:01700000000000000000");
}

#[test]
fn tk2_conv_msg_prefix() {
    let p = conv_msg_prefix("cat_girl", "dev1");
    assert_eq!(p, "mem:cat_girl:conv:dev1:msg:");
}

#[test]
fn tk3_conv_revert_key() {
    let key = conv_revert_key("cat_girl", "dev1");
    assert_eq!(key, "mem:cat_girl:conv:dev1:revert");
}

#[test]
fn tk4_key_lexicographic_order() {
    let k1 = conv_msg_key("m", "c", 9000);
    let k2 = conv_msg_key("m", "c", 10000);
    assert!(k1 < k2, "zero-padded timestamps must sort correctly");
}

// ===========================================================================
// TT: Monotonic Timestamp
// ===========================================================================

#[test]
fn tt1_monotonic_1000_calls() {
    let mut prev = 0i64;
    for _ in 0..1000 {
        let ts = now_nano();
        assert!(ts > prev, "timestamps must be strictly increasing");
        prev = ts;
    }
}

#[test]
fn tt2_concurrent_no_duplicates() {
    use std::collections::HashSet;
    use std::sync::Mutex;

    let results: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));
    let mut handles = vec![];

    for _ in 0..10 {
        let results = Arc::clone(&results);
        handles.push(std::thread::spawn(move || {
            let mut local = Vec::new();
            for _ in 0..100 {
                local.push(now_nano());
            }
            results.lock().unwrap().extend(local);
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    let all = results.lock().unwrap();
    let set: HashSet<i64> = all.iter().copied().collect();
    assert_eq!(all.len(), 1000, "should have 1000 timestamps");
    assert_eq!(set.len(), 1000, "all timestamps should be unique");
}

// ===========================================================================
// TC: Conversation
// ===========================================================================

#[tokio::test]
async fn tc1_append_and_recent() {
    let h = new_test_host();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);

    for i in 0..5 {
        conv.append(user_msg(&format!("msg{i}"))).await.unwrap();
    }

    let recent = conv.recent(10).unwrap();
    assert_eq!(recent.len(), 5);
    assert_eq!(recent[0].content, "msg0");
    assert_eq!(recent[4].content, "msg4");
}

#[tokio::test]
async fn tc2_append_auto_fills_timestamp() {
    let h = new_test_host();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);
    conv.append(user_msg("hello")).await.unwrap();

    let msgs = conv.all().unwrap();
    assert_eq!(msgs.len(), 1);
    assert!(msgs[0].timestamp > 0);
}

#[tokio::test]
async fn tc3_recent_limits_count() {
    let h = new_test_host();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);

    for i in 0..10 {
        conv.append(user_msg(&format!("msg{i}"))).await.unwrap();
    }

    let recent = conv.recent(3).unwrap();
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].content, "msg7");
    assert_eq!(recent[2].content, "msg9");
}

#[tokio::test]
async fn tc4_count() {
    let h = new_test_host();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);

    assert_eq!(conv.count().unwrap(), 0);
    conv.append(user_msg("a")).await.unwrap();
    conv.append(model_msg("b")).await.unwrap();
    assert_eq!(conv.count().unwrap(), 2);
}

#[tokio::test]
async fn tc5_all_returns_all() {
    let h = new_test_host();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);

    conv.append(user_msg("a")).await.unwrap();
    conv.append(model_msg("b")).await.unwrap();
    conv.append(user_msg("c")).await.unwrap();

    let all = conv.all().unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].content, "a");
    assert_eq!(all[2].content, "c");
}

#[tokio::test]
async fn tc6_clear_resets_count() {
    let h = new_test_host();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);

    conv.append(user_msg("a")).await.unwrap();
    conv.append(model_msg("b")).await.unwrap();
    assert_eq!(conv.count().unwrap(), 2);

    conv.clear().unwrap();
    assert_eq!(conv.count().unwrap(), 0);
}

#[tokio::test]
async fn tc7_revert_deletes_last_user_and_model() {
    let h = new_test_host();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);

    conv.append(user_msg("q1")).await.unwrap();
    conv.append(model_msg("a1")).await.unwrap();
    conv.append(user_msg("q2")).await.unwrap();
    conv.append(model_msg("a2")).await.unwrap();

    conv.revert().unwrap();

    let msgs = conv.all().unwrap();
    assert_eq!(msgs.len(), 2);
    assert_eq!(msgs[0].content, "q1");
    assert_eq!(msgs[1].content, "a1");
}

#[tokio::test]
async fn tc8_revert_no_user_msg_no_error() {
    let h = new_test_host();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);

    conv.append(model_msg("a1")).await.unwrap();
    conv.revert().unwrap();
}

#[tokio::test]
async fn tc9_revert_then_recent_excludes_deleted() {
    let h = new_test_host();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);

    conv.append(user_msg("q1")).await.unwrap();
    conv.append(model_msg("a1")).await.unwrap();
    conv.append(user_msg("q2")).await.unwrap();
    conv.append(model_msg("a2")).await.unwrap();

    conv.revert().unwrap();

    let recent = conv.recent(10).unwrap();
    assert_eq!(recent.len(), 2);
    assert!(!recent.iter().any(|m| m.content == "q2" || m.content == "a2"));
}

#[tokio::test]
async fn tc10_recent_segments() {
    let h = new_test_host();
    let m = h.open("p1");

    m.store_segment(
        SegmentInput { summary: "test seg".into(), keywords: vec![], labels: vec![] },
        mnemo_recall::bucket_1h(),
    )
    .await
    .unwrap();

    let conv = m.open_conversation("c1", &[]);
    let segs = conv.recent_segments(10).unwrap();
    assert_eq!(segs.len(), 1);
    assert_eq!(segs[0].summary, "test seg");
}

#[tokio::test]
async fn tc11_auto_compress_on_max_chars() {
    let h = new_test_host_with_compressor();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);

    // Policy: max_chars=100. Each msg ~48 chars. By the 3rd message pending
    // content exceeds 100 and compress fires; later messages remain.
    for i in 0..5 {
        let content = format!("message number {i} with some padding text here");
        conv.append(user_msg(&content)).await.unwrap();
    }

    let count = conv.count().unwrap();
    assert!(count < 5, "auto-compress should have reduced message count, got {count}");

    let segs = conv.recent_segments(10).unwrap();
    assert!(!segs.is_empty(), "segments should exist after compress");
}

#[tokio::test]
async fn tc12_auto_compress_on_max_messages() {
    let h = new_test_host_with_compressor();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);

    // Policy: max_messages=5. Send exactly 5.
    for i in 0..5 {
        conv.append(user_msg(&format!("m{i}"))).await.unwrap();
    }

    let count = conv.count().unwrap();
    assert_eq!(count, 0, "should auto-compress at message threshold");
}

#[tokio::test]
async fn tc13_auto_compress_failure_does_not_block_append() {
    let h = new_test_host_with_failing_compressor();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);

    for i in 0..6 {
        conv.append(user_msg(&format!("m{i}"))).await.unwrap();
    }

    // Append succeeded despite compress failure.
    assert!(conv.count().unwrap() > 0);
    assert!(conv.last_compress_err().is_some());
}

#[tokio::test]
async fn tc14_auto_compress_plus_compact_cascade() {
    let host = Host::new(HostConfig {
        store: new_test_store(),
        vec: None,
        embedder: None,
        compressor: Some(Arc::new(FakeCompressor)),
        compress_policy: CompressPolicy { max_chars: 50, max_messages: 3 },
        separator: TEST_SEP,
    })
    .unwrap();

    let m = host.open("p1");
    let conv = m.open_conversation("c1", &[]);

    // Trigger multiple auto-compresses by sending enough messages in batches.
    for i in 0..12 {
        conv.append(user_msg(&format!("message batch item {i}"))).await.unwrap();
    }

    // Verify segments exist (some may have been compacted).
    let segs = conv.recent_segments(100).unwrap();
    assert!(!segs.is_empty(), "segments should exist after compress+compact");
}

// ===========================================================================
// TM: Memory Core
// ===========================================================================

#[tokio::test]
async fn tm1_store_segment_and_recall() {
    let h = new_test_host();
    let m = h.open("p1");

    m.store_segment(
        SegmentInput {
            summary: "talked about dinosaurs".into(),
            keywords: vec!["dinosaurs".into()],
            labels: vec!["person:小明".into()],
        },
        mnemo_recall::bucket_1h(),
    )
    .await
    .unwrap();

    let result = m.recall(RecallQuery { labels: vec![], text: String::new(), hops: 0, limit: 10 }).await.unwrap();

    // With no signal active at all, unscored segments pass through.
    assert!(!result.segments.is_empty() || result.entities.is_empty());
}

#[tokio::test]
async fn tm2_recall_empty_memory() {
    let h = new_test_host();
    let m = h.open("p1");

    let result = m.recall(RecallQuery { labels: vec![], text: String::new(), hops: 0, limit: 10 }).await.unwrap();

    assert!(result.segments.is_empty());
    assert!(result.entities.is_empty());
}

#[tokio::test]
async fn tm3_recall_with_labels() {
    let h = new_test_host();
    let m = h.open("p1");

    m.store_segment(
        SegmentInput {
            summary: "dino chat".into(),
            keywords: vec!["dinosaurs".into()],
            labels: vec!["person:小明".into()],
        },
        mnemo_recall::bucket_1h(),
    )
    .await
    .unwrap();

    m.store_segment(
        SegmentInput {
            summary: "cooking session".into(),
            keywords: vec!["cooking".into()],
            labels: vec!["person:妈妈".into()],
        },
        mnemo_recall::bucket_1h(),
    )
    .await
    .unwrap();

    let result = m
        .recall(RecallQuery { labels: vec!["person:小明".into()], text: String::new(), hops: 0, limit: 10 })
        .await
        .unwrap();

    assert!(
        result.segments.iter().any(|s| s.labels.contains(&"person:小明".into())),
        "should find segment with matching label"
    );
}

#[tokio::test]
async fn tm4_recall_with_text() {
    let h = new_test_host();
    let m = h.open("p1");

    m.store_segment(
        SegmentInput {
            summary: "talked about dinosaurs".into(),
            keywords: vec!["dinosaurs".into(), "trex".into()],
            labels: vec![],
        },
        mnemo_recall::bucket_1h(),
    )
    .await
    .unwrap();

    let result = m.recall(RecallQuery { labels: vec![], text: "dinosaurs".into(), hops: 0, limit: 10 }).await.unwrap();

    assert!(
        result.segments.iter().any(|s| s.keywords.contains(&"dinosaurs".into())),
        "keyword search should find the segment"
    );
}

#[tokio::test]
async fn tm5_recall_limit() {
    let h = new_test_host();
    let m = h.open("p1");

    for i in 0..5 {
        m.store_segment(
            SegmentInput { summary: format!("seg {i}"), keywords: vec!["test".into()], labels: vec![] },
            mnemo_recall::bucket_1h(),
        )
        .await
        .unwrap();
    }

    let result = m.recall(RecallQuery { labels: vec![], text: "test".into(), hops: 0, limit: 2 }).await.unwrap();

    assert!(result.segments.len() <= 2);
}

#[tokio::test]
async fn tm6_apply_entity_update_creates() {
    let h = new_test_host();
    let m = h.open("p1");

    m.apply_entity_update(&EntityUpdate {
        entities: vec![EntityInput {
            label: "person:小明".into(),
            attrs: HashMap::from([("age".into(), serde_json::json!(5))]),
        }],
        relations: vec![RelationInput {
            from: "person:小明".into(),
            to: "person:小红".into(),
            rel_type: "sibling".into(),
        }],
    })
    .unwrap();

    let ent = m.graph().get_entity("person:小明").unwrap();
    assert!(ent.is_some());
    assert_eq!(ent.unwrap().attrs["age"], serde_json::json!(5));

    let rels = m.graph().relations("person:小明").unwrap();
    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0].rel_type, "sibling");
}

#[tokio::test]
async fn tm7_apply_entity_update_merges() {
    let h = new_test_host();
    let m = h.open("p1");

    m.apply_entity_update(&EntityUpdate {
        entities: vec![EntityInput {
            label: "person:小明".into(),
            attrs: HashMap::from([("age".into(), serde_json::json!(5))]),
        }],
        relations: vec![],
    })
    .unwrap();

    m.apply_entity_update(&EntityUpdate {
        entities: vec![EntityInput {
            label: "person:小明".into(),
            attrs: HashMap::from([("hobby".into(), serde_json::json!("dinosaurs"))]),
        }],
        relations: vec![],
    })
    .unwrap();

    let ent = m.graph().get_entity("person:小明").unwrap().unwrap();
    assert_eq!(ent.attrs["age"], serde_json::json!(5));
    assert_eq!(ent.attrs["hobby"], serde_json::json!("dinosaurs"));
}

#[tokio::test]
async fn tm8_compress_pipeline() {
    let h = new_test_host_with_compressor();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);

    conv.append(user_msg("hello")).await.unwrap();
    conv.append(model_msg("hi there")).await.unwrap();

    m.compress(&conv, None).await.unwrap();

    assert_eq!(conv.count().unwrap(), 0, "conversation should be cleared after compress");

    let segs = m.index().recent_segments(10).unwrap();
    assert!(!segs.is_empty(), "segments should exist after compress");

    let ent = m.graph().get_entity("person:test").unwrap();
    assert!(ent.is_some(), "entity should be created by compress");
}

#[tokio::test]
async fn tm9_compress_no_compressor_returns_error() {
    let h = new_test_host();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);
    conv.append(user_msg("hello")).await.unwrap();

    let result = m.compress(&conv, None).await;
    assert!(matches!(result, Err(MemoryError::NoCompressor)));
}

#[tokio::test]
async fn tm10_compact_bucket_cascade() {
    let host = Host::new(HostConfig {
        store: new_test_store(),
        vec: None,
        embedder: None,
        compressor: Some(Arc::new(FakeCompressor)),
        compress_policy: CompressPolicy { max_chars: 50, max_messages: 3 },
        separator: TEST_SEP,
    })
    .unwrap();
    let m = host.open("p1");

    for i in 0..5 {
        m.store_segment(
            SegmentInput {
                summary: format!("segment number {i} with padding"),
                keywords: vec!["test".into()],
                labels: vec![],
            },
            mnemo_recall::bucket_1h(),
        )
        .await
        .unwrap();
    }

    m.compact().await.unwrap();

    let segs = m.index().recent_segments(100).unwrap();
    assert!(!segs.is_empty(), "segments should exist after compact");
}

#[tokio::test]
async fn tm11_recall_returns_entity_attrs_for_expanded_labels() {
    let h = new_test_host();
    let m = h.open("p1");

    m.apply_entity_update(&EntityUpdate {
        entities: vec![EntityInput {
            label: "person:小明".into(),
            attrs: HashMap::from([("age".into(), serde_json::json!(5))]),
        }],
        relations: vec![],
    })
    .unwrap();

    let result = m
        .recall(RecallQuery { labels: vec!["person:小明".into()], text: String::new(), hops: 1, limit: 10 })
        .await
        .unwrap();

    assert!(result.entities.iter().any(|e| e.label == "person:小明" && e.attrs["age"] == serde_json::json!(5)));
}

#[tokio::test]
async fn tm12_lt_bucket_never_compacted() {
    let host = Host::new(HostConfig {
        store: new_test_store(),
        vec: None,
        embedder: None,
        compressor: Some(Arc::new(FakeCompressor)),
        compress_policy: CompressPolicy { max_chars: 0, max_messages: 3 },
        separator: TEST_SEP,
    })
    .unwrap();
    let m = host.open("p1");

    for i in 0..10 {
        m.store_segment(
            SegmentInput {
                summary: format!("long term segment {i}"),
                keywords: vec![],
                labels: vec![],
            },
            mnemo_recall::bucket_lt(),
        )
        .await
        .unwrap();
    }

    m.compact().await.unwrap();

    let (count, _) = m.index().bucket_stats(&mnemo_recall::bucket_lt()).unwrap();
    assert_eq!(count, 10, "BucketLT must never be compacted");
}

// ===========================================================================
// TL: Compressor trait contract
// ===========================================================================

#[tokio::test]
async fn tl1_compress_messages_returns_segments() {
    let c = FakeCompressor;
    let msgs = vec![user_msg("hello"), model_msg("world")];
    let result = c.compress_messages(&msgs).await.unwrap();
    assert_eq!(result.segments.len(), 1);
    assert!(result.segments[0].summary.contains("hello"));
    assert!(result.segments[0].summary.contains("world"));
}

#[tokio::test]
async fn tl2_extract_entities_returns_update() {
    let c = FakeCompressor;
    let msgs = vec![user_msg("hello")];
    let update = c.extract_entities(&msgs).await.unwrap();
    assert_eq!(update.entities.len(), 1);
    assert_eq!(update.entities[0].label, "person:test");
}

#[tokio::test]
async fn tl3_compact_segments_combines_summaries() {
    let c = FakeCompressor;
    let summaries = vec!["seg1".to_string(), "seg2".to_string()];
    let result = c.compact_segments(&summaries).await.unwrap();
    assert_eq!(result.segments.len(), 1);
    assert!(result.summary.contains("seg1"));
    assert!(result.summary.contains("seg2"));
}

#[tokio::test]
async fn tl4_failing_compressor_returns_error() {
    let c = FailingCompressor;
    let result = c.compress_messages(&[user_msg("test")]).await;
    assert!(result.is_err());
}

// ===========================================================================
// TS: Serialization Compatibility
// ===========================================================================

#[test]
fn ts1_message_msgpack_roundtrip() {
    let msg = Message {
        role: Role::User,
        name: "Alice".into(),
        content: "hello world".into(),
        timestamp: 1700000000000000000,
        ..Default::default()
    };

    let data = rmp_serde::to_vec_named(&msg).unwrap();
    let decoded: Message = rmp_serde::from_slice(&data).unwrap();

    assert_eq!(decoded.role, Role::User);
    assert_eq!(decoded.name, "Alice");
    assert_eq!(decoded.content, "hello world");
    assert_eq!(decoded.timestamp, 1700000000000000000);
}

#[test]
fn ts2_message_tool_roundtrip() {
    let msg = Message {
        role: Role::Tool,
        content: "result data".into(),
        timestamp: 100,
        tool_call_id: "tc123".into(),
        tool_call_name: "search".into(),
        tool_call_args: r#"{"q":"test"}"#.into(),
        tool_result_id: "tr456".into(),
        ..Default::default()
    };

    let data = rmp_serde::to_vec_named(&msg).unwrap();
    let decoded: Message = rmp_serde::from_slice(&data).unwrap();

    assert_eq!(decoded.tool_call_id, "tc123");
    assert_eq!(decoded.tool_call_name, "search");
    assert_eq!(decoded.tool_call_args, r#"{"q":"test"}"#);
    assert_eq!(decoded.tool_result_id, "tr456");
}

#[test]
fn ts3_message_model_roundtrip() {
    let msg = Message { role: Role::Model, content: "I'm a model response".into(), timestamp: 200, ..Default::default() };

    let data = rmp_serde::to_vec_named(&msg).unwrap();
    let decoded: Message = rmp_serde::from_slice(&data).unwrap();

    assert_eq!(decoded.role, Role::Model);
    assert_eq!(decoded.content, "I'm a model response");
}

#[test]
fn ts4_recall_query_json_roundtrip() {
    let q = RecallQuery { labels: vec!["person:小明".into()], text: "dinosaurs".into(), hops: 2, limit: 10 };

    let json = serde_json::to_string(&q).unwrap();
    let decoded: RecallQuery = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded.labels, q.labels);
    assert_eq!(decoded.text, q.text);
}

#[test]
fn ts5_entity_update_json_roundtrip() {
    let update = EntityUpdate {
        entities: vec![EntityInput {
            label: "person:小明".into(),
            attrs: HashMap::from([("age".into(), serde_json::json!(5))]),
        }],
        relations: vec![RelationInput {
            from: "person:小明".into(),
            to: "person:小红".into(),
            rel_type: "sibling".into(),
        }],
    };

    let json = serde_json::to_string(&update).unwrap();
    let decoded: EntityUpdate = serde_json::from_str(&json).unwrap();

    assert_eq!(decoded.entities.len(), 1);
    assert_eq!(decoded.entities[0].label, "person:小明");
    assert_eq!(decoded.relations.len(), 1);
}

#[test]
fn ts6_compress_result_json_roundtrip() {
    let result = CompressResult {
        segments: vec![SegmentInput { summary: "test".into(), keywords: vec!["kw".into()], labels: vec!["label".into()] }],
        summary: "overall".into(),
    };

    let json = serde_json::to_string(&result).unwrap();
    let decoded: CompressResult = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded.segments.len(), 1);
    assert_eq!(decoded.summary, "overall");
}

// ===========================================================================
// TI: Integration
// ===========================================================================

#[tokio::test]
async fn ti1_full_flow_append_and_recall() {
    let h = new_test_host();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);

    for i in 0..10 {
        conv.append(user_msg(&format!("conversation turn {i}"))).await.unwrap();
    }

    m.store_segment(
        SegmentInput {
            summary: "conversation summary about dinosaurs".into(),
            keywords: vec!["dinosaurs".into(), "conversation".into()],
            labels: vec!["person:小明".into()],
        },
        mnemo_recall::bucket_1h(),
    )
    .await
    .unwrap();

    let result = m.recall(RecallQuery { labels: vec![], text: "dinosaurs".into(), hops: 0, limit: 10 }).await.unwrap();

    assert!(!result.segments.is_empty());
}

#[tokio::test]
async fn ti2_auto_compress_then_recall() {
    let h = new_test_host_with_compressor();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);

    for i in 0..6 {
        conv.append(user_msg(&format!("long message {i} with extra padding content"))).await.unwrap();
    }

    let segs = m.index().recent_segments(100).unwrap();
    assert!(!segs.is_empty(), "compressed segments should exist in index");
}

#[tokio::test]
async fn ti3_multi_persona_isolation() {
    let h = new_test_host();
    let m1 = h.open("alice");
    let m2 = h.open("bob");

    let mut c1 = m1.open_conversation("c1", &[]);
    let mut c2 = m2.open_conversation("c1", &[]);

    c1.append(user_msg("alice msg")).await.unwrap();
    c2.append(user_msg("bob msg")).await.unwrap();

    let alice_msgs = c1.all().unwrap();
    let bob_msgs = c2.all().unwrap();

    assert_eq!(alice_msgs.len(), 1);
    assert_eq!(bob_msgs.len(), 1);
    assert_eq!(alice_msgs[0].content, "alice msg");
    assert_eq!(bob_msgs[0].content, "bob msg");
}

#[tokio::test]
async fn ti4_entity_from_compress_recall_with_graph() {
    let h = new_test_host_with_compressor();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);

    conv.append(user_msg("hello")).await.unwrap();
    conv.append(model_msg("world")).await.unwrap();

    m.compress(&conv, None).await.unwrap();

    let ent = m.graph().get_entity("person:test").unwrap();
    assert!(ent.is_some());
}

#[tokio::test]
async fn ti5_revert_and_reappend() {
    let h = new_test_host();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);

    conv.append(user_msg("q1")).await.unwrap();
    conv.append(model_msg("a1")).await.unwrap();
    conv.append(user_msg("q2")).await.unwrap();
    conv.append(model_msg("a2")).await.unwrap();

    conv.revert().unwrap();
    conv.append(user_msg("q2_new")).await.unwrap();
    conv.append(model_msg("a2_new")).await.unwrap();

    let msgs = conv.all().unwrap();
    assert_eq!(msgs.len(), 4);
    assert_eq!(msgs[2].content, "q2_new");
    assert_eq!(msgs[3].content, "a2_new");
}

// ===========================================================================
// TE: End-to-end scenarios (spec §8)
// ===========================================================================

#[tokio::test]
async fn te1_single_person() {
    let h = new_test_host_with_compressor();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &["person:小明".into()]);

    let msgs = vec![
        ("user", "你好呀"),
        ("model", "小明你好！"),
        ("user", "我今天看了恐龙的书"),
        ("model", "真棒！你最喜欢什么恐龙？"),
        ("user", "霸王龙！它最厉害了"),
        ("model", "霸王龙确实很厉害呢"),
        ("user", "我长大想当古生物学家"),
        ("model", "那你要好好学习哦"),
        ("user", "嗯！我会加油的"),
        ("model", "加油！"),
    ];

    for (role, content) in &msgs {
        let msg = if *role == "user" { user_msg(content) } else { model_msg(content) };
        conv.append(msg).await.unwrap();
    }

    m.compress(&conv, None).await.unwrap();

    let ent = m.graph().get_entity("person:小明").unwrap();
    assert!(ent.is_some(), "entity should be created");
}

#[tokio::test]
async fn te2_two_siblings() {
    let h = new_test_host_with_compressor();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);

    conv.append(user_msg("我是小明，这是小红，我们是兄妹")).await.unwrap();
    conv.append(model_msg("你们好！")).await.unwrap();

    m.compress(&conv, None).await.unwrap();

    let ents = m.graph().list_entities("person:").unwrap();
    assert!(ents.len() >= 2, "should have at least 2 entities");

    let rels = m.graph().relations("person:小明").unwrap();
    assert!(!rels.is_empty(), "should have sibling relation");
}

#[tokio::test]
async fn te3_work_chat_english() {
    let h = new_test_host_with_compressor();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);

    conv.append(user_msg("Alice is working as an engineer on the project")).await.unwrap();
    conv.append(model_msg("Got it.")).await.unwrap();

    m.compress(&conv, None).await.unwrap();

    let ent = m.graph().get_entity("person:Alice").unwrap();
    assert!(ent.is_some(), "should have person:Alice");
}

#[tokio::test]
async fn te4_cooking_multiple_people() {
    let h = new_test_host_with_compressor();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);

    conv.append(user_msg("妈妈教小明 cooking")).await.unwrap();
    conv.append(model_msg("真不错")).await.unwrap();

    m.compress(&conv, None).await.unwrap();

    let ents = m.graph().list_entities("").unwrap();
    assert!(ents.len() >= 2, "should have at least 2 entities");
}

#[tokio::test]
async fn te5_family_week_100msg() {
    let h = new_test_host_with_compressor();
    let m = h.open("p1");

    for i in 0..5 {
        let conv = m.open_conversation(&format!("c{i}"), &[]);
        for j in 0..20 {
            conv.append(user_msg(&format!("小明 小红 兄妹 爸爸 妈妈 message {j} dinosaurs family"))).await.unwrap();
        }
        m.compress(&conv, None).await.unwrap();
    }
    m.compact().await.unwrap();

    let ents = m.graph().list_entities("person:").unwrap();
    assert!(ents.len() >= 4, "should have >= 4 entities");

    let rels = m.graph().relations("person:小明").unwrap();
    assert!(rels.len() >= 2, "should have >= 2 relations");

    let segs = m.index().recent_segments(100).unwrap();
    assert!(segs.len() >= 2, "should have >= 2 segments");

    let recall_res = m
        .recall(RecallQuery { text: "dinosaurs".into(), labels: vec!["person:小明".into()], limit: 10, hops: 0 })
        .await
        .unwrap();
    assert!(!recall_res.segments.is_empty(), "should have recall result");
}

#[tokio::test]
async fn te6_topic_drift_100msg() {
    let h = new_test_host_with_compressor();
    let m = h.open("p1");

    for i in 0..5 {
        let conv = m.open_conversation(&format!("c{i}"), &[]);
        for j in 0..20 {
            conv.append(user_msg(&format!("user1 talking about topic_a and topic_b {j}"))).await.unwrap();
        }
        m.compress(&conv, None).await.unwrap();
    }
    m.compact().await.unwrap();

    let ents = m.graph().list_entities("").unwrap();
    assert!(!ents.is_empty(), "should have >= 1 entity");

    let segs = m.index().recent_segments(100).unwrap();
    assert!(segs.len() >= 2, "should have >= 2 segments");
}

#[tokio::test]
async fn te7_corrections() {
    let h = new_test_host_with_compressor();
    let m = h.open("p1");
    let conv1 = m.open_conversation("c1", &[]);

    conv1.append(user_msg("小明的小红")).await.unwrap();
    m.compress(&conv1, None).await.unwrap();

    let conv2 = m.open_conversation("c2", &[]);
    conv2.append(user_msg("小明的 sushi")).await.unwrap();
    m.compress(&conv2, None).await.unwrap();

    let ent = m.graph().get_entity("person:小明").unwrap().unwrap();
    assert_eq!(ent.attrs["favorite_food"], serde_json::json!("sushi"), "correction should update attribute");
}

// ===========================================================================
// TB: Bulk / stress scenarios
// ===========================================================================

#[tokio::test]
async fn tb1_1000_messages_append() {
    let h = new_test_host_with_compressor();
    let m = h.open("p1");
    let conv = m.open_conversation("c1", &[]);

    for i in 0..1000 {
        conv.append(user_msg(&format!("bulk msg {i}"))).await.unwrap();
    }
    // Should not OOM; auto-compress should have triggered repeatedly.
}

#[tokio::test]
async fn tb2_100_segments_compact() {
    let host = Host::new(HostConfig {
        store: new_test_store(),
        vec: None,
        embedder: None,
        compressor: Some(Arc::new(FakeCompressor)),
        compress_policy: CompressPolicy { max_chars: 500, max_messages: 10 },
        separator: TEST_SEP,
    })
    .unwrap();
    let m = host.open("p1");

    for i in 0..100 {
        m.store_segment(
            SegmentInput { summary: format!("bulk segment {i}"), keywords: vec!["bulk".into()], labels: vec![] },
            mnemo_recall::bucket_1h(),
        )
        .await
        .unwrap();
    }

    m.compact().await.unwrap();

    let segs = m.index().recent_segments(1000).unwrap();
    assert!(!segs.is_empty());
}

#[tokio::test]
async fn tb3_50_entities_100_relations() {
    let h = new_test_host();
    let m = h.open("p1");

    let mut entities = Vec::new();
    for i in 0..50 {
        entities.push(EntityInput { label: format!("entity_{i}"), attrs: HashMap::from([("idx".into(), serde_json::json!(i))]) });
    }

    let mut relations = Vec::new();
    for i in 0..100 {
        relations.push(RelationInput {
            from: format!("entity_{}", i % 50),
            to: format!("entity_{}", (i + 1) % 50),
            rel_type: "link".into(),
        });
    }

    m.apply_entity_update(&EntityUpdate { entities, relations }).unwrap();

    let all_ents = m.graph().list_entities("entity_").unwrap();
    assert_eq!(all_ents.len(), 50);

    let neighbors = m.graph().neighbors("entity_0", &[]).unwrap();
    assert!(!neighbors.is_empty());
}

#[tokio::test]
async fn tb4_10_personas_isolation() {
    let h = new_test_host();

    let mut handles = vec![];
    for i in 0..10 {
        let m = h.open(&format!("persona_{i}"));
        handles.push((i, m));
    }

    for (i, m) in &handles {
        let conv = m.open_conversation("c1", &[]);
        conv.append(user_msg(&format!("persona {i} message"))).await.unwrap();
    }

    for (i, m) in &handles {
        let conv = m.open_conversation("c1", &[]);
        let msgs = conv.all().unwrap();
        assert_eq!(msgs.len(), 1, "persona {i} should have exactly 1 message");
        assert!(msgs[0].content.contains(&format!("persona {i}")));
    }
}

#[tokio::test]
async fn tb5_recall_performance_1000_segments() {
    let h = new_test_host();
    let m = h.open("p1");

    for i in 0..1000 {
        m.store_segment(
            SegmentInput {
                summary: format!("segment {i} about topic {}", i % 10),
                keywords: vec![format!("topic{}", i % 10)],
                labels: vec![format!("label{}", i % 5)],
            },
            mnemo_recall::bucket_1h(),
        )
        .await
        .unwrap();
    }

    let start = std::time::Instant::now();
    let result = m
        .recall(RecallQuery { labels: vec!["label0".into()], text: "topic0".into(), hops: 0, limit: 10 })
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert!(!result.segments.is_empty());
    assert!(elapsed.as_millis() < 1000, "recall over an in-memory store should stay fast, took {}ms", elapsed.as_millis());
}
