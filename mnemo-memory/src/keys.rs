/// KV key layout for the memory package.
///
/// All keys are scoped under a memory prefix ("mem:{mid}") which is managed
/// by the recall.Index for segments and graph data. The memory package adds
/// keys for conversations.
///
/// ```text
/// {mid}:conv:{convID}:msg:{ts_ns}   → msgpack Message
/// {mid}:conv:{convID}:revert        → timestamp string (revert point)
/// ```
///
/// Segment and graph keys are managed by the recall layer:
/// ```text
/// {mid}:seg:{bucket}:{ts_ns}        → msgpack Segment
/// {mid}:sid:{id}                    → "{bucket}:{ts_ns}"
/// {mid}:g:e:{label}                 → Entity
/// {mid}:g:r:{from}:{type}:{to}     → Relation
/// ```
/// Base KV prefix for a memory ID. Format: "mem:{mid}"
pub fn mem_prefix(mid: &str) -> String {
    format!("mem:{mid}")
}

/// KV key for host-level metadata. Format: "mem:__meta:{name}"
pub fn host_meta_key(name: &str) -> String {
    format!("mem:__meta:{name}")
}

/// KV key for a conversation message.
/// Format: "mem:{mid}:conv:{convID}:msg:{ts_ns}"
/// Timestamp is zero-padded to 20 digits for correct lexicographic ordering.
pub fn conv_msg_key(mid: &str, conv_id: &str, ts: i64) -> String {
    format!("mem:{mid}:conv:{conv_id}:msg:{ts:020}")
}

/// Prefix for listing all messages in a conversation.
/// Format: "mem:{mid}:conv:{convID}:msg:"
pub fn conv_msg_prefix(mid: &str, conv_id: &str) -> String {
    format!("mem:{mid}:conv:{conv_id}:msg:")
}

/// KV key for a conversation revert point.
/// Format: "mem:{mid}:conv:{convID}:revert"
pub fn conv_revert_key(mid: &str, conv_id: &str) -> String {
    format!("mem:{mid}:conv:{conv_id}:revert")
}
