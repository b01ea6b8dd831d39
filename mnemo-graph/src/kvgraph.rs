use std::collections::{HashMap, HashSet};

use mnemo_kv::{KVError, KVStore};
use serde_json::Value;

use crate::error::GraphError;
use crate::graph::{Entity, Graph, Relation};

/// Default KV key separator.
pub const DEFAULT_SEPARATOR: char = ':';

/// KV key layout (relative to the configured prefix):
///
/// ```text
/// {prefix}{sep}e{sep}{label}                        -> JSON-encoded Entity.Attrs
/// {prefix}{sep}r{sep}{from}{sep}{relType}{sep}{to}  -> empty (forward index)
/// {prefix}{sep}ri{sep}{to}{sep}{relType}{sep}{from} -> empty (reverse index)
/// ```
///
/// The separator defaults to ':' but can be configured (e.g. '\x1F')
/// to allow labels containing ':' such as "person:小明".
pub struct KVGraph {
    store: Box<dyn KVStore>,
    prefix: String,
    sep: char,
}

impl KVGraph {
    /// Create a new KVGraph using the given store, key prefix, and separator.
    ///
    /// The separator is used between key segments. Labels must not contain
    /// the separator character. Use `'\x1F'` (ASCII Unit Separator) to allow
    /// colon-namespaced labels like "person:小明".
    ///
    /// Pass `DEFAULT_SEPARATOR` (`:`) for the default behavior.
    pub fn new(store: Box<dyn KVStore>, prefix: &str) -> Self {
        Self {
            store,
            prefix: prefix.to_string(),
            sep: DEFAULT_SEPARATOR,
        }
    }

    /// Create a KVGraph with a custom separator.
    pub fn with_separator(store: Box<dyn KVStore>, prefix: &str, sep: char) -> Self {
        Self {
            store,
            prefix: prefix.to_string(),
            sep,
        }
    }

    /// Return the separator used by this graph.
    pub fn separator(&self) -> char {
        self.sep
    }

    fn validate_segments(&self, segs: &[&str]) -> Result<(), GraphError> {
        for s in segs {
            if s.contains(self.sep) {
                return Err(GraphError::InvalidLabel(s.to_string()));
            }
        }
        Ok(())
    }

    // --- key helpers ---

    fn entity_key(&self, label: &str) -> String {
        format!("{}{s}e{s}{}", self.prefix, label, s = self.sep)
    }

    fn entity_prefix(&self) -> String {
        format!("{}{s}e{s}", self.prefix, s = self.sep)
    }

    fn fwd_key(&self, from: &str, rel_type: &str, to: &str) -> String {
        format!(
            "{}{s}r{s}{}{s}{}{s}{}",
            self.prefix,
            from,
            rel_type,
            to,
            s = self.sep
        )
    }

    fn fwd_prefix(&self, from: &str) -> String {
        format!("{}{s}r{s}{}{s}", self.prefix, from, s = self.sep)
    }

    fn rev_key(&self, to: &str, rel_type: &str, from: &str) -> String {
        format!(
            "{}{s}ri{s}{}{s}{}{s}{}",
            self.prefix,
            to,
            rel_type,
            from,
            s = self.sep
        )
    }

    fn rev_prefix(&self, to: &str) -> String {
        format!("{}{s}ri{s}{}{s}", self.prefix, to, s = self.sep)
    }

    fn parse_fwd_key(&self, key: &str) -> Option<(String, String, String)> {
        let pfx = format!("{}{s}r{s}", self.prefix, s = self.sep);
        let rest = key.strip_prefix(&pfx)?;
        let mut parts = rest.splitn(3, self.sep);
        let from = parts.next()?.to_string();
        let rel_type = parts.next()?.to_string();
        let to = parts.next()?.to_string();
        if to.contains(self.sep) {
            return None;
        }
        Some((from, rel_type, to))
    }

    fn parse_rev_key(&self, key: &str) -> Option<(String, String, String)> {
        let pfx = format!("{}{s}ri{s}", self.prefix, s = self.sep);
        let rest = key.strip_prefix(&pfx)?;
        let mut parts = rest.splitn(3, self.sep);
        let to = parts.next()?.to_string();
        let rel_type = parts.next()?.to_string();
        let from = parts.next()?.to_string();
        if from.contains(self.sep) {
            return None;
        }
        Some((to, rel_type, from))
    }
}

fn map_kv_err(e: KVError) -> GraphError {
    GraphError::Storage(e.to_string())
}

impl Graph for KVGraph {
    fn get_entity(&self, label: &str) -> Result<Option<Entity>, GraphError> {
        self.validate_segments(&[label])?;
        match self
            .store
            .get(&self.entity_key(label))
            .map_err(map_kv_err)?
        {
            Some(data) => {
                let attrs: HashMap<String, Value> = if data.is_empty() {
                    HashMap::new()
                } else {
                    serde_json::from_slice(&data)
                        .map_err(|e| GraphError::Serialization(e.to_string()))?
                };
                Ok(Some(Entity {
                    label: label.to_string(),
                    attrs,
                }))
            }
            None => Ok(None),
        }
    }

    fn set_entity(&self, entity: &Entity) -> Result<(), GraphError> {
        self.validate_segments(&[&entity.label])?;
        let data = serde_json::to_vec(&entity.attrs)
            .map_err(|e| GraphError::Serialization(e.to_string()))?;
        self.store
            .set(&self.entity_key(&entity.label), &data)
            .map_err(map_kv_err)
    }

    fn delete_entity(&self, label: &str) -> Result<(), GraphError> {
        self.validate_segments(&[label])?;

        // Collect all relation keys involving this entity.
        let rels = self.relations(label)?;

        let mut keys: Vec<String> = Vec::with_capacity(1 + rels.len() * 2);
        keys.push(self.entity_key(label));
        for r in &rels {
            keys.push(self.fwd_key(&r.from, &r.rel_type, &r.to));
            keys.push(self.rev_key(&r.to, &r.rel_type, &r.from));
        }

        let key_refs: Vec<&str> = keys.iter().map(|s| s.as_str()).collect();
        self.store.batch_delete(&key_refs).map_err(map_kv_err)
    }

    fn merge_attrs(&self, label: &str, attrs: &HashMap<String, Value>) -> Result<(), GraphError> {
        self.validate_segments(&[label])?;
        let mut entity = self.get_entity(label)?.ok_or(GraphError::NotFound)?;
        for (k, v) in attrs {
            entity.attrs.insert(k.clone(), v.clone());
        }
        self.set_entity(&entity)
    }

    fn list_entities(&self, prefix: &str) -> Result<Vec<Entity>, GraphError> {
        let kv_prefix = self.entity_prefix();
        let entries = self.store.scan(&kv_prefix).map_err(map_kv_err)?;

        let mut result = Vec::new();
        for (key, value) in entries {
            // Extract label: everything after the entity prefix.
            let label = match key.strip_prefix(&kv_prefix) {
                Some(l) => l,
                None => continue,
            };

            // Filter by prefix if requested.
            if !prefix.is_empty() && !label.starts_with(prefix) {
                continue;
            }

            let attrs: HashMap<String, Value> = if value.is_empty() {
                HashMap::new()
            } else {
                serde_json::from_slice(&value)
                    .map_err(|e| GraphError::Serialization(e.to_string()))?
            };
            result.push(Entity {
                label: label.to_string(),
                attrs,
            });
        }
        Ok(result)
    }

    fn add_relation(&self, relation: &Relation) -> Result<(), GraphError> {
        self.validate_segments(&[&relation.from, &relation.to, &relation.rel_type])?;
        let fwd = self.fwd_key(&relation.from, &relation.rel_type, &relation.to);
        let rev = self.rev_key(&relation.to, &relation.rel_type, &relation.from);
        self.store
            .batch_set(&[(&fwd, &[] as &[u8]), (&rev, &[] as &[u8])])
            .map_err(map_kv_err)
    }

    fn remove_relation(&self, from: &str, to: &str, rel_type: &str) -> Result<(), GraphError> {
        self.validate_segments(&[from, to, rel_type])?;
        let fwd = self.fwd_key(from, rel_type, to);
        let rev = self.rev_key(to, rel_type, from);
        self.store
            .batch_delete(&[fwd.as_str(), rev.as_str()])
            .map_err(map_kv_err)
    }

    fn relations(&self, label: &str) -> Result<Vec<Relation>, GraphError> {
        self.validate_segments(&[label])?;
        let mut rels = Vec::new();

        // Forward: relations where label is the source.
        let fwd_entries = self
            .store
            .scan(&self.fwd_prefix(label))
            .map_err(map_kv_err)?;
        for (key, _) in fwd_entries {
            if let Some((from, rel_type, to)) = self.parse_fwd_key(&key) {
                rels.push(Relation { from, to, rel_type });
            }
        }

        // Reverse: relations where label is the target.
        let rev_entries = self
            .store
            .scan(&self.rev_prefix(label))
            .map_err(map_kv_err)?;
        for (key, _) in rev_entries {
            if let Some((to, rel_type, from)) = self.parse_rev_key(&key) {
                // Skip self-loops: already captured by the forward scan.
                if from == label {
                    continue;
                }
                rels.push(Relation { from, to, rel_type });
            }
        }

        Ok(rels)
    }

    fn neighbors(&self, label: &str, rel_types: &[&str]) -> Result<Vec<String>, GraphError> {
        self.validate_segments(&[label])?;
        for rt in rel_types {
            self.validate_segments(&[rt])?;
        }

        let type_set: HashSet<&str> = rel_types.iter().copied().collect();
        let filter_type = !type_set.is_empty();
        let mut seen = HashSet::new();

        // Outgoing neighbors.
        let fwd_entries = self
            .store
            .scan(&self.fwd_prefix(label))
            .map_err(map_kv_err)?;
        for (key, _) in fwd_entries {
            if let Some((_from, rel_type, to)) = self.parse_fwd_key(&key) {
                if filter_type && !type_set.contains(rel_type.as_str()) {
                    continue;
                }
                seen.insert(to);
            }
        }

        // Incoming neighbors.
        let rev_entries = self
            .store
            .scan(&self.rev_prefix(label))
            .map_err(map_kv_err)?;
        for (key, _) in rev_entries {
            if let Some((_to, rel_type, from)) = self.parse_rev_key(&key) {
                if filter_type && !type_set.contains(rel_type.as_str()) {
                    continue;
                }
                seen.insert(from);
            }
        }

        let mut result: Vec<String> = seen.into_iter().collect();
        result.sort();
        Ok(result)
    }

    fn expand(&self, seeds: &[&str], hops: usize) -> Result<Vec<String>, GraphError> {
        for s in seeds {
            self.validate_segments(&[s])?;
        }

        let mut visited: HashSet<String> = seeds.iter().map(|s| s.to_string()).collect();
        let mut frontier: Vec<String> = seeds.iter().map(|s| s.to_string()).collect();

        for _ in 0..hops {
            if frontier.is_empty() {
                break;
            }
            let mut next = Vec::new();
            for label in &frontier {
                let neighbors = self.neighbors(label, &[])?;
                for n in neighbors {
                    if !visited.contains(&n) {
                        visited.insert(n.clone());
                        next.push(n);
                    }
                }
            }
            frontier = next;
        }

        let mut result: Vec<String> = visited.into_iter().collect();
        result.sort();
        Ok(result)
    }
}
