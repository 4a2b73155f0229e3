//! Insertion-ordered map from a string key to an ordered list of strings.
//!
//! Both the forward relation and the inverted relation have this shape. Key order is the
//! order in which keys were first seen; list order is append order. Neither is ever
//! deduplicated.
//!
//! The serde representation is a JSON-style object `{ "<key>": ["<v1>", ...] }` with keys in
//! stored order. A repeated key while decoding is an error rather than a silent overwrite.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Insertion-ordered `key -> [value]` map.
#[derive(Debug, Clone, Default)]
pub struct ListMap {
    entries: Vec<(String, Vec<String>)>,
    positions: HashMap<String, usize>,
}

impl ListMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty map with room for `keys` keys.
    pub fn with_capacity(keys: usize) -> Self {
        Self {
            entries: Vec::with_capacity(keys),
            positions: HashMap::with_capacity(keys),
        }
    }

    /// Append `value` to the list for `key`, creating the entry at the end if absent.
    pub fn push(&mut self, key: &str, value: &str) {
        match self.positions.get(key) {
            Some(&i) => self.entries[i].1.push(value.to_string()),
            None => {
                self.positions.insert(key.to_string(), self.entries.len());
                self.entries
                    .push((key.to_string(), vec![value.to_string()]));
            }
        }
    }

    /// Insert a whole list for a key that is not present yet.
    ///
    /// Returns `false` (and changes nothing) if `key` already exists.
    pub fn insert_list(&mut self, key: String, values: Vec<String>) -> bool {
        if self.positions.contains_key(&key) {
            return false;
        }
        self.positions.insert(key.clone(), self.entries.len());
        self.entries.push((key, values));
        true
    }

    /// List stored for `key`.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.positions
            .get(key)
            .map(|&i| self.entries[i].1.as_slice())
    }

    /// Whether `key` has an entry.
    pub fn contains_key(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of values across all lists.
    pub fn value_count(&self) -> usize {
        self.entries.iter().map(|(_, v)| v.len()).sum()
    }

    /// How many times `value` occurs in the list for `key`.
    pub fn count(&self, key: &str, value: &str) -> usize {
        self.get(key)
            .map(|vs| vs.iter().filter(|v| v.as_str() == value).count())
            .unwrap_or(0)
    }

    /// Iterate `(key, list)` in stored order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> + '_ {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Iterate keys in stored order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl PartialEq for ListMap {
    fn eq(&self, other: &Self) -> bool {
        // `positions` is derived from `entries`.
        self.entries == other.entries
    }
}

impl Eq for ListMap {}

impl FromIterator<(String, Vec<String>)> for ListMap {
    /// Later lists for a repeated key are appended to the first.
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        let mut out = ListMap::new();
        for (k, vs) in iter {
            match out.positions.get(&k) {
                Some(&i) => out.entries[i].1.extend(vs),
                None => {
                    out.insert_list(k, vs);
                }
            }
        }
        out
    }
}

impl Serialize for ListMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct ListMapVisitor;

impl<'de> Visitor<'de> for ListMapVisitor {
    type Value = ListMap;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map from string to a list of strings")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ListMap, A::Error> {
        let mut out = ListMap::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((k, vs)) = access.next_entry::<String, Vec<String>>()? {
            if out.contains_key(&k) {
                return Err(de::Error::custom(format!("duplicate key {k:?}")));
            }
            out.insert_list(k, vs);
        }
        Ok(out)
    }
}

impl<'de> Deserialize<'de> for ListMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ListMapVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_keeps_key_and_value_order() {
        let mut m = ListMap::new();
        m.push("b", "1");
        m.push("a", "2");
        m.push("b", "3");
        m.push("b", "1");

        let keys: Vec<&str> = m.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(m.get("b").unwrap(), ["1", "3", "1"]);
        assert_eq!(m.count("b", "1"), 2);
        assert_eq!(m.count("a", "1"), 0);
        assert_eq!(m.value_count(), 4);
        assert!(m.get("c").is_none());
    }

    #[test]
    fn json_keeps_stored_order() {
        let mut m = ListMap::new();
        m.push("Merchant_9", "560001");
        m.push("Merchant_1", "110001");
        m.push("Merchant_9", "400001");

        let s = serde_json::to_string(&m).unwrap();
        assert_eq!(
            s,
            r#"{"Merchant_9":["560001","400001"],"Merchant_1":["110001"]}"#
        );

        let back: ListMap = serde_json::from_str(&s).unwrap();
        assert_eq!(back, m);
        let keys: Vec<&str> = back.keys().collect();
        assert_eq!(keys, vec!["Merchant_9", "Merchant_1"]);
    }

    #[test]
    fn empty_map_is_empty_object() {
        let m = ListMap::new();
        assert_eq!(serde_json::to_string(&m).unwrap(), "{}");
        let back: ListMap = serde_json::from_str("{}").unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let err = serde_json::from_str::<ListMap>(r#"{"a":["1"],"a":["2"]}"#).unwrap_err();
        assert!(err.to_string().contains("duplicate key"));
    }

    #[test]
    fn wrong_shape_is_rejected() {
        assert!(serde_json::from_str::<ListMap>(r#"["a"]"#).is_err());
        assert!(serde_json::from_str::<ListMap>(r#"{"a":"1"}"#).is_err());
        assert!(serde_json::from_str::<ListMap>(r#"{"a":[1]}"#).is_err());
    }
}
