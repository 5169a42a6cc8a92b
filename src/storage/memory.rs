//! In-process emulation of the durable-tier protocol.
//!
//! Behaves like a single Redis instance for the commands the cache uses,
//! including glob `MATCH` patterns and cursor paging where `COUNT` bounds the
//! number of keys *examined* per page (so a page may come back empty with a
//! non-zero cursor, exactly as Redis does). Useful for local development and
//! for tests that should not need a server.

use async_trait::async_trait;
use dashmap::DashMap;

use super::traits::{KvTransport, ScanPage, StorageError};

pub struct InMemoryTransport {
    data: DashMap<String, Vec<u8>>,
}

impl InMemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Get current key count
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write directly, bypassing any cache in front of this store.
    /// Stands in for "another process wrote to Redis".
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.data.insert(key.into(), value.into());
    }

    /// Read directly.
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<Vec<u8>> {
        self.data.get(key).map(|r| r.value().clone())
    }

    /// Clear all keys
    pub fn clear(&self) {
        self.data.clear();
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvTransport for InMemoryTransport {
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.data.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.get_raw(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.data.remove(key);
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StorageError> {
        let mut entry = self.data.entry(key.to_string()).or_insert_with(|| b"0".to_vec());
        let current: i64 = std::str::from_utf8(entry.value())
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| StorageError::Backend("ERR value is not an integer or out of range".into()))?;
        let next = current
            .checked_add(delta)
            .ok_or_else(|| StorageError::Backend("ERR increment or decrement would overflow".into()))?;
        *entry.value_mut() = next.to_string().into_bytes();
        Ok(next)
    }

    async fn scan_page(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage, StorageError> {
        let mut all: Vec<String> = self.data.iter().map(|r| r.key().clone()).collect();
        all.sort_unstable();

        let start = (cursor as usize).min(all.len());
        let end = start.saturating_add(count.max(1)).min(all.len());
        let keys = all[start..end]
            .iter()
            .filter(|k| glob_match(pattern.as_bytes(), k.as_bytes()))
            .cloned()
            .collect();
        let cursor = if end >= all.len() { 0 } else { end as u64 };

        Ok(ScanPage { cursor, keys })
    }
}

/// Redis-style glob: `*`, `?`, `[abc]`, `[a-z]`, `[^a]` and `\` escapes.
pub fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Backtrack point for the most recent `*`
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                b'*' => {
                    star = Some((p, t));
                    p += 1;
                    continue;
                }
                b'?' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                b'[' => {
                    if let Some((matched, next)) = match_class(pattern, p, text[t]) {
                        if matched {
                            p = next;
                            t += 1;
                            continue;
                        }
                    }
                }
                b'\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == text[t] {
                        p += 2;
                        t += 1;
                        continue;
                    }
                }
                c if c == text[t] => {
                    p += 1;
                    t += 1;
                    continue;
                }
                _ => {}
            }
        }
        match star {
            Some((sp, st)) => {
                p = sp + 1;
                t = st + 1;
                star = Some((sp, st + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

/// Match one byte against the class starting at `pattern[open] == b'['`.
/// Returns whether it matched and the index just past the closing `]`,
/// or `None` for an unterminated class.
fn match_class(pattern: &[u8], open: usize, c: u8) -> Option<(bool, usize)> {
    let mut i = open + 1;
    let negate = pattern.get(i) == Some(&b'^');
    if negate {
        i += 1;
    }
    let mut matched = false;
    while i < pattern.len() && pattern[i] != b']' {
        if pattern[i] == b'\\' && i + 1 < pattern.len() {
            matched |= pattern[i + 1] == c;
            i += 2;
        } else if i + 2 < pattern.len() && pattern[i + 1] == b'-' && pattern[i + 2] != b']' {
            let (lo, hi) = (pattern[i].min(pattern[i + 2]), pattern[i].max(pattern[i + 2]));
            matched |= (lo..=hi).contains(&c);
            i += 3;
        } else {
            matched |= pattern[i] == c;
            i += 1;
        }
    }
    if i >= pattern.len() {
        return None;
    }
    Some((matched != negate, i + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn scan_all(store: &InMemoryTransport, pattern: &str, count: usize) -> (Vec<String>, usize) {
        let mut cursor = 0;
        let mut keys = Vec::new();
        let mut pages = 0;
        loop {
            let page = store.scan_page(cursor, pattern, count).await.unwrap();
            pages += 1;
            keys.extend(page.keys);
            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }
        (keys, pages)
    }

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = InMemoryTransport::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert!(InMemoryTransport::default().is_empty());
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = InMemoryTransport::new();
        store.set("user.1", b"alice").await.unwrap();
        assert_eq!(store.get("user.1").await.unwrap(), b"alice".to_vec());

        store.delete("user.1").await.unwrap();
        assert_eq!(
            store.get("user.1").await,
            Err(StorageError::NotFound("user.1".into()))
        );
    }

    #[tokio::test]
    async fn test_delete_nonexistent_is_ok() {
        let store = InMemoryTransport::new();
        assert!(store.delete("nonexistent").await.is_ok());
    }

    #[tokio::test]
    async fn test_incr_by_starts_from_zero() {
        let store = InMemoryTransport::new();
        assert_eq!(store.incr_by("hits", 5).await.unwrap(), 5);
        assert_eq!(store.incr_by("hits", -2).await.unwrap(), 3);
        assert_eq!(store.get_raw("hits"), Some(b"3".to_vec()));
    }

    #[tokio::test]
    async fn test_incr_by_rejects_non_integer() {
        let store = InMemoryTransport::new();
        store.insert_raw("name", "bob");
        assert!(matches!(store.incr_by("name", 1).await, Err(StorageError::Backend(_))));
        assert_eq!(store.get_raw("name"), Some(b"bob".to_vec()));
    }

    #[tokio::test]
    async fn test_incr_by_overflow_is_error() {
        let store = InMemoryTransport::new();
        store.insert_raw("n", i64::MAX.to_string());
        assert!(store.incr_by("n", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_scan_pages_until_cursor_returns_to_zero() {
        let store = InMemoryTransport::new();
        for i in 0..25 {
            store.insert_raw(format!("session:{:02}", i), "x");
        }
        store.insert_raw("other:1", "y");

        let (keys, pages) = scan_all(&store, "session:*", 10).await;
        assert_eq!(keys.len(), 25);
        assert_eq!(pages, 3);
        assert!(keys.iter().all(|k| k.starts_with("session:")));
    }

    #[tokio::test]
    async fn test_scan_empty_store_single_page() {
        let store = InMemoryTransport::new();
        let page = store.scan_page(0, "*", 10).await.unwrap();
        assert!(page.is_last());
        assert!(page.keys.is_empty());
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match(b"*", b"anything"));
        assert!(glob_match(b"*", b""));
        assert!(glob_match(b"user:*", b"user:42"));
        assert!(!glob_match(b"user:*", b"admin:42"));
        assert!(glob_match(b"h?llo", b"hello"));
        assert!(!glob_match(b"h?llo", b"hllo"));
        assert!(glob_match(b"h[ae]llo", b"hallo"));
        assert!(!glob_match(b"h[ae]llo", b"hillo"));
        assert!(glob_match(b"h[^e]llo", b"hallo"));
        assert!(!glob_match(b"h[^e]llo", b"hello"));
        assert!(glob_match(b"h[a-c]llo", b"hbllo"));
        assert!(glob_match(b"a\\*b", b"a*b"));
        assert!(!glob_match(b"a\\*b", b"axb"));
        assert!(glob_match(b"*.json", b"config.app.json"));
        assert!(glob_match(b"a*b*c", b"aXXbYYc"));
        assert!(!glob_match(b"a*b*c", b"aXXbYY"));
    }
}
