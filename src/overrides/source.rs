//! Override sources.
//!
//! A source supplies the ordered override list for a page path. Sources are
//! fail-open by contract: every internal error (missing file, bad JSON,
//! non-success payload) maps to an empty list, never to a request failure.
//!
//! The platform API itself is external to this crate - `api_url` and
//! `parse_envelope` define the wire contract, the host supplies transport.

use crate::config::PlatformConfig;
use crate::debug;
use crate::overrides::ContentOverride;
use parking_lot::Mutex;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Everything except the characters `encodeURIComponent` leaves alone.
const PAGE_QUERY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

// =============================================================================
// Source Trait
// =============================================================================

/// Supplies the ordered override list for a page request.
pub trait OverrideSource: Send + Sync {
    /// Overrides for the given page path (e.g. `/about`). Infallible:
    /// implementations map every error to an empty list.
    fn overrides_for(&self, page: &str) -> Vec<ContentOverride>;
}

// =============================================================================
// Platform Wire Contract
// =============================================================================

/// Platform content API response: `{success, data: {overrides: [...]}}`.
#[derive(Deserialize, Default)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<EnvelopeData>,
}

#[derive(Deserialize, Default)]
struct EnvelopeData {
    #[serde(default)]
    overrides: Vec<ContentOverride>,
}

/// Build the content API URL for a page path.
pub fn api_url(platform: &PlatformConfig, page: &str) -> String {
    format!(
        "{}/api/projects/{}/content?page={}",
        platform.url.trim_end_matches('/'),
        platform.project_key,
        utf8_percent_encode(page, PAGE_QUERY)
    )
}

/// Tolerant parse of a platform API response body.
///
/// Non-success payloads, malformed JSON and missing fields all yield an
/// empty list.
pub fn parse_envelope(body: &[u8]) -> Vec<ContentOverride> {
    match serde_json::from_slice::<Envelope>(body) {
        Ok(env) if env.success => env.data.map(|d| d.overrides).unwrap_or_default(),
        Ok(_) => Vec::new(),
        Err(e) => {
            debug!("source"; "ignoring malformed override payload: {e}");
            Vec::new()
        }
    }
}

// =============================================================================
// File Source
// =============================================================================

/// Reads overrides from a local JSON file.
///
/// Two accepted shapes:
/// - an object keyed by page path: `{"/": [...], "/about": [...]}`
/// - a bare array, applied to every page
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FilePayload {
    ByPage(HashMap<String, Vec<ContentOverride>>),
    All(Vec<ContentOverride>),
}

impl OverrideSource for FileSource {
    fn overrides_for(&self, page: &str) -> Vec<ContentOverride> {
        let Ok(bytes) = std::fs::read(&self.path) else {
            return Vec::new();
        };
        match serde_json::from_slice::<FilePayload>(&bytes) {
            Ok(FilePayload::ByPage(mut map)) => map.remove(page).unwrap_or_default(),
            Ok(FilePayload::All(list)) => list,
            Err(e) => {
                debug!("source"; "{}: {e}", self.path.display());
                Vec::new()
            }
        }
    }
}

// =============================================================================
// TTL Cache
// =============================================================================

/// Memoizes another source per page path for a fixed lifetime.
pub struct CachedSource<S> {
    inner: S,
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Arc<Vec<ContentOverride>>)>>,
}

impl<S: OverrideSource> CachedSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<S: OverrideSource> OverrideSource for CachedSource<S> {
    fn overrides_for(&self, page: &str) -> Vec<ContentOverride> {
        if let Some((at, list)) = self.entries.lock().get(page)
            && at.elapsed() < self.ttl
        {
            return list.as_ref().clone();
        }

        let fresh = Arc::new(self.inner.overrides_for(page));
        self.entries
            .lock()
            .insert(page.to_string(), (Instant::now(), Arc::clone(&fresh)));
        fresh.as_ref().clone()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn platform() -> PlatformConfig {
        PlatformConfig {
            url: "https://devtools.example.com".into(),
            project_key: "proj_em8foyyu".into(),
            cache_ttl_seconds: 300,
        }
    }

    #[test]
    fn test_api_url_encodes_page_path() {
        let url = api_url(&platform(), "/pricing/enterprise plan");
        assert_eq!(
            url,
            "https://devtools.example.com/api/projects/proj_em8foyyu/content?page=%2Fpricing%2Fenterprise%20plan"
        );
    }

    #[test]
    fn test_envelope_success() {
        let body = br#"{"success": true, "data": {"overrides": [
            {"selector": ".hero", "type": "text", "value": "Hi"}
        ]}}"#;
        let list = parse_envelope(body);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].selector, ".hero");
    }

    #[test]
    fn test_envelope_failures_yield_empty_list() {
        assert!(parse_envelope(br#"{"success": false, "data": {"overrides": []}}"#).is_empty());
        assert!(parse_envelope(br#"{"success": true}"#).is_empty());
        assert!(parse_envelope(b"not json at all").is_empty());
        assert!(parse_envelope(b"").is_empty());
    }

    #[test]
    fn test_file_source_keyed_by_page() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"/": [{{"selector": "h1", "type": "text", "value": "Home"}}],
                "/about": [{{"selector": "h1", "type": "text", "value": "About"}}]}}"#
        )
        .unwrap();

        let source = FileSource::new(file.path());
        assert_eq!(source.overrides_for("/").len(), 1);
        assert_eq!(source.overrides_for("/about").len(), 1);
        assert!(source.overrides_for("/missing").is_empty());
    }

    #[test]
    fn test_file_source_bare_array_applies_everywhere() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"selector": "h1", "type": "text", "value": "X"}}]"#).unwrap();

        let source = FileSource::new(file.path());
        assert_eq!(source.overrides_for("/").len(), 1);
        assert_eq!(source.overrides_for("/anything").len(), 1);
    }

    #[test]
    fn test_file_source_missing_file_is_empty() {
        let source = FileSource::new("/nonexistent/overrides.json");
        assert!(source.overrides_for("/").is_empty());
    }

    struct Counting {
        calls: AtomicUsize,
    }

    impl OverrideSource for Counting {
        fn overrides_for(&self, _page: &str) -> Vec<ContentOverride> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            vec![ContentOverride::text("h1", "cached")]
        }
    }

    #[test]
    fn test_cached_source_hits_within_ttl() {
        let cached = CachedSource::new(
            Counting {
                calls: AtomicUsize::new(0),
            },
            Duration::from_secs(60),
        );
        assert_eq!(cached.overrides_for("/").len(), 1);
        assert_eq!(cached.overrides_for("/").len(), 1);
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);

        // Different page path misses.
        cached.overrides_for("/other");
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cached_source_expires() {
        let cached = CachedSource::new(
            Counting {
                calls: AtomicUsize::new(0),
            },
            Duration::ZERO,
        );
        cached.overrides_for("/");
        cached.overrides_for("/");
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }
}
