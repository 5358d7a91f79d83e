use std::collections::{BTreeSet, HashMap};
use url::Url;

/// Fallback when `STORAGE_DEFAULT_BUCKET` is unset.
pub const DEFAULT_BUCKET_FALLBACK: &str = "post-media";

/// Injected storage configuration; tests supply a fixed bucket name instead
/// of reading the environment.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub default_bucket: String,
}

impl StorageConfig {
    pub fn new(default_bucket: impl Into<String>) -> Self {
        Self {
            default_bucket: default_bucket.into(),
        }
    }

    pub fn from_env() -> Self {
        let default_bucket = std::env::var("STORAGE_DEFAULT_BUCKET")
            .unwrap_or_else(|_| DEFAULT_BUCKET_FALLBACK.into());
        Self { default_bucket }
    }
}

/// A resolved (bucket, object path) pair for a blob in external storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub path: String,
}

/// Known storage URL path shapes, most specific first. The generic object
/// shape must come last or it would swallow the authenticated/signed forms
/// and misread their access segment as a bucket name.
const OBJECT_PATH_PREFIXES: [&str; 4] = [
    "/storage/v1/object/public/",
    "/storage/v1/object/authenticated/",
    "/storage/v1/object/sign/",
    "/storage/v1/object/",
];

/// Maps a raw reference string to a definite storage object, or `None` when
/// no rule produces a non-empty (bucket, path).
///
/// Rules, in order: non-URL strings are raw paths within the default bucket;
/// HTTP(S) URLs are matched against the known path shapes; failing those, a
/// `/{default_bucket}/` segment anywhere in the path anchors the object path.
pub fn resolve_object_ref(cfg: &StorageConfig, raw: &str) -> Option<ObjectRef> {
    if !raw.contains("://") {
        let path = raw.trim_start_matches('/');
        return (!path.is_empty()).then(|| ObjectRef {
            bucket: cfg.default_bucket.clone(),
            path: path.to_string(),
        });
    }
    // Has a scheme: either a parseable HTTP(S) URL or nothing we can target.
    let u = Url::parse(raw).ok()?;
    if !matches!(u.scheme(), "http" | "https") {
        return None;
    }
    resolve_url_path(cfg, u.path())
}

fn resolve_url_path(cfg: &StorageConfig, path: &str) -> Option<ObjectRef> {
    for prefix in OBJECT_PATH_PREFIXES {
        if let Some(rest) = path.strip_prefix(prefix) {
            if let Some(obj) = split_bucket_and_path(rest) {
                return Some(obj);
            }
            // Empty segment after decoding: fall through to the next shape.
        }
    }
    let needle = format!("/{}/", cfg.default_bucket);
    if let Some(idx) = path.find(&needle) {
        let object_path = decode_segment(&path[idx + needle.len()..])?;
        if !object_path.is_empty() {
            return Some(ObjectRef {
                bucket: cfg.default_bucket.clone(),
                path: object_path,
            });
        }
    }
    None
}

fn split_bucket_and_path(rest: &str) -> Option<ObjectRef> {
    let (bucket_enc, path_enc) = rest.split_once('/')?;
    let bucket = decode_segment(bucket_enc)?;
    let path = decode_segment(path_enc)?;
    (!bucket.is_empty() && !path.is_empty()).then_some(ObjectRef { bucket, path })
}

fn decode_segment(s: &str) -> Option<String> {
    let decoded = urlencoding::decode(s).ok()?;
    Some(decoded.trim_start_matches('/').to_string())
}

/// Reference strings partitioned by resolved bucket. Path sets deduplicate
/// delete targets; the unresolved list preserves input order for diagnostics.
#[derive(Debug, Default)]
pub struct BucketObjects {
    pub by_bucket: HashMap<String, BTreeSet<String>>,
    pub unresolved: Vec<String>,
}

pub fn collect_object_refs<'a, I>(cfg: &StorageConfig, refs: I) -> BucketObjects
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = BucketObjects::default();
    for raw in refs {
        match resolve_object_ref(cfg, raw) {
            Some(obj) => {
                out.by_bucket.entry(obj.bucket).or_default().insert(obj.path);
            }
            None => out.unresolved.push(raw.to_string()),
        }
    }
    out
}
