use sha1::Digest;
use sha1::Sha1;

/// Content fingerprints published in the manifest and in cache-bust URLs.
///
/// These hashes end up on disk and in served URLs, so they must be stable
/// across runs, machines and platforms.
pub fn sha1_hex(bytes: &[u8]) -> String {
  let mut hasher = Sha1::new();
  hasher.update(bytes);
  format!("{:x}", hasher.finalize())
}

/// The `servePath + "?" + sha1` form used for non-minified cacheable client
/// assets.
pub fn cache_busted_url(serve_path: &str, contents: &[u8]) -> String {
  format!("{}?{}", serve_path, sha1_hex(contents))
}
