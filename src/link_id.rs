use sha2::{Digest, Sha256};
use uuid::Uuid;

const LINK_ID_PREFIX: &str = "lnk";
const SHORT_HASH_LEN: usize = 8;

/// Generates a short link id that `exists` reports as unused. Ids only need to
/// be unique within one owner's collection, so the caller scopes `exists`.
pub fn generate_link_id<F>(mut exists: F) -> String
where
    F: FnMut(&str) -> bool,
{
    for _ in 0..64 {
        let seed = Uuid::now_v7().to_string();
        let mut hasher = Sha256::new();
        hasher.update(seed.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        let candidate = format!("{}-{}", LINK_ID_PREFIX, &digest[..SHORT_HASH_LEN]);
        if !exists(&candidate) {
            return candidate;
        }
    }

    format!("{}-{}", LINK_ID_PREFIX, Uuid::now_v7().simple())
}
