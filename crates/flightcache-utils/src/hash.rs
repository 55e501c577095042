use rand::Rng;
use sha1::{Digest as _, Sha1};

/// Returns the SHA-1 digest of `data` as 40 lowercase hex characters.
pub fn sha1(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha1::digest(data.as_ref()))
}

/// Returns `len` random bytes, hex encoded into a string of `2 * len` characters.
pub fn random_bytes(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill(bytes.as_mut_slice());
    hex::encode(bytes)
}
