//! Random resource names.

use uuid::Uuid;

/// Returns `len` random lowercase ASCII letters.
///
/// Suitable as a DNS label and as a resource name, so tests running in
/// parallel against one namespace do not collide.
#[must_use]
pub fn random_name(len: usize) -> String {
    let mut name = String::with_capacity(len);
    while name.len() < len {
        let missing = len - name.len();
        let entropy = Uuid::new_v4();
        name.extend(
            entropy
                .as_bytes()
                .iter()
                .enumerate()
                .filter(|&(i, &b)| !FIXED_BITS_BYTES.contains(&i) && b < UNBIASED_LIMIT)
                .take(missing)
                .map(|(_, &b)| char::from(b'a' + b % 26)),
        );
    }
    name
}

/// Bytes of a v4 UUID carrying the version and variant bits.
const FIXED_BITS_BYTES: [usize; 2] = [6, 8];

/// Largest multiple of 26 a byte can hold; higher bytes are dropped so that
/// every letter is equally likely.
const UNBIASED_LIMIT: u8 = 26 * 9;
