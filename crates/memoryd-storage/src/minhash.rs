const SIGNATURE_WIDTH: usize = 128;

/// 64-bit multiplicative hash family: `h_i(token) = (fnv1a(token) ^ seed_i) * PRIME`.
/// A true independent hash-function family isn't needed for this
/// sketch's purposes; a per-band seed mixed with a solid base hash is
/// sufficient to decorrelate bands (grounded on the encoder crate's
/// SHA-256-based deterministic hashing style, generalized to a
/// cheaper non-cryptographic hash since this runs per shingle).
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn shingles(text: &str, k: usize) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    if chars.len() < k {
        return if text.is_empty() { Vec::new() } else { vec![text] };
    }
    (0..=chars.len() - k)
        .map(|i| {
            let start = chars[i].0;
            let end = chars.get(i + k).map(|(o, _)| *o).unwrap_or(text.len());
            &text[start..end]
        })
        .collect()
}

/// Fixed-width MinHash signature over word-shingles of `text` (spec
/// §3 `minhash_sig`, §4.8 near-duplicate detection).
pub fn minhash_signature(text: &str) -> Vec<u64> {
    let shingles = shingles(text, 5);
    if shingles.is_empty() {
        return vec![u64::MAX; SIGNATURE_WIDTH];
    }
    (0..SIGNATURE_WIDTH)
        .map(|band| {
            shingles
                .iter()
                .map(|shingle| fnv1a(shingle.as_bytes()) ^ (band as u64).wrapping_mul(0x9e3779b97f4a7c15))
                .min()
                .unwrap()
        })
        .collect()
}

/// Estimated Jaccard similarity from two equal-width MinHash
/// signatures: the fraction of bands that agree.
pub fn estimated_jaccard(a: &[u64], b: &[u64]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let matches = a.iter().zip(b.iter()).filter(|(x, y)| x == y).count();
    matches as f64 / a.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_has_identical_signature() {
        let sig_a = minhash_signature("the quick brown fox jumps over the lazy dog");
        let sig_b = minhash_signature("the quick brown fox jumps over the lazy dog");
        assert_eq!(sig_a, sig_b);
        assert_eq!(estimated_jaccard(&sig_a, &sig_b), 1.0);
    }

    #[test]
    fn near_duplicate_text_has_high_similarity() {
        let sig_a = minhash_signature("the quick brown fox jumps over the lazy dog");
        let sig_b = minhash_signature("the quick brown fox jumps over the lazy cat");
        assert!(estimated_jaccard(&sig_a, &sig_b) > 0.5);
    }

    #[test]
    fn unrelated_text_has_low_similarity() {
        let sig_a = minhash_signature("the quick brown fox jumps over the lazy dog");
        let sig_b = minhash_signature("quantum entanglement defies classical locality assumptions entirely");
        assert!(estimated_jaccard(&sig_a, &sig_b) < 0.5);
    }

    #[test]
    fn empty_text_has_sentinel_signature() {
        let sig = minhash_signature("");
        assert_eq!(sig.len(), SIGNATURE_WIDTH);
        assert!(sig.iter().all(|h| *h == u64::MAX));
    }
}
