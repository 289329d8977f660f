use hkdf::Hkdf;
use sha2::Sha256;

/// HMAC-SHA-256-based HKDF with an empty `info`, producing one, two, or
/// three 32-byte outputs — the only shapes the Noise_XK chain needs.
pub fn hkdf1(salt: &[u8; 32], input_key_material: &[u8]) -> [u8; 32] {
    let (_, hk) = Hkdf::<Sha256>::extract(Some(salt), input_key_material);
    let mut out = [0u8; 32];
    hk.expand(&[], &mut out).expect("32 bytes is within HKDF-SHA256's output limit");
    out
}

pub fn hkdf2(salt: &[u8; 32], input_key_material: &[u8]) -> ([u8; 32], [u8; 32]) {
    let (_, hk) = Hkdf::<Sha256>::extract(Some(salt), input_key_material);
    let mut out = [0u8; 64];
    hk.expand(&[], &mut out).expect("64 bytes is within HKDF-SHA256's output limit");
    let mut a = [0u8; 32];
    let mut b = [0u8; 32];
    a.copy_from_slice(&out[..32]);
    b.copy_from_slice(&out[32..]);
    (a, b)
}

pub fn hkdf3(salt: &[u8; 32], input_key_material: &[u8]) -> ([u8; 32], [u8; 32], [u8; 32]) {
    let (_, hk) = Hkdf::<Sha256>::extract(Some(salt), input_key_material);
    let mut out = [0u8; 96];
    hk.expand(&[], &mut out).expect("96 bytes is within HKDF-SHA256's output limit");
    let mut a = [0u8; 32];
    let mut b = [0u8; 32];
    let mut c = [0u8; 32];
    a.copy_from_slice(&out[..32]);
    b.copy_from_slice(&out[32..64]);
    c.copy_from_slice(&out[64..]);
    (a, b, c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hkdf2_first_half_matches_hkdf1() {
        let salt = [1u8; 32];
        let ikm = b"shared secret";

        let single = hkdf1(&salt, ikm);
        let (first, _) = hkdf2(&salt, ikm);
        assert_eq!(single, first);
    }

    #[test]
    fn hkdf3_outputs_are_pairwise_distinct() {
        let salt = [2u8; 32];
        let (a, b, c) = hkdf3(&salt, b"ikm");
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }
}
