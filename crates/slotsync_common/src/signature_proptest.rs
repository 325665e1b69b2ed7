use crate::signature::{sign_payload, verify_signature, SignatureError};
use proptest::prelude::*;

const NOW: i64 = 1_900_000_000;

proptest! {
    #[test]
    fn any_payload_signed_with_the_secret_verifies(
        payload in proptest::collection::vec(any::<u8>(), 0..512),
        secret in "[a-zA-Z0-9_]{1,64}",
        skew in -300i64..=300,
    ) {
        let header = sign_payload(&secret, NOW + skew, &payload);
        prop_assert_eq!(
            verify_signature(&payload, Some(&header), &[secret.as_str()], 300, NOW),
            Ok(())
        );
    }

    #[test]
    fn flipping_any_payload_byte_breaks_the_signature(
        payload in proptest::collection::vec(any::<u8>(), 1..256),
        index in any::<prop::sample::Index>(),
        mask in 1u8..=255,
    ) {
        let header = sign_payload("secret", NOW, &payload);
        let mut tampered = payload.clone();
        let i = index.index(tampered.len());
        tampered[i] ^= mask;
        prop_assert_eq!(
            verify_signature(&tampered, Some(&header), &["secret"], 300, NOW),
            Err(SignatureError::Mismatch)
        );
    }
}
