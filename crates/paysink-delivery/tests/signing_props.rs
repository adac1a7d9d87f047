//! Property tests for payload signatures.

use paysink_delivery::{sign_payload, verify_signature, SigningError};
use proptest::prelude::*;

proptest! {
    #[test]
    fn signing_is_deterministic(payload in any::<Vec<u8>>(), secret in "[A-Za-z0-9_]{1,64}") {
        let first = sign_payload(&payload, &secret).unwrap();
        let second = sign_payload(&payload, &secret).unwrap();

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(verify_signature(&payload, &first, &secret), Ok(()));
    }

    #[test]
    fn any_changed_byte_fails_verification(
        payload in prop::collection::vec(any::<u8>(), 1..256),
        index in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let signature = sign_payload(&payload, "secret").unwrap();

        let mut tampered = payload.clone();
        let at = index.index(tampered.len());
        tampered[at] ^= flip;

        prop_assert_eq!(verify_signature(&tampered, &signature, "secret"), Err(SigningError::Mismatch));
    }
}
