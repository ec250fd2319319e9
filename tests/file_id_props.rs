//! Property tests for the file identifier codec

use autofilter::file_id::{encode_file_id, rle_decode, rle_encode, FileIdParts};
use proptest::prelude::*;

proptest! {
    #[test]
    fn rle_round_trips(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        prop_assert_eq!(rle_decode(&rle_encode(&data)).unwrap(), data);
    }

    #[test]
    fn rle_round_trips_zero_heavy(data in proptest::collection::vec(prop_oneof![3 => Just(0u8), 1 => any::<u8>()], 0..1024)) {
        let encoded = rle_encode(&data);
        prop_assert!(encoded.len() <= data.len() * 2);
        prop_assert_eq!(rle_decode(&encoded).unwrap(), data);
    }

    #[test]
    fn encoded_ids_are_url_safe(data in proptest::collection::vec(any::<u8>(), 0..128)) {
        let id = encode_file_id(&data);
        prop_assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        prop_assert_eq!(id, encode_file_id(&data));
    }

    #[test]
    fn bot_api_ids_decode_to_their_parts(
        file_type in 0i32..20,
        dc_id in 1i32..6,
        media_id in any::<i64>(),
        access_hash in any::<i64>(),
        file_reference in proptest::collection::vec(any::<u8>(), 0..300),
    ) {
        let parts = FileIdParts { file_type, dc_id, media_id, access_hash, file_reference };
        prop_assert_eq!(FileIdParts::decode(&parts.encode()).unwrap(), parts);
    }
}

#[test]
fn all_zero_and_zero_free_inputs() {
    let zeros = vec![0u8; 1000];
    assert_eq!(rle_decode(&rle_encode(&zeros)).unwrap(), zeros);

    let no_zeros: Vec<u8> = (1..=255).collect();
    assert_eq!(rle_encode(&no_zeros), no_zeros);
}
