//! Property tests for the laws the cipher and wire framing must hold
//! over arbitrary inputs, not just the hand-picked cases in the unit
//! tests.

use proptest::prelude::*;

use syncstream::{mint_key, Cipher, Cmd, Ctrl};

fn any_cmd() -> impl Strategy<Value = Cmd> {
    prop_oneof![
        Just(Cmd::Arm),
        Just(Cmd::Disarm),
        Just(Cmd::Sync),
        Just(Cmd::Ping),
    ]
}

proptest! {
    #[test]
    fn seal_open_roundtrips_for_any_plaintext(
        plain in proptest::collection::vec(any::<u8>(), 0..4096),
        aad in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        let cipher = Cipher::new(mint_key().unwrap());
        let pkt = cipher.seal(&plain, &aad).unwrap();
        let out = cipher.open(&pkt, &aad).unwrap();
        prop_assert_eq!(out.view(), plain.as_slice());
    }

    #[test]
    fn flipping_any_body_bit_breaks_authentication(
        plain in proptest::collection::vec(any::<u8>(), 1..512),
        aad in proptest::collection::vec(any::<u8>(), 0..64),
        flip_byte in 0usize..512,
        flip_bit in 0u8..8,
    ) {
        let cipher = Cipher::new(mint_key().unwrap());
        let mut pkt = cipher.seal(&plain, &aad).unwrap();
        let idx = flip_byte % pkt.body.len();
        pkt.body[idx] ^= 1 << flip_bit;
        prop_assert!(cipher.open(&pkt, &aad).is_err());
    }

    #[test]
    fn ctrl_frame_roundtrips_for_any_dev_and_body(
        dev in "[a-zA-Z0-9_-]{0,64}",
        cmd in any_cmd(),
        at_ms in any::<u64>(),
        body in proptest::collection::vec(any::<u8>(), 0..1024),
    ) {
        let ctrl = Ctrl { dev, cmd, at_ms, body };
        let raw = syncstream::wire::pack_ctrl(&ctrl).unwrap();
        let out = syncstream::wire::unpack_ctrl(&raw).unwrap();
        prop_assert_eq!(out, ctrl);
    }

    #[test]
    fn hex_roundtrips_for_any_bytes(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let text = syncstream::hex_of(&data);
        prop_assert_eq!(syncstream::from_hex(&text).unwrap(), data);
    }
}
