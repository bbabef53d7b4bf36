use weft::envelope::{Envelope, EnvelopeDecodeError, EnvelopeDecoder};

#[test]
fn roundtrip_across_all_chunk_boundaries() {
    let envelopes = vec![
        Envelope {
            compressed: false,
            payload: b"first".to_vec(),
        },
        Envelope {
            compressed: false,
            payload: Vec::new(),
        },
        Envelope {
            compressed: false,
            payload: vec![0xAB; 300],
        },
    ];

    let mut wire = Vec::new();
    for env in &envelopes {
        wire.extend(env.encode());
    }

    for chunk_size in 1..=17 {
        let mut decoder = EnvelopeDecoder::new(1024, false);
        let mut decoded = Vec::new();
        for chunk in wire.chunks(chunk_size) {
            decoded.extend(decoder.read_bytes(chunk).unwrap());
        }
        assert_eq!(decoded, envelopes, "chunk={chunk_size}");
        assert!(decoder.is_idle());
    }
}

#[test]
fn oversized_declared_length_is_rejected_from_header_alone() {
    let mut decoder = EnvelopeDecoder::new(16, false);

    // Header only: flag + a 1 MiB declared length, no payload bytes at
    // all. The decoder must reject on the declaration, not on receipt.
    let mut header = vec![0u8];
    header.extend(&(1024u32 * 1024).to_le_bytes());

    match decoder.read_bytes(&header) {
        Err(EnvelopeDecodeError::MessageTooLarge { declared, max }) => {
            assert_eq!(declared, 1024 * 1024);
            assert_eq!(max, 16);
        }
        other => panic!("expected MessageTooLarge, got {other:?}"),
    }
}

#[test]
fn invalid_flag_is_corrupt() {
    let mut decoder = EnvelopeDecoder::new(16, false);
    let mut wire = vec![7u8];
    wire.extend(&1u32.to_le_bytes());
    wire.push(b'x');

    assert_eq!(
        decoder.read_bytes(&wire),
        Err(EnvelopeDecodeError::CorruptEnvelope)
    );
}

#[test]
fn compression_flag_requires_negotiation() {
    let env = Envelope {
        compressed: true,
        payload: b"zzz".to_vec(),
    };

    let mut strict = EnvelopeDecoder::new(64, false);
    assert_eq!(
        strict.read_bytes(&env.encode()),
        Err(EnvelopeDecodeError::UnexpectedCompression)
    );

    let mut negotiated = EnvelopeDecoder::new(64, true);
    let decoded = negotiated.read_bytes(&env.encode()).unwrap();
    assert_eq!(decoded, vec![env]);
}

#[test]
fn wire_size_counts_header_and_payload() {
    let env = Envelope {
        compressed: false,
        payload: vec![0; 10],
    };
    assert_eq!(env.wire_size(), 15);
    assert_eq!(env.encode().len(), 15);
}
