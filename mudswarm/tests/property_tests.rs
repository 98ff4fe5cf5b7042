//! Property tests for the protocol and parsing layers: byte-split
//! invariance, idempotence, and round-trip laws.

use proptest::prelude::*;

use mudswarm::msdp::{
    build_report, MsdpDecoder, MSDP_VAL, MSDP_VAR,
};
use mudswarm::net::{NetEvent, Protocol};
use mudswarm::telnet::{opt, TelnetEvent, TelnetParser, IAC, SB, SE};
use mudswarm::text::{parse_bot_data, strip_ansi, BotMob};

// ── Helpers ───────────────────────────────────────────────────────────────

/// Build an `IAC SB MSDP … IAC SE` frame from (name, value) pairs.
/// Names and values must not contain MSDP code bytes or 0xFF.
fn msdp_frame(pairs: &[(String, String)]) -> Vec<u8> {
    let mut payload = Vec::new();
    for (name, value) in pairs {
        payload.push(MSDP_VAR);
        payload.extend_from_slice(name.as_bytes());
        payload.push(MSDP_VAL);
        payload.extend_from_slice(value.as_bytes());
    }
    let mut frame = vec![IAC, SB, opt::MSDP];
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&[IAC, SE]);
    frame
}

/// Run a byte stream through a fresh protocol + decoder, returning the
/// decoder after all MSDP events have been applied.
fn decode_stream(chunks: &[&[u8]]) -> MsdpDecoder {
    let mut proto = Protocol::new();
    let mut decoder = MsdpDecoder::new();
    for chunk in chunks {
        let (events, _) = proto.process(chunk);
        for event in events {
            if let NetEvent::Msdp(payload) = event {
                decoder.parse(&payload);
            }
        }
    }
    decoder
}

prop_compose! {
    /// A well-formed MSDP variable name: uppercase ASCII.
    fn msdp_name()(s in "[A-Z_]{1,12}") -> String { s }
}

prop_compose! {
    /// An atomic MSDP value: printable ASCII without code bytes.
    fn msdp_atom()(s in "[ -~]{0,16}") -> String { s }
}

proptest! {
    /// Feeding an MSDP frame in arbitrary chunks yields the same decoded
    /// variables as feeding it whole.
    #[test]
    fn msdp_chunk_split_invariance(
        pairs in prop::collection::vec((msdp_name(), msdp_atom()), 1..6),
        split_seed in any::<u64>(),
    ) {
        let frame = msdp_frame(&pairs);

        let whole = decode_stream(&[frame.as_slice()]);

        // Derive split points deterministically from the seed.
        let mut splits = Vec::new();
        let mut pos = 0usize;
        let mut state = split_seed;
        while pos < frame.len() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let step = 1 + (state % 7) as usize;
            let end = (pos + step).min(frame.len());
            splits.push(&frame[pos..end]);
            pos = end;
        }
        let chunked = decode_stream(&splits);

        for (name, _) in &pairs {
            prop_assert_eq!(whole.get(name), chunked.get(name), "variable {}", name);
        }
        prop_assert_eq!(&whole.stats, &chunked.stats);
    }

    /// Stripping ANSI twice is the same as stripping once.
    #[test]
    fn strip_ansi_idempotent(s in "\\PC*") {
        let once = strip_ansi(&s);
        prop_assert_eq!(strip_ansi(&once), once);
    }

    /// ANSI color sequences around arbitrary printable text always vanish.
    #[test]
    fn strip_ansi_removes_inserted_codes(
        before in "[ -~]{0,20}",
        after in "[ -~]{0,20}",
        n in 0u8..100,
    ) {
        let wrapped = format!("\x1b[1;{n}m{before}\x1b[0m{after}\x1b[K");
        let stripped = strip_ansi(&wrapped);
        prop_assert_eq!(stripped, format!("{before}{after}"));
    }

    /// Escaped IAC pairs decode to literal 0xFF and nothing else brings a
    /// 0xFF into the clean text.
    #[test]
    fn escaped_iac_decodes_to_literal(
        segments in prop::collection::vec(
            prop::collection::vec(0u8..=254, 0..12),
            1..5,
        ),
    ) {
        // data IAC IAC data IAC IAC ... — every 0xFF in the output must come
        // from an escape pair.
        let mut wire = Vec::new();
        let mut expected = Vec::new();
        for (i, seg) in segments.iter().enumerate() {
            wire.extend_from_slice(seg);
            expected.extend_from_slice(seg);
            if i + 1 < segments.len() {
                wire.extend_from_slice(&[IAC, IAC]);
                expected.push(0xFF);
            }
        }

        let events = TelnetParser::new().feed(&wire);
        let clean: Vec<u8> = events
            .into_iter()
            .flat_map(|e| match e {
                TelnetEvent::Data(d) => d,
                _ => vec![],
            })
            .collect();
        prop_assert_eq!(clean, expected);
    }

    /// Structured mob records survive a serialize/parse round trip.
    #[test]
    fn bot_mob_round_trip(
        name in "[a-z]{1,8}( [a-z]{1,8}){0,2}",
        vnum in 0i32..100000,
        level in 0i32..60,
        hp in 0i32..=100,
        align in -1000i32..=1000,
        flags in prop::collection::vec("[a-z_]{2,10}", 0..3),
    ) {
        let mob = BotMob {
            name,
            vnum,
            level,
            flags,
            hp_percent: hp,
            alignment: align,
        };
        let snap = parse_bot_data(&mob.to_line());
        prop_assert_eq!(snap.mobs.len(), 1);
        prop_assert_eq!(&snap.mobs[0], &mob);
    }

    /// Repeated assignment to one variable keeps the last value.
    #[test]
    fn store_is_last_write_wins(
        name in msdp_name(),
        v1 in msdp_atom(),
        v2 in msdp_atom(),
    ) {
        let mut decoder = MsdpDecoder::new();
        let frame1 = msdp_frame(&[(name.clone(), v1)]);
        let frame2 = msdp_frame(&[(name.clone(), v2.clone())]);
        // Strip the telnet framing: parse payloads directly.
        decoder.parse(&frame1[3..frame1.len() - 2]);
        decoder.parse(&frame2[3..frame2.len() - 2]);
        let got = decoder.get(&name).and_then(|v| v.as_atom().map(str::to_owned));
        prop_assert_eq!(got, Some(v2));
    }

    /// A REPORT subscription frame decodes back into VAR "REPORT" followed
    /// by the requested names as VAL atoms, in order.
    #[test]
    fn report_frame_round_trip(
        names in prop::collection::vec("[A-Z_]{1,12}", 1..8),
    ) {
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let frame = build_report(&refs);

        let events = TelnetParser::new().feed(&frame);
        prop_assert_eq!(events.len(), 1);
        let TelnetEvent::Subneg(option, payload) = &events[0] else {
            return Err(TestCaseError::fail("expected a subnegotiation"));
        };
        prop_assert_eq!(*option, opt::MSDP);

        // Payload: VAR "REPORT" (VAL name)*
        prop_assert_eq!(payload[0], MSDP_VAR);
        prop_assert!(payload[1..].starts_with(b"REPORT"));
        let mut rest = &payload[1 + "REPORT".len()..];
        for name in &names {
            prop_assert_eq!(rest[0], MSDP_VAL);
            prop_assert!(rest[1..].starts_with(name.as_bytes()));
            rest = &rest[1 + name.len()..];
        }
        prop_assert!(rest.is_empty());
    }
}
