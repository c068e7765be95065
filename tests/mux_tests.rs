//! Tests for container parsing, assembly, mux/demux, and mutation.

use zenmux::{AnimOptions, FramePlacement, LoopCount, MuxError, WebPImage};

/// Minimal VP8L payload: signature byte plus the packed width/height/alpha
/// header, padded to an even length with filler.
fn vp8l_payload(width: u32, height: u32, alpha: bool) -> Vec<u8> {
    let mut packed: u32 = (width - 1) & 0x3FFF;
    packed |= ((height - 1) & 0x3FFF) << 14;
    if alpha {
        packed |= 1 << 28;
    }
    let mut out = vec![0x2f];
    out.extend_from_slice(&packed.to_le_bytes());
    out.extend_from_slice(&[0x11, 0x22, 0x33]);
    out
}

/// Minimal VP8 payload: frame tag, start-code bytes, and the 14-bit
/// width/height fields, padded to an even length with filler.
fn vp8_payload(width: u16, height: u16) -> Vec<u8> {
    let mut out = vec![0u8; 10];
    out[3..6].copy_from_slice(&[0x9D, 0x01, 0x2A]);
    out[6..8].copy_from_slice(&(width & 0x3FFF).to_le_bytes());
    out[8..10].copy_from_slice(&(height & 0x3FFF).to_le_bytes());
    out.extend_from_slice(&[0x44, 0x55]);
    out
}

fn chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(tag);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
    out
}

fn container(chunks: &[Vec<u8>]) -> Vec<u8> {
    let total: usize = 4 + chunks.iter().map(Vec::len).sum::<usize>();
    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(b"WEBP");
    for c in chunks {
        out.extend_from_slice(c);
    }
    out
}

fn lossy_image(width: u16, height: u16) -> WebPImage {
    WebPImage::parse(&container(&[chunk(b"VP8 ", &vp8_payload(width, height))])).unwrap()
}

fn lossless_image(width: u32, height: u32, alpha: bool) -> WebPImage {
    WebPImage::parse(&container(&[chunk(
        b"VP8L",
        &vp8l_payload(width, height, alpha),
    )]))
    .unwrap()
}

fn two_frame_anim() -> WebPImage {
    let mut img = WebPImage::new_animation([255, 255, 255, 255], LoopCount::Forever);
    let anim = img.animation_mut().unwrap();
    anim.push_image(&lossy_image(64, 64), FramePlacement::default())
        .unwrap();
    anim.push_image(&lossy_image(64, 64), FramePlacement::default())
        .unwrap();
    img
}

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn parse_simple_lossy() {
    let img = lossy_image(320, 240);
    assert!(matches!(img, WebPImage::Lossy(_)));
    assert_eq!((img.width(), img.height()), (320, 240));
    assert!(!img.has_alpha());
    assert!(!img.is_animated());
    assert_eq!(img.frame_count(), 0);
}

#[test]
fn parse_simple_lossless_with_alpha() {
    let img = lossless_image(100, 50, true);
    assert!(matches!(img, WebPImage::Lossless(_)));
    assert_eq!((img.width(), img.height()), (100, 50));
    assert!(img.has_alpha());
}

#[test]
fn parse_rejects_bad_magic() {
    assert!(WebPImage::parse(&[]).is_err());
    assert!(WebPImage::parse(b"not a webp file at all!!").is_err());

    let mut bad_riff = container(&[chunk(b"VP8L", &vp8l_payload(8, 8, false))]);
    bad_riff[0..4].copy_from_slice(b"RIFX");
    assert!(matches!(
        WebPImage::parse(&bad_riff),
        Err(MuxError::InvalidFormat(_))
    ));

    let mut bad_webp = container(&[chunk(b"VP8L", &vp8l_payload(8, 8, false))]);
    bad_webp[8..12].copy_from_slice(b"WAVE");
    assert!(matches!(
        WebPImage::parse(&bad_webp),
        Err(MuxError::InvalidFormat(_))
    ));
}

#[test]
fn parse_rejects_truncated_chunk() {
    let full = container(&[chunk(b"VP8L", &vp8l_payload(8, 8, false))]);
    // Cut into the chunk payload.
    assert!(matches!(
        WebPImage::parse(&full[..full.len() - 3]),
        Err(MuxError::InvalidFormat(_))
    ));
    // Cut into the chunk header.
    assert!(matches!(
        WebPImage::parse(&full[..15]),
        Err(MuxError::InvalidFormat(_))
    ));
}

#[test]
fn duplicate_chunks_first_occurrence_wins() {
    let mut vp8x = vec![0u8; 10];
    vp8x[0] = 0b0010_0000; // ICCP flag
    vp8x[4..7].copy_from_slice(&15u32.to_le_bytes()[..3]);
    vp8x[7..10].copy_from_slice(&15u32.to_le_bytes()[..3]);
    let data = container(&[
        chunk(b"VP8X", &vp8x),
        chunk(b"ICCP", &[1, 2, 3, 4]),
        chunk(b"ICCP", &[9, 9, 9, 9]),
        chunk(b"VP8L", &vp8l_payload(16, 16, false)),
    ]);
    let img = WebPImage::parse(&data).unwrap();
    assert_eq!(img.iccp(), Some(&[1, 2, 3, 4][..]));
}

#[test]
fn unknown_chunks_are_skipped() {
    let mut vp8x = vec![0u8; 10];
    vp8x[4..7].copy_from_slice(&15u32.to_le_bytes()[..3]);
    vp8x[7..10].copy_from_slice(&15u32.to_le_bytes()[..3]);
    let data = container(&[
        chunk(b"VP8X", &vp8x),
        chunk(b"XYZW", &[0xAB; 7]),
        chunk(b"VP8L", &vp8l_payload(16, 16, false)),
    ]);
    let img = WebPImage::parse(&data).unwrap();
    assert_eq!((img.width(), img.height()), (16, 16));
    assert!(matches!(img, WebPImage::Extended(_)));
}

#[test]
fn anmf_before_anim_is_an_error() {
    let mut vp8x = vec![0u8; 10];
    vp8x[0] = 0b0000_0010; // Anim flag
    vp8x[4..7].copy_from_slice(&15u32.to_le_bytes()[..3]);
    vp8x[7..10].copy_from_slice(&15u32.to_le_bytes()[..3]);
    let mut anmf = vec![0u8; 16];
    anmf[6..9].copy_from_slice(&15u32.to_le_bytes()[..3]);
    anmf[9..12].copy_from_slice(&15u32.to_le_bytes()[..3]);
    anmf.extend_from_slice(&chunk(b"VP8L", &vp8l_payload(16, 16, false)));
    let data = container(&[chunk(b"VP8X", &vp8x), chunk(b"ANMF", &anmf)]);
    assert!(matches!(
        WebPImage::parse(&data),
        Err(MuxError::InvalidFormat(_))
    ));
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn simple_roundtrip_is_byte_identical() {
    for data in [
        container(&[chunk(b"VP8 ", &vp8_payload(320, 240))]),
        container(&[chunk(b"VP8L", &vp8l_payload(100, 50, true))]),
        // Odd payload length exercises the pad byte.
        container(&[chunk(b"VP8L", &{
            let mut p = vp8l_payload(10, 10, false);
            p.push(0x77);
            p
        })]),
    ] {
        let img = WebPImage::parse(&data).unwrap();
        assert_eq!(img.serialize().unwrap(), data);
    }
}

#[test]
fn extended_still_roundtrip_is_stable() {
    let mut img = lossless_image(24, 24, true);
    img.set_exif(Some(vec![0xE0, 0xE1, 0xE2]));
    let first = img.serialize().unwrap();
    let second = WebPImage::parse(&first).unwrap().serialize().unwrap();
    assert_eq!(first, second);
}

#[test]
fn vp8x_canvas_roundtrips_at_the_extremes() {
    for (w, h) in [(1u32, 1u32), (1 << 24, 255), (255, 1 << 24)] {
        let mut img = lossless_image(16, 16, false);
        img.set_exif(Some(vec![1]));
        let WebPImage::Extended(ext) = &mut img else {
            unreachable!()
        };
        ext.canvas_width = w;
        ext.canvas_height = h;
        let bytes = img.serialize().unwrap();
        let back = WebPImage::parse(&bytes).unwrap();
        assert_eq!((back.width(), back.height()), (w, h));
    }
}

#[test]
fn writer_rejects_out_of_range_canvas() {
    for (w, h) in [
        (0u32, 16u32),
        (16, 0),
        ((1 << 24) + 1, 16),
        (16, (1 << 24) + 1),
        // Each side in range, but the product overflows 32 bits.
        (1 << 17, 1 << 16),
    ] {
        let mut img = lossless_image(16, 16, false);
        img.set_exif(Some(vec![1]));
        let WebPImage::Extended(ext) = &mut img else {
            unreachable!()
        };
        ext.canvas_width = w;
        ext.canvas_height = h;
        assert!(
            matches!(img.serialize(), Err(MuxError::InvalidDimensions { .. })),
            "{w}x{h} should be rejected"
        );
    }
}

// ============================================================================
// Animation mux
// ============================================================================

#[test]
fn mux_two_frames_chunk_layout() {
    let img = two_frame_anim();
    let bytes = img.mux_anim(&AnimOptions::default()).unwrap();

    assert_eq!(&bytes[0..4], b"RIFF");
    let declared = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    assert_eq!(declared as usize, bytes.len() - 8);
    assert_eq!(&bytes[8..12], b"WEBP");

    // VP8X: payload length 10, Anim bit set, everything else clear.
    assert_eq!(&bytes[12..16], b"VP8X");
    assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 10);
    assert_eq!(bytes[20], 0b0000_0010);
    // Auto-computed canvas: 64x64, stored minus one.
    assert_eq!(&bytes[24..27], &63u32.to_le_bytes()[..3]);
    assert_eq!(&bytes[27..30], &63u32.to_le_bytes()[..3]);

    // ANIM: white background stored as B,G,R,A; loop count 0.
    assert_eq!(&bytes[30..34], b"ANIM");
    assert_eq!(u32::from_le_bytes(bytes[34..38].try_into().unwrap()), 6);
    assert_eq!(&bytes[38..42], &[255, 255, 255, 255]);
    assert_eq!(&bytes[42..44], &[0, 0]);

    // Two ANMF chunks follow back to back.
    assert_eq!(&bytes[44..48], b"ANMF");
    let anmf_len = u32::from_le_bytes(bytes[48..52].try_into().unwrap()) as usize;
    assert_eq!(anmf_len, 16 + 8 + vp8_payload(64, 64).len());
    let second = 44 + 8 + anmf_len;
    assert_eq!(&bytes[second..second + 4], b"ANMF");

    // Default placement: duration 100ms, dispose none, blend on (flags 0).
    assert_eq!(&bytes[64..67], &100u32.to_le_bytes()[..3]);
    assert_eq!(bytes[67], 0);
}

#[test]
fn background_color_is_stored_bgra() {
    let mut img = WebPImage::new_animation([10, 20, 30, 40], LoopCount::Forever);
    img.animation_mut()
        .unwrap()
        .push_image(&lossy_image(16, 16), FramePlacement::default())
        .unwrap();
    let bytes = img.mux_anim(&AnimOptions::default()).unwrap();
    assert_eq!(&bytes[38..42], &[30, 20, 10, 40]);

    let back = WebPImage::parse(&bytes).unwrap();
    assert_eq!(back.animation().unwrap().background_color, [10, 20, 30, 40]);
}

#[test]
fn mux_loop_count_bounds() {
    let img = two_frame_anim();
    let ok = img.mux_anim(&AnimOptions {
        loop_count: Some(65535),
        ..Default::default()
    });
    assert!(ok.is_ok());

    let err = img.mux_anim(&AnimOptions {
        loop_count: Some(65536),
        ..Default::default()
    });
    assert!(matches!(
        err,
        Err(MuxError::LoopCountOutOfRange { value: 65536 })
    ));
}

#[test]
fn mux_rejects_out_of_range_frame_fields() {
    let mut img = two_frame_anim();
    img.animation_mut().unwrap().frames[1].x = 1 << 24;
    let err = img.mux_anim(&AnimOptions::default());
    assert!(matches!(
        err,
        Err(MuxError::FrameFieldOutOfRange {
            index: 1,
            field: "x offset",
            ..
        })
    ));
}

#[test]
fn mux_rejects_empty_animation() {
    let img = WebPImage::new_animation([0; 4], LoopCount::Forever);
    assert!(matches!(
        img.mux_anim(&AnimOptions::default()),
        Err(MuxError::NoFrames)
    ));
}

#[test]
fn single_image_writer_rejects_animations() {
    let img = two_frame_anim();
    assert!(matches!(img.serialize(), Err(MuxError::Unsupported(_))));
}

#[test]
fn mux_non_animation_is_unsupported() {
    let img = lossy_image(16, 16);
    assert!(matches!(
        img.mux_anim(&AnimOptions::default()),
        Err(MuxError::Unsupported(_))
    ));
}

#[test]
fn animation_roundtrip_preserves_frames() {
    let mut img = WebPImage::new_animation([0, 0, 0, 255], LoopCount::from_wire(3));
    let anim = img.animation_mut().unwrap();
    anim.push_image(
        &lossless_image(32, 16, true),
        FramePlacement {
            x: 4,
            y: 2,
            duration_ms: 80,
            ..Default::default()
        },
    )
    .unwrap();
    anim.push_image(&lossy_image(48, 48), FramePlacement::default())
        .unwrap();

    let bytes = img.mux_anim(&AnimOptions::default()).unwrap();
    let back = WebPImage::parse(&bytes).unwrap();

    let anim = back.animation().unwrap();
    assert_eq!(anim.loop_count, LoopCount::from_wire(3));
    assert_eq!(anim.frames.len(), 2);
    assert_eq!((anim.frames[0].x, anim.frames[0].y), (4, 2));
    assert_eq!(anim.frames[0].duration_ms, 80);
    assert!(anim.frames[0].payload.is_lossless());
    assert!(anim.frames[0].payload.has_alpha());
    assert_eq!((anim.frames[1].width, anim.frames[1].height), (48, 48));
    assert!(!anim.frames[1].payload.is_lossless());
    // The lossless frame's alpha propagates to the VP8X flag byte.
    assert_eq!(bytes[20], 0b0001_0010);
}

#[test]
fn pushing_an_animated_source_flattens_it() {
    let inner = two_frame_anim();
    let mut outer = WebPImage::new_animation([0; 4], LoopCount::Forever);
    let placement = FramePlacement {
        duration_ms: 55,
        ..Default::default()
    };
    outer
        .animation_mut()
        .unwrap()
        .push_image(&inner, placement)
        .unwrap();
    let anim = outer.animation().unwrap();
    assert_eq!(anim.frames.len(), 2);
    assert!(anim.frames.iter().all(|f| f.duration_ms == 55));
}

// ============================================================================
// Demux
// ============================================================================

#[test]
fn mux_then_demux_reproduces_payload_bytes() {
    let src = lossy_image(48, 32);
    let mut img = WebPImage::new_animation([0; 4], LoopCount::Forever);
    img.animation_mut()
        .unwrap()
        .push_image(&src, FramePlacement::default())
        .unwrap();

    let muxed = img.mux_anim(&AnimOptions::default()).unwrap();
    let parsed = WebPImage::parse(&muxed).unwrap();
    let standalone = parsed.demux_frame(0).unwrap();

    // No alpha and no metadata: the payload is wrapped directly, without a
    // VP8X header.
    assert_eq!(&standalone[12..16], b"VP8 ");

    let reparsed = WebPImage::parse(&standalone).unwrap();
    let (WebPImage::Lossy(original), WebPImage::Lossy(extracted)) = (&src, &reparsed) else {
        panic!("expected lossy images");
    };
    assert_eq!(original.data(), extracted.data());
    assert_eq!((reparsed.width(), reparsed.height()), (48, 32));
    assert_eq!(reparsed.has_alpha(), src.has_alpha());
}

#[test]
fn demuxed_frame_inherits_parent_metadata() {
    let mut img = two_frame_anim();
    img.set_iccp(Some(vec![0xC0, 0xC1]));
    let standalone = img.demux_frame(1).unwrap();

    // Metadata signaling requires the VP8X header.
    assert_eq!(&standalone[12..16], b"VP8X");
    let back = WebPImage::parse(&standalone).unwrap();
    assert_eq!(back.iccp(), Some(&[0xC0, 0xC1][..]));
    assert_eq!((back.width(), back.height()), (64, 64));
}

#[test]
fn demux_alpha_frame_signals_alpha() {
    let mut img = WebPImage::new_animation([0; 4], LoopCount::Forever);
    img.animation_mut()
        .unwrap()
        .push_image(&lossless_image(20, 20, true), FramePlacement::default())
        .unwrap();
    let standalone = img.demux_frame(0).unwrap();
    assert_eq!(&standalone[12..16], b"VP8X");
    assert_eq!(standalone[20], 0b0001_0000);
    let back = WebPImage::parse(&standalone).unwrap();
    assert!(back.has_alpha());
}

#[test]
fn demux_frame_bounds() {
    let img = two_frame_anim();
    assert!(img.demux_frame(1).is_ok());
    assert!(matches!(
        img.demux_frame(2),
        Err(MuxError::FrameOutOfBounds { index: 2, total: 2 })
    ));
    assert_eq!(img.demux_frames().unwrap().len(), 2);

    let still = lossy_image(8, 8);
    assert!(matches!(
        still.demux_frame(0),
        Err(MuxError::Unsupported(_))
    ));
}

// ============================================================================
// Mutation
// ============================================================================

#[test]
fn set_iccp_promotes_lossy_and_writes_vp8x() {
    let mut img = lossy_image(100, 50);
    img.set_iccp(Some(vec![0x10, 0x20, 0x30]));

    let bytes = img.serialize().unwrap();
    assert_eq!(&bytes[12..16], b"VP8X");
    // ICCP bit only; no Alpha/EXIF/XMP/Anim.
    assert_eq!(bytes[20], 0b0010_0000);
    assert_eq!(&bytes[24..27], &99u32.to_le_bytes()[..3]);
    assert_eq!(&bytes[27..30], &49u32.to_le_bytes()[..3]);

    let back = WebPImage::parse(&bytes).unwrap();
    assert_eq!(back.iccp(), Some(&[0x10, 0x20, 0x30][..]));
    assert_eq!((back.width(), back.height()), (100, 50));
}

#[test]
fn strip_iccp_stays_extended_and_omits_chunk() {
    let mut img = lossy_image(64, 64);
    img.set_iccp(Some(vec![1, 2, 3, 4]));
    img.set_iccp(None);

    assert!(matches!(img, WebPImage::Extended(_)));
    let bytes = img.serialize().unwrap();
    assert_eq!(bytes[20], 0);
    assert!(
        !bytes.windows(4).any(|w| w == b"ICCP"),
        "stripped container must not contain an ICCP chunk"
    );
    assert_eq!(WebPImage::parse(&bytes).unwrap().iccp(), None);
}

#[test]
fn duration_edit_persists_through_mux() {
    let mut img = two_frame_anim();
    img.set_frame_durations(250, 1, 0).unwrap();
    let bytes = img.mux_anim(&AnimOptions::default()).unwrap();
    let back = WebPImage::parse(&bytes).unwrap();
    let durations: Vec<u32> = back
        .animation()
        .unwrap()
        .frames
        .iter()
        .map(|f| f.duration_ms)
        .collect();
    assert_eq!(durations, vec![100, 250]);
}

#[test]
fn duration_rejects_24_bit_overflow() {
    let mut img = two_frame_anim();
    assert!(matches!(
        img.set_frame_durations(1 << 24, 0, 0),
        Err(MuxError::DurationOutOfRange { .. })
    ));
}

#[test]
fn replace_frame_swaps_payload_and_keeps_timing() {
    let mut img = two_frame_anim();
    let replacement = lossless_image(20, 10, false);
    img.replace_frame(1, &replacement).unwrap();

    let anim = img.animation().unwrap();
    assert!(anim.frames[1].payload.is_lossless());
    assert_eq!((anim.frames[1].width, anim.frames[1].height), (20, 10));
    // Placement and timing are untouched.
    assert_eq!(anim.frames[1].duration_ms, 100);
    assert_eq!((anim.frames[1].x, anim.frames[1].y), (0, 0));
    // The other frame is untouched.
    assert!(!anim.frames[0].payload.is_lossless());
}

#[test]
fn replace_frame_with_animated_source_fails_untouched() {
    let mut img = two_frame_anim();
    let before: Vec<u8> = img.animation().unwrap().frames[0]
        .payload
        .bitstream()
        .data()
        .to_vec();

    let animated_source = two_frame_anim();
    let err = img.replace_frame(0, &animated_source);
    assert!(matches!(err, Err(MuxError::Unsupported(_))));

    let after = img.animation().unwrap().frames[0].payload.bitstream().data();
    assert_eq!(before, after, "failed replacement must not modify the frame");
    assert!(!img.animation().unwrap().frames[0].payload.is_lossless());
}

#[test]
fn replace_frame_index_out_of_bounds() {
    let mut img = two_frame_anim();
    let replacement = lossy_image(8, 8);
    assert!(matches!(
        img.replace_frame(5, &replacement),
        Err(MuxError::FrameOutOfBounds { index: 5, total: 2 })
    ));
}

#[test]
fn replace_frame_accepts_non_animated_extended_source() {
    let mut source = lossy_image(30, 20);
    source.set_exif(Some(vec![7, 7]));

    let mut img = two_frame_anim();
    img.replace_frame(0, &source).unwrap();
    let frame = &img.animation().unwrap().frames[0];
    assert_eq!((frame.width, frame.height), (30, 20));
    assert!(!frame.payload.is_lossless());
}

// ============================================================================
// Metadata helpers
// ============================================================================

#[test]
fn metadata_embed_and_remove_roundtrip() {
    let data = container(&[chunk(b"VP8L", &vp8l_payload(12, 12, false))]);

    let with_icc = zenmux::metadata::embed_icc(&data, &[5, 6, 7]).unwrap();
    assert_eq!(
        zenmux::metadata::icc_profile(&with_icc).unwrap(),
        Some(vec![5, 6, 7])
    );
    assert_eq!(zenmux::metadata::exif(&with_icc).unwrap(), None);

    let stripped = zenmux::metadata::remove_icc(&with_icc).unwrap();
    assert_eq!(zenmux::metadata::icc_profile(&stripped).unwrap(), None);
}

#[test]
fn metadata_bundle_embeds_in_one_pass() {
    let data = container(&[chunk(b"VP8 ", &vp8_payload(40, 40))]);
    let meta = zenmux::metadata::Metadata::new()
        .with_exif(&[1])
        .with_xmp(&[2, 3]);
    let out = zenmux::metadata::embed(&data, &meta).unwrap();
    let img = WebPImage::parse(&out).unwrap();
    assert_eq!(img.exif(), Some(&[1][..]));
    assert_eq!(img.xmp(), Some(&[2, 3][..]));
    assert_eq!(img.iccp(), None);
}
