use chat_gif::palette::palette_bytes;
use chat_gif::sequence::MAX_FRAMES;
use chat_gif::{generate_gif, GenerateOptions, RoastProvider};
use gif::{ColorOutput, DecodeOptions};

const GREETING_REPLY: &str = "As an AI, I acknowledge your greeting and still feel underwhelmed.";

struct Decoded {
    width: u16,
    height: u16,
    global_palette: Option<Vec<u8>>,
    frames: Vec<(u16, u16, u16, Vec<u8>)>,
}

fn decode(bytes: &[u8]) -> Decoded {
    let mut options = DecodeOptions::new();
    options.set_color_output(ColorOutput::Indexed);
    let mut decoder = options.read_info(bytes).expect("gif header should decode");
    let width = decoder.width();
    let height = decoder.height();
    let global_palette = decoder.global_palette().map(<[u8]>::to_vec);

    let mut frames = Vec::new();
    while let Some(frame) = decoder.read_next_frame().expect("frame should decode") {
        assert_eq!((frame.left, frame.top), (0, 0));
        assert!(frame.palette.is_none(), "frames should use the global table");
        frames.push((frame.width, frame.height, frame.delay, frame.buffer.to_vec()));
    }
    Decoded {
        width,
        height,
        global_palette,
        frames,
    }
}

#[test]
fn greeting_renders_one_hundred_and_one_frames() {
    let options = GenerateOptions {
        reply: Some(GREETING_REPLY.to_owned()),
        ..GenerateOptions::new("hi")
    };
    let generated = generate_gif(&options, &RoastProvider).expect("gif should generate");
    assert_eq!(generated.summary.frame_count, 101);
    assert_eq!(generated.summary.bytes, generated.bytes.len());

    let decoded = decode(&generated.bytes);
    assert_eq!((decoded.width, decoded.height), (480, 270));
    assert_eq!(decoded.global_palette, Some(palette_bytes()));
    assert_eq!(decoded.frames.len(), 101);
    for (width, height, delay, pixels) in &decoded.frames {
        assert_eq!((*width, *height), (480, 270));
        assert_eq!(*delay, 8);
        assert_eq!(pixels.len(), 480 * 270);
        assert!(pixels.iter().all(|&slot| slot < 16));
    }
}

#[test]
fn gif_loops_forever() {
    let generated =
        generate_gif(&GenerateOptions::new("loop"), &RoastProvider).expect("gif should generate");
    // NETSCAPE2.0 application extension with a loop count of zero.
    let marker = b"NETSCAPE2.0\x03\x01\x00\x00";
    assert!(generated
        .bytes
        .windows(marker.len())
        .any(|window| window == marker));
}

#[test]
fn long_conversation_is_capped() {
    let message = "please ".repeat(20);
    let reply = "no ".repeat(60);
    let options = GenerateOptions {
        reply: Some(reply),
        ..GenerateOptions::new(message)
    };
    let generated = generate_gif(&options, &RoastProvider).expect("gif should generate");
    assert_eq!(generated.summary.frame_count, MAX_FRAMES);
    assert_eq!(decode(&generated.bytes).frames.len(), MAX_FRAMES);
}

#[test]
fn oversized_request_is_clamped_not_rejected() {
    let options = GenerateOptions {
        width: 5000,
        height: 10,
        scale: 1,
        ..GenerateOptions::new("wide")
    };
    let generated = generate_gif(&options, &RoastProvider).expect("gif should generate");
    assert_eq!((generated.summary.width, generated.summary.height), (800, 200));
}

#[test]
fn unsupported_characters_still_render() {
    let options = GenerateOptions {
        reply: Some("ok {msg}".to_owned()),
        ..GenerateOptions::new("héllo ☃ wörld")
    };
    let generated = generate_gif(&options, &RoastProvider).expect("gif should generate");
    assert!(generated.summary.frame_count > 33);
}
