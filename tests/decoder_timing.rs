use uartecho_rs::error::{RxError, SimError};
use uartecho_rs::phy::frame::{FRAME_BITS, frame_levels};
use uartecho_rs::phy::{BitTiming, FrameDecoder};
use uartecho_rs::sim::{Context, Driver, Level, SignalId, SimTime, Simulator, ns};

const RATE: u32 = 115_200;

/// Drive one frame whose transition into slot k is displaced by `skews[k]` ps.
fn skewed_frame(
    ctx: &mut Context,
    line: SignalId,
    timing: BitTiming,
    byte: u8,
    skews: [i64; FRAME_BITS],
) -> Result<(), SimError> {
    let t0 = ctx.now()?;
    let levels = frame_levels(byte);
    ctx.write(line, levels[0])?;
    for slot in 1..FRAME_BITS {
        let at = (t0 + timing.offset(2 * slot as u64)) as i64 + skews[slot];
        ctx.wait_until(at as SimTime)?;
        ctx.write(line, levels[slot])?;
    }
    // hold the stop level past the point the decoder returns
    ctx.wait_until(t0 + timing.offset(2 * FRAME_BITS as u64 + 2))
}

fn decode_with_skew(byte: u8, skews: [i64; FRAME_BITS], strict: bool) -> Result<u8, RxError> {
    let timing = BitTiming::new(RATE).unwrap();
    let mut sim = Simulator::new();
    let clk = sim.add_signal("clk", Driver::Clock, Level::Low);
    let line = sim.add_signal("line", Driver::Bench, Level::High);
    sim.add_clock(clk, ns(20)).unwrap();
    let decoder = FrameDecoder::new(timing, clk, line).with_strict_stop_bit(strict);

    sim.run("probe", move |ctx| {
        ctx.wait(timing.bit_duration())?;
        let driver = ctx.spawn("driver", move |ctx| {
            skewed_frame(ctx, line, timing, byte, skews)
        })?;
        let result = decoder.receive(ctx);
        ctx.join(driver)??;
        Ok::<_, RxError>(result)
    })
    .unwrap()
    .unwrap()
}

fn uniform(fraction_of_bit: f64) -> [i64; FRAME_BITS] {
    let bit = BitTiming::new(RATE).unwrap().bit_duration() as f64;
    let mut skews = [(bit * fraction_of_bit) as i64; FRAME_BITS];
    skews[0] = 0;
    skews
}

fn alternating(fraction_of_bit: f64) -> [i64; FRAME_BITS] {
    let mut skews = uniform(fraction_of_bit);
    for (slot, skew) in skews.iter_mut().enumerate() {
        if slot % 2 == 0 {
            *skew = -*skew;
        }
    }
    skews
}

#[test]
fn example_0x55_decodes() {
    assert_eq!(decode_with_skew(0x55, [0; FRAME_BITS], true).unwrap(), 0x55);
}

#[test]
fn tolerates_ten_percent_skew() {
    for byte in [0x55, 0xA3, 0x00, 0xFF, 0x42] {
        for skews in [uniform(0.1), uniform(-0.1), alternating(0.1), alternating(-0.1)] {
            assert_eq!(
                decode_with_skew(byte, skews, true).unwrap(),
                byte,
                "byte 0x{byte:02X} with skews {skews:?}"
            );
        }
    }
}

#[test]
fn late_transitions_beyond_half_bit_shift_data() {
    // Every sample lands one slot early: the start bit becomes data bit 0.
    assert_eq!(decode_with_skew(0xA3, uniform(0.6), false).unwrap(), 0x46);
}

#[test]
fn early_transitions_beyond_half_bit_shift_data() {
    // Every sample lands one slot late: the stop bit becomes data bit 7.
    assert_eq!(decode_with_skew(0xA3, uniform(-0.6), false).unwrap(), 0xD1);
}

#[test]
fn desync_detected_at_stop_bit() {
    let err = decode_with_skew(0x42, uniform(0.6), true).unwrap_err();
    assert!(matches!(err, RxError::StopBitLow { data: 0x84 }));
}
