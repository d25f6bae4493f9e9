//! Integer arithmetic over minor units (US dollar cents, satoshis).
//! Monetary quantities are never floats; only ratios, APYs, and
//! statistics are.

const SATS_PER_BTC: i64 = 100_000_000;

/// Converts a dollar amount to integer cents using round-half-to-even,
/// so repeated conversions do not drift a cent in either direction.
pub fn usd_to_cents(usd: f64) -> i64 {
    let scaled = usd * 100.0;
    round_half_to_even(scaled)
}

pub fn cents_to_usd(cents: i64) -> f64 {
    cents as f64 / 100.0
}

pub fn btc_to_sats(btc: f64) -> i64 {
    round_half_to_even(btc * SATS_PER_BTC as f64)
}

pub fn sats_to_btc(sats: i64) -> f64 {
    sats as f64 / SATS_PER_BTC as f64
}

/// Computes `x * num / den` using a 128-bit intermediate so the
/// multiplication cannot overflow at billion-dollar scales. Truncates
/// toward zero, matching integer-division semantics elsewhere in the
/// core (e.g. LP token minting).
pub fn mul_div(x: i64, num: i64, den: i64) -> i64 {
    assert!(den != 0, "mul_div: division by zero");
    let product = x as i128 * num as i128;
    (product / den as i128) as i64
}

/// Same as `mul_div` but rounds to the nearest integer instead of
/// truncating, for contexts that need round-to-nearest (e.g. LP
/// withdrawal amounts).
pub fn mul_div_round(x: i64, num: i64, den: i64) -> i64 {
    assert!(den != 0, "mul_div_round: division by zero");
    let product = x as i128 * num as i128;
    let den128 = den as i128;
    let half = den128 / 2;
    if product >= 0 {
        ((product + half) / den128) as i64
    } else {
        ((product - half) / den128) as i64
    }
}

pub fn saturating_add_cents(a: i64, b: i64) -> i64 {
    a.saturating_add(b)
}

pub fn saturating_sub_cents(a: i64, b: i64) -> i64 {
    a.saturating_sub(b).max(0)
}

fn round_half_to_even(x: f64) -> i64 {
    let floor = x.floor();
    let diff = x - floor;
    let floor_i = floor as i64;
    if diff < 0.5 {
        floor_i
    } else if diff > 0.5 {
        floor_i + 1
    } else if floor_i % 2 == 0 {
        floor_i
    } else {
        floor_i + 1
    }
}
