//! Precomputed sigmoid lookup table.
//!
//! Built once and shared read-only across worker threads, the same way the
//! training engine's parallel thread pool statics are built once via
//! `once_cell` elsewhere in this crate's ancestry.

use once_cell::sync::Lazy;

const TABLE_SIZE: usize = 512;
const MAX_EXP: f32 = 6.0;

static TABLE: Lazy<[f32; TABLE_SIZE]> = Lazy::new(build_table);

fn build_table() -> [f32; TABLE_SIZE] {
    let mut table = [0.0f32; TABLE_SIZE];
    for (k, slot) in table.iter_mut().enumerate() {
        let x = (k as f32 / TABLE_SIZE as f32) * MAX_EXP;
        let e = x.exp();
        *slot = (e / (e + 1.0)) - 0.5;
    }
    table
}

/// `sigmoid(x)`, saturating to `0.5 ± 0.5` for `|x| >= 6`.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    let table = &*TABLE;
    let abs_x = x.abs();
    if abs_x >= MAX_EXP {
        return 0.5 + 0.5 * x.signum();
    }
    let idx = ((abs_x * TABLE_SIZE as f32) / MAX_EXP) as usize;
    let idx = idx.min(TABLE_SIZE - 1);
    let r = table[idx];
    if x > 0.0 { 0.5 + r } else { 0.5 - r }
}
