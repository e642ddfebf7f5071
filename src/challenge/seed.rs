//! Deterministic "page of the day" selection.
//!
//! The date string is hashed with cyrb128 into four 32-bit words which seed
//! an sfc32 generator. Both algorithms and all constants below are frozen:
//! changing any of them changes which page every past and future date maps
//! to, so a recompute after a restart would no longer match what players saw.
//!
//! This replaces the older scheme of wrapping the day-of-year around the
//! page count, which visited pages in order and skewed towards low pages.

use crate::challenge::layout::{CatalogueLayout, Selection};

/// cyrb128 over the UTF-8 bytes of `input`.
pub fn cyrb128(input: &str) -> [u32; 4] {
    let mut h1: u32 = 1_779_033_703;
    let mut h2: u32 = 3_144_134_277;
    let mut h3: u32 = 1_013_904_242;
    let mut h4: u32 = 2_773_480_762;

    for k in input.bytes().map(u32::from) {
        h1 = h2 ^ (h1 ^ k).wrapping_mul(597_399_067);
        h2 = h3 ^ (h2 ^ k).wrapping_mul(2_869_860_233);
        h3 = h4 ^ (h3 ^ k).wrapping_mul(951_274_213);
        h4 = h1 ^ (h4 ^ k).wrapping_mul(2_716_044_179);
    }

    h1 = (h3 ^ (h1 >> 18)).wrapping_mul(597_399_067);
    h2 = (h4 ^ (h2 >> 22)).wrapping_mul(2_869_860_233);
    h3 = (h1 ^ (h3 >> 17)).wrapping_mul(951_274_213);
    h4 = (h2 ^ (h4 >> 19)).wrapping_mul(2_716_044_179);

    h1 ^= h2 ^ h3 ^ h4;
    h2 ^= h1;
    h3 ^= h1;
    h4 ^= h1;
    [h1, h2, h3, h4]
}

/// Small Fast Counting generator, 32-bit variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sfc32 {
    a: u32,
    b: u32,
    c: u32,
    d: u32,
}

impl Sfc32 {
    pub fn from_seed([a, b, c, d]: [u32; 4]) -> Self {
        Self { a, b, c, d }
    }

    pub fn next_u32(&mut self) -> u32 {
        let t = self.a.wrapping_add(self.b);
        self.a = self.b ^ (self.b >> 9);
        self.b = self.c.wrapping_add(self.c << 3);
        self.c = self.c.rotate_left(21);
        self.d = self.d.wrapping_add(1);
        let t = t.wrapping_add(self.d);
        self.c = self.c.wrapping_add(t);
        t
    }

    /// Uniform float in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / 4_294_967_296.0
    }
}

/// Seed a generator from a date string such as `"2024-03-01"`.
pub fn seed(date: &str) -> Sfc32 {
    Sfc32::from_seed(cyrb128(date))
}

/// Page and offset of the daily challenge for `date`.
///
/// `page` lies in `[0, max_page)` and `offset` in `[0, page_size - window)`,
/// or is 0 when the window spans the whole page.
pub fn daily_selection(date: &str, layout: CatalogueLayout) -> Selection {
    let mut rng = seed(date);
    let page = (rng.next_f64() * f64::from(layout.max_page)).floor() as u32;
    let offset = (rng.next_f64() * layout.max_offset() as f64).floor() as usize;
    Selection { page, offset }
}
