// SPDX-License-Identifier: AGPL-3.0-only

//! Seeded xoshiro256++ generator for reproducible inputs and test models.

pub(crate) struct Xoshiro {
    s: [u64; 4],
}

impl Xoshiro {
    pub(crate) fn new(seed: u64) -> Self {
        let s = [
            seed ^ 0x9e37_79b9_7f4a_7c15,
            seed.wrapping_add(0x6c62_272e_07bb_0142),
            seed.rotate_left(17),
            seed.rotate_right(5),
        ];
        let mut rng = Self { s };
        for _ in 0..20 {
            let _ = rng.next_u64();
        }
        rng
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        let result = self.s[0]
            .wrapping_add(self.s[3])
            .rotate_left(23)
            .wrapping_add(self.s[0]);
        let t = self.s[1] << 17;
        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];
        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);
        result
    }

    /// Uniform in [0, 1)
    pub(crate) fn next_f64(&mut self) -> f64 {
        let bits = (self.next_u64() >> 11) | 0x3ff0_0000_0000_0000;
        f64::from_bits(bits) - 1.0
    }

    /// Uniform in [0, 1)
    pub(crate) fn next_f32(&mut self) -> f32 {
        unit_f32(self.next_u64())
    }

    /// Uniform in [-1, 1)
    pub(crate) fn next_signed_f32(&mut self) -> f32 {
        // exact in f32: at most 2 * (1 - 2^-23) - 1
        self.next_f32() * 2.0 - 1.0
    }

    /// Standard normal via Box–Muller
    pub(crate) fn next_normal_f32(&mut self) -> f32 {
        // 1 - u keeps the log argument in (0, 1]
        let u1 = 1.0 - self.next_f64();
        let u2 = self.next_f64();
        let r = (-2.0 * u1.ln()).sqrt();
        #[allow(clippy::cast_possible_truncation)]
        let z = (r * (std::f64::consts::TAU * u2).cos()) as f32;
        z
    }
}

/// Top 23 bits of `raw` as a mantissa in [1, 2), shifted down to [0, 1)
fn unit_f32(raw: u64) -> f32 {
    #[allow(clippy::cast_possible_truncation)]
    let bits = (raw >> 41) as u32 | 0x3f80_0000;
    f32::from_bits(bits) - 1.0
}
