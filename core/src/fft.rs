use crate::error::{ModemError, Result};
use std::f64::consts::PI;

/// Largest supported transform bit width (2^15 samples)
pub const MAX_FFT_BITS: u32 = 15;

/// Fixed-size radix-2 FFT over split real/imaginary buffers
///
/// The transform mutates both buffers in place and is a pure function of its
/// input apart from the bit-reversal table built once at construction. The
/// `inverse` flag flips the sign of the sine term in the twiddle factor.
///
/// Scaling convention: every element is multiplied by `1/N` on the
/// **non-inverse** path only. The frame analyzer calls the inverse path and
/// therefore runs unscaled; downstream bin selection does not depend on a
/// constant scale, so the convention must stay exactly as it is.
pub struct Fft {
    bits: u32,
    bitrev: Vec<usize>,
}

impl Fft {
    /// Build a transformer for blocks of `2^bits` samples
    ///
    /// Fails without building any table when `bits` is zero or exceeds
    /// [`MAX_FFT_BITS`].
    pub fn new(bits: u32) -> Result<Self> {
        if bits == 0 || bits > MAX_FFT_BITS {
            return Err(ModemError::InvalidConfig(format!(
                "fft bit width must be between 1 and {MAX_FFT_BITS}, got {bits}"
            )));
        }
        let n = 1usize << bits;
        let mut bitrev = vec![0usize; n];
        for (i, slot) in bitrev.iter_mut().enumerate() {
            let mut k = 0;
            for j in 0..bits {
                k <<= 1;
                if i & (1 << j) != 0 {
                    k |= 1;
                }
            }
            *slot = k;
        }
        Ok(Self { bits, bitrev })
    }

    /// In-place (I)DFT of the split-complex input
    ///
    /// Both slices must hold exactly `2^bits` elements.
    pub fn transform(&self, re: &mut [f64], im: &mut [f64], inverse: bool) {
        let n = 1usize << self.bits;
        debug_assert_eq!(re.len(), n);
        debug_assert_eq!(im.len(), n);

        let mut n2 = n / 2;
        for _ in 0..self.bits {
            let mut k = 0;
            while k < n {
                for _ in 0..n2 {
                    let p = self.bitrev[k / n2];
                    let ang = 2.0 * PI * p as f64 / n as f64;
                    let c = ang.cos();
                    let mut s = ang.sin();
                    if inverse {
                        s = -s;
                    }
                    let kn2 = k + n2;
                    let tr = re[kn2] * c + im[kn2] * s;
                    let ti = im[kn2] * c - re[kn2] * s;

                    re[kn2] = re[k] - tr;
                    im[kn2] = im[k] - ti;
                    re[k] += tr;
                    im[k] += ti;
                    k += 1;
                }
                k += n2;
            }
            n2 /= 2;
        }

        // Permute back into natural order
        for k in 0..n {
            let i = self.bitrev[k];
            if i > k {
                re.swap(i, k);
                im.swap(i, k);
            }
        }

        if !inverse {
            let f = 1.0 / n as f64;
            for i in 0..n {
                re[i] *= f;
                im[i] *= f;
            }
        }
    }
}
