//! Vectorized accumulator update primitives.
//!
//! The incremental updates are all combinations of up to two feature
//! additions and two subtractions over an aligned i16 slab. Each
//! primitive is provided behind one interface with:
//! - `x86_64`: AVX2 (256-bit, 16 lanes)
//! - aarch64: NEON (128-bit, 8 lanes)
//! - Fallback: scalar loops
//!
//! All slices are `L1_SIZE` long and 64-byte aligned; the compiler
//! auto-vectorizes the scalar fallback reasonably well, the intrinsic
//! paths just remove the guesswork.

use super::arch::L1_SIZE;

/// `dst = src + add1`
#[inline]
pub fn add(src: &[i16], dst: &mut [i16], add1: &[i16]) {
    #[cfg(target_arch = "aarch64")]
    {
        unsafe { add_neon(src, dst, add1) }
    }

    #[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
    {
        unsafe { add_avx2(src, dst, add1) }
    }

    #[cfg(all(target_arch = "x86_64", not(target_feature = "avx2")))]
    {
        if is_x86_feature_detected!("avx2") {
            unsafe { add_avx2(src, dst, add1) }
        } else {
            add_scalar(src, dst, add1);
        }
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        add_scalar(src, dst, add1);
    }
}

/// `dst = src - sub1`
#[inline]
pub fn sub(src: &[i16], dst: &mut [i16], sub1: &[i16]) {
    #[cfg(target_arch = "aarch64")]
    {
        unsafe { sub_neon(src, dst, sub1) }
    }

    #[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
    {
        unsafe { sub_avx2(src, dst, sub1) }
    }

    #[cfg(all(target_arch = "x86_64", not(target_feature = "avx2")))]
    {
        if is_x86_feature_detected!("avx2") {
            unsafe { sub_avx2(src, dst, sub1) }
        } else {
            sub_scalar(src, dst, sub1);
        }
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        sub_scalar(src, dst, sub1);
    }
}

/// `dst = src - sub1 + add1` (quiet move)
#[inline]
pub fn sub_add(src: &[i16], dst: &mut [i16], sub1: &[i16], add1: &[i16]) {
    #[cfg(target_arch = "aarch64")]
    {
        unsafe { sub_add_neon(src, dst, sub1, add1) }
    }

    #[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
    {
        unsafe { sub_add_avx2(src, dst, sub1, add1) }
    }

    #[cfg(all(target_arch = "x86_64", not(target_feature = "avx2")))]
    {
        if is_x86_feature_detected!("avx2") {
            unsafe { sub_add_avx2(src, dst, sub1, add1) }
        } else {
            sub_add_scalar(src, dst, sub1, add1);
        }
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        sub_add_scalar(src, dst, sub1, add1);
    }
}

/// `dst = src - sub1 - sub2 + add1` (capture)
#[inline]
pub fn sub_sub_add(src: &[i16], dst: &mut [i16], sub1: &[i16], sub2: &[i16], add1: &[i16]) {
    #[cfg(target_arch = "aarch64")]
    {
        unsafe { sub_sub_add_neon(src, dst, sub1, sub2, add1) }
    }

    #[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
    {
        unsafe { sub_sub_add_avx2(src, dst, sub1, sub2, add1) }
    }

    #[cfg(all(target_arch = "x86_64", not(target_feature = "avx2")))]
    {
        if is_x86_feature_detected!("avx2") {
            unsafe { sub_sub_add_avx2(src, dst, sub1, sub2, add1) }
        } else {
            sub_sub_add_scalar(src, dst, sub1, sub2, add1);
        }
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        sub_sub_add_scalar(src, dst, sub1, sub2, add1);
    }
}

/// `dst = src - sub1 - sub2 + add1 + add2` (castling)
#[inline]
pub fn sub_sub_add_add(
    src: &[i16],
    dst: &mut [i16],
    sub1: &[i16],
    sub2: &[i16],
    add1: &[i16],
    add2: &[i16],
) {
    #[cfg(target_arch = "aarch64")]
    {
        unsafe { sub_sub_add_add_neon(src, dst, sub1, sub2, add1, add2) }
    }

    #[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
    {
        unsafe { sub_sub_add_add_avx2(src, dst, sub1, sub2, add1, add2) }
    }

    #[cfg(all(target_arch = "x86_64", not(target_feature = "avx2")))]
    {
        if is_x86_feature_detected!("avx2") {
            unsafe { sub_sub_add_add_avx2(src, dst, sub1, sub2, add1, add2) }
        } else {
            sub_sub_add_add_scalar(src, dst, sub1, sub2, add1, add2);
        }
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        sub_sub_add_add_scalar(src, dst, sub1, sub2, add1, add2);
    }
}

/// `acc += add1`, in place. Used by the cache refresh loops where the
/// destination is also the source.
#[inline]
pub fn add_assign(acc: &mut [i16], add1: &[i16]) {
    for i in 0..L1_SIZE {
        acc[i] = acc[i].wrapping_add(add1[i]);
    }
}

/// `acc -= sub1`, in place.
#[inline]
pub fn sub_assign(acc: &mut [i16], sub1: &[i16]) {
    for i in 0..L1_SIZE {
        acc[i] = acc[i].wrapping_sub(sub1[i]);
    }
}

// ============================================================================
// Scalar fallbacks
// ============================================================================

#[allow(dead_code)]
fn add_scalar(src: &[i16], dst: &mut [i16], add1: &[i16]) {
    for i in 0..L1_SIZE {
        dst[i] = src[i].wrapping_add(add1[i]);
    }
}

#[allow(dead_code)]
fn sub_scalar(src: &[i16], dst: &mut [i16], sub1: &[i16]) {
    for i in 0..L1_SIZE {
        dst[i] = src[i].wrapping_sub(sub1[i]);
    }
}

#[allow(dead_code)]
fn sub_add_scalar(src: &[i16], dst: &mut [i16], sub1: &[i16], add1: &[i16]) {
    for i in 0..L1_SIZE {
        dst[i] = src[i].wrapping_add(add1[i]).wrapping_sub(sub1[i]);
    }
}

#[allow(dead_code)]
fn sub_sub_add_scalar(src: &[i16], dst: &mut [i16], sub1: &[i16], sub2: &[i16], add1: &[i16]) {
    for i in 0..L1_SIZE {
        dst[i] = src[i]
            .wrapping_add(add1[i])
            .wrapping_sub(sub1[i])
            .wrapping_sub(sub2[i]);
    }
}

#[allow(dead_code)]
fn sub_sub_add_add_scalar(
    src: &[i16],
    dst: &mut [i16],
    sub1: &[i16],
    sub2: &[i16],
    add1: &[i16],
    add2: &[i16],
) {
    for i in 0..L1_SIZE {
        dst[i] = src[i]
            .wrapping_add(add1[i])
            .wrapping_add(add2[i])
            .wrapping_sub(sub1[i])
            .wrapping_sub(sub2[i]);
    }
}

// ============================================================================
// AVX2
// ============================================================================

#[cfg(target_arch = "x86_64")]
mod avx2 {
    use super::L1_SIZE;
    use std::arch::x86_64::*;

    pub const CHUNK: usize = 16;
    pub const CHUNKS: usize = L1_SIZE / CHUNK;

    #[target_feature(enable = "avx2")]
    pub unsafe fn add_avx2(src: &[i16], dst: &mut [i16], add1: &[i16]) {
        let s = src.as_ptr().cast::<__m256i>();
        let d = dst.as_mut_ptr().cast::<__m256i>();
        let a = add1.as_ptr().cast::<__m256i>();
        for i in 0..CHUNKS {
            let v = _mm256_add_epi16(_mm256_loadu_si256(s.add(i)), _mm256_loadu_si256(a.add(i)));
            _mm256_storeu_si256(d.add(i), v);
        }
    }

    #[target_feature(enable = "avx2")]
    pub unsafe fn sub_avx2(src: &[i16], dst: &mut [i16], sub1: &[i16]) {
        let s = src.as_ptr().cast::<__m256i>();
        let d = dst.as_mut_ptr().cast::<__m256i>();
        let m = sub1.as_ptr().cast::<__m256i>();
        for i in 0..CHUNKS {
            let v = _mm256_sub_epi16(_mm256_loadu_si256(s.add(i)), _mm256_loadu_si256(m.add(i)));
            _mm256_storeu_si256(d.add(i), v);
        }
    }

    #[target_feature(enable = "avx2")]
    pub unsafe fn sub_add_avx2(src: &[i16], dst: &mut [i16], sub1: &[i16], add1: &[i16]) {
        let s = src.as_ptr().cast::<__m256i>();
        let d = dst.as_mut_ptr().cast::<__m256i>();
        let m = sub1.as_ptr().cast::<__m256i>();
        let a = add1.as_ptr().cast::<__m256i>();
        for i in 0..CHUNKS {
            let v = _mm256_sub_epi16(
                _mm256_add_epi16(_mm256_loadu_si256(s.add(i)), _mm256_loadu_si256(a.add(i))),
                _mm256_loadu_si256(m.add(i)),
            );
            _mm256_storeu_si256(d.add(i), v);
        }
    }

    #[target_feature(enable = "avx2")]
    pub unsafe fn sub_sub_add_avx2(
        src: &[i16],
        dst: &mut [i16],
        sub1: &[i16],
        sub2: &[i16],
        add1: &[i16],
    ) {
        let s = src.as_ptr().cast::<__m256i>();
        let d = dst.as_mut_ptr().cast::<__m256i>();
        let m1 = sub1.as_ptr().cast::<__m256i>();
        let m2 = sub2.as_ptr().cast::<__m256i>();
        let a = add1.as_ptr().cast::<__m256i>();
        for i in 0..CHUNKS {
            let v = _mm256_sub_epi16(
                _mm256_sub_epi16(
                    _mm256_add_epi16(_mm256_loadu_si256(s.add(i)), _mm256_loadu_si256(a.add(i))),
                    _mm256_loadu_si256(m1.add(i)),
                ),
                _mm256_loadu_si256(m2.add(i)),
            );
            _mm256_storeu_si256(d.add(i), v);
        }
    }

    #[target_feature(enable = "avx2")]
    pub unsafe fn sub_sub_add_add_avx2(
        src: &[i16],
        dst: &mut [i16],
        sub1: &[i16],
        sub2: &[i16],
        add1: &[i16],
        add2: &[i16],
    ) {
        let s = src.as_ptr().cast::<__m256i>();
        let d = dst.as_mut_ptr().cast::<__m256i>();
        let m1 = sub1.as_ptr().cast::<__m256i>();
        let m2 = sub2.as_ptr().cast::<__m256i>();
        let a1 = add1.as_ptr().cast::<__m256i>();
        let a2 = add2.as_ptr().cast::<__m256i>();
        for i in 0..CHUNKS {
            let v = _mm256_sub_epi16(
                _mm256_sub_epi16(
                    _mm256_add_epi16(
                        _mm256_add_epi16(
                            _mm256_loadu_si256(s.add(i)),
                            _mm256_loadu_si256(a1.add(i)),
                        ),
                        _mm256_loadu_si256(a2.add(i)),
                    ),
                    _mm256_loadu_si256(m1.add(i)),
                ),
                _mm256_loadu_si256(m2.add(i)),
            );
            _mm256_storeu_si256(d.add(i), v);
        }
    }
}

#[cfg(target_arch = "x86_64")]
use avx2::{add_avx2, sub_add_avx2, sub_avx2, sub_sub_add_add_avx2, sub_sub_add_avx2};

// ============================================================================
// NEON
// ============================================================================

#[cfg(target_arch = "aarch64")]
mod neon {
    use super::L1_SIZE;
    use std::arch::aarch64::*;

    pub const CHUNK: usize = 8;
    pub const CHUNKS: usize = L1_SIZE / CHUNK;

    pub unsafe fn add_neon(src: &[i16], dst: &mut [i16], add1: &[i16]) {
        for i in 0..CHUNKS {
            let v = vaddq_s16(
                vld1q_s16(src.as_ptr().add(i * CHUNK)),
                vld1q_s16(add1.as_ptr().add(i * CHUNK)),
            );
            vst1q_s16(dst.as_mut_ptr().add(i * CHUNK), v);
        }
    }

    pub unsafe fn sub_neon(src: &[i16], dst: &mut [i16], sub1: &[i16]) {
        for i in 0..CHUNKS {
            let v = vsubq_s16(
                vld1q_s16(src.as_ptr().add(i * CHUNK)),
                vld1q_s16(sub1.as_ptr().add(i * CHUNK)),
            );
            vst1q_s16(dst.as_mut_ptr().add(i * CHUNK), v);
        }
    }

    pub unsafe fn sub_add_neon(src: &[i16], dst: &mut [i16], sub1: &[i16], add1: &[i16]) {
        for i in 0..CHUNKS {
            let v = vsubq_s16(
                vaddq_s16(
                    vld1q_s16(src.as_ptr().add(i * CHUNK)),
                    vld1q_s16(add1.as_ptr().add(i * CHUNK)),
                ),
                vld1q_s16(sub1.as_ptr().add(i * CHUNK)),
            );
            vst1q_s16(dst.as_mut_ptr().add(i * CHUNK), v);
        }
    }

    pub unsafe fn sub_sub_add_neon(
        src: &[i16],
        dst: &mut [i16],
        sub1: &[i16],
        sub2: &[i16],
        add1: &[i16],
    ) {
        for i in 0..CHUNKS {
            let v = vsubq_s16(
                vsubq_s16(
                    vaddq_s16(
                        vld1q_s16(src.as_ptr().add(i * CHUNK)),
                        vld1q_s16(add1.as_ptr().add(i * CHUNK)),
                    ),
                    vld1q_s16(sub1.as_ptr().add(i * CHUNK)),
                ),
                vld1q_s16(sub2.as_ptr().add(i * CHUNK)),
            );
            vst1q_s16(dst.as_mut_ptr().add(i * CHUNK), v);
        }
    }

    pub unsafe fn sub_sub_add_add_neon(
        src: &[i16],
        dst: &mut [i16],
        sub1: &[i16],
        sub2: &[i16],
        add1: &[i16],
        add2: &[i16],
    ) {
        for i in 0..CHUNKS {
            let v = vsubq_s16(
                vsubq_s16(
                    vaddq_s16(
                        vaddq_s16(
                            vld1q_s16(src.as_ptr().add(i * CHUNK)),
                            vld1q_s16(add1.as_ptr().add(i * CHUNK)),
                        ),
                        vld1q_s16(add2.as_ptr().add(i * CHUNK)),
                    ),
                    vld1q_s16(sub1.as_ptr().add(i * CHUNK)),
                ),
                vld1q_s16(sub2.as_ptr().add(i * CHUNK)),
            );
            vst1q_s16(dst.as_mut_ptr().add(i * CHUNK), v);
        }
    }
}

#[cfg(target_arch = "aarch64")]
use neon::{add_neon, sub_add_neon, sub_neon, sub_sub_add_add_neon, sub_sub_add_neon};

#[cfg(test)]
mod tests {
    use super::*;

    fn slab(f: impl Fn(usize) -> i16) -> Vec<i16> {
        (0..L1_SIZE).map(f).collect()
    }

    #[test]
    fn primitives_match_reference() {
        let src = slab(|i| (i as i16).wrapping_mul(7));
        let a1 = slab(|i| (i as i16).wrapping_mul(3));
        let a2 = slab(|i| (i as i16).wrapping_sub(100));
        let s1 = slab(|i| (i as i16).wrapping_mul(5));
        let s2 = slab(|i| (i as i16).wrapping_add(9));
        let mut dst = vec![0i16; L1_SIZE];

        sub_sub_add_add(&src, &mut dst, &s1, &s2, &a1, &a2);
        for i in 0..L1_SIZE {
            let want = src[i]
                .wrapping_add(a1[i])
                .wrapping_add(a2[i])
                .wrapping_sub(s1[i])
                .wrapping_sub(s2[i]);
            assert_eq!(dst[i], want, "lane {i}");
        }

        sub_add(&src, &mut dst, &s1, &a1);
        for i in 0..L1_SIZE {
            assert_eq!(dst[i], src[i].wrapping_add(a1[i]).wrapping_sub(s1[i]));
        }

        add(&src, &mut dst, &a1);
        for i in 0..L1_SIZE {
            assert_eq!(dst[i], src[i].wrapping_add(a1[i]));
        }

        sub(&src, &mut dst, &s1);
        for i in 0..L1_SIZE {
            assert_eq!(dst[i], src[i].wrapping_sub(s1[i]));
        }

        sub_sub_add(&src, &mut dst, &s1, &s2, &a1);
        for i in 0..L1_SIZE {
            assert_eq!(
                dst[i],
                src[i].wrapping_add(a1[i]).wrapping_sub(s1[i]).wrapping_sub(s2[i])
            );
        }
    }
}
