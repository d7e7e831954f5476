//! Strided dense GEMM used by the host kernels for `SP` and `DP`.
//!
//! `C = alpha * A * B + beta * C` with arbitrary row/column strides:
//! - default: a fused multiply-add triple loop
//! - optional: `matrixmultiply::{sgemm, dgemm}` via the `matrixmultiply` feature
//!
//! Both sum in a different order (and rounding) from the reference loop, so
//! the host kernels for real types show a small, non-zero error.

macro_rules! strided_gemm {
    ($name:ident, $t:ty, $mm:ident) => {
        #[allow(clippy::too_many_arguments)]
        #[inline]
        pub(crate) fn $name(
            m: usize,
            n: usize,
            k: usize,
            alpha: $t,
            a: &[$t],
            rsa: usize,
            csa: usize,
            b: &[$t],
            rsb: usize,
            csb: usize,
            beta: $t,
            c: &mut [$t],
            rsc: usize,
            csc: usize,
        ) {
            debug_assert!(m > 0 && n > 0 && k > 0);
            debug_assert!(a.len() > (m - 1) * rsa + (k - 1) * csa);
            debug_assert!(b.len() > (k - 1) * rsb + (n - 1) * csb);
            debug_assert!(c.len() > (m - 1) * rsc + (n - 1) * csc);

            #[cfg(feature = "matrixmultiply")]
            {
                // SAFETY: the debug assertions above hold for every caller; all
                // strided accesses stay inside the three slices.
                unsafe {
                    matrixmultiply::$mm(
                        m,
                        k,
                        n,
                        alpha,
                        a.as_ptr(),
                        rsa as isize,
                        csa as isize,
                        b.as_ptr(),
                        rsb as isize,
                        csb as isize,
                        beta,
                        c.as_mut_ptr(),
                        rsc as isize,
                        csc as isize,
                    );
                }
            }

            #[cfg(not(feature = "matrixmultiply"))]
            for j in 0..n {
                for i in 0..m {
                    let mut acc: $t = 0.0;
                    for p in 0..k {
                        acc = a[i * rsa + p * csa].mul_add(b[p * rsb + j * csb], acc);
                    }
                    let idx = i * rsc + j * csc;
                    c[idx] = alpha * acc + beta * c[idx];
                }
            }
        }
    };
}

strided_gemm!(gemm_f32, f32, sgemm);
strided_gemm!(gemm_f64, f64, dgemm);
