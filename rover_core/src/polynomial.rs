//! Fixed-capacity polynomial used for the velocity ↔ duty models.

use crate::util::finite_or_zero;

pub const MAX_DEGREE: usize = 5;

/// `a0 + a1·x + … + an·xⁿ` with n ≤ [`MAX_DEGREE`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Polynomial {
    coeffs: [f32; MAX_DEGREE + 1],
    degree: usize,
}

impl Default for Polynomial {
    fn default() -> Self {
        Self::identity()
    }
}

impl Polynomial {
    /// `p(x) = x`
    pub const fn identity() -> Self {
        let mut coeffs = [0.0; MAX_DEGREE + 1];
        coeffs[1] = 1.0;
        Self { coeffs, degree: 1 }
    }

    /// Build from coefficients in ascending order. Extra terms beyond
    /// [`MAX_DEGREE`] are dropped; non-finite terms become 0. An empty slice is
    /// the zero polynomial.
    pub fn from_coefficients(coeffs: &[f32]) -> Self {
        let mut p = Self {
            coeffs: [0.0; MAX_DEGREE + 1],
            degree: 0,
        };
        p.fill(coeffs.len().saturating_sub(1), coeffs);
        p
    }

    /// Replace the model with the given degree and coefficients.
    ///
    /// A negative degree is ignored and returns false. A degree above
    /// [`MAX_DEGREE`] is clamped; missing coefficients are zero.
    pub fn set(&mut self, degree: i32, coeffs: &[f32]) -> bool {
        let Ok(degree) = usize::try_from(degree) else {
            return false;
        };
        self.fill(degree, coeffs);
        true
    }

    fn fill(&mut self, degree: usize, coeffs: &[f32]) {
        let degree = degree.min(MAX_DEGREE);
        self.coeffs = [0.0; MAX_DEGREE + 1];
        for (dst, src) in self.coeffs.iter_mut().zip(coeffs).take(degree + 1) {
            *dst = finite_or_zero(*src);
        }
        self.degree = degree;
    }

    /// Horner evaluation.
    #[inline]
    pub fn eval(&self, x: f32) -> f32 {
        self.coefficients()
            .iter()
            .rev()
            .fold(0.0, |acc, &a| acc.mul_add(x, a))
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn coefficients(&self) -> &[f32] {
        &self.coeffs[..=self.degree]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 1.5)]
    #[case(1.0, 1.5 - 2.0 + 0.5 + 0.25)]
    #[case(-1.0, 1.5 + 2.0 + 0.5 - 0.25)]
    #[case(2.0, 1.5 - 4.0 + 2.0 + 2.0)]
    #[case(-3.0, 1.5 + 6.0 + 4.5 - 6.75)]
    #[case(0.5, 1.5 - 1.0 + 0.125 + 0.03125)]
    fn cubic_matches_expanded_form(#[case] x: f32, #[case] want: f32) {
        let p = Polynomial::from_coefficients(&[1.5, -2.0, 0.5, 0.25]);
        assert_eq!(p.degree(), 3);
        assert!((p.eval(x) - want).abs() < 1e-5, "p({x}) = {}", p.eval(x));
    }

    #[test]
    fn negative_degree_is_ignored() {
        let mut p = Polynomial::from_coefficients(&[1.0, 2.0]);
        assert!(!p.set(-1, &[9.0]));
        assert_eq!(p.coefficients(), &[1.0, 2.0]);
    }

    #[test]
    fn degree_is_clamped_and_missing_terms_zeroed() {
        let mut p = Polynomial::identity();
        assert!(p.set(9, &[1.0, 1.0]));
        assert_eq!(p.degree(), MAX_DEGREE);
        assert_eq!(p.coefficients(), &[1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        assert!((p.eval(2.0) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn identity_default() {
        let p = Polynomial::default();
        assert_eq!(p.eval(42.5), 42.5);
    }

    #[test]
    fn empty_is_zero() {
        let p = Polynomial::from_coefficients(&[]);
        assert_eq!(p.eval(3.0), 0.0);
        assert_eq!(p.degree(), 0);
    }
}
