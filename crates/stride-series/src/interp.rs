//! One-dimensional interpolation kernels.

use std::fmt;

/// Interpolation method used by resampling, gap filling and normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Value of the nearest knot; halfway points take the earlier knot.
    Nearest,
    /// Value of the last knot at or before the query.
    Previous,
    /// Value of the first knot at or after the query.
    Next,
    /// Piecewise linear.
    #[default]
    Linear,
    /// Natural cubic spline (zero second derivative at both ends).
    Cubic,
    /// Monotone piecewise cubic Hermite (Fritsch-Carlson slopes).
    Pchip,
}

impl Interpolation {
    /// Evaluate the interpolant through `(x, y)` at every target.
    ///
    /// `x` must be non-decreasing and as long as `y`; repeated knots keep
    /// their first value. A target equal to a knot returns that knot's value
    /// exactly. Targets outside `[x[0], x[n-1]]` are NaN unless `extrapolate`.
    /// With no knots every target is NaN.
    #[must_use]
    pub fn interpolate(self, x: &[f64], y: &[f64], targets: &[f64], extrapolate: bool) -> Vec<f64> {
        debug_assert_eq!(x.len(), y.len());
        match Interpolant::new(self, x, y) {
            Some(interpolant) => targets
                .iter()
                .map(|&t| interpolant.eval(t, extrapolate))
                .collect(),
            None => vec![f64::NAN; targets.len()],
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Nearest => "nearest",
            Self::Previous => "previous",
            Self::Next => "next",
            Self::Linear => "linear",
            Self::Cubic => "cubic",
            Self::Pchip => "pchip",
        };
        f.write_str(name)
    }
}

/// Interpolant through a fixed set of knots.
#[derive(Debug, Clone)]
pub(crate) struct Interpolant {
    kind: Interpolation,
    x: Vec<f64>,
    y: Vec<f64>,
    /// Second derivatives for `Cubic`, slopes for `Pchip`, empty otherwise.
    coef: Vec<f64>,
}

impl Interpolant {
    /// Build the interpolant, or `None` when there is no knot.
    pub(crate) fn new(kind: Interpolation, x: &[f64], y: &[f64]) -> Option<Self> {
        let mut xs = Vec::with_capacity(x.len());
        let mut ys = Vec::with_capacity(y.len());
        for (&xi, &yi) in x.iter().zip(y) {
            if xs.last() != Some(&xi) {
                xs.push(xi);
                ys.push(yi);
            }
        }
        if xs.is_empty() {
            return None;
        }
        let coef = match kind {
            Interpolation::Cubic => natural_spline(&xs, &ys),
            Interpolation::Pchip => pchip_slopes(&xs, &ys),
            _ => Vec::new(),
        };
        Some(Self {
            kind,
            x: xs,
            y: ys,
            coef,
        })
    }

    pub(crate) fn eval(&self, t: f64, extrapolate: bool) -> f64 {
        let n = self.x.len();
        let (first, last) = (self.x[0], self.x[n - 1]);
        if t.is_nan() || (!extrapolate && (t < first || t > last)) {
            return f64::NAN;
        }
        if let Ok(i) = self.x.binary_search_by(|v| v.total_cmp(&t)) {
            return self.y[i];
        }
        if n == 1 {
            return self.y[0];
        }
        if t < first || t > last {
            match self.kind {
                Interpolation::Nearest | Interpolation::Previous | Interpolation::Next => {
                    return if t < first { self.y[0] } else { self.y[n - 1] };
                }
                _ => {}
            }
        }
        let k = self
            .x
            .partition_point(|&v| v <= t)
            .saturating_sub(1)
            .min(n - 2);
        let (x0, x1, y0, y1) = (self.x[k], self.x[k + 1], self.y[k], self.y[k + 1]);
        let h = x1 - x0;
        match self.kind {
            Interpolation::Nearest => {
                if t - x0 <= x1 - t {
                    y0
                } else {
                    y1
                }
            }
            Interpolation::Previous => y0,
            Interpolation::Next => y1,
            Interpolation::Linear => y0 + (y1 - y0) * (t - x0) / h,
            Interpolation::Cubic => {
                let (m0, m1) = (self.coef[k], self.coef[k + 1]);
                let a = x1 - t;
                let b = t - x0;
                m0 * a.powi(3) / (6.0 * h)
                    + m1 * b.powi(3) / (6.0 * h)
                    + (y0 / h - m0 * h / 6.0) * a
                    + (y1 / h - m1 * h / 6.0) * b
            }
            Interpolation::Pchip => {
                let (d0, d1) = (self.coef[k], self.coef[k + 1]);
                let s = (t - x0) / h;
                let s2 = s * s;
                let s3 = s2 * s;
                (2.0 * s3 - 3.0 * s2 + 1.0) * y0
                    + (s3 - 2.0 * s2 + s) * h * d0
                    + (-2.0 * s3 + 3.0 * s2) * y1
                    + (s3 - s2) * h * d1
            }
        }
    }
}

/// Second derivatives of the natural cubic spline through strictly
/// increasing knots, by the tridiagonal (Thomas) algorithm.
fn natural_spline(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let mut m = vec![0.0; n];
    if n < 3 {
        return m;
    }
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    // forward sweep over the interior knots 1..n-1
    let mut diag = vec![0.0; n];
    let mut rhs = vec![0.0; n];
    for i in 1..n - 1 {
        let r = 6.0 * ((y[i + 1] - y[i]) / h[i] - (y[i] - y[i - 1]) / h[i - 1]);
        let d = 2.0 * (h[i - 1] + h[i]);
        if i == 1 {
            diag[i] = d;
            rhs[i] = r;
        } else {
            let w = h[i - 1] / diag[i - 1];
            diag[i] = d - w * h[i - 1];
            rhs[i] = r - w * rhs[i - 1];
        }
    }
    for i in (1..n - 1).rev() {
        let upper = if i + 1 < n - 1 { h[i] * m[i + 1] } else { 0.0 };
        m[i] = (rhs[i] - upper) / diag[i];
    }
    m
}

/// Fritsch-Carlson slopes with the three-point end conditions.
fn pchip_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let delta: Vec<f64> = (0..n - 1).map(|k| (y[k + 1] - y[k]) / h[k]).collect();
    if n == 2 {
        return vec![delta[0]; 2];
    }
    let mut d = vec![0.0; n];
    for k in 1..n - 1 {
        if delta[k - 1] * delta[k] > 0.0 {
            let w1 = 2.0 * h[k] + h[k - 1];
            let w2 = h[k] + 2.0 * h[k - 1];
            d[k] = (w1 + w2) / (w1 / delta[k - 1] + w2 / delta[k]);
        }
    }
    d[0] = end_slope(h[0], h[1], delta[0], delta[1]);
    d[n - 1] = end_slope(h[n - 2], h[n - 3], delta[n - 2], delta[n - 3]);
    d
}

fn end_slope(h0: f64, h1: f64, m0: f64, m1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * m0 - h0 * m1) / (h0 + h1);
    if d.signum() != m0.signum() || m0 == 0.0 {
        0.0
    } else if m0.signum() != m1.signum() && d.abs() > 3.0 * m0.abs() {
        3.0 * m0
    } else {
        d
    }
}
