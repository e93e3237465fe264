//! Parametric curves sampled at a quality-dependent resolution.
//!
//! A curve is evaluated by sample index rather than by parameter: `get_k(q)` says how many samples
//! the curve has at quality `q` and `eval(i, q)` returns sample `i` of those. Both are pure.

use std::sync::Arc;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use na::{Point3, Vector3};
use thiserror::Error;

/// Vectors shorter than this (or closer to parallel than this, after normalizing) make an arc
/// degenerate.
const ARC_EPS: f32 = 1e-6;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CurveError {
    #[error("arc endpoints are colinear with the center, the arc plane is undefined")]
    DegenerateArc,
    #[error("a composite curve needs at least one part")]
    EmptyComposite,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Curve {
    Linear { a: Point3<f32>, b: Point3<f32> },
    Quadratic { a: Point3<f32>, b: Point3<f32>, c: Point3<f32> },
    Cubic(CubicCurve),
    Arc(ArcCurve),
    Composite(CompositeCurve),
}

impl Curve {
    pub fn linear(a: Point3<f32>, b: Point3<f32>) -> Self {
        Curve::Linear { a, b }
    }

    pub fn quadratic(a: Point3<f32>, b: Point3<f32>, c: Point3<f32>) -> Self {
        Curve::Quadratic { a, b, c }
    }

    pub fn cubic(a: Point3<f32>, b: Point3<f32>, c: Point3<f32>, d: Point3<f32>) -> Self {
        Curve::Cubic(CubicCurve { a, b, c, d })
    }

    /// Circular arc from `a` to `b` about `center`.
    ///
    /// Fails if `a - center` and `b - center` are parallel (or either is zero), since the plane
    /// of the arc is then undefined.
    pub fn arc(a: Point3<f32>, b: Point3<f32>, center: Point3<f32>) -> Result<Self, CurveError> {
        ArcCurve::new(a, b, center).map(Curve::Arc)
    }

    pub fn composite(parts: Vec<Arc<Curve>>) -> Result<Self, CurveError> {
        if parts.is_empty() {
            return Err(CurveError::EmptyComposite);
        }
        Ok(Curve::Composite(CompositeCurve { parts }))
    }

    /// Number of samples at quality `q`. Non-decreasing in `q`; `q` is clamped to `[0, 1]`.
    pub fn get_k(&self, q: f32) -> usize {
        let q = q.clamp(0., 1.);
        let grow = |base: usize, extra: f32| base + (extra * q).floor() as usize;
        match self {
            Curve::Linear { .. } => grow(2, 6.),
            Curve::Quadratic { .. } => grow(3, 13.),
            Curve::Cubic(_) => grow(4, 20.),
            Curve::Arc(_) => grow(3, 29.),
            Curve::Composite(c) => c.get_k(q),
        }
    }

    /// Sample `i` out of `get_k(q)`. Indices past the end return the last sample.
    pub fn eval(&self, i: usize, q: f32) -> Point3<f32> {
        match self {
            Curve::Composite(c) => c.eval(i, q),
            _ => self.at(sample_t(i, self.get_k(q))),
        }
    }

    /// Evaluates a primitive curve at parameter `t` in `[0, 1]`. Composites are evaluated over
    /// their concatenated parameter domains, each part getting an equal share.
    pub fn at(&self, t: f32) -> Point3<f32> {
        match self {
            Curve::Linear { a, b } => lerp(a, b, t),
            Curve::Quadratic { a, b, c } => {
                let ab = lerp(a, b, t);
                let bc = lerp(b, c, t);
                lerp(&ab, &bc, t)
            }
            Curve::Cubic(c) => c.at(t),
            Curve::Arc(arc) => arc.at(t),
            Curve::Composite(c) => {
                let n = c.parts.len();
                let scaled = (t.clamp(0., 1.) * n as f32).min(n as f32 - 1e-6);
                let idx = (scaled.floor() as usize).min(n - 1);
                c.parts[idx].at(scaled - idx as f32)
            }
        }
    }
}

fn lerp(a: &Point3<f32>, b: &Point3<f32>, t: f32) -> Point3<f32> {
    a + (b - a) * t
}

fn sample_t(i: usize, k: usize) -> f32 {
    if k <= 1 {
        return 0.;
    }
    i.min(k - 1) as f32 / (k - 1) as f32
}

/// Cubic Bézier, evaluated by repeated linear interpolation.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicCurve {
    pub a: Point3<f32>,
    pub b: Point3<f32>,
    pub c: Point3<f32>,
    pub d: Point3<f32>,
}

impl CubicCurve {
    /// Starts a new segment at this one's end point, mirroring the last control point so the
    /// tangent is continuous across the join.
    pub fn continued(&self, c: Point3<f32>, d: Point3<f32>) -> CubicCurve {
        CubicCurve {
            a: self.d,
            b: self.d + (self.d - self.c),
            c,
            d,
        }
    }

    pub fn at(&self, t: f32) -> Point3<f32> {
        let ab = lerp(&self.a, &self.b, t);
        let bc = lerp(&self.b, &self.c, t);
        let cd = lerp(&self.c, &self.d, t);
        let abc = lerp(&ab, &bc, t);
        let bcd = lerp(&bc, &cd, t);
        lerp(&abc, &bcd, t)
    }
}

/// Arc about `center`, rotating `u` towards `v` by `t * angle`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArcCurve {
    center: Point3<f32>,
    u: Vector3<f32>,
    v: Vector3<f32>,
    angle: f32,
    r0: f32,
    r1: f32,
}

impl ArcCurve {
    pub fn new(a: Point3<f32>, b: Point3<f32>, center: Point3<f32>) -> Result<Self, CurveError> {
        let da = a - center;
        let db = b - center;
        let (r0, r1) = (da.norm(), db.norm());
        if r0 < ARC_EPS || r1 < ARC_EPS {
            return Err(CurveError::DegenerateArc);
        }
        let u = da / r0;
        let ortho = db - u * db.dot(&u);
        let v = ortho.try_normalize(ARC_EPS * r1).ok_or(CurveError::DegenerateArc)?;
        let angle = (da.dot(&db) / (r0 * r1)).clamp(-1., 1.).acos();
        Ok(Self { center, u, v, angle, r0, r1 })
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn at(&self, t: f32) -> Point3<f32> {
        let theta = t * self.angle;
        let r = self.r0 + (self.r1 - self.r0) * t;
        self.center + (self.u * theta.cos() + self.v * theta.sin()) * r
    }
}

/// Concatenation of curves. Parts are shared, the same primitive can appear in several
/// composites.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeCurve {
    parts: Vec<Arc<Curve>>,
}

impl CompositeCurve {
    pub fn parts(&self) -> &[Arc<Curve>] {
        &self.parts
    }

    pub fn get_k(&self, q: f32) -> usize {
        self.parts.iter().map(|c| c.get_k(q)).sum()
    }

    /// Finds which part owns global sample `i`, and the index within it.
    ///
    /// Linear scan over the cumulative counts; composites only ever have a handful of parts.
    pub fn locate(&self, i: usize, q: f32) -> Option<(usize, usize)> {
        let mut start = 0;
        for (idx, part) in self.parts.iter().enumerate() {
            let k = part.get_k(q);
            if i < start + k {
                return Some((idx, i - start));
            }
            start += k;
        }
        None
    }

    pub fn eval(&self, i: usize, q: f32) -> Point3<f32> {
        match self.locate(i, q) {
            Some((idx, local)) => self.parts[idx].eval(local, q),
            None => {
                let last = &self.parts[self.parts.len() - 1];
                last.eval(last.get_k(q).saturating_sub(1), q)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point3<f32>, b: Point3<f32>) -> bool {
        (a - b).norm() < 1e-5
    }

    fn quarter_arcs() -> Vec<Arc<Curve>> {
        let c = Point3::origin();
        let pts = [
            Point3::new(1., 0., 0.),
            Point3::new(0., 1., 0.),
            Point3::new(-1., 0., 0.),
            Point3::new(0., -1., 0.),
        ];
        (0..4)
            .map(|i| Arc::new(Curve::arc(pts[i], pts[(i + 1) % 4], c).unwrap()))
            .collect()
    }

    #[test]
    fn linear_sample_count_grows_from_2_to_8() {
        let l = Curve::linear(Point3::origin(), Point3::new(1., 0., 0.));
        assert_eq!(l.get_k(0.), 2);
        assert_eq!(l.get_k(1.), 8);
        assert_eq!(l.get_k(2.), 8);
        let mut last = 0;
        for step in 0..=20 {
            let k = l.get_k(step as f32 / 20.);
            assert!(k >= last);
            last = k;
        }
    }

    #[test]
    fn linear_interpolates_endpoints() {
        let l = Curve::linear(Point3::new(1., 2., 3.), Point3::new(3., 2., 1.));
        let k = l.get_k(0.5);
        assert!(close(l.eval(0, 0.5), Point3::new(1., 2., 3.)));
        assert!(close(l.eval(k - 1, 0.5), Point3::new(3., 2., 1.)));
        assert!(close(l.eval(k + 10, 0.5), Point3::new(3., 2., 1.)));
    }

    #[test]
    fn composite_k_is_sum_of_parts() {
        let mut parts = quarter_arcs();
        parts.push(Arc::new(Curve::linear(Point3::origin(), Point3::new(0., 0., 1.))));
        let comp = Curve::composite(parts.clone()).unwrap();
        for step in 0..=10 {
            let q = step as f32 / 10.;
            let sum: usize = parts.iter().map(|p| p.get_k(q)).sum();
            assert_eq!(comp.get_k(q), sum);
        }
    }

    #[test]
    fn composite_locates_parts_in_order() {
        let parts = quarter_arcs();
        let comp = CompositeCurve { parts: parts.clone() };
        let k0 = parts[0].get_k(0.);
        assert_eq!(comp.locate(0, 0.), Some((0, 0)));
        assert_eq!(comp.locate(k0 - 1, 0.), Some((0, k0 - 1)));
        assert_eq!(comp.locate(k0, 0.), Some((1, 0)));
        assert_eq!(comp.locate(comp.get_k(0.), 0.), None);
        assert!(close(comp.eval(k0, 0.), Point3::new(0., 1., 0.)));
    }

    #[test]
    fn arc_stays_on_circle() {
        let arc = Curve::arc(Point3::new(2., 0., 0.), Point3::new(0., 2., 0.), Point3::origin()).unwrap();
        let k = arc.get_k(1.);
        for i in 0..k {
            let p = arc.eval(i, 1.);
            assert!((p.coords.norm() - 2.).abs() < 1e-5);
        }
        assert!(close(arc.eval(0, 1.), Point3::new(2., 0., 0.)));
        assert!(close(arc.eval(k - 1, 1.), Point3::new(0., 2., 0.)));
    }

    #[test]
    fn arc_midpoint_bisects_angle() {
        let arc = ArcCurve::new(Point3::new(1., 0., 0.), Point3::new(0., 0., 1.), Point3::origin()).unwrap();
        let s = std::f32::consts::FRAC_1_SQRT_2;
        assert!(close(arc.at(0.5), Point3::new(s, 0., s)));
        assert!((arc.angle() - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn colinear_arc_fails_fast() {
        let c = Point3::origin();
        assert_eq!(
            Curve::arc(Point3::new(1., 0., 0.), Point3::new(-1., 0., 0.), c),
            Err(CurveError::DegenerateArc)
        );
        assert_eq!(
            Curve::arc(Point3::new(1., 0., 0.), Point3::new(3., 0., 0.), c),
            Err(CurveError::DegenerateArc)
        );
        assert_eq!(Curve::arc(c, Point3::new(0., 1., 0.), c), Err(CurveError::DegenerateArc));
    }

    #[test]
    fn empty_composite_is_rejected() {
        assert_eq!(Curve::composite(vec![]), Err(CurveError::EmptyComposite));
    }

    #[test]
    fn quadratic_and_cubic_hit_endpoints() {
        let a = Point3::new(0., 0., 0.);
        let b = Point3::new(1., 1., 0.);
        let c = Point3::new(2., 0., 0.);
        let quad = Curve::quadratic(a, b, c);
        assert!(close(quad.at(0.), a));
        assert!(close(quad.at(1.), c));
        assert!(close(quad.at(0.5), Point3::new(1., 0.5, 0.)));

        let d = Point3::new(3., 1., 0.);
        let cubic = Curve::cubic(a, b, c, d);
        assert!(close(cubic.eval(0, 0.3), a));
        assert!(close(cubic.eval(cubic.get_k(0.3) - 1, 0.3), d));
    }

    #[test]
    fn continued_cubic_is_tangent_continuous() {
        let first = CubicCurve {
            a: Point3::new(0., 0., 0.),
            b: Point3::new(1., 1., 0.),
            c: Point3::new(2., 1., 0.),
            d: Point3::new(3., 0., 0.),
        };
        let second = first.continued(Point3::new(5., -1., 0.), Point3::new(6., 0., 0.));
        assert!(close(second.a, first.d));
        let out_tangent = first.d - first.c;
        let in_tangent = second.b - second.a;
        assert!((out_tangent - in_tangent).norm() < 1e-6);
    }
}
