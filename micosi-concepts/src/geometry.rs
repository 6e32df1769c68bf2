//! Geometric primitives and the intersection/distance routines used by the stepping algorithm.
//!
//! All routines are pure functions of their arguments and of the threshold
//! [Geometry::epsilon] below which a length is treated as zero.

use crate::{Mat3, Real, Vec3, PI};

/// Line segment defined by two points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    /// First endpoint
    pub p1: Vec3,
    /// Second endpoint
    pub p2: Vec3,
}

impl Segment {
    /// Creates a segment `[p1, p2]`.
    pub fn new(p1: Vec3, p2: Vec3) -> Self {
        Self { p1, p2 }
    }
}

/// Plane defined by one anchor point and a (not necessarily normalized) normal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    /// Anchor point
    pub p: Vec3,
    /// Normal vector
    pub n: Vec3,
}

/// Rectangle defined by one corner and two orthogonal non-zero edge vectors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rectangle {
    /// Corner
    pub p: Vec3,
    /// First edge
    pub v1: Vec3,
    /// Second edge
    pub v2: Vec3,
}

/// Half of a filled circle spanned by `p - r1`, `p + r2`, `p + r1`.
///
/// The lengths of `r1` and `r2` must be equal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SemiCircle {
    /// Center
    pub p: Vec3,
    /// Radius along the cut of the circle
    pub r1: Vec3,
    /// Radius pointing into the kept half
    pub r2: Vec3,
}

/// Half of an open cylinder with axis `[p1, p2]`.
/// The kept half is the one into which `r` points; `|r|` is the radius.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SemiTube {
    /// Start of the axis
    pub p1: Vec3,
    /// End of the axis
    pub p2: Vec3,
    /// Radius pointing into the kept half
    pub r: Vec3,
}

/// Geometry kernel parametrized by a zero-length threshold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    eps: Real,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            eps: Real::MIN_POSITIVE,
        }
    }
}

impl Geometry {
    /// Creates a kernel which treats lengths below `eps` as zero.
    /// Non-positive values fall back to the smallest positive [Real].
    pub fn new(eps: Real) -> Self {
        Self {
            eps: if eps > 0.0 { eps } else { Real::MIN_POSITIVE },
        }
    }

    /// Threshold below which lengths are treated as zero.
    pub fn epsilon(&self) -> Real {
        self.eps
    }

    /// Distance from `point` to the closest point of `segment`.
    pub fn distance_point_segment(&self, point: &Vec3, segment: &Segment) -> Real {
        let eb = segment.p2 - segment.p1;
        let ebl = eb.norm();
        if ebl < self.eps {
            return (point - segment.p1).norm();
        }
        let proj = eb.dot(&(point - segment.p1)) / ebl;
        if proj >= 0.0 && proj <= ebl {
            let foot = segment.p1 + eb * (proj / ebl);
            (point - foot).norm()
        } else if proj >= 0.0 {
            (point - segment.p2).norm()
        } else {
            (point - segment.p1).norm()
        }
    }

    fn endpoint_distances(&self, s1: &Segment, s2: &Segment) -> Real {
        self.distance_point_segment(&s1.p1, s2)
            .min(self.distance_point_segment(&s1.p2, s2))
            .min(self.distance_point_segment(&s2.p1, s1))
            .min(self.distance_point_segment(&s2.p2, s1))
    }

    /// Minimal distance between two segments.
    pub fn distance_segments(&self, s1: &Segment, s2: &Segment) -> Real {
        let d1 = s1.p2 - s1.p1;
        let d2 = s2.p2 - s2.p1;
        let l1 = d1.norm();
        let l2 = d2.norm();
        if l1 < self.eps {
            return self.distance_point_segment(&s1.p1, s2);
        }
        if l2 < self.eps {
            return self.distance_point_segment(&s2.p1, s1);
        }

        // Local frame: e1 along the first segment, e3 normal to both.
        let e1 = d1 / l1;
        let normal = e1.cross(&d2);
        if normal.norm() < self.eps {
            return self.endpoint_distances(s1, s2);
        }
        let e3 = normal.normalize();
        let e2 = e3.cross(&e1);

        let w = s2.p1 - s1.p1;
        let (bx, by) = (d2.dot(&e1), d2.dot(&e2));
        let (wx, wy) = (w.dot(&e1), w.dot(&e2));
        // s1.p1 + t * d1 == s2.p1 + s * d2 inside the (e1, e2) plane
        let s = -wy / by;
        let t = (wx + s * bx) / l1;
        if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&s) {
            w.dot(&e3).abs()
        } else {
            self.endpoint_distances(s1, s2)
        }
    }

    /// Approximate length of the shortest arc from `p1` to `p2` on the circle around `center`.
    ///
    /// The arc is estimated from the chord `c` between the points and the doubled half-chord `h`
    /// through the arc midpoint as
    /// \\begin{equation}
    ///     L \approx h + \frac{h - c}{3}.
    /// \\end{equation}
    /// Nearly antipodal points yield half the circumference.
    pub fn arc_length(&self, center: &Vec3, r: Real, p1: &Vec3, p2: &Vec3) -> Real {
        if r <= 0.0 || (p2 - p1).norm() < self.eps {
            return 0.0;
        }
        let mid = (p1 - center) + (p2 - center);
        let mid_len = mid.norm();
        if mid_len < r * 1e-3 {
            return PI * r;
        }
        let mid = mid * (r / mid_len) + center;
        let half = (mid - p1).norm() * 2.0;
        half + (half - (p2 - p1).norm()) / 3.0
    }

    /// Intersection point of a segment and a plane.
    ///
    /// Segments lying completely on one side of the plane or inside the plane do not intersect.
    pub fn intersect_plane(&self, seg: &Segment, plane: &Plane) -> Option<Vec3> {
        let offset = plane.n.dot(&plane.p);
        let p1_proj = plane.n.dot(&seg.p1);
        let p2_proj = plane.n.dot(&seg.p2);
        if (p1_proj > offset && p2_proj > offset) || (p1_proj < offset && p2_proj < offset) {
            return None;
        }
        let dir = seg.p2 - seg.p1;
        let div = dir.dot(&plane.n);
        if div == 0.0 {
            return None;
        }
        let t = (offset - p1_proj) / div;
        Some(dir * t + seg.p1)
    }

    /// Intersection point of a segment and a rectangle.
    pub fn intersect_rectangle(&self, seg: &Segment, rect: &Rectangle) -> Option<Vec3> {
        let plane = Plane {
            p: rect.p,
            n: rect.v1.cross(&rect.v2).normalize(),
        };
        let ipoint = self.intersect_plane(seg, &plane)?;
        let v1_proj = rect.v1.dot(&(ipoint - rect.p));
        let v2_proj = rect.v2.dot(&(ipoint - rect.p));
        let inside = v1_proj >= 0.0
            && v1_proj <= rect.v1.norm_squared()
            && v2_proj >= 0.0
            && v2_proj <= rect.v2.norm_squared();
        inside.then_some(ipoint)
    }

    /// Intersection point of a segment and a half disc.
    pub fn intersect_semicircle(&self, seg: &Segment, circle: &SemiCircle) -> Option<Vec3> {
        let plane = Plane {
            p: circle.p,
            n: circle.r1.cross(&circle.r2).normalize(),
        };
        let ipoint = self.intersect_plane(seg, &plane)?;
        let dp = ipoint - circle.p;
        let inside = circle.r2.dot(&dp) >= 0.0 && dp.norm_squared() <= circle.r1.norm_squared();
        inside.then_some(ipoint)
    }

    /// Intersection point of a segment and a half tube.
    ///
    /// Solves `|fi + t * si| = |r|` for the segment parameter `t` where `fi` and `si` are the
    /// components of the segment start and direction orthogonal to the tube axis.
    /// Of the two roots the smaller one inside the segment which lies in the kept half
    /// and between both end caps is returned.
    pub fn intersect_semitube(&self, seg: &Segment, tube: &SemiTube) -> Option<Vec3> {
        let delta = seg.p2 - seg.p1;
        let len = delta.norm();
        let axis = tube.p2 - tube.p1;
        if len < self.eps || axis.norm() < self.eps {
            return None;
        }
        let dir = delta / len;
        let hand_dir = axis.normalize();
        let r_sqr = tube.r.norm_squared();

        let fi = seg.p1 - tube.p1 - hand_dir * seg.p1.dot(&hand_dir)
            + hand_dir * tube.p1.dot(&hand_dir);
        let si = dir - hand_dir * dir.dot(&hand_dir);
        let a = si.dot(&si);
        if a == 0.0 {
            return None;
        }
        let b = 2.0 * fi.dot(&si);
        let c = fi.dot(&fi) - r_sqr;
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            return None;
        }
        let sq = disc.sqrt();
        let roots = [(-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a)];
        let on_segment = [
            roots[0] >= 0.0 && roots[0] <= len,
            roots[1] >= 0.0 && roots[1] <= len,
        ];
        let first = if on_segment[0] { 0 } else { 1 };
        let last = if on_segment[1] { 2 } else { 1 };
        for t in roots.iter().take(last).skip(first) {
            let ipoint = seg.p1 + dir * *t;
            let in_half = (ipoint - tube.p1).dot(&tube.r) > 0.0;
            let between_caps = (ipoint - tube.p1).dot(&axis) >= 0.0
                && (ipoint - tube.p2).dot(&(tube.p1 - tube.p2)) >= 0.0;
            if in_half && between_caps {
                return Some(ipoint);
            }
        }
        None
    }
}

/// Rotation around the x axis.
pub fn rotation_x(angle: Real) -> Mat3 {
    let (s, c) = angle.sin_cos();
    Mat3::new(1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c)
}

/// Rotation around the y axis.
pub fn rotation_y(angle: Real) -> Mat3 {
    let (s, c) = angle.sin_cos();
    Mat3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c)
}

/// Rotation around the z axis.
pub fn rotation_z(angle: Real) -> Mat3 {
    let (s, c) = angle.sin_cos();
    Mat3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
}

/// Combined rotation `Rz(z) * Ry(y) * Rx(x)`.
pub fn rotation_xyz(x: Real, y: Real, z: Real) -> Mat3 {
    rotation_z(z) * rotation_y(y) * rotation_x(x)
}

/// Rotation by `angle` around a normalized `axis`.
pub fn rotation_axis(axis: &Vec3, angle: Real) -> Mat3 {
    let (s, c) = angle.sin_cos();
    let ic = 1.0 - c;
    let (x, y, z) = (axis.x, axis.y, axis.z);
    Mat3::new(
        x * x * ic + c,
        x * y * ic - z * s,
        x * z * ic + y * s,
        x * y * ic + z * s,
        y * y * ic + c,
        y * z * ic - x * s,
        x * z * ic - y * s,
        y * z * ic + x * s,
        z * z * ic + c,
    )
}
