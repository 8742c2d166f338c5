use std::{fmt, num::ParseFloatError, ops, str::FromStr};

/// Tolerance for parallel rays, degenerate triangles and self-intersection
/// offsets.
pub const EPSILON: f64 = 1e-6;

/// Maximum deviation of the barycentric weights' sum from one.
const BARYCENTRIC_TOLERANCE: f64 = 1e-3;

#[derive(Clone, Copy, PartialEq, Debug, Default)]
#[allow(non_camel_case_types)]
pub struct v64 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// {0}
#[derive(Debug, displaydoc::Display)]
pub struct ParseVectorError(ParseVectorErrorRepr);

#[derive(Debug, displaydoc::Display)]
enum ParseVectorErrorRepr {
    /// {0}
    ParseFloatError(ParseFloatError),
    /// expected three coma-separated coordinates
    InvalidFormat,
}

/// A ray with a normalized direction, tagged with its reflection depth.
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    origin: v64,
    dir: v64,
    depth: u32,
}

/// Right-handed orthonormal camera frame: `u` right, `v` up, `w` backwards.
#[derive(Clone, Copy, Debug)]
pub struct Basis {
    pub u: v64,
    pub v: v64,
    pub w: v64,
}

/// Accepted ray-triangle intersection.
///
/// `alpha` and `beta` weigh the second and third vertex, the first vertex
/// gets [`TriangleHit::gamma`].
#[derive(Clone, Copy, Debug)]
pub struct TriangleHit {
    pub t: f64,
    pub alpha: f64,
    pub beta: f64,
}

pub const fn v64(x: f64, y: f64, z: f64) -> v64 {
    v64 { x, y, z }
}

impl v64 {
    pub const ZERO: v64 = v64(0.0, 0.0, 0.0);

    pub fn xyz(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
    /// Scales to unit length. Vectors shorter than [`EPSILON`] are returned
    /// unchanged.
    pub fn to_unit(self) -> v64 {
        let norm = self.norm();
        if norm < EPSILON {
            return self;
        }
        self / norm
    }
    pub fn norm(self) -> f64 {
        self.norm_squared().sqrt()
    }
    pub fn norm_squared(self) -> f64 {
        dot(self, self)
    }
}

impl fmt::Display for v64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.xyz();
        write!(f, "{x},{y},{z}")
    }
}

impl FromStr for v64 {
    type Err = ParseVectorError;

    fn from_str(s: &str) -> Result<v64, ParseVectorError> {
        let [x, y, z] = split_n::<3>(s, ',')
            .ok_or(ParseVectorErrorRepr::InvalidFormat)?
            .map(|it| it.parse::<f64>().map_err(ParseVectorErrorRepr::ParseFloatError));
        Ok(v64(x?, y?, z?))
    }
}

fn split_n<const N: usize>(s: &str, p: char) -> Option<[&str; N]> {
    let mut components = s.split(p);
    let mut res = [""; N];
    for slot in res.iter_mut() {
        *slot = components.next()?;
    }
    if components.next().is_some() {
        return None;
    }
    Some(res)
}

pub fn dot(lhs: v64, rhs: v64) -> f64 {
    lhs.x * rhs.x + lhs.y * rhs.y + lhs.z * rhs.z
}
pub fn cross(lhs: v64, rhs: v64) -> v64 {
    let [lx, ly, lz] = lhs.xyz();
    let [rx, ry, rz] = rhs.xyz();
    v64(ly * rz - lz * ry, -(lx * rz - lz * rx), lx * ry - ly * rx)
}
/// Mirrors `incident` about the plane with normal `n`.
pub fn reflect(incident: v64, n: v64) -> v64 {
    incident - n * (2.0 * dot(incident, n))
}

impl ops::Neg for v64 {
    type Output = v64;

    fn neg(self) -> v64 {
        v64(-self.x, -self.y, -self.z)
    }
}

impl ops::Add for v64 {
    type Output = v64;

    fn add(self, rhs: v64) -> v64 {
        v64(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl ops::Sub for v64 {
    type Output = v64;

    fn sub(self, rhs: v64) -> v64 {
        v64(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl ops::Div<f64> for v64 {
    type Output = v64;

    fn div(self, c: f64) -> v64 {
        let r = 1.0 / c;
        v64(self.x * r, self.y * r, self.z * r)
    }
}

impl ops::Mul<f64> for v64 {
    type Output = v64;

    fn mul(self, c: f64) -> v64 {
        v64(self.x * c, self.y * c, self.z * c)
    }
}

impl ops::Mul<v64> for f64 {
    type Output = v64;

    fn mul(self, v: v64) -> v64 {
        v * self
    }
}

impl From<ParseVectorErrorRepr> for ParseVectorError {
    fn from(repr: ParseVectorErrorRepr) -> ParseVectorError {
        ParseVectorError(repr)
    }
}

impl Ray {
    pub fn new(origin: v64, dir: v64) -> Ray {
        let dir = dir.to_unit();
        Ray { origin, dir, depth: 0 }
    }

    pub fn from_to(from: v64, to: v64) -> Ray {
        Ray::new(from, to - from)
    }

    pub fn with_depth(self, depth: u32) -> Ray {
        Ray { depth, ..self }
    }

    pub fn origin(&self) -> v64 {
        self.origin
    }

    pub fn dir(&self) -> v64 {
        self.dir
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn at(&self, dt: f64) -> v64 {
        self.origin + self.dir * dt
    }
}

impl Basis {
    /// Returns `None` when `gaze` is zero or parallel to `up`.
    pub fn new(gaze: v64, up: v64) -> Option<Basis> {
        if gaze.norm() < EPSILON || up.norm() < EPSILON {
            return None;
        }
        let w = (-gaze).to_unit();
        let u = cross(up.to_unit(), w);
        if u.norm() < EPSILON {
            return None;
        }
        let u = u.to_unit();
        let v = cross(w, u);
        Some(Basis { u, v, w })
    }
}

impl TriangleHit {
    pub fn gamma(&self) -> f64 {
        1.0 - self.alpha - self.beta
    }
}

/// Intersects `ray` with the triangle `v`, weighing vertices by the areas of
/// the opposite sub-triangles.
pub fn intersect_triangle(ray: &Ray, v: [v64; 3]) -> Option<TriangleHit> {
    let [v0, v1, v2] = v;
    let n = cross(v1 - v0, v2 - v0);
    let n_dot_dir = dot(n, ray.dir());
    if n_dot_dir.abs() < EPSILON {
        return None;
    }
    let t = dot(n, v0 - ray.origin()) / n_dot_dir;
    if t < EPSILON {
        return None;
    }
    let area = n.norm() / 2.0;
    if area < EPSILON {
        return None;
    }

    let p = ray.at(t);
    let sub_area = |a: v64, b: v64| cross(a - p, b - p).norm() / 2.0;
    let gamma = sub_area(v1, v2) / area;
    let alpha = sub_area(v2, v0) / area;
    let beta = sub_area(v0, v1) / area;

    if (alpha + beta + gamma - 1.0).abs() > BARYCENTRIC_TOLERANCE {
        return None;
    }
    if alpha < 0.0 || beta < 0.0 || gamma < 0.0 {
        return None;
    }
    Some(TriangleHit { t, alpha, beta })
}
