use core::{
    fmt,
    iter::Peekable,
    num::{ParseFloatError, ParseIntError},
    str::SplitAsciiWhitespace,
};

use geom::{v64, ParseVectorError};
use mem::{Mem, Oom};

use crate::{
    Camera, Color, Face, InvalidScene, Material, Mesh, NearPlane, ParseColorError, PointLight,
    Scene, TriangularLight, Uv,
};

#[derive(Debug)]
pub struct ParseSceneError<'a> {
    kind: ErrorKind,
    context: [&'a str; 4],
}

#[derive(Debug, displaydoc::Display)]
enum ErrorKind {
    /// unexpected end of file
    UnexpectedEof,
    /// expected `{0}`
    Expected(&'static str),
    /// {0}
    ParseColorError(ParseColorError),
    /// invalid vector: {0}
    ParseVectorError(ParseVectorError),
    /// invalid scalar: {0}
    ParseFloatError(ParseFloatError),
    /// invalid integer: {0}
    ParseIntError(ParseIntError),
    /// invalid resolution, expected `640x480`
    InvalidResolution,
    /// invalid near plane, expected `left,right,bottom,top`
    InvalidNearPlane,
    /// invalid texture coordinate, expected `u,v`
    InvalidUv,
    /// invalid key
    InvalidKey,
    /// out of memory
    Oom(Oom),
    /// invalid mesh face, expected `v/t/n`
    InvalidFace,
    /// invalid mesh face index: {0}
    InvalidFaceIndex(ParseIntError),
    /// material is already defined
    DuplicateMaterial,
    /// camera gaze is zero or parallel to up
    DegenerateCamera,
    /// {0}
    InvalidScene(InvalidScene),
}

pub(crate) fn parse<'m, 'i>(
    mem: &mut Mem<'m>,
    input: &'i str,
) -> Result<Scene<'m>, ParseSceneError<'i>> {
    let mut p = Parser::new(mem, input);
    match scene(&mut p) {
        Ok(res) => Ok(res),
        Err(kind) => Err(ParseSceneError { kind, context: p.context }),
    }
}

impl<'a> ParseSceneError<'a> {
    /// Dotted path of the keys being parsed when the error occurred.
    pub fn context(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.context.iter().copied().take_while(|it| !it.is_empty())
    }
}

impl<'a> fmt::Display for ParseSceneError<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in {}", self.context[0])?;
        for ctx in self.context().skip(1) {
            write!(f, ".{}", ctx)?
        }
        write!(f, ": {}", self.kind)
    }
}

struct Parser<'m, 'i, 'a> {
    mem: &'a mut Mem<'m>,
    context: [&'i str; 4],
    depth: usize,
    words: Peekable<SplitAsciiWhitespace<'i>>,
}

impl<'m, 'i, 'a> Parser<'m, 'i, 'a> {
    fn new(mem: &'a mut Mem<'m>, input: &'i str) -> Parser<'m, 'i, 'a> {
        Parser { mem, context: [""; 4], depth: 0, words: input.split_ascii_whitespace().peekable() }
    }
    fn next(&mut self) -> Result<&'i str, ErrorKind> {
        let res = self.words.next().ok_or(ErrorKind::UnexpectedEof)?;
        Ok(res)
    }
    fn at(&mut self, token: &'static str) -> bool {
        self.words.peek() == Some(&token)
    }
    fn expect(&mut self, token: &'static str) -> Result<(), ErrorKind> {
        let next = self.next()?;
        if next != token {
            Err(ErrorKind::Expected(token))?
        }
        Ok(())
    }
    /// Counts the occurrences of `token` among the remaining words of the
    /// current block.
    fn count_in_block(&self, token: &str) -> usize {
        self.words.clone().take_while(|&it| it != "}").filter(|&it| it == token).count()
    }
    fn alloc_str(&mut self, s: &str) -> Result<&'m str, ErrorKind> {
        self.mem.alloc_str(s).map_err(ErrorKind::Oom)
    }

    fn push_next(&mut self) -> Result<&'i str, ErrorKind> {
        let res = self.next()?;
        self.push(res);
        Ok(res)
    }
    fn push(&mut self, ctx: &'i str) {
        if self.depth < self.context.len() {
            self.context[self.depth] = ctx;
        }
        self.depth += 1;
    }
    fn pop(&mut self) {
        self.depth -= 1;
        if self.depth < self.context.len() {
            self.context[self.depth] = "";
        }
    }
}

/// Arena-backed array with room for an upper bound of elements, of which
/// the first `len` are filled.
struct Slots<'m, T> {
    items: &'m mut [T],
    len: usize,
}

impl<'m, T: Default> Slots<'m, T> {
    fn new(mem: &mut Mem<'m>, capacity: usize) -> Result<Slots<'m, T>, ErrorKind> {
        let items = mem.alloc_array_default(capacity).map_err(ErrorKind::Oom)?;
        Ok(Slots { items, len: 0 })
    }
    fn next(&mut self) -> Result<&mut T, ErrorKind> {
        let res = self.items.get_mut(self.len).ok_or(ErrorKind::Oom(Oom))?;
        self.len += 1;
        Ok(res)
    }
    fn filled(&self) -> &[T] {
        &self.items[..self.len]
    }
    fn finish(self) -> &'m [T] {
        let Slots { items, len } = self;
        let items: &'m [T] = items;
        &items[..len]
    }
}

fn scene<'m, 'i>(p: &mut Parser<'m, 'i, '_>) -> Result<Scene<'m>, ErrorKind> {
    p.push("scene");
    let [mut n_point_lights, mut n_triangular_lights, mut n_materials] = [0; 3];
    let [mut n_v, mut n_vt, mut n_vn, mut n_meshes] = [0; 4];
    for word in p.words.clone() {
        match word {
            "point_light" => n_point_lights += 1,
            "triangular_light" => n_triangular_lights += 1,
            "material" => n_materials += 1,
            "v" => n_v += 1,
            "vt" => n_vt += 1,
            "vn" => n_vn += 1,
            "mesh" => n_meshes += 1,
            _ => (),
        }
    }
    let mut point_lights = Slots::new(p.mem, n_point_lights)?;
    let mut triangular_lights = Slots::new(p.mem, n_triangular_lights)?;
    let mut materials = Slots::new(p.mem, n_materials)?;
    let mut vertices = Slots::new(p.mem, n_v)?;
    let mut texcoords = Slots::new(p.mem, n_vt)?;
    let mut normals = Slots::new(p.mem, n_vn)?;
    let mut meshes = Slots::new(p.mem, n_meshes)?;

    let mut res = Scene {
        max_depth: 5,
        background: Color::BLACK,
        ambient_light: Color::BLACK,
        camera: Camera::default(),
        point_lights: &[],
        triangular_lights: &[],
        materials: &[],
        vertices: &[],
        texcoords: &[],
        normals: &[],
        meshes: &[],
        texture: None,
        texture_path: None,
    };

    while let Ok(w) = p.push_next() {
        match w {
            "max_depth" => res.max_depth = integer(p)?,
            "background" => res.background = color(p)?,
            "ambient_light" => res.ambient_light = color(p)?,
            "camera" => camera(p, &mut res.camera)?,
            "point_light" => point_light(p, point_lights.next()?)?,
            "triangular_light" => triangular_light(p, triangular_lights.next()?)?,
            "material" => material(p, &mut materials)?,
            "texture" => {
                let path = p.next()?;
                res.texture_path = Some(p.alloc_str(path)?);
            }
            "data" => data(p, &mut vertices, &mut texcoords, &mut normals)?,
            "mesh" => mesh(p, meshes.next()?)?,
            _ => Err(ErrorKind::InvalidKey)?,
        }
        p.pop();
    }

    res.point_lights = point_lights.finish();
    res.triangular_lights = triangular_lights.finish();
    res.materials = materials.finish();
    res.vertices = vertices.finish();
    res.texcoords = texcoords.finish();
    res.normals = normals.finish();
    res.meshes = meshes.finish();
    res.validate().map_err(ErrorKind::InvalidScene)?;
    p.pop();
    Ok(res)
}

fn camera<'m, 'i>(p: &mut Parser<'m, 'i, '_>, res: &mut Camera) -> Result<(), ErrorKind> {
    p.expect("{")?;
    while !p.at("}") {
        match p.push_next()? {
            "pos" => res.pos = vector(p)?,
            "gaze" => res.gaze = vector(p)?,
            "up" => res.up = vector(p)?,
            "near_plane" => res.near_plane = near_plane(p)?,
            "near_distance" => res.near_distance = scalar(p)?,
            "resolution" => res.resolution = resolution(p)?,
            _ => Err(ErrorKind::InvalidKey)?,
        }
        p.pop();
    }
    p.expect("}")?;
    res.basis().ok_or(ErrorKind::DegenerateCamera)?;
    Ok(())
}

fn point_light<'m, 'i>(p: &mut Parser<'m, 'i, '_>, res: &mut PointLight) -> Result<(), ErrorKind> {
    p.expect("{")?;
    while !p.at("}") {
        match p.push_next()? {
            "pos" => res.pos = vector(p)?,
            "intensity" => res.intensity = color(p)?,
            _ => Err(ErrorKind::InvalidKey)?,
        }
        p.pop()
    }
    p.expect("}")
}

fn triangular_light<'m, 'i>(
    p: &mut Parser<'m, 'i, '_>,
    res: &mut TriangularLight,
) -> Result<(), ErrorKind> {
    p.expect("{")?;
    while !p.at("}") {
        match p.push_next()? {
            "v1" => res.v[0] = vector(p)?,
            "v2" => res.v[1] = vector(p)?,
            "v3" => res.v[2] = vector(p)?,
            "intensity" => res.intensity = color(p)?,
            _ => Err(ErrorKind::InvalidKey)?,
        }
        p.pop()
    }
    p.expect("}")
}

fn material<'m, 'i>(
    p: &mut Parser<'m, 'i, '_>,
    materials: &mut Slots<'m, Material<'m>>,
) -> Result<(), ErrorKind> {
    let id = p.push_next()?;
    if materials.filled().iter().any(|it| it.id == id) {
        Err(ErrorKind::DuplicateMaterial)?
    }
    let res = materials.next()?;
    res.id = p.alloc_str(id)?;

    p.expect("{")?;
    while !p.at("}") {
        match p.push_next()? {
            "ambient" => res.ambient = color(p)?,
            "diffuse" => res.diffuse = color(p)?,
            "specular" => res.specular = color(p)?,
            "mirror" => res.mirror = color(p)?,
            "phong_exponent" => res.phong_exponent = scalar(p)?,
            "texture_factor" => res.texture_factor = scalar(p)?,
            _ => Err(ErrorKind::InvalidKey)?,
        }
        p.pop()
    }
    p.expect("}")?;
    p.pop();
    Ok(())
}

fn data<'m, 'i>(
    p: &mut Parser<'m, 'i, '_>,
    vertices: &mut Slots<'m, v64>,
    texcoords: &mut Slots<'m, Uv>,
    normals: &mut Slots<'m, v64>,
) -> Result<(), ErrorKind> {
    p.expect("{")?;
    while !p.at("}") {
        match p.push_next()? {
            "v" => *vertices.next()? = vector(p)?,
            "vt" => *texcoords.next()? = uv(p)?,
            "vn" => *normals.next()? = vector(p)?,
            _ => Err(ErrorKind::InvalidKey)?,
        }
        p.pop()
    }
    p.expect("}")
}

fn mesh<'m, 'i>(p: &mut Parser<'m, 'i, '_>, res: &mut Mesh<'m>) -> Result<(), ErrorKind> {
    p.expect("{")?;
    let n_faces = p.count_in_block("f");
    let mut faces = Slots::new(p.mem, n_faces)?;
    while !p.at("}") {
        match p.push_next()? {
            "material" => {
                let id = p.next()?;
                res.material = p.alloc_str(id)?;
            }
            "f" => face(p, faces.next()?)?,
            _ => Err(ErrorKind::InvalidKey)?,
        }
        p.pop()
    }
    res.faces = faces.finish();
    p.expect("}")
}

fn face<'m, 'i>(p: &mut Parser<'m, 'i, '_>, res: &mut Face) -> Result<(), ErrorKind> {
    for i in 0..3 {
        let [v, t, n] = split_n(p.next()?, '/').ok_or(ErrorKind::InvalidFace)?.map(|it| {
            it.parse::<u32>().map(|it| it.wrapping_sub(1)).map_err(ErrorKind::InvalidFaceIndex)
        });
        res.v[i] = v?;
        res.t[i] = t?;
        res.n[i] = n?;
    }
    Ok(())
}

fn scalar<'m, 'i>(p: &mut Parser<'m, 'i, '_>) -> Result<f64, ErrorKind> {
    let t = p.next()?;
    let f = t.parse::<f64>().map_err(ErrorKind::ParseFloatError)?;
    Ok(f)
}

fn integer<'m, 'i>(p: &mut Parser<'m, 'i, '_>) -> Result<u32, ErrorKind> {
    let t = p.next()?;
    let i = t.parse::<u32>().map_err(ErrorKind::ParseIntError)?;
    Ok(i)
}

fn vector<'m, 'i>(p: &mut Parser<'m, 'i, '_>) -> Result<v64, ErrorKind> {
    let t = p.next()?;
    let v = t.parse::<v64>().map_err(ErrorKind::ParseVectorError)?;
    Ok(v)
}

fn color<'m, 'i>(p: &mut Parser<'m, 'i, '_>) -> Result<Color, ErrorKind> {
    let t = p.next()?;
    let c = t.parse::<Color>().map_err(ErrorKind::ParseColorError)?;
    Ok(c)
}

fn uv<'m, 'i>(p: &mut Parser<'m, 'i, '_>) -> Result<Uv, ErrorKind> {
    let t = p.next()?;
    let [u, v] = split_n(t, ',')
        .ok_or(ErrorKind::InvalidUv)?
        .map(|it| it.parse().map_err(ErrorKind::ParseFloatError));
    Ok(Uv { u: u?, v: v? })
}

fn near_plane<'m, 'i>(p: &mut Parser<'m, 'i, '_>) -> Result<NearPlane, ErrorKind> {
    let t = p.next()?;
    let [left, right, bottom, top] = split_n(t, ',')
        .ok_or(ErrorKind::InvalidNearPlane)?
        .map(|it| it.parse().map_err(ErrorKind::ParseFloatError));
    Ok(NearPlane { left: left?, right: right?, bottom: bottom?, top: top? })
}

fn resolution<'m, 'i>(p: &mut Parser<'m, 'i, '_>) -> Result<[u32; 2], ErrorKind> {
    let t = p.next()?;
    let [w, h] = split_n(t, 'x')
        .ok_or(ErrorKind::InvalidResolution)?
        .map(|it| it.parse().map_err(ErrorKind::ParseIntError));
    Ok([w?, h?])
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
