#![no_std]
#[cfg(test)]
extern crate std;

mod color;
mod parse;
mod texture;

use geom::{v64, Basis};
use mem::Mem;

pub use crate::{
    color::{Color, ParseColorError},
    parse::ParseSceneError,
    texture::{InvalidTexture, Texture},
};

/// A fully resolved scene.
///
/// All storage is borrowed, typically from a [`Mem`] arena, and nothing in
/// here is mutated while rendering.
#[derive(Clone, Copy)]
pub struct Scene<'m> {
    pub max_depth: u32,
    pub background: Color,
    pub ambient_light: Color,
    pub camera: Camera,
    pub point_lights: &'m [PointLight],
    pub triangular_lights: &'m [TriangularLight],
    pub materials: &'m [Material<'m>],
    pub vertices: &'m [v64],
    pub texcoords: &'m [Uv],
    pub normals: &'m [v64],
    pub meshes: &'m [Mesh<'m>],
    pub texture: Option<Texture<'m>>,
    /// Image file named by the scene description, not decoded here.
    pub texture_path: Option<&'m str>,
}

#[derive(Default, Clone, Copy, Debug)]
pub struct Camera {
    pub pos: v64,
    pub gaze: v64,
    pub up: v64,
    pub near_distance: f64,
    pub near_plane: NearPlane,
    pub resolution: [u32; 2],
}

/// Image rectangle on the near plane, in camera units.
#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub struct NearPlane {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
}

#[derive(Default, Clone, Copy, Debug)]
pub struct PointLight {
    pub pos: v64,
    pub intensity: Color,
}

/// Area light, sampled at its three vertices.
#[derive(Default, Clone, Copy, Debug)]
pub struct TriangularLight {
    pub v: [v64; 3],
    pub intensity: Color,
}

#[derive(Default, Clone, Copy, Debug)]
pub struct Material<'m> {
    pub id: &'m str,
    pub ambient: Color,
    pub diffuse: Color,
    pub specular: Color,
    pub mirror: Color,
    pub phong_exponent: f64,
    pub texture_factor: f64,
}

#[derive(Default, Clone, Copy, Debug)]
pub struct Mesh<'m> {
    pub material: &'m str,
    pub faces: &'m [Face],
}

/// Zero-based indices into the scene's vertex, texcoord and normal arrays.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Face {
    pub v: [u32; 3],
    pub t: [u32; 3],
    pub n: [u32; 3],
}

#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub struct Uv {
    pub u: f64,
    pub v: f64,
}

#[derive(Debug, displaydoc::Display, PartialEq, Eq)]
pub enum InvalidScene {
    /// mesh {0} uses an undefined material
    UnknownMaterial(usize),
    /// mesh {0}, face {1}: vertex index out of bounds
    VertexOutOfBounds(usize, usize),
    /// mesh {0}, face {1}: texture coordinate index out of bounds
    TexcoordOutOfBounds(usize, usize),
    /// mesh {0}, face {1}: normal index out of bounds
    NormalOutOfBounds(usize, usize),
    /// camera gaze is zero or parallel to up
    DegenerateCamera,
}

impl<'m> Scene<'m> {
    pub fn parse<'a>(mem: &mut Mem<'m>, s: &'a str) -> Result<Scene<'m>, ParseSceneError<'a>> {
        parse::parse(mem, s)
    }

    pub fn material(&self, id: &str) -> Option<&'m Material<'m>> {
        self.materials.iter().find(|it| it.id == id)
    }

    pub fn triangle(&self, face: &Face) -> [v64; 3] {
        face.v.map(|it| self.vertices[it as usize])
    }

    /// Texture color at `uv`, or the background if there is no texture.
    pub fn sample_texture(&self, uv: Uv) -> Color {
        match &self.texture {
            Some(texture) => texture.sample(uv),
            None => self.background,
        }
    }

    /// Checks referential integrity: every mesh names a defined material and
    /// every face index is in bounds. Texture coordinate indices are only
    /// checked when the scene has texture coordinates at all.
    pub fn validate(&self) -> Result<(), InvalidScene> {
        self.camera.basis().ok_or(InvalidScene::DegenerateCamera)?;
        for (i, mesh) in self.meshes.iter().enumerate() {
            if self.material(mesh.material).is_none() {
                return Err(InvalidScene::UnknownMaterial(i));
            }
            let in_bounds = |idx: [u32; 3], len: usize| idx.iter().all(|&it| (it as usize) < len);
            for (j, face) in mesh.faces.iter().enumerate() {
                if !in_bounds(face.v, self.vertices.len()) {
                    return Err(InvalidScene::VertexOutOfBounds(i, j));
                }
                if !self.texcoords.is_empty() && !in_bounds(face.t, self.texcoords.len()) {
                    return Err(InvalidScene::TexcoordOutOfBounds(i, j));
                }
                if !in_bounds(face.n, self.normals.len()) {
                    return Err(InvalidScene::NormalOutOfBounds(i, j));
                }
            }
        }
        Ok(())
    }
}

impl Camera {
    pub fn basis(&self) -> Option<Basis> {
        Basis::new(self.gaze, self.up)
    }
}

impl TriangularLight {
    /// Point light approximation of the area light, one per vertex.
    pub fn samples(&self) -> [PointLight; 3] {
        self.v.map(|pos| PointLight { pos, intensity: self.intensity })
    }
}
