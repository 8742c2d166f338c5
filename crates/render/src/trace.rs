use geom::{dot, intersect_triangle, reflect, v64, Ray, TriangleHit, EPSILON};
use scene::{Color, Face, InvalidScene, Material, PointLight, Scene, Uv};

/// Recursive Whitted tracer over a validated scene.
pub struct Tracer<'a> {
    scene: &'a Scene<'a>,
    /// Material of each mesh, by mesh index.
    materials: Vec<&'a Material<'a>>,
}

/// Nearest intersection of a ray with the scene.
#[derive(Clone, Copy, Debug)]
pub struct Hit<'a> {
    pub t: f64,
    pub position: v64,
    /// Interpolated and normalized.
    pub normal: v64,
    pub material: &'a Material<'a>,
    /// Interpolated, or zero if the scene has no texture coordinates.
    pub uv: Uv,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl<'a> Tracer<'a> {
    /// Resolves mesh materials up front, so tracing itself cannot fail.
    ///
    /// Face indices are not checked here, see [`Scene::validate`].
    pub fn new(scene: &'a Scene<'a>) -> Result<Tracer<'a>, InvalidScene> {
        let materials = scene
            .meshes
            .iter()
            .enumerate()
            .map(|(i, mesh)| scene.material(mesh.material).ok_or(InvalidScene::UnknownMaterial(i)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Tracer { scene, materials })
    }

    fn faces(&self) -> impl Iterator<Item = (usize, &'a Face)> + '_ {
        let meshes = self.scene.meshes;
        meshes.iter().enumerate().flat_map(|(i, mesh)| mesh.faces.iter().map(move |face| (i, face)))
    }

    pub fn intersect(&self, ray: &Ray) -> Option<Hit<'a>> {
        let mut best: Option<(usize, &Face, TriangleHit)> = None;
        for (mesh, face) in self.faces() {
            let Some(hit) = intersect_triangle(ray, self.scene.triangle(face)) else { continue };
            if best.map_or(true, |(_, _, best)| hit.t < best.t) {
                best = Some((mesh, face, hit));
            }
        }
        let (mesh, face, hit) = best?;

        let (alpha, beta, gamma) = (hit.alpha, hit.beta, hit.gamma());
        let [n0, n1, n2] = face.n.map(|it| self.scene.normals[it as usize]);
        let normal = (n0 * gamma + n1 * alpha + n2 * beta).to_unit();
        let texcoords = self.scene.texcoords;
        let uv = if texcoords.is_empty() {
            Uv::default()
        } else {
            let [t0, t1, t2] = face.t.map(|it| texcoords[it as usize]);
            Uv {
                u: t0.u * gamma + t1.u * alpha + t2.u * beta,
                v: t0.v * gamma + t1.v * alpha + t2.v * beta,
            }
        };
        Some(Hit {
            t: hit.t,
            position: ray.at(hit.t),
            normal,
            material: self.materials[mesh],
            uv,
            alpha,
            beta,
            gamma,
        })
    }

    /// Whether anything lies along `dir` from `origin` closer than `max_t`.
    ///
    /// Stops at the first such face instead of looking for the nearest one.
    pub fn is_occluded(&self, origin: v64, dir: v64, max_t: f64) -> bool {
        let ray = Ray::new(origin, dir);
        self.faces().any(|(_, face)| {
            intersect_triangle(&ray, self.scene.triangle(face)).is_some_and(|hit| hit.t < max_t)
        })
    }

    /// Phong shading at `hit`, `view` points back to the viewer.
    pub fn shade(&self, hit: &Hit<'a>, view: v64) -> Color {
        let scene = self.scene;
        let mut color = hit.material.ambient * scene.ambient_light;
        let area_samples = scene.triangular_lights.iter().flat_map(|it| it.samples());
        for light in scene.point_lights.iter().copied().chain(area_samples) {
            color = color + self.point_light(hit, view, &light);
        }
        color
    }

    pub(crate) fn point_light(&self, hit: &Hit<'a>, view: v64, light: &PointLight) -> Color {
        let to_light = light.pos - hit.position;
        let d = to_light.norm();
        let l = to_light.to_unit();
        if self.is_occluded(hit.position + l * EPSILON, l, d - EPSILON) {
            return Color::BLACK;
        }

        let material = hit.material;
        let cos = dot(hit.normal, l).max(0.0);
        let diffuse = material.diffuse * light.intensity * (cos / (d * d));
        let r = reflect(-l, hit.normal);
        let highlight = dot(r, view).max(0.0).powf(material.phong_exponent);
        let specular = material.specular * light.intensity * highlight;
        diffuse + specular
    }

    /// Color seen along `ray`, unclamped.
    pub fn trace(&self, ray: &Ray) -> Color {
        let scene = self.scene;
        if ray.depth() > scene.max_depth {
            return scene.background;
        }
        let Some(hit) = self.intersect(ray) else { return scene.background };

        let material = hit.material;
        let mut color = self.shade(&hit, -ray.dir());

        let tf = material.texture_factor;
        if scene.texture.is_some() && tf > 0.0 {
            color = color * (1.0 - tf) + scene.sample_texture(hit.uv) * tf;
        }

        if material.mirror.max_channel() > EPSILON {
            let dir = reflect(ray.dir(), hit.normal);
            let reflected = Ray::new(hit.position + dir * EPSILON, dir).with_depth(ray.depth() + 1);
            color = color + material.mirror * self.trace(&reflected);
        }
        color
    }
}
