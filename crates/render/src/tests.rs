use std::num::NonZeroUsize;

use approx::assert_abs_diff_eq;
use geom::{intersect_triangle, v64, Ray};
use mem::Mem;
use scene::{Camera, Color, Mesh, NearPlane, PointLight, Scene, Texture, Uv};

use crate::{render, render_parallel, rgb, threads::Threads, Tracer, View};

const TRIANGLE: &str = "
background 10,20,30
camera { pos 0,0,5 gaze 0,0,-1 up 0,1,0 near_plane -1,1,-1,1 near_distance 1 resolution 32x32 }
point_light { pos 0,0,3 intensity 1000,1000,1000 }
material white { diffuse 1,1,1 }
data { v -2,-2,0 v 2,-2,0 v 0,2,0 vn 0,0,1 }
mesh { material white f 1/1/1 2/1/1 3/1/1 }
";

const SHADOW: &str = "
ambient_light 10,10,10
camera { pos 0,0,5 gaze 0,0,-1 up 0,1,0 near_plane -1,1,-1,1 near_distance 1 resolution 4x4 }
point_light { pos 0,0,3 intensity 1000,1000,1000 }
material floor { ambient 1,1,1 diffuse 1,1,1 specular 1,1,1 phong_exponent 4 }
material blocker { diffuse 1,0,0 }
data {
    v -5,-5,0 v 5,-5,0 v 0,5,0
    v -0.5,-0.5,1 v 0.5,-0.5,1 v 0,0.5,1
    vn 0,0,1
}
mesh { material floor f 1/1/1 2/1/1 3/1/1 }
mesh { material blocker f 4/1/1 5/1/1 6/1/1 }
";

const STACKED: &str = "
camera { pos 0,0,5 gaze 0,0,-1 up 0,1,0 near_plane -1,1,-1,1 near_distance 1 resolution 16x16 }
point_light { pos 0,0,4 intensity 1000,1000,1000 }
material far { diffuse 1,0,0 }
material near { diffuse 0,1,0 }
data {
    v -1,-1,0 v 1,-1,0 v 0,1,0
    v -3,-3,1 v 3,-3,1 v 0,3,1
    vn 0,0,1
}
mesh { material far f 1/1/1 2/1/1 3/1/1 }
mesh { material near f 4/1/1 5/1/1 6/1/1 }
";

const TEXTURED: &str = "
camera { pos 0,0,5 gaze 0,0,-1 up 0,1,0 near_plane -1,1,-1,1 near_distance 1 resolution 4x4 }
point_light { pos 0,0,3 intensity 1000,1000,1000 }
material tex { diffuse 1,1,1 texture_factor 1 }
data {
    v -2,-2,0 v 2,-2,0 v 2,2,0 v -2,2,0
    vt 0,0 vt 1,0 vt 1,1 vt 0,1
    vn 0,0,1
}
mesh { material tex f 1/1/1 2/2/1 3/3/1 f 1/1/1 3/3/1 4/4/1 }
";

const ROOM: &str = "
max_depth 2
background 5,5,40
ambient_light 15,15,15
camera {
    pos 0,1,6 gaze 0,-0.2,-1 up 0,1,0
    near_plane -1,1,-0.8,0.8 near_distance 1.2
    resolution 13x11
}
point_light { pos 2,3,3 intensity 800,700,600 }
triangular_light { v1 -2,4,1 v2 -1,4,1 v3 -1.5,4,2 intensity 200,200,200 }
material floor {
    ambient 1,1,1 diffuse 0.6,0.6,0.6 specular 0.3,0.3,0.3
    phong_exponent 20 texture_factor 0.5
}
material mirror { ambient 0.1,0.1,0.1 diffuse 0.1,0.1,0.1 mirror 0.8,0.8,0.8 }
data {
    v -3,-1,-3 v 3,-1,-3 v 3,-1,3 v -3,-1,3
    v -1,-1,-1 v 1,-1,-1 v 0,1.5,-1.5
    vt 0,0 vt 1,0 vt 1,1 vt 0,1
    vn 0,1,0 vn 0,0.2,1
}
mesh { material floor f 1/1/1 2/2/1 3/3/1 f 1/1/1 3/3/1 4/4/1 }
mesh { material mirror f 5/1/2 6/2/2 7/3/2 }
";

const AREA_LIGHT: &str = "
ambient_light 5,5,5
camera { pos 0,0,5 gaze 0,0,-1 up 0,1,0 near_plane -1,1,-1,1 near_distance 1 resolution 4x4 }
triangular_light { v1 -1,-1,2 v2 1,-1,3 v3 0,1,4 intensity 300,300,300 }
material m { ambient 1,1,1 diffuse 1,1,1 specular 0.5,0.5,0.5 phong_exponent 8 }
data { v -5,-5,0 v 5,-5,0 v 0,5,0 vn 0,0,1 }
mesh { material m f 1/1/1 2/1/1 3/1/1 }
";

#[rustfmt::skip]
const CHECKER: [u8; 16] = [
    250, 40, 40, 255,    40, 250, 40, 255,
    40, 40, 250, 255,    250, 250, 250, 255,
];

fn with_scene<T>(input: &str, f: impl FnOnce(Scene<'_>) -> T) -> T {
    let mut buf = vec![0u8; 1 << 16];
    let mut mem = Mem::new(&mut buf);
    match Scene::parse(&mut mem, input) {
        Ok(scene) => f(scene),
        Err(err) => panic!("{err}"),
    }
}

fn render_sequential(scene: &Scene<'_>) -> Vec<rgb::Color> {
    let [width, height] = scene.camera.resolution;
    let mut pixels = vec![rgb::Color::default(); (width * height) as usize];
    render(scene, &mut rgb::Buf::new([width, height], &mut pixels)).unwrap();
    pixels
}

fn render_with_threads(scene: &Scene<'_>, n_threads: usize) -> Vec<rgb::Color> {
    let threads = Threads::new(NonZeroUsize::new(n_threads).unwrap()).unwrap();
    let [width, height] = scene.camera.resolution;
    let mut pixels = vec![rgb::Color::default(); (width * height) as usize];
    render_parallel(scene, &threads, &mut rgb::Buf::new([width, height], &mut pixels)).unwrap();
    pixels
}

fn assert_v64_eq(actual: v64, expected: v64) {
    assert_abs_diff_eq!(actual.x, expected.x, epsilon = 1e-9);
    assert_abs_diff_eq!(actual.y, expected.y, epsilon = 1e-9);
    assert_abs_diff_eq!(actual.z, expected.z, epsilon = 1e-9);
}

#[test]
fn view_casts_through_pixel_centers() {
    let camera = Camera {
        pos: v64(1.0, 2.0, 3.0),
        gaze: v64(0.0, 0.0, -2.0),
        up: v64(0.0, 1.0, 0.0),
        near_distance: 1.0,
        near_plane: NearPlane { left: -1.0, right: 1.0, bottom: -1.0, top: 1.0 },
        resolution: [3, 3],
    };
    let view = View::new(&camera).unwrap();

    let center = view.cast([1, 1]);
    assert_eq!(center.origin(), camera.pos);
    assert_v64_eq(center.dir(), v64(0.0, 0.0, -1.0));
    assert_eq!(center.depth(), 0);

    let top_left = view.cast([0, 0]);
    assert_v64_eq(top_left.dir(), v64(-2.0 / 3.0, 2.0 / 3.0, -1.0).to_unit());
    let bottom_right = view.cast([2, 2]);
    assert_v64_eq(bottom_right.dir(), v64(2.0 / 3.0, -2.0 / 3.0, -1.0).to_unit());

    assert!(View::new(&Camera { up: v64(0.0, 0.0, 1.0), ..camera }).is_none());
}

#[test]
fn single_triangle_is_lit_against_background() {
    with_scene(TRIANGLE, |scene| {
        let pixels = render_sequential(&scene);
        let background = rgb::Color::opaque(10, 20, 30);

        let mut n_lit = 0;
        for pixel in &pixels {
            if *pixel != background {
                assert!(pixel.r == pixel.g && pixel.g == pixel.b && pixel.r > 0, "{pixel:?}");
                n_lit += 1;
            }
        }
        assert!(0 < n_lit && n_lit < pixels.len());
        assert_eq!(pixels[0], background);

        let brightest = pixels.iter().map(|it| it.r).max().unwrap();
        for (i, pixel) in pixels.iter().enumerate() {
            if pixel.r == brightest {
                let (x, y) = (i % 32, i / 32);
                assert!((15..=16).contains(&x) && (15..=16).contains(&y), "({x}, {y})");
            }
        }
    })
}

#[test]
fn depth_cutoff_returns_background() {
    with_scene(TRIANGLE, |scene| {
        let tracer = Tracer::new(&scene).unwrap();
        let ray = Ray::from_to(v64(0.0, 0.0, 5.0), v64::ZERO);
        assert!(tracer.intersect(&ray).is_some());
        assert_ne!(tracer.trace(&ray), scene.background);
        for depth in [scene.max_depth + 1, scene.max_depth + 7] {
            assert_eq!(tracer.trace(&ray.with_depth(depth)), scene.background);
        }
    })
}

#[test]
fn occluded_light_contributes_nothing() {
    with_scene(SHADOW, |scene| {
        let tracer = Tracer::new(&scene).unwrap();
        let ray = Ray::from_to(v64(3.0, 0.0, 5.0), v64::ZERO);
        let hit = tracer.intersect(&ray).unwrap();
        assert_eq!(hit.material.id, "floor");
        assert_v64_eq(hit.position, v64::ZERO);

        let view = -ray.dir();
        assert_eq!(tracer.point_light(&hit, view, &scene.point_lights[0]), Color::BLACK);
        assert_eq!(tracer.shade(&hit, view), Color::new(10.0, 10.0, 10.0));

        let visible = PointLight { pos: v64(3.0, 0.0, 3.0), ..scene.point_lights[0] };
        let color = tracer.point_light(&hit, view, &visible);
        assert!(color.r > 0.0 && color.g > 0.0 && color.b > 0.0);
    })
}

#[test]
fn triangular_light_is_three_point_lights() {
    with_scene(AREA_LIGHT, |scene| {
        let tracer = Tracer::new(&scene).unwrap();
        let ray = Ray::from_to(v64(0.0, 0.0, 5.0), v64::ZERO);
        let hit = tracer.intersect(&ray).unwrap();
        let view = -ray.dir();
        let light = scene.triangular_lights[0];
        let ambient = hit.material.ambient * scene.ambient_light;

        let [s0, s1, s2] = light.samples().map(|it| tracer.point_light(&hit, view, &it));
        assert_ne!(s0, s1);
        assert_ne!(s1, s2);
        assert_eq!(tracer.shade(&hit, view), ambient + s0 + s1 + s2);

        let [v0, v1, v2] = light.v;
        let centroid = PointLight { pos: (v0 + v1 + v2) / 3.0, intensity: light.intensity };
        let single = ambient + tracer.point_light(&hit, view, &centroid);
        assert_ne!(tracer.shade(&hit, view), single);
    })
}

#[test]
fn nearer_triangle_wins() {
    with_scene(STACKED, |scene| {
        let tracer = Tracer::new(&scene).unwrap();
        let view = View::new(&scene.camera).unwrap();
        let far = [v64(-1.0, -1.0, 0.0), v64(1.0, -1.0, 0.0), v64(0.0, 1.0, 0.0)];
        let near = [v64(-3.0, -3.0, 1.0), v64(3.0, -3.0, 1.0), v64(0.0, 3.0, 1.0)];

        let mut n_overlapping = 0;
        for y in 0..16 {
            for x in 0..16 {
                let ray = view.cast([x, y]);
                if intersect_triangle(&ray, far).is_none() {
                    continue;
                }
                n_overlapping += 1;
                let hit = tracer.intersect(&ray).unwrap();
                assert_eq!(hit.material.id, "near");
                assert_eq!(hit.t, intersect_triangle(&ray, near).unwrap().t);
                assert_abs_diff_eq!(hit.alpha + hit.beta + hit.gamma, 1.0, epsilon = 1e-9);
            }
        }
        assert!(n_overlapping > 0);
    })
}

fn mirror_scene(max_depth: u32, background: &str, mirror: &str) -> String {
    format!(
        "max_depth {max_depth}
        background {background}
        ambient_light 20,20,20
        camera {{ pos 0,0,5 gaze 0,0,-1 up 0,1,0 near_plane -1,1,-1,1 near_distance 1 resolution 8x8 }}
        point_light {{ pos 0,0,3 intensity 500,500,500 }}
        material m {{ ambient 1,1,1 diffuse 0.5,0.5,0.5 mirror {mirror} }}
        data {{ v -2,-2,0 v 2,-2,0 v 0,2,0 vn 0,0,1 }}
        mesh {{ material m f 1/1/1 2/1/1 3/1/1 }}"
    )
}

#[test]
fn mirror_without_depth_is_local_shading() {
    let render_black = |mirror: &str| {
        with_scene(&mirror_scene(0, "0,0,0", mirror), |scene| render_sequential(&scene))
    };
    assert_eq!(render_black("1,1,1"), render_black("0,0,0"));
}

#[test]
fn last_bounce_reflects_background() {
    with_scene(&mirror_scene(1, "40,80,120", "0.5,0.5,0.5"), |scene| {
        let tracer = Tracer::new(&scene).unwrap();
        let ray = Ray::from_to(v64(0.0, 0.0, 5.0), v64::ZERO).with_depth(scene.max_depth);
        let hit = tracer.intersect(&ray).unwrap();
        let local = tracer.shade(&hit, -ray.dir());

        let expected = local + Color::new(0.5, 0.5, 0.5) * scene.background;
        assert_eq!(tracer.trace(&ray), expected);
        assert_eq!(Color::new(0.5, 0.5, 0.5) * scene.background, Color::new(20.0, 40.0, 60.0));
        assert_eq!(tracer.trace(&ray.with_depth(scene.max_depth + 1)), scene.background);
    });

    let matte = with_scene(&mirror_scene(1, "40,80,120", "0,0,0"), |scene| render_sequential(&scene));
    let mirrored =
        with_scene(&mirror_scene(1, "40,80,120", "1,1,1"), |scene| render_sequential(&scene));
    assert_ne!(mirrored, matte);
}

#[test]
fn texture_blends_into_local_color() {
    let texture = Texture::new([1, 1], &[200, 100, 50, 255]).unwrap();
    with_scene(TEXTURED, |scene| {
        let ray = Ray::from_to(v64(0.0, 0.0, 5.0), v64(1.0, -1.0, 0.0));

        let tracer = Tracer::new(&scene).unwrap();
        let hit = tracer.intersect(&ray).unwrap();
        assert_abs_diff_eq!(hit.uv.u, 0.75, epsilon = 1e-9);
        assert_abs_diff_eq!(hit.uv.v, 0.25, epsilon = 1e-9);
        let local = tracer.shade(&hit, -ray.dir());
        assert_eq!(tracer.trace(&ray), local);

        let textured = Scene { texture: Some(texture), ..scene };
        let tracer = Tracer::new(&textured).unwrap();
        assert_eq!(tracer.trace(&ray), Color::new(200.0, 100.0, 50.0));
    })
}

#[test]
fn untextured_scene_leaves_uv_at_zero() {
    with_scene(TRIANGLE, |scene| {
        let tracer = Tracer::new(&scene).unwrap();
        let hit = tracer.intersect(&Ray::from_to(v64(0.0, 0.0, 5.0), v64::ZERO)).unwrap();
        assert_eq!(hit.uv, Uv::default());
    })
}

#[test]
fn parallel_matches_sequential() {
    let texture = Texture::new([2, 2], &CHECKER).unwrap();
    with_scene(ROOM, |scene| {
        let scene = Scene { texture: Some(texture), ..scene };
        let expected = render_sequential(&scene);
        assert!(expected.iter().all(|it| it.a == 255));
        for n_threads in [1, 4, 16] {
            assert_eq!(render_with_threads(&scene, n_threads), expected, "{n_threads} threads");
        }
    })
}

#[test]
fn pool_is_reused_across_renders() {
    with_scene(TRIANGLE, |scene| {
        let expected = render_sequential(&scene);
        let threads = Threads::new(NonZeroUsize::new(3).unwrap()).unwrap();
        for _ in 0..2 {
            let mut pixels = vec![rgb::Color::default(); 32 * 32];
            render_parallel(&scene, &threads, &mut rgb::Buf::new([32, 32], &mut pixels)).unwrap();
            assert_eq!(pixels, expected);
        }
    })
}

#[test]
fn rejects_mismatched_buffer() {
    with_scene(TRIANGLE, |scene| {
        let mut pixels = vec![rgb::Color::default(); 4];
        let err = render(&scene, &mut rgb::Buf::new([2, 2], &mut pixels)).unwrap_err();
        assert_eq!(err.to_string(), "output buffer is 2x2, but camera resolution is 32x32");
        assert!(pixels.iter().all(|it| *it == rgb::Color::default()));
    })
}

#[test]
fn rejects_invalid_scene() {
    with_scene(TRIANGLE, |scene| {
        let meshes = [Mesh { material: "chrome", faces: &[] }];
        let scene = Scene { meshes: &meshes, ..scene };
        let threads = Threads::new(NonZeroUsize::new(2).unwrap()).unwrap();
        let mut pixels = vec![rgb::Color::default(); 32 * 32];
        let err =
            render_parallel(&scene, &threads, &mut rgb::Buf::new([32, 32], &mut pixels)).unwrap_err();
        assert_eq!(err.to_string(), "invalid scene: mesh 0 uses an undefined material");
    })
}
