use std::{
    fs,
    io::{self, Read, Write},
    num::NonZeroUsize,
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::Context;
use mem::Mem;
use render::{rgb, threads::Threads};
use scene::{Scene, Texture};

/// Renders a scene with Whitted-style ray tracing.
#[derive(argh::FromArgs)]
struct Args {
    /// scene file, read from stdin if omitted
    #[argh(positional)]
    scene: Option<PathBuf>,

    /// amount of parallelism, defaults to the number of cores
    #[argh(option, short = 'j')]
    jobs: Option<NonZeroUsize>,

    /// render on the main thread only
    #[argh(switch)]
    sequential: bool,

    /// memory for the scene, in kilobytes
    #[argh(option, default = "65536")]
    mem: usize,

    /// image file to write, format follows the extension; plain ppm on
    /// stdout if omitted
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: Args = argh::from_env();

    let mut text = String::new();
    match &args.scene {
        Some(path) => {
            text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
        }
        None => {
            io::stdin().read_to_string(&mut text).context("reading input")?;
        }
    }

    let mut mem = vec![0; args.mem * 1024];
    let mut mem = Mem::new(&mut mem);
    let scene = Scene::parse(&mut mem, &text).map_err(|err| anyhow::format_err!("{err}"))?;
    log::debug!("scene memory: {} KB left of {} KB", mem.free() / 1024, args.mem);
    log::info!(
        "loaded scene: {} meshes, {} faces, {} point and {} triangular lights",
        scene.meshes.len(),
        scene.meshes.iter().map(|it| it.faces.len()).sum::<usize>(),
        scene.point_lights.len(),
        scene.triangular_lights.len(),
    );

    let base_dir = args.scene.as_deref().and_then(Path::parent).unwrap_or(Path::new("."));
    let texture_image = scene.texture_path.and_then(|path| load_texture(&base_dir.join(path)));
    let texture = texture_image.as_ref().and_then(|image| {
        match Texture::new([image.width(), image.height()], image.as_raw()) {
            Ok(it) => Some(it),
            Err(err) => {
                log::warn!("ignoring texture: {err}");
                None
            }
        }
    });
    let scene = Scene { texture, ..scene };

    let [width, height] = scene.camera.resolution;
    let mut pixels = vec![rgb::Color::default(); width as usize * height as usize];
    let mut buf = rgb::Buf::new([width, height], &mut pixels);

    let start = Instant::now();
    let res = if args.sequential {
        render::render(&scene, &mut buf)
    } else {
        let threads = match args.jobs {
            Some(it) => Threads::new(it),
            None => Threads::with_max_threads(),
        }
        .context("spawning worker threads")?;
        log::info!("rendering on {} threads", threads.len());
        render::render_parallel(&scene, &threads, &mut buf)
    };
    res.map_err(|err| anyhow::format_err!("{err}"))?;
    log::info!("rendered {width}x{height} in {:.2?}", start.elapsed());

    match &args.output {
        Some(path) => save_image(&buf, path).with_context(|| format!("writing {}", path.display()))?,
        None => {
            let mut stdout = io::BufWriter::new(io::stdout().lock());
            write_ppm(&buf, &mut stdout).context("writing output")?;
        }
    }
    Ok(())
}

fn load_texture(path: &Path) -> Option<image::RgbaImage> {
    match image::open(path) {
        Ok(it) => {
            let image = it.to_rgba8();
            log::info!("loaded texture {} ({}x{})", path.display(), image.width(), image.height());
            Some(image)
        }
        Err(err) => {
            log::warn!("failed to load texture {}: {err}", path.display());
            None
        }
    }
}

fn save_image(buf: &rgb::Buf, path: &Path) -> anyhow::Result<()> {
    let [width, height] = buf.dim();
    let image = image::RgbaImage::from_raw(width, height, buf.as_bytes().to_vec())
        .context("pixel buffer does not match its dimensions")?;
    // Every pixel is opaque, and not every format can store alpha.
    image::DynamicImage::ImageRgba8(image).to_rgb8().save(path)?;
    Ok(())
}

fn write_ppm(buf: &rgb::Buf, w: &mut dyn io::Write) -> io::Result<()> {
    let magic_number = "P3";
    let max_color = 255;
    write!(w, "{}\n{} {}\n{}\n", magic_number, buf.width(), buf.height(), max_color)?;

    for idx in buf.by_row() {
        if idx[0] == 0 {
            writeln!(w)?;
        }
        let rgb::Color { r, g, b, .. } = buf[idx];
        write!(w, "{r:3} {g:3} {b:3}  ")?;
    }
    writeln!(w)?;
    w.flush()
}
