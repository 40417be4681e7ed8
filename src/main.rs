use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};

use posevis::avatar::{AvatarModel, AvatarRenderer, Skeleton};
use posevis::config::DetectorConfig;
use posevis::filter::{ema::Ema, one_euro::OneEuroFilter, Smoothing};
use posevis::image::{is_image_path, Image};
use posevis::interpolate::Interpolator;
use posevis::mesh::{FocusTarget, MeshRenderer};
use posevis::overlay::Overlay;
use posevis::result::DetectionResult;
use posevis::timer::{DrawStats, FpsCounter, Timer};
use posevis::worker::{now_ms, DetectionClient, InputTensor, ReplayDetector};

/// Replays recorded tracking results through the overlay, skeleton and avatar renderers.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Recorded detection results: a JSON array, or one result object per line.
    #[arg(long)]
    results: PathBuf,

    /// Detector configuration (JSON). Defaults are used for missing fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of input frames (PNG or JPEG), used in file name order.
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Face mesh triangulation (JSON array of vertex indices).
    #[arg(long)]
    triangulation: Option<PathBuf>,

    /// Face mesh texture coordinates (JSON array of `[u, v]` pairs).
    #[arg(long)]
    uvmap: Option<PathBuf>,

    /// Rigged avatar model (`.babylon`).
    #[arg(long)]
    avatar: Option<PathBuf>,

    /// Output directory for overlay frames and scene dumps.
    #[arg(long, default_value = "out")]
    out: PathBuf,

    /// Enable face detection. If no model is selected, all of them are enabled.
    #[arg(long)]
    face: bool,
    /// Enable body detection.
    #[arg(long)]
    body: bool,
    /// Enable hand detection.
    #[arg(long)]
    hand: bool,

    #[arg(long, value_enum, default_value_t = SmoothingArg::Ema)]
    smoothing: SmoothingArg,

    /// Camera and light preset of the skeleton scene (face, hand or body).
    #[arg(long)]
    focus: Option<FocusTarget>,

    /// Number of frames to render. Defaults to the length of the recording.
    #[arg(long)]
    max_frames: Option<usize>,

    /// Frame rate of the scene animation clock.
    #[arg(long, default_value_t = 30.0)]
    fps: f64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SmoothingArg {
    Off,
    Ema,
    OneEuro,
}

impl From<SmoothingArg> for Smoothing {
    fn from(arg: SmoothingArg) -> Self {
        match arg {
            SmoothingArg::Off => Smoothing::Off,
            SmoothingArg::Ema => Smoothing::Ema(Ema::new(0.7)),
            SmoothingArg::OneEuro => Smoothing::OneEuro(OneEuroFilter::new(1.0, 0.05)),
        }
    }
}

fn main() -> anyhow::Result<()> {
    posevis::init_logger!();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DetectorConfig::from_file(path)?,
        None => DetectorConfig::default(),
    };
    config.apply_env();
    if args.face || args.body || args.hand {
        config.set_enabled(args.face, args.body, args.hand);
    } else {
        config.set_enabled(true, true, true);
    }
    config.validate()?;

    let recording = fs::read_to_string(&args.results)
        .with_context(|| format!("failed to read results from '{}'", args.results.display()))?;
    let recording = DetectionResult::from_json_lines(&recording)
        .with_context(|| format!("failed to parse results from '{}'", args.results.display()))?;
    let frame_count = args.max_frames.unwrap_or(recording.len());
    info!("replaying {} of {} recorded results", frame_count, recording.len());

    let frames = match &args.frames {
        Some(dir) => list_frames(dir)?,
        None => Vec::new(),
    };
    let triangulation: Vec<u32> = match &args.triangulation {
        Some(path) => load_json(path)?,
        None => Vec::new(),
    };
    let uvmap: Vec<[f32; 2]> = match &args.uvmap {
        Some(path) => load_json(path)?,
        None => Vec::new(),
    };

    let overlay = Overlay::new(triangulation.iter().map(|&i| i as usize).collect());
    let mut mesh = MeshRenderer::new();
    mesh.init(triangulation, uvmap);
    if let Some(target) = args.focus {
        mesh.focus(target);
    }
    let (skeleton, model) = match &args.avatar {
        Some(path) => (Skeleton::load(path)?, AvatarModel::from_path(path)),
        None => (Skeleton::humanoid(), AvatarModel::YBot),
    };
    let mut avatar = AvatarRenderer::new(skeleton, model);

    let mut client = DetectionClient::spawn(move |_: &DetectorConfig| {
        Ok(ReplayDetector::new(recording.clone())?.restamp(true))
    })?;
    client.init(&config);

    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create output directory '{}'", args.out.display()))?;

    let mut interpolator = Interpolator::new(Smoothing::from(args.smoothing));
    let mut stats = DrawStats::new();
    let mut fps = FpsCounter::new("draw");
    let mut t_detect = Timer::new("detect");
    let mut t_overlay = Timer::new("overlay");
    let mut t_scene = Timer::new("scene");

    for index in 0..frame_count {
        let frame = match frames.get(index % frames.len().max(1)) {
            Some(path) => Some(Image::load(path)?),
            None => None,
        };
        let (frame_width, frame_height) = frame
            .as_ref()
            .map_or((config.filter.width, config.filter.height), |f| {
                (f.width(), f.height())
            });
        // Results are in detector input coordinates, the canvas keeps the frame size.
        let (width, height) = config.filter.input_size(frame_width, frame_height);

        let response = {
            let _guard = t_detect.start();
            let input = match &frame {
                Some(frame) => InputTensor::from_image(frame, &config.filter),
                None => {
                    InputTensor::from_image(&Image::new(frame_width, frame_height), &config.filter)
                }
            };
            client.request_detect(input, &config);
            client.receive()?
        };
        let Some(response) = response else {
            warn!("no detection result for frame {index}");
            continue;
        };
        let status = stats.update(now_ms(), response.result.timestamp);
        debug!("frame {index}: {status}");
        let result = interpolator.next(&response.result);

        {
            let _guard = t_overlay.start();
            let mut canvas = Image::new(frame_width, frame_height);
            overlay.draw(&mut canvas, frame.as_ref(), width, height, &result);
            canvas.save(args.out.join(format!("overlay-{index:05}.png")))?;
        }
        {
            let _guard = t_scene.start();
            let clock_ms = index as f64 * 1000.0 / args.fps;
            mesh.draw(width, height, &result, clock_ms);
            avatar.draw(&result);
        }

        fps.tick_with([&t_detect, &t_overlay, &t_scene]);
    }

    info!(
        "drew {} frames, {} meshes in scene",
        stats.count(),
        mesh.scene().mesh_count()
    );
    write_dump(&args.out.join("scene.json"), &mesh.scene().to_json()?)?;
    write_dump(&args.out.join("skeleton.json"), &avatar.skeleton().to_json()?)?;
    Ok(())
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse '{}'", path.display()))
}

fn list_frames(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("failed to list frames in '{}'", dir.display()))?
    {
        let path = entry?.path();
        if is_image_path(&path) {
            frames.push(path);
        }
    }
    frames.sort();
    info!("found {} frames in '{}'", frames.len(), dir.display());
    Ok(frames)
}

fn write_dump(path: &Path, json: &str) -> anyhow::Result<()> {
    fs::write(path, json).with_context(|| format!("failed to write '{}'", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}
