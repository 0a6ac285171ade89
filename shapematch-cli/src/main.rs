use clap::Parser;
use shapematch::io::{load_mask, load_rgb_image};
use shapematch::{
    Detector, DetectorConfig, Match, MatchConfig, PoseConfig, PoseDocument, PoseEnumerator,
    Sampling,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "ShapeMatch CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
enum Mode {
    #[default]
    Train,
    Test,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
struct TrainConfig {
    class_id: String,
    image_path: String,
    mask_path: Option<String>,
    poses: PoseConfig,
    /// Extract one template per scale and rotate its features for the
    /// remaining angles instead of rendering every pose.
    rotate_features: bool,
    /// Template document pattern with one `%s` for the class id.
    templates_pattern: String,
    /// Pose document pattern with one `%s` for the class id.
    poses_pattern: String,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            class_id: "part".to_string(),
            image_path: String::new(),
            mask_path: None,
            poses: PoseConfig::default(),
            rotate_features: true,
            templates_pattern: "%s_templ.yaml".to_string(),
            poses_pattern: "%s_info.yaml".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
struct TestConfig {
    class_ids: Vec<String>,
    image_path: String,
    templates_pattern: String,
    poses_pattern: Option<String>,
    threshold: f32,
    #[serde(rename = "match")]
    match_cfg: MatchConfig,
    output_path: Option<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            class_ids: vec!["part".to_string()],
            image_path: String::new(),
            templates_pattern: "%s_templ.yaml".to_string(),
            poses_pattern: Some("%s_info.yaml".to_string()),
            threshold: 90.0,
            match_cfg: MatchConfig::default(),
            output_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct Config {
    mode: Mode,
    detector: DetectorConfig,
    train: TrainConfig,
    test: TestConfig,
}

#[derive(Clone, Debug, Serialize)]
struct MatchRecord {
    #[serde(flatten)]
    detection: Match,
    angle: Option<f32>,
    scale: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Output {
    best: Option<MatchRecord>,
    matches: Vec<MatchRecord>,
}

fn expand(pattern: &str, class_id: &str) -> Result<String, Box<dyn std::error::Error>> {
    if pattern.matches("%s").count() != 1 {
        return Err(format!("pattern `{pattern}` must contain exactly one %s").into());
    }
    Ok(pattern.replace("%s", class_id))
}

fn example_config() -> Config {
    Config {
        mode: Mode::Train,
        detector: DetectorConfig::default(),
        train: TrainConfig {
            image_path: "train.png".to_string(),
            poses: PoseConfig {
                angles: Sampling::range(0.0, 360.0, 1.0),
                scales: Sampling::Fixed(1.0),
            },
            ..TrainConfig::default()
        },
        test: TestConfig {
            image_path: "test.png".to_string(),
            ..TestConfig::default()
        },
    }
}

fn train(detector: &mut Detector, cfg: &TrainConfig) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.image_path.is_empty() {
        return Err("train.image_path must be set in the config".into());
    }
    let image = load_rgb_image(&cfg.image_path)?;
    let mask = cfg.mask_path.as_ref().map(load_mask).transpose()?;
    let shapes = PoseEnumerator::new(image.view(), mask.as_ref().map(|m| m.view()))?;
    let poses = shapes.produce_poses(&cfg.poses)?;

    let mut doc = PoseDocument::new(&cfg.class_id, image.width(), image.height());
    // Poses are ordered scale-major; each scale gets its own extracted base.
    let mut base: Option<(f32, f32, usize)> = None;
    for pose in poses {
        let derived = match base {
            Some((scale, angle, source_id)) if cfg.rotate_features && scale == pose.scale => {
                Some(detector.add_template_rotate(
                    &cfg.class_id,
                    source_id,
                    pose.angle - angle,
                    shapes.center(),
                )?)
            }
            _ => None,
        };
        let id = match derived {
            Some(id) => id,
            None => {
                let (pose_image, pose_mask) = shapes.render(&pose)?;
                let added =
                    detector.add_template(pose_image.view(), &cfg.class_id, Some(pose_mask.view()));
                match added {
                    Ok(id) => {
                        base = Some((pose.scale, pose.angle, id));
                        id
                    }
                    Err(err) if err.is_recoverable() => {
                        tracing::warn!(
                            angle = pose.angle,
                            scale = pose.scale,
                            %err,
                            "pose skipped"
                        );
                        continue;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        };
        doc.push(pose, id);
    }

    tracing::info!(
        class_id = cfg.class_id.as_str(),
        templates = doc.records.len(),
        "training done"
    );
    detector.write_classes(&cfg.templates_pattern)?;
    doc.save(expand(&cfg.poses_pattern, &cfg.class_id)?)?;
    Ok(())
}

fn test(detector: &mut Detector, cfg: &TestConfig) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.image_path.is_empty() {
        return Err("test.image_path must be set in the config".into());
    }
    let report = match &cfg.poses_pattern {
        Some(pose_pattern) => detector.read_classes_with_poses(
            &cfg.class_ids,
            &cfg.templates_pattern,
            pose_pattern,
        )?,
        None => detector.read_classes(&cfg.class_ids, &cfg.templates_pattern)?,
    };
    for (class_id, err) in &report.failed {
        tracing::warn!(class_id = class_id.as_str(), %err, "class not loaded");
    }
    if report.loaded.is_empty() {
        return Err("no requested class could be loaded".into());
    }
    let poses = &report.poses;

    let image = load_rgb_image(&cfg.image_path)?;
    let matches =
        detector.match_image_with(image.view(), cfg.threshold, &report.loaded, &cfg.match_cfg)?;
    let records: Vec<MatchRecord> = matches
        .into_iter()
        .map(|detection| {
            let pose = poses
                .get(&detection.class_id)
                .and_then(|doc: &PoseDocument| doc.pose_of(detection.template_id));
            MatchRecord {
                angle: pose.map(|p| p.angle),
                scale: pose.map(|p| p.scale),
                detection,
            }
        })
        .collect();

    let output = Output {
        best: records.first().cloned(),
        matches: records,
    };
    let json = serde_json::to_string_pretty(&output)?;
    match &cfg.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env()
                    .add_directive("shapematch=info".parse()?)
                    .add_directive("shapematch_cli=info".parse()?),
            )
            .with_target(false)
            .init();
    }

    if cli.print_example {
        println!("{}", serde_json::to_string_pretty(&example_config())?);
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    let mut detector = Detector::new(config.detector)?;
    match config.mode {
        Mode::Train => train(&mut detector, &config.train),
        Mode::Test => test(&mut detector, &config.test),
    }
}
