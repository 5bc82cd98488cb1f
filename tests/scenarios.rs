use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};
use tempfile::{tempdir, TempDir};

use pano_masker::{
    config::Settings,
    error::{ConfigError, CompositorError},
    monitor::{Orchestrator, TickOutcome},
    output::output_number,
    state::StateRecord,
};

const WIDTH: u32 = 3840;
const HEIGHT: u32 = 1280;

struct Installation {
    _dir: TempDir,
    settings: Settings,
}

impl Installation {
    fn new(mapping: &str) -> Self {
        let dir = tempdir().unwrap();
        let root = dir.path();

        let mut settings = Settings::default();
        settings.paths.landscapes_dir = root.join("landscapes");
        settings.paths.mapping_file = root.join("mask_mapping.json");
        settings.paths.state_file = root.join("tmpl.log");
        settings.paths.results_dir = root.join("results");
        settings.masks.load_threads = 2;

        std::fs::create_dir_all(settings.paths.panorama_dir("P01")).unwrap();
        std::fs::write(&settings.paths.mapping_file, mapping).unwrap();

        Self { _dir: dir, settings }
    }

    fn pano_dir(&self) -> PathBuf {
        self.settings.paths.panorama_dir("P01")
    }

    fn write_state(&self, content: &str) {
        std::fs::write(&self.settings.paths.state_file, content).unwrap();
    }

    fn results(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.settings.paths.results_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        paths.sort();
        paths
    }

    fn bootstrap(&self) -> Result<Orchestrator, CompositorError> {
        Orchestrator::bootstrap(&self.settings, "P01")
    }
}

fn save_mask(path: &Path, width: u32, height: u32, covered: impl Fn(u32, u32) -> bool) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    GrayImage::from_fn(width, height, |x, y| Luma([if covered(x, y) { 255 } else { 0 }]))
        .save(path)
        .unwrap();
}

/// Static "10" covers the left quarter; sequence 35 frame 3 covers the top band
fn standard_installation() -> Installation {
    let install = Installation::new(
        r#"{"P01": {"static_masks": {"10": 1}, "sequence_masks": {"35": 2}}}"#,
    );
    let pano = install.pano_dir();
    save_mask(&pano.join("P01_10.png"), WIDTH, HEIGHT, |x, _| x < 960);
    for frame in 1..=3 {
        save_mask(
            &pano.join("P01_35").join(format!("wave_{}.bmp", frame)),
            WIDTH,
            HEIGHT,
            move |_, y| y < 100 * frame,
        );
    }
    install
}

#[test]
fn state_change_writes_layered_composite() {
    let install = standard_installation();
    let mut orchestrator = install.bootstrap().unwrap();

    install.write_state("35:3");
    let TickOutcome::Written { number, path } = orchestrator.tick() else {
        panic!("Expected a composite to be written");
    };
    assert_eq!(number, 1);
    assert_eq!(output_number(&path), Some(1));

    let image = image::open(&path).unwrap().to_luma8();
    assert_eq!(image.dimensions(), (WIDTH, HEIGHT));
    // Dynamic mask wins where both cover
    assert_eq!(image.get_pixel(10, 10).0[0], 2);
    assert_eq!(image.get_pixel(3000, 299).0[0], 2);
    // Static only
    assert_eq!(image.get_pixel(10, 600).0[0], 1);
    // Background
    assert_eq!(image.get_pixel(3000, 600).0[0], 0);
}

#[test]
fn out_of_range_sequence_is_ignored() {
    let mut install = standard_installation();
    install.settings.monitor.max_sequence = 40;
    let mut orchestrator = install.bootstrap().unwrap();

    install.write_state("35:1");
    assert!(matches!(orchestrator.tick(), TickOutcome::Written { .. }));

    install.write_state("99:1");
    assert!(matches!(orchestrator.tick(), TickOutcome::Skipped { .. }));
    assert_eq!(install.results().len(), 1);
    assert_eq!(
        orchestrator.current_state(),
        Some(StateRecord::Active { sequence: 35, frame: 1 })
    );
}

#[test]
fn wrong_dimensions_abort_startup() {
    let install = standard_installation();
    save_mask(&install.pano_dir().join("P01_10.png"), WIDTH - 1, HEIGHT, |_, _| false);

    match install.bootstrap() {
        Err(CompositorError::Dimension(e)) => {
            assert_eq!(e.actual_width, WIDTH - 1);
            assert_eq!(e.expected_width, WIDTH);
        }
        Err(e) => panic!("Expected a dimension error, got {}", e),
        Ok(_) => panic!("Expected bootstrap to fail"),
    }
}

#[test]
fn unchanged_state_writes_once() {
    let install = standard_installation();
    let mut orchestrator = install.bootstrap().unwrap();

    install.write_state("35:2");
    for _ in 0..5 {
        orchestrator.tick();
    }
    assert_eq!(install.results().len(), 1);

    install.write_state("35:3");
    orchestrator.tick();
    orchestrator.tick();
    assert_eq!(install.results().len(), 2);
}

#[test]
fn bad_sequence_frame_only_skips_its_own_state() {
    let install = standard_installation();
    let frame_2 = install.pano_dir().join("P01_35").join("wave_2.bmp");
    GrayImage::from_pixel(WIDTH, HEIGHT, Luma([128])).save(&frame_2).unwrap();

    let mut orchestrator = install.bootstrap().unwrap();
    assert_eq!(orchestrator.store().frame_count(), 2);

    install.write_state("35:1");
    assert!(matches!(orchestrator.tick(), TickOutcome::Written { number: 1, .. }));

    install.write_state("35:2");
    assert!(matches!(orchestrator.tick(), TickOutcome::Skipped { .. }));

    install.write_state("35:3");
    assert!(matches!(orchestrator.tick(), TickOutcome::Written { number: 2, .. }));
    assert_eq!(install.results().len(), 2);
}

#[test]
fn key_collision_fails_startup() {
    let install = Installation::new(
        r#"{"P01": {"static_masks": {"35": 1}, "sequence_masks": {"35": 2}}}"#,
    );
    assert!(matches!(
        install.bootstrap(),
        Err(CompositorError::Config(ConfigError::KeyCollision { .. }))
    ));
}

#[test]
fn index_collision_fails_startup() {
    let install = Installation::new(
        r#"{"P01": {"static_masks": {"10": 4}, "sequence_masks": {"35": 4}}}"#,
    );
    assert!(matches!(
        install.bootstrap(),
        Err(CompositorError::Config(ConfigError::IndexCollision { index: 4, .. }))
    ));
}

#[test]
fn unknown_panorama_fails_startup() {
    let install = standard_installation();
    assert!(matches!(
        Orchestrator::bootstrap(&install.settings, "P02"),
        Err(CompositorError::Config(ConfigError::UnknownPanorama { .. }))
    ));
}

#[test]
fn single_mask_footprint_survives_output() {
    let install = Installation::new(r#"{"P01": {"static_masks": {"sky": 9}}}"#);
    let covered = |x: u32, y: u32| (x / 64 + y / 64) % 2 == 0;
    save_mask(&install.pano_dir().join("P01_sky.bmp"), WIDTH, HEIGHT, covered);
    let mut orchestrator = install.bootstrap().unwrap();

    install.write_state("none");
    let TickOutcome::Written { path, .. } = orchestrator.tick() else {
        panic!("Expected a composite to be written");
    };

    let image = image::open(&path).unwrap().to_luma8();
    for (x, y, pixel) in image.enumerate_pixels() {
        let expected = if covered(x, y) { 9 } else { 0 };
        assert_eq!(pixel.0[0], expected, "pixel ({}, {})", x, y);
    }
}

#[test]
fn counter_continues_across_restarts() {
    let install = standard_installation();

    let mut first = install.bootstrap().unwrap();
    install.write_state("35:1");
    first.tick();
    drop(first);

    let mut second = install.bootstrap().unwrap();
    assert_eq!(second.last_output(), 1);
    install.write_state("35:2");
    assert!(matches!(second.tick(), TickOutcome::Written { number: 2, .. }));
}
