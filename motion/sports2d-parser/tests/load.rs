use std::path::PathBuf;

use nalgebra::Point2;
use test_log::test;

use sports2d_parser::{
    AnalysisOutputPaths, AnalysisSource, DEFAULT_SELECT_RADIUS_PX, Error, LoadOptions,
    TimeSeriesStore,
};

fn demo_paths() -> AnalysisOutputPaths {
    let video = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join("demo.mp4");
    AnalysisOutputPaths::for_video(video).unwrap()
}

fn demo_store(options: LoadOptions) -> TimeSeriesStore {
    let source = AnalysisSource::discover(&demo_paths()).unwrap();
    TimeSeriesStore::load(&source, options).unwrap()
}

#[test]
fn load_discovered_analysis() {
    let paths = demo_paths();
    let source = AnalysisSource::discover(&paths).unwrap();
    assert_eq!(source.metric_positions.as_ref(), Some(&paths.metric_positions));
    assert_eq!(source.angles.as_ref(), Some(&paths.angles));

    let store = TimeSeriesStore::load(&source, LoadOptions::default()).unwrap();
    assert_eq!(store.data_rate(), 30.0);
    assert_eq!(store.units(), Some("px"));
    assert_eq!(store.frame_count(), 8);
    assert_eq!(store.frame_limits(), Some([0, 7]));
    assert_eq!(store.joint_names(), ["Hip", "RKnee", "RAnkle", "Neck"]);
    assert_eq!(
        store.angle_names().collect::<Vec<_>>(),
        vec!["pelvis", "right knee", "trunk"]
    );
    assert!(store.has_metric_positions());

    let hip = store.series_for("Hip").unwrap();
    assert_eq!(hip.len(), 8);
    assert_eq!(hip.get(3).unwrap().position(), Point2::new(406.0, 300.0));

    let metric_hip = store.metric_series_for("Hip").unwrap();
    approx::assert_relative_eq!(metric_hip.get(3).unwrap().x, 2.03, epsilon = 1e-9);
}

#[test]
fn angle_rows_follow_position_rows() {
    let store = demo_store(LoadOptions::default());
    let knee = store.angle_series_for("right knee").unwrap();
    // The angle table has one more row than the position table.
    assert_eq!(knee.len(), store.frame_count());
    assert_eq!(knee.get(0).unwrap().degrees, 170.0);
    assert_eq!(knee.get(7).unwrap().degrees, 156.0);
    assert!(knee.get(8).is_none());
}

#[test]
fn zero_filled_samples_become_missing() {
    let store = demo_store(LoadOptions::default());
    let ankle = store.series_for("RAnkle").unwrap();
    let gap = ankle.get(4).unwrap();
    assert!(gap.x.is_nan());
    assert!(gap.y.is_nan());
    assert!(!gap.is_valid());
    assert!(ankle.get(5).unwrap().is_valid());

    let summary = store.summary();
    let ankle_summary = summary.joints.iter().find(|j| j.name == "RAnkle").unwrap();
    assert_eq!(ankle_summary.num_valid_samples, 7);

    let raw = demo_store(LoadOptions {
        zeros_as_missing: false,
    });
    let gap = raw.series_for("RAnkle").unwrap().get(4).unwrap();
    assert_eq!((gap.x, gap.y), (0.0, 0.0));
}

#[test]
fn unknown_names_are_not_found() {
    let store = demo_store(LoadOptions::default());
    assert!(matches!(store.series_for("LKnee"), Err(Error::NotFound(_))));
    assert!(matches!(
        store.angle_series_for("left knee"),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn metric_positions_are_optional() {
    let paths = demo_paths();
    let source = AnalysisSource::from_positions(&paths.pixel_positions);
    let store = TimeSeriesStore::load(&source, LoadOptions::default()).unwrap();
    assert!(!store.has_metric_positions());
    assert!(matches!(
        store.metric_series_for("Hip"),
        Err(Error::NotFound(_))
    ));
    assert_eq!(store.angle_names().count(), 0);
}

#[test]
fn nearest_joint_query() {
    let store = demo_store(LoadOptions::default());
    // Frame 0: Hip (400, 300), RKnee (410, 380), RAnkle (415, 460), Neck (400, 180).
    let near_knee = Point2::new(412.0, 370.0);
    assert_eq!(
        store.nearest_joint(0, near_knee, DEFAULT_SELECT_RADIUS_PX),
        Some("RKnee")
    );
    assert_eq!(store.nearest_joint(0, near_knee, 5.0), None);
    assert_eq!(store.nearest_joint(99, near_knee, 1000.0), None);

    // RAnkle is missing at frame 4 so the knee wins even when clicking
    // exactly on the last known ankle position.
    let ankle_spot = Point2::new(423.0, 460.0);
    assert_eq!(
        store.nearest_joint(4, ankle_spot, DEFAULT_SELECT_RADIUS_PX * 2.0),
        Some("RKnee")
    );
}

#[test]
fn missing_pixel_positions() {
    let dir = tempfile::tempdir().unwrap();
    let source = AnalysisSource::from_positions(dir.path().join("nope.trc"));
    assert!(matches!(
        TimeSeriesStore::load(&source, LoadOptions::default()),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn duplicate_frames_are_rejected() {
    let paths = demo_paths();
    let buf = std::fs::read_to_string(&paths.pixel_positions).unwrap();
    let buf = buf.replacen("\n3\t0.100000", "\n2\t0.100000", 1);
    let dir = tempfile::tempdir().unwrap();
    let trc = dir.path().join("dup.trc");
    std::fs::write(&trc, buf).unwrap();

    let source = AnalysisSource::from_positions(&trc);
    assert!(matches!(
        TimeSeriesStore::load(&source, LoadOptions::default()),
        Err(Error::Format(_))
    ));
}

#[test]
fn from_readers_matches_load() {
    let paths = demo_paths();
    let trc = std::fs::read(&paths.pixel_positions).unwrap();
    let mot = std::fs::read(&paths.angles).unwrap();
    let store =
        TimeSeriesStore::from_readers(&trc[..], Some(&mot[..]), LoadOptions::default()).unwrap();
    let loaded = demo_store(LoadOptions::default());
    assert_eq!(
        store.series_for("Neck").unwrap(),
        loaded.series_for("Neck").unwrap()
    );
    assert_eq!(
        store.angle_series_for("trunk").unwrap(),
        loaded.angle_series_for("trunk").unwrap()
    );

    let no_angles =
        TimeSeriesStore::from_readers(&trc[..], None::<&[u8]>, LoadOptions::default()).unwrap();
    assert_eq!(no_angles.frame_count(), 8);
}
