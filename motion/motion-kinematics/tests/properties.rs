use std::sync::Arc;

use approx::assert_relative_eq;
use nalgebra::Point2;
use test_log::test;

use motion_kinematics::{
    AnalysisSession, CalibrationTransform, Error, SessionConfig, SmoothingConfig, derive_angular,
    derive_linear, smooth,
};
use motion_types::{AngleSample, FrameRange, PositionSample};
use sports2d_parser::{LoadOptions, TimeSeriesStore};

const FRAME_RATE: f64 = 30.0;

fn positions(n: u64, f: impl Fn(f64) -> (f64, f64)) -> Vec<PositionSample> {
    (0..n)
        .map(|frame_index| {
            let (x, y) = f(frame_index as f64);
            PositionSample {
                frame_index,
                position: Point2::new(x, y),
            }
        })
        .collect()
}

/// A position table with one marker per entry of `joints`, each given as a
/// function of the frame index.
fn trc_table(n: u64, joints: &[(&str, &dyn Fn(f64) -> (f64, f64))]) -> String {
    let mut buf = String::new();
    buf.push_str("PathFileType\t4\t(X/Y/Z)\tsynthetic.trc\n");
    buf.push_str("DataRate\tCameraRate\tNumFrames\tNumMarkers\tUnits\n");
    buf.push_str(&format!("{FRAME_RATE}\t{FRAME_RATE}\t{n}\t{}\tpx\n", joints.len()));
    buf.push_str("Frame#\tTime");
    for (name, _) in joints {
        buf.push_str(&format!("\t{name}\t\t"));
    }
    buf.push('\n');
    buf.push('\t');
    for i in 1..=joints.len() {
        buf.push_str(&format!("\tX{i}\tY{i}\tZ{i}"));
    }
    buf.push_str("\n\n");
    for frame in 0..n {
        buf.push_str(&format!("{frame}\t{}", frame as f64 / FRAME_RATE));
        for (_, f) in joints {
            let (x, y) = f(frame as f64);
            buf.push_str(&format!("\t{x}\t{y}\t0.0"));
        }
        buf.push('\n');
    }
    buf
}

fn store_from(trc: &str) -> Arc<TimeSeriesStore> {
    Arc::new(
        TimeSeriesStore::from_readers(trc.as_bytes(), None::<&[u8]>, LoadOptions::default())
            .unwrap(),
    )
}

#[test]
fn smoothing_is_deterministic() {
    let series: Vec<f64> = (0..200)
        .map(|i| (i as f64 * 0.1).sin() * 40.0 + ((i * 7919) % 13) as f64)
        .collect();
    let a = smooth(&series, 11, 3).unwrap();
    let b = smooth(&series, 11, 3).unwrap();
    assert_eq!(a.len(), series.len());
    assert!(a.iter().zip(&b).all(|(x, y)| x.to_bits() == y.to_bits()));

    // Smoothing twice smooths more; it is not required to be a no-op.
    let twice = smooth(&a, 11, 3).unwrap();
    assert_eq!(twice.len(), series.len());
}

#[test]
fn constant_velocity() {
    let (dx, dy) = (2.5, -1.25);
    let samples = positions(40, |i| (i * dx, i * dy));
    let dt = 1.0 / FRAME_RATE;
    let frames = derive_linear(&samples, FRAME_RATE, 1.0).unwrap();
    assert_eq!(frames.len(), samples.len());
    for frame in &frames {
        assert_relative_eq!(frame.velocity.x, dx / dt, epsilon = 1e-9);
        assert_relative_eq!(frame.velocity.y, dy / dt, epsilon = 1e-9);
        assert_relative_eq!(frame.acceleration.x, 0.0, epsilon = 1e-7);
        assert_relative_eq!(frame.acceleration.y, 0.0, epsilon = 1e-7);
    }
}

#[test]
fn constant_acceleration() {
    let a = 9.81;
    let slowmo = 4.0;
    let dt = slowmo / FRAME_RATE;
    let samples = positions(60, |i| (0.0, 0.5 * a * (i * dt) * (i * dt)));
    let frames = derive_linear(&samples, FRAME_RATE, slowmo).unwrap();
    for frame in &frames {
        let t = frame.frame_index as f64 * dt;
        assert_relative_eq!(frame.velocity.y, a * t, epsilon = 1e-9);
        assert_relative_eq!(frame.acceleration.y, a, epsilon = 1e-8);
        assert_relative_eq!(frame.acceleration_magnitude, a, epsilon = 1e-8);
    }
}

#[test]
fn doubling_slowmo_halves_velocity_and_quarters_acceleration() {
    let samples = positions(50, |i| ((i * 0.3).sin() * 80.0 + i, (i * 0.05).cos() * 30.0));
    let normal = derive_linear(&samples, FRAME_RATE, 1.0).unwrap();
    let slow = derive_linear(&samples, FRAME_RATE, 2.0).unwrap();
    for (n, s) in normal.iter().zip(&slow) {
        assert_eq!(s.velocity.x, n.velocity.x / 2.0);
        assert_eq!(s.velocity.y, n.velocity.y / 2.0);
        assert_eq!(s.speed, n.speed / 2.0);
        assert_eq!(s.acceleration.x, n.acceleration.x / 4.0);
        assert_eq!(s.acceleration.y, n.acceleration.y / 4.0);
    }

    let angles: Vec<AngleSample> = (0..50)
        .map(|i| AngleSample {
            frame_index: i,
            degrees: 120.0 + (i as f64 * 0.2).sin() * 25.0,
        })
        .collect();
    let normal = derive_angular(&angles, FRAME_RATE, 1.5).unwrap();
    let slow = derive_angular(&angles, FRAME_RATE, 3.0).unwrap();
    for (n, s) in normal.iter().zip(&slow) {
        assert_eq!(s.angular_velocity_deg_s, n.angular_velocity_deg_s / 2.0);
        assert_eq!(s.angular_accel_deg_s2, n.angular_accel_deg_s2 / 4.0);
    }
}

#[test]
fn doubling_slowmo_in_a_smoothed_session() {
    let trc = trc_table(
        40,
        &[("RWrist", &|i: f64| ((i * 0.4).sin() * 50.0 + 300.0, i * i * 0.1 + 200.0))],
    );
    let config = SessionConfig {
        smoothing: SmoothingConfig {
            window_length: 7,
            polynomial_order: 2,
            smooth_positions: true,
            smooth_derivatives: true,
        },
        ..Default::default()
    };
    let session = AnalysisSession::from_config(store_from(&trc), &config).unwrap();
    let slow = session.with_slowmo_factor(2.0).unwrap();
    let normal = session
        .linear_kinematics("RWrist", &FrameRange::all())
        .unwrap();
    let halved = slow.linear_kinematics("RWrist", &FrameRange::all()).unwrap();
    for (n, s) in normal.frames.iter().zip(&halved.frames) {
        assert_eq!(s.position, n.position);
        assert_eq!(s.velocity.x, n.velocity.x / 2.0);
        assert_eq!(s.acceleration.y, n.acceleration.y / 4.0);
    }
}

#[test]
fn calibration_round_trip() {
    for (a, b, length) in [
        (Point2::new(0.0, 0.0), Point2::new(3.0, 4.0), 5.0),
        (Point2::new(12.5, 640.0), Point2::new(871.25, 633.5), 1.8),
        (Point2::new(-40.0, 10.0), Point2::new(-40.0, 11.5), 0.03),
    ] {
        let cal = CalibrationTransform::from_reference(a, b, length).unwrap();
        let (ax, ay) = cal.to_metric(a.x, a.y);
        let (bx, by) = cal.to_metric(b.x, b.y);
        let d = nalgebra::distance(&Point2::new(ax, ay), &Point2::new(bx, by));
        assert_relative_eq!(d, length, max_relative = 16.0 * f64::EPSILON);
    }

    let cal = CalibrationTransform::from_reference(
        Point2::new(0.0, 0.0),
        Point2::new(3.0, 4.0),
        5.0,
    )
    .unwrap();
    assert_eq!(cal.to_metric(3.0, 4.0), (3.0, 4.0));
}

#[test]
fn joint_relative_to_itself_is_zero() {
    let trc = trc_table(
        20,
        &[
            ("Hip", &|i: f64| (400.0 + i, 300.0)),
            ("RAnkle", &|i: f64| if i == 5.0 { (0.0, 0.0) } else { (410.0 + 2.0 * i, 460.0 - i) }),
        ],
    );
    let session = AnalysisSession::new(store_from(&trc)).unwrap();
    let traj = session
        .trajectories()
        .relative_trajectory("RAnkle", "RAnkle", &FrameRange::all())
        .unwrap();
    // Frame 5 was not tracked.
    assert_eq!(traj.points.len(), 19);
    for p in &traj.points {
        assert_eq!(p.position, Point2::origin());
    }
    assert_eq!(traj.path_length(), 0.0);
}

#[test]
fn malformed_and_unknown() {
    let good = trc_table(6, &[("Hip", &|i: f64| (i, i))]);
    let duplicated = good.replacen("\n3\t", "\n2\t", 1);
    assert!(matches!(
        TimeSeriesStore::from_readers(duplicated.as_bytes(), None::<&[u8]>, LoadOptions::default()),
        Err(sports2d_parser::Error::Format(_))
    ));
    let decreasing = good.replacen("\n4\t", "\n1\t", 1);
    assert!(matches!(
        TimeSeriesStore::from_readers(decreasing.as_bytes(), None::<&[u8]>, LoadOptions::default()),
        Err(sports2d_parser::Error::Format(_))
    ));

    let session = AnalysisSession::new(store_from(&good)).unwrap();
    assert!(matches!(
        session.linear_kinematics("Neck", &FrameRange::all()),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        session.angular_kinematics("trunk", &FrameRange::all()),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn malformed_analysis_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("clip.mp4");
    let out = dir.path().join("clip_Sports2D");
    std::fs::create_dir(&out).unwrap();
    let trc = trc_table(6, &[("Hip", &|i: f64| (i, i))]).replacen("\n3\t", "\n2\t", 1);
    std::fs::write(out.join("clip_Sports2D_px_person00.trc"), trc).unwrap();

    assert!(matches!(
        AnalysisSession::open_video(&video, &SessionConfig::default()),
        Err(Error::Format(_))
    ));
    assert!(matches!(
        AnalysisSession::open_video(dir.path().join("missing.mp4"), &SessionConfig::default()),
        Err(Error::NotFound(_))
    ));

    // Undecodable bytes in a data row.
    let video = dir.path().join("garbled.mp4");
    let out = dir.path().join("garbled_Sports2D");
    std::fs::create_dir(&out).unwrap();
    let trc = trc_table(6, &[("Hip", &|i: f64| (i, i))]);
    let mut bytes = Vec::new();
    for (i, line) in trc.lines().enumerate() {
        bytes.extend_from_slice(line.as_bytes());
        if i == 8 {
            bytes.extend_from_slice(b"\t\xff\xfe");
        }
        bytes.push(b'\n');
    }
    std::fs::write(out.join("garbled_Sports2D_px_person00.trc"), bytes).unwrap();
    assert!(matches!(
        AnalysisSession::open_video(&video, &SessionConfig::default()),
        Err(Error::Format(_))
    ));
}

#[test]
fn short_series_give_empty_results() {
    assert!(derive_linear(&[], FRAME_RATE, 1.0).unwrap().is_empty());
    let one = positions(1, |i| (i, i));
    assert!(derive_linear(&one, FRAME_RATE, 1.0).unwrap().is_empty());

    assert!(derive_angular(&[], FRAME_RATE, 1.0).unwrap().is_empty());
    let one = [AngleSample {
        frame_index: 7,
        degrees: 45.0,
    }];
    assert!(derive_angular(&one, FRAME_RATE, 1.0).unwrap().is_empty());
}

#[test]
fn nan_reaches_the_caller() {
    let mut samples = positions(12, |i| (i, 2.0 * i));
    samples[6].position.y = f64::NAN;
    let frames = derive_linear(&samples, FRAME_RATE, 1.0).unwrap();
    assert!(frames[5].velocity.y.is_nan());
    assert!(frames[5].speed.is_nan());
    assert!(frames[6].position.y.is_nan());
    assert!(frames[0].velocity.y.is_finite());
}
