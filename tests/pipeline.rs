use approx::assert_relative_eq;

use posevis::avatar::{AvatarModel, AvatarRenderer, Skeleton};
use posevis::config::DetectorConfig;
use posevis::filter::Smoothing;
use posevis::image::{Color, Image};
use posevis::interpolate::Interpolator;
use posevis::mesh::MeshRenderer;
use posevis::overlay::Overlay;
use posevis::result::DetectionResult;
use posevis::worker::{DetectionClient, InputTensor, ReplayDetector};

/// One body with both arms, moving to the right by 2 pixels per frame.
fn recording(frames: usize) -> String {
    (0..frames)
        .map(|i| {
            let dx = 2.0 * i as f32;
            let kpt = |part: &str, x: f32, y: f32| {
                format!(
                    r#"{{ "part": "{part}", "position": [{}, {y}, 0], "positionRaw": [{}, {}, 0], "score": 0.9 }}"#,
                    x + dx,
                    (x + dx) / 200.0,
                    y / 200.0
                )
            };
            let keypoints = [
                kpt("leftEye", 95.0, 40.0),
                kpt("rightEye", 105.0, 40.0),
                kpt("leftShoulder", 80.0, 70.0),
                kpt("rightShoulder", 120.0, 70.0),
                kpt("leftElbow", 70.0, 100.0),
                kpt("rightElbow", 130.0, 100.0),
                kpt("leftWrist", 65.0, 130.0),
                kpt("rightWrist", 135.0, 130.0),
            ];
            let arm = format!(
                r#"{{ "LeftArm": [[[{}, 70], [{}, 100], [{}, 130]]] }}"#,
                80.0 + dx,
                70.0 + dx,
                65.0 + dx
            );
            format!(
                r#"{{ "body": [{{ "score": 0.9, "keypoints": [{}], "annotations": {arm} }}], "timestamp": {} }}"#,
                keypoints.join(", "),
                1000 + 33 * i
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn replay_drives_all_back_ends() {
    let results = DetectionResult::from_json_lines(&recording(5)).unwrap();
    assert_eq!(results.len(), 5);

    let mut client = DetectionClient::spawn(move |_: &DetectorConfig| {
        ReplayDetector::new(results.clone())
    })
    .unwrap();
    let mut config = DetectorConfig::default();
    config.filter.width = 50;
    config.filter.height = 50;
    client.init(&config);

    let mut interpolator = Interpolator::new(Smoothing::Off);
    let overlay = Overlay::new(Vec::new());
    let mut mesh = MeshRenderer::new();
    let mut avatar = AvatarRenderer::new(Skeleton::humanoid(), AvatarModel::YBot);

    let frame = Image::new(200, 200);
    let mut canvas = Image::new(200, 200);
    for i in 0..5 {
        assert!(client.request_detect(InputTensor::from_image(&frame, &config.filter), &config));
        let response = client.receive().unwrap().unwrap();
        assert_eq!(response.state.num_bytes, 50 * 50 * 3 * 4);

        let result = interpolator.next(&response.result);
        overlay.draw(&mut canvas, Some(&frame), 200, 200, &result);
        mesh.draw(200, 200, &result, i as f64 * 100.0);
        assert_eq!(avatar.draw(&result), 4);
    }

    // Shoulder keypoint of the last frame.
    assert_ne!(canvas.get(88, 70), Color::NULL);

    let scene = mesh.scene();
    assert!(mesh.is_initialized());
    assert!(scene.contains("LeftArm0"));
    assert!(scene.contains("neck"));
    assert!(scene.contains("head"));
    let json: serde_json::Value = serde_json::from_str(&scene.to_json().unwrap()).unwrap();
    assert!(json["meshes"]["head"].is_object());

    let skeleton = avatar.skeleton();
    assert!(skeleton.bone("LeftForeArm").unwrap().rotation().is_some());
    assert!(skeleton.bone("LeftUpLeg").unwrap().rotation().is_none());
}

#[test]
fn camera_frames_first_body() {
    let results = DetectionResult::from_json_lines(&recording(1)).unwrap();
    let mut mesh = MeshRenderer::new();
    mesh.draw(200, 200, &results[0], 0.0);
    // The camera move starts on the next tick and takes one second.
    mesh.draw(200, 200, &results[0], 100.0);
    mesh.draw(200, 200, &results[0], 1500.0);

    let camera = &mesh.scene().camera;
    // positionRaw spans x 0.325..0.675 and y 0.2..0.65.
    assert_relative_eq!(camera.target().x, 0.5, epsilon = 1e-5);
    assert_relative_eq!(camera.target().y, 0.425, epsilon = 1e-5);
    assert_relative_eq!(camera.position().z, -13.0, epsilon = 1e-3);
}

#[test]
fn smoothing_lags_behind_motion() {
    let results = DetectionResult::from_json_lines(&recording(3)).unwrap();
    let mut interpolator = Interpolator::default();
    let smoothed = results
        .iter()
        .map(|res| interpolator.next(res))
        .collect::<Vec<_>>();

    let x = |res: &DetectionResult| res.body[0].keypoint("leftShoulder").unwrap().position.x;
    assert_relative_eq!(x(&smoothed[0]), x(&results[0]));
    assert!(x(&smoothed[2]) < x(&results[2]));
    assert!(x(&smoothed[2]) > x(&results[0]));
}

#[test]
fn results_map_from_detector_input_to_frame() {
    let result = DetectionResult::from_json(
        r#"{ "body": [{ "score": 0.9, "keypoints": [
            { "part": "nose", "position": [256, 256, 0], "positionRaw": [0.5, 0.5, 0], "score": 0.9 }
        ] }], "timestamp": 0 }"#,
    )
    .unwrap();
    let config = DetectorConfig::default();
    let frame = Image::new(1024, 1024);

    // The detector sees the frame resized to the filter size.
    let input = InputTensor::from_image(&frame, &config.filter);
    let (width, height) = config.filter.input_size(frame.width(), frame.height());
    assert_eq!((input.width(), input.height()), (width, height));
    assert_eq!((width, height), (512, 512));

    let mut canvas = Image::new(frame.width(), frame.height());
    Overlay::new(Vec::new()).draw(&mut canvas, None, width, height, &result);
    assert_ne!(canvas.get(512, 512), Color::NULL);
    assert_eq!(canvas.get(256, 256), Color::NULL);
}
