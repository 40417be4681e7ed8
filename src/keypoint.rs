//! Body keypoint and avatar bone tables.

/// The body keypoints reported by the BlazePose family of models.
///
/// The first 33 are predicted by the network, the remaining ones are derived by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keypoint {
    Nose = 0,
    LeftEyeInside = 1,
    LeftEye = 2,
    LeftEyeOutside = 3,
    RightEyeInside = 4,
    RightEye = 5,
    RightEyeOutside = 6,
    LeftEar = 7,
    RightEar = 8,
    LeftMouth = 9,
    RightMouth = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFoot = 31,
    RightFoot = 32,
    BodyCenter = 33,
    BodyTop = 34,
    /// Z coordinate is unreliable.
    LeftPalm = 35,
    /// Z coordinate is unreliable. Close to [`Keypoint::LeftWrist`].
    LeftHand = 36,
    /// Z coordinate is unreliable.
    RightPalm = 37,
    /// Z coordinate is unreliable. Close to [`Keypoint::RightWrist`].
    RightHand = 38,
}

impl Keypoint {
    pub const COUNT: usize = 39;

    pub const ALL: [Keypoint; Self::COUNT] = {
        use Keypoint::*;
        [
            Nose,
            LeftEyeInside,
            LeftEye,
            LeftEyeOutside,
            RightEyeInside,
            RightEye,
            RightEyeOutside,
            LeftEar,
            RightEar,
            LeftMouth,
            RightMouth,
            LeftShoulder,
            RightShoulder,
            LeftElbow,
            RightElbow,
            LeftWrist,
            RightWrist,
            LeftPinky,
            RightPinky,
            LeftIndex,
            RightIndex,
            LeftThumb,
            RightThumb,
            LeftHip,
            RightHip,
            LeftKnee,
            RightKnee,
            LeftAnkle,
            RightAnkle,
            LeftHeel,
            RightHeel,
            LeftFoot,
            RightFoot,
            BodyCenter,
            BodyTop,
            LeftPalm,
            LeftHand,
            RightPalm,
            RightHand,
        ]
    };

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Returns the name the engine uses for this keypoint.
    pub fn name(self) -> &'static str {
        use Keypoint::*;
        match self {
            Nose => "nose",
            LeftEyeInside => "leftEyeInside",
            LeftEye => "leftEye",
            LeftEyeOutside => "leftEyeOutside",
            RightEyeInside => "rightEyeInside",
            RightEye => "rightEye",
            RightEyeOutside => "rightEyeOutside",
            LeftEar => "leftEar",
            RightEar => "rightEar",
            LeftMouth => "leftMouth",
            RightMouth => "rightMouth",
            LeftShoulder => "leftShoulder",
            RightShoulder => "rightShoulder",
            LeftElbow => "leftElbow",
            RightElbow => "rightElbow",
            LeftWrist => "leftWrist",
            RightWrist => "rightWrist",
            LeftPinky => "leftPinky",
            RightPinky => "rightPinky",
            LeftIndex => "leftIndex",
            RightIndex => "rightIndex",
            LeftThumb => "leftThumb",
            RightThumb => "rightThumb",
            LeftHip => "leftHip",
            RightHip => "rightHip",
            LeftKnee => "leftKnee",
            RightKnee => "rightKnee",
            LeftAnkle => "leftAnkle",
            RightAnkle => "rightAnkle",
            LeftHeel => "leftHeel",
            RightHeel => "rightHeel",
            LeftFoot => "leftFoot",
            RightFoot => "rightFoot",
            BodyCenter => "bodyCenter",
            BodyTop => "bodyTop",
            LeftPalm => "leftPalm",
            LeftHand => "leftHand",
            RightPalm => "rightPalm",
            RightHand => "rightHand",
        }
    }

    /// Parses a keypoint name.
    ///
    /// The first letter is matched case-insensitively, so both `leftShoulder` and `LeftShoulder`
    /// are accepted.
    pub fn from_name(name: &str) -> Option<Keypoint> {
        let mut chars = name.chars();
        let first = chars.next()?.to_ascii_lowercase();
        let rest = chars.as_str();
        Self::ALL.into_iter().find(|kpt| {
            let canonical = kpt.name();
            canonical.starts_with(first) && &canonical[1..] == rest
        })
    }
}

/// Named chains of connected keypoints, in drawing order.
pub const CONNECTED: &[(&str, &[Keypoint])] = {
    use Keypoint::*;
    &[
        ("LeftLeg", &[LeftHip, LeftKnee, LeftAnkle, LeftHeel, LeftFoot]),
        ("RightLeg", &[RightHip, RightKnee, RightAnkle, RightHeel, RightFoot]),
        (
            "torso",
            &[LeftShoulder, RightShoulder, RightHip, LeftHip, LeftShoulder, RightShoulder],
        ),
        ("LeftArm", &[LeftShoulder, LeftElbow, LeftWrist, LeftPalm]),
        ("RightArm", &[RightShoulder, RightElbow, RightWrist, RightPalm]),
        ("LeftEye", &[LeftEyeInside, LeftEye, LeftEyeOutside]),
        ("RightEye", &[RightEyeInside, RightEye, RightEyeOutside]),
        ("mouth", &[LeftMouth, RightMouth]),
    ]
};

/// Bone names of the humanoid avatar rig, parents before children.
pub const AVATAR_BONES: &[&str] = &[
    "Hips",
    "Spine",
    "Spine1",
    "Spine2",
    "Neck",
    "Head",
    "HeadTop_End",
    "LeftEye",
    "RightEye",
    "LeftShoulder",
    "LeftArm",
    "LeftForeArm",
    "LeftHand",
    "LeftHandMiddle1",
    "LeftHandMiddle2",
    "LeftHandMiddle3",
    "LeftHandMiddle4",
    "LeftHandThumb1",
    "LeftHandThumb2",
    "LeftHandThumb3",
    "LeftHandThumb4",
    "LeftHandIndex1",
    "LeftHandIndex2",
    "LeftHandIndex3",
    "LeftHandIndex4",
    "LeftHandRing1",
    "LeftHandRing2",
    "LeftHandRing3",
    "LeftHandRing4",
    "LeftHandPinky1",
    "LeftHandPinky2",
    "LeftHandPinky3",
    "LeftHandPinky4",
    "RightShoulder",
    "RightArm",
    "RightForeArm",
    "RightHand",
    "RightHandMiddle1",
    "RightHandMiddle2",
    "RightHandMiddle3",
    "RightHandMiddle4",
    "RightHandThumb1",
    "RightHandThumb2",
    "RightHandThumb3",
    "RightHandThumb4",
    "RightHandIndex1",
    "RightHandIndex2",
    "RightHandIndex3",
    "RightHandIndex4",
    "RightHandRing1",
    "RightHandRing2",
    "RightHandRing3",
    "RightHandRing4",
    "RightHandPinky1",
    "RightHandPinky2",
    "RightHandPinky3",
    "RightHandPinky4",
    "RightUpLeg",
    "RightLeg",
    "RightFoot",
    "RightToeBase",
    "RightToe_End",
    "LeftUpLeg",
    "LeftLeg",
    "LeftFoot",
    "LeftToeBase",
    "LeftToe_End",
];

/// Keypoint segments and the avatar bone each of them orients.
pub const BONE_PAIRS: &[(Keypoint, Keypoint, &str)] = {
    use Keypoint::*;
    &[
        (LeftShoulder, LeftElbow, "LeftArm"),
        (LeftElbow, LeftWrist, "LeftForeArm"),
        (RightShoulder, RightElbow, "RightArm"),
        (RightElbow, RightWrist, "RightForeArm"),
        (LeftHip, LeftKnee, "LeftUpLeg"),
        (LeftKnee, LeftAnkle, "LeftLeg"),
        (RightHip, RightKnee, "RightUpLeg"),
        (RightKnee, RightAnkle, "RightLeg"),
    ]
};
