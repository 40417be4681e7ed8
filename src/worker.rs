//! Runs the detection engine on a background thread.
//!
//! The main thread owns a [`DetectionClient`] and sends it one request at a time. The worker
//! thread creates the [`Detector`] when the first message arrives, using the configuration carried
//! by that message, and answers every request carrying an image with a [`Response`].

use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail};
use log::{debug, error, info};
use pawawwewism::{promise, Promise, PromiseHandle, Worker};

use crate::config::{DetectorConfig, InputFilter};
use crate::image::Image;
use crate::result::DetectionResult;

/// Growth of the engine's tensor count, relative to the previous response, that gets logged.
const TENSOR_GROWTH_LOG: usize = 10;

/// An RGB image in the layout expected by detection engines.
///
/// Values are `f32` in the range `0.0..=255.0`, stored row by row with interleaved channels, so
/// the tensor shape is `[1, height, width, 3]`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Vec<f32>,
    width: u32,
    height: u32,
}

impl InputTensor {
    pub fn new(data: Vec<f32>, width: u32, height: u32) -> anyhow::Result<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            bail!(
                "input tensor of {width}x{height} needs {expected} values, got {}",
                data.len()
            );
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Converts `image` to a tensor, resizing it according to `filter` first.
    ///
    /// A disabled filter, or a zero filter size, keeps the image resolution.
    pub fn from_image(image: &Image, filter: &InputFilter) -> Self {
        let resized;
        let (width, height) = filter.input_size(image.width(), image.height());
        let image = if (width, height) != (image.width(), image.height()) {
            resized = image.resized(width, height);
            &resized
        } else {
            image
        };

        let data = image
            .pixels()
            .flat_map(|c| [c.r() as f32, c.g() as f32, c.b() as f32])
            .collect();
        Self {
            data,
            width: image.width(),
            height: image.height(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn shape(&self) -> [usize; 4] {
        [1, self.height as usize, self.width as usize, 3]
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Size of the tensor data in bytes.
    pub fn num_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

/// Memory statistics of a detection engine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EngineState {
    pub num_tensors: usize,
    pub num_bytes: usize,
}

/// A detection engine.
pub trait Detector: Send {
    /// Name of the inference backend in use.
    fn backend(&self) -> &str;

    /// Loads and warms up the configured models.
    fn init(&mut self, config: &DetectorConfig) -> anyhow::Result<()>;

    fn detect(
        &mut self,
        input: &InputTensor,
        config: &DetectorConfig,
    ) -> anyhow::Result<DetectionResult>;

    fn state(&self) -> EngineState;
}

/// Answer to a detection request.
#[derive(Debug, Clone)]
pub struct Response {
    pub result: DetectionResult,
    pub state: EngineState,
}

enum Message {
    Init {
        config: DetectorConfig,
    },
    Detect {
        input: InputTensor,
        config: DetectorConfig,
        response: Promise<anyhow::Result<Response>>,
    },
}

/// Creates the detector on first use.
struct LazyDetector<D, F> {
    detector: Option<D>,
    factory: F,
}

impl<D, F> LazyDetector<D, F>
where
    D: Detector,
    F: FnMut(&DetectorConfig) -> anyhow::Result<D>,
{
    fn get(&mut self, config: &DetectorConfig) -> anyhow::Result<&mut D> {
        if self.detector.is_none() {
            let mut detector = (self.factory)(config)?;
            detector.init(config)?;
            info!(
                "detector ready, backend: {}, models: {}",
                detector.backend(),
                config.enabled_models().join(" | ")
            );
            self.detector = Some(detector);
        }
        self.detector
            .as_mut()
            .ok_or_else(|| anyhow!("detector was not created"))
    }
}

/// Handle to the detection worker thread.
///
/// At most one detection request is in flight at any time.
pub struct DetectionClient {
    worker: Worker<Message>,
    pending: Option<PromiseHandle<anyhow::Result<Response>>>,
    latest: Option<DetectionResult>,
    num_tensors: usize,
}

impl DetectionClient {
    /// Spawns the worker thread. `factory` is invoked on the worker thread once the first message
    /// arrives.
    pub fn spawn<D, F>(factory: F) -> io::Result<Self>
    where
        D: Detector + 'static,
        F: FnMut(&DetectorConfig) -> anyhow::Result<D> + Send + 'static,
    {
        let mut detector = LazyDetector {
            detector: None,
            factory,
        };
        let worker = Worker::builder()
            .name("detector")
            .spawn(move |message: Message| match message {
                Message::Init { config } => {
                    if let Err(e) = detector.get(&config) {
                        error!("failed to initialize detector: {e:#}");
                    }
                }
                Message::Detect {
                    input,
                    config,
                    response,
                } => {
                    let res = detector.get(&config).and_then(|detector| {
                        let result = detector.detect(&input, &config)?;
                        Ok(Response {
                            result,
                            state: detector.state(),
                        })
                    });
                    response.fulfill(res);
                }
            })?;

        Ok(Self {
            worker,
            pending: None,
            latest: None,
            num_tensors: 0,
        })
    }

    /// Creates and warms up the detector without running a detection.
    pub fn init(&mut self, config: &DetectorConfig) {
        self.worker.send(Message::Init {
            config: config.clone(),
        });
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Requests a detection on `input`.
    ///
    /// Returns `false` without sending anything if the previous request has not been received
    /// yet.
    pub fn request_detect(&mut self, input: InputTensor, config: &DetectorConfig) -> bool {
        if self.is_busy() {
            debug!("detector busy, skipping frame");
            return false;
        }

        let (response, handle) = promise();
        self.worker.send(Message::Detect {
            input,
            config: config.clone(),
            response,
        });
        self.pending = Some(handle);
        true
    }

    /// Waits for the response to the pending request.
    ///
    /// Returns `Ok(None)` if no request is pending. The worker is available for the next request
    /// afterwards, even if detection failed.
    pub fn receive(&mut self) -> anyhow::Result<Option<Response>> {
        let Some(handle) = self.pending.take() else {
            return Ok(None);
        };
        let response = handle
            .block()
            .map_err(|_| anyhow!("detection worker exited"))??;

        let tensors = response.state.num_tensors;
        if tensors > self.num_tensors + TENSOR_GROWTH_LOG {
            info!(
                "engine state: {} tensors, {} bytes",
                tensors, response.state.num_bytes
            );
        }
        self.num_tensors = tensors;
        self.latest = Some(response.result.clone());
        Ok(Some(response))
    }

    /// The most recently received result.
    pub fn latest(&self) -> Option<&DetectionResult> {
        self.latest.as_ref()
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64() * 1000.0)
}

/// A [`Detector`] that plays back recorded results, in order and looping.
pub struct ReplayDetector {
    results: Vec<DetectionResult>,
    next: usize,
    restamp: bool,
    state: EngineState,
}

impl ReplayDetector {
    pub fn new(results: Vec<DetectionResult>) -> anyhow::Result<Self> {
        if results.is_empty() {
            bail!("cannot replay an empty recording");
        }
        Ok(Self {
            results,
            next: 0,
            restamp: false,
            state: EngineState::default(),
        })
    }

    /// Replaces recorded timestamps with the time of the request.
    pub fn restamp(mut self, restamp: bool) -> Self {
        self.restamp = restamp;
        self
    }

}

impl Detector for ReplayDetector {
    fn backend(&self) -> &str {
        "replay"
    }

    fn init(&mut self, config: &DetectorConfig) -> anyhow::Result<()> {
        if config.backend != self.backend() {
            debug!(
                "replaying {} recorded results instead of running '{}'",
                self.results.len(),
                config.backend
            );
        }
        Ok(())
    }

    fn detect(
        &mut self,
        input: &InputTensor,
        _config: &DetectorConfig,
    ) -> anyhow::Result<DetectionResult> {
        let mut result = self.results[self.next % self.results.len()].clone();
        self.next += 1;
        if self.restamp {
            result.timestamp = now_ms();
        }
        self.state = EngineState {
            num_tensors: 1,
            num_bytes: input.num_bytes(),
        };
        Ok(result)
    }

    fn state(&self) -> EngineState {
        self.state
    }
}
