//! Generic [`CameraSource`] trait and the live buffered camera.
//!
//! A detection driver (co-processor client, network table listener, ...)
//! owns a [`DetectionFeed`] and publishes each new [`DetectionResult`] into
//! it.  The matching [`LiveCamera`] is polled once per tick without blocking
//! and hands over each published result once.

use tagpose_types::{DetectionResult, VisionError};
use tokio::sync::watch;
use tracing::warn;

/// A source of fiducial detections for one physical or simulated camera.
///
/// Implementations must not block: a poll returns the newest frame not yet
/// returned, or an empty result when nothing new has arrived.
pub trait CameraSource: Send + Sync {
    /// Camera name, e.g. `"front"`.
    fn name(&self) -> &str;

    /// Return the newest unseen detection result.
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::CameraUnavailable`] when the source can no
    /// longer produce results (e.g. its driver has shut down).
    fn latest_result(&mut self) -> Result<DetectionResult, VisionError>;
}

/// Publisher half of a camera buffer.  Held by the detection driver.
#[derive(Debug)]
pub struct DetectionFeed {
    name: String,
    tx: watch::Sender<Option<DetectionResult>>,
}

impl DetectionFeed {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the buffered result.  Never blocks, even when nobody polls.
    pub fn publish(&self, result: DetectionResult) {
        self.tx.send_replace(Some(result));
    }
}

/// Create a connected feed / camera pair for the camera called `name`.
pub fn detection_channel(name: impl Into<String>) -> (DetectionFeed, LiveCamera) {
    let name = name.into();
    let (tx, rx) = watch::channel(None);
    (
        DetectionFeed {
            name: name.clone(),
            tx,
        },
        LiveCamera {
            name,
            rx,
            last_timestamp: 0.0,
            closed: false,
        },
    )
}

/// Consumer half of a camera buffer: the live [`CameraSource`].
///
/// Each published frame is returned exactly once.  Polls between frames
/// yield an empty result stamped with the last frame's timestamp, so a
/// slow camera never feeds the same measurement downstream twice.
#[derive(Debug)]
pub struct LiveCamera {
    name: String,
    rx: watch::Receiver<Option<DetectionResult>>,
    last_timestamp: f64,
    closed: bool,
}

impl CameraSource for LiveCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn latest_result(&mut self) -> Result<DetectionResult, VisionError> {
        // Unlike `Receiver::has_changed`, `Ref::has_changed` still reports an
        // unseen value after the feed has been dropped.
        let fresh = {
            let latest = self.rx.borrow_and_update();
            if latest.has_changed() { (*latest).clone() } else { None }
        };
        if let Some(result) = fresh {
            self.last_timestamp = result.timestamp_seconds;
            return Ok(result);
        }
        if !self.closed && self.rx.has_changed().is_err() {
            self.closed = true;
            warn!(camera = %self.name, "detection feed closed; no further frames");
        }
        Ok(DetectionResult::empty(self.last_timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagpose_types::Target;

    #[test]
    fn poll_before_first_publish_is_empty() {
        let (_feed, mut cam) = detection_channel("front");
        let result = cam.latest_result().unwrap();
        assert!(!result.has_targets());
    }

    #[test]
    fn poll_returns_latest_publish() {
        let (feed, mut cam) = detection_channel("front");
        feed.publish(DetectionResult::with_targets(1.0, vec![Target::new(1, 0.1)]));
        feed.publish(DetectionResult::with_targets(2.0, vec![Target::new(2, 0.1)]));

        let result = cam.latest_result().unwrap();
        assert_eq!(result.timestamp_seconds, 2.0);
        assert_eq!(result.targets[0].fiducial_id, 2);
    }

    #[test]
    fn frame_is_returned_only_once() {
        let (feed, mut cam) = detection_channel("front");
        feed.publish(DetectionResult::with_targets(1.5, vec![Target::new(1, 0.1)]));
        let first = cam.latest_result().unwrap();
        assert!(first.has_targets());

        let second = cam.latest_result().unwrap();
        assert!(!second.has_targets());
        assert_eq!(second.timestamp_seconds, 1.5);

        feed.publish(DetectionResult::with_targets(1.6, vec![Target::new(2, 0.1)]));
        let third = cam.latest_result().unwrap();
        assert_eq!(third.targets[0].fiducial_id, 2);
    }

    #[test]
    fn frame_published_before_feed_drop_is_still_delivered() {
        let (feed, mut cam) = detection_channel("front");
        feed.publish(DetectionResult::with_targets(1.0, vec![Target::new(1, 0.1)]));
        drop(feed);

        let result = cam.latest_result().unwrap();
        assert_eq!(result.targets[0].fiducial_id, 1);

        // Afterwards the closed feed only yields empty results, never errors.
        let after = cam.latest_result().unwrap();
        assert!(!after.has_targets());
        assert_eq!(after.timestamp_seconds, 1.0);
        assert!(cam.latest_result().is_ok());
    }

    #[test]
    fn dropped_feed_without_frames_is_empty() {
        let (feed, mut cam) = detection_channel("rear");
        drop(feed);
        let result = cam.latest_result().unwrap();
        assert!(!result.has_targets());
        assert_eq!(result.timestamp_seconds, 0.0);
    }

    #[test]
    fn names_match() {
        let (feed, cam) = detection_channel("side");
        assert_eq!(feed.name(), "side");
        assert_eq!(cam.name(), "side");
    }
}
