//! Live video element.
//!
//! A [`VideoElement`] takes ownership of a [`CameraStream`] and keeps the most recent frame
//! available to any number of [`VideoFrames`] readers. Dropping the element stops the pump, which
//! in turn drops the stream and releases the camera.
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use image::RgbImage;
use tokio::sync::watch;

use crate::{sensors::CameraStream, Error};

pub type SharedFrame = Arc<RgbImage>;

pub struct VideoElement {
    frames: VideoFrames,
    stop: Arc<AtomicBool>,
}

impl VideoElement {
    /// Attach a camera stream and start pumping frames on a blocking task.
    pub fn attach(mut stream: CameraStream) -> Self {
        let (frame_tx, frame_rx) = watch::channel(None);
        let stop = Arc::new(AtomicBool::new(false));

        {
            let stop = stop.clone();
            tokio::task::spawn_blocking(move || {
                while !stop.load(Ordering::Acquire) {
                    match stream.capture() {
                        Some(frame) => {
                            frame_tx.send_replace(Some(Arc::new(frame)));
                        }
                        None => {
                            log::error!("Unable to capture frame, ending video");
                            break;
                        }
                    }
                }
                stream.stop();
                log::debug!("Video pump finished");
            });
        }

        Self {
            frames: VideoFrames { rx: frame_rx },
            stop,
        }
    }

    /// Reader handle that stays valid after the element is dropped, but sees no new frames.
    pub fn frames(&self) -> VideoFrames {
        self.frames.clone()
    }

    pub fn current_frame(&self) -> Option<SharedFrame> {
        self.frames.current_frame()
    }

    pub async fn loaded_metadata(&mut self) -> Result<(u32, u32), Error> {
        self.frames.loaded_metadata().await
    }
}

impl Drop for VideoElement {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

/// Read side of a [`VideoElement`].
#[derive(Clone)]
pub struct VideoFrames {
    rx: watch::Receiver<Option<SharedFrame>>,
}

impl VideoFrames {
    pub fn current_frame(&self) -> Option<SharedFrame> {
        self.rx.borrow().clone()
    }

    /// Wait until the first frame arrived and return its dimensions.
    pub async fn loaded_metadata(&mut self) -> Result<(u32, u32), Error> {
        loop {
            if let Some(frame) = self.rx.borrow().as_ref() {
                return Ok(frame.dimensions());
            }
            self.rx
                .changed()
                .await
                .map_err(|_| Error::Camera("video ended before the first frame".into()))?;
        }
    }
}

#[cfg(test)]
mod test {

    use std::{
        sync::atomic::AtomicUsize,
        time::Duration,
    };

    use super::*;
    use crate::sensors::Track;

    struct TestTrack {
        frames_left: usize,
        stops: Arc<AtomicUsize>,
    }

    impl Track for TestTrack {
        fn capture(&mut self) -> Option<RgbImage> {
            std::thread::sleep(Duration::from_millis(2));
            if self.frames_left == 0 {
                return None;
            }
            self.frames_left -= 1;
            Some(RgbImage::new(8, 6))
        }

        fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_stream(frames_left: usize, stops: &Arc<AtomicUsize>) -> CameraStream {
        CameraStream::new(Box::new(TestTrack {
            frames_left,
            stops: stops.clone(),
        }))
    }

    async fn wait_for_stops(stops: &Arc<AtomicUsize>, expected: usize) {
        for _ in 0..200 {
            if stops.load(Ordering::SeqCst) == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("track was not stopped");
    }

    #[tokio::test]
    async fn test_metadata_and_release() -> Result<(), Error> {
        let stops = Arc::new(AtomicUsize::new(0));
        let mut video = VideoElement::attach(test_stream(usize::MAX, &stops));

        assert_eq!(video.loaded_metadata().await?, (8, 6));
        assert!(video.current_frame().is_some());

        let frames = video.frames();
        drop(video);
        wait_for_stops(&stops, 1).await;

        // Readers keep the last frame
        assert!(frames.current_frame().is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_metadata_fails_without_frames() {
        let stops = Arc::new(AtomicUsize::new(0));
        let mut video = VideoElement::attach(test_stream(0, &stops));

        assert!(video.loaded_metadata().await.is_err());
        wait_for_stops(&stops, 1).await;
    }
}
