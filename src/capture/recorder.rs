use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use log::{debug, info, warn};

use super::{AttemptId, AudioFormat, AudioRecorder, CaptureEvent, CaptureSink};
use crate::error::CaptureError;

struct RecorderWorker {
    stop_tx: mpsc::Sender<()>,
    _handle: JoinHandle<()>,
}

/// Microphone recorder on the default input device.
///
/// `cpal` streams are not `Send`, so each attempt gets a dedicated thread that
/// opens the device, keeps the stream alive until stop is requested, and then
/// posts [`CaptureEvent::RecorderStopped`]. The device is opened fresh for
/// every attempt.
#[derive(Default)]
pub struct CpalRecorder {
    worker: Option<RecorderWorker>,
}

impl CpalRecorder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioRecorder for CpalRecorder {
    fn start(&mut self, attempt: AttemptId, sink: CaptureSink) -> Result<AudioFormat, CaptureError> {
        self.stop();

        let (ready_tx, ready_rx) = mpsc::channel::<Result<AudioFormat, String>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("readalong-recorder".into())
            .spawn(move || {
                let stream = match open_input_stream(attempt, sink.clone()) {
                    Ok((stream, format)) => {
                        let _ = ready_tx.send(Ok(format));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Either an explicit stop or the controller dropping us ends
                // the recording.
                let _ = stop_rx.recv();
                drop(stream);
                debug!("attempt {} input stream closed", attempt);
                sink.send(CaptureEvent::RecorderStopped { attempt });
            })
            .map_err(|e| CaptureError::Device(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(format)) => {
                self.worker = Some(RecorderWorker {
                    stop_tx,
                    _handle: handle,
                });
                Ok(format)
            }
            Ok(Err(msg)) => {
                let _ = handle.join();
                Err(CaptureError::Device(msg))
            }
            Err(_) => Err(CaptureError::Device("recorder thread exited early".into())),
        }
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
        }
    }
}

fn open_input_stream(attempt: AttemptId, sink: CaptureSink) -> Result<(Stream, AudioFormat), String> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| "no default input device".to_string())?;
    let device_name = device.name().unwrap_or_else(|_| "default input".to_string());

    let config = device
        .default_input_config()
        .map_err(|e| format!("{} has no usable input config: {}", device_name, e))?;
    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    let stream_config: StreamConfig = config.clone().into();

    let stream = match config.sample_format() {
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                sink.send(CaptureEvent::AudioFragment {
                    attempt,
                    bytes: mono_pcm_from_f32(data, channels),
                });
            },
            move |err| warn!("input stream error: {}", err),
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                sink.send(CaptureEvent::AudioFragment {
                    attempt,
                    bytes: mono_pcm_from_i16(data, channels),
                });
            },
            move |err| warn!("input stream error: {}", err),
            None,
        ),
        other => return Err(format!("unsupported sample format {:?}", other)),
    }
    .map_err(|e| format!("could not open {}: {}", device_name, e))?;

    stream
        .play()
        .map_err(|e| format!("could not start {}: {}", device_name, e))?;

    info!("recording from {} ({} Hz, {} ch)", device_name, sample_rate, channels);
    Ok((
        stream,
        AudioFormat {
            sample_rate,
            channels: 1,
        },
    ))
}

/// Averages interleaved frames down to one channel of 16-bit LE samples.
fn mono_pcm_from_f32(data: &[f32], channels: usize) -> Vec<u8> {
    let channels = channels.max(1);
    data.chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .flat_map(|s| ((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16).to_le_bytes())
        .collect()
}

fn mono_pcm_from_i16(data: &[i16], channels: usize) -> Vec<u8> {
    let channels = channels.max(1);
    data.chunks_exact(channels)
        .map(|frame| (frame.iter().map(|&s| s as i32).sum::<i32>() / channels as i32) as i16)
        .flat_map(i16::to_le_bytes)
        .collect()
}
