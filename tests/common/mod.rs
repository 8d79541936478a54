pub mod http_stub;
pub mod mock_output;
pub mod mock_synth;

use narrator::narrator::NarrationEvent;
use std::time::Duration;
use tokio::sync::broadcast;

/// Minimal 16-bit mono PCM RIFF file with a quiet tone
pub fn wav_bytes(sample_rate: u32, samples: usize) -> Vec<u8> {
    let data_len = (samples * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for i in 0..samples {
        let sample = ((i as f32 * 0.05).sin() * 4000.0) as i16;
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

/// Wait for the first event matching `pred`, failing after a minute of
/// (possibly paused) time
pub async fn wait_for(
    events: &mut broadcast::Receiver<NarrationEvent>,
    pred: impl Fn(&NarrationEvent) -> bool,
) -> NarrationEvent {
    tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => {}
                Err(e) => panic!("event stream broken: {}", e),
            }
        }
    })
    .await
    .expect("Timed out waiting for narration event")
}

/// Collect events until `count` requests finished
pub async fn wait_finished(
    events: &mut broadcast::Receiver<NarrationEvent>,
    count: usize,
) -> Vec<NarrationEvent> {
    let mut seen = Vec::new();
    let mut finished = 0;
    while finished < count {
        let event = wait_for(events, |_| true).await;
        if matches!(event, NarrationEvent::Finished { .. }) {
            finished += 1;
        }
        seen.push(event);
    }
    seen
}
