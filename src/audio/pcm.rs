// Fixed-point PCM helpers for the live audio path.
//
// The wire format on both directions is 16-bit little-endian PCM:
// microphone frames go out at 16 kHz mono, model speech comes back at
// 24 kHz mono. Conversion uses the asymmetric scale (32768 on the
// negative axis, 32767 on the positive) so both rails are reachable.

use std::time::Duration;

/// Capture rate for outbound microphone audio.
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Rate of the speech audio the model sends back.
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// Samples per outbound capture frame (256 ms at 16 kHz).
pub const SAMPLES_PER_FRAME: usize = 4_096;

/// Convert one float sample in [-1.0, 1.0] to fixed point.
///
/// Out-of-range input is clamped first, so 1.0 maps to 32767 and -1.0
/// to -32768 exactly.
pub fn sample_to_i16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Convert a float buffer to fixed point.
pub fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples.iter().copied().map(sample_to_i16).collect()
}

/// Pack samples as little-endian bytes.
pub fn to_le_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Unpack little-endian bytes into samples.
///
/// A trailing odd byte is dropped rather than failing the whole buffer.
pub fn from_le_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Play time of a mono buffer at the given rate.
pub fn duration_of(sample_count: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(sample_count as f64 / sample_rate as f64)
}

/// Input level for UI display: RMS scaled up and capped to [0.0, 1.0].
///
/// Raw microphone RMS sits well below 1.0 for normal speech, so the x5
/// scale makes the meter move.
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    let rms = (sum_sq / samples.len() as f32).sqrt();
    (rms * 5.0).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_scale_positive_maps_to_max() {
        assert_eq!(sample_to_i16(1.0), 32767);
    }

    #[test]
    fn test_full_scale_negative_maps_to_min() {
        assert_eq!(sample_to_i16(-1.0), -32768);
    }

    #[test]
    fn test_silence_maps_to_zero() {
        assert_eq!(sample_to_i16(0.0), 0);
    }

    #[test]
    fn test_out_of_range_input_is_clamped() {
        assert_eq!(sample_to_i16(1.5), 32767);
        assert_eq!(sample_to_i16(-2.0), -32768);
    }

    #[test]
    fn test_half_scale_uses_asymmetric_factors() {
        assert_eq!(sample_to_i16(0.5), (0.5f32 * 32767.0) as i16);
        assert_eq!(sample_to_i16(-0.5), (-0.5f32 * 32768.0) as i16);
    }

    #[test]
    fn test_byte_packing_round_trip() {
        let samples = vec![0i16, 1, -1, 32767, -32768, 12345, -12345];
        let bytes = to_le_bytes(&samples);
        assert_eq!(bytes.len(), samples.len() * 2);
        assert_eq!(from_le_bytes(&bytes), samples);
    }

    #[test]
    fn test_odd_trailing_byte_is_dropped() {
        let mut bytes = to_le_bytes(&[100i16, 200]);
        bytes.push(0x7f);
        assert_eq!(from_le_bytes(&bytes), vec![100, 200]);
    }

    #[test]
    fn test_frame_duration_at_capture_rate() {
        let d = duration_of(SAMPLES_PER_FRAME, CAPTURE_SAMPLE_RATE);
        assert_eq!(d, Duration::from_millis(256));
    }

    #[test]
    fn test_one_second_at_playback_rate() {
        let d = duration_of(PLAYBACK_SAMPLE_RATE as usize, PLAYBACK_SAMPLE_RATE);
        assert_eq!(d, Duration::from_secs(1));
    }

    #[test]
    fn test_zero_rate_yields_zero_duration() {
        assert_eq!(duration_of(100, 0), Duration::ZERO);
    }

    #[test]
    fn test_rms_of_silence_is_zero() {
        assert_eq!(rms_level(&[0.0; 512]), 0.0);
        assert_eq!(rms_level(&[]), 0.0);
    }

    #[test]
    fn test_rms_is_capped_at_one() {
        assert_eq!(rms_level(&[1.0; 512]), 1.0);
    }

    #[test]
    fn test_rms_scales_quiet_input() {
        // RMS of a constant 0.1 buffer is 0.1, reported as 0.5 after the x5 scale.
        let level = rms_level(&[0.1; 512]);
        assert!((level - 0.5).abs() < 1e-4);
    }
}
