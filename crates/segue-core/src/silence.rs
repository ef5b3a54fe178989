//! Silence detection over decoded samples
//!
//! Finds stretches where the signal stays under an amplitude threshold,
//! reported as positions normalized to the clip length. The playback
//! driver uses these to trim dead air at track boundaries before a
//! crossfade would waste its window fading silence.

/// One detected stretch of silence, positions normalized to 0..1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceSpan {
    pub start: f64,
    pub end: f64,
}

/// Scan `samples` for spans below `threshold` lasting at least
/// `min_silence_samples`
pub fn detect_silence(
    samples: &[f32],
    threshold: f32,
    min_silence_samples: usize,
) -> Vec<SilenceSpan> {
    let mut spans = Vec::new();
    if samples.is_empty() {
        return spans;
    }

    let len = samples.len() as f64;
    let mut silence_start: Option<usize> = None;
    let mut run = 0usize;

    for (i, &sample) in samples.iter().enumerate() {
        if sample.abs() < threshold {
            if silence_start.is_none() {
                silence_start = Some(i);
            }
            run += 1;
        } else {
            if run >= min_silence_samples {
                if let Some(start) = silence_start {
                    spans.push(SilenceSpan {
                        start: start as f64 / len,
                        end: i as f64 / len,
                    });
                }
            }
            silence_start = None;
            run = 0;
        }
    }

    // Trailing silence runs to the end of the clip
    if run >= min_silence_samples {
        if let Some(start) = silence_start {
            spans.push(SilenceSpan {
                start: start as f64 / len,
                end: 1.0,
            });
        }
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_silence_in_loud_signal() {
        let samples = vec![0.5; 1000];
        assert!(detect_silence(&samples, 0.01, 10).is_empty());
    }

    #[test]
    fn test_detects_interior_span() {
        let mut samples = vec![0.5; 300];
        samples.extend(vec![0.0; 400]);
        samples.extend(vec![0.5; 300]);

        let spans = detect_silence(&samples, 0.01, 100);
        assert_eq!(spans.len(), 1);
        assert!((spans[0].start - 0.3).abs() < 1e-9);
        assert!((spans[0].end - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_short_gaps_are_ignored() {
        let mut samples = vec![0.5; 500];
        samples.splice(200..210, vec![0.0; 10]);
        assert!(detect_silence(&samples, 0.01, 100).is_empty());
    }

    #[test]
    fn test_trailing_silence_reported() {
        let mut samples = vec![0.5; 500];
        samples.extend(vec![0.0; 500]);

        let spans = detect_silence(&samples, 0.01, 100);
        assert_eq!(spans.len(), 1);
        assert!((spans[0].start - 0.5).abs() < 1e-9);
        assert_eq!(spans[0].end, 1.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(detect_silence(&[], 0.01, 10).is_empty());
    }
}
