use log::{debug, info};
use std::ops::Range;

use crate::lexicon::normalize_word;
use crate::transcript::{Provenance, TimedWord};

/// Default duration given to each reference word with no transcribed timing
pub const DEFAULT_INSERT_WORD_DURATION: f64 = 0.3;

/// Classification of one contiguous run in a sequence diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpTag {
    Equal,
    Replace,
    /// `b` has tokens absent from `a`
    Insert,
    /// `a` has tokens absent from `b`
    Delete,
}

/// One run of a diff between sequences `a` and `b`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opcode {
    pub tag: OpTag,
    pub a: Range<usize>,
    pub b: Range<usize>,
}

/// Diff two token sequences into equal/replace/insert/delete runs.
///
/// Matched tokens form a longest common subsequence. Every maximal stretch
/// between matches becomes a single run: `Replace` when both sides have
/// tokens, otherwise `Delete` or `Insert`.
pub fn opcodes<T: PartialEq>(a: &[T], b: &[T]) -> Vec<Opcode> {
    let (n, m) = (a.len(), b.len());
    let width = m + 1;

    // lcs[i * width + j] = LCS length of a[i..] and b[j..]
    let mut lcs = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i * width + j] = if a[i] == b[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let mut ops = Vec::new();
    let (mut i, mut j) = (0, 0);
    let (mut gap_i, mut gap_j) = (0, 0);

    while i < n && j < m {
        if a[i] == b[j] {
            push_gap(&mut ops, gap_i..i, gap_j..j);
            let (start_i, start_j) = (i, j);
            while i < n && j < m && a[i] == b[j] {
                i += 1;
                j += 1;
            }
            ops.push(Opcode {
                tag: OpTag::Equal,
                a: start_i..i,
                b: start_j..j,
            });
            gap_i = i;
            gap_j = j;
        } else if lcs[(i + 1) * width + j] >= lcs[i * width + j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    push_gap(&mut ops, gap_i..n, gap_j..m);

    ops
}

fn push_gap(ops: &mut Vec<Opcode>, a: Range<usize>, b: Range<usize>) {
    let tag = match (a.is_empty(), b.is_empty()) {
        (true, true) => return,
        (false, false) => OpTag::Replace,
        (false, true) => OpTag::Delete,
        (true, false) => OpTag::Insert,
    };
    ops.push(Opcode { tag, a, b });
}

/// Reconciles a raw transcript against reference lyrics.
///
/// Timing always comes from the transcript; spelling comes from the reference.
#[derive(Debug, Clone)]
pub struct AlignmentEngine {
    insert_word_duration: f64,
}

impl Default for AlignmentEngine {
    fn default() -> Self {
        Self::new(DEFAULT_INSERT_WORD_DURATION)
    }
}

impl AlignmentEngine {
    pub fn new(insert_word_duration: f64) -> Self {
        Self {
            insert_word_duration,
        }
    }

    pub fn insert_word_duration(&self) -> f64 {
        self.insert_word_duration
    }

    /// Produce a corrected word sequence.
    ///
    /// With no (or empty) reference the transcript is returned unchanged. The
    /// transcript must be ordered by start time; the output then is too.
    pub fn reconcile(&self, transcript: &[TimedWord], reference: Option<&[String]>) -> Vec<TimedWord> {
        let reference = match reference {
            Some(reference) if !reference.is_empty() => reference,
            _ => return transcript.to_vec(),
        };

        let transcript_norm: Vec<String> = transcript.iter().map(|w| normalize_word(&w.text)).collect();
        let reference_norm: Vec<String> = reference.iter().map(|w| normalize_word(w)).collect();

        let mut aligned: Vec<TimedWord> = Vec::with_capacity(reference.len());
        let mut stats = [0usize; 4];

        for op in opcodes(&transcript_norm, &reference_norm) {
            match op.tag {
                OpTag::Equal => {
                    stats[0] += 1;
                    for (t, r) in op.a.zip(op.b) {
                        aligned.push(TimedWord {
                            text: reference[r].clone(),
                            start: transcript[t].start,
                            end: transcript[t].end,
                            provenance: transcript[t].provenance,
                        });
                    }
                }
                OpTag::Replace => {
                    stats[1] += 1;
                    let span_start = transcript[op.a.start].start;
                    let span_end = transcript[op.a.end - 1].end.max(span_start);
                    self.interpolate(&mut aligned, &reference[op.b], span_start, span_end);
                }
                OpTag::Insert => {
                    stats[2] += 1;
                    let anchor = aligned.last().map(|w| w.end).unwrap_or(0.0);
                    // The transcript word right after an insert run is always emitted next.
                    let next_start = transcript.get(op.a.start).map(|w| w.start);
                    self.chain(&mut aligned, &reference[op.b], anchor, next_start);
                }
                OpTag::Delete => {
                    stats[3] += 1;
                }
            }
        }

        debug!(
            "Alignment runs: {} equal, {} replace, {} insert, {} delete",
            stats[0], stats[1], stats[2], stats[3]
        );
        info!(
            "Aligned {} transcribed words to {} reference words",
            transcript.len(),
            aligned.len()
        );
        aligned
    }

    /// Divide `[start, end]` evenly among `words`
    fn interpolate(&self, out: &mut Vec<TimedWord>, words: &[String], start: f64, end: f64) {
        let count = words.len() as f64;
        let duration = end - start;
        for (idx, word) in words.iter().enumerate() {
            out.push(TimedWord {
                text: word.clone(),
                start: start + duration * idx as f64 / count,
                end: start + duration * (idx + 1) as f64 / count,
                provenance: Provenance::Interpolated,
            });
        }
    }

    /// Chain `words` back to back from `anchor`.
    ///
    /// Each word gets the fixed insert duration unless that would run past
    /// `next_start`, in which case the available gap is shared evenly. An
    /// anchor past `next_start` (overlapping transcript words) is pulled back
    /// to it.
    fn chain(&self, out: &mut Vec<TimedWord>, words: &[String], anchor: f64, next_start: Option<f64>) {
        let anchor = next_start.map_or(anchor, |limit| anchor.min(limit));
        let count = words.len() as f64;
        let mut per_word = self.insert_word_duration;
        if let Some(limit) = next_start {
            if anchor + per_word * count > limit {
                per_word = (limit - anchor).max(0.0) / count;
            }
        }

        for (idx, word) in words.iter().enumerate() {
            out.push(TimedWord {
                text: word.clone(),
                start: anchor + per_word * idx as f64,
                end: anchor + per_word * (idx + 1) as f64,
                provenance: Provenance::Inserted,
            });
        }
    }
}
