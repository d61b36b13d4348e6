//! Run-length encoding of flattened cell states.
//!
//! Each run is one state code followed by a decimal count, e.g.
//! `U120F3W2`.  Counts are always ≥ 1.

use atlas_types::CellState;

use crate::CodecError;

/// One-letter wire code of `state`.
pub fn state_code(state: CellState) -> char {
    match state {
        CellState::Unknown => 'U',
        CellState::Free => 'F',
        CellState::Obstacle => 'O',
        CellState::Wall => 'W',
        CellState::Explored => 'E',
        CellState::Path => 'P',
        CellState::Collectible => 'C',
        CellState::Collected => 'X',
    }
}

/// Inverse of [`state_code`].
pub fn code_state(code: char) -> Result<CellState, CodecError> {
    Ok(match code {
        'U' => CellState::Unknown,
        'F' => CellState::Free,
        'O' => CellState::Obstacle,
        'W' => CellState::Wall,
        'E' => CellState::Explored,
        'P' => CellState::Path,
        'C' => CellState::Collectible,
        'X' => CellState::Collected,
        other => return Err(CodecError::UnknownCode(other)),
    })
}

pub fn rle_encode(states: &[CellState]) -> String {
    let mut out = String::new();
    let mut iter = states.iter().copied();
    let Some(mut current) = iter.next() else {
        return out;
    };
    let mut count = 1usize;
    for state in iter {
        if state == current {
            count += 1;
        } else {
            push_run(&mut out, current, count);
            current = state;
            count = 1;
        }
    }
    push_run(&mut out, current, count);
    out
}

fn push_run(out: &mut String, state: CellState, count: usize) {
    out.push(state_code(state));
    out.push_str(&count.to_string());
}

pub fn rle_decode(encoded: &str) -> Result<Vec<CellState>, CodecError> {
    decode_runs(encoded, None)
}

/// Decode and check the cell count against `expected`.
///
/// Fails as soon as the running total passes `expected`, so an oversized
/// count is rejected before anything is allocated for it.
pub fn rle_decode_exact(encoded: &str, expected: usize) -> Result<Vec<CellState>, CodecError> {
    let states = decode_runs(encoded, Some(expected))?;
    if states.len() != expected {
        return Err(CodecError::LengthMismatch {
            expected,
            found: states.len(),
        });
    }
    Ok(states)
}

fn decode_runs(encoded: &str, limit: Option<usize>) -> Result<Vec<CellState>, CodecError> {
    let malformed = |position: usize, reason: &str| CodecError::MalformedRle {
        position,
        reason: reason.to_string(),
    };

    let mut out = Vec::new();
    let mut chars = encoded.char_indices().peekable();
    while let Some((pos, code)) = chars.next() {
        if code.is_ascii_digit() {
            return Err(malformed(pos, "count without a state code"));
        }
        let state = match code_state(code) {
            Ok(s) => s,
            Err(_) => return Err(malformed(pos, &format!("unknown state code '{code}'"))),
        };

        let mut digits = String::new();
        while let Some(&(_, d)) = chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            digits.push(d);
            chars.next();
        }
        if digits.is_empty() {
            return Err(malformed(pos, "missing run length"));
        }
        let count: usize = digits
            .parse()
            .map_err(|_| malformed(pos, "run length overflow"))?;
        if count == 0 {
            return Err(malformed(pos, "zero run length"));
        }
        let total = out
            .len()
            .checked_add(count)
            .ok_or_else(|| malformed(pos, "run length overflow"))?;
        if let Some(expected) = limit
            && total > expected
        {
            return Err(CodecError::LengthMismatch {
                expected,
                found: total,
            });
        }
        out.extend(std::iter::repeat_n(state, count));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use CellState::*;

    #[test]
    fn encodes_runs_in_order() {
        let states = [Unknown, Unknown, Unknown, Free, Wall, Wall];
        assert_eq!(rle_encode(&states), "U3F1W2");
    }

    #[test]
    fn every_state_has_a_distinct_code() {
        let codes: std::collections::HashSet<char> =
            CellState::ALL.iter().map(|&s| state_code(s)).collect();
        assert_eq!(codes.len(), CellState::ALL.len());
        for s in CellState::ALL {
            assert_eq!(code_state(state_code(s)).unwrap(), s);
        }
    }

    #[test]
    fn decode_restores_mixed_grid() {
        let states: Vec<CellState> = (0..137)
            .map(|i| CellState::ALL[(i * i / 7) % CellState::ALL.len()])
            .collect();
        assert_eq!(rle_decode(&rle_encode(&states)).unwrap(), states);
    }

    #[test]
    fn multi_digit_counts() {
        let decoded = rle_decode("U120F3").unwrap();
        assert_eq!(decoded.len(), 123);
        assert_eq!(decoded[119], Unknown);
        assert_eq!(decoded[120], Free);
    }

    #[test]
    fn empty_input_is_empty_grid() {
        assert_eq!(rle_encode(&[]), "");
        assert!(rle_decode("").unwrap().is_empty());
    }

    #[test]
    fn malformed_input_rejected() {
        for bad in ["F", "Z3", "F0", "3F", "F-1", "U2 F3"] {
            let err = rle_decode(bad).unwrap_err();
            assert!(matches!(err, CodecError::MalformedRle { .. }), "{bad}: {err}");
        }
    }

    #[test]
    fn exact_decode_checks_length() {
        assert!(rle_decode_exact("F4", 4).is_ok());
        let err = rle_decode_exact("F4", 6).unwrap_err();
        assert!(matches!(err, CodecError::LengthMismatch { expected: 6, found: 4 }));
    }

    #[test]
    fn oversized_run_is_rejected_before_expansion() {
        let err = rle_decode_exact("F2U99999999999", 10).unwrap_err();
        assert!(matches!(
            err,
            CodecError::LengthMismatch { expected: 10, found: 100_000_000_001 }
        ));
        let err = rle_decode_exact("F99999999999999999999999", 10).unwrap_err();
        assert!(matches!(err, CodecError::MalformedRle { .. }));
    }
}
