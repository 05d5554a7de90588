// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Run-length codec used for per-entry bundle compression.
//!
//! The stream is a sequence of `(run_length, byte)` pairs with
//! `run_length` in `1..=255`.

const MAX_RUN: usize = u8::MAX as usize;

/// Encodes `input` as `(run_length, byte)` pairs.
pub fn encode(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() / 2 + 2);
    let mut iter = input.iter().copied().peekable();

    while let Some(byte) = iter.next() {
        let mut run = 1;
        while run < MAX_RUN && iter.peek() == Some(&byte) {
            iter.next();
            run += 1;
        }
        out.push(run as u8);
        out.push(byte);
    }

    out
}

/// Decodes a run-length stream that must expand to exactly `expected_len` bytes.
///
/// Returns `None` for an odd-length stream, a zero run, or a size mismatch.
pub fn decode(input: &[u8], expected_len: usize) -> Option<Vec<u8>> {
    if input.len() % 2 != 0 || expected_len > input.len() / 2 * MAX_RUN {
        return None;
    }

    let mut out = Vec::with_capacity(expected_len);
    for pair in input.chunks_exact(2) {
        let run = pair[0] as usize;
        if run == 0 || out.len() + run > expected_len {
            return None;
        }
        out.resize(out.len() + run, pair[1]);
    }

    (out.len() == expected_len).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compresses_runs() {
        let input = [7u8; 600];
        let encoded = encode(&input);
        assert_eq!(encoded, vec![255, 7, 255, 7, 90, 7]);
        assert_eq!(decode(&encoded, input.len()).unwrap(), input);
    }

    #[test]
    fn handles_mixed_and_empty_input() {
        let input = b"aaabccdddd";
        let encoded = encode(input);
        assert_eq!(encoded, vec![3, b'a', 1, b'b', 2, b'c', 4, b'd']);
        assert_eq!(decode(&encoded, input.len()).unwrap(), input);

        assert!(encode(&[]).is_empty());
        assert_eq!(decode(&[], 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn rejects_malformed_streams() {
        assert!(decode(&[3], 3).is_none());
        assert!(decode(&[0, 1], 0).is_none());
        assert!(decode(&[3, 1], 2).is_none());
        assert!(decode(&[3, 1], 4).is_none());
    }
}
