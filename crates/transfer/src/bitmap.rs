use uplink_protocol::{Bitmap, NumberOrString};

use crate::TransferError;

/// Units per bitmap word.
const WORD_BITS: usize = 16;

/// Decodes the service's word-packed bitmap into one flag per unit.
///
/// Unit `i` is bit `i % 16` of word `i / 16`, least-significant bit first.
/// The result is truncated or padded with `false` to exactly `unit_count`
/// entries, since the bitmap is word-aligned.
pub fn decode_bitmap(bitmap: &Bitmap, unit_count: usize) -> Result<Vec<bool>, TransferError> {
    let count = bitmap
        .count
        .as_u64()
        .ok_or_else(|| TransferError::Bitmap(format!("invalid word count {:?}", bitmap.count)))?
        as usize;

    if count > bitmap.words.len() {
        return Err(TransferError::Bitmap(format!(
            "word count {count} exceeds {} words supplied",
            bitmap.words.len()
        )));
    }

    let mut units = Vec::with_capacity(count * WORD_BITS);
    for word in &bitmap.words[..count] {
        let value = parse_word(word)?;
        units.extend((0..WORD_BITS).map(|bit| (value >> bit) & 1 == 1));
    }
    units.resize(unit_count, false);
    Ok(units)
}

/// Packs unit flags into the service's bitmap representation.
pub fn encode_bitmap(units: &[bool]) -> Bitmap {
    let words: Vec<NumberOrString> = units
        .chunks(WORD_BITS)
        .map(|chunk| {
            let word = chunk
                .iter()
                .enumerate()
                .filter(|(_, set)| **set)
                .fold(0u16, |acc, (bit, _)| acc | (1u16 << bit));
            NumberOrString::String(word.to_string())
        })
        .collect();

    Bitmap {
        count: NumberOrString::Number(words.len() as i64),
        words,
    }
}

fn parse_word(word: &NumberOrString) -> Result<u16, TransferError> {
    word.as_u64()
        .and_then(|v| u16::try_from(v).ok())
        .ok_or_else(|| TransferError::InvalidNumber(format!("bitmap word {word}")))
}
