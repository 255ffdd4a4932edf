//! Record splitting, the fixed-format value parser and per-chunk
//! aggregation. This is the code each worker runs on every chunk.

use bstr::{BString, ByteSlice};
use tracing::warn;

// FxHashMap is noticably faster than a vanilla HashMap for short keys.
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::stats::KeyStats;

/// One worker's aggregate results for one chunk, before merging.
pub type PartialMap = FxHashMap<BString, KeyStats>;

/// What to do with a record that has no `;` separator.
///
/// The default matches the traditional behaviour of silently dropping the
/// record; `Warn` and `Fail` make the tolerance explicit instead of
/// incidental.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MalformedPolicy {
    /// Drop the record silently.
    #[default]
    Skip,
    /// Drop the record and log it at warn level.
    Warn,
    /// Abort the pipeline with [`Error::MalformedRecord`].
    Fail,
}

/// Parses a value span known to match `-?D[D].D` (one or two integer
/// digits, exactly one fractional digit, optional leading minus).
///
/// The restricted grammar lets us branch once on the digit length and
/// compute the value with plain byte arithmetic, skipping the generic
/// float-parsing machinery entirely. Any other input violates the caller's
/// contract; debug builds assert the grammar, release builds do not check.
pub fn parse_value(bytes: &[u8]) -> f64 {
    debug_assert!(
        fixed_format(bytes),
        "value span outside the fixed -?D[D].D grammar: {:?}",
        bytes.as_bstr()
    );

    let (sign, digits) = match bytes[0] {
        b'-' => (-1.0, &bytes[1..]),
        _ => (1.0, bytes),
    };

    if digits.len() == 3 {
        // D.D
        sign * (f64::from(digits[0] - b'0') + f64::from(digits[2] - b'0') * 0.1)
    } else {
        // DD.D
        sign * (f64::from(digits[0] - b'0') * 10.0
            + f64::from(digits[1] - b'0')
            + f64::from(digits[3] - b'0') * 0.1)
    }
}

fn fixed_format(bytes: &[u8]) -> bool {
    let digits = match bytes.first() {
        Some(b'-') => &bytes[1..],
        Some(_) => bytes,
        None => return false,
    };
    let dot = match digits.len() {
        3 => 1,
        4 => 2,
        _ => return false,
    };
    digits
        .iter()
        .enumerate()
        .all(|(i, b)| if i == dot { *b == b'.' } else { b.is_ascii_digit() })
}

/// Splits `chunk` into newline-delimited records and folds each one into a
/// fresh partial map.
///
/// The chunk is guaranteed by the reader to contain only whole records;
/// the final record may omit its trailing newline.
pub fn aggregate_chunk(chunk: &[u8], policy: MalformedPolicy) -> Result<PartialMap> {
    let mut map = PartialMap::default();
    let mut start = 0;
    while start < chunk.len() {
        let end = memchr::memchr(b'\n', &chunk[start..])
            .map(|i| start + i)
            .unwrap_or(chunk.len());
        aggregate_record(&mut map, &chunk[start..end], policy)?;
        start = end + 1;
    }
    Ok(map)
}

fn aggregate_record(map: &mut PartialMap, record: &[u8], policy: MalformedPolicy) -> Result<()> {
    let Some(sep) = memchr::memchr(b';', record) else {
        return match policy {
            MalformedPolicy::Skip => Ok(()),
            MalformedPolicy::Warn => {
                warn!(record = ?record.as_bstr(), "skipping record without separator");
                Ok(())
            }
            MalformedPolicy::Fail => Err(Error::MalformedRecord(record.into())),
        };
    };

    let value = parse_value(&record[sep + 1..]);

    // Borrow the key bytes for the lookup; copy into owned storage only
    // the first time a key is seen.
    let key = record[..sep].as_bstr();
    if let Some(stats) = map.get_mut(key) {
        stats.update(value);
    } else {
        map.insert(key.to_owned(), KeyStats::new(value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn parse_value_fixed_grammar() {
        for (input, expected) in [
            ("12.3", 12.3),
            ("-45.6", -45.6),
            ("78.9", 78.9),
            ("-1.2", -1.2),
            ("0.0", 0.0),
            ("99.9", 99.9),
            ("-99.9", -99.9),
        ] {
            let got = parse_value(input.as_bytes());
            assert!(
                (got - expected).abs() < EPS,
                "parse_value({input:?}) = {got}, expected {expected}"
            );
        }
    }

    #[test]
    fn aggregate_chunk_counts_and_stats() {
        let chunk = b"A;1.0\nB;-2.5\nA;3.0\n";
        let map = aggregate_chunk(chunk, MalformedPolicy::default()).unwrap();

        assert_eq!(map.len(), 2);
        let a = &map[&BString::from("A")];
        assert_eq!(a.count(), 2);
        assert_eq!(a.min(), 1.0);
        assert_eq!(a.max(), 3.0);
        assert!((a.mean() - 2.0).abs() < EPS);

        let b = &map[&BString::from("B")];
        assert_eq!(b.count(), 1);
        assert_eq!(b.min(), -2.5);
        assert_eq!(b.max(), -2.5);
    }

    #[test]
    fn aggregate_chunk_without_trailing_newline() {
        let map = aggregate_chunk(b"Y;9.9", MalformedPolicy::default()).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map[&BString::from("Y")].count(), 1);
        assert!((map[&BString::from("Y")].max() - 9.9).abs() < EPS);
    }

    #[test]
    fn malformed_record_is_skipped() {
        for policy in [MalformedPolicy::Skip, MalformedPolicy::Warn] {
            let map = aggregate_chunk(b"A;1.0\nnotarecord\nA;3.0\n", policy).unwrap();
            assert_eq!(map.len(), 1);
            assert_eq!(map[&BString::from("A")].count(), 2);
        }
    }

    #[test]
    fn malformed_record_fails_when_asked() {
        let err = aggregate_chunk(b"A;1.0\nnotarecord\n", MalformedPolicy::Fail).unwrap_err();
        match err {
            Error::MalformedRecord(record) => assert_eq!(record, BString::from("notarecord")),
            other => panic!("expected MalformedRecord, got {other:?}"),
        }
    }
}
