//! Register value processing
//!
//! Converts raw register words into typed values according to the register's
//! datatype and scale, and back again for writes.

use thiserror::Error;

use crate::data_mgmt::bitfield::decode_bits;
use crate::data_mgmt::models::RtValue;
use crate::drivers::{DataType, EntityKind, RegisterDefinition};

#[derive(Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("expected {expected} words, got {actual}")]
    WordCount { expected: usize, actual: usize },
    #[error("{data_type} cannot span {word_count} registers")]
    TypeWidth { data_type: DataType, word_count: u16 },
}

#[derive(Error, Debug, PartialEq)]
pub enum EncodeError {
    #[error("{value} is outside the range of {data_type} after scaling")]
    OutOfRange { value: f64, data_type: DataType },
    #[error("value is not numeric")]
    NotNumeric,
    #[error("text of {len} bytes does not fit in {words} registers")]
    TextTooLong { len: usize, words: u16 },
    #[error("text must be ASCII")]
    NotAscii,
    #[error("{0} registers cannot be written")]
    Unsupported(DataType),
}

/// Decode raw words according to datatype and scale
///
/// The word count is checked before anything is interpreted: a truncated
/// response must never yield a value. 32-bit types take the high half from
/// the first word. Integral scales keep integer precision; fractional scales
/// round to the number of decimals the scale implies.
pub fn decode(
    words: &[u16],
    data_type: DataType,
    scale: f64,
    word_count: u16,
) -> Result<RtValue, DecodeError> {
    let width_ok = match data_type.fixed_words() {
        Some(fixed) => fixed == word_count,
        None => word_count > 0,
    };
    if !width_ok {
        return Err(DecodeError::TypeWidth {
            data_type,
            word_count,
        });
    }
    check_word_count(words, word_count)?;

    let raw = match data_type {
        DataType::Uint16 => words[0] as i64,
        DataType::Int16 => words[0] as i16 as i64,
        DataType::Uint32 => join_u32(words) as i64,
        DataType::Int32 => join_u32(words) as i32 as i64,
        DataType::Bitfield32 => join_u32(words) as i64,
        DataType::Bitfield64 => join_u64(words) as i64,
        DataType::Char => return Ok(RtValue::String(decode_text(words))),
    };

    Ok(apply_scale(raw, scale))
}

/// Decode a register using its full definition, including bit names for alarm groups
pub fn decode_register(def: &RegisterDefinition, words: &[u16]) -> Result<RtValue, DecodeError> {
    match def.kind {
        EntityKind::Flags { bits } => {
            check_word_count(words, def.word_count)?;
            Ok(RtValue::Flags(decode_bits(words, bits)))
        }
        _ => decode(words, def.data_type, def.scale, def.word_count),
    }
}

/// Inverse of [`decode`] for writes
pub fn encode(
    value: &RtValue,
    data_type: DataType,
    scale: f64,
    word_count: u16,
) -> Result<Vec<u16>, EncodeError> {
    if let DataType::Char = data_type {
        return match value {
            RtValue::String(s) => encode_text(s, word_count),
            _ => Err(EncodeError::NotNumeric),
        };
    }

    let value = value.as_f64().ok_or(EncodeError::NotNumeric)?;
    let raw = (value / scale).round();
    let out_of_range = EncodeError::OutOfRange { value, data_type };
    if !raw.is_finite() {
        return Err(out_of_range);
    }

    let (min, max) = match data_type {
        DataType::Uint16 => (0.0, u16::MAX as f64),
        DataType::Int16 => (i16::MIN as f64, i16::MAX as f64),
        DataType::Uint32 => (0.0, u32::MAX as f64),
        DataType::Int32 => (i32::MIN as f64, i32::MAX as f64),
        DataType::Bitfield32 | DataType::Bitfield64 | DataType::Char => {
            return Err(EncodeError::Unsupported(data_type));
        }
    };
    if raw < min || raw > max {
        return Err(out_of_range);
    }

    let raw = raw as i64;
    let words = match data_type {
        DataType::Uint16 | DataType::Int16 => vec![raw as u16],
        _ => {
            let bits = raw as u32;
            vec![(bits >> 16) as u16, bits as u16]
        }
    };
    Ok(words)
}

/// Number of decimals a scale factor implies: 0.01 -> 2, 0.001 -> 3, 1 -> 0
pub fn scale_decimals(scale: f64) -> i32 {
    let scale = scale.abs();
    if scale == 0.0 || scale.fract() == 0.0 {
        return 0;
    }
    (-scale.log10()).round().max(0.0) as i32
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn apply_scale(raw: i64, scale: f64) -> RtValue {
    if scale.fract() == 0.0 {
        RtValue::Int(raw * scale as i64)
    } else {
        RtValue::Float(round_to(raw as f64 * scale, scale_decimals(scale)))
    }
}

fn check_word_count(words: &[u16], word_count: u16) -> Result<(), DecodeError> {
    if words.len() != word_count as usize {
        return Err(DecodeError::WordCount {
            expected: word_count as usize,
            actual: words.len(),
        });
    }
    Ok(())
}

fn join_u32(words: &[u16]) -> u32 {
    ((words[0] as u32) << 16) | words[1] as u32
}

fn join_u64(words: &[u16]) -> u64 {
    words.iter().fold(0u64, |acc, w| (acc << 16) | *w as u64)
}

fn decode_text(words: &[u16]) -> String {
    let bytes: Vec<u8> = words
        .iter()
        .flat_map(|w| w.to_be_bytes())
        .filter(|b| b.is_ascii_graphic() || *b == b' ')
        .collect();
    String::from_utf8_lossy(&bytes).trim().to_string()
}

fn encode_text(s: &str, word_count: u16) -> Result<Vec<u16>, EncodeError> {
    if !s.is_ascii() {
        return Err(EncodeError::NotAscii);
    }
    let mut bytes = s.as_bytes().to_vec();
    if bytes.len() > word_count as usize * 2 {
        return Err(EncodeError::TextTooLong {
            len: bytes.len(),
            words: word_count,
        });
    }
    bytes.resize(word_count as usize * 2, 0);
    Ok(bytes
        .chunks(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{Catalog, HardwareVersion};

    #[test]
    fn test_decode_soc_percent() {
        let result = decode(&[62], DataType::Uint16, 1.0, 1).unwrap();
        assert_eq!(result, RtValue::Int(62));
    }

    #[test]
    fn test_decode_negative_current() {
        let result = decode(&[0xFFCE], DataType::Int16, 0.01, 1).unwrap();
        assert_eq!(result, RtValue::Float(-0.5));
    }

    #[test]
    fn test_decode_int32_high_word_first() {
        // -1500 W as two's complement
        let result = decode(&[0xFFFF, 0xFA24], DataType::Int32, 1.0, 2).unwrap();
        assert_eq!(result, RtValue::Int(-1500));

        let result = decode(&[0x0001, 0x0000], DataType::Uint32, 0.01, 2).unwrap();
        assert_eq!(result, RtValue::Float(655.36));
    }

    #[test]
    fn test_decode_truncated_response_fails() {
        let result = decode(&[0x0001], DataType::Int32, 1.0, 2);
        assert_eq!(
            result,
            Err(DecodeError::WordCount {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_decode_extended_response_fails() {
        let result = decode(&[1, 2], DataType::Uint16, 1.0, 1);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_width_must_match_type() {
        assert_eq!(
            decode(&[], DataType::Uint16, 1.0, 0),
            Err(DecodeError::TypeWidth {
                data_type: DataType::Uint16,
                word_count: 0,
            })
        );
        assert!(matches!(
            decode(&[1], DataType::Int32, 1.0, 1),
            Err(DecodeError::TypeWidth { .. })
        ));
        assert!(matches!(
            decode(&[], DataType::Char, 1.0, 0),
            Err(DecodeError::TypeWidth { .. })
        ));
    }

    #[test]
    fn test_decode_text_trims_padding() {
        // "VNSE3" followed by NUL padding
        let words = [0x564E, 0x5345, 0x3300, 0x0000];
        let result = decode(&words, DataType::Char, 1.0, 4).unwrap();
        assert_eq!(result, RtValue::String("VNSE3".to_string()));
    }

    #[test]
    fn test_decode_negative_scale_flips_sign() {
        let result = decode(&[67], DataType::Uint16, -1.0, 1).unwrap();
        assert_eq!(result, RtValue::Int(-67));
    }

    #[test]
    fn test_decode_register_with_definition() {
        let catalog = Catalog::for_version(HardwareVersion::V2);
        let voltage = catalog.lookup("battery_voltage").unwrap();
        assert_eq!(
            decode_register(voltage, &[5321]).unwrap(),
            RtValue::Float(53.21)
        );

        let alarms = catalog.lookup("alarm_status").unwrap();
        assert_eq!(
            decode_register(alarms, &[0x0010, 0x0000]).unwrap(),
            RtValue::Flags(vec!["Low Battery SOC Warning"])
        );
        assert!(decode_register(alarms, &[0x0010]).is_err());
    }

    #[test]
    fn test_encode_scaled_value() {
        let words = encode(&RtValue::Int(90), DataType::Uint16, 0.1, 1).unwrap();
        assert_eq!(words, vec![900]);

        let words = encode(&RtValue::Int(-1500), DataType::Int32, 1.0, 2).unwrap();
        assert_eq!(words, vec![0xFFFF, 0xFA24]);
    }

    #[test]
    fn test_encode_out_of_range() {
        let result = encode(&RtValue::Int(70000), DataType::Uint16, 1.0, 1);
        assert!(matches!(result, Err(EncodeError::OutOfRange { .. })));

        let result = encode(&RtValue::Float(-1.0), DataType::Uint16, 1.0, 1);
        assert!(matches!(result, Err(EncodeError::OutOfRange { .. })));
    }

    #[test]
    fn test_encode_rejects_non_numeric() {
        let result = encode(&RtValue::String("high".into()), DataType::Uint16, 1.0, 1);
        assert_eq!(result, Err(EncodeError::NotNumeric));
    }

    #[test]
    fn test_round_trip_within_scale_tolerance() {
        let cases = [
            (RtValue::Float(-0.5), DataType::Int16, 0.01, 1),
            (RtValue::Float(53.21), DataType::Uint16, 0.01, 1),
            (RtValue::Int(2500), DataType::Uint16, 1.0, 1),
            (RtValue::Float(1234.56), DataType::Uint32, 0.01, 2),
        ];
        for (value, data_type, scale, words) in cases {
            let encoded = encode(&value, data_type, scale, words).unwrap();
            let decoded = decode(&encoded, data_type, scale, words).unwrap();
            let diff = (decoded.as_f64().unwrap() - value.as_f64().unwrap()).abs();
            assert!(diff <= scale.abs() / 2.0, "{:?} -> {:?}", value, decoded);
        }
    }

    #[test]
    fn test_text_round_trip() {
        let encoded = encode(&RtValue::String("ABC".into()), DataType::Char, 1.0, 3).unwrap();
        assert_eq!(encoded, vec![0x4142, 0x4300, 0x0000]);
        let decoded = decode(&encoded, DataType::Char, 1.0, 3).unwrap();
        assert_eq!(decoded, RtValue::String("ABC".into()));

        let result = encode(&RtValue::String("TOO LONG".into()), DataType::Char, 1.0, 2);
        assert!(matches!(result, Err(EncodeError::TextTooLong { .. })));
    }

    #[test]
    fn test_scale_decimals() {
        assert_eq!(scale_decimals(1.0), 0);
        assert_eq!(scale_decimals(0.1), 1);
        assert_eq!(scale_decimals(0.01), 2);
        assert_eq!(scale_decimals(0.001), 3);
        assert_eq!(scale_decimals(-1.0), 0);
    }
}
