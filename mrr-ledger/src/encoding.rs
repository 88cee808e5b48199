//! Text encoding detection for uploaded reports
//!
//! Platform reports arrive as UTF-8 (with or without BOM) or as legacy
//! single-byte Cyrillic/Latin code pages. Detection never fails: ambiguous
//! input still yields a best guess, flagged as not confident.

use chardetng::EncodingDetector;
use encoding_rs::Encoding;

/// Result of encoding detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedEncoding {
    pub encoding: &'static Encoding,
    /// Length of a byte-order mark at the start of the buffer, 0 if none
    pub bom_len: usize,
    /// False when the detector had too little signal to be sure
    pub confident: bool,
}

impl DetectedEncoding {
    pub fn label(&self) -> &'static str {
        self.encoding.name()
    }
}

/// Guess the encoding of `bytes`
///
/// A byte-order mark is authoritative. Otherwise the statistical detector is fed
/// the whole buffer with UTF-8 allowed as an outcome.
pub fn detect_encoding(bytes: &[u8]) -> DetectedEncoding {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return DetectedEncoding {
            encoding,
            bom_len,
            confident: true,
        };
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let (encoding, confident) = detector.guess_assess(None, true);

    DetectedEncoding {
        encoding,
        bom_len: 0,
        confident,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{UTF_16LE, UTF_8, WINDOWS_1251};

    #[test]
    fn test_utf8_bom_is_authoritative() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("Исполнитель,Доход\n".as_bytes());

        let detected = detect_encoding(&bytes);
        assert_eq!(detected.encoding, UTF_8);
        assert_eq!(detected.bom_len, 3);
        assert!(detected.confident);
    }

    #[test]
    fn test_utf16_bom() {
        let detected = detect_encoding(&[0xFF, 0xFE, b'a', 0x00]);
        assert_eq!(detected.encoding, UTF_16LE);
        assert_eq!(detected.bom_len, 2);
    }

    #[test]
    fn test_plain_utf8_cyrillic() {
        let text = "Исполнитель,Название трека,Количество прослушиваний\n\
                    Иван Петров,Летняя ночь,1500\n\
                    Мария Сидорова,Зимний вечер,2300\n";
        let detected = detect_encoding(text.as_bytes());
        assert_eq!(detected.encoding, UTF_8);
        assert_eq!(detected.bom_len, 0);
    }

    #[test]
    fn test_cp1251_cyrillic() {
        let text = "Исполнитель;Название трека;Количество прослушиваний;Доход\n\
                    Иван Петров;Летняя ночь на берегу реки;1500;150.50\n\
                    Мария Сидорова;Зимний вечер в старом городе;2300;230.00\n\
                    Группа Северное сияние;Песня о далёкой родине;800;80.25\n";
        let (bytes, _, had_errors) = WINDOWS_1251.encode(text);
        assert!(!had_errors);

        let detected = detect_encoding(&bytes);
        assert_eq!(detected.encoding, WINDOWS_1251);
    }

    #[test]
    fn test_empty_input_still_guesses() {
        let detected = detect_encoding(&[]);
        assert_eq!(detected.bom_len, 0);
        assert!(!detected.label().is_empty());
    }
}
