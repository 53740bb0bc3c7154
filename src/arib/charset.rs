//! ARIB STD-B24 graphic sets and the default macro table

use encoding_rs::EUC_JP;

use crate::constants::GETA_MARK;

/// Graphic sets that can be designated into G0..G3
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphicSet {
    Kanji,
    Alphanumeric,
    Hiragana,
    Katakana,
    MosaicA,
    MosaicB,
    MosaicC,
    MosaicD,
    ProportionalAlphanumeric,
    ProportionalHiragana,
    ProportionalKatakana,
    JisX0201Katakana,
    JisKanjiPlane1,
    JisKanjiPlane2,
    AdditionalSymbols,
    Drcs(u8),
    Macro,
    Unknown,
}

impl GraphicSet {
    /// Final byte of a 1-byte G set designation
    pub fn from_g_final(f: u8) -> Self {
        match f {
            0x4A => GraphicSet::Alphanumeric,
            0x30 => GraphicSet::Hiragana,
            0x31 => GraphicSet::Katakana,
            0x32 => GraphicSet::MosaicA,
            0x33 => GraphicSet::MosaicB,
            0x34 => GraphicSet::MosaicC,
            0x35 => GraphicSet::MosaicD,
            0x36 => GraphicSet::ProportionalAlphanumeric,
            0x37 => GraphicSet::ProportionalHiragana,
            0x38 => GraphicSet::ProportionalKatakana,
            0x49 => GraphicSet::JisX0201Katakana,
            _ => GraphicSet::Unknown,
        }
    }

    /// Final byte of a 2-byte G set designation
    pub fn from_g2_final(f: u8) -> Self {
        match f {
            0x42 => GraphicSet::Kanji,
            0x39 => GraphicSet::JisKanjiPlane1,
            0x3A => GraphicSet::JisKanjiPlane2,
            0x3B => GraphicSet::AdditionalSymbols,
            _ => GraphicSet::Unknown,
        }
    }

    /// Final byte of a DRCS designation (after the 0x20 intermediate)
    pub fn from_drcs_final(f: u8) -> Self {
        match f {
            0x40..=0x4F => GraphicSet::Drcs(f - 0x40),
            0x70 => GraphicSet::Macro,
            _ => GraphicSet::Unknown,
        }
    }

    pub fn bytes_per_char(self) -> usize {
        match self {
            GraphicSet::Kanji
            | GraphicSet::JisKanjiPlane1
            | GraphicSet::JisKanjiPlane2
            | GraphicSet::AdditionalSymbols
            | GraphicSet::Drcs(0) => 2,
            _ => 1,
        }
    }
}

/// Maps one 7-bit code (0x21..=0x7E) of a 1-byte set to a char
pub fn decode_single(set: GraphicSet, c: u8) -> Option<char> {
    match set {
        GraphicSet::Alphanumeric | GraphicSet::ProportionalAlphanumeric => Some(match c {
            0x5C => '\u{00A5}', // ¥
            0x7E => '\u{203E}', // ‾
            _ => c as char,
        }),
        GraphicSet::Hiragana | GraphicSet::ProportionalHiragana => kana(c, 0x3041, 0x73, true),
        GraphicSet::Katakana | GraphicSet::ProportionalKatakana => kana(c, 0x30A1, 0x76, false),
        GraphicSet::JisX0201Katakana => match c {
            0x21..=0x5F => char::from_u32(0xFF61 + (c - 0x21) as u32),
            _ => None,
        },
        GraphicSet::Drcs(_) => Some(GETA_MARK),
        _ => None,
    }
}

fn kana(c: u8, base: u32, last: u8, hiragana: bool) -> Option<char> {
    match c {
        0x21..=0x7E if c <= last => char::from_u32(base + (c - 0x21) as u32),
        0x77 => Some(if hiragana { 'ゝ' } else { 'ヽ' }),
        0x78 => Some(if hiragana { 'ゞ' } else { 'ヾ' }),
        0x79 => Some('ー'),
        0x7A => Some('。'),
        0x7B => Some('「'),
        0x7C => Some('」'),
        0x7D => Some('、'),
        0x7E => Some('・'),
        _ => None,
    }
}

/// Maps a 2-byte code (each byte 0x21..=0x7E) to text
pub fn decode_double(set: GraphicSet, c1: u8, c2: u8) -> Option<String> {
    match set {
        GraphicSet::Kanji | GraphicSet::JisKanjiPlane1 => {
            // rows 90..=94 hold the ARIB additional symbols, outside JIS X 0208
            if c1 >= 0x7A {
                return Some(additional_symbol(c1, c2).map_or_else(|| GETA_MARK.to_string(), str::to_owned));
            }
            let euc = [c1 | 0x80, c2 | 0x80];
            let (text, had_errors) = EUC_JP.decode_without_bom_handling(&euc);
            Some(if had_errors { GETA_MARK.to_string() } else { text.into_owned() })
        }
        GraphicSet::AdditionalSymbols => {
            Some(additional_symbol(c1, c2).map_or_else(|| GETA_MARK.to_string(), str::to_owned))
        }
        GraphicSet::JisKanjiPlane2 | GraphicSet::Drcs(0) => Some(GETA_MARK.to_string()),
        _ => None,
    }
}

/// Service and programme marks of ARIB row 90 (0x7A50..=0x7A72)
const ROW_90_MARKS: [&str; 35] = [
    "[HV]", "[SD]", "[P]", "[W]", "[MV]", "[手]", "[字]", "[双]",
    "[デ]", "[S]", "[二]", "[多]", "[解]", "[SS]", "[B]", "[N]",
    "■", "●", "[天]", "[交]", "[映]", "[無]", "[料]", "[年齢制限]",
    "[前]", "[後]", "[再]", "[新]", "[初]", "[終]", "[生]", "[販]",
    "[声]", "[吹]", "[PPV]",
];

/// Text for an ARIB additional symbol, when it has one
pub fn additional_symbol(c1: u8, c2: u8) -> Option<&'static str> {
    match (c1, c2) {
        (0x7A, 0x50..=0x72) => Some(ROW_90_MARKS[(c2 - 0x50) as usize]),
        _ => None,
    }
}

/// Default macros 0x60..=0x6F (ARIB STD-B24 vol.1 part 2 table 7-20).
/// Each one designates G0..G2, puts the macro set in G3, then LS0 + LS2R.
pub fn default_macro(c: u8) -> Option<Vec<u8>> {
    const TAIL: [u8; 7] = [0x1B, 0x2B, 0x20, 0x70, 0x0F, 0x1B, 0x7D];
    const HEADS: [&[u8]; 16] = [
        &[0x1B, 0x24, 0x42, 0x1B, 0x29, 0x4A, 0x1B, 0x2A, 0x30],
        &[0x1B, 0x24, 0x42, 0x1B, 0x29, 0x31, 0x1B, 0x2A, 0x30],
        &[0x1B, 0x24, 0x42, 0x1B, 0x29, 0x20, 0x41, 0x1B, 0x2A, 0x30],
        &[0x1B, 0x28, 0x32, 0x1B, 0x29, 0x34, 0x1B, 0x2A, 0x35],
        &[0x1B, 0x28, 0x32, 0x1B, 0x29, 0x33, 0x1B, 0x2A, 0x35],
        &[0x1B, 0x28, 0x32, 0x1B, 0x29, 0x20, 0x41, 0x1B, 0x2A, 0x35],
        &[0x1B, 0x28, 0x20, 0x41, 0x1B, 0x29, 0x20, 0x42, 0x1B, 0x2A, 0x20, 0x43],
        &[0x1B, 0x28, 0x20, 0x44, 0x1B, 0x29, 0x20, 0x45, 0x1B, 0x2A, 0x20, 0x46],
        &[0x1B, 0x28, 0x20, 0x47, 0x1B, 0x29, 0x20, 0x48, 0x1B, 0x2A, 0x20, 0x49],
        &[0x1B, 0x28, 0x20, 0x4A, 0x1B, 0x29, 0x20, 0x4B, 0x1B, 0x2A, 0x20, 0x4C],
        &[0x1B, 0x28, 0x20, 0x4D, 0x1B, 0x29, 0x20, 0x4E, 0x1B, 0x2A, 0x20, 0x4F],
        &[0x1B, 0x24, 0x42, 0x1B, 0x29, 0x20, 0x42, 0x1B, 0x2A, 0x30],
        &[0x1B, 0x24, 0x42, 0x1B, 0x29, 0x20, 0x43, 0x1B, 0x2A, 0x30],
        &[0x1B, 0x24, 0x42, 0x1B, 0x29, 0x20, 0x44, 0x1B, 0x2A, 0x30],
        &[0x1B, 0x28, 0x31, 0x1B, 0x29, 0x30, 0x1B, 0x2A, 0x4A],
        &[0x1B, 0x28, 0x4A, 0x1B, 0x29, 0x32, 0x1B, 0x2A, 0x20, 0x41],
    ];
    match c {
        0x60..=0x6F => Some([HEADS[(c - 0x60) as usize], &TAIL[..]].concat()),
        _ => None,
    }
}
