//! ARIB STD-B24 8-unit code decoder for caption statement bodies.
//!
//! Produces plain text plus the glyph-size runs needed to strip ruby.
//! CS is kept as a form feed so the aggregator can tell screen clears
//! apart from content; APR becomes a newline.

use super::charset::{decode_double, decode_single, default_macro, GraphicSet};
use crate::types::{CharSize, FormatRun};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub format_runs: Vec<FormatRun>,
}

pub struct AribStringDecoder {
    one_seg: bool,
    g: [GraphicSet; 4],
    gl: usize,
    gr: usize,
    single_shift: Option<usize>,
    size: CharSize,
    out: String,
    out_chars: usize,
    runs: Vec<FormatRun>,
    macro_depth: u8,
}

const MAX_MACRO_DEPTH: u8 = 4;

impl AribStringDecoder {
    pub fn new(one_seg: bool) -> Self {
        let mut dec = Self {
            one_seg,
            g: [GraphicSet::Kanji; 4],
            gl: 0,
            gr: 2,
            single_shift: None,
            size: CharSize::Normal,
            out: String::new(),
            out_chars: 0,
            runs: Vec::new(),
            macro_depth: 0,
        };
        dec.reset();
        dec
    }

    pub fn set_one_seg(&mut self, one_seg: bool) {
        self.one_seg = one_seg;
    }

    /// Caption initial state: G0 Kanji, G1 Alnum, G2 Hiragana, G3 Macro
    /// (DRCS-1 on one-seg), GL=G0, GR=G2
    fn reset(&mut self) {
        self.g = [
            GraphicSet::Kanji,
            GraphicSet::Alphanumeric,
            GraphicSet::Hiragana,
            if self.one_seg { GraphicSet::Drcs(1) } else { GraphicSet::Macro },
        ];
        self.gl = 0;
        self.gr = 2;
        self.single_shift = None;
        self.size = CharSize::Normal;
        self.out.clear();
        self.out_chars = 0;
        self.runs.clear();
        self.macro_depth = 0;
    }

    /// Decodes one statement body; state does not carry over between calls
    pub fn decode_caption(&mut self, data: &[u8]) -> DecodedText {
        self.reset();
        self.run(data);
        DecodedText {
            text: std::mem::take(&mut self.out),
            format_runs: std::mem::take(&mut self.runs),
        }
    }

    fn run(&mut self, data: &[u8]) {
        let mut i = 0;
        while i < data.len() {
            i += self.step(&data[i..]).max(1);
        }
    }

    /// Handles the code at `b[0]`, returning the bytes consumed
    fn step(&mut self, b: &[u8]) -> usize {
        match b[0] {
            0x00..=0x1F => self.c0(b),
            0x20 => {
                let half = matches!(self.size, CharSize::Small | CharSize::Medium)
                    || matches!(
                        self.g[self.gl],
                        GraphicSet::Alphanumeric | GraphicSet::ProportionalAlphanumeric
                    );
                self.push(if half { ' ' } else { '\u{3000}' });
                1
            }
            0x21..=0x7E => self.graphic(b, false),
            0x80..=0x9F => self.c1(b),
            0xA1..=0xFE => self.graphic(b, true),
            _ => 1, // DEL, 0xA0, 0xFF
        }
    }

    fn graphic(&mut self, b: &[u8], right: bool) -> usize {
        let shift = self.single_shift.take();
        let idx = if right { self.gr } else { shift.unwrap_or(self.gl) };
        let set = self.g[idx];

        if set == GraphicSet::Macro {
            if let Some(seq) = default_macro(b[0] & 0x7F) {
                if self.macro_depth < MAX_MACRO_DEPTH {
                    self.macro_depth += 1;
                    self.run(&seq);
                    self.macro_depth -= 1;
                }
            }
            return 1;
        }

        if set.bytes_per_char() == 2 {
            if b.len() < 2 {
                return b.len();
            }
            if let Some(s) = decode_double(set, b[0] & 0x7F, b[1] & 0x7F) {
                self.push_str(&s);
            }
            2
        } else {
            if let Some(c) = decode_single(set, b[0] & 0x7F) {
                self.push(c);
            }
            1
        }
    }

    fn c0(&mut self, b: &[u8]) -> usize {
        let n = match b[0] {
            0x0C => {
                // CS
                self.push('\u{0C}');
                1
            }
            0x0D => {
                // APR
                self.push('\n');
                1
            }
            0x0E => {
                self.gl = 1;
                1
            }
            0x0F => {
                self.gl = 0;
                1
            }
            0x16 => 2, // PAPF
            0x19 => {
                self.single_shift = Some(2);
                1
            }
            0x1D => {
                self.single_shift = Some(3);
                1
            }
            0x1B => self.escape(b),
            0x1C => {
                // APS: active position set, starts a new line
                if !self.out.is_empty() && !self.out.ends_with(&['\n', '\u{0C}'][..]) {
                    self.push('\n');
                }
                3
            }
            _ => 1,
        };
        n.min(b.len())
    }

    fn c1(&mut self, b: &[u8]) -> usize {
        let p1 = b.get(1).copied();
        let n = match b[0] {
            0x88 => {
                self.set_size(CharSize::Small);
                1
            }
            0x89 => {
                self.set_size(CharSize::Medium);
                1
            }
            0x8A => {
                self.set_size(CharSize::Normal);
                1
            }
            0x8B => {
                let size = match p1 {
                    Some(0x60) => Some(CharSize::Micro),
                    Some(0x41) => Some(CharSize::DoubleHeight),
                    Some(0x44) => Some(CharSize::DoubleWidth),
                    Some(0x45) => Some(CharSize::DoubleSize),
                    Some(0x6B) => Some(CharSize::Special1),
                    Some(0x64) => Some(CharSize::Special2),
                    _ => None,
                };
                if let Some(size) = size {
                    self.set_size(size);
                }
                2
            }
            0x90 | 0x92 => {
                // COL / CDC take an extra byte after the 0x20 intermediate
                if p1 == Some(0x20) { 3 } else { 2 }
            }
            0x91 | 0x93 | 0x94 | 0x97 | 0x98 => 2, // FLC POL WMM HLC RPC
            0x95 => {
                // MACRO definition runs until MACRO 0x4F
                b.windows(2)
                    .skip(1)
                    .position(|w| w == [0x95, 0x4F])
                    .map_or(b.len(), |p| p + 3)
            }
            0x9B => {
                // CSI P ... I F, with I = 0x20 and F in 0x40..=0x6F
                b.windows(2)
                    .skip(1)
                    .position(|w| w[0] == 0x20 && (0x40..=0x6F).contains(&w[1]))
                    .map_or(b.len(), |p| p + 3)
            }
            0x9D => match p1 {
                // TIME
                Some(0x29) => b
                    .iter()
                    .skip(2)
                    .position(|c| (0x40..=0x43).contains(c))
                    .map_or(b.len(), |p| p + 3),
                _ => 3,
            },
            _ => 1, // colours, SPL, STL, ...
        };
        n.min(b.len())
    }

    fn escape(&mut self, b: &[u8]) -> usize {
        let Some(&b1) = b.get(1) else { return b.len() };
        match b1 {
            0x6E => {
                self.gl = 2;
                2
            }
            0x6F => {
                self.gl = 3;
                2
            }
            0x7E => {
                self.gr = 1;
                2
            }
            0x7D => {
                self.gr = 2;
                2
            }
            0x7C => {
                self.gr = 3;
                2
            }
            0x28..=0x2B => {
                let slot = (b1 - 0x28) as usize;
                match (b.get(2).copied(), b.get(3).copied()) {
                    (Some(0x20), Some(f)) => {
                        self.g[slot] = GraphicSet::from_drcs_final(f);
                        4
                    }
                    (Some(f), _) if f != 0x20 => {
                        self.g[slot] = GraphicSet::from_g_final(f);
                        3
                    }
                    _ => b.len(),
                }
            }
            0x24 => match (b.get(2).copied(), b.get(3).copied(), b.get(4).copied()) {
                (Some(i @ 0x28..=0x2B), Some(0x20), Some(f)) => {
                    self.g[(i - 0x28) as usize] = if f == 0x40 {
                        GraphicSet::Drcs(0)
                    } else {
                        GraphicSet::Unknown
                    };
                    5
                }
                (Some(i @ 0x28..=0x2B), Some(f), _) if f != 0x20 => {
                    self.g[(i - 0x28) as usize] = GraphicSet::from_g2_final(f);
                    4
                }
                (Some(f), _, _) if !(0x28..=0x2B).contains(&f) => {
                    self.g[0] = GraphicSet::from_g2_final(f);
                    3
                }
                _ => b.len(),
            },
            _ => 2,
        }
    }

    fn set_size(&mut self, size: CharSize) {
        if size == self.size {
            return;
        }
        if self.runs.is_empty() && self.out_chars > 0 {
            self.runs.push(FormatRun { start_offset: 0, char_size: self.size });
        }
        match self.runs.last_mut() {
            Some(last) if last.start_offset == self.out_chars => last.char_size = size,
            _ => self.runs.push(FormatRun { start_offset: self.out_chars, char_size: size }),
        }
        self.size = size;
    }

    fn push(&mut self, c: char) {
        self.out.push(c);
        self.out_chars += 1;
    }

    fn push_str(&mut self, s: &str) {
        self.out.push_str(s);
        self.out_chars += s.chars().count();
    }
}
