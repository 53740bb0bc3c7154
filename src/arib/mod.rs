//! ARIB STD-B24 caption transport: PES data, data groups, caption
//! management / statement data and data units.

pub mod charset;
pub mod string;

use anyhow::bail;
use crc::{Crc, CRC_16_XMODEM};

use crate::constants::*;
use crate::types::LanguageInfo;

pub use string::{AribStringDecoder, DecodedText};

/// x^16 + x^12 + x^5 + 1, initial value 0
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

#[derive(Debug)]
pub struct DataGroup<'a> {
    pub id: u8,
    pub version: u8,
    pub link_number: u8,
    pub last_link_number: u8,
    pub data: &'a [u8],
}

impl DataGroup<'_> {
    /// Group B uses ids 0x20..=0x28, group A 0x00..=0x08
    pub fn is_group_b(&self) -> bool {
        self.id & 0x20 != 0
    }

    pub fn is_management(&self) -> bool {
        self.id & 0x0F == 0
    }

    /// 0-based language tag of a statement group
    pub fn language_tag(&self) -> Option<u8> {
        match self.id & 0x0F {
            n @ 1..=8 => Some(n - 1),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct DataUnit<'a> {
    pub parameter: u8,
    pub data: &'a [u8],
}

#[derive(Debug)]
pub struct CaptionManagement<'a> {
    pub tmd: u8,
    pub languages: Vec<LanguageInfo>,
    pub units: Vec<DataUnit<'a>>,
}

#[derive(Debug)]
pub struct CaptionStatement<'a> {
    pub tmd: u8,
    pub units: Vec<DataUnit<'a>>,
}

fn take<'a>(b: &'a [u8], idx: &mut usize, n: usize) -> anyhow::Result<&'a [u8]> {
    let Some(s) = b.get(*idx..*idx + n) else { bail!("truncated at byte {}", *idx) };
    *idx += n;
    Ok(s)
}

fn u24(b: &[u8]) -> usize {
    (b[0] as usize) << 16 | (b[1] as usize) << 8 | b[2] as usize
}

/// Extracts the data group bytes from a complete caption PES packet
pub fn pes_data_group(pes: &[u8]) -> anyhow::Result<&[u8]> {
    if pes.len() < 9 || !pes.starts_with(&PES_START_CODE) { bail!("not a PES packet"); }
    let stream_id = pes[3];
    let pes_len   = u16::from_be_bytes([pes[4], pes[5]]) as usize;
    let end = if pes_len == 0 { pes.len() } else { (6 + pes_len).min(pes.len()) };

    let start = match stream_id {
        PES_PRIVATE_STREAM_2 => 6,
        PES_PRIVATE_STREAM_1 => 9 + pes[8] as usize,
        other => bail!("unexpected PES stream_id 0x{other:02X}"),
    };
    let Some(data) = pes.get(start..end) else { bail!("short PES payload") };

    if data.len() < 3 { bail!("short PES data") }
    if data[0] != DATA_IDENTIFIER_CAPTION { bail!("data_identifier 0x{:02X} is not caption", data[0]); }
    if data[1] != PRIVATE_STREAM_ID { bail!("bad private_stream_id"); }
    let hdr_len = (data[2] & 0x0F) as usize;
    data.get(3 + hdr_len..).ok_or_else(|| anyhow::anyhow!("short PES data header"))
}

/// Parses and CRC-16 checks one data group
pub fn parse_data_group(b: &[u8]) -> anyhow::Result<DataGroup<'_>> {
    if b.len() < 7 { bail!("short data group"); }
    let size = u16::from_be_bytes([b[3], b[4]]) as usize;
    let Some(group) = b.get(..5 + size + 2) else { bail!("truncated data group") };
    if CRC16.checksum(group) != 0 { bail!("data group CRC-16 mismatch"); }

    Ok(DataGroup {
        id: b[0] >> 2,
        version: b[0] & 0x03,
        link_number: b[1],
        last_link_number: b[2],
        data: &b[5..5 + size],
    })
}

fn parse_data_units(b: &[u8]) -> anyhow::Result<Vec<DataUnit<'_>>> {
    let mut idx = 0;
    let loop_len = u24(take(b, &mut idx, 3)?);
    let Some(body) = b.get(3..3 + loop_len) else { bail!("truncated data unit loop") };

    let mut units = Vec::new();
    let mut i = 0;
    while i + 5 <= body.len() {
        if body[i] != UNIT_SEPARATOR { bail!("missing unit separator"); }
        let parameter = body[i + 1];
        let size = u24(&body[i + 2..i + 5]);
        i += 5;
        let data = take(body, &mut i, size)?;
        units.push(DataUnit { parameter, data });
    }
    Ok(units)
}

pub fn parse_management(b: &[u8]) -> anyhow::Result<CaptionManagement<'_>> {
    let mut idx = 0;
    let tmd = take(b, &mut idx, 1)?[0] >> 6;
    if tmd == 0b10 {
        take(b, &mut idx, 5)?; // OTM
    }
    let num_languages = take(b, &mut idx, 1)?[0];

    let mut languages = Vec::with_capacity(num_languages as usize);
    for _ in 0..num_languages {
        let head = take(b, &mut idx, 1)?[0];
        let dmf = head & 0x0F;
        if (0x0C..=0x0E).contains(&dmf) {
            take(b, &mut idx, 1)?; // DC
        }
        let iso = take(b, &mut idx, 3)?;
        let fmt = take(b, &mut idx, 1)?[0];
        languages.push(LanguageInfo {
            language_tag: head >> 5,
            dmf,
            iso_639: String::from_utf8_lossy(iso).into_owned(),
            format: fmt >> 4,
            tcs: (fmt >> 2) & 0x03,
            rollup_mode: fmt & 0x03,
        });
    }

    let units = parse_data_units(&b[idx..])?;
    Ok(CaptionManagement { tmd, languages, units })
}

pub fn parse_statement(b: &[u8]) -> anyhow::Result<CaptionStatement<'_>> {
    let mut idx = 0;
    let tmd = take(b, &mut idx, 1)?[0] >> 6;
    if tmd == 0b01 || tmd == 0b10 {
        take(b, &mut idx, 5)?; // STM
    }
    let units = parse_data_units(&b[idx..])?;
    Ok(CaptionStatement { tmd, units })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_group(id: u8, data: &[u8]) -> Vec<u8> {
        let mut g = vec![id << 2, 0x00, 0x00];
        g.extend_from_slice(&(data.len() as u16).to_be_bytes());
        g.extend_from_slice(data);
        let crc = CRC16.checksum(&g);
        g.extend_from_slice(&crc.to_be_bytes());
        g
    }

    fn units(units: &[(u8, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (param, data) in units {
            body.extend_from_slice(&[UNIT_SEPARATOR, *param]);
            body.extend_from_slice(&(data.len() as u32).to_be_bytes()[1..]);
            body.extend_from_slice(data);
        }
        let mut out = (body.len() as u32).to_be_bytes()[1..].to_vec();
        out.extend(body);
        out
    }

    #[test]
    fn data_group_crc_is_checked() {
        let mut g = data_group(0x01, &[0x00, 0x00, 0x00, 0x00]);
        let dg = parse_data_group(&g).unwrap();
        assert_eq!(dg.language_tag(), Some(0));
        assert!(!dg.is_management());
        assert!(!dg.is_group_b());

        g[5] ^= 0x01;
        assert!(parse_data_group(&g).is_err());
    }

    #[test]
    fn statement_units() {
        let body: &[u8] = b"\x0EHi";
        let mut stmt = vec![0x00];
        stmt.extend(units(&[(0x20, body), (0x30, &[1u8, 2, 3][..])]));
        let s = parse_statement(&stmt).unwrap();
        assert_eq!(s.units.len(), 2);
        assert_eq!(s.units[0].parameter, DATA_UNIT_STATEMENT_BODY);
        assert_eq!(s.units[0].data, body);
    }

    #[test]
    fn management_languages() {
        let mut m = vec![0x3F, 0x01, 0x1F, b'j', b'p', b'n', 0x01];
        m.extend(units(&[]));
        let mgmt = parse_management(&m).unwrap();
        assert_eq!(mgmt.tmd, 0);
        assert_eq!(mgmt.languages.len(), 1);
        let lang = &mgmt.languages[0];
        assert_eq!(lang.language_tag, 0);
        assert_eq!(lang.dmf, 0x0F);
        assert_eq!(lang.iso_639, "jpn");
        assert_eq!(lang.rollup_mode, 1);
    }

    #[test]
    fn pes_with_private_stream_1_header() {
        let dg = data_group(0x01, &[0x00, 0x00, 0x00, 0x00]);
        let mut pes = vec![0x00, 0x00, 0x01, 0xBD, 0x00, 0x00, 0x80, 0x80, 0x05, 0, 0, 0, 0, 0];
        pes.extend_from_slice(&[0x80, 0xFF, 0xF0]);
        pes.extend_from_slice(&dg);
        let len = (pes.len() - 6) as u16;
        pes[4..6].copy_from_slice(&len.to_be_bytes());
        assert_eq!(pes_data_group(&pes).unwrap(), &dg[..]);
    }

    #[test]
    fn superimpose_is_rejected() {
        let pes = [0x00, 0x00, 0x01, 0xBF, 0x00, 0x03, 0x81, 0xFF, 0xF0];
        assert!(pes_data_group(&pes).is_err());
    }
}
