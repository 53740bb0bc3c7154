// psi/tdt.rs
//! TDT (0x70, no CRC)  &  TOT (0x73, CRC present) with JST time decoding.

use anyhow::{bail, Context};
use bitstream_io::{BigEndian, BitRead, BitReader};
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};

use crate::constants::{TABLE_ID_TDT, TABLE_ID_TOT};
use crate::psi::section::{crc_ok, locate_section};

#[derive(Debug)]
pub enum TdtTot<'a> {
    Tdt(NaiveDateTime),                 // time only
    Tot(NaiveDateTime, &'a [u8]),       // time + descriptor loop
}

impl TdtTot<'_> {
    pub fn time(&self) -> NaiveDateTime {
        match self {
            TdtTot::Tdt(t) | TdtTot::Tot(t, _) => *t,
        }
    }
}

pub fn parse_tdt_tot(payload: &[u8]) -> anyhow::Result<(u8, TdtTot<'_>)> {
    let (tid, sec) = locate_section(payload)?;
    if sec.len() < 8 { bail!("short TDT/TOT"); }

    match tid {
        TABLE_ID_TDT => Ok((tid, TdtTot::Tdt(decode_jst(&sec[3..8])?))),
        TABLE_ID_TOT => {
            if !crc_ok(sec) { bail!("TOT CRC mismatch"); }
            if sec.len() < 14 { bail!("short TOT"); }
            let time = decode_jst(&sec[3..8])?;
            let loop_len = (((sec[8] & 0x0F) as usize) << 8) | sec[9] as usize;
            let end = (10 + loop_len).min(sec.len() - 4);
            Ok((tid, TdtTot::Tot(time, &sec[10..end])))
        }
        _ => bail!("not TDT/TOT"),
    }
}

/// 16-bit MJD followed by hh:mm:ss as six BCD digits
fn decode_jst(raw: &[u8]) -> anyhow::Result<NaiveDateTime> {
    let mut br = BitReader::endian(raw, BigEndian);
    let mjd = br.read::<16, u16>()?;
    let mut hms = [0u32; 3];
    for field in hms.iter_mut() {
        let tens = br.read::<4, u8>()?;
        let units = br.read::<4, u8>()?;
        if tens > 9 || units > 9 { bail!("invalid BCD digit"); }
        *field = (tens * 10 + units) as u32;
    }

    let date = NaiveDate::from_ymd_opt(1858, 11, 17)
        .and_then(|epoch| epoch.checked_add_days(Days::new(mjd as u64)))
        .context("MJD out of range")?;
    let time = NaiveTime::from_hms_opt(hms[0], hms[1], hms[2]).context("invalid time of day")?;
    Ok(date.and_time(time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psi::section::CRC_MPEG;

    // 2024-01-02 = MJD 60311
    const TIME: [u8; 5] = [0xEB, 0x97, 0x12, 0x34, 0x56];

    #[test]
    fn decodes_tdt() {
        let mut payload = vec![0x00, 0x70, 0x70, 0x05];
        payload.extend_from_slice(&TIME);
        let (tid, t) = parse_tdt_tot(&payload).unwrap();
        assert_eq!(tid, 0x70);
        assert_eq!(t.time().to_string(), "2024-01-02 12:34:56");
    }

    #[test]
    fn decodes_tot_with_crc() {
        let mut sec = vec![0x73, 0x70, 0x0B];
        sec.extend_from_slice(&TIME);
        sec.extend_from_slice(&[0xF0, 0x00]);
        let crc = CRC_MPEG.checksum(&sec);
        sec.extend_from_slice(&crc.to_be_bytes());
        let mut payload = vec![0x00];
        payload.extend_from_slice(&sec);

        let (tid, t) = parse_tdt_tot(&payload).unwrap();
        assert_eq!(tid, 0x73);
        assert!(matches!(t, TdtTot::Tot(_, d) if d.is_empty()));
        assert_eq!(t.time().to_string(), "2024-01-02 12:34:56");

        let last = payload.len() - 1;
        payload[last] ^= 0x01;
        assert!(parse_tdt_tot(&payload).is_err());
    }

    #[test]
    fn rejects_invalid_bcd() {
        let payload = [0x00, 0x70, 0x70, 0x05, 0xEB, 0x97, 0x1A, 0x00, 0x00];
        assert!(parse_tdt_tot(&payload).is_err());
    }
}
