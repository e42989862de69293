//! Program-Specific Information sections: PAT and PMT (spec §4.11).

use crate::crc32::crc32_mpeg2;
use byteorder::{BigEndian, ByteOrder};
use relay_shared::error::{Error, Result};

const PAT_TABLE_ID: u8 = 0x00;
const PMT_TABLE_ID: u8 = 0x02;

/// One program entry in a PAT: the program number and the PID of its PMT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatProgram {
    pub number: u16,
    pub pmt_pid: u16,
}

/// Build the PAT section bytes (not yet TS-packetized) naming a single
/// program pointing at `pmt_pid`.
pub fn encode_pat(program_number: u16, pmt_pid: u16) -> Vec<u8> {
    let mut body = Vec::new();
    // transport_stream_id
    body.extend_from_slice(&[0x00, 0x01]);
    // reserved(2)=11 version(5)=0 current_next(1)=1
    body.push(0b1100_0001);
    body.push(0x00); // section_number
    body.push(0x00); // last_section_number
    body.extend_from_slice(&program_number.to_be_bytes());
    body.extend_from_slice(&(0xE000 | (pmt_pid & 0x1FFF)).to_be_bytes());

    encode_section(PAT_TABLE_ID, &body)
}

pub fn decode_pat(data: &[u8]) -> Result<Vec<PatProgram>> {
    let body = decode_section(PAT_TABLE_ID, data)?;
    // body: transport_stream_id(2) + flags(1) + section_number(1) + last_section_number(1) + N*(program(2)+pid(2))
    if body.len() < 5 {
        return Err(Error::TsPsiCrc);
    }
    let mut programs = Vec::new();
    let mut pos = 5;
    while pos + 4 <= body.len() {
        let number = BigEndian::read_u16(&body[pos..pos + 2]);
        let pid = BigEndian::read_u16(&body[pos + 2..pos + 4]) & 0x1FFF;
        programs.push(PatProgram {
            number,
            pmt_pid: pid,
        });
        pos += 4;
    }
    Ok(programs)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PmtEsInfo {
    pub stream_type: u8,
    pub elementary_pid: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PmtInfo {
    pub program_number: u16,
    pub pcr_pid: u16,
    pub streams: Vec<PmtEsInfo>,
}

pub fn encode_pmt(program_number: u16, pcr_pid: u16, streams: &[PmtEsInfo]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&program_number.to_be_bytes());
    body.push(0b1100_0001); // reserved+version+current_next
    body.push(0x00); // section_number
    body.push(0x00); // last_section_number
    body.extend_from_slice(&(0xE000 | (pcr_pid & 0x1FFF)).to_be_bytes());
    body.extend_from_slice(&0xF000u16.to_be_bytes()); // program_info_length = 0

    for es in streams {
        body.push(es.stream_type);
        body.extend_from_slice(&(0xE000 | (es.elementary_pid & 0x1FFF)).to_be_bytes());
        body.extend_from_slice(&0xF000u16.to_be_bytes()); // ES_info_length = 0
    }

    encode_section(PMT_TABLE_ID, &body)
}

pub fn decode_pmt(data: &[u8]) -> Result<PmtInfo> {
    let body = decode_section(PMT_TABLE_ID, data)?;
    if body.len() < 9 {
        return Err(Error::TsPsiCrc);
    }
    let program_number = BigEndian::read_u16(&body[0..2]);
    let pcr_pid = BigEndian::read_u16(&body[3..5]) & 0x1FFF;
    let program_info_length = (BigEndian::read_u16(&body[5..7]) & 0x0FFF) as usize;
    let mut pos = 7 + program_info_length;

    let mut streams = Vec::new();
    while pos + 5 <= body.len() {
        let stream_type = body[pos];
        let elementary_pid = BigEndian::read_u16(&body[pos + 1..pos + 3]) & 0x1FFF;
        let es_info_length = (BigEndian::read_u16(&body[pos + 3..pos + 5]) & 0x0FFF) as usize;
        streams.push(PmtEsInfo {
            stream_type,
            elementary_pid,
        });
        pos += 5 + es_info_length;
    }

    Ok(PmtInfo {
        program_number,
        pcr_pid,
        streams,
    })
}

fn encode_section(table_id: u8, body: &[u8]) -> Vec<u8> {
    // section_length covers everything after the length field, including the CRC.
    let section_length = body.len() + 4;
    let mut out = Vec::with_capacity(3 + body.len() + 4);
    out.push(table_id);
    out.extend_from_slice(&(0x8000u16 | (section_length as u16 & 0x0FFF)).to_be_bytes());
    out.extend_from_slice(body);
    let crc = crc32_mpeg2(&out);
    out.extend_from_slice(&crc.to_be_bytes());
    out
}

fn decode_section<'a>(expect_table_id: u8, data: &'a [u8]) -> Result<&'a [u8]> {
    if data.len() < 3 {
        return Err(Error::TsPsiCrc);
    }
    if data[0] != expect_table_id {
        return Err(Error::Other(format!(
            "psi: unexpected table_id {:#x}, want {:#x}",
            data[0], expect_table_id
        )));
    }
    let section_length = (BigEndian::read_u16(&data[1..3]) & 0x0FFF) as usize;
    let total = 3 + section_length;
    if data.len() < total {
        return Err(Error::TsPsiCrc);
    }
    let section = &data[..total];
    let (body_with_header, crc_bytes) = section.split_at(total - 4);
    let expected_crc = BigEndian::read_u32(crc_bytes);
    let actual_crc = crc32_mpeg2(body_with_header);
    if expected_crc != actual_crc {
        return Err(Error::TsPsiCrc);
    }
    Ok(&body_with_header[3..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pat_round_trips() {
        let encoded = encode_pat(1, 0x1001);
        let programs = decode_pat(&encoded).unwrap();
        assert_eq!(programs, vec![PatProgram { number: 1, pmt_pid: 0x1001 }]);
    }

    #[test]
    fn pmt_round_trips() {
        let streams = vec![
            PmtEsInfo { stream_type: 0x1B, elementary_pid: 0x100 },
            PmtEsInfo { stream_type: 0x0F, elementary_pid: 0x101 },
        ];
        let encoded = encode_pmt(1, 0x100, &streams);
        let info = decode_pmt(&encoded).unwrap();
        assert_eq!(info.program_number, 1);
        assert_eq!(info.pcr_pid, 0x100);
        assert_eq!(info.streams, streams);
    }

    #[test]
    fn corrupted_crc_is_rejected() {
        let mut encoded = encode_pat(1, 0x1001);
        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;
        assert!(decode_pat(&encoded).is_err());
    }
}
