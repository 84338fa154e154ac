//! Legacy advertising payload encoding
//!
//! The payload is a sequence of AD structures, each `[length, type, data..]`
//! where `length` counts the type byte plus the data.

use crate::error::{Error, Result};
use crate::gap::constants::*;
use crate::gap::types::AdvertisementData;
use crate::uuid::Uuid;
use byteorder::{ByteOrder, LittleEndian};
use log::trace;

/// Encodes `data` as a general-discoverable, LE-only advertisement.
///
/// Fails with [`Error::AdvertisementTooLarge`] when the result does not fit
/// in [`LEGACY_ADV_MAX_LEN`] bytes.
pub fn encode(data: &AdvertisementData) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(LEGACY_ADV_MAX_LEN);
    push_structure(
        &mut out,
        ADV_TYPE_FLAGS,
        &[ADV_FLAG_LE_GENERAL_DISCOVERABLE | ADV_FLAG_BR_EDR_NOT_SUPPORTED],
    );

    let mut short_uuids = Vec::new();
    let mut long_uuids = Vec::new();
    for uuid in &data.service_uuids {
        match uuid.as_u16() {
            Some(uuid16) => {
                let mut buf = [0u8; 2];
                LittleEndian::write_u16(&mut buf, uuid16);
                short_uuids.extend_from_slice(&buf);
            }
            None => long_uuids.extend_from_slice(uuid.as_bytes_le()),
        }
    }
    if !short_uuids.is_empty() {
        push_structure(&mut out, ADV_TYPE_16BIT_SERVICE_UUID_COMPLETE, &short_uuids);
    }
    if !long_uuids.is_empty() {
        push_structure(&mut out, ADV_TYPE_128BIT_SERVICE_UUID_COMPLETE, &long_uuids);
    }

    if let Some(name) = &data.local_name {
        push_structure(&mut out, ADV_TYPE_COMPLETE_LOCAL_NAME, name.as_bytes());
    }
    if let Some(level) = data.tx_power {
        push_structure(&mut out, ADV_TYPE_TX_POWER_LEVEL, &[level as u8]);
    }
    if let Some(manufacturer) = &data.manufacturer_data {
        push_structure(&mut out, ADV_TYPE_MANUFACTURER_SPECIFIC, manufacturer);
    }

    if out.len() > LEGACY_ADV_MAX_LEN {
        return Err(Error::AdvertisementTooLarge(out.len()));
    }
    Ok(out)
}

fn push_structure(out: &mut Vec<u8>, ad_type: u8, data: &[u8]) {
    // Oversized fields are caught by the total length check.
    out.push((data.len() + 1).min(u8::MAX as usize) as u8);
    out.push(ad_type);
    out.extend_from_slice(data);
}

/// Splits raw advertising data into `(type, data)` pairs.
///
/// Parsing stops at the first zero length or truncated structure.
pub fn parse_advertising_data(data: &[u8]) -> Vec<(u8, &[u8])> {
    let mut result = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let length = data[i] as usize;
        if length == 0 || i + length >= data.len() {
            break;
        }

        result.push((data[i + 1], &data[i + 2..i + 1 + length]));
        i += 1 + length;
    }

    result
}

/// Decodes the fields of a raw advertisement. Unknown or malformed fields
/// are skipped.
pub fn decode(raw: &[u8]) -> AdvertisementData {
    let mut data = AdvertisementData::default();

    for (ad_type, field) in parse_advertising_data(raw) {
        match ad_type {
            ADV_TYPE_SHORT_LOCAL_NAME | ADV_TYPE_COMPLETE_LOCAL_NAME => {
                if let Ok(name) = std::str::from_utf8(field) {
                    data.local_name = Some(name.to_string());
                }
            }
            ADV_TYPE_16BIT_SERVICE_UUID_PARTIAL | ADV_TYPE_16BIT_SERVICE_UUID_COMPLETE => {
                for chunk in field.chunks_exact(2) {
                    data = data.with_service_uuid(Uuid::from_u16(LittleEndian::read_u16(chunk)));
                }
            }
            ADV_TYPE_32BIT_SERVICE_UUID_PARTIAL | ADV_TYPE_32BIT_SERVICE_UUID_COMPLETE => {
                for chunk in field.chunks_exact(4) {
                    data = data.with_service_uuid(Uuid::from_u32(LittleEndian::read_u32(chunk)));
                }
            }
            ADV_TYPE_128BIT_SERVICE_UUID_PARTIAL | ADV_TYPE_128BIT_SERVICE_UUID_COMPLETE => {
                for chunk in field.chunks_exact(16) {
                    if let Some(uuid) = Uuid::try_from_slice_le(chunk) {
                        data = data.with_service_uuid(uuid);
                    }
                }
            }
            ADV_TYPE_TX_POWER_LEVEL => {
                if field.len() == 1 {
                    data.tx_power = Some(field[0] as i8);
                }
            }
            ADV_TYPE_MANUFACTURER_SPECIFIC => {
                data.manufacturer_data = Some(field.to_vec());
            }
            ADV_TYPE_FLAGS => {}
            other => trace!("skipping AD type 0x{:02x}", other),
        }
    }

    data
}
