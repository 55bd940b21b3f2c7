use super::*;
use crate::error::DesignError;

fn image_with(bytes: &[(usize, usize, u8)]) -> MemoryBase {
    let mut mem = MemoryBase::new(SSRAM_BANK_SIZE, SSRAM_N_BANKS, 0);
    for (bank, byte, value) in bytes {
        mem.set(*bank, *byte, *value).unwrap();
    }
    mem
}

fn compress(mem: &MemoryBase) -> Vec<u8> {
    let mut data = Vec::new();
    to_data_bytestream(mem, &mut data).unwrap();
    data
}

fn round_trip(mem: &MemoryBase) -> ConfigurationData {
    let mut data = DeviceHeader::default().to_bytes().to_vec();
    to_data_bytestream(mem, &mut data).unwrap();
    ConfigurationData::parse(&data, mem.bank_size(), mem.n_banks(), mem.bank_addr_start())
        .unwrap()
}

#[test]
fn test_write_once() {
    let mut mem = MemoryBase::new(0x20, 2, 0);
    mem.set(1, 3, 0x42).unwrap();
    assert!(matches!(mem.set(1, 3, 0x42), Err(DesignError::MemoryConflict(_))));
    assert_eq!(mem.get(1, 3).unwrap(), MemoryCell::Set(0x42));
}

#[test]
fn test_written_zero_differs_from_unset() {
    let mut mem = MemoryBase::new(0x20, 2, 0);
    mem.set(0, 0, 0).unwrap();
    assert_eq!(mem.get(0, 0).unwrap(), MemoryCell::Set(0));
    assert_eq!(mem.get(0, 1).unwrap(), MemoryCell::Unset);
    assert!(mem.get(0, 0).unwrap().is_set());
    assert!(!mem.get(0, 1).unwrap().is_set());
    assert_eq!(mem.get(0, 1).unwrap().value(), 0);
}

#[test]
fn test_out_of_range() {
    let mut mem = MemoryBase::new(0x20, 2, 1);
    assert!(matches!(mem.set(0, 0, 1), Err(DesignError::MemoryConflict(_))));
    assert!(matches!(mem.set(3, 0, 1), Err(DesignError::MemoryConflict(_))));
    assert!(matches!(mem.set(1, 0x20, 1), Err(DesignError::MemoryConflict(_))));
    assert!(mem.get(2, 0x1F).is_ok());
}

#[test]
fn test_set_bytes() {
    let mut mem = MemoryBase::new(0x20, 1, 0);
    mem.set_bytes(0, 4, &[1, 2, 3]).unwrap();
    assert_eq!(mem.values()[3 .. 8], [0, 1, 2, 3, 0]);
    assert!(mem.set_bytes(0, 6, &[9, 9]).is_err());
}

#[test]
fn test_ssram_banks() {
    use crate::common::BlockId;

    assert_eq!(ShadowSram::block_bank_a(BlockId(1)), 3);
    assert_eq!(ShadowSram::block_bank_b(BlockId(1)), 4);
    assert_eq!(ShadowSram::block_bank_a(BlockId(4)), 9);
    assert_eq!(ShadowSram::block_bank_b(BlockId(4)), 10);
    assert!(ShadowSram::new().includes(10, 0x1F));
    assert!(!ShadowSram::new().includes(11, 0));
}

#[test]
fn test_single_section() {
    let mem = image_with(&[(1, 2, 0xAA), (1, 3, 0xBB)]);
    assert_eq!(
        compress(&mem),
        vec![0x02 | SECTION_LAST, 0x01, 0x02, 0xAA, 0xBB, SECTION_TERMINATOR]
    );
}

#[test]
fn test_gap_of_four_zeros_is_absorbed() {
    let mem = image_with(&[(0, 0, 1), (0, 5, 2)]);
    assert_eq!(
        compress(&mem),
        vec![SECTION_LAST, 0x00, 0x06, 1, 0, 0, 0, 0, 2, SECTION_TERMINATOR]
    );
}

#[test]
fn test_gap_of_five_zeros_splits() {
    let mem = image_with(&[(0, 0, 1), (0, 6, 2)]);
    assert_eq!(
        compress(&mem),
        vec![
            SECTION_MORE_FOLLOWS, 0x00, 0x01, 1, SECTION_TERMINATOR,
            0x06 | SECTION_LAST, 0x00, 0x01, 2, SECTION_TERMINATOR,
        ]
    );
}

#[test]
fn test_section_cap() {
    let mut mem = MemoryBase::new(SSRAM_BANK_SIZE, SSRAM_N_BANKS, 0);
    for idx in 0 .. 300 {
        mem.set(idx / SSRAM_BANK_SIZE, idx % SSRAM_BANK_SIZE, 0x11).unwrap();
    }
    let data = compress(&mem);

    /* First section: 256 bytes, encoded as length 0 */
    assert_eq!(data[0], SECTION_MORE_FOLLOWS);
    assert_eq!(data[1], 0x00);
    assert_eq!(data[2], 0x00);
    assert_eq!(data[3 + 256], SECTION_TERMINATOR);

    /* Second one starts at linear index 256 = bank 8, byte 0 */
    let second = &data[4 + 256 ..];
    assert_eq!(second[0], SECTION_LAST);
    assert_eq!(second[1], 0x08);
    assert_eq!(second[2], 44);
    assert_eq!(second.len(), 3 + 44 + 1);
}

#[test]
fn test_empty_image() {
    let mem = MemoryBase::new(SSRAM_BANK_SIZE, SSRAM_N_BANKS, 0);
    assert!(compress(&mem).is_empty());
    let decoded = round_trip(&mem);
    assert_eq!(decoded.section_count, 0);
    assert_eq!(decoded.memory.values(), mem.values());
}

#[test]
fn test_round_trip() {
    let mem = image_with(&[
        (0, 0x07, 0x04),
        (0, 0x08, 0x40),
        (0, 0x0B, 0x10),
        (3, 0x00, 0xFF),
        (3, 0x03, 0x7F),
        (3, 0x1F, 0x13),
        (4, 0x00, 0x05),
        (9, 0x10, 0x81),
        (10, 0x1F, 0x01),
    ]);
    let decoded = round_trip(&mem);
    assert_eq!(decoded.header, DeviceHeader::default());
    assert_eq!(decoded.memory.values(), mem.values());
    assert!(decoded.section_count >= 3);
}

#[test]
fn test_round_trip_keeps_interior_zeros() {
    let mut mem = MemoryBase::new(SSRAM_BANK_SIZE, SSRAM_N_BANKS, 0);
    mem.set_bytes(5, 0x10, &[1, 0, 0, 2, 0, 0, 0, 0, 3]).unwrap();
    let decoded = round_trip(&mem);
    assert_eq!(decoded.section_count, 1);
    assert_eq!(decoded.memory.values(), mem.values());
    /* Interior zeros travel in the stream and get written as such */
    assert_eq!(decoded.memory.get(5, 0x11).unwrap(), MemoryCell::Set(0));
}

#[test]
fn test_parse_errors() {
    assert_eq!(
        ConfigurationData::parse(&[0x00], 0x20, 11, 0),
        Err(BytestreamError::MissingSync(0x00))
    );

    let mut data = DeviceHeader::default().to_bytes().to_vec();
    data.extend_from_slice(&[SECTION_LAST, 0x00, 0x02, 0x01]);
    assert_eq!(
        ConfigurationData::parse(&data, 0x20, 11, 0),
        Err(BytestreamError::Truncated(data.len()))
    );

    let mut data = DeviceHeader::default().to_bytes().to_vec();
    data.extend_from_slice(&[SECTION_LAST, 0x00, 0x01, 0x01, 0x00]);
    assert_eq!(
        ConfigurationData::parse(&data, 0x20, 11, 0),
        Err(BytestreamError::MissingTerminator(data.len() - 1))
    );
}

#[test]
fn test_unencodable_geometry() {
    /* Byte addresses only have 5 bits in a section header */
    let mut mem = MemoryBase::new(0x40, 2, 0);
    mem.set(0, 0x25, 0x11).unwrap();
    let mut data = Vec::new();
    assert_eq!(
        to_data_bytestream(&mem, &mut data),
        Err(BytestreamError::UnencodableGeometry { bank_size: 0x40, n_banks: 2, start: 0 })
    );
    assert!(data.is_empty());

    let mem = MemoryBase::new(0x20, 4, 0xFE);
    assert!(matches!(
        to_data_bytestream(&mem, &mut data),
        Err(BytestreamError::UnencodableGeometry { .. })
    ));

    /* The largest encodable geometry still works */
    let mut mem = MemoryBase::new(0x20, 2, 0xFE);
    mem.set(0xFF, 0x1F, 0x42).unwrap();
    let decoded = round_trip(&mem);
    assert_eq!(decoded.memory.get(0xFF, 0x1F).unwrap(), MemoryCell::Set(0x42));
}
