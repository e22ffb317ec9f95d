use std::io::Read;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Number of records a complete mapping table must contain.
pub const MAPPING_TABLE_RECORDS: usize = 1_226_561;

/// One sensor-coordinate-to-angle mapping record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MappingRecord {
    pub x: i32,
    pub y: i32,
    pub theta: i32,
    pub phi: i32,
}

/// The full angle-to-angle mapping table, loaded once and shared
/// immutably across FOV engines.
#[derive(Debug, Clone)]
pub struct MappingTable {
    pub records: Vec<MappingRecord>,
}

impl MappingTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Load a mapping table from either a little-endian binary blob (`.bin`
/// extension: 1,226,561 records of 4 `i32`s each) or a CSV file with
/// columns `x,y,theta,phi`.
pub fn load_mapping_table(path: &Path) -> Result<MappingTable> {
    let is_binary = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("bin"))
        .unwrap_or(false);

    let table = if is_binary {
        load_binary(path)?
    } else {
        load_csv(path)?
    };

    if table.len() != MAPPING_TABLE_RECORDS {
        return Err(Error::LengthMismatch {
            expected: MAPPING_TABLE_RECORDS,
            got: table.len(),
        });
    }
    Ok(table)
}

fn load_binary(path: &Path) -> Result<MappingTable> {
    let mut file = std::fs::File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let mut cursor = std::io::Cursor::new(bytes);
    let mut records = Vec::with_capacity(MAPPING_TABLE_RECORDS);
    while (cursor.position() as usize) < cursor.get_ref().len() {
        let x = cursor.read_i32::<LittleEndian>()?;
        let y = cursor.read_i32::<LittleEndian>()?;
        let theta = cursor.read_i32::<LittleEndian>()?;
        let phi = cursor.read_i32::<LittleEndian>()?;
        records.push(MappingRecord { x, y, theta, phi });
    }
    Ok(MappingTable { records })
}

fn load_csv(path: &Path) -> Result<MappingTable> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut records = Vec::with_capacity(MAPPING_TABLE_RECORDS);
    for result in reader.deserialize() {
        let record: MappingRecord = result?;
        records.push(record);
    }
    Ok(MappingTable { records })
}
