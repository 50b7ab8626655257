//! Physical LED matrix layout of the Ohm64
//!
//! The LED-sync sysex addresses the grid as 6 scan columns of 14 slots.
//! Slots 0-6 of a column land in its LL byte, slots 7-13 in its HH byte.
//! Slots that carry no button are `NC` and always encode as 0.

use crate::error::{Result, SurfaceError};

/// Number of logical buttons on the grid
pub const BUTTON_COUNT: usize = 64;

/// Scan columns in the LED-sync frame
pub const COLUMNS: usize = 6;

/// Slots per column (LL half + HH half)
pub const SLOTS_PER_COLUMN: usize = 14;

/// Slots per 7-bit half
pub const SLOTS_PER_HALF: usize = 7;

/// Not connected
const NC: Option<u8> = None;

/// Logical button id for every (column, slot) of the scan matrix.
#[rustfmt::skip]
pub const INDEX_MAP: IndexTable = [
    [Some(0),  Some(48), Some(33), Some(18), Some(3),  Some(51), Some(36),
     Some(21), Some(6),  Some(54), Some(39), NC,       NC,       NC],
    [Some(8),  Some(56), Some(41), Some(26), Some(11), Some(59), Some(44),
     Some(29), Some(14), Some(62), Some(47), NC,       NC,       NC],
    [Some(16), Some(1),  Some(49), Some(34), Some(19), Some(4),  Some(52),
     Some(37), Some(22), Some(7),  Some(55), NC,       NC,       NC],
    [Some(24), Some(9),  Some(57), Some(42), Some(27), Some(12), Some(60),
     Some(45), Some(30), Some(15), Some(63), NC,       NC,       NC],
    [Some(32), Some(17), Some(2),  Some(50), Some(35), Some(20), Some(5),
     Some(53), Some(38), Some(23), NC,       NC,       NC,       NC],
    [Some(40), Some(25), Some(10), Some(58), Some(43), Some(28), Some(13),
     Some(61), Some(46), Some(31), NC,       NC,       NC,       NC],
];

/// Physical slot table, one row per column
pub type IndexTable = [[Option<u8>; SLOTS_PER_COLUMN]; COLUMNS];

/// Check [`INDEX_MAP`]; run once when a surface is created
pub fn validate() -> Result<()> {
    validate_table(&INDEX_MAP)
}

/// Check that every button id 0-63 owns exactly one slot and nothing else
/// appears in the table.
pub fn validate_table(table: &IndexTable) -> Result<()> {
    let mut seen: [Option<(usize, usize)>; BUTTON_COUNT] = [None; BUTTON_COUNT];

    for (column, slots) in table.iter().enumerate() {
        for (slot, entry) in slots.iter().enumerate() {
            let Some(id) = *entry else { continue };
            let index = id as usize;

            if index >= BUTTON_COUNT {
                return Err(SurfaceError::InvalidLayout(format!(
                    "column {} slot {} holds id {} (max {})",
                    column,
                    slot,
                    id,
                    BUTTON_COUNT - 1
                )));
            }

            if let Some((prev_column, prev_slot)) = seen[index] {
                return Err(SurfaceError::InvalidLayout(format!(
                    "id {} appears at column {} slot {} and column {} slot {}",
                    id, prev_column, prev_slot, column, slot
                )));
            }

            seen[index] = Some((column, slot));
        }
    }

    if let Some(missing) = seen.iter().position(Option::is_none) {
        return Err(SurfaceError::InvalidLayout(format!(
            "id {} has no slot",
            missing
        )));
    }

    Ok(())
}

/// Physical (column, slot) of a button id
pub fn slot_of(id: u8) -> Option<(usize, usize)> {
    INDEX_MAP.iter().enumerate().find_map(|(column, slots)| {
        slots
            .iter()
            .position(|entry| *entry == Some(id))
            .map(|slot| (column, slot))
    })
}

/// Number of real buttons in the LL and HH halves of a column
pub fn populated_slots(column: usize) -> (usize, usize) {
    let Some(slots) = INDEX_MAP.get(column) else {
        return (0, 0);
    };
    let (low, high) = slots.split_at(SLOTS_PER_HALF);
    (
        low.iter().filter(|s| s.is_some()).count(),
        high.iter().filter(|s| s.is_some()).count(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_valid() {
        validate().unwrap();
    }

    fn assert_invalid(table: &IndexTable, needle: &str) {
        match validate_table(table) {
            Err(SurfaceError::InvalidLayout(reason)) => {
                assert!(reason.contains(needle), "unexpected reason: {}", reason)
            }
            other => panic!("expected InvalidLayout, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_duplicate_id() {
        let mut table = INDEX_MAP;
        // 48 now appears twice and 0 has no slot; the duplicate is found first
        table[0][0] = Some(48);
        assert_invalid(&table, "id 48 appears at column 0 slot 0 and column 0 slot 1");
    }

    #[test]
    fn test_rejects_id_out_of_range() {
        let mut table = INDEX_MAP;
        table[5][10] = Some(64);
        assert_invalid(&table, "holds id 64");
    }

    #[test]
    fn test_rejects_missing_id() {
        let mut table = INDEX_MAP;
        let (column, slot) = slot_of(37).unwrap();
        table[column][slot] = None;
        assert_invalid(&table, "id 37 has no slot");
    }

    #[test]
    fn test_every_id_has_a_slot() {
        for id in 0..BUTTON_COUNT as u8 {
            let (column, slot) = slot_of(id).unwrap();
            assert_eq!(INDEX_MAP[column][slot], Some(id));
        }
        assert_eq!(slot_of(64), None);
    }

    #[test]
    fn test_known_positions() {
        assert_eq!(slot_of(0), Some((0, 0)));
        assert_eq!(slot_of(21), Some((0, 7)));
        assert_eq!(slot_of(63), Some((3, 10)));
        assert_eq!(slot_of(31), Some((5, 9)));
    }

    #[test]
    fn test_padding_sits_in_high_half() {
        let total: usize = (0..COLUMNS)
            .map(|c| {
                let (low, high) = populated_slots(c);
                assert_eq!(low, SLOTS_PER_HALF);
                low + high
            })
            .sum();
        assert_eq!(total, BUTTON_COUNT);
        assert_eq!(populated_slots(COLUMNS), (0, 0));
    }
}
