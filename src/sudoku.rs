use crate::constraint::{GivenDigits, HandlerSet, HouseHandler};
use crate::core::{CellIndex, CellValue, Error, Shape, ValueSet};

pub const BAD_GIVENS_ERROR: Error =
    Error::new_const("Givens string length does not match the grid");
pub const BAD_GIVEN_DIGIT_ERROR: Error = Error::new_const("Invalid digit in givens string");
pub const BAD_REGION_ERROR: Error =
    Error::new_const("Jigsaw regions must cover one cell per value");

/// The cell lists of the standard houses: rows, columns, and (when the grid
/// size factors) boxes.
pub fn standard_houses(shape: &Shape) -> Vec<Vec<CellIndex>> {
    let n = shape.grid_size();
    let mut houses = Vec::new();
    for r in 0..n {
        houses.push((0..n).map(|c| shape.cell_index(r, c)).collect());
    }
    for c in 0..n {
        houses.push((0..n).map(|r| shape.cell_index(r, c)).collect());
    }
    let (br, bc) = shape.box_dims();
    if br > 1 {
        for b in 0..n {
            let r0 = (b / (n / bc)) * br;
            let c0 = (b % (n / bc)) * bc;
            let mut cells = Vec::with_capacity(n);
            for dr in 0..br {
                for dc in 0..bc {
                    cells.push(shape.cell_index(r0 + dr, c0 + dc));
                }
            }
            houses.push(cells);
        }
    }
    houses
}

/// Handler set for a classic puzzle: rows, columns, boxes.
pub fn standard_handler_set(shape: &Shape) -> HandlerSet {
    let mut set = HandlerSet::new();
    for house in standard_houses(shape) {
        set.add(HouseHandler::new(house, shape));
    }
    set
}

/// Handler set for a jigsaw puzzle: rows, columns, and the given regions in
/// place of boxes.
pub fn jigsaw_handler_set(shape: &Shape, regions: &[Vec<CellIndex>]) -> Result<HandlerSet, Error> {
    let n = shape.grid_size();
    let mut set = HandlerSet::new();
    for r in 0..n {
        set.add(HouseHandler::new(
            (0..n).map(|c| shape.cell_index(r, c)).collect(),
            shape,
        ));
    }
    for c in 0..n {
        set.add(HouseHandler::new(
            (0..n).map(|r| shape.cell_index(r, c)).collect(),
            shape,
        ));
    }
    for region in regions {
        if region.len() != n || region.iter().any(|&c| c >= shape.num_cells()) {
            return Err(BAD_REGION_ERROR);
        }
        let mut cells = region.clone();
        cells.sort_unstable();
        cells.dedup();
        if cells.len() != n {
            return Err(BAD_REGION_ERROR);
        }
        set.add(HouseHandler::new(region.clone(), shape));
    }
    Ok(set)
}

/// Parses a flat givens string, one character per cell row-major, with `0`
/// or `.` for a blank.
pub fn parse_givens(s: &str, shape: &Shape) -> Result<Vec<(CellIndex, CellValue)>, Error> {
    let chars: Vec<char> = s.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.len() != shape.num_cells() {
        return Err(BAD_GIVENS_ERROR);
    }
    let mut givens = Vec::new();
    for (cell, &ch) in chars.iter().enumerate() {
        if ch == '0' || ch == '.' {
            continue;
        }
        let v = ch.to_digit(10).ok_or(BAD_GIVEN_DIGIT_ERROR)? as CellValue;
        if v == 0 || v as usize > shape.num_values() {
            return Err(BAD_GIVEN_DIGIT_ERROR);
        }
        givens.push((cell, v));
    }
    Ok(givens)
}

/// Handler set for a classic puzzle with givens.
pub fn standard_puzzle(shape: &Shape, givens: &str) -> Result<HandlerSet, Error> {
    let mut set = standard_handler_set(shape);
    set.add(GivenDigits::new(&parse_givens(givens, shape)?));
    Ok(set)
}

/// Decodes a fully fixed mask vector into digits; None if any cell is not a
/// singleton.
pub fn solution_values(grid: &[ValueSet]) -> Option<Vec<CellValue>> {
    grid.iter().map(|m| m.value()).collect()
}

/// Renders a solved grid the way puzzles are entered, one digit per cell.
pub fn serialize_values(values: &[CellValue]) -> String {
    values.iter().map(|v| v.to_string()).collect()
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    use super::*;

    /// Checks that `values` satisfies every house of the standard layout
    /// and agrees with the givens string.
    pub fn assert_valid_classic_solution(shape: &Shape, givens: &str, values: &[CellValue]) {
        assert_eq!(values.len(), shape.num_cells());
        for house in standard_houses(shape) {
            let mut seen = ValueSet::EMPTY;
            for &c in &house {
                assert!(
                    !seen.contains(values[c]),
                    "duplicate {} in house {:?}",
                    values[c],
                    house
                );
                seen.insert(values[c]);
            }
            assert_eq!(seen, shape.all_values(), "house {:?} incomplete", house);
        }
        for (cell, v) in parse_givens(givens, shape).unwrap() {
            assert_eq!(values[cell], v, "solution contradicts given at cell {}", cell);
        }
    }
}
