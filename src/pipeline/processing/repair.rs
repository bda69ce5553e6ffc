use crate::pipeline::ingestion::SourceSchema;
use crate::types::{RawRow, RepairKind, RepairedRow};

/// Strategy for realigning malformed rows to the expected column layout
pub trait RepairStrategy: Send + Sync {
    /// Human-readable name used in logs
    fn name(&self) -> &'static str;

    /// Return a row of exactly `expected_columns` cells. Never fails; cells
    /// that cannot be determined are empty strings.
    fn repair(&self, row: &RawRow, expected_columns: usize) -> RepairedRow;
}

/// Repairs rows where a missing second-name value pushed every later column
/// one slot to the left.
///
/// For a shifted row every column from `anchor` onward takes the value stored
/// one position to its left, and the two name columns are rebuilt by splitting
/// the raw name field on whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingleGapLeftShiftRepair {
    pub first_name_index: usize,
    pub second_name_index: usize,
    pub anchor: usize,
}

impl Default for SingleGapLeftShiftRepair {
    fn default() -> Self {
        Self::new(1, 2, 3)
    }
}

impl SingleGapLeftShiftRepair {
    pub fn new(first_name_index: usize, second_name_index: usize, anchor: usize) -> Self {
        Self {
            first_name_index,
            second_name_index,
            anchor,
        }
    }

    /// Derive the indexes from a validated header: the gap sits at the
    /// second-name column, so realignment starts right after it.
    pub fn for_schema(schema: &SourceSchema) -> Self {
        Self::new(schema.first_name, schema.last_name, schema.last_name + 1)
    }
}

impl RepairStrategy for SingleGapLeftShiftRepair {
    fn name(&self) -> &'static str {
        "single_gap_left_shift"
    }

    fn repair(&self, row: &RawRow, expected_columns: usize) -> RepairedRow {
        let source = |idx: usize| cell(row, idx);

        let mut cells: Vec<String> = (0..expected_columns).map(|i| source(i).to_string()).collect();

        let present = row.present_count();
        if present >= expected_columns {
            return RepairedRow {
                index: row.index,
                cells,
                repair: RepairKind::Intact,
            };
        }

        // Single left-to-right pass; reads come from the untouched source row.
        for col in self.anchor.max(1)..expected_columns {
            if col < row.cells.len() {
                cells[col] = source(col - 1).to_string();
            }
        }

        let tokens: Vec<&str> = source(self.first_name_index).split_whitespace().collect();
        if let Some(first) = cells.get_mut(self.first_name_index) {
            *first = tokens.first().copied().unwrap_or("").to_string();
        }
        if let Some(second) = cells.get_mut(self.second_name_index) {
            *second = if tokens.len() > 1 {
                tokens[1..].join(" ")
            } else {
                String::new()
            };
        }

        let ambiguous = expected_columns - present > 1 || tokens.len() < 2;

        RepairedRow {
            index: row.index,
            cells,
            repair: RepairKind::Shifted { ambiguous },
        }
    }
}

fn cell(row: &RawRow, idx: usize) -> &str {
    row.cells
        .get(idx)
        .and_then(|c| c.as_deref())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shifted(values: &[&str], width: usize) -> RawRow {
        let mut cells: Vec<Option<String>> = values.iter().map(|v| Some(v.to_string())).collect();
        cells.resize(width, None);
        RawRow::new(0, cells)
    }

    #[test]
    fn test_well_formed_row_is_unchanged() {
        let row = RawRow::from_values(3, ["1990-05-15", "John O'Brien", "", "55000", "-", "E001"]);
        let repaired = SingleGapLeftShiftRepair::default().repair(&row, 6);

        assert_eq!(repaired.repair, RepairKind::Intact);
        assert_eq!(repaired.index, 3);
        assert_eq!(
            repaired.cells,
            vec!["1990-05-15", "John O'Brien", "", "55000", "-", "E001"]
        );
    }

    #[test]
    fn test_shifted_five_column_row_is_realigned() {
        let row = shifted(&["1985-01-01", "Jane Doe", "60000", "Sales"], 5);
        let repaired = SingleGapLeftShiftRepair::default().repair(&row, 5);

        assert_eq!(repaired.repair, RepairKind::Shifted { ambiguous: false });
        assert_eq!(
            repaired.cells,
            vec!["1985-01-01", "Jane", "Doe", "60000", "Sales"]
        );
    }

    #[test]
    fn test_shifted_row_keeps_multi_token_second_name() {
        let row = shifted(&["1985-01-01", "Mary Ann  Lee", "60000", "Sales", "E7"], 6);
        let repaired = SingleGapLeftShiftRepair::default().repair(&row, 6);

        assert_eq!(repaired.cells[1], "Mary");
        assert_eq!(repaired.cells[2], "Ann Lee");
        assert_eq!(repaired.cells[5], "E7");
    }

    #[test]
    fn test_single_token_name_is_ambiguous() {
        let row = shifted(&["1985-01-01", "Cher", "60000", "Sales", "E9"], 6);
        let repaired = SingleGapLeftShiftRepair::default().repair(&row, 6);

        assert_eq!(repaired.repair, RepairKind::Shifted { ambiguous: true });
        assert_eq!(repaired.cells[1], "Cher");
        assert_eq!(repaired.cells[2], "");
    }

    #[test]
    fn test_two_gaps_are_ambiguous() {
        let row = shifted(&["1985-01-01", "Jane Doe", "60000", "Sales"], 6);
        let repaired = SingleGapLeftShiftRepair::default().repair(&row, 6);
        assert_eq!(repaired.repair, RepairKind::Shifted { ambiguous: true });
    }

    #[test]
    fn test_repair_never_indexes_past_the_row() {
        let row = RawRow::new(0, vec![Some("1985-01-01".into()), Some("Jane Doe".into())]);
        let repaired = SingleGapLeftShiftRepair::default().repair(&row, 6);

        assert_eq!(repaired.cells.len(), 6);
        assert_eq!(repaired.cells[1], "Jane");
        assert_eq!(repaired.cells[2], "Doe");
        assert!(repaired.cells[3..].iter().all(String::is_empty));
    }

    #[test]
    fn test_expected_count_smaller_than_anchor() {
        let row = shifted(&["x"], 2);
        let repaired = SingleGapLeftShiftRepair::default().repair(&row, 2);
        assert_eq!(repaired.cells.len(), 2);
    }

    #[test]
    fn test_for_schema_follows_header_positions() {
        let schema = SourceSchema::from_headers([
            "EmployeeID",
            "BirthDate",
            "FirstName",
            "LastName",
            "Salary",
            "Department",
        ])
        .unwrap();
        let strategy = SingleGapLeftShiftRepair::for_schema(&schema);
        assert_eq!(strategy, SingleGapLeftShiftRepair::new(2, 3, 4));
    }
}
