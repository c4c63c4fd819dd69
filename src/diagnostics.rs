/*!

Diagnostic text formatting: human-readable dumps of collector state.

Kept as a thin, non-authoritative surface (spec.md 1 excludes diagnostic
text formatting from the core contract) built on a small fixed-width table
renderer adapted from `examples/original_source/src/tables.cpp`'s
`Table::add_row`/`separator`/`to_string`, reimplemented as a `Display` impl
instead of a hand-rolled `to_string` method. Output here is for humans, not
a wire format; nothing in the collector depends on its exact text.

*/

use crate::arena::{Arena, WORD};
use crate::header::Mark;
use crate::roots::RootSet;
use crate::stats::Stats;

mod tables {
    use std::fmt;

    pub struct Table {
        column_widths: Vec<usize>,
        rows: Vec<String>,
    }

    impl Table {
        pub fn new(column_widths: Vec<usize>) -> Table {
            Table { column_widths, rows: Vec::new() }
        }

        pub fn add_row(&mut self, columns: &[String]) {
            debug_assert_eq!(columns.len(), self.column_widths.len());
            let mut row = String::new();
            for (column, width) in columns.iter().zip(&self.column_widths) {
                let truncated = &column[..column.len().min(*width)];
                row.push_str("| ");
                row.push_str(truncated);
                row.push_str(&" ".repeat(1 + width - truncated.len()));
            }
            row.push('|');
            self.rows.push(row);
        }

        pub fn separator(&mut self) {
            let mut row = String::new();
            for width in &self.column_widths {
                row.push('+');
                row.push_str(&"-".repeat(2 + width));
            }
            row.push('+');
            self.rows.push(row);
        }
    }

    impl fmt::Display for Table {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            for (i, row) in self.rows.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                write!(f, "{row}")?;
            }
            Ok(())
        }
    }
}

/// Renders running counters as a two-column table.
pub fn dump_stats(stats: &Stats) -> String {
    let mut table = tables::Table::new(vec![20, 12]);
    table.separator();
    table.add_row(&["field".to_string(), "value".to_string()]);
    table.separator();
    let rows: &[(&str, u64)] = &[
        ("max_memory", stats.max_memory as u64),
        ("used_blocks", stats.used_blocks as u64),
        ("free_blocks", stats.free_blocks as u64),
        ("total_blocks", stats.total_blocks as u64),
        ("peak_used_blocks", stats.peak_used_blocks as u64),
        ("used_bytes", stats.used_bytes as u64),
        ("free_bytes", stats.free_bytes as u64),
        ("peak_used_bytes", stats.peak_used_bytes as u64),
        ("reads", stats.reads),
        ("writes", stats.writes),
        ("full_collections", stats.full_collections),
        ("incremental_cycles", stats.incremental_cycles),
    ];
    for (name, value) in rows {
        table.add_row(&[name.to_string(), value.to_string()]);
    }
    table.separator();
    table.to_string()
}

/// Renders the root stack, top of stack last, with each handle's current
/// target address.
pub fn dump_roots(roots: &RootSet) -> String {
    let mut table = tables::Table::new(vec![6, 18]);
    table.separator();
    table.add_row(&["depth".to_string(), "target".to_string()]);
    table.separator();
    for (depth, handle) in roots.iter().enumerate() {
        let target = unsafe { std::ptr::read(*handle) };
        table.add_row(&[depth.to_string(), format!("{target:p}")]);
    }
    table.separator();
    table.to_string()
}

/// Renders every block in address order: its offset, size, and mark state.
pub fn dump_blocks(arena: &Arena) -> String {
    let mut table = tables::Table::new(vec![10, 10, 10]);
    table.separator();
    table.add_row(&["offset".to_string(), "size".to_string(), "mark".to_string()]);
    table.separator();
    for (index, header) in arena.iter_blocks() {
        let mark = match header.mark {
            Mark::NotMarked => "not-marked",
            Mark::Marked => "marked",
            Mark::Free => "free",
        };
        table.add_row(&[(index - WORD).to_string(), header.block_size().to_string(), mark.to_string()]);
    }
    table.separator();
    table.to_string()
}

/// Concatenates all three dumps under their own headings.
pub fn dump(arena: &Arena, roots: &RootSet, stats: &Stats) -> String {
    format!(
        "-- stats --\n{}\n-- roots --\n{}\n-- blocks --\n{}",
        dump_stats(stats),
        dump_roots(roots),
        dump_blocks(arena),
    )
}
