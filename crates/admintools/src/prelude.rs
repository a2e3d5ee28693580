pub use crate::error::Error;

pub use admintools_core::error::CallError;
pub use admintools_core::record::{CallResult, Record};
pub use anstream::eprintln;
pub use anstream::println;
pub use color_eyre::eyre::{eyre, Context, OptionExt, Result};

pub fn new_table() -> prettytable::Table {
    let mut table = prettytable::Table::new();

    let format = prettytable::format::FormatBuilder::new()
        .padding(1, 1)
        .build();

    table.set_format(format);

    table
}

/// Prints a call result as pretty JSON or as a table.
///
/// `field` names the column used for bare scalar results.
pub fn print_result(result: CallResult, field: &str, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let rows = result.into_records(field);
    print_records(&rows);
    Ok(())
}

/// Every field name across `rows`, in order of first appearance.
///
/// Rows missing a column print an empty cell.
pub fn table_columns(rows: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for name in rows.iter().flat_map(Record::names) {
        if !columns.iter().any(|c| c == name) {
            columns.push(name.to_string());
        }
    }
    columns
}

pub fn print_records(rows: &[Record]) {
    use colored::Colorize;

    if rows.is_empty() {
        println!("{}", "No results.".yellow());
        return;
    }

    let columns = table_columns(rows);

    let mut table = new_table();
    table.add_row(prettytable::Row::new(
        columns
            .iter()
            .map(|c| prettytable::Cell::new(&c.bold().to_string()))
            .collect(),
    ));

    for row in rows {
        table.add_row(prettytable::Row::new(
            columns
                .iter()
                .map(|c| prettytable::Cell::new(&row.get_text(c)))
                .collect(),
        ));
    }

    table.printstd();
}
