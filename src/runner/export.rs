use std::io::Write;

use crate::{csv_utils::write_csv, dto::Transaction, dto::TransactionRow};

/// Writes transactions to the provided writer as CSV rows.
///
/// Rows are sorted by `transaction_id` for deterministic output, whatever
/// order the store returned them in.
///
/// # Errors
/// Returns an error if writing to the output fails.
pub fn export<W>(transactions: &[Transaction], writer: W) -> csv::Result<()>
where
    W: Write,
{
    let mut rows: Vec<_> = transactions.iter().map(TransactionRow::from).collect();
    rows.sort_by_key(|row| row.transaction_id);
    write_csv(writer, rows.into_iter())
}
