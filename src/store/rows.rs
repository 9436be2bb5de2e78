use super::error::StoreError;

/// Decode every row, logging and dropping the ones that fail.
///
/// Bulk listings are partial-success: one malformed record does not hide
/// the rest of the listing.
pub(crate) fn skip_undecodable<R, T>(
    rows: impl IntoIterator<Item = R>,
    mut decode: impl FnMut(R) -> Result<T, StoreError>,
) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match decode(row) {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!("skipping row: {}", err);
                None
            }
        })
        .collect()
}
