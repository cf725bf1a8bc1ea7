use std::path::Path;

use arrow_cast::pretty::pretty_format_batches;
use jsontab::error::JsonTabResult;
use jsontab::io::FileReadAt;
use jsontab::{TableOptions, TableReaderOptions};
use log::{info, warn};

pub fn exec_cat(
    file: impl AsRef<Path>,
    batch_size: usize,
    limit: Option<usize>,
    options: Option<&str>,
) -> JsonTabResult<()> {
    let mut options_builder =
        TableReaderOptions::new(FileReadAt::open(file)?).with_batch_size(batch_size);
    if let Some(json) = options {
        options_builder = options_builder.with_options(TableOptions::from_json(json)?)?;
    }
    let mut reader = options_builder.resolve()?;
    info!(
        "reading {} document in batches of {}",
        reader.table_type().shape(),
        reader.batch_size()
    );
    reader.prepare()?;

    let mut remaining = limit.unwrap_or(usize::MAX);
    while remaining > 0 {
        let Some(batch) = reader.next_batch()? else {
            break;
        };
        let batch = batch.slice(0, batch.num_rows().min(remaining));
        remaining -= batch.num_rows();
        println!("{}", pretty_format_batches(&[batch])?);
    }

    let failures = reader.coercion_failures();
    if failures > 0 {
        warn!("{failures} values did not fit their column type and were read as null");
    }
    Ok(())
}
