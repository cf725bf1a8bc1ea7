use std::path::Path;

use jsontab::Resolver;
use jsontab::error::JsonTabResult;
use jsontab::io::FileReadAt;

pub fn exec_schema(file: impl AsRef<Path>, inference_row_limit: Option<u64>) -> JsonTabResult<()> {
    let source = FileReadAt::open(file)?;
    let resolution = Resolver::new()
        .with_inference_row_limit(inference_row_limit)
        .resolve(source)?;
    let table_type = &resolution.table_type;

    println!("shape: {}", table_type.shape());
    if let Some(reason) = &resolution.reason {
        println!("reason: {reason}");
        return Ok(());
    }
    println!("rows: {}", resolution.rows);

    let Some(schema) = table_type.schema() else {
        return Ok(());
    };
    for field in schema.fields() {
        match table_type.column_boundary(field.name()) {
            Some(range) => println!("  {}: {} at {range}", field.name(), field.data_type()),
            None => println!("  {}: {}", field.name(), field.data_type()),
        }
    }
    Ok(())
}
