pub mod file;
pub mod google;
pub mod traits;
pub mod types;

use std::path::Path;

use anyhow::Result;

pub use file::CsvFileSource;
pub use google::GoogleSheetSource;
pub use traits::SheetSource;
pub use types::SheetRef;

/// Pick a source for a command-line argument: URLs are fetched, existing
/// paths are read from disk and anything else is taken as a published sheet key.
pub fn source_from_arg(arg: &str) -> Result<Box<dyn SheetSource>> {
    let arg = arg.trim();
    if arg.starts_with("http://") || arg.starts_with("https://") {
        return Ok(Box::new(GoogleSheetSource::new(SheetRef::Url(arg.to_string()))?));
    }
    if Path::new(arg).exists() {
        return Ok(Box::new(CsvFileSource::new(arg)));
    }
    Ok(Box::new(GoogleSheetSource::new(SheetRef::Published {
        key: arg.to_string(),
    })?))
}
