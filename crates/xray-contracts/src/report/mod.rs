mod diff;
mod export;

pub use diff::report_diff;
pub use export::{render_report_export, write_report_export, REPORT_TITLE};
