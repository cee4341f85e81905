pub mod capturer;
pub mod locator;
pub mod placement;
pub mod report_writer;
pub mod working_copy;

pub use capturer::RegionSnapshotCapturer;
pub use locator::MarkerLocator;
pub use placement::{PlacedImage, PlacementEngine};
pub use report_writer::ReportWriter;
pub use working_copy::{create_working_copies, next_copy_path};
