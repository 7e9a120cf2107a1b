pub mod engine;
pub mod preprocess;
pub mod reader;
pub mod setup;

pub use engine::{OcrEngine, TesseractEngine};
pub use reader::{read, NumericKind, NumericReading, ReadFormat};
pub use setup::locate_tesseract;
