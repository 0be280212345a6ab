// Scoring - accuracy windows around note events and their tally

pub mod windows;

pub use windows::{Accuracy, AccuracyTally, AccuracyWindows, CollisionRanges, NoteEdge};
