pub mod f32;
pub mod io;
pub mod sequence;

pub use self::f32::ImageF32;
pub use self::io::{Frame, SampleFormat};
pub use self::sequence::{FrameSequence, IndexPattern, SequenceNaming};
