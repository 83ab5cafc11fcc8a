//! Text generation: provider seam, cancellable streams and response sanitizing.

mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod provider;
pub mod sanitize;
pub mod stream;


pub use error::GenerationError;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockGenerator;
pub use provider::{GenaiGenerator, GenerationProvider};
pub use sanitize::{FilterState, ThinkFilter, clean_response};
pub use stream::{GenerationStream, StreamEvent, StreamRegistry};
