mod stream;

pub use stream::StreamRequest;
