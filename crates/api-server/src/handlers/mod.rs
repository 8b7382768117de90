mod root;
mod stream;

pub use root::root_router;
pub use stream::stream_router;
