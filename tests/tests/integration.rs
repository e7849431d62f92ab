//! All integration tests for progbuf

mod common;
mod progbuf_hls;
mod progbuf_progressive;
