/// Buffer size used when streaming a file through a digest decorator.
pub const COPY_BUFFER_SIZE: usize = 64 * 1024;
