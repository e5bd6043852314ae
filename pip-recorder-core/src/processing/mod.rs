pub mod canvas;
pub mod chunk_buffer;
pub mod compositor;
pub mod dsp;
pub mod mixing_graph;
