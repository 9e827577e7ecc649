pub mod color_cache;
pub mod interactive_rendering;
pub mod scene;
mod canvas_shader;
mod sample_shader;
