mod color;
mod graticule;
mod map;

pub use map::render_map;
