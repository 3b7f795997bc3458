pub mod params;
pub mod prerender;
