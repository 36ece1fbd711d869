pub mod app;
pub mod editor;
