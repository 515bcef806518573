pub mod audio;
pub mod components;
pub mod debug;
pub mod file;
pub mod game;
pub mod guitar;
pub mod scenes;
pub mod states;
pub mod widgets;
