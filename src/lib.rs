pub mod artwork;
pub mod buffer;
pub mod config;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod relay;
pub mod render;
pub mod slots;
pub mod source;
pub mod tasks {
    pub mod input;
    pub mod navigation;
    pub mod preloader;
}
