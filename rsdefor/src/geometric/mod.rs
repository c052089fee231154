pub mod change_detector;
pub mod deforestation;
pub mod features;
pub mod index_composite;
pub mod raster;
pub mod scene_mask;
pub mod vectorizer;
