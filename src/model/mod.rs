pub mod ad_info;
pub mod parallax;
pub mod placement;
pub mod status;
