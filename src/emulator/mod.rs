pub mod famicom;
pub mod rom;
