pub mod decode;
pub mod icy;
pub mod output;
pub mod resample;
pub mod source;
