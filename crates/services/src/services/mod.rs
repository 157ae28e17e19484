pub mod loyalty;
