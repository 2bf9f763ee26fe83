pub mod display_power;
